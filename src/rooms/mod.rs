pub mod msg;
pub mod registry;
mod ws;

use axum::{
    debug_handler,
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ChatResult;
use crate::relay::{Relay, RoomEvent};
use crate::AppState;

pub use ws::{send_message, ClientAction, RoomSession};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{user_id}", get(rooms_for_user))
        .route("/messages/{room_id}/{user_id}", get(room_history))
        .route("/ws", get(ws::chat_ws))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomsResponse {
    success: bool,
    chat_rooms: Vec<registry::RoomListing>,
}

#[debug_handler]
async fn rooms_for_user(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<String>,
) -> ChatResult<Json<RoomsResponse>> {
    let mut conn = db_pool.acquire().await?;
    let chat_rooms = registry::list_rooms_for(&mut conn, &user_id).await?;
    Ok(Json(RoomsResponse { success: true, chat_rooms }))
}

#[derive(Serialize)]
struct HistoryResponse {
    success: bool,
    messages: Vec<msg::StoredMessage>,
}

/// Fetching a room's history doubles as the caller's read acknowledgement:
/// their counter drops to zero, they join every foreign message's readBy
/// set, and the fresh counters are pushed to whoever is connected (a second
/// tab of the same user sees its badge clear).
#[debug_handler(state = AppState)]
async fn room_history(
    State(db_pool): State<SqlitePool>,
    State(relay): State<Relay>,
    Path((room_id, user_id)): Path<(Uuid, String)>,
) -> ChatResult<Json<HistoryResponse>> {
    let mut conn = db_pool.acquire().await?;

    registry::reset_unread(&mut conn, room_id, &user_id).await?;
    msg::mark_read(&mut conn, room_id, &user_id).await?;

    let messages = msg::list_by_room(&mut conn, room_id).await?;
    let counts = registry::unread_counts(&mut conn, room_id).await?;
    drop(conn);

    relay.publish(
        room_id,
        RoomEvent::UnreadCountUpdate {
            chat_room_id: room_id.to_string(),
            unread_messages: counts,
        },
    );

    Ok(Json(HistoryResponse { success: true, messages }))
}
