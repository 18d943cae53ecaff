use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::profiles;
use crate::rooms::{msg, registry};

/// Greeting seeded into the room when the request carried no message.
pub const DEFAULT_GREETING: &str = "Hi! I'd like to connect with you.";

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

#[derive(Deserialize)]
pub(crate) struct UpdateBody {
    #[serde(rename = "requestId")]
    request_id: Uuid,
    action: Decision,
}

#[derive(Serialize)]
pub(crate) struct UpdateResponse {
    success: bool,
    #[serde(rename = "chatRoomID", skip_serializing_if = "Option::is_none")]
    chat_room_id: Option<String>,
}

#[debug_handler]
pub(crate) async fn update(
    State(db_pool): State<SqlitePool>,
    Json(UpdateBody { request_id, action }): Json<UpdateBody>,
) -> ChatResult<Json<UpdateResponse>> {
    let room = resolve(&db_pool, request_id, action).await?;
    Ok(Json(UpdateResponse {
        success: true,
        chat_room_id: room.map(|id| id.to_string()),
    }))
}

/// Terminal transition of a pending request, in one transaction. Accepting
/// deletes the request, creates the room, seeds it with the request message
/// (or a greeting) and records the contact pair; rejecting only deletes.
/// Deleting first is what makes a second resolve on the same id come back
/// NotFound instead of minting another room.
pub async fn resolve(
    db_pool: &SqlitePool,
    request_id: Uuid,
    decision: Decision,
) -> ChatResult<Option<Uuid>> {
    let mut tx = db_pool.begin().await?;

    let row: Option<(String, String, Option<String>)> = sqlx::query_as(
        "DELETE FROM chat_requests WHERE id = ? RETURNING requester_id, target_id, message",
    )
    .bind(request_id.to_string())
    .fetch_optional(&mut *tx)
    .await?;

    let Some((requester_id, target_id, message)) = row else {
        return Err(ChatError::NotFound("pending chat request"));
    };

    if matches!(decision, Decision::Rejected) {
        tx.commit().await?;
        tracing::info!(%request_id, "chat request rejected");
        return Ok(None);
    }

    let requester = profiles::lookup(&mut tx, &requester_id).await?;
    let target = profiles::lookup(&mut tx, &target_id).await?;

    let room_id =
        registry::create_room(&mut tx, &requester_id, requester.role, &target_id, target.role)
            .await?;

    // The seed rides the normal message path, so the accepting party starts
    // with one unread and the requester with none.
    let seed = message.as_deref().unwrap_or(DEFAULT_GREETING);
    msg::append(&mut tx, room_id, &requester_id, seed).await?;
    registry::increment_unread(&mut tx, room_id, &requester_id).await?;

    tx.commit().await?;
    tracing::info!(%request_id, %room_id, "chat request accepted");
    Ok(Some(room_id))
}
