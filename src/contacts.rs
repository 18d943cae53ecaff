//! Contact/History index: who has ever shared a room with whom. Derived
//! data; room membership stays the ground truth and the whole table can be
//! rebuilt from it.

use axum::{
    debug_handler,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::ChatResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rebuild", post(rebuild))
        .route("/{user_id}", get(excluded))
}

/// Idempotently records that `a` and `b` have shared a room, in both
/// directions.
pub async fn record_contact(conn: &mut SqliteConnection, a: &str, b: &str) -> ChatResult<()> {
    if a == b {
        return Ok(());
    }

    sqlx::query("INSERT OR IGNORE INTO contacts (user_id, contact_id) VALUES (?1, ?2), (?2, ?1)")
        .bind(a)
        .bind(b)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Out-of-band repair: rederives the whole index from room membership.
/// Returns the number of contact rows after the rebuild.
pub async fn rebuild_from_rooms(conn: &mut SqliteConnection) -> ChatResult<u64> {
    sqlx::query("DELETE FROM contacts")
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query(
        "INSERT OR IGNORE INTO contacts (user_id, contact_id)
         SELECT a.user_id, b.user_id
         FROM room_members a
         JOIN room_members b ON b.room_id = a.room_id AND b.user_id <> a.user_id",
    )
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// The set a discovery listing filters out: everyone the user has already
/// chatted with.
pub async fn excluded_set(conn: &mut SqliteConnection, user_id: &str) -> ChatResult<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT contact_id FROM contacts WHERE user_id = ? ORDER BY contact_id")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(rows.into_iter().map(|(contact_id,)| contact_id).collect())
}

#[derive(Serialize)]
struct ContactsResponse {
    success: bool,
    contacts: Vec<String>,
}

#[debug_handler]
async fn excluded(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<String>,
) -> ChatResult<Json<ContactsResponse>> {
    let mut conn = db_pool.acquire().await?;
    let contacts = excluded_set(&mut conn, &user_id).await?;
    Ok(Json(ContactsResponse { success: true, contacts }))
}

#[derive(Serialize)]
struct RebuildResponse {
    success: bool,
    contacts: u64,
}

#[debug_handler]
async fn rebuild(State(db_pool): State<SqlitePool>) -> ChatResult<Json<RebuildResponse>> {
    let mut tx = db_pool.begin().await?;
    let contacts = rebuild_from_rooms(&mut tx).await?;
    tx.commit().await?;

    tracing::info!(contacts, "contact index rebuilt from rooms");
    Ok(Json(RebuildResponse { success: true, contacts }))
}
