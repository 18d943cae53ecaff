use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::unix_millis;
use crate::error::{ChatError, ChatResult};
use crate::profiles;

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
    #[serde(rename = "requesterID")]
    requester_id: String,
    #[serde(rename = "targetID")]
    target_id: String,
    message: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SubmitResponse {
    success: bool,
    #[serde(rename = "requestId")]
    request_id: Uuid,
}

#[debug_handler]
pub(crate) async fn submit(
    State(db_pool): State<SqlitePool>,
    Json(SubmitBody { requester_id, target_id, message }): Json<SubmitBody>,
) -> ChatResult<Json<SubmitResponse>> {
    let mut conn = db_pool.acquire().await?;
    let request_id =
        submit_request(&mut conn, &requester_id, &target_id, message.as_deref()).await?;
    Ok(Json(SubmitResponse { success: true, request_id }))
}

/// Creates a pending request from `requester_id` to `target_id`. Identifiers
/// are compared and stored in trimmed form, so `" u1 "` and `"u1"` name the
/// same participant.
pub async fn submit_request(
    conn: &mut SqliteConnection,
    requester_id: &str,
    target_id: &str,
    message: Option<&str>,
) -> ChatResult<Uuid> {
    let requester_id = requester_id.trim();
    let target_id = target_id.trim();

    if requester_id == target_id {
        return Err(ChatError::SelfRequest);
    }

    // Both ends must be known to the profile collaborator, so the target's
    // pending list can always be annotated.
    profiles::lookup(&mut *conn, requester_id).await?;
    profiles::lookup(&mut *conn, target_id).await?;

    let id = Uuid::now_v7();
    let inserted = sqlx::query(
        "INSERT INTO chat_requests (id, requester_id, target_id, message, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(requester_id)
    .bind(target_id)
    .bind(message)
    .bind(unix_millis())
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => {
            tracing::info!(%id, requester = requester_id, target = target_id, "chat request submitted");
            Ok(id)
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(ChatError::DuplicateRequest)
        }
        Err(e) => Err(e.into()),
    }
}
