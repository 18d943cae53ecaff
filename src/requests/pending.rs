use axum::{
    debug_handler,
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::Role;
use crate::error::{ChatError, ChatResult};
use crate::profiles;

/// A pending request as shown to its target, annotated with the requester's
/// display attributes from the profile collaborator. The annotation fields
/// are best-effort: a requester whose profile has gone missing is still
/// listed, under their raw id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: String,
    #[serde(rename = "requesterID")]
    pub requester_id: String,
    pub requester_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_role: Option<Role>,
    /// Role-specific identifier of the requester (student number / mentor id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    pub message: Option<String>,
    pub created_at: i64,
}

#[derive(Serialize)]
pub(crate) struct PendingResponse {
    success: bool,
    requests: Vec<PendingRequest>,
}

#[debug_handler]
pub(crate) async fn pending(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<String>,
) -> ChatResult<Json<PendingResponse>> {
    let mut conn = db_pool.acquire().await?;
    let requests = list_pending(&mut conn, &user_id).await?;
    Ok(Json(PendingResponse { success: true, requests }))
}

pub async fn list_pending(
    conn: &mut SqliteConnection,
    target_id: &str,
) -> ChatResult<Vec<PendingRequest>> {
    let rows: Vec<(String, String, Option<String>, i64)> = sqlx::query_as(
        "SELECT id, requester_id, message, created_at FROM chat_requests
         WHERE target_id = ? ORDER BY created_at, id",
    )
    .bind(target_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut requests = Vec::with_capacity(rows.len());
    for (id, requester_id, message, created_at) in rows {
        let request = match profiles::lookup(&mut *conn, &requester_id).await {
            Ok(card) => PendingRequest {
                id,
                requester_id,
                requester_name: card.display_name,
                requester_role: Some(card.role),
                requester_ref: Some(card.role_ref),
                contact_email: Some(card.contact_email),
                message,
                created_at,
            },
            // Same degradation as the room listing: a vanished requester
            // profile must not hide the request itself.
            Err(ChatError::NotFound(_)) => PendingRequest {
                requester_name: requester_id.clone(),
                id,
                requester_id,
                requester_role: None,
                requester_ref: None,
                contact_email: None,
                message,
                created_at,
            },
            Err(e) => return Err(e),
        };
        requests.push(request);
    }

    Ok(requests)
}
