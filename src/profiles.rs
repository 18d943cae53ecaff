//! Boundary to the profile collaborator. The chat core only ever needs a
//! participant's display attributes; the rest of the profile surface
//! (registration forms, settings pages) lives outside this service.

use axum::{
    debug_handler,
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::Role;
use crate::error::{ChatError, ChatResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCard {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub role: Role,
    pub display_name: String,
    pub contact_email: String,
    /// Role-specific identifier: a student number or a mentor id.
    pub role_ref: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", put(upsert))
        .route("/{user_id}", get(profile))
}

pub async fn lookup(conn: &mut SqliteConnection, user_id: &str) -> ChatResult<ProfileCard> {
    let row: Option<(Role, String, String, String)> = sqlx::query_as(
        "SELECT role, display_name, contact_email, role_ref FROM profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (role, display_name, contact_email, role_ref) =
        row.ok_or(ChatError::NotFound("profile"))?;

    Ok(ProfileCard {
        user_id: user_id.to_owned(),
        role,
        display_name,
        contact_email,
        role_ref,
    })
}

pub async fn save(conn: &mut SqliteConnection, card: &ProfileCard) -> ChatResult<()> {
    sqlx::query(
        "INSERT INTO profiles (user_id, role, display_name, contact_email, role_ref)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (user_id) DO UPDATE SET
             role = excluded.role,
             display_name = excluded.display_name,
             contact_email = excluded.contact_email,
             role_ref = excluded.role_ref",
    )
    .bind(card.user_id.trim())
    .bind(card.role)
    .bind(&card.display_name)
    .bind(&card.contact_email)
    .bind(&card.role_ref)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(Serialize)]
struct UpsertResponse {
    success: bool,
}

#[debug_handler]
async fn upsert(
    State(db_pool): State<SqlitePool>,
    Json(card): Json<ProfileCard>,
) -> ChatResult<Json<UpsertResponse>> {
    let mut conn = db_pool.acquire().await?;
    save(&mut conn, &card).await?;
    Ok(Json(UpsertResponse { success: true }))
}

#[debug_handler]
async fn profile(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<String>,
) -> ChatResult<Json<ProfileCard>> {
    let mut conn = db_pool.acquire().await?;
    let card = lookup(&mut conn, &user_id).await?;
    Ok(Json(card))
}
