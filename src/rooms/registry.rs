use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::contacts;
use crate::db::{unix_millis, Role};
use crate::error::{ChatError, ChatResult};
use crate::profiles;

#[derive(Debug, Clone, Serialize)]
pub struct UnreadEntry {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "unreadMessages")]
    pub unread: i64,
}

/// One row of a user's room list: the room plus the counterpart's resolved
/// display name and the caller's own unread count for the badge.
#[derive(Debug, Serialize)]
pub struct RoomListing {
    #[serde(rename = "chatRoomID")]
    pub chat_room_id: String,
    #[serde(rename = "participantName")]
    pub participant_name: String,
    #[serde(rename = "unreadMessages")]
    pub unread: i64,
}

/// Allocates a pairwise room with both unread counters at zero and records
/// the contact pair symmetrically.
pub async fn create_room(
    conn: &mut SqliteConnection,
    a: &str,
    role_a: Role,
    b: &str,
    role_b: Role,
) -> ChatResult<Uuid> {
    let room_id = Uuid::now_v7();

    sqlx::query("INSERT INTO rooms (uuid, created_at) VALUES (?, ?)")
        .bind(room_id.to_string())
        .bind(unix_millis())
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "INSERT INTO room_members (room_id, user_id, role, unread)
         VALUES (?1, ?2, ?3, 0), (?1, ?4, ?5, 0)",
    )
    .bind(room_id.to_string())
    .bind(a)
    .bind(role_a)
    .bind(b)
    .bind(role_b)
    .execute(&mut *conn)
    .await?;

    contacts::record_contact(&mut *conn, a, b).await?;

    tracing::info!(%room_id, a, b, "chat room created");
    Ok(room_id)
}

pub async fn list_rooms_for(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> ChatResult<Vec<RoomListing>> {
    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT me.room_id, other.user_id, me.unread
         FROM room_members me
         JOIN room_members other
             ON other.room_id = me.room_id AND other.user_id <> me.user_id
         WHERE me.user_id = ?
         ORDER BY me.room_id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut listings = Vec::with_capacity(rows.len());
    for (room_id, other_id, unread) in rows {
        // A counterpart whose profile has gone missing still gets listed,
        // just under their raw id.
        let participant_name = match profiles::lookup(&mut *conn, &other_id).await {
            Ok(card) => card.display_name,
            Err(ChatError::NotFound(_)) => other_id,
            Err(e) => return Err(e),
        };
        listings.push(RoomListing {
            chat_room_id: room_id,
            participant_name,
            unread,
        });
    }

    Ok(listings)
}

/// Bumps every member's unread counter except the sender's. The arithmetic
/// happens inside the store, so concurrent senders cannot lose increments.
pub async fn increment_unread(
    conn: &mut SqliteConnection,
    room_id: Uuid,
    exclude_user_id: &str,
) -> ChatResult<()> {
    sqlx::query("UPDATE room_members SET unread = unread + 1 WHERE room_id = ? AND user_id <> ?")
        .bind(room_id.to_string())
        .bind(exclude_user_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn reset_unread(
    conn: &mut SqliteConnection,
    room_id: Uuid,
    user_id: &str,
) -> ChatResult<()> {
    sqlx::query("UPDATE room_members SET unread = 0 WHERE room_id = ? AND user_id = ?")
        .bind(room_id.to_string())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Per-member unread counters for the counter-update broadcast.
pub async fn unread_counts(
    conn: &mut SqliteConnection,
    room_id: Uuid,
) -> ChatResult<Vec<UnreadEntry>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT user_id, unread FROM room_members WHERE room_id = ? ORDER BY user_id")
            .bind(room_id.to_string())
            .fetch_all(&mut *conn)
            .await?;

    if rows.is_empty() {
        return Err(ChatError::NotFound("chat room"));
    }

    Ok(rows
        .into_iter()
        .map(|(user_id, unread)| UnreadEntry { user_id, unread })
        .collect())
}
