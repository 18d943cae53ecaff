use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::unix_millis;
use crate::error::{ChatError, ChatResult};

/// A stored message with its (monotonically growing) readBy set. Field
/// names on the wire match what the chat client renders.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: String,
    #[serde(rename = "chatRoomID")]
    pub chat_room_id: String,
    #[serde(rename = "senderID")]
    pub sender_id: String,
    pub message: String,
    pub timestamp: i64,
    #[serde(rename = "readBy")]
    pub read_by: Vec<String>,
}

/// Appends a message to a room the sender belongs to. The sender trivially
/// counts as having read their own message.
pub async fn append(
    conn: &mut SqliteConnection,
    room_id: Uuid,
    sender_id: &str,
    body: &str,
) -> ChatResult<StoredMessage> {
    let member: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id.to_string())
            .bind(sender_id)
            .fetch_optional(&mut *conn)
            .await?;
    if member.is_none() {
        return Err(ChatError::NotFound("chat room member"));
    }

    let id = Uuid::now_v7();
    let created_at = unix_millis();

    sqlx::query(
        "INSERT INTO messages (id, room_id, sender_id, body, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(room_id.to_string())
    .bind(sender_id)
    .bind(body)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO message_reads (message_id, reader_id) VALUES (?, ?)")
        .bind(id.to_string())
        .bind(sender_id)
        .execute(&mut *conn)
        .await?;

    Ok(StoredMessage {
        id: id.to_string(),
        chat_room_id: room_id.to_string(),
        sender_id: sender_id.to_owned(),
        message: body.to_owned(),
        timestamp: created_at,
        read_by: vec![sender_id.to_owned()],
    })
}

/// Full history of a room, ascending by append order.
pub async fn list_by_room(
    conn: &mut SqliteConnection,
    room_id: Uuid,
) -> ChatResult<Vec<StoredMessage>> {
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
        "SELECT id, sender_id, body, created_at FROM messages
         WHERE room_id = ? ORDER BY created_at, id",
    )
    .bind(room_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let reads: Vec<(String, String)> = sqlx::query_as(
        "SELECT r.message_id, r.reader_id
         FROM message_reads r
         JOIN messages m ON m.id = r.message_id
         WHERE m.room_id = ?
         ORDER BY r.reader_id",
    )
    .bind(room_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut readers_by_message: HashMap<String, Vec<String>> = HashMap::new();
    for (message_id, reader_id) in reads {
        readers_by_message.entry(message_id).or_default().push(reader_id);
    }

    Ok(rows
        .into_iter()
        .map(|(id, sender_id, body, created_at)| StoredMessage {
            read_by: readers_by_message.remove(&id).unwrap_or_default(),
            id,
            chat_room_id: room_id.to_string(),
            sender_id,
            message: body,
            timestamp: created_at,
        })
        .collect())
}

/// Adds the reader to the readBy set of every message in the room they did
/// not send themselves. Returns how many messages were newly acknowledged.
pub async fn mark_read(
    conn: &mut SqliteConnection,
    room_id: Uuid,
    reader_id: &str,
) -> ChatResult<u64> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO message_reads (message_id, reader_id)
         SELECT id, ?2 FROM messages WHERE room_id = ?1 AND sender_id <> ?2",
    )
    .bind(room_id.to_string())
    .bind(reader_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
