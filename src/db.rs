use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Mentor,
}

/// Timestamps are stored as unix milliseconds; within a room the v7 message
/// id breaks ties in insertion order.
pub fn unix_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY,
    role TEXT NOT NULL CHECK (role IN ('student', 'mentor')),
    display_name TEXT NOT NULL,
    contact_email TEXT NOT NULL,
    role_ref TEXT NOT NULL
);

-- pending requests only; resolved requests are deleted, and the unique
-- pair constraint is what rejects a duplicate while one is pending
CREATE TABLE IF NOT EXISTS chat_requests (
    id TEXT PRIMARY KEY,
    requester_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    message TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (requester_id, target_id)
);

CREATE TABLE IF NOT EXISTS rooms (
    uuid TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL
);

-- exactly two rows per room in this design; unread is only ever touched
-- with in-database arithmetic
CREATE TABLE IF NOT EXISTS room_members (
    room_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('student', 'mentor')),
    unread INTEGER NOT NULL DEFAULT 0 CHECK (unread >= 0),
    PRIMARY KEY (room_id, user_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, created_at, id);

-- the readBy set; rows are only ever added
CREATE TABLE IF NOT EXISTS message_reads (
    message_id TEXT NOT NULL,
    reader_id TEXT NOT NULL,
    PRIMARY KEY (message_id, reader_id)
);

-- derived contact index, symmetric by construction; rebuildable from
-- room_members at any time
CREATE TABLE IF NOT EXISTS contacts (
    user_id TEXT NOT NULL,
    contact_id TEXT NOT NULL,
    PRIMARY KEY (user_id, contact_id)
);
";

pub async fn setup(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
