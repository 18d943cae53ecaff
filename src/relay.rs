use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::rooms::msg::StoredMessage;
use crate::rooms::registry::UnreadEntry;

pub const ROOM_CHANNEL_CAPACITY: usize = 64;

/// Events fanned out to every connection joined to a room. Both carry a
/// full, server-authoritative snapshot, so a missed delivery self-heals on
/// the recipient's next join or history fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RoomEvent {
    MessageUpdate {
        #[serde(rename = "chatRoomID")]
        chat_room_id: String,
        messages: Vec<StoredMessage>,
    },
    UnreadCountUpdate {
        #[serde(rename = "chatRoomID")]
        chat_room_id: String,
        #[serde(rename = "unreadMessages")]
        unread_messages: Vec<UnreadEntry>,
    },
}

/// In-memory connection registry: one broadcast channel per live room.
/// Populated on the first join, pruned when the last joined connection
/// leaves; nothing here survives a restart.
#[derive(Clone, Default)]
pub struct Relay {
    rooms: Arc<Mutex<HashMap<Uuid, broadcast::Sender<RoomEvent>>>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, room_id: Uuid) -> broadcast::Receiver<RoomEvent> {
        self.rooms
            .lock()
            .unwrap()
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Returns how many connections the event was handed to. Zero receivers
    /// is not an error: the counterpart simply catches up from storage later.
    pub fn publish(&self, room_id: Uuid, event: RoomEvent) -> usize {
        let tx = self.rooms.lock().unwrap().get(&room_id).cloned();
        match tx {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops the room channel once nothing is subscribed to it.
    pub fn prune(&self, room_id: Uuid) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(tx) = rooms.get(&room_id) {
            if tx.receiver_count() == 0 {
                rooms.remove(&room_id);
            }
        }
    }

    pub fn joined_rooms(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}
