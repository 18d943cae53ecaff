use std::collections::HashMap;

use axum::{
    debug_handler,
    extract::{ws::Message as WsMessage, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::ChatResult;
use crate::relay::{Relay, RoomEvent};
use crate::rooms::{msg, registry};

pub const OUTBOUND_QUEUE: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientAction {
    JoinRoom {
        #[serde(rename = "chatRoomID")]
        chat_room_id: Uuid,
    },
    SendMessage {
        #[serde(rename = "chatRoomID")]
        chat_room_id: Uuid,
        #[serde(rename = "senderID")]
        sender_id: String,
        message: String,
    },
}

/// Per-connection bookkeeping: which rooms this session has joined (one
/// forwarder task each) and the outbound queue its frames go through.
pub struct RoomSession {
    db_pool: SqlitePool,
    relay: Relay,
    out_tx: mpsc::Sender<String>,
    joined: HashMap<Uuid, tokio::task::JoinHandle<()>>,
}

impl RoomSession {
    pub fn new(db_pool: SqlitePool, relay: Relay, out_tx: mpsc::Sender<String>) -> Self {
        Self {
            db_pool,
            relay,
            out_tx,
            joined: HashMap::new(),
        }
    }

    pub fn joined_count(&self) -> usize {
        self.joined.len()
    }

    pub async fn handle(&mut self, action: ClientAction) {
        match action {
            ClientAction::JoinRoom { chat_room_id } => self.join(chat_room_id),
            ClientAction::SendMessage { chat_room_id, sender_id, message } => {
                if let Err(e) =
                    send_message(&self.db_pool, &self.relay, chat_room_id, &sender_id, &message)
                        .await
                {
                    // Fail closed: nothing was broadcast, only the
                    // originating session hears about it.
                    tracing::warn!(room = %chat_room_id, error = %e, "send failed");
                    let err = serde_json::json!({
                        "event": "error",
                        "message": e.to_string(),
                    });
                    let _ = self.out_tx.send(err.to_string()).await;
                }
            }
        }
    }

    /// Join is purely local bookkeeping; joining a room this session is
    /// already in is a no-op.
    fn join(&mut self, room_id: Uuid) {
        if self.joined.contains_key(&room_id) {
            return;
        }

        let mut rx = self.relay.subscribe(room_id);
        let out_tx = self.out_tx.clone();
        let forward = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else {
                            break;
                        };
                        if out_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Snapshot events self-heal, so a lagged connection
                        // just catches up on the next one.
                        tracing::warn!(
                            room = %room_id,
                            skipped,
                            "connection lagged behind room channel"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.joined.insert(room_id, forward);
    }

    /// Leaves every joined room; nothing about this session outlives the
    /// connection.
    pub async fn close(mut self) {
        for (room_id, task) in self.joined.drain() {
            task.abort();
            let _ = task.await;
            self.relay.prune(room_id);
        }
    }
}

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    State(db_pool): State<SqlitePool>,
    State(relay): State<Relay>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| {
        let (mut sender, mut receiver) = stream.split();

        // One outbound queue per connection; every joined room's forwarder
        // feeds it so frames never interleave mid-write.
        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let send_task = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sender.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let mut session = RoomSession::new(db_pool, relay, out_tx);

        while let Some(Ok(frame)) = receiver.next().await {
            let Ok(action) = serde_json::from_slice::<ClientAction>(&frame.into_data()) else {
                continue;
            };
            session.handle(action).await;
        }

        session.close().await;
        send_task.abort();
    })
}

/// The relay's send path: persist and bump counters in one transaction,
/// then fan out fresh snapshots. The commit happens strictly before the
/// broadcast, so no client can observe a message a store fault rolls back,
/// and a fault anywhere in the persistence step leaves no half-written
/// message/counter pair behind.
pub async fn send_message(
    db_pool: &SqlitePool,
    relay: &Relay,
    room_id: Uuid,
    sender_id: &str,
    body: &str,
) -> ChatResult<()> {
    let mut tx = db_pool.begin().await?;

    msg::append(&mut tx, room_id, sender_id, body).await?;
    registry::increment_unread(&mut tx, room_id, sender_id).await?;

    let messages = msg::list_by_room(&mut tx, room_id).await?;
    let counts = registry::unread_counts(&mut tx, room_id).await?;
    tx.commit().await?;

    let delivered = relay.publish(
        room_id,
        RoomEvent::MessageUpdate {
            chat_room_id: room_id.to_string(),
            messages,
        },
    );
    relay.publish(
        room_id,
        RoomEvent::UnreadCountUpdate {
            chat_room_id: room_id.to_string(),
            unread_messages: counts,
        },
    );

    tracing::debug!(room = %room_id, sender = sender_id, delivered, "message fanned out");
    Ok(())
}
