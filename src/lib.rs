pub mod contacts;
pub mod db;
pub mod error;
pub mod profiles;
pub mod relay;
pub mod requests;
pub mod rooms;

use axum::extract::FromRef;
use sqlx::SqlitePool;

pub use error::{ChatError, ChatResult};

use crate::relay::Relay;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub relay: Relay,
}
