mod pending;
mod resolve;
mod submit;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub use pending::{list_pending, PendingRequest};
pub use resolve::{resolve, Decision};
pub use submit::submit_request;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request", post(submit::submit))
        .route("/request/update", post(resolve::update))
        .route("/requests/{user_id}", get(pending::pending))
}
