use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("a pending chat request for this pair already exists")]
    DuplicateRequest,

    #[error("cannot send a chat request to yourself")]
    SelfRequest,

    #[error("storage failure")]
    Persistence(#[from] sqlx::Error),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::DuplicateRequest => StatusCode::CONFLICT,
            ChatError::SelfRequest => StatusCode::BAD_REQUEST,
            ChatError::Persistence(e) => {
                tracing::error!(error = %e, "store operation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(json!({ "success": false, "message": self.to_string() })),
        )
            .into_response()
    }
}
