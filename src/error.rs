//! Error Taxonomy
//!
//! Every fallible operation in the node library returns `NodeError`. The variants
//! mirror how a failure is surfaced to the outside world:
//!
//! - **Input** (`InvalidInput`, `PayloadTooLarge`): rejected with a 4xx, no retry.
//! - **Conflict**: duplicate message id or node address, never overwritten.
//! - **Resource** (`InsufficientStorage`): quota exhausted, caller retries elsewhere.
//! - **Storage/registry I/O** (`Io`, `Database`, `Serialization`): 500 on the request path.
//! - **Unrecoverable**: a startup-critical step failed; the process must stop.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Insufficient storage: {required} bytes would exceed quota of {quota} bytes")]
    InsufficientStorage { required: u64, quota: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Scheduler is shut down")]
    SchedulerClosed,

    #[error("Unrecoverable: {0}")]
    Unrecoverable(String),
}

impl NodeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            NodeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            NodeError::Conflict(_) => StatusCode::CONFLICT,
            NodeError::NotFound(_) => StatusCode::NOT_FOUND,
            NodeError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            NodeError::InsufficientStorage { .. } => StatusCode::INSUFFICIENT_STORAGE,
            NodeError::SchedulerClosed => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::Io(_)
            | NodeError::Database(_)
            | NodeError::Serialization(_)
            | NodeError::Transport(_)
            | NodeError::Unrecoverable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, NodeError::Unrecoverable(_))
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (status, self.to_string()).into_response()
    }
}
