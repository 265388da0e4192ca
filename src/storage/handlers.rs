use super::store::MessageStore;
use super::types::{sanitize_message_id, Message};
use crate::error::NodeError;
use crate::executor::scheduler::Scheduler;
use crate::executor::types::Job;

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

pub async fn handle_get(
    Extension(store): Extension<Arc<MessageStore>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Message>, NodeError> {
    let id = sanitize_message_id(&raw_id)?;
    let message = store.get(&id).await?;
    Ok(Json(message))
}

/// Stores the raw body and schedules the announce to the coordinator network.
///
/// Returns as soon as the message is on disk; the announce runs on a worker.
pub async fn handle_put(
    Extension(store): Extension<Arc<MessageStore>>,
    Extension(scheduler): Extension<Arc<Scheduler>>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, String), NodeError> {
    let id = sanitize_message_id(&raw_id)?;

    store.put(&id, &body).await?;

    scheduler.enqueue_detached(Job::AnnounceMessage {
        message_id: id.clone(),
    });

    Ok((StatusCode::OK, format!("Successfully stored message {}", id)))
}

/// Accepts a status refresh request. The quorum check itself runs on a worker.
pub async fn handle_update(
    Extension(scheduler): Extension<Arc<Scheduler>>,
    Path(raw_id): Path<String>,
) -> Result<(StatusCode, String), NodeError> {
    let id = sanitize_message_id(&raw_id)?;

    scheduler.enqueue_detached(Job::UpdateStatus {
        message_id: id.clone(),
    });

    Ok((StatusCode::OK, format!("Status update for message {} accepted", id)))
}

pub async fn handle_invalid_request() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, "Invalid Action or MessageID")
}
