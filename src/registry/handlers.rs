use super::protocol::MAX_SHARED_STORAGE_NODES;
use super::store::NodeRegistry;
use super::types::Node;
use crate::error::NodeError;

use axum::{Extension, Json};
use std::sync::Arc;

pub async fn handle_get_storage_nodes(
    Extension(registry): Extension<Arc<NodeRegistry>>,
) -> Result<Json<Vec<Node>>, NodeError> {
    let nodes = registry.list_storage_nodes(Some(MAX_SHARED_STORAGE_NODES))?;
    tracing::debug!("Serving {} storage nodes", nodes.len());
    Ok(Json(nodes))
}

pub async fn handle_get_coordinator_nodes(
    Extension(registry): Extension<Arc<NodeRegistry>>,
) -> Result<Json<Vec<Node>>, NodeError> {
    let nodes = registry.list_coordinator_nodes()?;
    tracing::debug!("Serving {} coordinator nodes", nodes.len());
    Ok(Json(nodes))
}

/// Answers peers measuring their ping to this node.
pub async fn handle_ping() -> &'static str {
    "pong"
}
