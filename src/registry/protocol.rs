//! Control Protocol
//!
//! Endpoints a node serves so that peers can bootstrap their registry from it.

use super::types::Node;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_GET_STORAGE_NODES: &str = "/control/get-storage-nodes";
pub const ENDPOINT_GET_COORDINATOR_NODES: &str = "/control/get-coordinator-nodes";
pub const ENDPOINT_PING: &str = "/control/ping";

/// Upper bound on storage nodes handed out per control request.
pub const MAX_SHARED_STORAGE_NODES: usize = 100;

/// One entry of a peer's node list.
///
/// Older peers answer with bare addresses, newer ones with full `Node` records;
/// both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NodeListEntry {
    Address(String),
    Node(Node),
}

impl NodeListEntry {
    pub fn address(&self) -> &str {
        match self {
            NodeListEntry::Address(address) => address,
            NodeListEntry::Node(node) => &node.address,
        }
    }
}

/// Decodes a node list response body into plain addresses, dropping blanks.
pub fn decode_node_list(body: &str) -> serde_json::Result<Vec<String>> {
    let entries: Vec<NodeListEntry> = serde_json::from_str(body)?;
    Ok(entries
        .iter()
        .map(|entry| entry.address().trim().to_string())
        .filter(|address| !address.is_empty())
        .collect())
}
