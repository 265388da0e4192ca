use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latency recorded for a peer that did not answer the ping.
pub const UNREACHABLE_PING: i64 = -1;

/// The two disjoint roles a peer can be registered under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Storage,
    Coordinator,
}

impl NodeRole {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            NodeRole::Storage => "storage_nodes",
            NodeRole::Coordinator => "coordinator_nodes",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Storage => write!(f, "StorageNode"),
            NodeRole::Coordinator => write!(f, "CoordinatorNode"),
        }
    }
}

/// A known peer together with the last latency measured against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub address: String,
    pub last_ping: DateTime<Utc>,
    /// Round-trip time in milliseconds, or `UNREACHABLE_PING`.
    pub ping: i64,
}

impl Node {
    /// Creates a node whose latency was measured just now.
    pub fn new(address: impl Into<String>, ping: i64) -> Self {
        Self {
            address: address.into(),
            last_ping: Utc::now(),
            ping,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.ping != UNREACHABLE_PING
    }
}
