use crate::registry::types::NodeRole;
use serde::{Deserialize, Serialize};

/// Unique identifier of a worker in the pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to tell workers apart in logs
        write!(f, "{}", &self.0[..self.0.len().min(8)])
    }
}

/// A unit of background work. Each variant carries its own payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Job {
    /// Ping and persist peers pulled from the bootstrap node.
    RegisterNodes {
        role: NodeRole,
        addresses: Vec<String>,
    },
    /// Tell a sample of coordinators that this node stores the message.
    AnnounceMessage { message_id: String },
    /// Poll a sample of coordinators and adopt the status they agree on.
    UpdateStatus { message_id: String },
    /// Drop expired messages and recheck those due for a status check.
    SweepMessages,
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::RegisterNodes { .. } => "register_nodes",
            Job::AnnounceMessage { .. } => "announce_message",
            Job::UpdateStatus { .. } => "update_status",
            Job::SweepMessages => "sweep_messages",
        }
    }
}
