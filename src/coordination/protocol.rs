//! Coordinator endpoints consumed by this node.

/// Prefix of every coordinator-node endpoint.
pub const COORDINATOR_PREFIX: &str = "/coordinator";

/// How many coordinators are asked per announce or status check.
pub const COORDINATOR_SAMPLE_SIZE: usize = 3;

/// How many storage nodes a redistributed message is pushed to.
pub const REDISTRIBUTION_FANOUT: usize = 3;

pub fn announce_path(message_id: &str, own_address: &str) -> String {
    format!("{}/announce/{}/{}", COORDINATOR_PREFIX, message_id, own_address)
}

pub fn status_path(message_id: &str) -> String {
    format!("{}/status/{}", COORDINATOR_PREFIX, message_id)
}
