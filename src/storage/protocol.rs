//! Storage Protocol
//!
//! Path layout of the storage HTTP surface, `/storage/<action>/<slug>`, and the push
//! path this node sends to its peers.

/// Prefix of every storage-node endpoint.
pub const STORAGE_PREFIX: &str = "/storage";

pub const ENDPOINT_GET: &str = "/get";
pub const ENDPOINT_PUT: &str = "/put";
pub const ENDPOINT_UPDATE: &str = "/update";

/// Path (below `STORAGE_PREFIX`) for pushing a message to a peer.
pub fn put_path(message_id: &str) -> String {
    format!("{}/{}", ENDPOINT_PUT, message_id)
}
