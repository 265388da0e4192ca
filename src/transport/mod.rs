//! Node Transport
//!
//! Node-to-node requests go through the `NodeTransport` trait so the workflows that
//! fan out to peers (bootstrap pulls, announce, status quorum, redistribution) never
//! touch HTTP directly.
//!
//! ## Submodules
//! - **`http`**: `HttpTransport`, the production implementation on top of `reqwest`.
//! - **`scripted`** (tests only): canned peer answers with a call log.

pub mod http;

#[cfg(test)]
pub mod scripted;


use crate::error::Result;

use async_trait::async_trait;
use bytes::Bytes;

/// Sends requests to other nodes.
///
/// `path` is the full request path on the peer, e.g. `/storage/control/ping` or
/// `/coordinator/status/{id}`. Any non-2xx answer is a `NodeError::Transport`.
#[async_trait]
pub trait NodeTransport: Send + Sync + 'static {
    /// Issues a GET and returns the response body.
    async fn get(&self, address: &str, path: &str) -> Result<String>;

    /// Issues a POST carrying `body` and returns the response body.
    async fn post(&self, address: &str, path: &str, body: Bytes) -> Result<String>;

    /// Round-trip time to `address` in milliseconds, or `UNREACHABLE_PING` (-1).
    async fn ping(&self, address: &str) -> i64;
}
