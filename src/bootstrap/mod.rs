//! Bootstrap Module
//!
//! Seeds the node registry from a known peer at startup. Without a configured seed
//! this is a no-op and the node starts with whatever its registry already holds.
//!
//! ## Protocol
//! 1. Clear both registry collections. Failure is unrecoverable.
//! 2. Pull the seed's storage and coordinator lists. An empty or undecodable answer
//!    is unrecoverable.
//! 3. Enqueue one `RegisterNodes` job per role. Each job pings and persists its nodes,
//!    so startup does not wait on slow peers and one bad node does not stop the rest.

pub mod service;
