//! Message Storage Module
//!
//! Content-keyed blob store with a disk quota and expiry bookkeeping.
//!
//! ## Core Concepts
//! - **Slugs**: caller-supplied ids are sanitized to `[A-Za-z0-9-]` before use.
//! - **Dual record**: a blob file plus a tracking row; both must exist for a message to exist.
//! - **Quota**: every put measures the messages directory and refuses to exceed the limit.
//! - **HTTP surface**: `/storage/get`, `/storage/put` and `/storage/update`.

pub mod handlers;
pub mod protocol;
pub mod store;
pub mod types;
