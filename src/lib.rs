//! Peer-to-Peer Message Storage Node Library
//!
//! This library crate defines the modules that make up a storage node. It serves as
//! the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`executor`**: The background job engine. An elastic pool of workers that
//!   grows with the number of waiting jobs and shrinks back to one when idle.
//! - **`registry`**: The durable list of known storage and coordinator peers
//!   (SQLite), plus the control endpoints peers bootstrap from.
//! - **`storage`**: The message blob store with disk quota and expiry bookkeeping,
//!   and the `/storage/...` HTTP handlers.
//! - **`bootstrap`**: Rebuilds the registry from a seed peer at startup.
//! - **`coordination`**: Announce, status quorum, redistribution and the retention
//!   sweep against the coordinator network.
//! - **`transport`**: Node-to-node requests over HTTP.
//! - **`config`**, **`error`**, **`context`**: settings, the error taxonomy and the
//!   startup wiring that ties all of the above together.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod coordination;
pub mod error;
pub mod executor;
pub mod registry;
pub mod storage;
pub mod transport;
