//! Node Registry Module
//!
//! Durable record of the peers this node knows about. Storage nodes and coordinator
//! nodes live in two separate collections, each keyed by address.
//!
//! ## Core Rules
//! - **Insert-only**: adding an address that already exists is a `Conflict`, never an upsert.
//! - **Sampling**: coordinator nodes can be drawn at random for announce and status checks.
//! - **Bootstrap reset**: `clear_all` empties both collections; only the bootstrapper calls it.

pub mod handlers;
pub mod protocol;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
