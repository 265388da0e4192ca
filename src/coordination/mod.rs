//! Coordination Module
//!
//! Keeps this node's view of its messages loosely consistent with the coordinator
//! network. Everything here runs on scheduler workers, never on the request path.
//!
//! ## Workflows
//! 1. **Announce**: after a store, a sample of coordinators is told this node holds
//!    the message. Their answers decide whether the message is pushed to more
//!    storage nodes. A single dissent suppresses redistribution.
//! 2. **Status quorum**: a sample of coordinators is asked for the message status.
//!    Only exact unanimity is accepted; anything else leaves the local record as is.
//! 3. **Sweep**: periodic retention pass. Expired messages are deleted and messages
//!    due for a recheck run through the status quorum.
//!
//! Fan-out is sequential. A peer that fails to answer is folded into the
//! aggregation rules of `announce` and `quorum`, never surfaced as an error.

pub mod announce;
pub mod protocol;
pub mod quorum;
pub mod service;
