use super::announce::{self, AnnounceOutcome};
use super::protocol::{
    announce_path, status_path, COORDINATOR_SAMPLE_SIZE, REDISTRIBUTION_FANOUT,
};
use super::quorum::{self, StatusVerdict};
use crate::error::{NodeError, Result};
use crate::registry::store::NodeRegistry;
use crate::registry::types::Node;
use crate::storage::protocol::{put_path, STORAGE_PREFIX};
use crate::storage::store::MessageStore;
use crate::storage::types::STATUS_DELIVERED;
use crate::transport::NodeTransport;

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

/// Counts from one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub checked: usize,
    pub delivered: usize,
}

/// Runs the announce, status quorum and retention workflows of this node.
pub struct Coordinator {
    registry: Arc<NodeRegistry>,
    storage: Arc<MessageStore>,
    transport: Arc<dyn NodeTransport>,
    own_address: String,
    recheck_interval: chrono::Duration,
}

impl Coordinator {
    pub fn new(
        registry: Arc<NodeRegistry>,
        storage: Arc<MessageStore>,
        transport: Arc<dyn NodeTransport>,
        own_address: impl Into<String>,
        recheck_interval: chrono::Duration,
    ) -> Self {
        Self {
            registry,
            storage,
            transport,
            own_address: own_address.into(),
            recheck_interval,
        }
    }

    /// Fails with `NotFound` before any network traffic if the message is not held here.
    fn ensure_stored(&self, message_id: &str) -> Result<()> {
        if !self.storage.has_message(message_id)? {
            return Err(NodeError::NotFound(format!(
                "Message {} is not stored on this node",
                message_id
            )));
        }
        Ok(())
    }

    /// Asks every node for `path` in turn. Failures become `None`.
    async fn fan_out(&self, nodes: &[Node], path: &str) -> Vec<Option<String>> {
        let mut responses = Vec::with_capacity(nodes.len());
        for node in nodes {
            match self.transport.get(&node.address, path).await {
                Ok(body) => responses.push(Some(body)),
                Err(e) => {
                    tracing::debug!("No answer from coordinator {}: {}", node.address, e);
                    responses.push(None);
                }
            }
        }
        responses
    }

    /// Tells a sample of coordinators that this node stores `message_id`.
    pub async fn announce(&self, message_id: &str) -> Result<AnnounceOutcome> {
        self.ensure_stored(message_id)?;

        let coordinators = self
            .registry
            .random_coordinator_nodes(COORDINATOR_SAMPLE_SIZE)?;
        if coordinators.is_empty() {
            tracing::info!("No coordinators known, skipping announce of {}", message_id);
            return Ok(AnnounceOutcome::NoCoordinators);
        }

        let path = announce_path(message_id, &self.own_address);
        let responses = self.fan_out(&coordinators, &path).await;
        let outcome = announce::decide(&responses);

        tracing::info!(
            "Announced message {} to {} coordinators: {:?}",
            message_id,
            coordinators.len(),
            outcome
        );
        Ok(outcome)
    }

    /// Pushes a stored message to up to `REDISTRIBUTION_FANOUT` other storage nodes.
    ///
    /// Returns how many peers accepted it.
    pub async fn redistribute(&self, message_id: &str) -> Result<usize> {
        let message = self.storage.get(message_id).await?;
        let content = Bytes::from(message.content);

        // One extra draw so that dropping ourselves still leaves a full sample
        let peers: Vec<Node> = self
            .registry
            .random_storage_nodes(REDISTRIBUTION_FANOUT + 1)?
            .into_iter()
            .filter(|node| node.address != self.own_address)
            .take(REDISTRIBUTION_FANOUT)
            .collect();

        let path = format!("{}{}", STORAGE_PREFIX, put_path(message_id));
        let mut accepted = 0;
        for peer in &peers {
            match self
                .transport
                .post(&peer.address, &path, content.clone())
                .await
            {
                Ok(_) => accepted += 1,
                Err(e) => {
                    tracing::warn!(
                        "Storage node {} refused message {}: {}",
                        peer.address,
                        message_id,
                        e
                    );
                }
            }
        }

        tracing::info!(
            "Redistributed message {} to {}/{} storage nodes",
            message_id,
            accepted,
            peers.len()
        );
        Ok(accepted)
    }

    /// Polls a sample of coordinators and adopts the status if they agree exactly.
    pub async fn refresh_status(&self, message_id: &str) -> Result<StatusVerdict> {
        self.ensure_stored(message_id)?;

        let coordinators = self
            .registry
            .random_coordinator_nodes(COORDINATOR_SAMPLE_SIZE)?;
        if coordinators.is_empty() {
            tracing::info!(
                "No coordinators known, cannot check status of {}",
                message_id
            );
            return Ok(StatusVerdict::NoCoordinators);
        }

        let responses = self.fan_out(&coordinators, &status_path(message_id)).await;
        let verdict = quorum::agree(&responses);

        match &verdict {
            StatusVerdict::Agreed(status) => {
                self.storage.update_verification_status(message_id, *status)?;
                tracing::info!("Message {} status agreed at {}", message_id, status);
            }
            StatusVerdict::OutOfSync => {
                tracing::warn!(
                    "Coordinator network out of sync on message {}: {:?}",
                    message_id,
                    responses
                );
            }
            StatusVerdict::Unparsable(raw) => {
                tracing::warn!(
                    "Coordinators agreed on unparsable status '{}' for message {}",
                    raw,
                    message_id
                );
            }
            StatusVerdict::NoCoordinators => {}
        }

        Ok(verdict)
    }

    /// Deletes expired messages, then rechecks those due and deletes the delivered ones.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = Utc::now();
        let mut report = SweepReport::default();

        for id in self.storage.expired_messages(now)? {
            match self.storage.delete(&id).await {
                Ok(()) => report.expired += 1,
                Err(e) => tracing::error!("Failed to delete expired message {}: {}", id, e),
            }
        }

        for id in self.storage.messages_due_for_check(self.recheck_interval, now)? {
            report.checked += 1;
            match self.refresh_status(&id).await {
                Ok(StatusVerdict::Agreed(STATUS_DELIVERED)) => {
                    match self.storage.delete(&id).await {
                        Ok(()) => report.delivered += 1,
                        Err(e) => {
                            tracing::error!("Failed to delete delivered message {}: {}", id, e)
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Status check of message {} failed: {}", id, e),
            }
        }

        tracing::info!(
            "Sweep done: {} expired, {} checked, {} delivered",
            report.expired,
            report.checked,
            report.delivered
        );
        Ok(report)
    }
}
