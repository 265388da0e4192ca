use super::types::Job;
use crate::bootstrap::service::register_nodes;
use crate::coordination::service::Coordinator;
use crate::registry::store::NodeRegistry;
use crate::transport::NodeTransport;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Executes one job. Implementations report their own failures through the result;
/// the scheduler only logs it.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job) -> Result<()>;
}

/// Routes each `Job` variant to the workflow that owns it.
pub struct JobDispatcher {
    registry: Arc<NodeRegistry>,
    transport: Arc<dyn NodeTransport>,
    coordinator: Arc<Coordinator>,
}

impl JobDispatcher {
    pub fn new(
        registry: Arc<NodeRegistry>,
        transport: Arc<dyn NodeTransport>,
        coordinator: Arc<Coordinator>,
    ) -> Self {
        Self {
            registry,
            transport,
            coordinator,
        }
    }
}

#[async_trait]
impl JobHandler for JobDispatcher {
    async fn handle(&self, job: Job) -> Result<()> {
        match job {
            Job::RegisterNodes { role, addresses } => {
                let written =
                    register_nodes(&self.registry, self.transport.as_ref(), role, &addresses)
                        .await;
                tracing::info!("Registered {}/{} {}s", written, addresses.len(), role);
            }
            Job::AnnounceMessage { message_id } => {
                let outcome = self.coordinator.announce(&message_id).await?;
                if outcome.should_redistribute() {
                    self.coordinator.redistribute(&message_id).await?;
                }
            }
            Job::UpdateStatus { message_id } => {
                self.coordinator.refresh_status(&message_id).await?;
            }
            Job::SweepMessages => {
                self.coordinator.sweep().await?;
            }
        }
        Ok(())
    }
}
