use crate::error::{NodeError, Result};
use crate::executor::scheduler::Scheduler;
use crate::executor::types::Job;
use crate::registry::protocol::{
    decode_node_list, ENDPOINT_GET_COORDINATOR_NODES, ENDPOINT_GET_STORAGE_NODES,
};
use crate::registry::store::NodeRegistry;
use crate::registry::types::{Node, NodeRole};
use crate::storage::protocol::STORAGE_PREFIX;
use crate::transport::NodeTransport;

use std::sync::Arc;

pub struct Bootstrapper {
    seed: Option<String>,
    registry: Arc<NodeRegistry>,
    transport: Arc<dyn NodeTransport>,
    scheduler: Arc<Scheduler>,
}

impl Bootstrapper {
    pub fn new(
        seed: Option<String>,
        registry: Arc<NodeRegistry>,
        transport: Arc<dyn NodeTransport>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            seed,
            registry,
            transport,
            scheduler,
        }
    }

    /// Clears the registry and schedules registration of the seed's peers.
    ///
    /// Clearing and pulling happen before this returns; the registration jobs are
    /// handed to the scheduler in the background, so slow peers never delay startup.
    pub async fn run(&self) -> Result<()> {
        let Some(seed) = self.seed.as_deref() else {
            tracing::info!("No bootstrap node configured, keeping current registry");
            return Ok(());
        };

        tracing::info!("Bootstrapping from {}", seed);

        self.registry.clear_all().map_err(|e| {
            NodeError::Unrecoverable(format!(
                "Could not clear node registry before bootstrapping: {}",
                e
            ))
        })?;

        let storage_nodes = self.pull(seed, NodeRole::Storage).await?;
        let coordinator_nodes = self.pull(seed, NodeRole::Coordinator).await?;

        tracing::info!(
            "Seed {} knows {} storage and {} coordinator nodes",
            seed,
            storage_nodes.len(),
            coordinator_nodes.len()
        );

        for (role, addresses) in [
            (NodeRole::Storage, storage_nodes),
            (NodeRole::Coordinator, coordinator_nodes),
        ] {
            self.scheduler
                .enqueue_detached(Job::RegisterNodes { role, addresses });
        }

        Ok(())
    }

    async fn pull(&self, seed: &str, role: NodeRole) -> Result<Vec<String>> {
        let endpoint = match role {
            NodeRole::Storage => ENDPOINT_GET_STORAGE_NODES,
            NodeRole::Coordinator => ENDPOINT_GET_COORDINATOR_NODES,
        };
        let path = format!("{}{}", STORAGE_PREFIX, endpoint);

        let body = self.transport.get(seed, &path).await.map_err(|e| {
            NodeError::Unrecoverable(format!("No {}s received from {}: {}", role, seed, e))
        })?;

        if body.trim().is_empty() {
            return Err(NodeError::Unrecoverable(format!(
                "No {}s received from {}: empty response",
                role, seed
            )));
        }

        decode_node_list(&body).map_err(|e| {
            NodeError::Unrecoverable(format!(
                "Undecodable {} list from {}: {}",
                role, seed, e
            ))
        })
    }
}

/// Pings every address and stores it under `role`.
///
/// A node already present is treated as re-discovered and gets its ping refreshed.
/// Failures are logged per node. Returns how many nodes were written.
pub async fn register_nodes(
    registry: &NodeRegistry,
    transport: &dyn NodeTransport,
    role: NodeRole,
    addresses: &[String],
) -> usize {
    let mut written = 0;

    for address in addresses {
        let ping = transport.ping(address).await;

        let result = match registry.add_node(role, &Node::new(address.as_str(), ping)) {
            Err(NodeError::Conflict(_)) => registry.update_ping(role, address, ping),
            other => other,
        };

        match result {
            Ok(()) => {
                written += 1;
                tracing::info!("Added {} {} with ping {} to registry", role, address, ping);
            }
            Err(e) => tracing::error!("Failed to register {} {}: {}", role, address, e),
        }
    }

    written
}
