//! Node Context
//!
//! Owns every long-lived component of a node and wires them together at startup:
//! settings → databases → transport → coordinator → scheduler. Components receive
//! their collaborators through constructors; nothing is global.

use crate::bootstrap::service::Bootstrapper;
use crate::config::Settings;
use crate::coordination::service::Coordinator;
use crate::error::{NodeError, Result};
use crate::executor::dispatch::JobDispatcher;
use crate::executor::scheduler::Scheduler;
use crate::executor::types::Job;
use crate::registry::handlers::{
    handle_get_coordinator_nodes, handle_get_storage_nodes, handle_ping,
};
use crate::registry::protocol::{
    ENDPOINT_GET_COORDINATOR_NODES, ENDPOINT_GET_STORAGE_NODES, ENDPOINT_PING,
};
use crate::registry::store::NodeRegistry;
use crate::storage::handlers::{handle_get, handle_invalid_request, handle_put, handle_update};
use crate::storage::protocol::{ENDPOINT_GET, ENDPOINT_PUT, ENDPOINT_UPDATE, STORAGE_PREFIX};
use crate::storage::store::{MessageStore, StoreLimits};
use crate::transport::NodeTransport;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct NodeContext {
    pub settings: Settings,
    pub registry: Arc<NodeRegistry>,
    pub storage: Arc<MessageStore>,
    pub transport: Arc<dyn NodeTransport>,
    pub coordinator: Arc<Coordinator>,
    pub scheduler: Arc<Scheduler>,
}

impl NodeContext {
    /// Opens both databases, builds the workflows and starts the first worker.
    ///
    /// Must run inside a tokio runtime. A database that cannot be opened is
    /// `Unrecoverable`.
    pub fn init(settings: Settings, transport: Arc<dyn NodeTransport>) -> Result<Self> {
        let databases = settings.databases_dir();

        let registry = NodeRegistry::open(&databases.join("coordinator.db")).map_err(|e| {
            NodeError::Unrecoverable(format!("Could not open node registry: {}", e))
        })?;

        let storage = MessageStore::open(
            &settings.messages_dir(),
            &databases.join("storage.db"),
            StoreLimits {
                quota_bytes: settings.disk_quota_bytes(),
                max_message_bytes: settings.message_max_bytes(),
                max_store_days: settings.message_max_store_time,
            },
        )
        .map_err(|e| NodeError::Unrecoverable(format!("Could not open message store: {}", e)))?;

        let registry = Arc::new(registry);
        let storage = Arc::new(storage);

        let coordinator = Arc::new(Coordinator::new(
            registry.clone(),
            storage.clone(),
            transport.clone(),
            settings.remote_address.clone(),
            chrono::Duration::hours(settings.message_min_check_delay as i64),
        ));

        let dispatcher = Arc::new(JobDispatcher::new(
            registry.clone(),
            transport.clone(),
            coordinator.clone(),
        ));
        let scheduler = Scheduler::new(
            settings.max_workers,
            settings.queue_max_length,
            dispatcher,
        );
        scheduler.spawn_worker();

        tracing::info!(
            "Node context ready (data dir {}, quota {} MB, max {} workers)",
            settings.data_dir.display(),
            settings.disk_space,
            settings.max_workers
        );

        Ok(Self {
            settings,
            registry,
            storage,
            transport,
            coordinator,
            scheduler,
        })
    }

    /// HTTP surface of the node. Unknown `/storage/...` paths answer 400.
    pub fn router(&self) -> Router {
        let route = |endpoint: &str| format!("{}{}", STORAGE_PREFIX, endpoint);

        Router::new()
            .route(&route(&format!("{}/:id", ENDPOINT_GET)), get(handle_get))
            .route(&route(&format!("{}/:id", ENDPOINT_PUT)), post(handle_put))
            .route(&route(&format!("{}/:id", ENDPOINT_UPDATE)), post(handle_update))
            .route(&route(ENDPOINT_GET_STORAGE_NODES), get(handle_get_storage_nodes))
            .route(
                &route(ENDPOINT_GET_COORDINATOR_NODES),
                get(handle_get_coordinator_nodes),
            )
            .route(&route(ENDPOINT_PING), get(handle_ping))
            .fallback(handle_invalid_request)
            .layer(DefaultBodyLimit::max(self.storage.max_message_bytes()))
            .layer(Extension(self.storage.clone()))
            .layer(Extension(self.registry.clone()))
            .layer(Extension(self.scheduler.clone()))
    }

    pub fn bootstrapper(&self) -> Bootstrapper {
        Bootstrapper::new(
            self.settings.bootstrap_node.clone(),
            self.registry.clone(),
            self.transport.clone(),
            self.scheduler.clone(),
        )
    }

    /// Enqueues a retention sweep now and then every `MessageMinCheckDelay` hours.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let period = Duration::from_secs(self.settings.message_min_check_delay.max(1) * 3600);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match scheduler.enqueue(Job::SweepMessages).await {
                    Ok(()) => {}
                    Err(NodeError::SchedulerClosed) => break,
                    Err(e) => tracing::error!("Failed to schedule sweep: {}", e),
                }
            }
            tracing::debug!("Sweeper stopped");
        })
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsOverrides;
    use crate::registry::types::Node;
    use crate::transport::http::HttpTransport;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings::load(SettingsOverrides {
            data_dir: Some(dir.path().to_path_buf()),
            disk_space: Some(1),
            message_max_size: Some(1),
            max_workers: Some(2),
            ..Default::default()
        })
        .unwrap()
    }

    fn http() -> Arc<dyn NodeTransport> {
        Arc::new(HttpTransport::new(Duration::from_millis(500), 1))
    }

    /// Serves the node on an ephemeral loopback port and returns its address.
    async fn serve(context: &NodeContext) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let app = context.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        address
    }

    #[tokio::test]
    async fn test_init_creates_data_layout() {
        let dir = tempfile::tempdir().unwrap();
        let context = NodeContext::init(settings(&dir), http()).unwrap();

        assert!(dir.path().join("messages").is_dir());
        assert!(dir.path().join("databases").join("storage.db").is_file());
        assert!(dir.path().join("databases").join("coordinator.db").is_file());
        assert_eq!(context.scheduler.pool_size(), 1);
    }

    #[tokio::test]
    async fn test_unusable_data_dir_is_unrecoverable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut settings = settings(&dir);
        settings.data_dir = blocker;

        let result = NodeContext::init(settings, http());
        assert!(matches!(result, Err(e) if e.is_unrecoverable()));
    }

    #[tokio::test]
    async fn test_http_surface_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let context = NodeContext::init(settings(&dir), http()).unwrap();
        context.registry.add_storage_node(&Node::new("peer:9123", 4)).unwrap();
        let address = serve(&context).await;
        let client = HttpTransport::new(Duration::from_secs(2), 1);

        let stored = client
            .post(
                &address,
                "/storage/put/hello%20world",
                Bytes::from_static(b"payload"),
            )
            .await
            .unwrap();
        assert!(stored.contains("hello-world"));

        let body = client.get(&address, "/storage/get/hello-world").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["id"], "hello-world");
        assert_eq!(json["content"], "cGF5bG9hZA==");

        // Duplicate, unknown and malformed requests are all non-2xx
        assert!(client
            .post(&address, "/storage/put/hello-world", Bytes::from_static(b"again"))
            .await
            .is_err());
        assert!(client.get(&address, "/storage/get/missing").await.is_err());
        assert!(client.get(&address, "/storage/delete/x").await.is_err());

        let nodes = client
            .get(&address, "/storage/control/get-storage-nodes")
            .await
            .unwrap();
        assert!(nodes.contains("peer:9123"));

        assert!(client.ping(&address).await >= 0);
    }

    #[tokio::test]
    async fn test_put_rejections_map_to_status_codes() {
        const MB: usize = 1024 * 1024;
        let dir = tempfile::tempdir().unwrap();
        let context = NodeContext::init(settings(&dir), http()).unwrap();
        let address = serve(&context).await;
        let client = reqwest::Client::new();

        let put = |id: &str, body: Vec<u8>| {
            client
                .post(format!("http://{}/storage/put/{}", address, id))
                .body(body)
                .send()
        };

        let status = put("big", vec![0u8; MB + 1]).await.unwrap().status();
        assert_eq!(status, reqwest::StatusCode::PAYLOAD_TOO_LARGE);

        let status = put("a", vec![1u8; MB * 9 / 10]).await.unwrap().status();
        assert_eq!(status, reqwest::StatusCode::OK);

        let status = put("a", vec![2u8; 16]).await.unwrap().status();
        assert_eq!(status, reqwest::StatusCode::CONFLICT);

        // 0.9 MB stored plus 0.5 MB incoming exceeds the 1 MB quota
        let status = put("b", vec![3u8; MB / 2]).await.unwrap().status();
        assert_eq!(status, reqwest::StatusCode::INSUFFICIENT_STORAGE);

        let status = put("empty", Vec::new()).await.unwrap().status();
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);

        assert_eq!(
            context.storage.stored_bytes().await.unwrap(),
            (MB * 9 / 10) as u64
        );
        assert!(!context.storage.has_message("b").unwrap());
        assert!(!context.storage.has_message("big").unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_from_live_seed() {
        let seed_dir = tempfile::tempdir().unwrap();
        let seed = NodeContext::init(settings(&seed_dir), http()).unwrap();
        let seed_address = serve(&seed).await;
        seed.registry.add_storage_node(&Node::new(seed_address.as_str(), 1)).unwrap();
        seed.registry.add_coordinator_node(&Node::new("coordinator:1", 1)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir);
        settings.bootstrap_node = Some(seed_address.clone());
        let context = NodeContext::init(settings, http()).unwrap();

        context.bootstrapper().run().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while context.registry.list_coordinator_nodes().unwrap().is_empty()
                || context.registry.list_storage_nodes(None).unwrap().is_empty()
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let storage_nodes = context.registry.list_storage_nodes(None).unwrap();
        assert_eq!(storage_nodes.len(), 1);
        // The seed answers its own ping
        assert!(storage_nodes[0].is_reachable());
    }
}
