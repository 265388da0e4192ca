//! Node Settings
//!
//! Settings are loaded from `<data-dir>/settings.json` when it exists, overridden by
//! command-line flags, validated, and written back so the next start picks them up.

use crate::error::{NodeError, Result};

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// Seed peer used to rebuild the node registry on startup.
    #[serde(skip)]
    pub bootstrap_node: Option<String>,
    /// Root for messages, databases and the settings file itself.
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Address other nodes use to reach this instance.
    pub remote_address: String,
    /// Address the HTTP interface binds to.
    pub local_address: String,
    /// Message storage quota in MB.
    pub disk_space: u64,
    pub max_workers: usize,
    /// Queue depth at which an additional worker is requested.
    pub queue_max_length: usize,
    /// Largest accepted message body in MB.
    pub message_max_size: u64,
    /// Minimum hours between two status checks of the same message.
    pub message_min_check_delay: u64,
    /// Days a message is kept locally.
    pub message_max_store_time: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bootstrap_node: None,
            data_dir: PathBuf::from("./data"),
            remote_address: "localhost:9123".to_string(),
            local_address: "0.0.0.0:9123".to_string(),
            disk_space: 5000,
            max_workers: 10,
            queue_max_length: 10,
            message_max_size: 100,
            message_min_check_delay: 12,
            message_max_store_time: 7,
        }
    }
}

/// Command-line flags; every flag left unset keeps the persisted value.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsOverrides {
    /// Reinitialize the local node registry from this peer
    #[arg(long = "bootstrap-node")]
    pub bootstrap_node: Option<String>,

    /// Data directory for messages, databases and settings
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Remote address of this instance
    #[arg(long = "remote-address")]
    pub remote_address: Option<String>,

    /// IP and port the node interface listens on
    #[arg(long = "local-address")]
    pub local_address: Option<String>,

    /// Maximum space used to store messages, in MB
    #[arg(long = "disk-space")]
    pub disk_space: Option<u64>,

    /// Maximum number of workers
    #[arg(long = "max-workers")]
    pub max_workers: Option<usize>,

    /// Queue length at which a new worker is spawned
    #[arg(long = "max-queue-length")]
    pub queue_max_length: Option<usize>,

    /// Maximum size of an individual message, in MB
    #[arg(long = "message-max-size")]
    pub message_max_size: Option<u64>,

    /// Minimum hours between checks of the same message against the coordinator network
    #[arg(long = "message-min-check-delay")]
    pub message_min_check_delay: Option<u64>,

    /// Maximum time a message is stored locally, in days
    #[arg(long = "message-max-store-time")]
    pub message_max_store_time: Option<u64>,
}

impl Settings {
    /// Reads the persisted settings (if any) and applies the overrides on top.
    pub fn load(overrides: SettingsOverrides) -> Result<Self> {
        let data_dir = overrides
            .data_dir
            .clone()
            .unwrap_or_else(|| Settings::default().data_dir);

        let mut settings = Self::read_file(&data_dir)?.unwrap_or_default();
        settings.data_dir = data_dir;
        settings.apply(overrides);
        settings.validate()?;

        Ok(settings)
    }

    fn read_file(data_dir: &Path) -> Result<Option<Self>> {
        let path = data_dir.join(SETTINGS_FILE);
        if !path.exists() {
            tracing::info!("No settings file at {}, using defaults", path.display());
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) => {
                tracing::info!("Read settings from {}", path.display());
                Ok(Some(settings))
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(v) = overrides.bootstrap_node {
            self.bootstrap_node = Some(v).filter(|v| !v.trim().is_empty());
        }
        if let Some(v) = overrides.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = overrides.remote_address {
            self.remote_address = v;
        }
        if let Some(v) = overrides.local_address {
            self.local_address = v;
        }
        if let Some(v) = overrides.disk_space {
            self.disk_space = v;
        }
        if let Some(v) = overrides.max_workers {
            self.max_workers = v;
        }
        if let Some(v) = overrides.queue_max_length {
            self.queue_max_length = v;
        }
        if let Some(v) = overrides.message_max_size {
            self.message_max_size = v;
        }
        if let Some(v) = overrides.message_min_check_delay {
            self.message_min_check_delay = v;
        }
        if let Some(v) = overrides.message_max_store_time {
            self.message_max_store_time = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(NodeError::InvalidInput(
                "max-workers must be at least 1".to_string(),
            ));
        }
        if self.queue_max_length == 0 {
            return Err(NodeError::InvalidInput(
                "max-queue-length must be at least 1".to_string(),
            ));
        }
        if self.message_max_size == 0 {
            return Err(NodeError::InvalidInput(
                "message-max-size must be at least 1 MB".to_string(),
            ));
        }
        if self.message_min_check_delay == 0 {
            return Err(NodeError::InvalidInput(
                "message-min-check-delay must be at least 1 hour".to_string(),
            ));
        }
        if self.remote_address.trim().is_empty() {
            return Err(NodeError::InvalidInput(
                "remote-address must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Persists the settings to `<data-dir>/settings.json`.
    pub fn write(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::debug!("Wrote settings to {}", path.display());
        Ok(())
    }

    pub fn disk_quota_bytes(&self) -> u64 {
        self.disk_space * MB
    }

    pub fn message_max_bytes(&self) -> usize {
        (self.message_max_size * MB) as usize
    }

    pub fn messages_dir(&self) -> PathBuf {
        self.data_dir.join("messages")
    }

    pub fn databases_dir(&self) -> PathBuf {
        self.data_dir.join("databases")
    }
}
