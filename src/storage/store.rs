//! Message Store
//!
//! Content lives as one file per message under the messages directory; receipt,
//! expiry and verification state live in the `messages` table of `storage.db`.
//! A message exists only when both agree.
//!
//! ## Quota
//! The quota is checked against the directory's actual size at write time. All
//! writers pass through one async lock, so the check-then-write sequence cannot
//! interleave with another put or delete.

use super::types::{Message, MessageRecord, STATUS_UNVERIFIED};
use crate::error::{NodeError, Result};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub struct MessageStore {
    messages_dir: PathBuf,
    conn: Mutex<Connection>,
    write_lock: tokio::sync::Mutex<()>,
    quota_bytes: u64,
    max_message_bytes: usize,
    max_store_time: chrono::Duration,
}

/// Size and retention limits applied by the store.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub quota_bytes: u64,
    pub max_message_bytes: usize,
    pub max_store_days: u64,
}

impl MessageStore {
    /// Opens the store, creating the messages directory and the tracking table if needed.
    pub fn open(messages_dir: &Path, db_path: &Path, limits: StoreLimits) -> Result<Self> {
        std::fs::create_dir_all(messages_dir)?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT NOT NULL PRIMARY KEY,
                received_on TEXT NOT NULL,
                expires_on TEXT NOT NULL,
                last_checked_on TEXT,
                verification_status INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        Ok(Self {
            messages_dir: messages_dir.to_path_buf(),
            conn: Mutex::new(conn),
            write_lock: tokio::sync::Mutex::new(()),
            quota_bytes: limits.quota_bytes,
            max_message_bytes: limits.max_message_bytes,
            max_store_time: chrono::Duration::days(limits.max_store_days as i64),
        })
    }

    pub fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.messages_dir.join(id)
    }

    /// Persists `content` under `id` and records its receipt and expiry.
    ///
    /// Fails with `Conflict` if the id is taken and with `InsufficientStorage` if the
    /// content would push the messages directory over the quota. On any failure no
    /// file is left behind.
    pub async fn put(&self, id: &str, content: &[u8]) -> Result<MessageRecord> {
        if content.is_empty() {
            return Err(NodeError::InvalidInput(format!(
                "Empty body for message {}",
                id
            )));
        }
        if content.len() > self.max_message_bytes {
            return Err(NodeError::PayloadTooLarge {
                size: content.len(),
                limit: self.max_message_bytes,
            });
        }

        let _guard = self.write_lock.lock().await;

        let blob_path = self.blob_path(id);
        if self.record(id)?.is_some() || tokio::fs::try_exists(&blob_path).await? {
            return Err(NodeError::Conflict(format!("Message {} already stored", id)));
        }

        let used = dir_size(&self.messages_dir).await?;
        let required = used + content.len() as u64;
        if required > self.quota_bytes {
            tracing::warn!(
                "Rejecting message {}: {} bytes used, {} incoming, quota {}",
                id,
                used,
                content.len(),
                self.quota_bytes
            );
            return Err(NodeError::InsufficientStorage {
                required,
                quota: self.quota_bytes,
            });
        }

        write_atomically(&blob_path, content).await?;

        let now = Utc::now();
        let record = MessageRecord {
            id: id.to_string(),
            received_on: now,
            expires_on: now + self.max_store_time,
            last_checked_on: None,
            verification_status: STATUS_UNVERIFIED,
        };

        if let Err(e) = self.insert_record(&record) {
            tracing::error!("Failed to record message {}, removing blob: {}", id, e);
            if let Err(rm) = tokio::fs::remove_file(&blob_path).await {
                tracing::error!("Failed to remove orphaned blob {}: {}", id, rm);
            }
            return Err(e);
        }

        tracing::info!("Stored message {} ({} bytes)", id, content.len());
        Ok(record)
    }

    /// Loads a message. Both the tracking record and the blob must exist.
    pub async fn get(&self, id: &str) -> Result<Message> {
        let record = self
            .record(id)?
            .ok_or_else(|| NodeError::NotFound(format!("Message {}", id)))?;

        let content = match tokio::fs::read(self.blob_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Message {} is tracked but its blob is missing", id);
                return Err(NodeError::NotFound(format!("Message {}", id)));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Message::from_record(record, content))
    }

    /// True if this node holds a tracking record for `id`.
    pub fn has_message(&self, id: &str) -> Result<bool> {
        Ok(self.record(id)?.is_some())
    }

    pub fn record(&self, id: &str) -> Result<Option<MessageRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, received_on, expires_on, last_checked_on, verification_status
                 FROM messages WHERE id = ?1",
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn records(&self) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, received_on, expires_on, last_checked_on, verification_status
             FROM messages",
        )?;
        let rows = stmt.query_map([], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn insert_record(&self, record: &MessageRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO messages (id, received_on, expires_on, last_checked_on, verification_status)
             VALUES (?1, ?2, ?3, NULL, ?4)",
            params![
                record.id,
                record.received_on.to_rfc3339(),
                record.expires_on.to_rfc3339(),
                record.verification_status
            ],
        )?;
        Ok(())
    }

    /// Writes an agreed verification status and stamps the check time.
    pub fn update_verification_status(&self, id: &str, status: i64) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE messages SET verification_status = ?1, last_checked_on = ?2 WHERE id = ?3",
            params![status, Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(NodeError::NotFound(format!("Message {}", id)));
        }
        tracing::debug!("Message {} now has status {}", id, status);
        Ok(())
    }

    /// Removes the blob and the tracking record of `id`.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let removed = {
            let conn = self.conn.lock();
            conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?
        };
        if removed == 0 {
            return Err(NodeError::NotFound(format!("Message {}", id)));
        }

        tracing::info!("Removed message {}", id);
        Ok(())
    }

    /// Ids of messages whose retention has run out at `now`.
    pub fn expired_messages(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.is_expired(now))
            .map(|r| r.id)
            .collect())
    }

    /// Ids of live messages not checked against the coordinators within `interval`.
    pub fn messages_due_for_check(
        &self,
        interval: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| !r.is_expired(now) && r.is_due_for_check(interval, now))
            .map(|r| r.id)
            .collect())
    }

    /// Current size of the messages directory in bytes.
    pub async fn stored_bytes(&self) -> Result<u64> {
        dir_size(&self.messages_dir).await
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let received_on: String = row.get(1)?;
    let expires_on: String = row.get(2)?;
    let last_checked_on: Option<String> = row.get(3)?;

    Ok(MessageRecord {
        id: row.get(0)?,
        received_on: parse_timestamp(&received_on, 1)?,
        expires_on: parse_timestamp(&expires_on, 2)?,
        last_checked_on: last_checked_on
            .as_deref()
            .map(|raw| parse_timestamp(raw, 3))
            .transpose()?,
        verification_status: row.get(4)?,
    })
}

fn parse_timestamp(raw: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Writes to a temporary sibling first so a failed write never leaves a partial blob.
async fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Sums the size of every file below `root`.
async fn dir_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                pending.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }

    Ok(total)
}
