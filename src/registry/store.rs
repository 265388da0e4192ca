//! SQLite-backed Node Registry
//!
//! Both role collections live in one database (`coordinator.db`). The connection is
//! held behind a mutex, which serializes every write and makes the primary-key check
//! on insert the single source of truth for address uniqueness.

use super::types::{Node, NodeRole};
use crate::error::{NodeError, Result};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::time::Duration;

pub struct NodeRegistry {
    conn: Mutex<Connection>,
}

impl NodeRegistry {
    /// Opens (or creates) the registry database at `path` and ensures the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS storage_nodes (
                address TEXT NOT NULL PRIMARY KEY,
                last_ping TEXT NOT NULL,
                ping INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS coordinator_nodes (
                address TEXT NOT NULL PRIMARY KEY,
                last_ping TEXT NOT NULL,
                ping INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts a node under `role`. Fails with `Conflict` if the address is known.
    pub fn add_node(&self, role: NodeRole, node: &Node) -> Result<()> {
        let conn = self.conn.lock();
        let sql = format!(
            "INSERT INTO {} (address, last_ping, ping) VALUES (?1, ?2, ?3)",
            role.table()
        );

        match conn.execute(
            &sql,
            params![node.address, node.last_ping.to_rfc3339(), node.ping],
        ) {
            Ok(_) => {
                tracing::debug!("Added {} {} (ping {})", role, node.address, node.ping);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(NodeError::Conflict(format!(
                    "{} {} already registered",
                    role, node.address
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn add_storage_node(&self, node: &Node) -> Result<()> {
        self.add_node(NodeRole::Storage, node)
    }

    pub fn add_coordinator_node(&self, node: &Node) -> Result<()> {
        self.add_node(NodeRole::Coordinator, node)
    }

    /// Lists nodes of `role`, at most `limit` of them when a limit is given.
    pub fn list_nodes(&self, role: NodeRole, limit: Option<usize>) -> Result<Vec<Node>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT address, last_ping, ping FROM {} LIMIT ?1",
            role.table()
        );
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            let (address, last_ping, ping) = row?;
            nodes.push(Node {
                address,
                last_ping: parse_timestamp(&last_ping),
                ping,
            });
        }
        Ok(nodes)
    }

    pub fn list_storage_nodes(&self, limit: Option<usize>) -> Result<Vec<Node>> {
        self.list_nodes(NodeRole::Storage, limit)
    }

    pub fn list_coordinator_nodes(&self) -> Result<Vec<Node>> {
        self.list_nodes(NodeRole::Coordinator, None)
    }

    /// Draws up to `n` nodes of `role` in no particular order.
    pub fn random_nodes(&self, role: NodeRole, n: usize) -> Result<Vec<Node>> {
        let nodes = self.list_nodes(role, None)?;
        let mut rng = rand::thread_rng();
        Ok(nodes.choose_multiple(&mut rng, n).cloned().collect())
    }

    pub fn random_coordinator_nodes(&self, n: usize) -> Result<Vec<Node>> {
        self.random_nodes(NodeRole::Coordinator, n)
    }

    pub fn random_storage_nodes(&self, n: usize) -> Result<Vec<Node>> {
        self.random_nodes(NodeRole::Storage, n)
    }

    /// Refreshes latency and timestamp of an already registered node.
    pub fn update_ping(&self, role: NodeRole, address: &str, ping: i64) -> Result<()> {
        let conn = self.conn.lock();
        let sql = format!(
            "UPDATE {} SET last_ping = ?1, ping = ?2 WHERE address = ?3",
            role.table()
        );
        let updated = conn.execute(&sql, params![Utc::now().to_rfc3339(), ping, address])?;
        if updated == 0 {
            return Err(NodeError::NotFound(format!("{} {}", role, address)));
        }
        Ok(())
    }

    pub fn count(&self, role: NodeRole) -> Result<usize> {
        let conn = self.conn.lock();
        let sql = format!("SELECT COUNT(*) FROM {}", role.table());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Empties both collections in one transaction.
    pub fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM storage_nodes", [])?;
        tx.execute("DELETE FROM coordinator_nodes", [])?;
        tx.commit()?;
        tracing::info!("Cleared node registry");
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!("Unreadable timestamp '{}' in registry: {}", raw, e);
            DateTime::<Utc>::default()
        })
}
