//! Scripted peer network for tests. Unscripted requests fail like a dead peer.

use super::NodeTransport;
use crate::error::{NodeError, Result};
use crate::registry::types::UNREACHABLE_PING;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub address: String,
    pub path: String,
    pub body: Option<Bytes>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    responses: DashMap<(String, String), String>,
    pings: DashMap<String, i64>,
    calls: Mutex<Vec<RecordedCall>>,
    ping_delay: Mutex<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request for `path` on `address` with `body`.
    pub fn respond(&self, address: &str, path: &str, body: &str) {
        self.responses
            .insert((address.to_string(), path.to_string()), body.to_string());
    }

    pub fn set_ping(&self, address: &str, ping: i64) {
        self.pings.insert(address.to_string(), ping);
    }

    /// Every ping waits this long before answering.
    pub fn set_ping_delay(&self, delay: Duration) {
        *self.ping_delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Recorded calls whose path starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.path.starts_with(prefix))
            .collect()
    }

    fn answer(
        &self,
        method: &'static str,
        address: &str,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<String> {
        self.calls.lock().push(RecordedCall {
            method,
            address: address.to_string(),
            path: path.to_string(),
            body,
        });

        self.responses
            .get(&(address.to_string(), path.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| NodeError::Transport(format!("{} {}{} unreachable", method, address, path)))
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn get(&self, address: &str, path: &str) -> Result<String> {
        self.answer("GET", address, path, None)
    }

    async fn post(&self, address: &str, path: &str, body: Bytes) -> Result<String> {
        self.answer("POST", address, path, Some(body))
    }

    async fn ping(&self, address: &str) -> i64 {
        let delay = *self.ping_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.pings
            .get(address)
            .map(|entry| *entry.value())
            .unwrap_or(UNREACHABLE_PING)
    }
}
