use crate::error::{NodeError, Result};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Status of a message nobody has confirmed yet.
pub const STATUS_UNVERIFIED: i64 = 0;
/// Status a coordinator reports once the message reached its recipient.
pub const STATUS_DELIVERED: i64 = 1;

/// Tracking record of a stored message, without its content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub received_on: DateTime<Utc>,
    pub expires_on: DateTime<Utc>,
    pub last_checked_on: Option<DateTime<Utc>>,
    pub verification_status: i64,
}

impl MessageRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_on <= now
    }

    /// True if the message was never checked or its last check is at least `interval` old.
    pub fn is_due_for_check(&self, interval: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.last_checked_on {
            Some(checked) => now - checked >= interval,
            None => true,
        }
    }
}

/// A stored message as served by `GET /storage/get/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(with = "content_base64")]
    pub content: Vec<u8>,
    pub received_on: DateTime<Utc>,
    pub expires_on: DateTime<Utc>,
    pub last_checked_on: Option<DateTime<Utc>>,
    pub verification_status: i64,
}

impl Message {
    pub fn from_record(record: MessageRecord, content: Vec<u8>) -> Self {
        Self {
            id: record.id,
            content,
            received_on: record.received_on,
            expires_on: record.expires_on,
            last_checked_on: record.last_checked_on,
            verification_status: record.verification_status,
        }
    }
}

/// Turns a caller-supplied message id into a slug: every character outside
/// `[A-Za-z0-9]` becomes `-`.
pub fn sanitize_message_id(raw: &str) -> Result<String> {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new("[^A-Za-z0-9]").expect("valid regex"));

    let slug = re.replace_all(raw, "-").into_owned();
    if slug.is_empty() {
        return Err(NodeError::InvalidInput("Empty message ID".to_string()));
    }
    Ok(slug)
}

mod content_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(content: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(content))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
