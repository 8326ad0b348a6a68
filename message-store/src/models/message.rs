//! Message model for persistence.
//!
//! Serialized as JSON under `message:<id>` by the key-value store and mapped to
//! the `messages` table by the SQLite store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the set holding the key of every live message.
pub const MESSAGES_SET: &str = "messages";

/// Prefix of a message's primary key.
pub const MESSAGE_KEY_PREFIX: &str = "message:";

/// Primary key of the message with the given id, e.g. `message:0190...`.
pub fn message_key(id: Uuid) -> String {
    format!("{}{}", MESSAGE_KEY_PREFIX, id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Creates a new message with a time-ordered (v7) id; both timestamps are now.
    pub fn new(user_id: Uuid, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            text: text.into(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Replaces the text and refreshes `updated_at`, which never moves backwards.
    pub fn revise(&mut self, text: impl Into<String>) {
        let now = Utc::now();
        self.text = text.into();
        self.updated_at = Some(match self.updated_at {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    pub fn key(&self) -> String {
        message_key(self.id)
    }
}
