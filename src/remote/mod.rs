//! Remote chat-history provider
//!
//! The remote is the source of truth for synced chats. It exposes a full
//! snapshot of chats and messages, a server-side title generator and chat
//! deletion.

pub mod fake;
pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatMetadata;
use crate::error::Result;

pub use fake::InMemoryRemote;
pub use http::HttpRemote;

/// A chat as returned by the remote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteChatRecord {
    /// Correlation id
    pub id: String,
    /// Chat name
    pub name: String,
    /// Creation time
    pub created_at: String,
    /// Last update time
    pub updated_at: String,
    /// Soft-delete marker
    pub deleted_at: Option<String>,
    /// Parent message, when branched
    pub parent_message_id: Option<String>,
    /// Owner
    pub user_id: String,
}

impl RemoteChatRecord {
    /// Metadata of the chat without its id
    pub fn metadata(&self) -> ChatMetadata {
        ChatMetadata {
            name: self.name.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            deleted_at: self.deleted_at.clone(),
            parent_message_id: self.parent_message_id.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// A message as returned by the remote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteMessageRecord {
    /// Message id
    pub id: String,
    /// Correlation id of the owning chat
    pub chat_id: String,
    /// Author role ("user" or a model role)
    pub role: String,
    /// Message text
    pub text: String,
    /// Creation time
    pub created_at: String,
    /// Last update time
    pub updated_at: String,
    /// Model that produced the message
    pub model_id: String,
    /// Whether the message was regenerated
    pub regenerated: bool,
    /// Owner
    pub user_id: String,
}

impl RemoteMessageRecord {
    /// Creation time, or the epoch when the remote sent an unparseable value
    pub fn timestamp(&self) -> DateTime<Utc> {
        parse_remote_time(&self.created_at).unwrap_or_default()
    }
}

/// Parses an RFC 3339 timestamp, or a naive ISO timestamp taken as UTC
///
/// # Examples
///
/// ```
/// use chatweave::remote::parse_remote_time;
///
/// assert!(parse_remote_time("2024-03-01T10:00:00Z").is_some());
/// assert!(parse_remote_time("2024-03-01T10:00:00.123456").is_some());
/// assert!(parse_remote_time("yesterday").is_none());
/// ```
pub fn parse_remote_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Full remote state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSnapshot {
    /// All chats
    pub chats: Vec<RemoteChatRecord>,
    /// All messages of all chats
    pub messages: Vec<RemoteMessageRecord>,
}

impl SyncSnapshot {
    /// Chat metadata keyed by correlation id
    pub fn chat_map(&self) -> HashMap<String, ChatMetadata> {
        self.chats
            .iter()
            .map(|chat| (chat.id.clone(), chat.metadata()))
            .collect()
    }
}

/// Remote chat-history provider
#[async_trait]
pub trait RemoteChatProvider: Send + Sync {
    /// Fetches every chat and message
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    async fn fetch_all(&self) -> Result<SyncSnapshot>;

    /// Asks the remote to name the chat; returns the new name
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    async fn autorename(&self, chat_id: &str) -> Result<String>;

    /// Deletes the chat
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    async fn delete(&self, chat_id: &str) -> Result<()>;
}
