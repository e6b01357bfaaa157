//! In-memory remote provider
//!
//! Holds a snapshot in memory and records rename and delete calls. Failures
//! can be switched on per operation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{RemoteChatProvider, RemoteChatRecord, RemoteMessageRecord, SyncSnapshot};
use crate::error::{ChatweaveError, Result};

#[derive(Debug, Default)]
struct RemoteState {
    snapshot: SyncSnapshot,
    names: HashMap<String, String>,
    fail_fetch: bool,
    fail_rename: bool,
    fail_delete: HashSet<String>,
    renamed: Vec<String>,
    deleted: Vec<String>,
}

/// Remote provider backed by memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl InMemoryRemote {
    /// Remote serving `snapshot`
    pub fn new(snapshot: SyncSnapshot) -> Self {
        let remote = Self::default();
        remote.lock().snapshot = snapshot;
        remote
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the served snapshot
    pub fn set_snapshot(&self, snapshot: SyncSnapshot) {
        self.lock().snapshot = snapshot;
    }

    /// Adds a chat to the served snapshot
    pub fn add_chat(&self, chat: RemoteChatRecord, messages: Vec<RemoteMessageRecord>) {
        let mut state = self.lock();
        state.snapshot.chats.push(chat);
        state.snapshot.messages.extend(messages);
    }

    /// Name returned by `autorename` for `chat_id`
    pub fn set_rename(&self, chat_id: impl Into<String>, name: impl Into<String>) {
        self.lock().names.insert(chat_id.into(), name.into());
    }

    /// Makes `fetch_all` fail
    pub fn fail_fetch(&self, fail: bool) {
        self.lock().fail_fetch = fail;
    }

    /// Makes `autorename` fail
    pub fn fail_rename(&self, fail: bool) {
        self.lock().fail_rename = fail;
    }

    /// Makes `delete` fail for `chat_id`
    pub fn fail_delete(&self, chat_id: impl Into<String>) {
        self.lock().fail_delete.insert(chat_id.into());
    }

    /// Chat ids passed to `autorename`, in call order
    pub fn renamed(&self) -> Vec<String> {
        self.lock().renamed.clone()
    }

    /// Chat ids successfully deleted, in call order
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }
}

#[async_trait]
impl RemoteChatProvider for InMemoryRemote {
    async fn fetch_all(&self) -> Result<SyncSnapshot> {
        let state = self.lock();
        if state.fail_fetch {
            return Err(ChatweaveError::Network {
                status: 500,
                message: "Failed to sync messages".to_string(),
            }
            .into());
        }
        Ok(state.snapshot.clone())
    }

    async fn autorename(&self, chat_id: &str) -> Result<String> {
        let mut state = self.lock();
        state.renamed.push(chat_id.to_string());
        if state.fail_rename {
            return Err(ChatweaveError::Network {
                status: 500,
                message: "Error while fetching autorename".to_string(),
            }
            .into());
        }
        let name = state
            .names
            .get(chat_id)
            .cloned()
            .unwrap_or_else(|| format!("Chat {}", chat_id));
        if let Some(chat) = state.snapshot.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.name = name.clone();
        }
        Ok(name)
    }

    async fn delete(&self, chat_id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_delete.contains(chat_id) {
            return Err(ChatweaveError::Network {
                status: 500,
                message: format!("Failed to delete chat {}", chat_id),
            }
            .into());
        }
        state.snapshot.chats.retain(|c| c.id != chat_id);
        state.snapshot.messages.retain(|m| m.chat_id != chat_id);
        state.deleted.push(chat_id.to_string());
        Ok(())
    }
}
