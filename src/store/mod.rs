//! Application state of the chat client
//!
//! [`ChatStore`] owns the session list. Every mutation goes through
//! [`ChatStore::update`], which applies an updater to a copy of the latest
//! state and commits the copy under the write lock, so updates from
//! concurrent tasks are never lost. After every update the session list is
//! non-empty and the current index points into it.

pub mod persisted;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::{ChatMessage, ChatMetadata, ChatSession, MaskPreset, ModelConfig};
use crate::error::{ChatweaveError, Result};

pub use persisted::{migrate, PersistedState, StateFile, STATE_VERSION};

/// Sessions, the current selection and remote chat metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    /// Sessions, most recent first
    #[serde(default)]
    pub sessions: Vec<ChatSession>,
    /// Index of the current session
    #[serde(default)]
    pub current_session_index: usize,
    /// Remote chat metadata by correlation id
    #[serde(default)]
    pub chats: HashMap<String, ChatMetadata>,
}

impl ChatState {
    /// State with a single empty session
    pub fn new(model_config: &ModelConfig) -> Self {
        Self {
            sessions: vec![ChatSession::new(model_config.clone())],
            current_session_index: 0,
            chats: HashMap::new(),
        }
    }

    /// Restores the invariants: a non-empty session list, a valid current
    /// index and per-session indices within the message list
    pub fn normalize(&mut self, model_config: &ModelConfig) {
        if self.sessions.is_empty() {
            self.sessions.push(ChatSession::new(model_config.clone()));
        }
        if self.current_session_index >= self.sessions.len() {
            self.current_session_index = self.sessions.len() - 1;
        }
        for session in &mut self.sessions {
            session.clamp_indices();
        }
    }

    /// The current session
    pub fn current(&self) -> Option<&ChatSession> {
        self.sessions.get(self.current_session_index)
    }

    /// Mutable access to the current session
    pub fn current_mut(&mut self) -> Option<&mut ChatSession> {
        self.sessions.get_mut(self.current_session_index)
    }

    /// Position of the session with `session_id`
    pub fn position(&self, session_id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == session_id)
    }

    /// Mutable access to a session by id
    pub fn session_mut(&mut self, session_id: &str) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }

    /// Session at `index`, or `InvalidIndex`
    pub fn session_at(&self, index: usize) -> Result<&ChatSession> {
        self.sessions.get(index).ok_or_else(|| {
            ChatweaveError::InvalidIndex {
                index,
                len: self.sessions.len(),
            }
            .into()
        })
    }
}

/// Shared handle to the application state
///
/// Cloning the store clones the handle, not the state.
#[derive(Debug, Clone)]
pub struct ChatStore {
    state: Arc<RwLock<ChatState>>,
    model_config: ModelConfig,
}

impl ChatStore {
    /// Store over `state`; `model_config` seeds sessions created to keep
    /// the list non-empty
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::chat::ModelConfig;
    /// use chatweave::store::{ChatState, ChatStore};
    ///
    /// let config = ModelConfig::default();
    /// let store = ChatStore::new(ChatState::new(&config), config);
    /// assert_eq!(store.snapshot().sessions.len(), 1);
    /// ```
    pub fn new(mut state: ChatState, model_config: ModelConfig) -> Self {
        state.normalize(&model_config);
        Self {
            state: Arc::new(RwLock::new(state)),
            model_config,
        }
    }

    /// Model configuration of new sessions
    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ChatState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `updater` to the latest state and commits the result
    ///
    /// The updater works on a copy; the copy replaces the state once the
    /// updater returns, after the invariants are restored.
    pub fn update<R>(&self, updater: impl FnOnce(&mut ChatState) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let result = updater(&mut next);
        next.normalize(&self.model_config);
        *guard = next;
        result
    }

    /// Like [`ChatStore::update`], but commits only when the updater succeeds
    pub fn try_update<R>(&self, updater: impl FnOnce(&mut ChatState) -> Result<R>) -> Result<R> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let result = updater(&mut next)?;
        next.normalize(&self.model_config);
        *guard = next;
        Ok(result)
    }

    /// Replaces the whole state
    pub fn restore(&self, state: ChatState) {
        self.update(move |current| *current = state);
    }

    /// Creates an empty session at the top of the list and selects it
    ///
    /// With a preset, the session takes the preset's context and its
    /// model overrides laid over `global`; otherwise an empty mask over
    /// `global`.
    pub fn new_session(&self, preset: Option<MaskPreset>, global: &ModelConfig) -> String {
        let mut session = ChatSession::new(global.clone());
        if let Some(preset) = preset {
            session.mask = preset.into_mask(global);
        }
        let id = session.id.clone();
        self.update(|state| {
            state.sessions.insert(0, session);
            state.current_session_index = 0;
        });
        debug!(session_id = %id, "Created session");
        id
    }

    /// Selects the session at `index`
    pub fn select_session(&self, index: usize) -> Result<()> {
        self.try_update(|state| {
            state.session_at(index)?;
            state.current_session_index = index;
            Ok(())
        })
    }

    /// Moves the selection by `delta`, wrapping around
    pub fn next_session(&self, delta: isize) {
        self.update(|state| {
            let len = state.sessions.len() as isize;
            let index = (state.current_session_index as isize + delta).rem_euclid(len);
            state.current_session_index = index as usize;
        });
    }

    /// Moves a session from `from` to `to`; the selection follows its session
    pub fn move_session(&self, from: usize, to: usize) -> Result<()> {
        self.try_update(|state| {
            state.session_at(from)?;
            state.session_at(to)?;
            let old = state.current_session_index;
            let session = state.sessions.remove(from);
            state.sessions.insert(to, session);

            state.current_session_index = if old == from {
                to
            } else if old > from && old <= to {
                old - 1
            } else if old < from && old >= to {
                old + 1
            } else {
                old
            };
            Ok(())
        })
    }

    /// Copy of the current session
    pub fn current_session(&self) -> ChatSession {
        let state = self.snapshot();
        let index = state.current_session_index.min(state.sessions.len().saturating_sub(1));
        state
            .sessions
            .get(index)
            .cloned()
            .unwrap_or_else(|| ChatSession::new(self.model_config.clone()))
    }

    /// Copy of the session with `session_id`
    pub fn session(&self, session_id: &str) -> Result<ChatSession> {
        self.snapshot()
            .sessions
            .into_iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| ChatweaveError::SessionNotFound(session_id.to_string()).into())
    }

    /// Applies `updater` to the current session
    pub fn update_current_session<R>(&self, updater: impl FnOnce(&mut ChatSession) -> R) -> Option<R> {
        self.update(|state| state.current_mut().map(updater))
    }

    /// Applies `updater` to the session with `session_id`
    pub fn update_session<R>(
        &self,
        session_id: &str,
        updater: impl FnOnce(&mut ChatSession) -> R,
    ) -> Result<R> {
        self.try_update(|state| {
            let session = state
                .session_mut(session_id)
                .ok_or_else(|| ChatweaveError::SessionNotFound(session_id.to_string()))?;
            Ok(updater(session))
        })
    }

    /// Applies `updater` to one message of a session
    pub fn update_message<R>(
        &self,
        session_id: &str,
        message_id: &str,
        updater: impl FnOnce(&mut ChatMessage) -> R,
    ) -> Result<R> {
        self.try_update(|state| {
            let session = state
                .session_mut(session_id)
                .ok_or_else(|| ChatweaveError::SessionNotFound(session_id.to_string()))?;
            let message = session.message_mut(message_id).ok_or_else(|| {
                ChatweaveError::SessionNotFound(format!("{}/{}", session_id, message_id))
            })?;
            Ok(updater(message))
        })
    }

    /// Clears messages and memory of the current session
    pub fn reset_session(&self) {
        self.update_current_session(|session| {
            session.messages.clear();
            session.memory_prompt.clear();
            session.last_summarize_index = 0;
            session.clear_context_index = None;
        });
    }

    /// Drops every session, leaving one fresh session
    pub fn clear_sessions(&self) {
        let model_config = self.model_config.clone();
        self.update(|state| {
            state.sessions = vec![ChatSession::new(model_config)];
            state.current_session_index = 0;
        });
    }

    /// Replaces the remote chat metadata
    pub fn set_chats(&self, chats: HashMap<String, ChatMetadata>) {
        self.update(|state| state.chats = chats);
    }

    /// Adds the message's characters to the session statistics
    pub fn update_stat(&self, session_id: &str, message: &ChatMessage) -> Result<()> {
        let chars = message.content.char_count();
        self.update_session(session_id, |session| {
            session.stat.char_count += chars;
        })
    }

    /// Removes the session at `index`, returning the state before removal
    ///
    /// The selection moves up when a session above it is removed. Removing
    /// the only session replaces it with a fresh one.
    pub fn remove_session(&self, index: usize) -> Result<ChatState> {
        let model_config = self.model_config.clone();
        self.try_update(|state| {
            state.session_at(index)?;
            let prior = state.clone();
            state.sessions.remove(index);

            let current = state.current_session_index;
            if state.sessions.is_empty() {
                state.sessions.push(ChatSession::new(model_config));
                state.current_session_index = 0;
            } else {
                let shifted = current - usize::from(index < current);
                state.current_session_index = shifted.min(state.sessions.len() - 1);
            }
            Ok(prior)
        })
    }
}
