//! Versioned persisted state and migrations
//!
//! On disk the state is `{ "version": <f64>, "state": { sessions,
//! currentSessionIndex, chats } }`. Older versions are upgraded in order:
//!
//! - `< 2`: sessions are rebuilt from their topic and messages with memory
//!   enabled, a history count of 4 and a compression threshold of 1000
//! - `< 3`: every session and message gets a fresh id
//! - `< 3.1`: `enableInjectSystemPrompts` is backfilled from the current
//!   global default where a session lacks it

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::ChatState;
use crate::chat::{new_message_id, ChatMessage, ChatSession, MessageContent, ModelConfig, Role};
use crate::error::{ChatweaveError, Result};

/// Current schema version
pub const STATE_VERSION: f64 = 3.1;

/// State as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Schema version
    pub version: f64,
    /// Application state
    pub state: ChatState,
}

#[derive(Debug, Deserialize)]
struct LegacySession {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    messages: Vec<LegacyMessage>,
}

#[derive(Debug, Deserialize)]
struct LegacyMessage {
    role: Role,
    #[serde(default)]
    content: MessageContent,
}

fn backfill_inject_flag(state: &mut Value, global: &ModelConfig) {
    let Some(sessions) = state.get_mut("sessions").and_then(Value::as_array_mut) else {
        return;
    };
    for session in sessions {
        let config = session
            .get_mut("mask")
            .and_then(|mask| mask.get_mut("modelConfig"))
            .and_then(Value::as_object_mut);
        if let Some(config) = config {
            config
                .entry("enableInjectSystemPrompts")
                .or_insert(Value::Bool(global.enable_inject_system_prompts));
        }
    }
}

fn rebuild_legacy(state: &Value, global: &ModelConfig) -> Result<ChatState> {
    let legacy: Vec<LegacySession> = match state.get("sessions") {
        Some(sessions) => serde_json::from_value(sessions.clone())
            .map_err(|e| ChatweaveError::Migration(format!("unreadable legacy sessions: {}", e)))?,
        None => Vec::new(),
    };

    let sessions = legacy
        .into_iter()
        .map(|old| {
            let mut session = ChatSession::new(global.clone());
            if let Some(topic) = old.topic {
                session.topic = topic;
            }
            session.messages = old
                .messages
                .into_iter()
                .map(|m| ChatMessage::new(m.role, m.content))
                .collect();
            let config = &mut session.mask.model_config;
            config.send_memory = true;
            config.history_message_count = 4;
            config.compress_message_length_threshold = 1000;
            session
        })
        .collect();

    Ok(ChatState {
        sessions,
        current_session_index: 0,
        chats: Default::default(),
    })
}

fn regenerate_ids(state: &mut ChatState) {
    for session in &mut state.sessions {
        session.id = new_message_id();
        for message in &mut session.messages {
            message.id = new_message_id();
        }
    }
}

/// Upgrades a persisted state value written by schema `from_version`
///
/// # Arguments
///
/// * `state` - The `state` object of the persisted JSON
/// * `from_version` - Version recorded next to it
/// * `global` - Current global model configuration
///
/// # Errors
///
/// Returns `Migration` when the value cannot be read as any known version
///
/// # Examples
///
/// ```
/// use chatweave::chat::ModelConfig;
/// use chatweave::store::migrate;
///
/// let old = serde_json::json!({
///     "sessions": [{"topic": "Old", "messages": [{"role": "user", "content": "hi"}]}]
/// });
/// let state = migrate(old, 1.0, &ModelConfig::default()).unwrap();
/// assert_eq!(state.sessions[0].topic, "Old");
/// assert!(state.sessions[0].mask.model_config.send_memory);
/// ```
pub fn migrate(mut state: Value, from_version: f64, global: &ModelConfig) -> Result<ChatState> {
    if from_version < STATE_VERSION {
        info!(from_version, to_version = STATE_VERSION, "Migrating chat state");
    }

    let mut migrated = if from_version < 2.0 {
        rebuild_legacy(&state, global)?
    } else {
        if from_version < 3.1 {
            backfill_inject_flag(&mut state, global);
        }
        serde_json::from_value(state)
            .map_err(|e| ChatweaveError::Migration(format!("unreadable chat state: {}", e)))?
    };

    if from_version < 3.0 {
        regenerate_ids(&mut migrated);
    }

    migrated.normalize(global);
    Ok(migrated)
}

/// JSON file holding the persisted state
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// State file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads, migrates and normalizes the state
    ///
    /// A missing file yields a state with one empty session.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or migrated
    pub fn load(&self, global: &ModelConfig) -> Result<ChatState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No state file, starting fresh");
            return Ok(ChatState::new(global));
        }

        let raw = fs::read_to_string(&self.path)?;
        let value: Value = serde_json::from_str(&raw)?;
        let version = value.get("version").and_then(Value::as_f64).unwrap_or_else(|| {
            warn!(path = %self.path.display(), "State file has no version, assuming oldest");
            0.0
        });
        let state = value.get("state").cloned().unwrap_or(Value::Null);
        if state.is_null() {
            return Err(ChatweaveError::Storage(format!(
                "state file {} has no state object",
                self.path.display()
            ))
            .into());
        }

        migrate(state, version, global)
    }

    /// Writes the state with the current version
    ///
    /// The file is written next to its destination and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written
    pub fn save(&self, state: &ChatState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let persisted = PersistedState {
            version: STATE_VERSION,
            state: state.clone(),
        };
        let body = serde_json::to_string_pretty(&persisted)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), sessions = state.sessions.len(), "Saved chat state");
        Ok(())
    }
}
