//! Test utilities for chatweave
//!
//! Builders for remote records, sessions and engines wired to the in-memory
//! doubles.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use crate::chat::{ChatMessage, ChatSession, ModelConfig};
use crate::config::AppConfig;
use crate::engine::{ChatEngine, EngineOptions};
use crate::providers::ScriptedModelClient;
use crate::remote::{InMemoryRemote, RemoteChatRecord, RemoteMessageRecord};
use crate::store::{ChatState, ChatStore};

/// Remote chat with `id` and `name`
pub fn chat_record(id: &str, name: &str) -> RemoteChatRecord {
    RemoteChatRecord {
        id: id.to_string(),
        name: name.to_string(),
        created_at: "2024-05-01T10:00:00Z".to_string(),
        updated_at: "2024-05-01T10:00:00Z".to_string(),
        user_id: "user-1".to_string(),
        ..Default::default()
    }
}

/// Remote message created `minute` minutes after a fixed base time
pub fn message_record(
    id: &str,
    chat_id: &str,
    role: &str,
    text: &str,
    minute: u32,
) -> RemoteMessageRecord {
    let created = Utc
        .with_ymd_and_hms(2024, 5, 1, 10, minute, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339();
    RemoteMessageRecord {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        role: role.to_string(),
        text: text.to_string(),
        created_at: created.clone(),
        updated_at: created,
        ..Default::default()
    }
}

/// Alternating user/assistant conversation of `turns` exchanges for `chat_id`
pub fn conversation(chat_id: &str, turns: u32) -> Vec<RemoteMessageRecord> {
    (0..turns)
        .flat_map(|i| {
            vec![
                message_record(&format!("{}-u{}", chat_id, i), chat_id, "user", &format!("q{}", i), i * 2),
                message_record(
                    &format!("{}-a{}", chat_id, i),
                    chat_id,
                    "assistant",
                    &format!("a{}", i),
                    i * 2 + 1,
                ),
            ]
        })
        .collect()
}

/// Session bound to `chat_id` holding `count` user messages
pub fn session_with(chat_id: &str, count: usize) -> ChatSession {
    let mut session = ChatSession::new(ModelConfig::default());
    session.chat_id = chat_id.to_string();
    session.messages = (0..count)
        .map(|i| ChatMessage::user(format!("m{}", i)))
        .collect();
    session
}

/// Store holding `sessions` in order
pub fn store_with(sessions: Vec<ChatSession>) -> ChatStore {
    let config = ModelConfig::default();
    let mut state = ChatState::new(&config);
    if !sessions.is_empty() {
        state.sessions = sessions;
    }
    ChatStore::new(state, config)
}

/// Engine with automatic triggers disabled
pub fn manual_engine(
    store: ChatStore,
    client: &ScriptedModelClient,
    remote: &InMemoryRemote,
) -> ChatEngine {
    ChatEngine::new(
        store,
        Arc::new(client.clone()),
        Arc::new(remote.clone()),
        &AppConfig::default(),
    )
    .with_options(EngineOptions::manual())
}
