use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chatweave::chat::{ChatMessage, ChatSession, ModelConfig};
use chatweave::config::AppConfig;
use chatweave::providers::ScriptedModelClient;
use chatweave::remote::{InMemoryRemote, RemoteChatRecord, RemoteMessageRecord};
use chatweave::store::ChatState;
use chatweave::tokens::TokenEstimator;
use chatweave::{ChatEngine, ChatStore, EngineOptions};
use tempfile::TempDir;

/// Every text costs the same number of tokens
#[allow(dead_code)]
pub struct FixedEstimator(pub usize);

impl TokenEstimator for FixedEstimator {
    fn estimate(&self, _text: &str) -> usize {
        self.0
    }
}

#[allow(dead_code)]
pub fn chat(id: &str, name: &str) -> RemoteChatRecord {
    RemoteChatRecord {
        id: id.to_string(),
        name: name.to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn message(id: &str, chat_id: &str, role: &str, second: u32) -> RemoteMessageRecord {
    RemoteMessageRecord {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        role: role.to_string(),
        text: format!("text of {}", id),
        created_at: format!("2024-01-01T00:00:{:02}Z", second),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn session(chat_id: &str, texts: &[&str]) -> ChatSession {
    let mut session = ChatSession::new(ModelConfig::default());
    session.chat_id = chat_id.to_string();
    session.messages = texts.iter().map(|t| ChatMessage::user(*t)).collect();
    session
}

#[allow(dead_code)]
pub fn store(sessions: Vec<ChatSession>) -> ChatStore {
    let config = ModelConfig::default();
    let mut state = ChatState::new(&config);
    if !sessions.is_empty() {
        state.sessions = sessions;
    }
    ChatStore::new(state, config)
}

#[allow(dead_code)]
pub fn engine(
    store: ChatStore,
    client: &ScriptedModelClient,
    remote: &InMemoryRemote,
    estimator: usize,
    options: EngineOptions,
) -> ChatEngine {
    ChatEngine::new(
        store,
        Arc::new(client.clone()),
        Arc::new(remote.clone()),
        &AppConfig::default(),
    )
    .with_estimator(Arc::new(FixedEstimator(estimator)))
    .with_options(options)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("chatweave.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
