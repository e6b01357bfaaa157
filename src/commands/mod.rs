//! Command handlers for chatweave
//!
//! Each handler runs against a [`Workspace`]: the loaded state file plus an
//! engine wired to the configured model endpoint and remote history.
//! Handlers that change state save it before returning.

pub mod chat;
pub mod context;
pub mod delete;
pub mod sessions;
pub mod summarize;
pub mod sync;

use std::sync::Arc;

use crate::config::Config;
use crate::engine::{ChatEngine, EngineOptions};
use crate::error::Result;
use crate::providers::{ModelClient, OpenAiClient};
use crate::remote::{HttpRemote, RemoteChatProvider};
use crate::store::{ChatStore, StateFile};

/// The state file and the engine operating on it
#[derive(Debug, Clone)]
pub struct Workspace {
    file: StateFile,
    engine: ChatEngine,
}

impl Workspace {
    /// Opens the configured state file with the HTTP collaborators
    ///
    /// # Errors
    ///
    /// Returns error if the state file cannot be loaded or a client cannot
    /// be built
    pub fn open(config: &Config) -> Result<Self> {
        let client = OpenAiClient::new(&config.model_client)?;
        let remote = HttpRemote::new(&config.remote)?;
        Self::with_clients(config, Arc::new(client), Arc::new(remote))
    }

    /// Opens the configured state file with the given collaborators
    ///
    /// Background summarization is disabled: a one-shot command would exit
    /// before a spawned task finishes, so handlers run it inline instead.
    ///
    /// # Errors
    ///
    /// Returns error if the state file cannot be loaded
    pub fn with_clients(
        config: &Config,
        client: Arc<dyn ModelClient>,
        remote: Arc<dyn RemoteChatProvider>,
    ) -> Result<Self> {
        let file = StateFile::new(config.state.resolved_path());
        tracing::debug!("Using state file {}", file.path().display());
        let state = file.load(&config.model)?;
        let store = ChatStore::new(state, config.model.clone());
        let engine = ChatEngine::new(store, client, remote, &config.app).with_options(
            EngineOptions {
                auto_rename: true,
                auto_summarize: false,
            },
        );
        Ok(Self { file, engine })
    }

    /// Engine over the loaded state
    pub fn engine(&self) -> &ChatEngine {
        &self.engine
    }

    /// State file backing the workspace
    pub fn file(&self) -> &StateFile {
        &self.file
    }

    /// Writes the current state to the state file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self) -> Result<()> {
        self.file.save(&self.engine.store().snapshot())
    }

    /// Resolves an optional session index to a session id
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` when `index` is out of range
    pub fn session_id(&self, index: Option<usize>) -> Result<String> {
        let state = self.engine.store().snapshot();
        match index {
            Some(index) => Ok(state.session_at(index)?.id.clone()),
            None => Ok(self.engine.store().current_session().id),
        }
    }
}
