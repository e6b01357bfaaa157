//! Chat engine
//!
//! [`ChatEngine`] wires the session store, the model client, the remote
//! history provider and the token estimator together. It runs user turns,
//! the post-turn hooks (remote rename and summarization), syncing and
//! session deletion with undo.
//!
//! The engine is cheap to clone; clones share all state. Background
//! summarization runs on a clone moved into a spawned task.

mod lifecycle;
mod summary;
mod turn;

pub use lifecycle::DeleteUndo;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chat::{ChatSession, TemplateVars};
use crate::config::AppConfig;
use crate::context::{assemble, AssembledContext};
use crate::controller::ControllerPool;
use crate::error::Result;
use crate::providers::ModelClient;
use crate::remote::RemoteChatProvider;
use crate::store::ChatStore;
use crate::summarize::SummarizeSettings;
use crate::tokens::{TokenEstimator, WeightedCharEstimator};

/// Switches for the automatic post-turn work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Ask the remote for a chat name after a turn and during sync
    pub auto_rename: bool,
    /// Spawn title generation and memory compression after a turn
    pub auto_summarize: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            auto_rename: true,
            auto_summarize: true,
        }
    }
}

impl EngineOptions {
    /// Options with every automatic trigger disabled
    pub fn manual() -> Self {
        Self {
            auto_rename: false,
            auto_summarize: false,
        }
    }
}

/// Composition root of the chat runtime
#[derive(Clone)]
pub struct ChatEngine {
    store: ChatStore,
    client: Arc<dyn ModelClient>,
    remote: Arc<dyn RemoteChatProvider>,
    estimator: Arc<dyn TokenEstimator>,
    pool: ControllerPool,
    settings: Arc<SummarizeSettings>,
    lang: String,
    undo_window: Duration,
    options: EngineOptions,
    titling: Arc<Mutex<HashSet<String>>>,
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("options", &self.options)
            .field("lang", &self.lang)
            .field("undo_window", &self.undo_window)
            .field("pending", &self.pool.len())
            .finish()
    }
}

impl ChatEngine {
    /// Creates an engine over `store`
    ///
    /// Uses [`WeightedCharEstimator`] and [`EngineOptions::default`].
    ///
    /// # Arguments
    ///
    /// * `store` - Session store
    /// * `client` - Model backend
    /// * `remote` - Remote chat history
    /// * `app` - Application configuration
    pub fn new(
        store: ChatStore,
        client: Arc<dyn ModelClient>,
        remote: Arc<dyn RemoteChatProvider>,
        app: &AppConfig,
    ) -> Self {
        Self {
            store,
            client,
            remote,
            estimator: Arc::new(WeightedCharEstimator),
            pool: ControllerPool::new(),
            settings: Arc::new(app.summarize_settings()),
            lang: app.lang.clone(),
            undo_window: app.undo_window(),
            options: EngineOptions::default(),
            titling: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replaces the token estimator
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Replaces the automatic trigger switches
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Session store
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Registry of in-flight generations
    pub fn pool(&self) -> &ControllerPool {
        &self.pool
    }

    /// Automatic trigger switches
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Cancels the generation streaming into `message_id`
    pub fn stop(&self, session_id: &str, message_id: &str) -> bool {
        self.pool.stop(session_id, message_id)
    }

    /// Cancels every generation in flight
    pub fn stop_all(&self) {
        self.pool.stop_all();
    }

    /// Context the next request of the session at `index` would send
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` when `index` is out of range
    pub fn context_at(&self, index: usize) -> Result<AssembledContext> {
        let state = self.store.snapshot();
        let session = state.session_at(index)?;
        Ok(self.context_for(session))
    }

    pub(crate) fn context_for(&self, session: &ChatSession) -> AssembledContext {
        let vars = self.template_vars(&session.model_config().model);
        assemble(session, self.estimator.as_ref(), &vars)
    }

    pub(crate) fn template_vars(&self, model: &str) -> TemplateVars {
        let provider = self.settings.catalog.provider_name(model);
        TemplateVars::new(model, &provider, &self.lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ModelConfig};
    use crate::providers::ScriptedModelClient;
    use crate::remote::InMemoryRemote;
    use crate::store::ChatState;

    #[test]
    fn test_default_options_enable_triggers() {
        let options = EngineOptions::default();
        assert!(options.auto_rename && options.auto_summarize);
        assert_eq!(
            EngineOptions::manual(),
            EngineOptions {
                auto_rename: false,
                auto_summarize: false
            }
        );
    }

    #[test]
    fn test_context_at_uses_session_config() {
        let config = ModelConfig::default();
        let store = ChatStore::new(ChatState::new(&config), config);
        store.update_current_session(|s| {
            s.mask.model_config.model = "claude-3-haiku".to_string();
            s.messages.push(ChatMessage::user("hello"));
        });
        let engine = ChatEngine::new(
            store,
            Arc::new(ScriptedModelClient::default()),
            Arc::new(InMemoryRemote::default()),
            &AppConfig::default(),
        );

        let context = engine.context_at(0).unwrap();
        assert!(context.system.is_none());
        assert_eq!(context.recent.len(), 1);
        assert!(engine.context_at(3).is_err());
    }
}
