//! chatweave - conversation memory and session sync library
//!
//! This library keeps a local list of chat sessions for an LLM chat client,
//! assembles the context sent with every request, folds long history into
//! a running summary and reconciles sessions with a remote chat history.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `chat`: Messages, sessions, model catalog, templates and prompts
//! - `context`: Context window assembly under a token budget
//! - `summarize`: Title and memory compression planning
//! - `sync`: Remote message grouping and session reconciliation
//! - `store`: Application state, persisted state and migrations
//! - `providers`: Model client abstraction and implementations
//! - `remote`: Remote chat history provider
//! - `engine`: Composition root running turns, sync and deletion
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatweave::{ChatEngine, ChatStore, Config};
//! use chatweave::providers::OpenAiClient;
//! use chatweave::remote::HttpRemote;
//! use chatweave::store::StateFile;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/chatweave.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let file = StateFile::new(config.state.resolved_path());
//!     let store = ChatStore::new(file.load(&config.model)?, config.model.clone());
//!     let engine = ChatEngine::new(
//!         store,
//!         Arc::new(OpenAiClient::new(&config.model_client)?),
//!         Arc::new(HttpRemote::new(&config.remote)?),
//!         &config.app,
//!     );
//!     engine.on_user_input("Hello", &[]).await?;
//!     file.save(&engine.store().snapshot())?;
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod controller;
pub mod engine;
pub mod error;
pub mod providers;
pub mod remote;
pub mod store;
pub mod summarize;
pub mod sync;
pub mod tokens;

// Re-export commonly used types
pub use chat::{ChatMessage, ChatSession, ModelConfig};
pub use config::Config;
pub use engine::{ChatEngine, EngineOptions};
pub use error::{ChatweaveError, Result};
pub use store::ChatStore;

#[cfg(test)]
pub mod test_utils;
