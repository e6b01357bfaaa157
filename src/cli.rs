//! Command-line interface definition for chatweave
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to inspect sessions, chat, sync and summarize.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatweave - conversation memory and session sync for LLM chat
///
/// Keeps a local list of chat sessions, assembles the context sent to the
/// model on every turn, compresses long history into memory and mirrors
/// chats from a remote history service.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatweave")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/chatweave.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the state file location
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Override the default model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for chatweave
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List local sessions
    Sessions {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the context that the next request of a session would send
    Context {
        /// Session index (defaults to the current session)
        #[arg(short, long)]
        session: Option<usize>,
    },

    /// Send one message and stream the reply
    Chat {
        /// Message text
        #[arg(short, long)]
        prompt: String,

        /// Image URL to attach (repeatable)
        #[arg(short, long = "image")]
        images: Vec<String>,

        /// Session index (defaults to the current session)
        #[arg(short, long)]
        session: Option<usize>,

        /// Start a new session for this message
        #[arg(long, conflicts_with = "session")]
        new: bool,
    },

    /// Reconcile local sessions with the remote history
    Sync,

    /// Generate a title and compress memory for a session
    Summarize {
        /// Session index (defaults to the current session)
        #[arg(short, long)]
        session: Option<usize>,
    },

    /// Delete a session locally and remotely
    Delete {
        /// Session index
        #[arg(short, long)]
        session: usize,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/chatweave.yaml".to_string()),
            verbose: false,
            state: None,
            model: None,
            command: Commands::Sessions { json: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/chatweave.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Sessions { json: false }));
    }

    #[test]
    fn test_cli_parse_chat_with_images() {
        let cli = Cli::try_parse_from([
            "chatweave",
            "chat",
            "--prompt",
            "what is this?",
            "--image",
            "https://example.com/a.png",
            "--image",
            "https://example.com/b.png",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat {
                prompt,
                images,
                session,
                new,
            } => {
                assert_eq!(prompt, "what is this?");
                assert_eq!(images.len(), 2);
                assert!(session.is_none());
                assert!(!new);
            }
            other => panic!("Expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_chat_requires_prompt() {
        assert!(Cli::try_parse_from(["chatweave", "chat"]).is_err());
    }

    #[test]
    fn test_cli_chat_new_conflicts_with_session() {
        let result =
            Cli::try_parse_from(["chatweave", "chat", "-p", "hi", "--new", "--session", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_delete() {
        let cli = Cli::try_parse_from(["chatweave", "delete", "--session", "2"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete { session: 2 }));
    }

    #[test]
    fn test_cli_global_overrides() {
        let cli = Cli::try_parse_from([
            "chatweave",
            "--state",
            "/tmp/state.json",
            "--model",
            "gpt-4o",
            "-v",
            "sync",
        ])
        .unwrap();
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/state.json")));
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Sync));
    }
}
