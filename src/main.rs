//! chatweave - conversation memory and session sync CLI
//!
#![doc = "chatweave - conversation memory and session sync CLI"]
#![doc = "Main entry point for the chatweave application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatweave::cli::{Cli, Commands};
use chatweave::commands::{self, Workspace};
use chatweave::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/chatweave.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let workspace = Workspace::open(&config)?;

    // Execute command
    match cli.command {
        Commands::Sessions { json } => {
            tracing::debug!("Listing sessions");
            commands::sessions::run(&workspace, json)?;
        }
        Commands::Context { session } => {
            tracing::debug!("Showing context for session {:?}", session);
            commands::context::run(&workspace, session)?;
        }
        Commands::Chat {
            prompt,
            images,
            session,
            new,
        } => {
            tracing::info!("Starting chat turn");
            if !images.is_empty() {
                tracing::debug!("Attaching {} image(s)", images.len());
            }
            commands::chat::run(&workspace, &prompt, &images, session, new).await?;
        }
        Commands::Sync => {
            tracing::info!("Syncing with remote history");
            commands::sync::run(&workspace).await?;
        }
        Commands::Summarize { session } => {
            tracing::info!("Summarizing session");
            commands::summarize::run(&workspace, session).await?;
        }
        Commands::Delete { session } => {
            tracing::info!("Deleting session {}", session);
            commands::delete::run(&workspace, session).await?;
        }
    }

    Ok(())
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "chatweave=debug"
    } else {
        "chatweave=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
