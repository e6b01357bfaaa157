//! `chat` command: run one streamed turn

use std::io::Write;

use colored::Colorize;

use super::Workspace;
use crate::error::Result;
use crate::providers::GenerationOutcome;

/// Prints the part of a cumulative text that was not printed yet
#[derive(Debug, Default)]
struct DeltaPrinter {
    printed: usize,
}

impl DeltaPrinter {
    fn delta<'a>(&mut self, cumulative: &'a str) -> Option<&'a str> {
        let fresh = cumulative.get(self.printed..)?;
        self.printed = cumulative.len();
        (!fresh.is_empty()).then_some(fresh)
    }
}

/// Sends `prompt` and streams the reply to stdout
///
/// Ctrl-C stops the generation. After a completed turn the session's title
/// and memory are summarized before the state is saved.
///
/// # Arguments
///
/// * `workspace` - Loaded workspace
/// * `prompt` - Message text
/// * `images` - Image URLs to attach
/// * `session` - Session index to select first
/// * `new` - Start a new session instead
///
/// # Errors
///
/// Returns error if the session cannot be selected or state cannot be saved
pub async fn run(
    workspace: &Workspace,
    prompt: &str,
    images: &[String],
    session: Option<usize>,
    new: bool,
) -> Result<()> {
    let engine = workspace.engine();
    let store = engine.store();
    if new {
        store.new_session(None, store.model_config());
    } else if let Some(index) = session {
        store.select_session(index)?;
    }
    let session_id = store.current_session().id;

    let stopper = engine.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop_all();
        }
    });

    let mut printer = DeltaPrinter::default();
    let outcome = engine
        .on_user_input_with(prompt, images, |partial| {
            if let Some(delta) = printer.delta(partial) {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            }
        })
        .await?;
    interrupt.abort();

    match &outcome {
        GenerationOutcome::Completed(text) => {
            if let Some(rest) = printer.delta(text) {
                print!("{}", rest);
            }
            println!();
            engine.summarize_session(&session_id).await;
        }
        GenerationOutcome::Failed(error) => {
            println!();
            eprintln!("{} {}", "Generation failed:".red(), error);
        }
        GenerationOutcome::Aborted => {
            println!();
            eprintln!("{}", "Generation stopped".yellow());
        }
    }

    workspace.save()
}
