//! `summarize` command: title and memory for one session

use colored::Colorize;

use super::Workspace;
use crate::error::Result;

/// Generates a title and compresses memory for a session, then saves
///
/// Unlike the post-turn hook, failures are reported as errors.
///
/// # Errors
///
/// Returns error if the session does not exist, a request fails or state
/// cannot be saved
pub async fn run(workspace: &Workspace, index: Option<usize>) -> Result<()> {
    let session_id = workspace.session_id(index)?;
    let engine = workspace.engine();

    match engine.generate_title(&session_id).await? {
        Some(topic) => println!("{} {}", "Title:".green(), topic),
        None => println!("{}", "No title needed".dimmed()),
    }

    if engine.compress_memory(&session_id).await? {
        let session = engine.store().session(&session_id)?;
        println!("{}", "Memory:".green());
        println!("{}", session.memory_prompt);
    } else {
        println!("{}", "History below the compression threshold".dimmed());
    }

    workspace.save()
}
