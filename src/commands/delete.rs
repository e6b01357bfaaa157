//! `delete` command: remove a session locally and remotely

use colored::Colorize;

use super::Workspace;
use crate::error::Result;

/// Deletes the session at `index` and saves
///
/// # Errors
///
/// Returns error if the index is invalid, the remote delete fails or
/// state cannot be saved
pub async fn run(workspace: &Workspace, index: usize) -> Result<()> {
    let undo = workspace.engine().delete_session(index).await?;
    workspace.save()?;
    println!(
        "{}",
        format!("Deleted session {} ({})", index, undo.session_id()).green()
    );
    Ok(())
}
