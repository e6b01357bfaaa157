//! `sync` command: reconcile with the remote history

use colored::Colorize;

use super::Workspace;
use crate::error::Result;

/// Syncs sessions with the remote and saves the result
///
/// # Errors
///
/// Returns error if the remote cannot be fetched or state cannot be saved
pub async fn run(workspace: &Workspace) -> Result<()> {
    let report = workspace.engine().sync().await?;
    workspace.save()?;

    println!(
        "{} {} updated, {} created, {} removed",
        "Synced:".green(),
        report.updated,
        report.created,
        report.removed
    );
    if report.kept_prior {
        println!(
            "{}",
            "Remote returned no matching chats; local sessions were kept.".yellow()
        );
    }
    Ok(())
}
