//! `context` command: show what the next request would send

use serde::Serialize;

use super::Workspace;
use crate::chat::ChatMessage;
use crate::context::ContextInfo;
use crate::error::Result;

/// JSON shape printed by the command
#[derive(Debug, Serialize)]
pub struct ContextReport {
    /// Session id
    pub session_id: String,
    /// First message index considered
    pub context_start_index: usize,
    /// Token budget of the recent window
    pub info: ContextInfo,
    /// Outgoing messages in order
    pub messages: Vec<ChatMessage>,
}

/// Builds the report for the session at `index` (or the current one)
///
/// # Errors
///
/// Returns `InvalidIndex` when `index` is out of range
pub fn report(workspace: &Workspace, index: Option<usize>) -> Result<ContextReport> {
    let state = workspace.engine().store().snapshot();
    let index = index.unwrap_or(state.current_session_index);
    let context = workspace.engine().context_at(index)?;
    Ok(ContextReport {
        session_id: state.session_at(index)?.id.clone(),
        context_start_index: context.context_start_index,
        info: context.info(),
        messages: context.into_messages(),
    })
}

/// Prints the assembled context as JSON
///
/// # Errors
///
/// Returns error if the session does not exist
pub fn run(workspace: &Workspace, index: Option<usize>) -> Result<()> {
    let report = report(workspace, index)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
