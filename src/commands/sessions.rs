//! `sessions` command: list local sessions

use chrono::{TimeZone, Utc};
use colored::Colorize;
use prettytable::{format, Table};
use serde::Serialize;

use super::Workspace;
use crate::error::Result;
use crate::store::ChatState;

/// One row of the session listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRow {
    /// Position in the session list
    pub index: usize,
    /// Whether this is the selected session
    pub current: bool,
    /// Session topic
    pub topic: String,
    /// Remote correlation id
    pub chat_id: String,
    /// Number of messages
    pub messages: usize,
    /// Last update, formatted as `YYYY-MM-DD HH:MM`
    pub last_update: String,
}

/// Rows describing every session of `state`
pub fn session_rows(state: &ChatState) -> Vec<SessionRow> {
    state
        .sessions
        .iter()
        .enumerate()
        .map(|(index, session)| SessionRow {
            index,
            current: index == state.current_session_index,
            topic: session.topic.clone(),
            chat_id: session.chat_id.clone(),
            messages: session.messages.len(),
            last_update: Utc
                .timestamp_millis_opt(session.last_update)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

fn shorten(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Prints the session list as a table or JSON
///
/// # Errors
///
/// Returns error if JSON serialization fails
pub fn run(workspace: &Workspace, json: bool) -> Result<()> {
    let rows = session_rows(&workspace.engine().store().snapshot());

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "#".bold(),
        "Topic".bold(),
        "Chat ID".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for row in rows {
        let index = if row.current {
            format!("*{}", row.index).green().to_string()
        } else {
            row.index.to_string()
        };
        table.add_row(prettytable::row![
            index,
            shorten(&row.topic, 40),
            shorten(&row.chat_id, 12).cyan(),
            row.messages,
            row.last_update
        ]);
    }

    println!("\nSessions:");
    table.printstd();
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ModelConfig};

    #[test]
    fn test_session_rows_mark_current() {
        let config = ModelConfig::default();
        let mut state = ChatState::new(&config);
        state.sessions[0].messages.push(ChatMessage::user("hi"));
        state.sessions[0].last_update = 0;
        state.sessions.push(crate::chat::ChatSession::new(config));
        state.current_session_index = 1;

        let rows = session_rows(&state);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].current && rows[1].current);
        assert_eq!(rows[0].messages, 1);
        assert_eq!(rows[0].last_update, "1970-01-01 00:00");
    }

    #[test]
    fn test_shorten_counts_chars() {
        assert_eq!(shorten("short", 10), "short");
        assert_eq!(shorten("ééééééééééé", 6), "ééé...");
    }
}
