//! Remote sync and session deletion

use std::time::Duration;

use futures::future::join_all;
use metrics::increment_counter;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ChatEngine;
use crate::chat::{ChatMetadata, ChatSession};
use crate::error::{ChatweaveError, Result};
use crate::store::ChatState;
use crate::sync::{chats_needing_rename, organize_chat_messages, reconcile, SyncReport};

/// Restores a deleted session while its window is open
#[derive(Debug, Clone)]
pub struct DeleteUndo {
    prior: ChatState,
    session_id: String,
    expires_at: Instant,
}

impl DeleteUndo {
    /// Id of the deleted session
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the undo window has closed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before the window closes
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

impl ChatEngine {
    /// Reconciles local sessions with the remote history
    ///
    /// Fetch errors propagate without touching local state. Remote chats
    /// that are about to become new sessions and still carry the default
    /// name are renamed first; rename failures are logged.
    ///
    /// # Errors
    ///
    /// Returns error if the remote snapshot cannot be fetched
    pub async fn sync(&self) -> Result<SyncReport> {
        let snapshot = match self.remote.fetch_all().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                increment_counter!("chatweave_sync_total", "outcome" => "failed");
                return Err(e);
            }
        };

        let mut chats = snapshot.chat_map();
        let organized = organize_chat_messages(&snapshot.messages);
        self.store.set_chats(chats.clone());
        debug!(
            chats = chats.len(),
            messages = snapshot.messages.len(),
            "Fetched remote snapshot"
        );

        if self.options.auto_rename {
            let local = self.store.snapshot();
            for chat_id in chats_needing_rename(&organized, &chats, &local.sessions) {
                match self.remote.autorename(&chat_id).await {
                    Ok(name) => {
                        chats
                            .entry(chat_id)
                            .or_insert_with(ChatMetadata::default)
                            .name = name;
                    }
                    Err(e) => warn!(chat_id = %chat_id, "Failed to autorename chat: {}", e),
                }
            }
        }

        let model_config = self.store.model_config().clone();
        let report = self.store.update(|state| {
            let selected = state.current().map(|s| (s.id.clone(), s.chat_id.clone()));
            let reconciled = reconcile(&organized, &chats, &state.sessions, &model_config);
            state.current_session_index = reselect(
                &reconciled.sessions,
                selected,
                state.current_session_index,
                reconciled.report.created,
            );
            state.sessions = reconciled.sessions;
            state.chats = chats;
            reconciled.report
        });

        increment_counter!("chatweave_sync_total", "outcome" => "completed");
        info!(
            updated = report.updated,
            created = report.created,
            removed = report.removed,
            kept_prior = report.kept_prior,
            "Synced sessions"
        );
        Ok(report)
    }

    /// Deletes the session at `index`, remotely first
    ///
    /// A remote failure leaves local state untouched. The returned token
    /// restores the local state through [`ChatEngine::undo_delete`] until
    /// the undo window closes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` for an unknown index, or the remote error
    pub async fn delete_session(&self, index: usize) -> Result<DeleteUndo> {
        let session = self.store.snapshot().session_at(index)?.clone();

        if !session.chat_id.is_empty() {
            self.remote.delete(&session.chat_id).await?;
        }

        let position = self
            .store
            .snapshot()
            .position(&session.id)
            .ok_or_else(|| ChatweaveError::SessionNotFound(session.id.clone()))?;
        let prior = self.store.remove_session(position)?;
        info!(session_id = %session.id, chat_id = %session.chat_id, "Deleted session");

        Ok(DeleteUndo {
            prior,
            session_id: session.id,
            expires_at: Instant::now() + self.undo_window,
        })
    }

    /// Restores the state captured by `undo`
    ///
    /// # Errors
    ///
    /// Returns `UndoExpired` once the window has closed
    pub fn undo_delete(&self, undo: DeleteUndo) -> Result<()> {
        if undo.is_expired() {
            return Err(ChatweaveError::UndoExpired.into());
        }
        debug!(session_id = %undo.session_id, "Restoring deleted session");
        self.store.restore(undo.prior);
        Ok(())
    }

    /// Deletes every synced chat remotely, then clears local sessions
    ///
    /// Remote deletes run concurrently. If any fails, local state is kept
    /// and the first error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first remote delete error
    pub async fn clear_all_data(&self) -> Result<()> {
        let sessions = self.store.snapshot().sessions;
        let deletes = sessions
            .iter()
            .filter(|s| !s.chat_id.is_empty())
            .map(|s| self.remote.delete(&s.chat_id));
        let results = join_all(deletes).await;

        if let Some(error) = results.into_iter().find_map(Result::err) {
            warn!("Clearing data aborted: {}", error);
            return Err(error);
        }

        self.pool.stop_all();
        self.store.clear_sessions();
        info!(sessions = sessions.len(), "Cleared all sessions");
        Ok(())
    }
}

/// Index of the previously selected session in the reconciled list
///
/// Matched by session id, then by chat id since dedup may keep another
/// copy of the same chat. A dropped selection moves to the top when new
/// sessions were created and is clamped otherwise.
fn reselect(
    sessions: &[ChatSession],
    selected: Option<(String, String)>,
    previous: usize,
    created: usize,
) -> usize {
    let found = selected.and_then(|(id, chat_id)| {
        sessions.iter().position(|s| s.id == id).or_else(|| {
            if chat_id.is_empty() {
                None
            } else {
                sessions.iter().position(|s| s.chat_id == chat_id)
            }
        })
    });
    match found {
        Some(index) => index,
        None if created > 0 => 0,
        None => previous.min(sessions.len().saturating_sub(1)),
    }
}
