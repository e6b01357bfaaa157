//! Title generation and memory compression runs

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use metrics::increment_counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ChatEngine;
use crate::chat::prompts::trim_topic;
use crate::error::{ChatweaveError, Result};
use crate::providers::{drive_generation, ChatRequest, GenerationOutcome};
use crate::summarize::{plan_memory_compression, plan_title};

/// Holds a session's slot in the in-flight title set until dropped
struct TitleSlot {
    titling: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl TitleSlot {
    fn claim(titling: &Arc<Mutex<HashSet<String>>>, session_id: &str) -> Option<Self> {
        let inserted = titling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_string());
        inserted.then(|| Self {
            titling: Arc::clone(titling),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for TitleSlot {
    fn drop(&mut self) {
        self.titling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}

fn outcome_text(outcome: GenerationOutcome) -> Result<String> {
    match outcome {
        GenerationOutcome::Completed(text) => Ok(text),
        GenerationOutcome::Failed(error) => Err(error),
        GenerationOutcome::Aborted => Err(ChatweaveError::Aborted.into()),
    }
}

impl ChatEngine {
    /// Generates a title for the session when one is due
    ///
    /// Concurrent calls for the same session issue at most one request.
    /// Returns the new topic, or `None` when no title was due.
    ///
    /// # Errors
    ///
    /// Returns error if the session does not exist or the request fails
    pub async fn generate_title(&self, session_id: &str) -> Result<Option<String>> {
        let session = self.store.session(session_id)?;
        if session.topic_updated {
            return Ok(None);
        }
        let Some(plan) = plan_title(&session, &self.settings, self.estimator.as_ref()) else {
            return Ok(None);
        };
        let Some(_slot) = TitleSlot::claim(&self.titling, session_id) else {
            debug!(session_id, "Title generation already in flight");
            return Ok(None);
        };

        debug!(session_id, model = %plan.request.config.model, "Generating title");
        let result = self.complete(plan.request).await;
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                increment_counter!("chatweave_summarizations_total", "kind" => "title", "outcome" => "failed");
                return Err(e);
            }
        };

        let topic = trim_topic(&text);
        if topic.is_empty() {
            increment_counter!("chatweave_summarizations_total", "kind" => "title", "outcome" => "empty");
            return Ok(None);
        }

        let applied = topic.clone();
        let changed = self.store.update_session(session_id, move |s| {
            if s.topic_updated {
                return false;
            }
            s.topic = applied;
            s.topic_updated = true;
            true
        })?;
        increment_counter!("chatweave_summarizations_total", "kind" => "title", "outcome" => "completed");
        info!(session_id, topic = %topic, "Generated title");
        Ok(changed.then_some(topic))
    }

    /// Folds older history into the session's long-term memory when due
    ///
    /// The memory is replaced with the partial summary while it streams.
    /// On success `last_summarize_index` moves to the message count seen
    /// when the request was planned. On failure the previous memory is
    /// put back. Returns whether a summary was committed.
    ///
    /// # Errors
    ///
    /// Returns error if the session does not exist or the request fails
    pub async fn compress_memory(&self, session_id: &str) -> Result<bool> {
        let session = self.store.session(session_id)?;
        let Some(plan) = plan_memory_compression(&session, &self.settings, self.estimator.as_ref())
        else {
            return Ok(false);
        };
        let previous = session.memory_prompt.clone();
        let commit_index = plan.commit_index;

        debug!(
            session_id,
            tokens = plan.history_tokens,
            model = %plan.request.config.model,
            "Compressing memory"
        );

        let store = self.store.clone();
        let outcome = drive_generation(
            self.client.as_ref(),
            plan.request,
            CancellationToken::new(),
            |partial| {
                let text = partial.to_string();
                if let Err(e) = store.update_session(session_id, |s| s.memory_prompt = text) {
                    debug!("Dropping memory update: {}", e);
                }
            },
        )
        .await;

        match outcome_text(outcome) {
            Ok(summary) => {
                self.store.update_session(session_id, move |s| {
                    s.memory_prompt = summary;
                    s.last_summarize_index = commit_index;
                    s.clamp_indices();
                })?;
                increment_counter!("chatweave_summarizations_total", "kind" => "memory", "outcome" => "completed");
                info!(session_id, last_summarize_index = commit_index, "Compressed memory");
                Ok(true)
            }
            Err(e) => {
                let restored = self
                    .store
                    .update_session(session_id, move |s| s.memory_prompt = previous);
                if let Err(restore_error) = restored {
                    debug!("Memory restore skipped: {}", restore_error);
                }
                increment_counter!("chatweave_summarizations_total", "kind" => "memory", "outcome" => "failed");
                Err(e)
            }
        }
    }

    /// Runs title generation then memory compression, logging failures
    pub async fn summarize_session(&self, session_id: &str) {
        if let Err(e) = self.generate_title(session_id).await {
            warn!(session_id, "Title generation failed: {}", e);
        }
        if let Err(e) = self.compress_memory(session_id).await {
            warn!(session_id, "Memory compression failed: {}", e);
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let outcome =
            drive_generation(self.client.as_ref(), request, CancellationToken::new(), |_| {}).await;
        outcome_text(outcome)
    }
}
