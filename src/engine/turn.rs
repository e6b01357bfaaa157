//! One user turn and the hooks that run after it

use metrics::increment_counter;
use tracing::{debug, info, warn};

use super::ChatEngine;
use crate::chat::{fill_template_with, ChatMessage, MessageContent};
use crate::error::{pretty_error, ChatweaveError, Result};
use crate::providers::{drive_generation, ChatRequest, GenerationOutcome, RequestConfig};

impl ChatEngine {
    /// Runs one turn in the current session
    ///
    /// The user message and a streaming assistant placeholder are appended
    /// together. Partial text replaces the placeholder content as it
    /// arrives. On failure the rendered error is appended to the reply and
    /// both messages are flagged as errors, unless the generation was
    /// stopped. After a completed turn the post-turn hooks run.
    ///
    /// # Arguments
    ///
    /// * `content` - Raw user input
    /// * `images` - Image URLs to attach
    ///
    /// # Errors
    ///
    /// Returns error only when the session disappears before the messages
    /// are appended; generation failures are reported in the outcome.
    pub async fn on_user_input(&self, content: &str, images: &[String]) -> Result<GenerationOutcome> {
        self.on_user_input_with(content, images, |_| {}).await
    }

    /// Runs one turn like [`ChatEngine::on_user_input`], reporting each
    /// cumulative partial reply to `on_partial`
    ///
    /// # Errors
    ///
    /// Returns error only when the session disappears before the messages
    /// are appended
    pub async fn on_user_input_with<F>(
        &self,
        content: &str,
        images: &[String],
        mut on_partial: F,
    ) -> Result<GenerationOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let session = self.store.current_session();
        let session_id = session.id.clone();
        let config = session.model_config().clone();

        let vars = self.template_vars(&config.model);
        let filled = fill_template_with(content, &config.template, &vars);
        let user = ChatMessage::user(MessageContent::with_images(filled, images));
        let bot = ChatMessage::streaming_reply(config.model.clone());
        let user_id = user.id.clone();
        let bot_id = bot.id.clone();

        let mut messages = self.context_for(&session).into_messages();
        messages.push(user.clone());

        self.store.update_session(&session_id, |s| {
            s.messages.push(user.clone());
            s.messages.push(bot);
            s.touch();
        })?;

        info!(
            session_id = %session_id,
            model = %config.model,
            messages = messages.len(),
            "Sending chat request"
        );

        let request = ChatRequest::new(
            messages,
            RequestConfig::from_model_config(&config).with_stream(true),
        );
        let token = self.pool.add(&session_id, &bot_id);
        let store = self.store.clone();
        let outcome = drive_generation(self.client.as_ref(), request, token, |partial| {
            let updated = store.update_message(&session_id, &bot_id, |m| {
                m.content = MessageContent::Text(partial.to_string());
            });
            if let Err(e) = updated {
                debug!("Dropping partial update: {}", e);
            }
            on_partial(partial);
        })
        .await;
        self.pool.remove(&session_id, &bot_id);

        increment_counter!("chatweave_generations_total", "outcome" => outcome.label());

        match &outcome {
            GenerationOutcome::Completed(text) => {
                let text = text.clone();
                let reply = self.store.update_message(&session_id, &bot_id, move |m| {
                    m.content = MessageContent::Text(text);
                    m.streaming = false;
                    m.date = chrono::Utc::now();
                    m.clone()
                });
                match reply {
                    Ok(reply) => self.on_new_message(&session_id, &reply).await,
                    Err(e) => warn!("Reply finished after its session was removed: {}", e),
                }
            }
            GenerationOutcome::Failed(error) => {
                warn!(session_id = %session_id, "Generation failed: {}", error);
                self.finish_with_error(&session_id, &user_id, &bot_id, &error.to_string(), true);
            }
            GenerationOutcome::Aborted => {
                info!(session_id = %session_id, "Generation stopped");
                let message = ChatweaveError::Aborted.to_string();
                self.finish_with_error(&session_id, &user_id, &bot_id, &message, false);
            }
        }

        Ok(outcome)
    }

    fn finish_with_error(
        &self,
        session_id: &str,
        user_id: &str,
        bot_id: &str,
        message: &str,
        flag: bool,
    ) {
        let rendered = format!("\n\n{}", pretty_error(message));
        let result = self.store.update_session(session_id, |s| {
            for m in s.messages.iter_mut() {
                if m.id == bot_id {
                    m.content.push_text(&rendered);
                    m.streaming = false;
                    m.is_error = flag;
                } else if m.id == user_id {
                    m.is_error = flag;
                }
            }
        });
        if let Err(e) = result {
            debug!("Error reply for a removed session: {}", e);
        }
    }

    /// Post-turn hook for a completed reply
    ///
    /// Bumps the session, updates its statistics, renames it from the
    /// remote once it has more than two messages and spawns summarization.
    pub(crate) async fn on_new_message(&self, session_id: &str, reply: &ChatMessage) {
        if let Err(e) = self.store.update_session(session_id, |s| s.touch()) {
            debug!("Skipping post-turn hook: {}", e);
            return;
        }
        if let Err(e) = self.store.update_stat(session_id, reply) {
            debug!("Failed to update stats: {}", e);
        }

        if self.options.auto_rename {
            self.rename_from_remote(session_id).await;
        }

        if self.options.auto_summarize {
            let engine = self.clone();
            let session_id = session_id.to_string();
            tokio::spawn(async move {
                engine.summarize_session(&session_id).await;
            });
        }
    }

    /// Applies the remote's generated name to a session without a title
    async fn rename_from_remote(&self, session_id: &str) {
        let session = match self.store.session(session_id) {
            Ok(session) => session,
            Err(_) => return,
        };
        if session.chat_id.is_empty() || session.messages.len() <= 2 || session.topic_updated {
            return;
        }

        match self.remote.autorename(&session.chat_id).await {
            Ok(name) if !name.trim().is_empty() => {
                debug!(session_id, chat_id = %session.chat_id, topic = %name, "Renamed from remote");
                let result = self.store.update_session(session_id, |s| {
                    s.topic = name;
                    s.topic_updated = true;
                });
                if let Err(e) = result {
                    debug!("Rename for a removed session: {}", e);
                }
            }
            Ok(_) => debug!(chat_id = %session.chat_id, "Remote returned an empty name"),
            Err(e) => warn!(chat_id = %session.chat_id, "Failed to autorename chat: {}", e),
        }
    }
}
