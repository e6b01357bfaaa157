//! Scripted model client
//!
//! Replays canned replies in order and records every request it receives.
//! Used by the engine tests and for offline runs of the CLI.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{ChatEvent, ChatEventStream, ChatRequest, ModelClient};
use crate::error::{ChatweaveError, Result};

/// One canned reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Emits the partials then finishes with `text`
    Complete {
        /// Cumulative partial texts
        partials: Vec<String>,
        /// Final text
        text: String,
    },
    /// Emits the partials then fails with `message`
    Fail {
        /// Cumulative partial texts
        partials: Vec<String>,
        /// Error message
        message: String,
    },
    /// Emits the partials then never terminates
    Hang {
        /// Cumulative partial texts
        partials: Vec<String>,
    },
}

impl ScriptedReply {
    /// Finishes immediately with `text`
    pub fn complete(text: impl Into<String>) -> Self {
        ScriptedReply::Complete {
            partials: Vec::new(),
            text: text.into(),
        }
    }

    /// Streams `partials` then finishes with `text`
    pub fn streamed(partials: Vec<String>, text: impl Into<String>) -> Self {
        ScriptedReply::Complete {
            partials,
            text: text.into(),
        }
    }

    /// Fails immediately
    pub fn fail(message: impl Into<String>) -> Self {
        ScriptedReply::Fail {
            partials: Vec::new(),
            message: message.into(),
        }
    }

    /// Streams `partials` then fails
    pub fn fail_after(partials: Vec<String>, message: impl Into<String>) -> Self {
        ScriptedReply::Fail {
            partials,
            message: message.into(),
        }
    }

    /// Streams `partials` then waits forever
    pub fn hang(partials: Vec<String>) -> Self {
        ScriptedReply::Hang { partials }
    }

    fn into_stream(self) -> ChatEventStream {
        match self {
            ScriptedReply::Complete { partials, text } => {
                let events = partials
                    .into_iter()
                    .map(|p| Ok(ChatEvent::Update(p)))
                    .chain(std::iter::once(Ok(ChatEvent::Finish(text))));
                stream::iter(events).boxed()
            }
            ScriptedReply::Fail { partials, message } => {
                let events = partials
                    .into_iter()
                    .map(|p| Ok(ChatEvent::Update(p)))
                    .chain(std::iter::once(Err(ChatweaveError::Generation(message).into())));
                stream::iter(events).boxed()
            }
            ScriptedReply::Hang { partials } => {
                let events: Vec<Result<ChatEvent>> =
                    partials.into_iter().map(|p| Ok(ChatEvent::Update(p))).collect();
                stream::iter(events).chain(stream::pending()).boxed()
            }
        }
    }
}

/// Model client replaying [`ScriptedReply`] values
#[derive(Debug, Clone, Default)]
pub struct ScriptedModelClient {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    fallback: Option<ScriptedReply>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedModelClient {
    /// Client replaying `replies` in order
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::providers::{ScriptedModelClient, ScriptedReply};
    ///
    /// let client = ScriptedModelClient::new(vec![ScriptedReply::complete("hi")]);
    /// assert_eq!(client.request_count(), 0);
    /// ```
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    /// Reply used once the script is exhausted
    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Waits `delay` before the first event of every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues another reply
    pub fn push(&self, reply: ScriptedReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatEventStream> {
        lock(&self.requests).push(request);

        let next = lock(&self.replies).pop_front();
        let reply = match next.or_else(|| self.fallback.clone()) {
            Some(reply) => reply,
            None => {
                return Err(ChatweaveError::Generation("no scripted reply left".to_string()).into())
            }
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(reply.into_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ModelConfig};
    use crate::providers::RequestConfig;

    fn request() -> ChatRequest {
        ChatRequest::new(
            vec![ChatMessage::user("hi")],
            RequestConfig::from_model_config(&ModelConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let client = ScriptedModelClient::new(vec![
            ScriptedReply::complete("one"),
            ScriptedReply::complete("two"),
        ]);
        let first: Vec<_> = client.chat(request()).await.unwrap().collect().await;
        let second: Vec<_> = client.chat(request()).await.unwrap().collect().await;
        assert!(matches!(first[0], Ok(ChatEvent::Finish(ref t)) if t == "one"));
        assert!(matches!(second[0], Ok(ChatEvent::Finish(ref t)) if t == "two"));
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let client = ScriptedModelClient::new(vec![]);
        assert!(client.chat(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_fallback_reply() {
        let client = ScriptedModelClient::new(vec![]).with_fallback(ScriptedReply::complete("again"));
        for _ in 0..2 {
            let events: Vec<_> = client.chat(request()).await.unwrap().collect().await;
            assert_eq!(events.len(), 1);
        }
    }

    #[test]
    fn test_fail_after_partials() {
        let events: Vec<_> = tokio_test::block_on(
            ScriptedReply::fail_after(vec!["a".to_string()], "boom")
                .into_stream()
                .collect::<Vec<_>>(),
        );
        assert!(matches!(events[0], Ok(ChatEvent::Update(ref t)) if t == "a"));
        assert!(events[1].is_err());
    }
}
