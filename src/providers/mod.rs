//! Model client abstraction
//!
//! A model client turns a [`ChatRequest`] into a stream of [`ChatEvent`]s:
//! zero or more partial updates followed by one terminal event. Errors are
//! yielded as `Err` items. [`drive_generation`] consumes such a stream under
//! a cancellation token and reduces it to a [`GenerationOutcome`].

pub mod fake;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatMessage, ModelConfig};
use crate::error::{classify_generation_error, GenerationFailure, Result};

pub use fake::{ScriptedModelClient, ScriptedReply};
pub use openai::OpenAiClient;

/// Event yielded by a model client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Text generated so far (cumulative, not a delta)
    Update(String),
    /// Final text
    Finish(String),
}

/// Stream of events of one request
pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>;

/// Generation parameters forwarded to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestConfig {
    /// Model id
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Presence penalty
    pub presence_penalty: f32,
    /// Frequency penalty
    pub frequency_penalty: f32,
    /// Completion limit; omitted from the request when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Whether partial updates are requested
    pub stream: bool,
}

impl RequestConfig {
    /// Streaming request configuration derived from a session's model config
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            presence_penalty: config.presence_penalty,
            frequency_penalty: config.frequency_penalty,
            max_tokens: Some(config.max_tokens),
            stream: true,
        }
    }

    /// Replaces the model id
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets whether the request streams
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Drops the completion limit from the request
    pub fn without_max_tokens(mut self) -> Self {
        self.max_tokens = None;
        self
    }
}

/// A request to the model backend
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Messages in send order
    pub messages: Vec<ChatMessage>,
    /// Generation parameters
    pub config: RequestConfig,
}

impl ChatRequest {
    /// Creates a request
    pub fn new(messages: Vec<ChatMessage>, config: RequestConfig) -> Self {
        Self { messages, config }
    }
}

/// Client of a chat-completion backend
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Starts a request and returns its event stream
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be started or the backend
    /// rejects it before streaming.
    async fn chat(&self, request: ChatRequest) -> Result<ChatEventStream>;
}

/// Terminal state of a generation
#[derive(Debug)]
pub enum GenerationOutcome {
    /// The backend finished with this text
    Completed(String),
    /// The backend or transport failed
    Failed(anyhow::Error),
    /// The caller cancelled the request
    Aborted,
}

impl GenerationOutcome {
    /// Short label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            GenerationOutcome::Completed(_) => "completed",
            GenerationOutcome::Failed(_) => "failed",
            GenerationOutcome::Aborted => "aborted",
        }
    }

    /// True for [`GenerationOutcome::Completed`]
    pub fn is_completed(&self) -> bool {
        matches!(self, GenerationOutcome::Completed(_))
    }
}

/// Runs a request to its terminal state
///
/// `on_update` receives the cumulative text of every partial update.
/// Cancelling `token` ends the generation with
/// [`GenerationOutcome::Aborted`]; errors whose message reports an abort are
/// classified the same way. A stream that ends without a terminal event
/// completes with the last partial text.
///
/// # Arguments
///
/// * `client` - Model client
/// * `request` - Request to send
/// * `token` - Cancellation handle of this generation
/// * `on_update` - Partial text callback
pub async fn drive_generation<F>(
    client: &dyn ModelClient,
    request: ChatRequest,
    token: CancellationToken,
    mut on_update: F,
) -> GenerationOutcome
where
    F: FnMut(&str) + Send,
{
    let failed = |error: anyhow::Error| match classify_generation_error(&error) {
        GenerationFailure::Aborted => GenerationOutcome::Aborted,
        GenerationFailure::Genuine => GenerationOutcome::Failed(error),
    };

    let mut stream = tokio::select! {
        biased;
        _ = token.cancelled() => return GenerationOutcome::Aborted,
        started = client.chat(request) => match started {
            Ok(stream) => stream,
            Err(error) => return failed(error),
        },
    };

    let mut last_text = String::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return GenerationOutcome::Aborted,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(ChatEvent::Update(text))) => {
                on_update(&text);
                last_text = text;
            }
            Some(Ok(ChatEvent::Finish(text))) => return GenerationOutcome::Completed(text),
            Some(Err(error)) => return failed(error),
            None => return GenerationOutcome::Completed(last_text),
        }
    }
}
