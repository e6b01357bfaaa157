//! OpenAI-compatible chat completion client
//!
//! Posts to `{base_url}/chat/completions`. Streaming responses are read as
//! server-sent events; each `data:` payload carries a delta that is
//! accumulated into the cumulative text yielded as [`ChatEvent::Update`].

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{ChatEvent, ChatEventStream, ChatRequest, ModelClient};
use crate::config::ModelClientConfig;
use crate::error::{ChatweaveError, Result};

/// HTTP client for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::config::ModelClientConfig;
    /// use chatweave::providers::OpenAiClient;
    ///
    /// let client = OpenAiClient::new(&ModelClientConfig::default());
    /// assert!(client.is_ok());
    /// ```
    pub fn new(config: &ModelClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("chatweave/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatweaveError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn body(request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": request.config.model,
            "messages": messages,
            "stream": request.config.stream,
            "temperature": request.config.temperature,
            "top_p": request.config.top_p,
            "presence_penalty": request.config.presence_penalty,
            "frequency_penalty": request.config.frequency_penalty,
        });
        if let Some(max_tokens) = request.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    #[instrument(skip(self, request), fields(model = %request.config.model, stream = request.config.stream))]
    async fn chat(&self, request: ChatRequest) -> Result<ChatEventStream> {
        let mut builder = self.client.post(self.endpoint()).json(&Self::body(&request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatweaveError::Generation(format!(
                "backend returned {}: {}",
                status.as_u16(),
                text
            ))
            .into());
        }

        if !request.config.stream {
            let parsed: CompletionResponse = response.json().await?;
            let text = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            debug!(chars = text.len(), "Completion received");
            return Ok(futures::stream::once(async move { Ok(ChatEvent::Finish(text)) }).boxed());
        }

        Ok(sse_events(response.bytes_stream().boxed()))
    }
}

/// Parsed content of one SSE event block
#[derive(Debug, PartialEq, Eq)]
enum SseBlock {
    Delta(String),
    Done,
    Error(String),
    Skip,
}

fn parse_sse_block(block: &str) -> SseBlock {
    let data: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();
    if data.is_empty() {
        return SseBlock::Skip;
    }
    let payload = data.join("\n");
    if payload == "[DONE]" {
        return SseBlock::Done;
    }

    let value: serde_json::Value = match serde_json::from_str(&payload) {
        Ok(v) => v,
        Err(_) => return SseBlock::Skip,
    };
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return SseBlock::Error(message);
    }
    match value
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
    {
        Some(delta) if !delta.is_empty() => SseBlock::Delta(delta.to_string()),
        _ => SseBlock::Skip,
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct SseState {
    body: ByteStream,
    buffer: Vec<u8>,
    text: String,
    eof: bool,
    finished: bool,
}

impl SseState {
    fn next_block(&mut self) -> Option<String> {
        let pos = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let block = String::from_utf8_lossy(&self.buffer[..pos]).into_owned();
        self.buffer.drain(..pos + 2);
        Some(block)
    }
}

/// Turns an SSE byte stream into cumulative chat events
fn sse_events(body: ByteStream) -> ChatEventStream {
    let state = SseState {
        body,
        buffer: Vec::new(),
        text: String::new(),
        eof: false,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(block) = state.next_block() {
                match parse_sse_block(&block) {
                    SseBlock::Delta(delta) => {
                        state.text.push_str(&delta);
                        let event = ChatEvent::Update(state.text.clone());
                        return Some((Ok(event), state));
                    }
                    SseBlock::Done => {
                        state.finished = true;
                        let event = ChatEvent::Finish(state.text.clone());
                        return Some((Ok(event), state));
                    }
                    SseBlock::Error(message) => {
                        state.finished = true;
                        return Some((Err(ChatweaveError::Generation(message).into()), state));
                    }
                    SseBlock::Skip => continue,
                }
            }

            if state.eof {
                state.finished = true;
                let event = ChatEvent::Finish(state.text.clone());
                return Some((Ok(event), state));
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.buffer.extend(chunk.iter().filter(|b| **b != b'\r')),
                Some(Err(error)) => {
                    state.finished = true;
                    return Some((Err(error.into()), state));
                }
                None => {
                    state.eof = true;
                    if !state.buffer.is_empty() {
                        state.buffer.extend_from_slice(b"\n\n");
                    }
                }
            }
        }
    })
    .boxed()
}
