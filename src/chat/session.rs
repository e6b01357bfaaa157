//! Chat session types
//!
//! A session is one conversation thread: its messages, its rolling
//! long-term memory and the model configuration used to talk to the
//! backend.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{new_message_id, ChatMessage};
use super::prompts;
use super::template::DEFAULT_INPUT_TEMPLATE;

/// Placeholder topic of a session that has not been named yet
pub const DEFAULT_TOPIC: &str = "New Conversation";

/// Per-session model configuration
///
/// Field names on the wire match the persisted state shape so that older
/// state files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Token budget of the recent window; also forwarded to the backend
    pub max_tokens: usize,
    /// Presence penalty
    pub presence_penalty: f32,
    /// Frequency penalty
    pub frequency_penalty: f32,
    /// Whether long-term memory is produced and sent
    #[serde(rename = "sendMemory")]
    pub send_memory: bool,
    /// Number of most recent messages in the short-term window
    #[serde(rename = "historyMessageCount")]
    pub history_message_count: usize,
    /// Token count above which history is compressed into memory
    #[serde(rename = "compressMessageLengthThreshold")]
    pub compress_message_length_threshold: usize,
    /// Whether a synthesized system prompt is prepended for GPT models
    #[serde(rename = "enableInjectSystemPrompts")]
    pub enable_inject_system_prompts: bool,
    /// Input template containing `{{input}}`
    pub template: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            top_p: 1.0,
            max_tokens: 4000,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            send_memory: true,
            history_message_count: 4,
            compress_message_length_threshold: 1000,
            enable_inject_system_prompts: true,
            template: DEFAULT_INPUT_TEMPLATE.to_string(),
        }
    }
}

/// Preset attached to a session: fixed context messages and model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mask {
    /// Display name of the preset
    pub name: String,
    /// Messages always sent after memory and before the recent window
    pub context: Vec<ChatMessage>,
    /// Model configuration of sessions using this preset
    pub model_config: ModelConfig,
}

impl Default for Mask {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOPIC.to_string(),
            context: Vec::new(),
            model_config: ModelConfig::default(),
        }
    }
}

impl Mask {
    /// Empty preset using the given global model configuration
    pub fn with_model_config(model_config: ModelConfig) -> Self {
        Self {
            model_config,
            ..Self::default()
        }
    }
}

/// Model settings a preset changes; unset fields keep the base value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(rename = "sendMemory", skip_serializing_if = "Option::is_none")]
    pub send_memory: Option<bool>,
    #[serde(rename = "historyMessageCount", skip_serializing_if = "Option::is_none")]
    pub history_message_count: Option<usize>,
    #[serde(
        rename = "compressMessageLengthThreshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub compress_message_length_threshold: Option<usize>,
    #[serde(rename = "enableInjectSystemPrompts", skip_serializing_if = "Option::is_none")]
    pub enable_inject_system_prompts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl ModelOverrides {
    /// `base` with every set field replaced
    pub fn apply(&self, base: &ModelConfig) -> ModelConfig {
        let base = base.clone();
        ModelConfig {
            model: self.model.clone().unwrap_or(base.model),
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            presence_penalty: self.presence_penalty.unwrap_or(base.presence_penalty),
            frequency_penalty: self.frequency_penalty.unwrap_or(base.frequency_penalty),
            send_memory: self.send_memory.unwrap_or(base.send_memory),
            history_message_count: self
                .history_message_count
                .unwrap_or(base.history_message_count),
            compress_message_length_threshold: self
                .compress_message_length_threshold
                .unwrap_or(base.compress_message_length_threshold),
            enable_inject_system_prompts: self
                .enable_inject_system_prompts
                .unwrap_or(base.enable_inject_system_prompts),
            template: self.template.clone().unwrap_or(base.template),
        }
    }
}

/// Preset a new session starts from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaskPreset {
    /// Display name; the default topic when empty
    pub name: String,
    /// Fixed context messages
    pub context: Vec<ChatMessage>,
    /// Settings laid over the global model configuration
    pub model_config: ModelOverrides,
}

impl MaskPreset {
    /// Session mask with the overrides applied to `global`
    pub fn into_mask(self, global: &ModelConfig) -> Mask {
        let model_config = self.model_config.apply(global);
        Mask {
            name: if self.name.is_empty() {
                DEFAULT_TOPIC.to_string()
            } else {
                self.name
            },
            context: self.context,
            model_config,
        }
    }
}

/// Running statistics of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatStat {
    /// Estimated tokens
    pub token_count: usize,
    /// Words
    pub word_count: usize,
    /// Characters of completed messages
    pub char_count: usize,
}

/// Remote chat metadata keyed by correlation id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMetadata {
    /// Remote chat name
    pub name: String,
    /// Creation time as reported by the remote
    pub created_at: String,
    /// Last update time as reported by the remote
    pub updated_at: String,
    /// Soft-delete marker
    pub deleted_at: Option<String>,
    /// Parent message of the chat, when branched
    pub parent_message_id: Option<String>,
    /// Owner of the chat
    pub user_id: String,
}

/// One conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Local identity
    #[serde(default = "new_message_id")]
    pub id: String,
    /// Title; [`DEFAULT_TOPIC`] until named
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Long-term memory; empty means none
    #[serde(default)]
    pub memory_prompt: String,
    /// Conversation in order
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Statistics
    #[serde(default)]
    pub stat: ChatStat,
    /// Last update, milliseconds since the epoch
    #[serde(default)]
    pub last_update: i64,
    /// Number of leading messages already folded into `memory_prompt`
    #[serde(default)]
    pub last_summarize_index: usize,
    /// Messages before this index are never resent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_context_index: Option<usize>,
    /// Correlation id of the remote chat
    #[serde(rename = "chat_id", default = "new_chat_id")]
    pub chat_id: String,
    /// Preset
    #[serde(default)]
    pub mask: Mask,
    /// Set once the topic has been generated or renamed; never reset
    #[serde(default)]
    pub topic_updated: bool,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

/// Generates a new remote correlation id
pub fn new_chat_id() -> String {
    Uuid::new_v4().to_string()
}

impl ChatSession {
    /// Creates an empty session with a fresh id and correlation id
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::chat::{ChatSession, ModelConfig, DEFAULT_TOPIC};
    ///
    /// let session = ChatSession::new(ModelConfig::default());
    /// assert_eq!(session.topic, DEFAULT_TOPIC);
    /// assert!(session.messages.is_empty());
    /// assert!(!session.topic_updated);
    /// ```
    pub fn new(model_config: ModelConfig) -> Self {
        Self {
            id: new_message_id(),
            topic: DEFAULT_TOPIC.to_string(),
            memory_prompt: String::new(),
            messages: Vec::new(),
            stat: ChatStat::default(),
            last_update: Utc::now().timestamp_millis(),
            last_summarize_index: 0,
            clear_context_index: None,
            chat_id: new_chat_id(),
            mask: Mask::with_model_config(model_config),
            topic_updated: false,
        }
    }

    /// Creates a session seeded from a remote chat
    pub fn from_remote(
        model_config: ModelConfig,
        chat_id: impl Into<String>,
        topic: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        let mut session = Self::new(model_config);
        session.chat_id = chat_id.into();
        session.topic = topic.into();
        session.messages = messages;
        session
    }

    /// Model configuration of the session
    pub fn model_config(&self) -> &ModelConfig {
        &self.mask.model_config
    }

    /// Whether the topic is still the placeholder
    pub fn has_default_topic(&self) -> bool {
        self.topic == DEFAULT_TOPIC
    }

    /// Long-term memory wrapped as a system message, when there is any
    pub fn memory_message(&self) -> Option<ChatMessage> {
        if self.memory_prompt.is_empty() {
            return None;
        }
        Some(ChatMessage::system(prompts::history_recap(&self.memory_prompt)))
    }

    /// Index marking the user-requested context boundary (0 when unset)
    pub fn clear_context_start(&self) -> usize {
        self.clear_context_index.unwrap_or(0)
    }

    /// Clamps the summarize and clear-context indices into the message list
    pub fn clamp_indices(&mut self) {
        let len = self.messages.len();
        self.last_summarize_index = self.last_summarize_index.min(len);
        if let Some(index) = self.clear_context_index {
            self.clear_context_index = Some(index.min(len));
        }
    }

    /// Bumps `last_update` to now
    pub fn touch(&mut self) {
        self.last_update = Utc::now().timestamp_millis();
    }

    /// Mutable access to a message by id
    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }
}
