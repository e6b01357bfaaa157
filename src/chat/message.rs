//! Chat message types
//!
//! A message's `id` is fixed once it is appended to a session. Streaming
//! updates only touch `content`, `streaming` and `is_error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions injected by the client
    System,
    /// Text typed by the user
    User,
    /// Model output
    Assistant,
}

impl Role {
    /// Maps a remote role string onto a role; anything that is not
    /// `user` or `system` is treated as model output.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::chat::Role;
    ///
    /// assert_eq!(Role::from_remote("user"), Role::User);
    /// assert_eq!(Role::from_remote("bot"), Role::Assistant);
    /// ```
    pub fn from_remote(role: &str) -> Self {
        match role {
            "user" => Role::User,
            "system" => Role::System,
            _ => Role::Assistant,
        }
    }

    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Image reference inside a multimodal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Image location (http(s) or data URL)
    pub url: String,
}

/// One part of a multimodal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text part
    Text {
        /// The text
        text: String,
    },
    /// Image attachment
    ImageUrl {
        /// The image reference
        image_url: ImageUrl,
    },
}

impl ContentPart {
    /// Creates a text part
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Creates an image part
    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Message body: plain text or a list of multimodal parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Text and image parts
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl MessageContent {
    /// Text of the content; multimodal text parts are joined with newlines
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Builds the content for a user turn, switching to parts when images are attached
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::chat::MessageContent;
    ///
    /// let plain = MessageContent::with_images("hi", &[]);
    /// assert!(matches!(plain, MessageContent::Text(_)));
    ///
    /// let rich = MessageContent::with_images("hi", &["https://x/a.png".to_string()]);
    /// assert!(matches!(rich, MessageContent::Parts(ref p) if p.len() == 2));
    /// ```
    pub fn with_images(text: impl Into<String>, images: &[String]) -> Self {
        let text = text.into();
        if images.is_empty() {
            return MessageContent::Text(text);
        }
        let mut parts = vec![ContentPart::text(text)];
        parts.extend(images.iter().map(|url| ContentPart::image_url(url.clone())));
        MessageContent::Parts(parts)
    }

    /// Appends text to the content (to the first text part for multimodal content)
    pub fn push_text(&mut self, suffix: &str) {
        match self {
            MessageContent::Text(text) => text.push_str(suffix),
            MessageContent::Parts(parts) => {
                let first_text = parts.iter_mut().find_map(|part| match part {
                    ContentPart::Text { text } => Some(text),
                    ContentPart::ImageUrl { .. } => None,
                });
                match first_text {
                    Some(text) => text.push_str(suffix),
                    None => parts.push(ContentPart::text(suffix)),
                }
            }
        }
    }

    /// Number of characters of text content
    pub fn char_count(&self) -> usize {
        self.text().chars().count()
    }
}

/// A single message in a chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Stable identity of the message
    #[serde(default = "new_message_id")]
    pub id: String,
    /// Author of the message
    pub role: Role,
    /// Message body
    #[serde(default)]
    pub content: MessageContent,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
    /// True while the assistant is still streaming into this message
    #[serde(default)]
    pub streaming: bool,
    /// True when the turn that produced this message failed
    #[serde(default)]
    pub is_error: bool,
    /// Model that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatMessage {
    /// Creates a message with a fresh id and the current time
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            date: Utc::now(),
            streaming: false,
            is_error: false,
            model: None,
        }
    }

    /// Creates a user message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::chat::{ChatMessage, Role};
    ///
    /// let msg = ChatMessage::user("Hello");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text_content(), "Hello");
    /// ```
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    /// Empty assistant placeholder that will receive streamed output
    pub fn streaming_reply(model: impl Into<String>) -> Self {
        let mut message = Self::assistant("");
        message.streaming = true;
        message.model = Some(model.into());
        message
    }

    /// Sets the creation time
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Sets the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Text content of the message
    pub fn text_content(&self) -> String {
        self.content.text()
    }
}

/// Generates a new sortable message/session id
pub fn new_message_id() -> String {
    Ulid::new().to_string()
}
