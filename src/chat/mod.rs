//! Chat domain types
//!
//! Messages, sessions, templates, model classification and prompt strings
//! shared by the context assembler, the summarizer and the reconciler.

pub mod message;
pub mod model;
pub mod prompts;
pub mod session;
pub mod template;

pub use message::{new_message_id, ChatMessage, ContentPart, ImageUrl, MessageContent, Role};
pub use model::{
    default_models, summarize_model_for, ModelCatalog, ModelEntry, ModelFamily, SummarizeModels,
};
pub use session::{
    ChatMetadata, ChatSession, ChatStat, Mask, MaskPreset, ModelConfig, ModelOverrides,
    DEFAULT_TOPIC,
};
pub use template::{fill_template_with, TemplateVars};
