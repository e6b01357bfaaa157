//! Context window assembly
//!
//! Decides which messages of a session are sent with the next request.
//! The outgoing list is, in order: an optional synthesized system prompt,
//! the long-term memory (when it applies), the mask's fixed context, and
//! the most recent messages that fit the history count and token budget.

use serde::Serialize;
use tracing::debug;

use crate::chat::template::DEFAULT_SYSTEM_TEMPLATE;
use crate::chat::{fill_template_with, ChatMessage, ChatSession, ModelFamily, TemplateVars};
use crate::tokens::TokenEstimator;

/// Token usage of the recent window against its budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContextInfo {
    /// Budget of the recent window
    pub max_tokens: usize,
    /// Tokens used by the recent window
    pub used_tokens: usize,
    /// Tokens left in the budget
    pub remaining_tokens: usize,
    /// Percentage of the budget used (0.0-100.0)
    pub percentage_used: f64,
}

impl ContextInfo {
    /// Create a new ContextInfo instance
    ///
    /// # Arguments
    ///
    /// * `max_tokens` - Budget of the recent window
    /// * `used_tokens` - Tokens currently used
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::context::ContextInfo;
    ///
    /// let info = ContextInfo::new(4000, 1000);
    /// assert_eq!(info.remaining_tokens, 3000);
    /// assert_eq!(info.percentage_used, 25.0);
    /// ```
    pub fn new(max_tokens: usize, used_tokens: usize) -> Self {
        let used_tokens = used_tokens.min(max_tokens);
        let remaining_tokens = max_tokens - used_tokens;
        let percentage_used = if max_tokens == 0 {
            0.0
        } else {
            (used_tokens as f64 / max_tokens as f64) * 100.0
        };

        Self {
            max_tokens,
            used_tokens,
            remaining_tokens,
            percentage_used,
        }
    }
}

/// Result of assembling a session's context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    /// Synthesized system prompt
    pub system: Option<ChatMessage>,
    /// Long-term memory message
    pub memory: Option<ChatMessage>,
    /// Fixed context messages of the mask
    pub fixed: Vec<ChatMessage>,
    /// Recent window in chronological order
    pub recent: Vec<ChatMessage>,
    /// First message index considered for the recent window
    pub context_start_index: usize,
    /// Estimated tokens of the recent window
    pub recent_tokens: usize,
    /// Budget the recent window was built against
    pub max_tokens: usize,
}

impl AssembledContext {
    /// Budget report of the recent window
    pub fn info(&self) -> ContextInfo {
        ContextInfo::new(self.max_tokens, self.recent_tokens)
    }

    /// Number of messages that will be sent
    pub fn len(&self) -> usize {
        self.system.iter().count() + self.memory.iter().count() + self.fixed.len() + self.recent.len()
    }

    /// True when nothing would be sent
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the parts into the outgoing message list
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.system
            .into_iter()
            .chain(self.memory)
            .chain(self.fixed)
            .chain(self.recent)
            .collect()
    }
}

/// Whether long-term memory is sent for `session`
///
/// Requires memory to be enabled and non-empty, and the summarized range to
/// reach past the clear-context boundary.
pub fn should_send_memory(session: &ChatSession) -> bool {
    session.model_config().send_memory
        && !session.memory_prompt.is_empty()
        && session.last_summarize_index > session.clear_context_start()
}

/// Index of the first message eligible for the recent window
///
/// # Examples
///
/// ```
/// use chatweave::chat::{ChatMessage, ChatSession, ModelConfig};
/// use chatweave::context::context_start_index;
///
/// let mut session = ChatSession::new(ModelConfig::default());
/// session.messages = (0..10).map(|i| ChatMessage::user(format!("m{}", i))).collect();
/// assert_eq!(context_start_index(&session), 6);
/// ```
pub fn context_start_index(session: &ChatSession) -> usize {
    let total = session.messages.len();
    let short_term_start = total.saturating_sub(session.model_config().history_message_count);
    let memory_start = if should_send_memory(session) {
        session.last_summarize_index.min(short_term_start)
    } else {
        short_term_start
    };
    session.clear_context_start().max(memory_start)
}

/// Assembles the context sent with the next request of `session`
///
/// Error messages never ship. The recent window is filled newest first and
/// stops before the first message that would push it over `max_tokens`, so
/// its estimated size never exceeds the budget. System, memory and fixed
/// context messages are not counted against it.
///
/// # Arguments
///
/// * `session` - Session to assemble for
/// * `estimator` - Token estimator
/// * `vars` - Values for the system prompt template
pub fn assemble(
    session: &ChatSession,
    estimator: &dyn TokenEstimator,
    vars: &TemplateVars,
) -> AssembledContext {
    let config = session.model_config();

    let system = if config.enable_inject_system_prompts
        && ModelFamily::accepts_system_prompt(&config.model)
    {
        let prompt = fill_template_with("", DEFAULT_SYSTEM_TEMPLATE, vars);
        debug!(session_id = %session.id, "Injecting system prompt");
        Some(ChatMessage::system(prompt))
    } else {
        None
    };

    let memory = if should_send_memory(session) {
        session.memory_message()
    } else {
        None
    };

    let start = context_start_index(session);
    let budget = config.max_tokens;
    let mut tokens = 0usize;
    let mut recent = Vec::new();

    for message in session.messages[start.min(session.messages.len())..].iter().rev() {
        if message.is_error {
            continue;
        }
        let cost = estimator.estimate(&message.text_content());
        if tokens + cost > budget {
            break;
        }
        tokens += cost;
        recent.push(message.clone());
    }
    recent.reverse();

    debug!(
        session_id = %session.id,
        start,
        recent = recent.len(),
        tokens,
        "Assembled context"
    );

    AssembledContext {
        system,
        memory,
        fixed: session.mask.context.clone(),
        recent,
        context_start_index: start,
        recent_tokens: tokens,
        max_tokens: budget,
    }
}
