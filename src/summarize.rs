//! Title generation and long-term memory compression planning
//!
//! Both planners are pure: they look at a session and decide whether a
//! summarization request is due and what it contains. Executing the plan
//! and writing the result back is the engine's job.

use crate::chat::prompts::{SUMMARIZE_PROMPT, TOPIC_PROMPT};
use crate::chat::{summarize_model_for, ChatMessage, ChatSession, ModelCatalog, SummarizeModels};
use crate::providers::{ChatRequest, RequestConfig};
use crate::tokens::{count_messages, TokenEstimator};

/// Estimated tokens a conversation needs before it gets a generated title
pub const SUMMARIZE_MIN_LEN: usize = 50;

/// Settings shared by both planners
#[derive(Debug, Clone, Default)]
pub struct SummarizeSettings {
    /// Whether titles are generated automatically
    pub auto_title: bool,
    /// Catalog consulted for the summarization model
    pub catalog: ModelCatalog,
    /// Summarization model names
    pub models: SummarizeModels,
}

impl SummarizeSettings {
    fn model_for(&self, session: &ChatSession) -> String {
        summarize_model_for(&session.model_config().model, &self.catalog, &self.models)
    }
}

/// A due title request
#[derive(Debug, Clone, PartialEq)]
pub struct TitlePlan {
    /// Non-streaming request asking for a title
    pub request: ChatRequest,
}

/// A due memory compression request
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionPlan {
    /// Streaming request asking for a summary
    pub request: ChatRequest,
    /// Value of `last_summarize_index` committed on success
    pub commit_index: usize,
    /// Estimated tokens of the history that triggered the plan
    pub history_tokens: usize,
}

/// Decides whether a title should be generated for `session`
///
/// Due when auto titles are enabled, the topic is still the placeholder and
/// was never set, and the whole conversation is estimated at
/// [`SUMMARIZE_MIN_LEN`] tokens or more.
pub fn plan_title(
    session: &ChatSession,
    settings: &SummarizeSettings,
    estimator: &dyn TokenEstimator,
) -> Option<TitlePlan> {
    if !settings.auto_title || !session.has_default_topic() || session.topic_updated {
        return None;
    }
    if count_messages(estimator, &session.messages) < SUMMARIZE_MIN_LEN {
        return None;
    }

    let mut messages = session.messages.clone();
    messages.push(ChatMessage::user(TOPIC_PROMPT));
    let config = RequestConfig::from_model_config(session.model_config())
        .with_model(settings.model_for(session))
        .with_stream(false);

    Some(TitlePlan {
        request: ChatRequest::new(messages, config),
    })
}

/// Decides whether older history should be folded into long-term memory
///
/// Starts at `max(last_summarize_index, clear_context_index)` and drops
/// error messages. When that history exceeds `max_tokens` only the last
/// `history_message_count` messages are summarized. The existing memory is
/// prepended. Due when the history exceeds the compression threshold and
/// memory is enabled. The request never carries `max_tokens`.
pub fn plan_memory_compression(
    session: &ChatSession,
    settings: &SummarizeSettings,
    estimator: &dyn TokenEstimator,
) -> Option<CompressionPlan> {
    let config = session.model_config();
    let start = session
        .last_summarize_index
        .max(session.clear_context_start())
        .min(session.messages.len());

    let mut history: Vec<ChatMessage> = session.messages[start..]
        .iter()
        .filter(|m| !m.is_error)
        .cloned()
        .collect();
    let history_tokens = count_messages(estimator, &history);

    if history_tokens > config.max_tokens {
        let keep_from = history.len().saturating_sub(config.history_message_count);
        history.drain(..keep_from);
    }

    if history_tokens <= config.compress_message_length_threshold || !config.send_memory {
        return None;
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.extend(session.memory_message());
    messages.extend(history);
    messages.push(ChatMessage::system(SUMMARIZE_PROMPT));

    let request_config = RequestConfig::from_model_config(config)
        .without_max_tokens()
        .with_model(settings.model_for(session))
        .with_stream(true);

    Some(CompressionPlan {
        request: ChatRequest::new(messages, request_config),
        commit_index: session.messages.len(),
        history_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{default_models, ModelConfig, Role, DEFAULT_TOPIC};
    use crate::tokens::MockTokenEstimator;

    fn settings() -> SummarizeSettings {
        SummarizeSettings {
            auto_title: true,
            catalog: ModelCatalog::new(default_models(), ""),
            models: SummarizeModels::default(),
        }
    }

    fn fixed(cost: usize) -> MockTokenEstimator {
        let mut mock = MockTokenEstimator::new();
        mock.expect_estimate().returning(move |_| cost);
        mock
    }

    fn session(count: usize) -> ChatSession {
        let mut config = ModelConfig::default();
        config.model = "gpt-4o".to_string();
        let mut session = ChatSession::new(config);
        session.messages = (0..count).map(|i| ChatMessage::user(format!("m{}", i))).collect();
        session
    }

    #[test]
    fn test_title_fires_at_threshold() {
        let s = session(5);
        assert!(plan_title(&s, &settings(), &fixed(9)).is_none());
        let plan = plan_title(&s, &settings(), &fixed(10)).expect("title plan");
        assert!(!plan.request.config.stream);
        assert_eq!(plan.request.config.model, "gpt-4o-mini");
        let last = plan.request.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.text_content(), TOPIC_PROMPT);
        assert_eq!(plan.request.messages.len(), 6);
    }

    #[test]
    fn test_title_skipped_when_named_or_disabled() {
        let mut s = session(5);
        s.topic_updated = true;
        assert!(plan_title(&s, &settings(), &fixed(100)).is_none());

        let mut s = session(5);
        s.topic = "Named".to_string();
        assert!(plan_title(&s, &settings(), &fixed(100)).is_none());

        let s = session(5);
        let mut off = settings();
        off.auto_title = false;
        assert!(plan_title(&s, &off, &fixed(100)).is_none());
        assert_eq!(s.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn test_compression_threshold() {
        let mut s = session(10);
        s.mask.model_config.compress_message_length_threshold = 100;
        assert!(plan_memory_compression(&s, &settings(), &fixed(10)).is_none());
        let plan = plan_memory_compression(&s, &settings(), &fixed(11)).expect("plan");
        assert_eq!(plan.history_tokens, 110);
        assert_eq!(plan.commit_index, 10);
        assert!(plan.request.config.stream);
        assert!(plan.request.config.max_tokens.is_none());
        assert_eq!(plan.request.messages.last().unwrap().text_content(), SUMMARIZE_PROMPT);
    }

    #[test]
    fn test_compression_requires_send_memory() {
        let mut s = session(10);
        s.mask.model_config.compress_message_length_threshold = 1;
        s.mask.model_config.send_memory = false;
        assert!(plan_memory_compression(&s, &settings(), &fixed(10)).is_none());
    }

    #[test]
    fn test_compression_starts_after_summarized_and_cleared() {
        let mut s = session(10);
        s.mask.model_config.compress_message_length_threshold = 1;
        s.last_summarize_index = 3;
        s.clear_context_index = Some(6);
        s.messages[8].is_error = true;
        let plan = plan_memory_compression(&s, &settings(), &fixed(1)).unwrap();
        let texts: Vec<String> = plan.request.messages.iter().map(|m| m.text_content()).collect();
        assert_eq!(texts, vec!["m6", "m7", "m9", SUMMARIZE_PROMPT]);
    }

    #[test]
    fn test_compression_index_counts_error_messages() {
        let mut s = session(6);
        s.mask.model_config.compress_message_length_threshold = 1;
        s.messages[0].is_error = true;
        s.messages[1].is_error = true;
        s.last_summarize_index = 3;
        let plan = plan_memory_compression(&s, &settings(), &fixed(1)).unwrap();
        let texts: Vec<String> = plan.request.messages.iter().map(|m| m.text_content()).collect();
        assert_eq!(texts, vec!["m3", "m4", "m5", SUMMARIZE_PROMPT]);
    }

    #[test]
    fn test_compression_truncates_to_history_count_over_budget() {
        let mut s = session(10);
        s.mask.model_config.compress_message_length_threshold = 100;
        s.mask.model_config.max_tokens = 500;
        s.mask.model_config.history_message_count = 2;
        s.memory_prompt = "earlier".to_string();
        let plan = plan_memory_compression(&s, &settings(), &fixed(60)).unwrap();
        let texts: Vec<String> = plan.request.messages.iter().map(|m| m.text_content()).collect();
        assert_eq!(texts.len(), 4);
        assert!(texts[0].contains("earlier"));
        assert_eq!(texts[1], "m8");
        assert_eq!(texts[2], "m9");
    }

    #[test]
    fn test_summarize_model_for_gemini_session() {
        let mut s = session(10);
        s.mask.model_config.model = "gemini-1.5-flash".to_string();
        s.mask.model_config.compress_message_length_threshold = 1;
        let plan = plan_memory_compression(&s, &settings(), &fixed(1)).unwrap();
        assert_eq!(plan.request.config.model, "gemini-pro");
    }
}
