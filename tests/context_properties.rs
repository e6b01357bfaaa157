mod common;

use chatweave::chat::{ChatMessage, ChatSession, ModelConfig, TemplateVars};
use chatweave::context::{assemble, context_start_index};
use chatweave::tokens::{count_messages, TokenEstimator, WeightedCharEstimator};
use common::FixedEstimator;

fn vars() -> TemplateVars {
    TemplateVars::new("gpt-4o-mini", "OpenAI", "en")
}

fn session_of(count: usize, errors_every: usize) -> ChatSession {
    let mut session = ChatSession::new(ModelConfig::default());
    session.messages = (0..count)
        .map(|i| {
            let mut message = if i % 2 == 0 {
                ChatMessage::user(format!("question {} {}", i, "x".repeat(i * 7)))
            } else {
                ChatMessage::assistant(format!("answer {} {}", i, "y".repeat(i * 3)))
            };
            message.is_error = errors_every > 0 && i % errors_every == 0;
            message
        })
        .collect();
    session
}

#[test]
fn test_assembled_context_never_contains_errors() {
    let estimator = WeightedCharEstimator;
    for count in [0, 1, 5, 12, 30] {
        for errors_every in [0, 1, 2, 3, 7] {
            for history in [0, 2, 4, 64] {
                let mut session = session_of(count, errors_every);
                session.mask.model_config.history_message_count = history;
                let context = assemble(&session, &estimator, &vars());
                assert!(
                    context.into_messages().iter().all(|m| !m.is_error),
                    "count={} errors_every={} history={}",
                    count,
                    errors_every,
                    history
                );
            }
        }
    }
}

#[test]
fn test_recent_window_stays_within_budget() {
    let estimator = WeightedCharEstimator;
    for budget in [1, 3, 10, 25, 60, 200, 5000] {
        let mut session = session_of(20, 0);
        session.mask.model_config.max_tokens = budget;
        session.mask.model_config.history_message_count = 64;
        session.memory_prompt = "memory ".repeat(100);
        session.last_summarize_index = 10;

        let context = assemble(&session, &estimator, &vars());
        let used = count_messages(&estimator, &context.recent);
        assert!(used <= budget, "budget={} used={}", budget, used);
        assert_eq!(context.recent_tokens, used);
    }
}

#[test]
fn test_budget_smaller_than_last_message_sends_no_history() {
    let mut session = session_of(3, 0);
    session.mask.model_config.max_tokens = 4;
    let context = assemble(&session, &FixedEstimator(5), &vars());
    assert!(context.recent.is_empty());
    assert!(context.system.is_some());
}

#[test]
fn test_history_count_keeps_last_four_in_order() {
    let mut session = session_of(10, 0);
    session.mask.model_config.history_message_count = 4;
    session.mask.model_config.max_tokens = 100_000;

    let context = assemble(&session, &WeightedCharEstimator, &vars());
    let expected: Vec<String> = session.messages[6..].iter().map(|m| m.id.clone()).collect();
    let got: Vec<String> = context.recent.iter().map(|m| m.id.clone()).collect();
    assert_eq!(got, expected);
}

#[test]
fn test_memory_excluded_before_clear_boundary() {
    let mut session = session_of(10, 0);
    session.mask.model_config.send_memory = true;
    session.memory_prompt = "we talked about trains".to_string();
    session.last_summarize_index = 2;
    session.clear_context_index = Some(5);

    let context = assemble(&session, &WeightedCharEstimator, &vars());
    assert!(context.memory.is_none());
    assert_eq!(context.context_start_index, 5);
    assert_eq!(context_start_index(&session), 5);
}

#[test]
fn test_memory_included_after_summarizing_past_boundary() {
    let mut session = session_of(10, 0);
    session.memory_prompt = "we talked about trains".to_string();
    session.last_summarize_index = 6;
    session.clear_context_index = Some(5);
    session.mask.model_config.history_message_count = 2;

    let context = assemble(&session, &WeightedCharEstimator, &vars());
    let memory = context.memory.as_ref().expect("memory message");
    assert!(memory.text_content().contains("we talked about trains"));
    assert_eq!(context.context_start_index, 6);

    let messages = context.into_messages();
    assert!(messages[1].text_content().contains("recap"));
}

#[test]
fn test_weighted_estimator_is_deterministic() {
    let estimator = WeightedCharEstimator;
    let text = "Hello, 世界! 123";
    assert_eq!(estimator.estimate(text), estimator.estimate(text));
    assert!(estimator.estimate(text) > estimator.estimate("Hello"));
}
