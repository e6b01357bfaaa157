//! Approximate token estimation
//!
//! The context assembler and the summarizer only need a deterministic,
//! cheap approximation of how many tokens a piece of text costs. The
//! estimator is a trait so callers can plug in a real tokenizer.

use crate::chat::ChatMessage;

/// Estimates the token cost of a text
///
/// Implementations must be pure and deterministic: the same input always
/// yields the same estimate.
#[cfg_attr(test, mockall::automock)]
pub trait TokenEstimator: Send + Sync {
    /// Returns the approximate number of tokens in `text`
    fn estimate(&self, text: &str) -> usize;
}

/// Character-class weighted estimator
///
/// ASCII letters cost a quarter token, other ASCII characters half a token
/// and every non-ASCII character one and a half tokens. The weighted sum is
/// rounded up.
///
/// # Examples
///
/// ```
/// use chatweave::tokens::{TokenEstimator, WeightedCharEstimator};
///
/// let estimator = WeightedCharEstimator;
/// assert_eq!(estimator.estimate("abcd"), 1);
/// assert_eq!(estimator.estimate(""), 0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedCharEstimator;

impl TokenEstimator for WeightedCharEstimator {
    fn estimate(&self, text: &str) -> usize {
        // Accumulate in quarter tokens to stay in integer arithmetic.
        let quarters: usize = text
            .chars()
            .map(|c| {
                if c.is_ascii() {
                    if ('A'..='z').contains(&c) {
                        1
                    } else {
                        2
                    }
                } else {
                    6
                }
            })
            .sum();
        (quarters + 3) / 4
    }
}

/// Coarse estimator: characters / 4, rounded up
///
/// Approximates GPT tokenization for English text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioEstimator;

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        (text.chars().count() + 3) / 4
    }
}

/// Sums the estimated token cost of the text content of `messages`
///
/// # Examples
///
/// ```
/// use chatweave::chat::ChatMessage;
/// use chatweave::tokens::{count_messages, CharRatioEstimator};
///
/// let messages = vec![ChatMessage::user("abcd"), ChatMessage::assistant("efgh")];
/// assert_eq!(count_messages(&CharRatioEstimator, &messages), 2);
/// ```
pub fn count_messages(estimator: &dyn TokenEstimator, messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|message| estimator.estimate(&message.text_content()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_letters_quarter_token() {
        assert_eq!(WeightedCharEstimator.estimate("abcdefgh"), 2);
    }

    #[test]
    fn test_weighted_rounds_up() {
        assert_eq!(WeightedCharEstimator.estimate("a"), 1);
        assert_eq!(WeightedCharEstimator.estimate("abcde"), 2);
    }

    #[test]
    fn test_weighted_punctuation_half_token() {
        // four spaces = 2 tokens
        assert_eq!(WeightedCharEstimator.estimate("    "), 2);
    }

    #[test]
    fn test_weighted_non_ascii() {
        // 2 CJK chars = 3 tokens
        assert_eq!(WeightedCharEstimator.estimate("你好"), 3);
    }

    #[test]
    fn test_char_ratio_estimator() {
        assert_eq!(CharRatioEstimator.estimate("test"), 1);
        assert_eq!(CharRatioEstimator.estimate("hello world"), 3);
        assert_eq!(CharRatioEstimator.estimate(""), 0);
    }

    #[test]
    fn test_count_messages_ignores_images() {
        let mut message = ChatMessage::user("abcd");
        message.content = crate::chat::MessageContent::Parts(vec![
            crate::chat::ContentPart::text("abcd"),
            crate::chat::ContentPart::image_url("https://example.com/a.png"),
        ]);
        assert_eq!(count_messages(&CharRatioEstimator, &[message]), 1);
    }

    #[test]
    fn test_mock_estimator_is_used() {
        let mut mock = MockTokenEstimator::new();
        mock.expect_estimate().returning(|_| 10);
        let messages = vec![ChatMessage::user("x"), ChatMessage::user("y")];
        assert_eq!(count_messages(&mock, &messages), 20);
    }
}
