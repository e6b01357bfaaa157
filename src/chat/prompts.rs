//! Prompt strings used by the summarizer and the context assembler

/// Instruction appended to the conversation to request a title
pub const TOPIC_PROMPT: &str = "Please generate a four to five word title summarizing our conversation without any lead-in, punctuation, quotation marks, periods, symbols, bold text, or additional text. Remove enclosing quotation marks.";

/// Instruction appended to the history to request a memory summary
pub const SUMMARIZE_PROMPT: &str =
    "Summarize the discussion briefly in 200 words or less to use as a prompt for future context.";

/// Maximum number of characters kept in a generated title
pub const MAX_TOPIC_CHARS: usize = 50;

/// Wraps long-term memory for inclusion as a system message
pub fn history_recap(memory: &str) -> String {
    format!("This is a summary of the chat history as a recap: {}", memory)
}

/// Cleans up a generated title
///
/// Strips surrounding quotes and asterisks, trailing punctuation and
/// whitespace, then bounds the result to [`MAX_TOPIC_CHARS`] characters.
///
/// # Examples
///
/// ```
/// use chatweave::chat::prompts::trim_topic;
///
/// assert_eq!(trim_topic("\"Rust Borrow Checker Basics.\""), "Rust Borrow Checker Basics");
/// assert_eq!(trim_topic("**Async Runtimes**"), "Async Runtimes");
/// ```
pub fn trim_topic(topic: &str) -> String {
    const QUOTES: &[char] = &['"', '\u{201c}', '\u{201d}', '*'];
    const TRAILING: &[char] = &[
        '"', '\u{201c}', '\u{201d}', '*', ',', '.', '!', '?', '\u{ff0c}', '\u{3002}', '\u{ff01}',
        '\u{ff1f}', '\u{3001}',
    ];

    let trimmed = topic
        .trim()
        .trim_matches(QUOTES)
        .trim_end_matches(TRAILING)
        .trim();

    trimmed.chars().take(MAX_TOPIC_CHARS).collect::<String>().trim_end().to_string()
}
