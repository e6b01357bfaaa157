//! Input and system prompt templates
//!
//! Templates contain `{{name}}` placeholders. Known names are
//! `ServiceProvider`, `cutoff`, `model`, `time`, `lang` and `input`;
//! unknown placeholders are left untouched.

use std::sync::OnceLock;

use chrono::Local;
use regex::{Captures, Regex};

/// Default per-session input template
pub const DEFAULT_INPUT_TEMPLATE: &str = "{{input}}";

/// Template of the synthesized system prompt sent to GPT-family models
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are ChatGPT, a large language model trained by {{ServiceProvider}}.
Knowledge cutoff: {{cutoff}}
Current model: {{model}}
Current time: {{time}}";

/// Knowledge cutoff used for models missing from [`KNOWLEDGE_CUTOFF`]
pub const DEFAULT_KNOWLEDGE_CUTOFF: &str = "2021-09";

/// Known knowledge cutoff dates by model id
pub const KNOWLEDGE_CUTOFF: &[(&str, &str)] = &[
    ("gpt-4-turbo", "2023-12"),
    ("gpt-4-turbo-preview", "2023-12"),
    ("gpt-4-1106-preview", "2023-04"),
    ("gpt-4-0125-preview", "2023-12"),
    ("gpt-4-vision-preview", "2023-04"),
    ("gpt-4o", "2023-10"),
    ("gpt-4o-mini", "2023-10"),
    ("gemini-pro", "2023-12"),
    ("gemini-pro-vision", "2023-12"),
];

/// Returns the knowledge cutoff of a model
///
/// # Examples
///
/// ```
/// use chatweave::chat::template::knowledge_cutoff;
///
/// assert_eq!(knowledge_cutoff("gpt-4o"), "2023-10");
/// assert_eq!(knowledge_cutoff("some-local-model"), "2021-09");
/// ```
pub fn knowledge_cutoff(model: &str) -> &'static str {
    KNOWLEDGE_CUTOFF
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, cutoff)| *cutoff)
        .unwrap_or(DEFAULT_KNOWLEDGE_CUTOFF)
}

/// Values substituted into a template besides the user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    /// Provider of the model (e.g. "OpenAI")
    pub service_provider: String,
    /// Knowledge cutoff date
    pub cutoff: String,
    /// Model id
    pub model: String,
    /// Current local time
    pub time: String,
    /// UI language code
    pub lang: String,
}

impl TemplateVars {
    /// Builds the variables for `model`, stamping the current local time
    pub fn new(model: &str, service_provider: &str, lang: &str) -> Self {
        Self {
            service_provider: service_provider.to_string(),
            cutoff: knowledge_cutoff(model).to_string(),
            model: model.to_string(),
            time: Local::now().to_rfc2822(),
            lang: lang.to_string(),
        }
    }

    fn lookup<'a>(&'a self, name: &str, input: &'a str) -> Option<&'a str> {
        match name {
            "ServiceProvider" => Some(&self.service_provider),
            "cutoff" => Some(&self.cutoff),
            "model" => Some(&self.model),
            "time" => Some(&self.time),
            "lang" => Some(&self.lang),
            "input" => Some(input),
            _ => None,
        }
    }
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex is valid"))
}

/// Renders `template` around `input`
///
/// When the input already starts with the template, the template is
/// dropped. A template without `{{input}}` gets it appended on a new line.
/// Substitution is a single pass, so placeholders inside the user input
/// are never expanded.
///
/// # Arguments
///
/// * `input` - Raw user input
/// * `template` - Template text
/// * `vars` - Values for the named placeholders
///
/// # Examples
///
/// ```
/// use chatweave::chat::template::{fill_template_with, TemplateVars};
///
/// let vars = TemplateVars::new("gpt-4o", "OpenAI", "en");
/// let out = fill_template_with("hello", "[{{model}}] {{input}}", &vars);
/// assert_eq!(out, "[gpt-4o] hello");
///
/// let out = fill_template_with("hello", "Be brief.", &vars);
/// assert_eq!(out, "Be brief.\nhello");
/// ```
pub fn fill_template_with(input: &str, template: &str, vars: &TemplateVars) -> String {
    let mut output = if input.starts_with(template) {
        String::new()
    } else {
        template.to_string()
    };

    if !output.contains("{{input}}") {
        output.push_str("\n{{input}}");
    }

    placeholder()
        .replace_all(&output, |caps: &Captures| {
            vars.lookup(&caps[1], input)
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars {
            service_provider: "OpenAI".to_string(),
            cutoff: "2023-10".to_string(),
            model: "gpt-4o".to_string(),
            time: "now".to_string(),
            lang: "en".to_string(),
        }
    }

    #[test]
    fn test_default_template_is_identity() {
        assert_eq!(fill_template_with("hi there", DEFAULT_INPUT_TEMPLATE, &vars()), "hi there");
    }

    #[test]
    fn test_system_template_renders_all_vars() {
        let out = fill_template_with("", DEFAULT_SYSTEM_TEMPLATE, &vars());
        assert!(out.contains("trained by OpenAI."));
        assert!(out.contains("Knowledge cutoff: 2023-10"));
        assert!(out.contains("Current model: gpt-4o"));
        assert!(out.contains("Current time: now"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_duplicate_template_is_dropped() {
        let out = fill_template_with("Translate: bonjour", "Translate:", &vars());
        assert_eq!(out, "\nTranslate: bonjour");
    }

    #[test]
    fn test_placeholders_replaced_globally() {
        let out = fill_template_with("x", "{{model}}/{{model}} {{input}}", &vars());
        assert_eq!(out, "gpt-4o/gpt-4o x");
    }

    #[test]
    fn test_input_placeholders_not_expanded() {
        let out = fill_template_with("say {{model}}", "{{input}}", &vars());
        assert_eq!(out, "say {{model}}");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let out = fill_template_with("x", "{{nope}} {{input}}", &vars());
        assert_eq!(out, "{{nope}} x");
    }

    #[test]
    fn test_knowledge_cutoff_fallback() {
        assert_eq!(knowledge_cutoff("gemini-pro"), "2023-12");
        assert_eq!(knowledge_cutoff("llama3"), DEFAULT_KNOWLEDGE_CUTOFF);
    }
}
