//! Model family classification and the model catalog
//!
//! Several behaviors key off the model id prefix: system prompt
//! injection, the summarization model and the client used for a call.
//! [`ModelFamily`] is the one place that classification happens.

use serde::{Deserialize, Serialize};

/// Provider family of a model, derived from its id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    /// OpenAI GPT models (`gpt*`)
    Gpt,
    /// Google Gemini models (`gemini*`)
    Gemini,
    /// Anthropic Claude models (`claude*`)
    Claude,
    /// Anything else
    Other,
}

impl ModelFamily {
    /// Classifies a model id
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::chat::ModelFamily;
    ///
    /// assert_eq!(ModelFamily::classify("gpt-4o"), ModelFamily::Gpt);
    /// assert_eq!(ModelFamily::classify("gemini-pro"), ModelFamily::Gemini);
    /// assert_eq!(ModelFamily::classify("claude-3-opus"), ModelFamily::Claude);
    /// assert_eq!(ModelFamily::classify("llama3"), ModelFamily::Other);
    /// ```
    pub fn classify(model: &str) -> Self {
        if model.starts_with("gpt") {
            ModelFamily::Gpt
        } else if model.starts_with("gemini") {
            ModelFamily::Gemini
        } else if model.starts_with("claude") {
            ModelFamily::Claude
        } else {
            ModelFamily::Other
        }
    }

    /// Whether the synthesized system prompt applies to `model`
    ///
    /// Narrower than [`ModelFamily::Gpt`]: only dashed ids such as
    /// `gpt-4o` qualify.
    pub fn accepts_system_prompt(model: &str) -> bool {
        model.starts_with("gpt-")
    }

    /// Default provider display name of the family
    pub fn provider_name(&self) -> &'static str {
        match self {
            ModelFamily::Gpt | ModelFamily::Other => "OpenAI",
            ModelFamily::Gemini => "Google",
            ModelFamily::Claude => "Anthropic",
        }
    }
}

/// One entry of the model catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Model id
    pub name: String,
    /// Whether the model can be selected
    #[serde(default = "default_available")]
    pub available: bool,
    /// Provider display name
    #[serde(default = "default_provider_name")]
    pub provider_name: String,
    /// Display name, when different from the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

fn default_available() -> bool {
    true
}

fn default_provider_name() -> String {
    "OpenAI".to_string()
}

impl ModelEntry {
    /// Available entry whose provider is derived from the id
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let provider_name = ModelFamily::classify(&name).provider_name().to_string();
        Self {
            name,
            available: true,
            provider_name,
            display_name: None,
        }
    }
}

/// Models shipped by default
pub fn default_models() -> Vec<ModelEntry> {
    [
        "gpt-4o-mini",
        "gpt-4o",
        "gpt-4-turbo",
        "gpt-3.5-turbo",
        "gemini-pro",
        "gemini-pro-vision",
        "claude-3-haiku-20240307",
        "claude-3-opus-20240229",
    ]
    .into_iter()
    .map(ModelEntry::new)
    .collect()
}

/// Model catalog: built-in models adjusted by a custom model list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<ModelEntry>,
}

impl ModelCatalog {
    /// Builds the catalog from base models and a comma-separated custom list
    ///
    /// Custom list syntax: `-all` disables everything, `-name` disables a
    /// model, `+name` or `name` enables (adding it when unknown) and
    /// `name=Display` also sets a display name.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::chat::{ModelCatalog, ModelEntry};
    ///
    /// let base = vec![ModelEntry::new("gpt-4o"), ModelEntry::new("gpt-4o-mini")];
    /// let catalog = ModelCatalog::new(base, "-all,+gpt-4o-mini,llama3=Llama");
    /// assert!(!catalog.is_available("gpt-4o"));
    /// assert!(catalog.is_available("gpt-4o-mini"));
    /// assert!(catalog.is_available("llama3"));
    /// ```
    pub fn new(base: Vec<ModelEntry>, custom_models: &str) -> Self {
        let mut models = base;

        for item in custom_models.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if item == "-all" {
                models.iter_mut().for_each(|m| m.available = false);
                continue;
            }
            if item == "+all" {
                models.iter_mut().for_each(|m| m.available = true);
                continue;
            }

            let (available, spec) = match item.strip_prefix('-') {
                Some(rest) => (false, rest),
                None => (true, item.strip_prefix('+').unwrap_or(item)),
            };
            let (name, display_name) = match spec.split_once('=') {
                Some((name, display)) => (name.trim(), Some(display.trim().to_string())),
                None => (spec, None),
            };
            if name.is_empty() {
                continue;
            }

            match models.iter_mut().find(|m| m.name == name) {
                Some(entry) => {
                    entry.available = available;
                    if display_name.is_some() {
                        entry.display_name = display_name;
                    }
                }
                None if available => {
                    let mut entry = ModelEntry::new(name);
                    entry.display_name = display_name;
                    models.push(entry);
                }
                None => {}
            }
        }

        Self { models }
    }

    /// All entries, available or not
    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    /// Looks up an entry by id
    pub fn find(&self, name: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Whether `name` is present and available
    pub fn is_available(&self, name: &str) -> bool {
        self.find(name).map(|m| m.available).unwrap_or(false)
    }

    /// Provider display name of `model`, defaulting to "OpenAI"
    pub fn provider_name(&self, model: &str) -> String {
        self.find(model)
            .map(|m| m.provider_name.clone())
            .unwrap_or_else(default_provider_name)
    }
}

/// Models used for summarization calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeModels {
    /// Cheaper GPT model used when available
    pub gpt: String,
    /// Fixed Gemini summarization model
    pub gemini: String,
}

impl Default for SummarizeModels {
    fn default() -> Self {
        Self {
            gpt: "gpt-4o-mini".to_string(),
            gemini: "gemini-pro".to_string(),
        }
    }
}

/// Picks the model used to summarize a session running on `current`
///
/// GPT models switch to the summarization model when the catalog lists it
/// as available and keep `current` otherwise. Gemini models always switch
/// to the Gemini summarization model. Other families are unchanged.
///
/// # Examples
///
/// ```
/// use chatweave::chat::{summarize_model_for, ModelCatalog, ModelEntry, SummarizeModels};
///
/// let catalog = ModelCatalog::new(vec![ModelEntry::new("gpt-4o-mini")], "");
/// let models = SummarizeModels::default();
/// assert_eq!(summarize_model_for("gpt-4o", &catalog, &models), "gpt-4o-mini");
/// assert_eq!(summarize_model_for("gemini-1.5-pro", &catalog, &models), "gemini-pro");
/// assert_eq!(summarize_model_for("claude-3-opus", &catalog, &models), "claude-3-opus");
/// ```
pub fn summarize_model_for(current: &str, catalog: &ModelCatalog, models: &SummarizeModels) -> String {
    match ModelFamily::classify(current) {
        ModelFamily::Gpt => {
            if catalog.is_available(&models.gpt) {
                models.gpt.clone()
            } else {
                current.to_string()
            }
        }
        ModelFamily::Gemini => models.gemini.clone(),
        ModelFamily::Claude | ModelFamily::Other => current.to_string(),
    }
}
