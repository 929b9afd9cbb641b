//! Dispatcher behaviour configuration

use serde::Deserialize;
use url::Url;

use super::error::ValidationError;

/// Upper bound accepted for `max_redispatch_depth`
pub const MAX_REDISPATCH_DEPTH_LIMIT: usize = 10;

/// User-facing texts and limits for the turn dispatcher
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Prompt sent when a dialog finishes or is cancelled
    #[serde(default = "default_closing_prompt")]
    pub closing_prompt: String,

    /// Suggested follow-ups shown with the closing prompt (comma-separated)
    #[serde(default = "default_suggested_actions")]
    pub suggested_actions: String,

    /// Reply for intents no dialog handles
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Web search endpoint offered with the fallback reply
    #[serde(default = "default_fallback_search_url")]
    pub fallback_search_url: String,

    /// Reply when a dialog fails or re-dispatching runs away
    #[serde(default = "default_error_message")]
    pub error_message: String,

    /// Reply when a suggestion card carries an unreadable payload
    #[serde(default = "default_malformed_card_message")]
    pub malformed_card_message: String,

    /// Maximum re-dispatch hops (interruption, abandon, card payload) per turn
    #[serde(default = "default_max_redispatch_depth")]
    pub max_redispatch_depth: usize,
}

impl BotConfig {
    /// Suggested follow-up actions as a vector
    pub fn suggested_actions_list(&self) -> Vec<String> {
        self.suggested_actions
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate bot configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.closing_prompt.trim().is_empty() {
            return Err(ValidationError::MissingRequired("bot.closing_prompt"));
        }
        if self.fallback_message.trim().is_empty() {
            return Err(ValidationError::MissingRequired("bot.fallback_message"));
        }
        if self.max_redispatch_depth == 0 || self.max_redispatch_depth > MAX_REDISPATCH_DEPTH_LIMIT
        {
            return Err(ValidationError::InvalidRedispatchDepth);
        }
        match Url::parse(&self.fallback_search_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(ValidationError::InvalidSearchUrl),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            closing_prompt: default_closing_prompt(),
            suggested_actions: default_suggested_actions(),
            fallback_message: default_fallback_message(),
            fallback_search_url: default_fallback_search_url(),
            error_message: default_error_message(),
            malformed_card_message: default_malformed_card_message(),
            max_redispatch_depth: default_max_redispatch_depth(),
        }
    }
}

fn default_closing_prompt() -> String {
    "Is there anything else I can help you with?".to_string()
}

fn default_suggested_actions() -> String {
    "Book a table,Who are you?,What can you do?,Find cafe locations".to_string()
}

fn default_fallback_message() -> String {
    "I'm sorry, I don't understand that yet.".to_string()
}

fn default_fallback_search_url() -> String {
    "https://www.bing.com/search".to_string()
}

fn default_error_message() -> String {
    "Sorry, something went wrong on my side. Let's start over.".to_string()
}

fn default_malformed_card_message() -> String {
    "I couldn't read that selection. Please pick one of the options again.".to_string()
}

fn default_max_redispatch_depth() -> usize {
    3
}
