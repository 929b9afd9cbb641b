//! Turn signals - the normalized form of one incoming user message.
//!
//! A [`TurnSignal`] is what the recognizer hands the dispatcher: an intent
//! name plus the entities extracted from the utterance. Card submissions
//! arrive as flat JSON objects and are converted with
//! [`TurnSignal::from_card`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::ValidationError;

use super::intents::{self, CARD_INTENT_FIELD, CARD_TEXT_FIELDS};

/// A named value extracted from the user's message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityValue {
    name: String,
    value: Value,
}

impl EntityValue {
    /// Creates a new entity.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Entity name as produced by the recognizer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw entity value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value as text, if it is a non-blank string.
    ///
    /// Recognizers sometimes wrap single values in an array, so a
    /// one-element string array is accepted too.
    pub fn as_text(&self) -> Option<&str> {
        let text = match &self.value {
            Value::String(s) => Some(s.as_str()),
            Value::Array(items) if items.len() == 1 => items[0].as_str(),
            _ => None,
        }?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Normalized intent + entities for a single turn.
///
/// Immutable once built: the builder methods consume `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSignal {
    #[serde(default = "none_intent", deserialize_with = "deserialize_intent")]
    intent: String,
    #[serde(default)]
    entities: Vec<EntityValue>,
}

impl TurnSignal {
    /// Creates a signal with no entities. Blank intents become `None`.
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: normalize_intent(intent.into()),
            entities: Vec::new(),
        }
    }

    /// The "nothing recognized" signal.
    pub fn none() -> Self {
        Self::new(intents::NONE)
    }

    /// Appends an entity, preserving order.
    pub fn with_entity(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entities.push(EntityValue::new(name, value));
        self
    }

    /// Builds a signal from a card submission.
    ///
    /// The reserved `intent` field names the target intent; every other
    /// field becomes an entity, in field order. A missing intent yields the
    /// `None` sentinel.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFormat` if `intent` is present but
    /// not a string.
    pub fn from_card(card: &Map<String, Value>) -> Result<Self, ValidationError> {
        let intent = match card.get(CARD_INTENT_FIELD) {
            None | Some(Value::Null) => intents::NONE.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ValidationError::invalid_format(
                    CARD_INTENT_FIELD,
                    format!("expected a string, got {}", other),
                ))
            }
        };

        let entities = card
            .iter()
            .filter(|(name, _)| name.as_str() != CARD_INTENT_FIELD)
            .map(|(name, value)| EntityValue::new(name.clone(), value.clone()))
            .collect();

        Ok(Self {
            intent: normalize_intent(intent),
            entities,
        })
    }

    /// Intent name.
    pub fn intent(&self) -> &str {
        &self.intent
    }

    /// True when this is the "nothing recognized" sentinel.
    pub fn is_none(&self) -> bool {
        intents::is_none_intent(&self.intent)
    }

    /// All entities, in recognizer order.
    pub fn entities(&self) -> &[EntityValue] {
        &self.entities
    }

    /// First entity with the given name.
    pub fn entity(&self, name: &str) -> Option<&EntityValue> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// First non-blank text value among the given entity names, tried in order.
    pub fn first_text(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| {
            self.entities
                .iter()
                .filter(|e| e.name == *name)
                .find_map(EntityValue::as_text)
        })
    }
}

/// A suggestion-card payload decoded from its JSON string form.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedCard {
    /// Display text the user "said" by pressing the button.
    pub text: Option<String>,
    /// Signal to dispatch in place of the original one.
    pub signal: TurnSignal,
}

impl NestedCard {
    /// Decodes a JSON-encoded card payload.
    ///
    /// Text fields (`text`, `query`) are lifted out as display text and are
    /// not turned into entities.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFormat` if the string is not JSON,
    /// is not an object, or carries a non-string intent.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            ValidationError::invalid_format(intents::CARD_PAYLOAD_FIELD, e.to_string())
        })?;

        let Value::Object(mut card) = value else {
            return Err(ValidationError::invalid_format(
                intents::CARD_PAYLOAD_FIELD,
                "expected a JSON object",
            ));
        };

        let mut text = None;
        for field in CARD_TEXT_FIELDS {
            if let Some(Value::String(s)) = card.remove(field) {
                if text.is_none() && !s.trim().is_empty() {
                    text = Some(s);
                }
            }
        }

        let signal = TurnSignal::from_card(&card)?;
        Ok(Self { text, signal })
    }
}

fn none_intent() -> String {
    intents::NONE.to_string()
}

fn normalize_intent(intent: String) -> String {
    if intent.trim().is_empty() {
        none_intent()
    } else {
        intent.trim().to_string()
    }
}

fn deserialize_intent<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let intent = Option::<String>::deserialize(deserializer)?;
    Ok(normalize_intent(intent.unwrap_or_default()))
}
