//! Turn outcomes and outgoing messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::signal::TurnSignal;

/// How a sub-dialog (or the dispatcher itself) left the turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Nothing handled the turn.
    #[default]
    Empty,
    /// The active dialog is waiting for more input.
    Waiting,
    /// The dialog finished.
    Complete(DialogResult),
    /// The dialog was cancelled by the user.
    Cancelled,
}

impl TurnOutcome {
    /// Plain successful completion with no result value.
    pub fn done() -> Self {
        TurnOutcome::Complete(DialogResult::Done(None))
    }

    /// Plain successful completion carrying a result value.
    pub fn done_with(value: impl Into<Value>) -> Self {
        TurnOutcome::Complete(DialogResult::Done(Some(value.into())))
    }

    /// The dialog yields to a higher-priority request.
    pub fn interrupted_by(signal: TurnSignal) -> Self {
        TurnOutcome::Complete(DialogResult::Interruption(signal))
    }

    /// The dialog suspends itself; `resume_with` restores the earlier flow.
    pub fn abandoned(resume_with: TurnSignal) -> Self {
        TurnOutcome::Complete(DialogResult::Abandon(resume_with))
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Empty => "empty",
            TurnOutcome::Waiting => "waiting",
            TurnOutcome::Complete(DialogResult::Done(_)) => "complete",
            TurnOutcome::Complete(DialogResult::Interruption(_)) => "complete:interruption",
            TurnOutcome::Complete(DialogResult::Abandon(_)) => "complete:abandon",
            TurnOutcome::Cancelled => "cancelled",
        }
    }
}

/// Result carried by a completed dialog.
///
/// Exactly one reason/payload combination exists per result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "payload", rename_all = "snake_case")]
pub enum DialogResult {
    /// Finished normally, with an optional opaque value.
    Done(Option<Value>),
    /// Ended itself because the carried signal should run instead.
    Interruption(TurnSignal),
    /// Must be resumed later using the carried signal.
    Abandon(TurnSignal),
}

/// A message sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
}

impl OutgoingMessage {
    /// Plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suggested_actions: Vec::new(),
        }
    }

    /// Attaches suggested follow-up actions.
    pub fn with_suggested_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_actions = actions.into_iter().map(Into::into).collect();
        self
    }
}
