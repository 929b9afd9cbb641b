//! Permission evaluation for requested intents.
//!
//! A fixed, ordered policy table decides whether an intent may run given
//! the currently active sub-dialog. The first matching row wins; intents
//! no row matches are allowed. Evaluation is pure.

use once_cell::sync::Lazy;

use super::intents::{BOOK_TABLE, BOOK_TABLE_CANCEL, BOOK_TABLE_SUBMIT, CANCEL, WHO_ARE_YOU};

/// Reason given when a cancel arrives with nothing cancellable running.
pub const NOTHING_TO_CANCEL: &str = "Sorry, there is nothing to cancel.";

/// Decision for one requested intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOutcome {
    pub allowed: bool,
    /// User-facing explanation; empty when allowed.
    pub reason: String,
}

impl PermissionOutcome {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// One row of the policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRule {
    /// `intent` only makes sense while `owner` is active, typically a card
    /// button tied to one dialog.
    CardOnly {
        intent: String,
        owner: String,
        guidance: String,
    },
    /// `intent` is only valid while one of `within` is active.
    OnlyWithin {
        intent: String,
        within: Vec<String>,
        reason: String,
    },
    /// `intent` may not start while one of `blocked_by` owns the turn.
    ExclusiveWith {
        intent: String,
        blocked_by: Vec<String>,
        reason: String,
    },
}

impl PolicyRule {
    /// Returns the denial reason if this row rejects the request.
    fn denies(&self, requested: &str, active: Option<&str>) -> Option<&str> {
        match self {
            PolicyRule::CardOnly {
                intent,
                owner,
                guidance,
            } => (intent == requested && active != Some(owner.as_str()))
                .then_some(guidance.as_str()),
            PolicyRule::OnlyWithin {
                intent,
                within,
                reason,
            } => {
                let inside = active.is_some_and(|a| within.iter().any(|w| w == a));
                (intent == requested && !inside).then_some(reason.as_str())
            }
            PolicyRule::ExclusiveWith {
                intent,
                blocked_by,
                reason,
            } => {
                let blocked = active.is_some_and(|a| blocked_by.iter().any(|b| b == a));
                (intent == requested && blocked).then_some(reason.as_str())
            }
        }
    }
}

static DEFAULT_RULES: Lazy<Vec<PolicyRule>> = Lazy::new(|| {
    let booking_guidance = "That button belongs to a table booking that is no longer open. \
                            Say 'book a table' to start a new reservation.";
    vec![
        PolicyRule::CardOnly {
            intent: BOOK_TABLE_SUBMIT.to_string(),
            owner: BOOK_TABLE.to_string(),
            guidance: booking_guidance.to_string(),
        },
        PolicyRule::CardOnly {
            intent: BOOK_TABLE_CANCEL.to_string(),
            owner: BOOK_TABLE.to_string(),
            guidance: booking_guidance.to_string(),
        },
        // Active dialog must be one of these; "neither" denies.
        PolicyRule::OnlyWithin {
            intent: CANCEL.to_string(),
            within: vec![BOOK_TABLE.to_string(), WHO_ARE_YOU.to_string()],
            reason: NOTHING_TO_CANCEL.to_string(),
        },
        PolicyRule::ExclusiveWith {
            intent: WHO_ARE_YOU.to_string(),
            blocked_by: vec![BOOK_TABLE.to_string()],
            reason: "We're in the middle of booking a table. \
                     Say 'cancel' first if you'd like to change your name."
                .to_string(),
        },
    ]
});

/// Evaluates requested intents against the policy table.
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    rules: Vec<PolicyRule>,
}

impl Default for PermissionEvaluator {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl PermissionEvaluator {
    /// Evaluator with an explicit table and no built-in rows.
    pub fn with_rules(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Appends a row after the existing ones.
    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The policy table, in evaluation order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Decides whether `requested` may run while `active` owns the turn.
    pub fn evaluate(&self, requested: &str, active: Option<&str>) -> PermissionOutcome {
        self.rules
            .iter()
            .find_map(|rule| rule.denies(requested, active))
            .map(PermissionOutcome::deny)
            .unwrap_or_else(PermissionOutcome::allow)
    }
}
