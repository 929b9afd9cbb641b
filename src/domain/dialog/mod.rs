//! Dialog Domain Module
//!
//! The vocabulary and pure decision logic of the turn dispatcher.
//!
//! # Architecture
//!
//! - **TurnSignal**: normalized intent + entities for one message
//! - **PermissionEvaluator**: policy table deciding if an intent may run now
//! - **ActiveConversationState**: the per-conversation sub-dialog stack
//! - **Reconciler**: settles a finished turn against the stack
//!
//! The async orchestration that drives sub-dialogs lives in
//! `application::dispatch`.

pub mod errors;
pub mod intents;
pub mod outcome;
pub mod permission;
pub mod reconciler;
pub mod signal;
pub mod state;

pub use errors::DialogError;
pub use outcome::{DialogResult, OutgoingMessage, TurnOutcome};
pub use permission::{PermissionEvaluator, PermissionOutcome, PolicyRule, NOTHING_TO_CANCEL};
pub use reconciler::{settle, NextAction, OutcomeSource};
pub use signal::{EntityValue, NestedCard, TurnSignal};
pub use state::{capitalize, ActiveConversationState, DialogFrame, UserProfile, UNKNOWN_USER_NAME};
