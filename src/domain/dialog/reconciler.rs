//! Outcome reconciliation.
//!
//! Once a sub-dialog (or the dispatcher's built-in handling) has produced a
//! [`TurnOutcome`], the reconciler settles the dialog stack and tells the
//! orchestrator what to do next. Settling is synchronous and touches only
//! the state it is given; the orchestrator performs the follow-up I/O.

use super::outcome::{DialogResult, TurnOutcome};
use super::signal::TurnSignal;
use super::state::ActiveConversationState;

/// Who produced the outcome being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    /// The dialog on top of the stack.
    ActiveFrame,
    /// Dispatcher-level handling that never pushed a frame
    /// (built-in cancel, identification shortcut, fallback).
    Dispatcher,
}

/// Follow-up the orchestrator must perform after settling.
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    /// Nothing more to do; return this outcome.
    Finish(TurnOutcome),
    /// Run the begin path for this signal.
    Redispatch(TurnSignal),
    /// A suspended frame was moved back to the top; resume it with this signal.
    ResumeRestored(TurnSignal),
    /// The frame now on top was suspended; ask it to re-prompt.
    Reprompt,
    /// Send the closing prompt, then return this outcome.
    ClosingPrompt(TurnOutcome),
}

/// Settles `outcome` against the dialog stack.
///
/// After this returns, `state.active_dialog_id()` names whatever should
/// receive the next turn, except for `Redispatch`/`ResumeRestored`/
/// `Reprompt`, where the follow-up dispatch settles it.
pub fn settle(
    outcome: TurnOutcome,
    source: OutcomeSource,
    state: &mut ActiveConversationState,
) -> NextAction {
    let finished_frame = |state: &mut ActiveConversationState| {
        if source == OutcomeSource::ActiveFrame {
            state.pop();
        }
    };

    match outcome {
        TurnOutcome::Empty => NextAction::Finish(TurnOutcome::Empty),
        TurnOutcome::Waiting => NextAction::Finish(TurnOutcome::Waiting),
        TurnOutcome::Complete(DialogResult::Interruption(signal)) => {
            // The interrupted dialog already decided to end; drop it.
            finished_frame(state);
            NextAction::Redispatch(signal)
        }
        TurnOutcome::Complete(DialogResult::Abandon(signal)) => {
            finished_frame(state);
            if state.restore(signal.intent()) {
                NextAction::ResumeRestored(signal)
            } else {
                NextAction::Redispatch(signal)
            }
        }
        TurnOutcome::Complete(DialogResult::Done(value)) => {
            finished_frame(state);
            if state.is_idle() {
                NextAction::ClosingPrompt(TurnOutcome::Complete(DialogResult::Done(value)))
            } else {
                NextAction::Reprompt
            }
        }
        TurnOutcome::Cancelled => {
            state.clear();
            NextAction::ClosingPrompt(TurnOutcome::Cancelled)
        }
    }
}
