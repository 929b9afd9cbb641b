//! Scripted sub-dialog for tests and demos.
//!
//! Plays back a queue of prepared steps, one per call, and records every
//! call it receives. Once the script runs out, every call answers
//! `Waiting` without replying.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::dialog::{DialogError, TurnOutcome};
use crate::ports::{DialogTurn, SubDialog, SubDialogError};

/// Which entry point the dispatcher used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedCall {
    Begin,
    Resume,
    Reprompt,
}

#[derive(Debug, Clone)]
struct ScriptedStep {
    reply: Option<String>,
    result: Result<TurnOutcome, DialogError>,
}

/// Sub-dialog that follows a prepared script.
#[derive(Debug)]
pub struct ScriptedDialog {
    id: String,
    steps: Mutex<VecDeque<ScriptedStep>>,
    calls: Mutex<Vec<(ScriptedCall, String)>>,
}

impl ScriptedDialog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Next call returns `outcome` silently.
    pub fn then(self, outcome: TurnOutcome) -> Self {
        self.push(ScriptedStep {
            reply: None,
            result: Ok(outcome),
        })
    }

    /// Next call sends `reply`, then returns `outcome`.
    pub fn then_reply(self, reply: impl Into<String>, outcome: TurnOutcome) -> Self {
        self.push(ScriptedStep {
            reply: Some(reply.into()),
            result: Ok(outcome),
        })
    }

    /// Next call fails with `DialogError::Failed`.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(ScriptedStep {
            reply: None,
            result: Err(DialogError::Failed(message.into())),
        })
    }

    /// Calls received so far, with the intent of each turn.
    pub fn calls(&self) -> Vec<(ScriptedCall, String)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, call: ScriptedCall) -> usize {
        lock(&self.calls).iter().filter(|(c, _)| *c == call).count()
    }

    fn push(self, step: ScriptedStep) -> Self {
        lock(&self.steps).push_back(step);
        self
    }

    async fn play(
        &self,
        call: ScriptedCall,
        turn: DialogTurn<'_>,
    ) -> Result<TurnOutcome, SubDialogError> {
        lock(&self.calls).push((call, turn.signal.intent().to_string()));

        let step = lock(&self.steps).pop_front();
        let Some(step) = step else {
            return Ok(TurnOutcome::Waiting);
        };

        if let Some(reply) = step.reply {
            turn.ctx.send_text(reply).await?;
        }
        Ok(step.result?)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SubDialog for ScriptedDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        self.play(ScriptedCall::Begin, turn).await
    }

    async fn resume(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        self.play(ScriptedCall::Resume, turn).await
    }

    async fn reprompt(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        self.play(ScriptedCall::Reprompt, turn).await
    }
}
