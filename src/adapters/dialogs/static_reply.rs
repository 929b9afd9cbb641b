//! One-shot dialog: reply once and finish.

use async_trait::async_trait;

use crate::domain::dialog::TurnOutcome;
use crate::ports::{DialogTurn, SubDialog, SubDialogError};

/// Sends a fixed reply and completes in the same turn.
#[derive(Debug, Clone)]
pub struct StaticReplyDialog {
    id: String,
    text: String,
}

impl StaticReplyDialog {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl SubDialog for StaticReplyDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        turn.ctx.send_text(self.text.clone()).await?;
        Ok(TurnOutcome::done())
    }

    async fn resume(&self, _turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        // Never stays on the stack, so any resume is a stale frame.
        Ok(TurnOutcome::Empty)
    }
}
