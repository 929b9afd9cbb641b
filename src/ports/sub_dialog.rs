//! Sub-Dialog Port - Contract for the task dialogs the dispatcher drives.
//!
//! A sub-dialog is a self-contained multi-turn interaction (booking a
//! table, identifying the user, ...). It is registered under the name of
//! the intent that starts it and is otherwise a black box: the dispatcher
//! only calls `begin`, `resume` and `reprompt`, and interprets the
//! returned [`TurnOutcome`].
//!
//! Sub-dialogs are stateless handles. Any multi-turn progress lives in the
//! [`DialogFrame`] they are handed, which the dispatcher persists.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::dialog::{
    DialogError, DialogFrame, OutgoingMessage, TurnOutcome, TurnSignal, UserProfile,
};
use crate::domain::foundation::ConversationId;

use super::message_channel::{ChannelError, MessageChannel};

/// Per-turn context: who we are talking to and how to reply.
pub struct TurnContext {
    conversation_id: ConversationId,
    text: String,
    channel: Arc<dyn MessageChannel>,
    sent: Vec<OutgoingMessage>,
}

impl TurnContext {
    /// Creates a context for one incoming message.
    pub fn new(
        conversation_id: ConversationId,
        text: impl Into<String>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            conversation_id,
            text: text.into(),
            channel,
            sent: Vec::new(),
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// What the user said (or the card button they pressed).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the display text, e.g. with a suggestion card's query.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Sends a message and records it.
    pub async fn send(&mut self, message: OutgoingMessage) -> Result<(), ChannelError> {
        self.channel.send(self.conversation_id, &message).await?;
        self.sent.push(message);
        Ok(())
    }

    /// Sends a plain text message.
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), ChannelError> {
        self.send(OutgoingMessage::text(text)).await
    }

    /// Messages sent so far this turn.
    pub fn sent(&self) -> &[OutgoingMessage] {
        &self.sent
    }

    /// Number of messages sent so far this turn.
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    /// Consumes the context, returning the messages sent this turn.
    pub fn into_sent(self) -> Vec<OutgoingMessage> {
        self.sent
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("conversation_id", &self.conversation_id)
            .field("text", &self.text)
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

/// Everything a sub-dialog gets for one call.
pub struct DialogTurn<'a> {
    pub ctx: &'a mut TurnContext,
    pub signal: &'a TurnSignal,
    /// The dialog's own frame; `frame.state` is its private storage.
    pub frame: &'a mut DialogFrame,
    pub profile: &'a mut UserProfile,
}

/// Errors a sub-dialog can return
#[derive(Debug, thiserror::Error)]
pub enum SubDialogError {
    /// The dialog itself failed; the dispatcher recovers locally.
    #[error(transparent)]
    Dialog(#[from] DialogError),

    /// A reply could not be delivered; the turn fails.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Port for a multi-turn task dialog
#[async_trait]
pub trait SubDialog: Send + Sync {
    /// Unique name; also the intent that starts this dialog.
    fn id(&self) -> &str;

    /// Start the dialog. The frame is fresh and already on the stack.
    async fn begin(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError>;

    /// Continue the dialog with the next user turn.
    ///
    /// Returning `TurnOutcome::Empty` without sending anything means "not
    /// mine": the dispatcher then starts whatever the signal asks for and
    /// keeps this dialog suspended underneath.
    async fn resume(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError>;

    /// The dialog was suspended and is active again; ask the user to pick
    /// up where they left off.
    async fn reprompt(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        let _ = turn;
        Ok(TurnOutcome::Waiting)
    }
}
