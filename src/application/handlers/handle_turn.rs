//! HandleTurnHandler - Command handler for one incoming user turn.
//!
//! Loads the conversation's dialog stack and the user's profile, runs the
//! dispatcher, then persists both. Turns of the same conversation are
//! serialized; different conversations run concurrently.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::dispatch::{DispatchError, TurnOrchestrator};
use crate::domain::dialog::{OutgoingMessage, TurnOutcome, TurnSignal};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{
    ConversationStateStore, MessageChannel, StateStorageError, TurnContext, UserProfileStore,
};

/// What the user sent.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    /// Already recognized by the language-understanding service.
    Signal(TurnSignal),
    /// A card button: flat field map with a reserved `intent` field.
    Card(Map<String, Value>),
}

/// Command to handle one turn.
#[derive(Debug, Clone)]
pub struct HandleTurnCommand {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    /// Raw text of the turn, as typed or as shown on the button.
    pub text: String,
    pub input: TurnInput,
}

impl HandleTurnCommand {
    pub fn signal(
        conversation_id: ConversationId,
        user_id: UserId,
        text: impl Into<String>,
        signal: TurnSignal,
    ) -> Self {
        Self {
            conversation_id,
            user_id,
            text: text.into(),
            input: TurnInput::Signal(signal),
        }
    }

    pub fn card(
        conversation_id: ConversationId,
        user_id: UserId,
        text: impl Into<String>,
        card: Map<String, Value>,
    ) -> Self {
        Self {
            conversation_id,
            user_id,
            text: text.into(),
            input: TurnInput::Card(card),
        }
    }
}

/// Result of a handled turn.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleTurnResult {
    pub outcome: TurnOutcome,
    /// Everything sent to the user during the turn, in order.
    pub replies: Vec<OutgoingMessage>,
    /// Sub-dialog that will receive the next turn, if any.
    pub active_dialog: Option<String>,
}

/// Errors that fail a turn outright.
#[derive(Debug, Error)]
pub enum HandleTurnError {
    #[error("State storage error: {0}")]
    Storage(#[from] StateStorageError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Handler for incoming turns.
pub struct HandleTurnHandler {
    orchestrator: Arc<TurnOrchestrator>,
    states: Arc<dyn ConversationStateStore>,
    profiles: Arc<dyn UserProfileStore>,
    channel: Arc<dyn MessageChannel>,
    locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl HandleTurnHandler {
    pub fn new(
        orchestrator: Arc<TurnOrchestrator>,
        states: Arc<dyn ConversationStateStore>,
        profiles: Arc<dyn UserProfileStore>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            orchestrator,
            states,
            profiles,
            channel,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn handle(&self, cmd: HandleTurnCommand) -> Result<HandleTurnResult, HandleTurnError> {
        let conversation_id = cmd.conversation_id;
        let lock = self.conversation_lock(conversation_id).await;
        let guard = lock.lock().await;

        let result = self.handle_locked(cmd).await;

        drop(guard);
        self.release_lock(conversation_id, lock).await;
        result
    }

    async fn handle_locked(
        &self,
        cmd: HandleTurnCommand,
    ) -> Result<HandleTurnResult, HandleTurnError> {
        let conversation_id = cmd.conversation_id;

        // 1. Load state
        let mut state = self
            .states
            .load_state(conversation_id)
            .await?
            .unwrap_or_default();
        let mut profile = self
            .profiles
            .load_profile(&cmd.user_id)
            .await?
            .unwrap_or_default();

        let mut ctx = TurnContext::new(conversation_id, cmd.text, self.channel.clone());

        // 2. Normalize card input
        let signal = match cmd.input {
            TurnInput::Signal(signal) => signal,
            TurnInput::Card(card) => match TurnSignal::from_card(&card) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "Rejected malformed card input"
                    );
                    let message = self.orchestrator.settings().malformed_card_message.clone();
                    ctx.send_text(message).await.map_err(DispatchError::from)?;
                    return Ok(HandleTurnResult {
                        outcome: TurnOutcome::Empty,
                        active_dialog: state.active_dialog_id().map(str::to_owned),
                        replies: ctx.into_sent(),
                    });
                }
            },
        };

        // 3. Dispatch
        let outcome = self
            .orchestrator
            .dispatch(&mut ctx, signal, &mut state, &mut profile)
            .await?;

        // 4. Persist
        self.states.save_state(conversation_id, &state).await?;
        self.profiles.save_profile(&cmd.user_id, &profile).await?;

        let active_dialog = state.active_dialog_id().map(str::to_owned);
        info!(
            conversation_id = %conversation_id,
            outcome = outcome.label(),
            active = ?active_dialog,
            replies = ctx.sent_count(),
            "Turn handled"
        );

        Ok(HandleTurnResult {
            outcome,
            replies: ctx.into_sent(),
            active_dialog,
        })
    }

    async fn conversation_lock(&self, conversation_id: ConversationId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(conversation_id).or_default().clone()
    }

    /// Forgets the lock once no other turn holds or awaits it.
    async fn release_lock(&self, conversation_id: ConversationId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&conversation_id);
        }
    }

    /// Number of conversations with a turn in flight.
    pub async fn in_flight(&self) -> usize {
        self.locks.lock().await.len()
    }
}
