//! Turn Orchestrator - the dispatcher.
//!
//! Owns the decision of which sub-dialog receives each turn:
//!
//! 1. check the requested intent against the permission policy
//! 2. resume the active sub-dialog, if any
//! 3. otherwise run the begin path for the requested intent
//! 4. reconcile the outcome against the dialog stack
//!
//! The orchestrator holds no per-conversation state. The dialog stack and
//! user profile are passed in for every turn and mutated in place; the
//! caller persists them afterwards.

use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::BotConfig;
use crate::domain::dialog::intents::{
    CANCEL, CARD_PAYLOAD_FIELD, USER_NAME, USER_NAME_PATTERN_ANY, WHAT_CAN_YOU_DO, WHO_ARE_YOU,
};
use crate::domain::dialog::{
    settle, ActiveConversationState, NestedCard, NextAction, OutcomeSource, OutgoingMessage,
    PermissionEvaluator, TurnOutcome, TurnSignal, UserProfile,
};
use crate::ports::{DialogTurn, SubDialogError, TurnContext};

use super::errors::{ConfigurationError, DispatchError};
use super::registry::SubDialogRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogCall {
    Begin,
    Resume,
    Reprompt,
}

/// An outcome plus who produced it.
#[derive(Debug)]
struct Step {
    outcome: TurnOutcome,
    source: OutcomeSource,
    /// The turn already ended in recovery; nothing else may begin.
    recovered: bool,
}

impl Step {
    fn frame(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            source: OutcomeSource::ActiveFrame,
            recovered: false,
        }
    }

    fn dispatcher(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            source: OutcomeSource::Dispatcher,
            recovered: false,
        }
    }

    fn recovered() -> Self {
        Self {
            recovered: true,
            ..Self::dispatcher(TurnOutcome::Empty)
        }
    }

    /// Whether the requested intent still needs the begin path.
    fn left_turn_open(&self) -> bool {
        self.outcome == TurnOutcome::Empty && !self.recovered
    }
}

/// Re-entry budget for one turn (interruptions, abandons, card payloads).
#[derive(Debug)]
struct Hops {
    used: usize,
    limit: usize,
}

impl Hops {
    fn new(limit: usize) -> Self {
        Self { used: 0, limit }
    }

    fn take(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }
}

/// The multi-turn dispatcher.
///
/// Build with [`TurnOrchestrator::builder`]; construction fails rather than
/// produce a partially configured dispatcher.
#[derive(Debug)]
pub struct TurnOrchestrator {
    registry: SubDialogRegistry,
    permissions: PermissionEvaluator,
    settings: BotConfig,
    suggested_actions: Vec<String>,
}

impl TurnOrchestrator {
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::default()
    }

    pub fn registry(&self) -> &SubDialogRegistry {
        &self.registry
    }

    pub fn permissions(&self) -> &PermissionEvaluator {
        &self.permissions
    }

    pub fn settings(&self) -> &BotConfig {
        &self.settings
    }

    /// Handles one incoming turn.
    ///
    /// Never fails for conversational reasons: denials, unknown intents,
    /// malformed cards and sub-dialog failures are answered in-chat.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Channel` if a reply could not be delivered.
    pub async fn dispatch(
        &self,
        ctx: &mut TurnContext,
        signal: TurnSignal,
        state: &mut ActiveConversationState,
        profile: &mut UserProfile,
    ) -> Result<TurnOutcome, DispatchError> {
        let mut hops = Hops::new(self.settings.max_redispatch_depth);
        let active = state.active_dialog_id().map(str::to_owned);

        debug!(
            conversation_id = %ctx.conversation_id(),
            intent = signal.intent(),
            active = ?active,
            "Dispatching turn"
        );

        if !self.permit(ctx, &signal, active.as_deref()).await? {
            return Ok(TurnOutcome::Empty);
        }

        let step = if active.is_some() {
            let step = self
                .run_active(ctx, &signal, state, profile, DialogCall::Resume)
                .await?;

            // A reply sent alongside `Empty` does not consume the turn.
            if step.left_turn_open() {
                debug!(
                    conversation_id = %ctx.conversation_id(),
                    intent = signal.intent(),
                    "Active sub-dialog did not consume the turn"
                );
                self.begin(ctx, signal.clone(), state, profile, &mut hops)
                    .await?
            } else {
                step
            }
        } else {
            self.begin(ctx, signal.clone(), state, profile, &mut hops)
                .await?
        };

        self.reconcile(ctx, step, signal, state, profile, &mut hops)
            .await
    }

    /// Evaluates permission and sends the denial reason if refused.
    async fn permit(
        &self,
        ctx: &mut TurnContext,
        signal: &TurnSignal,
        active: Option<&str>,
    ) -> Result<bool, DispatchError> {
        let permission = self.permissions.evaluate(signal.intent(), active);
        if permission.allowed {
            return Ok(true);
        }

        warn!(
            conversation_id = %ctx.conversation_id(),
            intent = signal.intent(),
            active = ?active,
            "Intent not permitted"
        );
        ctx.send_text(permission.reason).await?;
        Ok(false)
    }

    /// Begin path: built-in intents, card unwrapping, or a new sub-dialog.
    ///
    /// Suggestion cards re-enter this same path with their nested signal.
    async fn begin(
        &self,
        ctx: &mut TurnContext,
        mut signal: TurnSignal,
        state: &mut ActiveConversationState,
        profile: &mut UserProfile,
        hops: &mut Hops,
    ) -> Result<Step, DispatchError> {
        loop {
            if signal.intent() == WHAT_CAN_YOU_DO && signal.entity(CARD_PAYLOAD_FIELD).is_some() {
                let Some(nested) = self.unwrap_card(ctx, &signal).await? else {
                    return Ok(Step::dispatcher(TurnOutcome::Empty));
                };
                if !hops.take() {
                    self.runaway(ctx).await?;
                    return Ok(Step::dispatcher(TurnOutcome::Empty));
                }
                if !self.permit(ctx, &nested, state.active_dialog_id()).await? {
                    return Ok(Step::dispatcher(TurnOutcome::Empty));
                }
                signal = nested;
                continue;
            }

            return match signal.intent() {
                CANCEL => self.cancel(ctx).await,
                WHO_ARE_YOU => self.identify(ctx, &signal, state, profile).await,
                _ => self.start(ctx, &signal, state, profile).await,
            };
        }
    }

    /// Pushes a frame for the signal's sub-dialog and begins it.
    async fn start(
        &self,
        ctx: &mut TurnContext,
        signal: &TurnSignal,
        state: &mut ActiveConversationState,
        profile: &mut UserProfile,
    ) -> Result<Step, DispatchError> {
        let Some(dialog) = self.registry.get(signal.intent()) else {
            return self.fallback(ctx, signal).await;
        };

        state.push(dialog.id());
        info!(
            conversation_id = %ctx.conversation_id(),
            dialog_id = dialog.id(),
            depth = state.depth(),
            "Starting sub-dialog"
        );

        self.run_active(ctx, signal, state, profile, DialogCall::Begin)
            .await
    }

    /// Calls the sub-dialog on top of the stack.
    async fn run_active(
        &self,
        ctx: &mut TurnContext,
        signal: &TurnSignal,
        state: &mut ActiveConversationState,
        profile: &mut UserProfile,
        call: DialogCall,
    ) -> Result<Step, DispatchError> {
        let Some(dialog_id) = state.active_dialog_id().map(str::to_owned) else {
            return Ok(Step::dispatcher(TurnOutcome::Empty));
        };

        let Some(dialog) = self.registry.get(&dialog_id) else {
            // Persisted by an older deployment, or the registry changed.
            warn!(
                conversation_id = %ctx.conversation_id(),
                dialog_id = %dialog_id,
                "Dropping frame of unregistered sub-dialog"
            );
            state.pop();
            return Ok(Step::dispatcher(TurnOutcome::Empty));
        };

        let Some(frame) = state.active_frame_mut() else {
            return Ok(Step::dispatcher(TurnOutcome::Empty));
        };

        let turn = DialogTurn {
            ctx: &mut *ctx,
            signal,
            frame,
            profile: &mut *profile,
        };
        let result = match call {
            DialogCall::Begin => dialog.begin(turn).await,
            DialogCall::Resume => dialog.resume(turn).await,
            DialogCall::Reprompt => dialog.reprompt(turn).await,
        };

        match result {
            Ok(outcome) => {
                debug!(
                    conversation_id = %ctx.conversation_id(),
                    dialog_id = %dialog_id,
                    call = ?call,
                    outcome = outcome.label(),
                    "Sub-dialog returned"
                );
                Ok(Step::frame(outcome))
            }
            Err(SubDialogError::Channel(e)) => Err(e.into()),
            Err(SubDialogError::Dialog(e)) => {
                error!(
                    conversation_id = %ctx.conversation_id(),
                    dialog_id = %dialog_id,
                    error = %e,
                    "Sub-dialog failed; clearing dialog stack"
                );
                state.clear();
                ctx.send_text(self.settings.error_message.clone()).await?;
                Ok(Step::recovered())
            }
        }
    }

    /// Settles outcomes until nothing more needs to run.
    async fn reconcile(
        &self,
        ctx: &mut TurnContext,
        mut step: Step,
        mut signal: TurnSignal,
        state: &mut ActiveConversationState,
        profile: &mut UserProfile,
        hops: &mut Hops,
    ) -> Result<TurnOutcome, DispatchError> {
        loop {
            let label = step.outcome.label();
            let next = settle(step.outcome, step.source, state);
            debug!(
                conversation_id = %ctx.conversation_id(),
                outcome = label,
                active = ?state.active_dialog_id(),
                "Settled outcome"
            );

            step = match next {
                NextAction::Finish(outcome) => return Ok(outcome),
                NextAction::ClosingPrompt(outcome) => {
                    self.send_closing_prompt(ctx).await?;
                    return Ok(outcome);
                }
                NextAction::Redispatch(next_signal) => {
                    if !hops.take() {
                        self.runaway(ctx).await?;
                        return Ok(TurnOutcome::Empty);
                    }
                    info!(
                        conversation_id = %ctx.conversation_id(),
                        intent = next_signal.intent(),
                        "Re-dispatching after sub-dialog ended"
                    );
                    signal = next_signal;
                    if !self.permit(ctx, &signal, state.active_dialog_id()).await? {
                        return Ok(TurnOutcome::Empty);
                    }
                    self.begin(ctx, signal.clone(), state, profile, hops)
                        .await?
                }
                NextAction::ResumeRestored(next_signal) => {
                    if !hops.take() {
                        self.runaway(ctx).await?;
                        return Ok(TurnOutcome::Empty);
                    }
                    info!(
                        conversation_id = %ctx.conversation_id(),
                        dialog_id = ?state.active_dialog_id(),
                        "Restoring suspended sub-dialog"
                    );
                    signal = next_signal;
                    self.run_active(ctx, &signal, state, profile, DialogCall::Resume)
                        .await?
                }
                NextAction::Reprompt => {
                    info!(
                        conversation_id = %ctx.conversation_id(),
                        dialog_id = ?state.active_dialog_id(),
                        "Returning to suspended sub-dialog"
                    );
                    self.run_active(ctx, &signal, state, profile, DialogCall::Reprompt)
                        .await?
                }
            };
        }
    }

    /// Built-in cancel: everything on the stack goes.
    async fn cancel(&self, ctx: &mut TurnContext) -> Result<Step, DispatchError> {
        info!(conversation_id = %ctx.conversation_id(), "Cancelling all sub-dialogs");
        ctx.send_text("Sure, I've cancelled that.").await?;
        Ok(Step::dispatcher(TurnOutcome::Cancelled))
    }

    /// Identification shortcut; only starts the full dialog when needed.
    async fn identify(
        &self,
        ctx: &mut TurnContext,
        signal: &TurnSignal,
        state: &mut ActiveConversationState,
        profile: &mut UserProfile,
    ) -> Result<Step, DispatchError> {
        if let Some(name) = signal.first_text(&[USER_NAME_PATTERN_ANY, USER_NAME]) {
            profile.set_user_name(name);
            info!(
                conversation_id = %ctx.conversation_id(),
                "Stored user name from the utterance"
            );
            ctx.send_text(format!(
                "Hello {}, nice to meet you! I'm the cafe bot.",
                profile.user_name
            ))
            .await?;
            return Ok(Step::dispatcher(TurnOutcome::done()));
        }

        if profile.is_unidentified() {
            return self.start(ctx, signal, state, profile).await;
        }

        ctx.send_text(format!(
            "I'm the cafe bot, and you're {}. Good to see you again!",
            profile.user_name
        ))
        .await?;
        Ok(Step::dispatcher(TurnOutcome::done()))
    }

    /// Decodes a suggestion card and echoes its text.
    ///
    /// Returns `None` (after a corrective reply) if the payload is unreadable.
    async fn unwrap_card(
        &self,
        ctx: &mut TurnContext,
        signal: &TurnSignal,
    ) -> Result<Option<TurnSignal>, DispatchError> {
        let raw = match signal.entity(CARD_PAYLOAD_FIELD).map(|e| e.value()) {
            Some(Value::String(raw)) => raw.clone(),
            Some(other) => other.to_string(),
            None => return Ok(None),
        };

        match NestedCard::parse(&raw) {
            Ok(nested) => {
                if let Some(text) = nested.text {
                    ctx.set_text(text.clone());
                    ctx.send_text(text).await?;
                }
                debug!(
                    conversation_id = %ctx.conversation_id(),
                    nested_intent = nested.signal.intent(),
                    "Unwrapped suggestion card"
                );
                Ok(Some(nested.signal))
            }
            Err(e) => {
                warn!(
                    conversation_id = %ctx.conversation_id(),
                    error = %e,
                    "Malformed suggestion card payload"
                );
                ctx.send_text(self.settings.malformed_card_message.clone())
                    .await?;
                Ok(None)
            }
        }
    }

    /// "I don't understand", plus a web search suggestion.
    async fn fallback(
        &self,
        ctx: &mut TurnContext,
        signal: &TurnSignal,
    ) -> Result<Step, DispatchError> {
        warn!(
            conversation_id = %ctx.conversation_id(),
            intent = signal.intent(),
            "No sub-dialog for intent"
        );

        let mut message = OutgoingMessage::text(self.settings.fallback_message.clone());
        if let Some(link) = self.search_link(ctx.text()) {
            message.text = format!("{} You could try a web search: {}", message.text, link);
        }
        ctx.send(message).await?;
        Ok(Step::dispatcher(TurnOutcome::Empty))
    }

    fn search_link(&self, query: &str) -> Option<String> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let mut url = Url::parse(&self.settings.fallback_search_url).ok()?;
        url.query_pairs_mut().append_pair("q", query);
        Some(url.to_string())
    }

    async fn send_closing_prompt(&self, ctx: &mut TurnContext) -> Result<(), DispatchError> {
        let message = OutgoingMessage::text(self.settings.closing_prompt.clone())
            .with_suggested_actions(self.suggested_actions.iter().cloned());
        ctx.send(message).await?;
        Ok(())
    }

    async fn runaway(&self, ctx: &mut TurnContext) -> Result<(), DispatchError> {
        warn!(
            conversation_id = %ctx.conversation_id(),
            limit = self.settings.max_redispatch_depth,
            "Re-dispatch limit reached"
        );
        ctx.send_text(self.settings.error_message.clone()).await?;
        Ok(())
    }
}

/// Builder for [`TurnOrchestrator`].
#[derive(Debug, Default)]
pub struct TurnOrchestratorBuilder {
    registry: Option<SubDialogRegistry>,
    permissions: Option<PermissionEvaluator>,
    settings: Option<BotConfig>,
}

impl TurnOrchestratorBuilder {
    /// Sub-dialogs to dispatch to. Required.
    pub fn registry(mut self, registry: SubDialogRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Policy table. Defaults to the built-in rules.
    pub fn permissions(mut self, permissions: PermissionEvaluator) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Texts and limits. Defaults to `BotConfig::default()`.
    pub fn settings(mut self, settings: BotConfig) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Validates dependencies and builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the registry is missing or empty, the
    /// identification dialog is not registered, or settings are invalid.
    pub fn build(self) -> Result<TurnOrchestrator, ConfigurationError> {
        let registry = self.registry.ok_or(ConfigurationError::MissingRegistry)?;
        if registry.is_empty() {
            return Err(ConfigurationError::EmptyRegistry);
        }
        if !registry.contains(WHO_ARE_YOU) {
            return Err(ConfigurationError::MissingDialog(WHO_ARE_YOU.to_string()));
        }

        let settings = self.settings.unwrap_or_default();
        settings.validate()?;
        let suggested_actions = settings.suggested_actions_list();

        Ok(TurnOrchestrator {
            registry,
            permissions: self.permissions.unwrap_or_default(),
            settings,
            suggested_actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{RecordingChannel, ScriptedCall, ScriptedDialog, StaticReplyDialog};
    use crate::config::ValidationError;
    use crate::domain::dialog::intents::{BOOK_TABLE, BOOK_TABLE_SUBMIT, FIND_CAFE_LOCATIONS};
    use crate::domain::dialog::{NOTHING_TO_CANCEL, UNKNOWN_USER_NAME};
    use crate::domain::foundation::ConversationId;
    use crate::ports::{ChannelError, SubDialog};
    use std::sync::Arc;

    const CAFES: &str = "We have cafes in Seattle and Renton.";

    struct Bot {
        orchestrator: TurnOrchestrator,
        channel: RecordingChannel,
        conversation_id: ConversationId,
        state: ActiveConversationState,
        profile: UserProfile,
    }

    impl Bot {
        /// Registers `dialogs`, a static cafe-locations reply, and a static
        /// identification dialog unless one is given.
        fn new(dialogs: Vec<Arc<dyn SubDialog>>) -> Self {
            let mut registry = SubDialogRegistry::new()
                .register(Arc::new(StaticReplyDialog::new(FIND_CAFE_LOCATIONS, CAFES)))
                .unwrap();
            for dialog in dialogs {
                registry = registry.register(dialog).unwrap();
            }
            if !registry.contains(WHO_ARE_YOU) {
                registry = registry
                    .register(Arc::new(StaticReplyDialog::new(WHO_ARE_YOU, "Who?")))
                    .unwrap();
            }
            Self {
                orchestrator: TurnOrchestrator::builder()
                    .registry(registry)
                    .build()
                    .unwrap(),
                channel: RecordingChannel::new(),
                conversation_id: ConversationId::new(),
                state: ActiveConversationState::new(),
                profile: UserProfile::default(),
            }
        }

        async fn turn(&mut self, text: &str, signal: TurnSignal) -> TurnOutcome {
            let mut ctx = TurnContext::new(
                self.conversation_id,
                text,
                Arc::new(self.channel.clone()),
            );
            self.orchestrator
                .dispatch(&mut ctx, signal, &mut self.state, &mut self.profile)
                .await
                .unwrap()
        }

        fn texts(&self) -> Vec<String> {
            self.channel.texts()
        }

        fn settings(&self) -> &BotConfig {
            self.orchestrator.settings()
        }
    }

    fn scripted(script: ScriptedDialog) -> (Arc<ScriptedDialog>, Arc<dyn SubDialog>) {
        let dialog = Arc::new(script);
        let handle: Arc<dyn SubDialog> = dialog.clone();
        (dialog, handle)
    }

    // Builder

    #[test]
    fn test_builder_requires_registry() {
        let result = TurnOrchestrator::builder().build();
        assert!(matches!(result, Err(ConfigurationError::MissingRegistry)));
    }

    #[test]
    fn test_builder_rejects_empty_registry() {
        let result = TurnOrchestrator::builder()
            .registry(SubDialogRegistry::new())
            .build();
        assert!(matches!(result, Err(ConfigurationError::EmptyRegistry)));
    }

    #[test]
    fn test_builder_requires_identification_dialog() {
        let registry = SubDialogRegistry::new()
            .register(Arc::new(StaticReplyDialog::new(FIND_CAFE_LOCATIONS, CAFES)))
            .unwrap();

        let result = TurnOrchestrator::builder().registry(registry).build();

        assert!(matches!(
            result,
            Err(ConfigurationError::MissingDialog(id)) if id == WHO_ARE_YOU
        ));
    }

    #[test]
    fn test_builder_validates_settings() {
        let registry = SubDialogRegistry::new()
            .register(Arc::new(StaticReplyDialog::new(WHO_ARE_YOU, "Who?")))
            .unwrap();
        let settings = BotConfig {
            max_redispatch_depth: 0,
            ..Default::default()
        };

        let result = TurnOrchestrator::builder()
            .registry(registry)
            .settings(settings)
            .build();

        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidSettings(
                ValidationError::InvalidRedispatchDepth
            ))
        ));
    }

    // Permissions

    #[tokio::test]
    async fn test_submit_without_booking_is_denied() {
        let (dialog, handle) = scripted(ScriptedDialog::new(BOOK_TABLE));
        let mut bot = Bot::new(vec![handle]);

        let outcome = bot.turn("submit", TurnSignal::new(BOOK_TABLE_SUBMIT)).await;

        assert_eq!(outcome, TurnOutcome::Empty);
        assert_eq!(bot.texts().len(), 1);
        assert!(bot.texts()[0].contains("book a table"));
        assert!(dialog.calls().is_empty());
        assert!(bot.state.is_idle());
    }

    #[tokio::test]
    async fn test_submit_within_booking_reaches_dialog() {
        let (dialog, handle) = scripted(ScriptedDialog::new(BOOK_TABLE));
        let mut bot = Bot::new(vec![handle]);
        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;

        bot.turn("submit", TurnSignal::new(BOOK_TABLE_SUBMIT)).await;

        assert_eq!(
            dialog.calls(),
            vec![
                (ScriptedCall::Begin, BOOK_TABLE.to_string()),
                (ScriptedCall::Resume, BOOK_TABLE_SUBMIT.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_with_nothing_active() {
        let mut bot = Bot::new(vec![]);

        let outcome = bot.turn("cancel", TurnSignal::new(CANCEL)).await;

        assert_eq!(outcome, TurnOutcome::Empty);
        assert_eq!(bot.texts(), vec![NOTHING_TO_CANCEL]);
    }

    // Turn routing

    #[tokio::test]
    async fn test_begin_pushes_frame() {
        let (_, handle) = scripted(
            ScriptedDialog::new(BOOK_TABLE).then_reply("Where?", TurnOutcome::Waiting),
        );
        let mut bot = Bot::new(vec![handle]);

        let outcome = bot.turn("book a table", TurnSignal::new(BOOK_TABLE)).await;

        assert_eq!(outcome, TurnOutcome::Waiting);
        assert_eq!(bot.state.active_dialog_id(), Some(BOOK_TABLE));
        assert_eq!(bot.texts(), vec!["Where?"]);
    }

    #[tokio::test]
    async fn test_waiting_leaves_state_unchanged() {
        let (dialog, handle) = scripted(ScriptedDialog::new(BOOK_TABLE));
        let mut bot = Bot::new(vec![handle]);
        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;
        let before = bot.state.clone();

        let outcome = bot.turn("hmm", TurnSignal::none()).await;

        assert_eq!(outcome, TurnOutcome::Waiting);
        assert_eq!(bot.state, before);
        assert_eq!(dialog.call_count(ScriptedCall::Resume), 1);
    }

    #[tokio::test]
    async fn test_unconsumed_turn_suspends_active_dialog() {
        let (dialog, handle) = scripted(
            ScriptedDialog::new(BOOK_TABLE)
                .then(TurnOutcome::Waiting)
                .then(TurnOutcome::Empty)
                .then_reply("Back to your booking.", TurnOutcome::Waiting),
        );
        let mut bot = Bot::new(vec![handle]);
        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;

        let outcome = bot
            .turn("where are you?", TurnSignal::new(FIND_CAFE_LOCATIONS))
            .await;

        assert_eq!(outcome, TurnOutcome::Waiting);
        assert_eq!(bot.texts(), vec![CAFES, "Back to your booking."]);
        assert_eq!(bot.state.depth(), 1);
        assert_eq!(bot.state.active_dialog_id(), Some(BOOK_TABLE));
        assert_eq!(dialog.call_count(ScriptedCall::Reprompt), 1);
    }

    #[tokio::test]
    async fn test_reply_with_empty_still_begins_requested_intent() {
        let (dialog, handle) = scripted(
            ScriptedDialog::new(BOOK_TABLE)
                .then(TurnOutcome::Waiting)
                .then_reply("Not mine.", TurnOutcome::Empty),
        );
        let mut bot = Bot::new(vec![handle]);
        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;

        let outcome = bot
            .turn("where are you?", TurnSignal::new(FIND_CAFE_LOCATIONS))
            .await;

        assert_eq!(outcome, TurnOutcome::Waiting);
        assert_eq!(bot.texts(), vec!["Not mine.", CAFES]);
        assert_eq!(bot.state.active_dialog_id(), Some(BOOK_TABLE));
        assert_eq!(bot.state.depth(), 1);
        assert_eq!(dialog.call_count(ScriptedCall::Reprompt), 1);
    }

    #[tokio::test]
    async fn test_repeated_start_intent_while_waiting_keeps_one_instance() {
        let (dialog, handle) = scripted(ScriptedDialog::new(BOOK_TABLE));
        let mut bot = Bot::new(vec![handle]);

        for (text, signal) in [
            ("book a table", TurnSignal::new(BOOK_TABLE)),
            ("book a table", TurnSignal::new(BOOK_TABLE)),
            ("hmm", TurnSignal::none()),
        ] {
            let outcome = bot.turn(text, signal).await;

            assert_eq!(outcome, TurnOutcome::Waiting);
            assert_eq!(bot.state.depth(), 1);
            assert_eq!(bot.state.active_dialog_id(), Some(BOOK_TABLE));
        }
        assert_eq!(dialog.call_count(ScriptedCall::Begin), 1);
        assert_eq!(dialog.call_count(ScriptedCall::Resume), 2);
    }

    #[tokio::test]
    async fn test_stale_frame_is_dropped() {
        let mut bot = Bot::new(vec![]);
        bot.state.push("RetiredDialog");

        let outcome = bot
            .turn("where?", TurnSignal::new(FIND_CAFE_LOCATIONS))
            .await;

        assert_eq!(outcome, TurnOutcome::done());
        assert!(bot.state.is_idle());
        assert_eq!(bot.texts()[0], CAFES);
    }

    #[tokio::test]
    async fn test_unknown_intent_falls_back_with_search_link() {
        let mut bot = Bot::new(vec![]);

        let outcome = bot
            .turn("pizza near me", TurnSignal::new("OrderPizza"))
            .await;

        assert_eq!(outcome, TurnOutcome::Empty);
        let texts = bot.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with(&bot.settings().fallback_message));
        assert!(texts[0].contains("q=pizza+near+me"));
    }

    #[tokio::test]
    async fn test_fallback_without_text_has_no_link() {
        let mut bot = Bot::new(vec![]);

        bot.turn("", TurnSignal::none()).await;

        assert_eq!(bot.texts(), vec![bot.settings().fallback_message.clone()]);
    }

    // Reconciliation

    #[tokio::test]
    async fn test_completion_sends_closing_prompt() {
        let mut bot = Bot::new(vec![]);

        let outcome = bot
            .turn("where?", TurnSignal::new(FIND_CAFE_LOCATIONS))
            .await;

        assert_eq!(outcome, TurnOutcome::done());
        let last = bot.channel.messages().pop().unwrap().message;
        assert_eq!(last.text, bot.settings().closing_prompt);
        assert_eq!(last.suggested_actions, bot.settings().suggested_actions_list());
    }

    #[tokio::test]
    async fn test_interruption_redispatches_carried_signal() {
        let (dialog, handle) = scripted(
            ScriptedDialog::new(BOOK_TABLE)
                .then(TurnOutcome::Waiting)
                .then(TurnOutcome::interrupted_by(TurnSignal::new(FIND_CAFE_LOCATIONS))),
        );
        let mut bot = Bot::new(vec![handle]);
        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;

        let outcome = bot.turn("actually, where?", TurnSignal::none()).await;

        assert_eq!(outcome, TurnOutcome::done());
        assert!(bot.state.is_idle());
        assert_eq!(bot.texts()[0], CAFES);
        assert_eq!(dialog.call_count(ScriptedCall::Reprompt), 0);
    }

    #[tokio::test]
    async fn test_abandon_restores_suspended_dialog() {
        let (booking_dialog, booking_handle) = scripted(
            ScriptedDialog::new(BOOK_TABLE).then_reply("Where were we?", TurnOutcome::Waiting),
        );
        let (_, survey) = scripted(
            ScriptedDialog::new("Survey").then(TurnOutcome::abandoned(TurnSignal::new(BOOK_TABLE))),
        );
        let mut bot = Bot::new(vec![booking_handle, survey]);
        bot.state.push(BOOK_TABLE);
        bot.state.push("Survey");

        let outcome = bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;

        assert_eq!(outcome, TurnOutcome::Waiting);
        assert_eq!(bot.state.depth(), 1);
        assert_eq!(
            booking_dialog.calls(),
            vec![(ScriptedCall::Resume, BOOK_TABLE.to_string())]
        );
        assert_eq!(bot.texts(), vec!["Where were we?"]);
    }

    #[tokio::test]
    async fn test_abandon_without_suspended_dialog_begins_it() {
        let (booking_dialog, booking_handle) = scripted(ScriptedDialog::new(BOOK_TABLE));
        let (_, survey) = scripted(
            ScriptedDialog::new("Survey").then(TurnOutcome::abandoned(TurnSignal::new(BOOK_TABLE))),
        );
        let mut bot = Bot::new(vec![booking_handle, survey]);
        bot.state.push("Survey");

        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;

        assert_eq!(bot.state.active_dialog_id(), Some(BOOK_TABLE));
        assert_eq!(booking_dialog.call_count(ScriptedCall::Begin), 1);
    }

    #[tokio::test]
    async fn test_redispatch_is_bounded() {
        let mut script = ScriptedDialog::new("Loop");
        for _ in 0..10 {
            script = script.then(TurnOutcome::interrupted_by(TurnSignal::new("Loop")));
        }
        let (dialog, handle) = scripted(script);
        let mut bot = Bot::new(vec![handle]);

        let outcome = bot.turn("loop", TurnSignal::new("Loop")).await;

        assert_eq!(outcome, TurnOutcome::Empty);
        assert_eq!(
            dialog.call_count(ScriptedCall::Begin),
            bot.settings().max_redispatch_depth + 1
        );
        assert_eq!(bot.texts(), vec![bot.settings().error_message.clone()]);
        assert!(bot.state.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_clears_whole_stack() {
        let (_, handle) = scripted(
            ScriptedDialog::new(BOOK_TABLE)
                .then(TurnOutcome::Waiting)
                .then(TurnOutcome::Empty),
        );
        let (_, survey) = scripted(ScriptedDialog::new("Survey").then(TurnOutcome::Empty));
        let mut bot = Bot::new(vec![handle, survey]);
        bot.state.push("Survey");
        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;
        assert_eq!(bot.state.depth(), 2);

        let outcome = bot.turn("cancel", TurnSignal::new(CANCEL)).await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(bot.state.is_idle());
        let texts = bot.texts();
        assert_eq!(texts.last().unwrap(), &bot.settings().closing_prompt);
    }

    #[tokio::test]
    async fn test_dialog_failure_apologizes_and_resets() {
        let (_, survey) = scripted(ScriptedDialog::new("Survey").then_fail("lost track"));
        let mut bot = Bot::new(vec![survey]);
        bot.state.push(BOOK_TABLE);
        bot.state.push("Survey");

        let outcome = bot.turn("hello", TurnSignal::none()).await;

        assert_eq!(outcome, TurnOutcome::Empty);
        assert!(bot.state.is_idle());
        assert_eq!(bot.texts(), vec![bot.settings().error_message.clone()]);
    }

    #[tokio::test]
    async fn test_dialog_failure_does_not_begin_requested_intent() {
        let (_, handle) = scripted(
            ScriptedDialog::new(BOOK_TABLE)
                .then(TurnOutcome::Waiting)
                .then_fail("lost track"),
        );
        let mut bot = Bot::new(vec![handle]);
        bot.turn("book", TurnSignal::new(BOOK_TABLE)).await;

        let outcome = bot
            .turn("where are you?", TurnSignal::new(FIND_CAFE_LOCATIONS))
            .await;

        assert_eq!(outcome, TurnOutcome::Empty);
        assert!(bot.state.is_idle());
        assert_eq!(bot.texts(), vec![bot.settings().error_message.clone()]);
    }

    #[tokio::test]
    async fn test_channel_failure_propagates() {
        let mut bot = Bot::new(vec![]);
        let mut ctx = TurnContext::new(
            bot.conversation_id,
            "where?",
            Arc::new(RecordingChannel::failing(ChannelError::Closed)),
        );

        let result = bot
            .orchestrator
            .dispatch(
                &mut ctx,
                TurnSignal::new(FIND_CAFE_LOCATIONS),
                &mut bot.state,
                &mut bot.profile,
            )
            .await;

        assert_eq!(result, Err(DispatchError::Channel(ChannelError::Closed)));
    }

    // Identification

    #[tokio::test]
    async fn test_name_entity_short_circuits_identification() {
        let (identify, handle) = scripted(ScriptedDialog::new(WHO_ARE_YOU));
        let mut bot = Bot::new(vec![handle]);
        let signal = TurnSignal::new(WHO_ARE_YOU).with_entity(USER_NAME_PATTERN_ANY, "alice");

        let outcome = bot.turn("I'm alice", signal).await;

        assert_eq!(outcome, TurnOutcome::done());
        assert_eq!(bot.profile.user_name, "Alice");
        assert!(identify.calls().is_empty());
        assert!(bot.texts()[0].contains("Alice"));
    }

    #[tokio::test]
    async fn test_known_user_is_greeted_without_dialog() {
        let (identify, handle) = scripted(ScriptedDialog::new(WHO_ARE_YOU));
        let mut bot = Bot::new(vec![handle]);
        bot.profile = UserProfile::named("Bob");

        bot.turn("who are you?", TurnSignal::new(WHO_ARE_YOU)).await;

        assert!(identify.calls().is_empty());
        assert!(bot.texts()[0].contains("Bob"));
    }

    #[tokio::test]
    async fn test_unknown_user_starts_identification() {
        let (identify, handle) = scripted(
            ScriptedDialog::new(WHO_ARE_YOU).then_reply("What's your name?", TurnOutcome::Waiting),
        );
        let mut bot = Bot::new(vec![handle]);
        bot.profile = UserProfile::named(UNKNOWN_USER_NAME);

        let outcome = bot.turn("who are you?", TurnSignal::new(WHO_ARE_YOU)).await;

        assert_eq!(outcome, TurnOutcome::Waiting);
        assert_eq!(identify.call_count(ScriptedCall::Begin), 1);
        assert_eq!(bot.state.active_dialog_id(), Some(WHO_ARE_YOU));
    }

    // Suggestion cards

    #[tokio::test]
    async fn test_card_payload_is_echoed_and_dispatched() {
        let mut bot = Bot::new(vec![]);
        let payload = r#"{"intent":"FindCafeLocations","text":"Find cafe locations"}"#;
        let signal = TurnSignal::new(WHAT_CAN_YOU_DO).with_entity(CARD_PAYLOAD_FIELD, payload);

        let outcome = bot.turn("card", signal).await;

        assert_eq!(outcome, TurnOutcome::done());
        let texts = bot.texts();
        assert_eq!(texts[0], "Find cafe locations");
        assert_eq!(texts[1], CAFES);
        assert_eq!(texts[2], bot.settings().closing_prompt);
    }

    #[tokio::test]
    async fn test_malformed_card_payload_gets_corrective_reply() {
        let mut bot = Bot::new(vec![]);
        let signal =
            TurnSignal::new(WHAT_CAN_YOU_DO).with_entity(CARD_PAYLOAD_FIELD, "{not json");

        let outcome = bot.turn("card", signal).await;

        assert_eq!(outcome, TurnOutcome::Empty);
        assert_eq!(bot.texts(), vec![bot.settings().malformed_card_message.clone()]);
        assert!(bot.state.is_idle());
    }

    #[tokio::test]
    async fn test_card_payload_is_permission_checked() {
        let mut bot = Bot::new(vec![]);
        let payload = format!(r#"{{"intent":"{}"}}"#, BOOK_TABLE_SUBMIT);
        let signal = TurnSignal::new(WHAT_CAN_YOU_DO).with_entity(CARD_PAYLOAD_FIELD, payload);

        let outcome = bot.turn("card", signal).await;

        assert_eq!(outcome, TurnOutcome::Empty);
        assert!(bot.texts()[0].contains("book a table"));
    }
}
