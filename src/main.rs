//! Dinebot console runner.
//!
//! Reads one JSON turn per line from stdin and prints the bot's replies.
//! A turn is either a recognized signal or a card submission:
//!
//! ```text
//! {"intent": "BookTable", "entities": [{"name": "party_size", "value": "4"}], "text": "table for 4"}
//! {"card": {"intent": "Book_Table_Submit", "location": "Seattle"}, "text": "Submit"}
//! ```
//!
//! Logs go to stderr so stdout stays a clean transcript.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dinebot::adapters::{
    ConsoleChannel, FileStateStorage, FormDialog, IdentifyUserDialog, InMemoryStateStorage,
    StaticReplyDialog,
};
use dinebot::application::{
    ConfigurationError, HandleTurnCommand, HandleTurnHandler, SubDialogRegistry, TurnOrchestrator,
};
use dinebot::config::{AppConfig, StorageBackend, StorageConfig};
use dinebot::domain::dialog::intents::{FIND_CAFE_LOCATIONS, WHAT_CAN_YOU_DO};
use dinebot::domain::dialog::TurnSignal;
use dinebot::domain::foundation::{ConversationId, UserId};
use dinebot::ports::{ConversationStateStore, UserProfileStore};

const CONSOLE_USER: &str = "console-user";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_validated()?;

    // Initialize logging
    let json_logs = config.telemetry.json_logs;
    tracing_subscriber::registry()
        .with(config.telemetry.env_filter())
        .with(json_logs.then(|| {
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr)
        }))
        .with((!json_logs).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();

    tracing::info!(
        environment = ?config.telemetry.environment,
        storage = ?config.storage.backend,
        "Starting dinebot"
    );

    let orchestrator = TurnOrchestrator::builder()
        .registry(build_registry()?)
        .settings(config.bot.clone())
        .build()?;
    let (states, profiles) = build_storage(&config.storage);
    let handler = HandleTurnHandler::new(
        Arc::new(orchestrator),
        states,
        profiles,
        Arc::new(ConsoleChannel::new()),
    );

    let conversation_id = ConversationId::new();
    let user_id = UserId::new(CONSOLE_USER)?;
    tracing::info!(conversation_id = %conversation_id, "Conversation started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match parse_turn(conversation_id, user_id.clone(), line) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable input line");
                continue;
            }
        };

        if let Err(e) = handler.handle(cmd).await {
            tracing::error!(error = %e, "Turn failed");
        }
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}

fn build_registry() -> Result<SubDialogRegistry, ConfigurationError> {
    SubDialogRegistry::new()
        .register(Arc::new(FormDialog::book_table()))?
        .register(Arc::new(IdentifyUserDialog::new()))?
        .register(Arc::new(StaticReplyDialog::new(
            FIND_CAFE_LOCATIONS,
            "We have cafes in Seattle, Bellevue and Renton.",
        )))?
        .register(Arc::new(StaticReplyDialog::new(
            WHAT_CAN_YOU_DO,
            "I can book you a table, tell you where our cafes are, and remember your name.",
        )))
}

fn build_storage(
    config: &StorageConfig,
) -> (Arc<dyn ConversationStateStore>, Arc<dyn UserProfileStore>) {
    match config.backend {
        StorageBackend::Memory => {
            let storage = InMemoryStateStorage::new();
            let states: Arc<dyn ConversationStateStore> = Arc::new(storage.clone());
            let profiles: Arc<dyn UserProfileStore> = Arc::new(storage);
            (states, profiles)
        }
        StorageBackend::File => {
            tracing::info!(data_dir = %config.data_dir.display(), "Using file storage");
            let storage = FileStateStorage::new(&config.data_dir);
            let states: Arc<dyn ConversationStateStore> = Arc::new(storage.clone());
            let profiles: Arc<dyn UserProfileStore> = Arc::new(storage);
            (states, profiles)
        }
    }
}

fn parse_turn(
    conversation_id: ConversationId,
    user_id: UserId,
    line: &str,
) -> Result<HandleTurnCommand, serde_json::Error> {
    let mut value: Map<String, Value> = serde_json::from_str(line)?;
    let text = match value.remove("text") {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };

    if let Some(Value::Object(card)) = value.remove("card") {
        return Ok(HandleTurnCommand::card(conversation_id, user_id, text, card));
    }

    let signal: TurnSignal = serde_json::from_value(Value::Object(value))?;
    Ok(HandleTurnCommand::signal(conversation_id, user_id, text, signal))
}
