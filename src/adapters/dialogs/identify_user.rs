//! Identification dialog: asks the user for their name.

use async_trait::async_trait;
use tracing::info;

use crate::domain::dialog::intents::{CANCEL, USER_NAME, USER_NAME_PATTERN_ANY, WHO_ARE_YOU};
use crate::domain::dialog::{TurnOutcome, TurnSignal, UNKNOWN_USER_NAME};
use crate::ports::{DialogTurn, SubDialog, SubDialogError};

const NAME_PREFIXES: [&str; 5] = ["my name is", "call me", "i'm", "i am", "it's"];

/// Multi-turn identification, registered under `WhoAreYou`.
///
/// Finishes once a name is stored in the profile. A turn asking for
/// something else abandons the question so the earlier flow can resume.
#[derive(Debug, Clone, Default)]
pub struct IdentifyUserDialog;

impl IdentifyUserDialog {
    pub fn new() -> Self {
        Self
    }

    async fn greet(&self, turn: DialogTurn<'_>, name: &str) -> Result<TurnOutcome, SubDialogError> {
        turn.profile.set_user_name(name);
        info!(
            conversation_id = %turn.ctx.conversation_id(),
            "User identified"
        );
        let reply = format!("Nice to meet you, {}!", turn.profile.user_name);
        turn.ctx.send_text(reply).await?;
        Ok(TurnOutcome::done())
    }
}

fn name_entity(signal: &TurnSignal) -> Option<String> {
    signal
        .first_text(&[USER_NAME_PATTERN_ANY, USER_NAME])
        .map(str::to_string)
}

/// Pulls a name out of free text like "my name is bob".
fn name_from_text(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches(&['.', '!'][..]);
    let rest = NAME_PREFIXES
        .iter()
        .find_map(|prefix| {
            let head = text.get(..prefix.len())?;
            let rest = &text[prefix.len()..];
            let whole_word = rest.is_empty() || rest.starts_with(char::is_whitespace);
            (whole_word && head.eq_ignore_ascii_case(prefix)).then_some(rest)
        })
        .unwrap_or(text);
    let name = rest.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[async_trait]
impl SubDialog for IdentifyUserDialog {
    fn id(&self) -> &str {
        WHO_ARE_YOU
    }

    async fn begin(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        if let Some(name) = name_entity(turn.signal) {
            return self.greet(turn, &name).await;
        }
        turn.ctx
            .send_text("Hi, I'm the cafe bot. What's your name?")
            .await?;
        Ok(TurnOutcome::Waiting)
    }

    async fn resume(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        let signal = turn.signal;

        if signal.intent() == CANCEL {
            turn.profile.user_name = UNKNOWN_USER_NAME.to_string();
            turn.ctx
                .send_text("No problem, you don't have to tell me.")
                .await?;
            return Ok(TurnOutcome::Cancelled);
        }

        if let Some(name) = name_entity(signal) {
            return self.greet(turn, &name).await;
        }

        if !signal.is_none() && signal.intent() != WHO_ARE_YOU {
            return Ok(TurnOutcome::abandoned(signal.clone()));
        }

        let answer = name_from_text(turn.ctx.text());
        match answer {
            Some(name) => self.greet(turn, &name).await,
            None => {
                turn.ctx.send_text("Sorry, what should I call you?").await?;
                Ok(TurnOutcome::Waiting)
            }
        }
    }

    async fn reprompt(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        turn.ctx
            .send_text("Before we move on, what's your name?")
            .await?;
        Ok(TurnOutcome::Waiting)
    }
}
