//! Slot-filling form dialog.
//!
//! Asks for each field in order until all are answered, then confirms.
//! Answers come from matching entities (including card submissions) or,
//! failing that, from the raw text of the turn. Progress lives in the
//! frame as `{"answers": {field: value}}`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::domain::dialog::intents::{
    BOOK_TABLE, BOOK_TABLE_CANCEL, BOOK_TABLE_SUBMIT, CANCEL, WHAT_CAN_YOU_DO,
};
use crate::domain::dialog::{DialogError, DialogFrame, TurnOutcome, TurnSignal};
use crate::ports::{DialogTurn, SubDialog, SubDialogError, TurnContext};

const ANSWERS: &str = "answers";

/// One question of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub prompt: String,
}

/// Multi-turn form.
#[derive(Debug, Clone)]
pub struct FormDialog {
    id: String,
    title: String,
    fields: Vec<FormField>,
    submit_intent: Option<String>,
    cancel_intents: Vec<String>,
    interrupting_intents: Vec<String>,
}

impl FormDialog {
    /// Empty form started by intent `id`; `title` names it in replies.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            fields: Vec::new(),
            submit_intent: None,
            cancel_intents: Vec::new(),
            interrupting_intents: Vec::new(),
        }
    }

    /// The table booking flow.
    pub fn book_table() -> Self {
        Self::new(BOOK_TABLE, "table booking")
            .field("location", "Which of our cafes would you like to visit?")
            .field("date_time", "When would you like the table?")
            .field("party_size", "How many people will be joining?")
            .submit_intent(BOOK_TABLE_SUBMIT)
            .cancel_intent(BOOK_TABLE_CANCEL)
            .cancel_intent(CANCEL)
            .interrupted_by(WHAT_CAN_YOU_DO)
    }

    pub fn field(mut self, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.fields.push(FormField {
            name: name.into(),
            prompt: prompt.into(),
        });
        self
    }

    /// Card intent that fills several fields at once.
    pub fn submit_intent(mut self, intent: impl Into<String>) -> Self {
        self.submit_intent = Some(intent.into());
        self
    }

    pub fn cancel_intent(mut self, intent: impl Into<String>) -> Self {
        self.cancel_intents.push(intent.into());
        self
    }

    /// Intents that end the form and run instead of it.
    pub fn interrupted_by(mut self, intent: impl Into<String>) -> Self {
        self.interrupting_intents.push(intent.into());
        self
    }

    /// Answers collected so far. A fresh frame has none.
    fn answers(&self, frame: &DialogFrame) -> Result<Map<String, Value>, DialogError> {
        if frame.state.is_null() {
            return Ok(Map::new());
        }
        frame
            .state
            .get(ANSWERS)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| {
                DialogError::InvalidState(format!("{} frame has no answers object", self.id))
            })
    }

    /// Copies entities named like fields into `answers`. Returns how many.
    fn absorb_entities(&self, signal: &TurnSignal, answers: &mut Map<String, Value>) -> usize {
        let mut absorbed = 0;
        for field in &self.fields {
            if let Some(value) = signal.first_text(&[field.name.as_str()]) {
                answers.insert(field.name.clone(), Value::String(value.trim().to_string()));
                absorbed += 1;
            }
        }
        absorbed
    }

    fn next_missing<'a>(&'a self, answers: &Map<String, Value>) -> Option<&'a FormField> {
        self.fields.iter().find(|f| !answers.contains_key(&f.name))
    }

    /// Saves progress, then asks the next question or confirms.
    async fn advance(
        &self,
        ctx: &mut TurnContext,
        frame: &mut DialogFrame,
        answers: Map<String, Value>,
        greeting: Option<&str>,
    ) -> Result<TurnOutcome, SubDialogError> {
        if let Some(field) = self.next_missing(&answers) {
            debug!(dialog_id = %self.id, field = %field.name, "Asking for form field");
            let prompt = field.prompt.clone();
            frame.state = json!({ ANSWERS: answers });
            ctx.send_text(prompt).await?;
            return Ok(TurnOutcome::Waiting);
        }

        let summary: Vec<String> = self
            .fields
            .iter()
            .filter_map(|f| {
                answers
                    .get(&f.name)
                    .and_then(Value::as_str)
                    .map(|v| format!("{}: {}", f.name, v))
            })
            .collect();
        let thanks = match greeting {
            Some(name) => format!("Thanks {}!", name),
            None => "Thanks!".to_string(),
        };
        ctx.send_text(format!(
            "{} Your {} is confirmed ({}).",
            thanks,
            self.title,
            summary.join(", ")
        ))
        .await?;

        frame.state = json!({ ANSWERS: answers.clone() });
        Ok(TurnOutcome::done_with(Value::Object(answers)))
    }
}

fn known_name(turn: &DialogTurn<'_>) -> Option<String> {
    (!turn.profile.is_unidentified()).then(|| turn.profile.user_name.clone())
}

#[async_trait]
impl SubDialog for FormDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        let greeting = known_name(&turn);
        let mut answers = self.answers(turn.frame)?;
        self.absorb_entities(turn.signal, &mut answers);
        self.advance(turn.ctx, turn.frame, answers, greeting.as_deref())
            .await
    }

    async fn resume(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        let intent = turn.signal.intent();

        if self.cancel_intents.iter().any(|i| i == intent) {
            turn.ctx
                .send_text(format!("Ok, I've cancelled your {}.", self.title))
                .await?;
            return Ok(TurnOutcome::Cancelled);
        }

        if self.interrupting_intents.iter().any(|i| i == intent) {
            return Ok(TurnOutcome::interrupted_by(turn.signal.clone()));
        }

        let is_own = intent == self.id || self.submit_intent.as_deref() == Some(intent);
        if !is_own && !turn.signal.is_none() {
            // Someone else's request; stay suspended underneath it.
            return Ok(TurnOutcome::Empty);
        }

        let greeting = known_name(&turn);
        let mut answers = self.answers(turn.frame)?;
        let absorbed = self.absorb_entities(turn.signal, &mut answers);

        if absorbed == 0 && turn.signal.is_none() {
            let text = turn.ctx.text().trim().to_string();
            if let (Some(field), false) = (self.next_missing(&answers), text.is_empty()) {
                answers.insert(field.name.clone(), Value::String(text));
            }
        }

        self.advance(turn.ctx, turn.frame, answers, greeting.as_deref())
            .await
    }

    async fn reprompt(&self, turn: DialogTurn<'_>) -> Result<TurnOutcome, SubDialogError> {
        turn.ctx
            .send_text(format!("Let's get back to your {}.", self.title))
            .await?;
        let greeting = known_name(&turn);
        let answers = self.answers(turn.frame)?;
        self.advance(turn.ctx, turn.frame, answers, greeting.as_deref())
            .await
    }
}
