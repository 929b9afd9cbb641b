//! Channel that prints replies to stdout.

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::domain::dialog::OutgoingMessage;
use crate::domain::foundation::ConversationId;
use crate::ports::{ChannelError, MessageChannel};

/// Writes each reply as one line, followed by its suggested actions.
pub struct ConsoleChannel {
    out: Mutex<Stdout>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleChannel").finish_non_exhaustive()
    }
}

/// Renders a message the way the console shows it.
pub(crate) fn render(message: &OutgoingMessage) -> String {
    let mut line = format!("bot> {}\n", message.text);
    if !message.suggested_actions.is_empty() {
        let actions: Vec<String> = message
            .suggested_actions
            .iter()
            .map(|a| format!("[{}]", a))
            .collect();
        line.push_str(&format!("     {}\n", actions.join(" ")));
    }
    line
}

#[async_trait]
impl MessageChannel for ConsoleChannel {
    async fn send(
        &self,
        _conversation_id: ConversationId,
        message: &OutgoingMessage,
    ) -> Result<(), ChannelError> {
        let mut out = self.out.lock().await;
        out.write_all(render(message).as_bytes())
            .await
            .map_err(|e| ChannelError::DeliveryFailed(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| ChannelError::DeliveryFailed(e.to_string()))
    }
}
