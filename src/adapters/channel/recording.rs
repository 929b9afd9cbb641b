//! In-memory channel that records every reply.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::domain::dialog::OutgoingMessage;
use crate::domain::foundation::ConversationId;
use crate::ports::{ChannelError, MessageChannel};

/// A delivered message and the conversation it went to.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessage {
    pub conversation_id: ConversationId,
    pub message: OutgoingMessage,
}

/// Channel that stores replies instead of delivering them.
///
/// Clones share the same log. A failing channel rejects every send.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    messages: Arc<Mutex<Vec<RecordedMessage>>>,
    fail_with: Option<ChannelError>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose sends all fail with `error`.
    pub fn failing(error: ChannelError) -> Self {
        Self {
            messages: Arc::default(),
            fail_with: Some(error),
        }
    }

    /// Every recorded message, oldest first.
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.lock().clone()
    }

    /// Texts of the messages sent to one conversation.
    pub fn texts_for(&self, conversation_id: ConversationId) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| m.message.text.clone())
            .collect()
    }

    /// Texts of all recorded messages.
    pub fn texts(&self) -> Vec<String> {
        self.lock().iter().map(|m| m.message.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedMessage>> {
        // A panic while holding the lock leaves the log usable.
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(
        &self,
        conversation_id: ConversationId,
        message: &OutgoingMessage,
    ) -> Result<(), ChannelError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.lock().push(RecordedMessage {
            conversation_id,
            message: message.clone(),
        });
        Ok(())
    }
}
