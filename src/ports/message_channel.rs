//! Message Channel Port - Interface for replying to the user.
//!
//! The dispatcher awaits every send before moving on, so a turn is only
//! finished once all of its replies were delivered (or a send failed).

use async_trait::async_trait;

use crate::domain::dialog::OutgoingMessage;
use crate::domain::foundation::ConversationId;

/// Errors raised while delivering a message
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Port for sending bot replies
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Deliver one message to the conversation
    ///
    /// # Errors
    /// Returns `ChannelError` if the message could not be delivered
    async fn send(
        &self,
        conversation_id: ConversationId,
        message: &OutgoingMessage,
    ) -> Result<(), ChannelError>;
}
