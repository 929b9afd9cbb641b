//! State Storage Port - Interface for persisting dispatcher state.
//!
//! Two stores are defined: the per-conversation dialog stack and the
//! per-user profile. Implementations must give read-your-writes
//! consistency: a load after a save in the same turn sees the saved value.

use async_trait::async_trait;

use crate::domain::dialog::{ActiveConversationState, UserProfile};
use crate::domain::foundation::{ConversationId, UserId};

/// Errors that can occur during state storage operations
#[derive(Debug, thiserror::Error)]
pub enum StateStorageError {
    #[error("Failed to serialize state: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize state: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Port for persisting the dialog stack of each conversation
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    /// Load conversation state
    ///
    /// # Returns
    /// `None` if the conversation has never been saved
    async fn load_state(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ActiveConversationState>, StateStorageError>;

    /// Save conversation state, replacing any previous value
    async fn save_state(
        &self,
        conversation_id: ConversationId,
        state: &ActiveConversationState,
    ) -> Result<(), StateStorageError>;

    /// Delete all state for a conversation
    async fn delete_state(&self, conversation_id: ConversationId) -> Result<(), StateStorageError>;
}

/// Port for persisting user profiles
#[async_trait]
pub trait UserProfileStore: Send + Sync {
    /// Load a user's profile
    ///
    /// # Returns
    /// `None` if the user has never been saved
    async fn load_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StateStorageError>;

    /// Save a user's profile, replacing any previous value
    async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &UserProfile,
    ) -> Result<(), StateStorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_storage_error_serialization() {
        let err = StateStorageError::SerializationFailed("Invalid YAML".to_string());
        assert!(err.to_string().contains("serialize"));
    }

    #[test]
    fn test_state_storage_error_io() {
        let err = StateStorageError::IoError("permission denied".to_string());
        assert_eq!(err.to_string(), "IO error: permission denied");
    }
}
