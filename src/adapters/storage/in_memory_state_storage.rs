//! In-Memory State Storage Adapter
//!
//! Stores dialog stacks and user profiles in memory.
//! Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::dialog::{ActiveConversationState, UserProfile};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{ConversationStateStore, StateStorageError, UserProfileStore};

/// In-memory storage for conversation state and user profiles
#[derive(Debug, Clone)]
pub struct InMemoryStateStorage {
    states: Arc<RwLock<HashMap<ConversationId, ActiveConversationState>>>,
    profiles: Arc<RwLock<HashMap<UserId, UserProfile>>>,
}

impl InMemoryStateStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Clear all stored data (useful for tests)
    pub async fn clear(&self) {
        self.states.write().await.clear();
        self.profiles.write().await.clear();
    }

    /// Get the number of stored conversations
    pub async fn state_count(&self) -> usize {
        self.states.read().await.len()
    }

    /// Get the number of stored profiles
    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }
}

impl Default for InMemoryStateStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStateStore for InMemoryStateStorage {
    async fn load_state(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ActiveConversationState>, StateStorageError> {
        Ok(self.states.read().await.get(&conversation_id).cloned())
    }

    async fn save_state(
        &self,
        conversation_id: ConversationId,
        state: &ActiveConversationState,
    ) -> Result<(), StateStorageError> {
        let mut states = self.states.write().await;
        states.insert(conversation_id, state.clone());
        Ok(())
    }

    async fn delete_state(&self, conversation_id: ConversationId) -> Result<(), StateStorageError> {
        self.states.write().await.remove(&conversation_id);
        Ok(())
    }
}

#[async_trait]
impl UserProfileStore for InMemoryStateStorage {
    async fn load_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StateStorageError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &UserProfile,
    ) -> Result<(), StateStorageError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(user_id.clone(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_state() -> ActiveConversationState {
        let mut state = ActiveConversationState::new();
        state.push("BookTable");
        state
    }

    #[tokio::test]
    async fn test_memory_storage_save_and_load_state() {
        let storage = InMemoryStateStorage::new();
        let conversation_id = ConversationId::new();
        let state = booking_state();

        storage.save_state(conversation_id, &state).await.unwrap();
        let loaded = storage.load_state(conversation_id).await.unwrap();

        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn test_memory_storage_load_unknown_conversation() {
        let storage = InMemoryStateStorage::new();

        let loaded = storage.load_state(ConversationId::new()).await.unwrap();

        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_memory_storage_overwrites_state() {
        let storage = InMemoryStateStorage::new();
        let conversation_id = ConversationId::new();
        let mut state = booking_state();
        storage.save_state(conversation_id, &state).await.unwrap();

        state.push("FindCafeLocations");
        storage.save_state(conversation_id, &state).await.unwrap();

        let loaded = storage.load_state(conversation_id).await.unwrap().unwrap();
        assert_eq!(loaded.depth(), 2);
        assert_eq!(storage.state_count().await, 1);
    }

    #[tokio::test]
    async fn test_memory_storage_delete_state() {
        let storage = InMemoryStateStorage::new();
        let conversation_id = ConversationId::new();
        storage
            .save_state(conversation_id, &booking_state())
            .await
            .unwrap();

        storage.delete_state(conversation_id).await.unwrap();

        assert!(storage.load_state(conversation_id).await.unwrap().is_none());
        assert_eq!(storage.state_count().await, 0);
    }

    #[tokio::test]
    async fn test_memory_storage_profiles() {
        let storage = InMemoryStateStorage::new();
        let user = UserId::new("user-1").unwrap();

        assert!(storage.load_profile(&user).await.unwrap().is_none());

        storage
            .save_profile(&user, &UserProfile::named("Alice"))
            .await
            .unwrap();

        let loaded = storage.load_profile(&user).await.unwrap().unwrap();
        assert_eq!(loaded.user_name, "Alice");
    }

    #[tokio::test]
    async fn test_memory_storage_clear() {
        let storage = InMemoryStateStorage::new();
        let user = UserId::new("user-1").unwrap();
        storage
            .save_state(ConversationId::new(), &booking_state())
            .await
            .unwrap();
        storage
            .save_profile(&user, &UserProfile::named("Alice"))
            .await
            .unwrap();

        storage.clear().await;

        assert_eq!(storage.state_count().await, 0);
        assert_eq!(storage.profile_count().await, 0);
    }

    #[tokio::test]
    async fn test_memory_storage_shared_between_clones() {
        let storage = InMemoryStateStorage::new();
        let conversation_id = ConversationId::new();

        let writer = storage.clone();
        tokio::spawn(async move {
            writer
                .save_state(conversation_id, &booking_state())
                .await
                .unwrap();
        })
        .await
        .unwrap();

        assert!(storage.load_state(conversation_id).await.unwrap().is_some());
    }
}
