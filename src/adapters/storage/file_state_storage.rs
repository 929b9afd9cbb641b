//! File-based State Storage Adapter
//!
//! Stores dialog stacks and user profiles as YAML files on disk:
//!
//! ```text
//! <base>/conversations/<conversation_id>.yaml
//! <base>/users/<encoded user id>.yaml
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::dialog::{ActiveConversationState, UserProfile};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{ConversationStateStore, StateStorageError, UserProfileStore};

/// File-based storage for conversation state and user profiles
#[derive(Debug, Clone)]
pub struct FileStateStorage {
    base_path: PathBuf,
}

impl FileStateStorage {
    /// Create a new file storage with a base directory
    ///
    /// # Example
    /// ```ignore
    /// let storage = FileStateStorage::new("./data");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn conversations_dir(&self) -> PathBuf {
        self.base_path.join("conversations")
    }

    fn users_dir(&self) -> PathBuf {
        self.base_path.join("users")
    }

    fn state_file_path(&self, conversation_id: ConversationId) -> PathBuf {
        self.conversations_dir()
            .join(format!("{}.yaml", conversation_id))
    }

    fn profile_file_path(&self, user_id: &UserId) -> PathBuf {
        self.users_dir()
            .join(format!("{}.yaml", encode_file_stem(user_id.as_str())))
    }

    async fn write_yaml<T: Serialize>(
        &self,
        dir: &Path,
        file_path: &Path,
        value: &T,
    ) -> Result<(), StateStorageError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StateStorageError::IoError(e.to_string()))?;

        let yaml = serde_yaml::to_string(value)
            .map_err(|e| StateStorageError::SerializationFailed(e.to_string()))?;

        fs::write(file_path, yaml)
            .await
            .map_err(|e| StateStorageError::IoError(e.to_string()))
    }

    async fn read_yaml<T: DeserializeOwned>(
        &self,
        file_path: &Path,
    ) -> Result<Option<T>, StateStorageError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let yaml = fs::read_to_string(file_path)
            .await
            .map_err(|e| StateStorageError::IoError(e.to_string()))?;

        serde_yaml::from_str(&yaml)
            .map(Some)
            .map_err(|e| StateStorageError::DeserializationFailed(e.to_string()))
    }
}

/// Percent-encodes anything outside `[A-Za-z0-9_-]` so user ids are safe
/// file names and distinct ids never collide.
fn encode_file_stem(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[async_trait]
impl ConversationStateStore for FileStateStorage {
    async fn load_state(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ActiveConversationState>, StateStorageError> {
        self.read_yaml(&self.state_file_path(conversation_id)).await
    }

    async fn save_state(
        &self,
        conversation_id: ConversationId,
        state: &ActiveConversationState,
    ) -> Result<(), StateStorageError> {
        self.write_yaml(
            &self.conversations_dir(),
            &self.state_file_path(conversation_id),
            state,
        )
        .await
    }

    async fn delete_state(&self, conversation_id: ConversationId) -> Result<(), StateStorageError> {
        let file_path = self.state_file_path(conversation_id);

        if file_path.exists() {
            fs::remove_file(&file_path)
                .await
                .map_err(|e| StateStorageError::IoError(e.to_string()))?;
        }

        Ok(())
    }
}

#[async_trait]
impl UserProfileStore for FileStateStorage {
    async fn load_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StateStorageError> {
        self.read_yaml(&self.profile_file_path(user_id)).await
    }

    async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &UserProfile,
    ) -> Result<(), StateStorageError> {
        self.write_yaml(&self.users_dir(), &self.profile_file_path(user_id), profile)
            .await
    }
}
