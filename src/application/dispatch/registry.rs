//! Sub-dialog registry: intent name -> dialog handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ports::SubDialog;

use super::errors::ConfigurationError;

/// Fixed mapping from intent name to the sub-dialog it starts.
#[derive(Clone, Default)]
pub struct SubDialogRegistry {
    dialogs: HashMap<String, Arc<dyn SubDialog>>,
}

impl SubDialogRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dialog under its own id.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateDialog` if the id is taken.
    pub fn register(mut self, dialog: Arc<dyn SubDialog>) -> Result<Self, ConfigurationError> {
        let id = dialog.id().to_string();
        if self.dialogs.contains_key(&id) {
            return Err(ConfigurationError::DuplicateDialog(id));
        }
        self.dialogs.insert(id, dialog);
        Ok(self)
    }

    /// Looks up the dialog started by `intent`.
    pub fn get(&self, intent: &str) -> Option<Arc<dyn SubDialog>> {
        self.dialogs.get(intent).cloned()
    }

    pub fn contains(&self, intent: &str) -> bool {
        self.dialogs.contains_key(intent)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.dialogs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for SubDialogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubDialogRegistry")
            .field("dialogs", &self.ids())
            .finish()
    }
}
