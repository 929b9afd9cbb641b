//! Persisted dispatcher state: the per-conversation dialog stack and the
//! per-user profile.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::Timestamp;

/// Profile name meaning "we asked but never learned it".
pub const UNKNOWN_USER_NAME: &str = "Unknown";

/// One sub-dialog instance on the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogFrame {
    pub dialog_id: String,
    /// Opaque progress owned by the sub-dialog.
    #[serde(default)]
    pub state: Value,
    pub started_at: Timestamp,
}

impl DialogFrame {
    /// Creates a fresh frame with empty dialog state.
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            state: Value::Null,
            started_at: Timestamp::now(),
        }
    }
}

/// Which sub-dialog owns the conversation, and which are suspended under it.
///
/// The top of the stack is the active dialog; it receives the next turn.
/// An empty stack means the conversation is idle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActiveConversationState {
    #[serde(default)]
    stack: Vec<DialogFrame>,
}

impl ActiveConversationState {
    /// Creates idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the dialog that should receive the next turn.
    pub fn active_dialog_id(&self) -> Option<&str> {
        self.stack.last().map(|f| f.dialog_id.as_str())
    }

    /// True when no dialog is active.
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    /// Number of frames, active plus suspended.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Frames bottom-to-top.
    pub fn frames(&self) -> &[DialogFrame] {
        &self.stack
    }

    /// Mutable access to the active frame.
    pub fn active_frame_mut(&mut self) -> Option<&mut DialogFrame> {
        self.stack.last_mut()
    }

    /// Starts a dialog on top of the stack, suspending the current one.
    pub fn push(&mut self, dialog_id: impl Into<String>) -> &mut DialogFrame {
        self.stack.push(DialogFrame::new(dialog_id));
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    /// Ends the active dialog, returning its frame.
    pub fn pop(&mut self) -> Option<DialogFrame> {
        self.stack.pop()
    }

    /// Ends every dialog.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Moves the most recent suspended frame for `dialog_id` back to the
    /// top. Returns false if no such frame exists.
    pub fn restore(&mut self, dialog_id: &str) -> bool {
        match self.stack.iter().rposition(|f| f.dialog_id == dialog_id) {
            Some(index) => {
                let frame = self.stack.remove(index);
                self.stack.push(frame);
                true
            }
            None => false,
        }
    }
}

/// What the bot knows about a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub user_name: String,
}

impl UserProfile {
    /// Profile with a known name.
    pub fn named(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
        }
    }

    /// True if the user still has to be identified.
    pub fn is_unidentified(&self) -> bool {
        let name = self.user_name.trim();
        name.is_empty() || name.eq_ignore_ascii_case(UNKNOWN_USER_NAME)
    }

    /// Stores a name, capitalizing its first letter.
    pub fn set_user_name(&mut self, name: &str) {
        self.user_name = capitalize(name.trim());
    }
}

/// Uppercases the first character, leaving the rest untouched.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_idle() {
        let state = ActiveConversationState::new();
        assert!(state.is_idle());
        assert_eq!(state.active_dialog_id(), None);
    }

    #[test]
    fn push_makes_the_new_frame_active() {
        let mut state = ActiveConversationState::new();
        state.push("BookTable");
        state.push("WhatCanYouDo");

        assert_eq!(state.active_dialog_id(), Some("WhatCanYouDo"));
        assert_eq!(state.depth(), 2);
    }

    #[test]
    fn pop_reveals_suspended_frame() {
        let mut state = ActiveConversationState::new();
        state.push("BookTable");
        state.push("WhatCanYouDo");

        let popped = state.pop().unwrap();
        assert_eq!(popped.dialog_id, "WhatCanYouDo");
        assert_eq!(state.active_dialog_id(), Some("BookTable"));
    }

    #[test]
    fn restore_moves_suspended_frame_to_top() {
        let mut state = ActiveConversationState::new();
        state.push("BookTable").state = serde_json::json!({"step": 2});
        state.push("FindCafeLocations");

        assert!(state.restore("BookTable"));
        assert_eq!(state.active_dialog_id(), Some("BookTable"));
        assert_eq!(state.frames()[1].state["step"], 2);
        assert!(!state.restore("WhoAreYou"));
    }

    #[test]
    fn clear_empties_every_frame() {
        let mut state = ActiveConversationState::new();
        state.push("BookTable");
        state.push("WhoAreYou");
        state.clear();
        assert!(state.is_idle());
    }

    #[test]
    fn state_round_trips_through_yaml() {
        let mut state = ActiveConversationState::new();
        state.push("BookTable").state = serde_json::json!({"answers": ["Seattle"]});

        let yaml = serde_yaml::to_string(&state).unwrap();
        let back: ActiveConversationState = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn profile_sentinels_are_unidentified() {
        assert!(UserProfile::default().is_unidentified());
        assert!(UserProfile::named("Unknown").is_unidentified());
        assert!(UserProfile::named("unknown").is_unidentified());
        assert!(!UserProfile::named("Alice").is_unidentified());
    }

    #[test]
    fn set_user_name_capitalizes() {
        let mut profile = UserProfile::default();
        profile.set_user_name("  alice ");
        assert_eq!(profile.user_name, "Alice");
    }

    #[test]
    fn capitalize_handles_edge_cases() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("émile"), "Émile");
        assert_eq!(capitalize("mcDonald"), "McDonald");
    }
}
