//! Error types for sub-dialogs.

/// Failure reported by a sub-dialog implementation.
///
/// The dispatcher recovers from these locally; they never reach the user
/// as anything but an apology.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum DialogError {
    #[error("Dialog state is invalid: {0}")]
    InvalidState(String),

    #[error("Dialog failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message() {
        let err = DialogError::InvalidState("step out of range".to_string());
        assert_eq!(err.to_string(), "Dialog state is invalid: step out of range");
    }
}
