//! Error types for the turn dispatcher.

use crate::config::ValidationError;
use crate::ports::ChannelError;

/// A turn could not be completed.
///
/// Only infrastructure failures end up here; denials, unknown intents and
/// dialog failures are answered in-chat and reported as normal outcomes.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum DispatchError {
    #[error("Failed to deliver reply: {0}")]
    Channel(#[from] ChannelError),
}

/// The dispatcher was built without something it needs.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConfigurationError {
    #[error("No sub-dialog registry configured")]
    MissingRegistry,

    #[error("Sub-dialog registry is empty")]
    EmptyRegistry,

    #[error("Required sub-dialog not registered: {0}")]
    MissingDialog(String),

    #[error("Sub-dialog registered twice: {0}")]
    DuplicateDialog(String),

    #[error("Invalid dispatcher settings: {0}")]
    InvalidSettings(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_wraps_channel_error() {
        let err: DispatchError = ChannelError::Closed.into();
        assert_eq!(err.to_string(), "Failed to deliver reply: Channel closed");
    }

    #[test]
    fn test_configuration_error_missing_dialog() {
        let err = ConfigurationError::MissingDialog("WhoAreYou".to_string());
        assert!(err.to_string().contains("WhoAreYou"));
    }
}
