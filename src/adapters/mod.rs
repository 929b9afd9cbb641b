//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the dispatcher to the outside world:
//! - `channel` - where replies go (console, in-memory recording)
//! - `dialogs` - concrete sub-dialogs
//! - `storage` - dialog stack and profile persistence (memory, YAML files)

pub mod channel;
pub mod dialogs;
pub mod storage;

pub use channel::{ConsoleChannel, RecordedMessage, RecordingChannel};
pub use dialogs::{
    FormDialog, FormField, IdentifyUserDialog, ScriptedCall, ScriptedDialog, StaticReplyDialog,
};
pub use storage::{FileStateStorage, InMemoryStateStorage};
