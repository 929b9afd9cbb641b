//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the dispatcher and the outside world. Adapters implement these ports.
//!
//! - `SubDialog` - the task dialogs the dispatcher drives
//! - `MessageChannel` - delivery of bot replies
//! - `ConversationStateStore` / `UserProfileStore` - persistence

mod message_channel;
mod state_storage;
mod sub_dialog;

pub use message_channel::{ChannelError, MessageChannel};
pub use state_storage::{ConversationStateStore, StateStorageError, UserProfileStore};
pub use sub_dialog::{DialogTurn, SubDialog, SubDialogError, TurnContext};
