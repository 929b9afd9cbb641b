//! Dispatch - routes each turn to the right sub-dialog.
//!
//! - [`SubDialogRegistry`] maps intent names to sub-dialogs
//! - [`TurnOrchestrator`] runs one turn against a conversation's dialog stack

mod errors;
mod orchestrator;
mod registry;

pub use errors::{ConfigurationError, DispatchError};
pub use orchestrator::{TurnOrchestrator, TurnOrchestratorBuilder};
pub use registry::SubDialogRegistry;
