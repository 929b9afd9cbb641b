//! Application layer - the dispatcher and the handlers that run it.
//!
//! - `dispatch` - routing of turns to sub-dialogs
//! - `handlers` - per-turn command handling with persistence

pub mod dispatch;
pub mod handlers;

pub use dispatch::{
    ConfigurationError, DispatchError, SubDialogRegistry, TurnOrchestrator,
    TurnOrchestratorBuilder,
};
pub use handlers::{
    HandleTurnCommand, HandleTurnError, HandleTurnHandler, HandleTurnResult, TurnInput,
};
