//! Application handlers.
//!
//! Command handlers that drive the dispatcher against the ports.

mod handle_turn;

pub use handle_turn::{
    HandleTurnCommand, HandleTurnError, HandleTurnHandler, HandleTurnResult, TurnInput,
};
