//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `dialog` - Turn signals, permission policy, dialog stack, reconciliation

pub mod dialog;
pub mod foundation;
