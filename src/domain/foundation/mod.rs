//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps and validation errors
//! that form the vocabulary of the dispatcher domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{ConversationId, UserId};
pub use timestamp::Timestamp;
