//! Dinebot - multi-turn conversation dispatcher for a restaurant assistant.
//!
//! Each user turn arrives as a recognized intent plus entities. The
//! dispatcher decides which sub-dialog handles it, keeps a stack of
//! suspended sub-dialogs per conversation, and settles how each turn ended.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
