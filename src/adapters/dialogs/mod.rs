//! Sub-Dialog Adapters
//!
//! Reference implementations of the `SubDialog` port:
//!
//! - **FormDialog** - slot-filling form (the table booking flow)
//! - **IdentifyUserDialog** - asks for the user's name
//! - **StaticReplyDialog** - one reply, then done
//! - **ScriptedDialog** - plays back prepared outcomes (tests, demos)

mod form;
mod identify_user;
mod scripted;
mod static_reply;

pub use form::{FormDialog, FormField};
pub use identify_user::IdentifyUserDialog;
pub use scripted::{ScriptedCall, ScriptedDialog};
pub use static_reply::StaticReplyDialog;
