//! Message Channel Adapters
//!
//! - **RecordingChannel** - keeps every reply in memory (tests, transcripts)
//! - **ConsoleChannel** - prints replies to stdout

mod console;
mod recording;

pub use console::ConsoleChannel;
pub use recording::{RecordedMessage, RecordingChannel};
