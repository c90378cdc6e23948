pub mod commands;
pub mod controller;
pub mod state;
mod workers;

pub use commands::{extract_commands, VoiceCommand, VOCABULARY};
pub use controller::{SessionController, SessionSnapshot};
pub use state::{AfterSpeech, Announcement, SessionState, Transition};
