//! Speech capability consumed by the session controller.
//!
//! Recognition and synthesis engines live outside the crate; the controller
//! only sees the [`VoiceCoach`] contract. Both directions are exposed as
//! streams so cancellation is just dropping the stream.

pub mod console;
pub mod device;

use futures::stream::BoxStream;
use serde::Serialize;

pub use console::ConsoleCoach;
pub use device::{AudioDevice, AudioOwner};

/// Recognized command words, already filtered to the command vocabulary.
pub type TokenStream = BoxStream<'static, String>;

/// Lifecycle events of a single utterance.
pub type SpeechEvents = BoxStream<'static, SpeechEvent>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeechEvent {
    Started,
    Completed,
    Cancelled,
    Failed(String),
}

impl SpeechEvent {
    /// Whether the utterance is over once this event has been seen.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpeechEvent::Started)
    }
}

pub trait VoiceCoach: Send + Sync + 'static {
    /// Begin producing command tokens. The stream ends if the microphone or
    /// recognizer cannot be activated, or after [`VoiceCoach::stop_listening`].
    fn start_listening(&self) -> TokenStream;

    /// Halt token production and release the input device. Idempotent.
    fn stop_listening(&self);

    /// Speak `text`. A new call supersedes any utterance still in flight;
    /// dropping the returned stream cancels this one.
    fn speak(&self, text: &str) -> SpeechEvents;
}
