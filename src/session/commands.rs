use std::{fmt, str::FromStr};

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

use super::SessionController;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Words the recognizer is allowed to hand to the controller.
pub const VOCABULARY: [&str; 5] = ["start", "pause", "resume", "next", "stop"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceCommand {
    Start,
    Pause,
    Resume,
    Next,
    Stop,
}

impl VoiceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceCommand::Start => "start",
            VoiceCommand::Pause => "pause",
            VoiceCommand::Resume => "resume",
            VoiceCommand::Next => "next",
            VoiceCommand::Stop => "stop",
        }
    }
}

impl fmt::Display for VoiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceCommand {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(VoiceCommand::Start),
            "pause" => Ok(VoiceCommand::Pause),
            "resume" => Ok(VoiceCommand::Resume),
            "next" => Ok(VoiceCommand::Next),
            "stop" => Ok(VoiceCommand::Stop),
            other => Err(anyhow!("unrecognized voice command '{other}'")),
        }
    }
}

/// Pulls every command word out of a free-form transcription, in order.
pub fn extract_commands(transcript: &str) -> Vec<VoiceCommand> {
    transcript
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| VOCABULARY.iter().any(|known| known.eq_ignore_ascii_case(word)))
        .filter_map(|word| word.parse().ok())
        .collect()
}

impl SessionController {
    /// Routes a presentation intent or a parsed voice token to its handler.
    pub async fn dispatch(&self, command: VoiceCommand) {
        match command {
            VoiceCommand::Start => self.start().await,
            VoiceCommand::Pause => self.pause().await,
            VoiceCommand::Resume => self.resume().await,
            VoiceCommand::Next => self.next().await,
            VoiceCommand::Stop => self.stop().await,
        }
    }

    /// Parses a raw token and dispatches it. Anything outside the vocabulary
    /// is dropped.
    pub async fn handle_token(&self, token: &str) {
        match token.parse::<VoiceCommand>() {
            Ok(command) => self.dispatch(command).await,
            Err(err) => log_debug!("ignoring token: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vocabulary_case_insensitively() {
        for word in VOCABULARY {
            let command: VoiceCommand = word.parse().unwrap();
            assert_eq!(command.as_str(), word);
        }
        assert_eq!(" PAUSE ".parse::<VoiceCommand>().unwrap(), VoiceCommand::Pause);
    }

    #[test]
    fn rejects_other_words() {
        assert!("restart".parse::<VoiceCommand>().is_err());
        assert!("".parse::<VoiceCommand>().is_err());
    }

    #[test]
    fn extracts_commands_from_transcript() {
        let commands = extract_commands("OK, start the workout... then next please! Stop.");
        assert_eq!(
            commands,
            vec![VoiceCommand::Start, VoiceCommand::Next, VoiceCommand::Stop]
        );
        assert!(extract_commands("nothing to see here").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_token_leaves_session_untouched() {
        use std::sync::Arc;

        use crate::{
            models::{Exercise, Workout},
            settings::ConsoleVoiceSettings,
            voice::ConsoleCoach,
        };

        let workout = Workout::new(vec![Exercise::new("Plank", 60, "Hold plank position")]);
        let coach = Arc::new(ConsoleCoach::new(ConsoleVoiceSettings::default()));
        let controller = SessionController::new(workout, coach);

        controller.handle_token("jump").await;
        assert!(!controller.is_active().await);

        controller.handle_token("Start").await;
        assert!(controller.is_active().await);
    }
}
