use serde::{Deserialize, Serialize};

use crate::models::{Exercise, Workout};

use super::VoiceCommand;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SessionState {
    #[default]
    Idle,
    Running {
        exercise_index: usize,
        remaining_seconds: u32,
    },
    Paused {
        exercise_index: usize,
        remaining_seconds: u32,
    },
}

/// What should happen to the microphone once an announcement has been spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSpeech {
    ResumeListening,
    /// Explicit stop: keep listening off and raise the finished signal.
    FinishSession,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub text: String,
    pub after: AfterSpeech,
}

impl Announcement {
    fn resume(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            after: AfterSpeech::ResumeListening,
        }
    }
}

/// Result of applying a command or a countdown tick to a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub announcement: Option<Announcement>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exercise_index(&self) -> Option<usize> {
        match *self {
            SessionState::Running { exercise_index, .. }
            | SessionState::Paused { exercise_index, .. } => Some(exercise_index),
            SessionState::Idle => None,
        }
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        match *self {
            SessionState::Running {
                remaining_seconds, ..
            }
            | SessionState::Paused {
                remaining_seconds, ..
            } => Some(remaining_seconds),
            SessionState::Idle => None,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running { .. })
    }

    pub fn current_exercise<'w>(&self, workout: &'w Workout) -> Option<&'w Exercise> {
        self.exercise_index().and_then(|index| workout.exercise(index))
    }

    /// Applies a user or voice command. `None` means the command does not
    /// apply in this state and must be ignored.
    ///
    /// `Stop` is reported here only as the state change; closing the session
    /// (no more listening, finished signal) is the controller's job.
    pub fn apply(self, command: VoiceCommand, workout: &Workout) -> Option<Transition> {
        match (self, command) {
            (SessionState::Idle, VoiceCommand::Start) => {
                let first = workout.exercise(0)?;
                Some(Transition {
                    next: SessionState::Running {
                        exercise_index: 0,
                        remaining_seconds: first.duration,
                    },
                    announcement: Some(Announcement::resume(format!(
                        "Workout started. First exercise: {}",
                        first.name
                    ))),
                })
            }
            (
                SessionState::Running {
                    exercise_index,
                    remaining_seconds,
                },
                VoiceCommand::Pause,
            ) => Some(Transition {
                next: SessionState::Paused {
                    exercise_index,
                    remaining_seconds,
                },
                announcement: Some(Announcement::resume("Workout paused")),
            }),
            (
                SessionState::Paused {
                    exercise_index,
                    remaining_seconds,
                },
                VoiceCommand::Resume,
            ) => Some(Transition {
                next: SessionState::Running {
                    exercise_index,
                    remaining_seconds,
                },
                announcement: Some(Announcement::resume("Workout resumed")),
            }),
            (SessionState::Running { exercise_index, .. }, VoiceCommand::Next) => {
                advance(exercise_index, workout)
            }
            (SessionState::Running { .. } | SessionState::Paused { .. }, VoiceCommand::Stop) => {
                Some(Transition {
                    next: SessionState::Idle,
                    announcement: Some(Announcement {
                        text: "Workout stopped".into(),
                        after: AfterSpeech::FinishSession,
                    }),
                })
            }
            _ => None,
        }
    }

    /// One countdown step. Decrements while time remains; at zero moves to
    /// the next exercise or completes the workout.
    pub fn tick(self, workout: &Workout) -> Option<Transition> {
        let SessionState::Running {
            exercise_index,
            remaining_seconds,
        } = self
        else {
            return None;
        };

        if remaining_seconds > 0 {
            return Some(Transition {
                next: SessionState::Running {
                    exercise_index,
                    remaining_seconds: remaining_seconds - 1,
                },
                announcement: None,
            });
        }

        advance(exercise_index, workout).or_else(|| {
            Some(Transition {
                next: SessionState::Idle,
                announcement: Some(Announcement::resume("Workout completed")),
            })
        })
    }
}

fn advance(index: usize, workout: &Workout) -> Option<Transition> {
    let next_index = index + 1;
    let next = workout.exercise(next_index)?;
    Some(Transition {
        next: SessionState::Running {
            exercise_index: next_index,
            remaining_seconds: next.duration,
        },
        announcement: Some(Announcement::resume(format!(
            "Next exercise: {}",
            next.name
        ))),
    })
}
