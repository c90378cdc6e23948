#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use fitvoice_lib::{
    models::{Exercise, Workout},
    session::SessionController,
    voice::{SpeechEvent, SpeechEvents, TokenStream, VoiceCoach},
};
use futures::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoachCall {
    StartListening,
    StopListening,
    Speak(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechMode {
    /// Utterances finish as soon as they are consumed.
    Immediate,
    /// Utterances stay open until `release_speech`.
    Hold,
    /// Every utterance reports a failure.
    Fail,
}

struct MockState {
    calls: Vec<CoachCall>,
    listener: Option<mpsc::UnboundedSender<String>>,
    listening_allowed: bool,
    speech: SpeechMode,
    held: Vec<mpsc::UnboundedSender<SpeechEvent>>,
    overlaps: usize,
}

/// Scripted coach: records every call and lets tests inject recognized words.
pub struct MockVoiceCoach {
    inner: Mutex<MockState>,
}

impl MockVoiceCoach {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(MockState {
                calls: Vec::new(),
                listener: None,
                listening_allowed: true,
                speech: SpeechMode::Immediate,
                held: Vec::new(),
                overlaps: 0,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap()
    }

    pub fn set_speech_mode(&self, mode: SpeechMode) {
        self.state().speech = mode;
    }

    /// Behave like a recognizer whose permission was refused.
    pub fn deny_listening(&self) {
        self.state().listening_allowed = false;
    }

    /// Delivers a word to the active listener. Returns false if nobody listens.
    pub fn simulate_command(&self, word: &str) -> bool {
        match self.state().listener.as_ref() {
            Some(tx) => tx.send(word.to_string()).is_ok(),
            None => false,
        }
    }

    pub fn release_speech(&self) {
        for tx in self.state().held.drain(..) {
            let _ = tx.send(SpeechEvent::Started);
            let _ = tx.send(SpeechEvent::Completed);
        }
    }

    pub fn calls(&self) -> Vec<CoachCall> {
        self.state().calls.clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                CoachCall::Speak(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn listen_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| **call == CoachCall::StartListening)
            .count()
    }

    /// How many times `speak` was called while a token stream was still live.
    pub fn overlaps(&self) -> usize {
        self.state().overlaps
    }
}

impl VoiceCoach for MockVoiceCoach {
    fn start_listening(&self) -> TokenStream {
        let mut state = self.state();
        state.calls.push(CoachCall::StartListening);
        if !state.listening_allowed {
            return stream::empty().boxed();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.listener = Some(tx);
        UnboundedReceiverStream::new(rx).boxed()
    }

    fn stop_listening(&self) {
        let mut state = self.state();
        state.calls.push(CoachCall::StopListening);
        state.listener = None;
    }

    fn speak(&self, text: &str) -> SpeechEvents {
        let mut state = self.state();
        if state.listener.as_ref().is_some_and(|tx| !tx.is_closed()) {
            state.overlaps += 1;
        }
        state.calls.push(CoachCall::Speak(text.to_string()));

        match state.speech {
            SpeechMode::Immediate => {
                stream::iter([SpeechEvent::Started, SpeechEvent::Completed]).boxed()
            }
            SpeechMode::Fail => {
                stream::iter([SpeechEvent::Failed("audio session error".into())]).boxed()
            }
            SpeechMode::Hold => {
                let (tx, rx) = mpsc::unbounded_channel();
                state.held.push(tx);
                UnboundedReceiverStream::new(rx).boxed()
            }
        }
    }
}

pub fn sample_workout() -> Workout {
    Workout::new(vec![
        Exercise::new("Push-ups", 30, "Standard push-ups"),
        Exercise::new("Squats", 45, "Bodyweight squats"),
        Exercise::new("Plank", 60, "Hold plank position"),
    ])
}

pub fn controller_with(workout: Workout) -> (SessionController, Arc<MockVoiceCoach>) {
    let coach = MockVoiceCoach::new();
    let controller = SessionController::new(workout, coach.clone());
    (controller, coach)
}

/// Lets spawned loops run without moving the paused clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}
