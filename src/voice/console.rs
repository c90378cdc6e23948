use std::{
    io::{self, BufRead, BufReader},
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::Duration,
};

use futures::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;

use crate::{session::extract_commands, settings::ConsoleVoiceSettings};

use super::{SpeechEvent, SpeechEvents, TokenStream, VoiceCoach};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Terminal stand-in for a speech engine: typed lines play the role of
/// recognized speech, announcements are printed and take roughly as long as
/// reading them aloud would.
pub struct ConsoleCoach {
    settings: ConsoleVoiceSettings,
    /// Where recognized commands go while the microphone is "open".
    sink: Mutex<Option<mpsc::UnboundedSender<String>>>,
    utterance: Mutex<Option<CancellationToken>>,
}

impl ConsoleCoach {
    pub fn new(settings: ConsoleVoiceSettings) -> Self {
        Self {
            settings,
            sink: Mutex::new(None),
            utterance: Mutex::new(None),
        }
    }

    /// Creates a coach fed by stdin lines. Lines typed while not listening
    /// are dropped, like speech with the microphone off.
    pub fn with_stdin(settings: ConsoleVoiceSettings) -> Arc<Self> {
        Self::with_reader(settings, BufReader::new(io::stdin()))
    }

    /// Feeds lines from `reader` to the recognizer on a detached OS thread.
    /// A blocked read never holds up runtime shutdown.
    pub fn with_reader<R>(settings: ConsoleVoiceSettings, reader: R) -> Arc<Self>
    where
        R: BufRead + Send + 'static,
    {
        let coach = Arc::new(Self::new(settings));
        let listener = Arc::clone(&coach);
        let spawned = thread::Builder::new()
            .name("console-reader".into())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            listener.hear(&line);
                        }
                        Err(err) => {
                            log_warn!("console read failed: {err}");
                            break;
                        }
                    }
                }
                log_debug!("console input closed");
            });
        if let Err(err) = spawned {
            log_warn!("failed to spawn console reader: {err}");
        }
        coach
    }

    /// Runs a transcript through the recognizer. Returns how many command
    /// words were delivered to an active listener.
    pub fn hear(&self, transcript: &str) -> usize {
        let guard = lock(&self.sink);
        let Some(sink) = guard.as_ref() else {
            log_debug!("not listening, dropped \"{transcript}\"");
            return 0;
        };

        extract_commands(transcript)
            .into_iter()
            .filter(|command| sink.send(command.as_str().to_string()).is_ok())
            .count()
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.sink).is_some()
    }

    fn speech_duration(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        let wpm = u64::from(self.settings.words_per_minute.max(1));
        Duration::from_millis(words * 60_000 / wpm)
    }
}

impl VoiceCoach for ConsoleCoach {
    fn start_listening(&self) -> TokenStream {
        if !self.settings.listening_enabled {
            log_warn!("microphone permission not granted; voice commands disabled");
            return stream::empty().boxed();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.sink) = Some(tx);
        UnboundedReceiverStream::new(rx).boxed()
    }

    fn stop_listening(&self) {
        lock(&self.sink).take();
    }

    fn speak(&self, text: &str) -> SpeechEvents {
        if let Some(previous) = lock(&self.utterance).take() {
            previous.cancel();
        }

        if text.trim().is_empty() {
            return stream::iter([SpeechEvent::Failed("empty text".into())]).boxed();
        }

        let cancel = CancellationToken::new();
        *lock(&self.utterance) = Some(cancel.clone());

        let (tx, rx) = mpsc::channel(4);
        let text = text.to_string();
        let duration = self.speech_duration(&text);

        tokio::spawn(async move {
            println!("🔊 {text}");
            if tx.send(SpeechEvent::Started).await.is_err() {
                return;
            }
            let last = tokio::select! {
                _ = cancel.cancelled() => SpeechEvent::Cancelled,
                _ = tx.closed() => return,
                _ = tokio::time::sleep(duration) => SpeechEvent::Completed,
            };
            let _ = tx.send(last).await;
        });

        ReceiverStream::new(rx).boxed()
    }
}
