use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    models::{Exercise, Workout},
    settings::SessionSettings,
    voice::{AudioDevice, AudioOwner, VoiceCoach},
};

use super::{
    state::{AfterSpeech, Announcement, Transition},
    workers::{countdown_loop, listening_loop, speaking_loop},
    SessionState, VoiceCommand,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub state: SessionState,
    pub current_exercise: Option<Exercise>,
    pub remaining_seconds: Option<u32>,
    pub is_active: bool,
    /// Set once the session has been stopped; `finished` follows after the
    /// goodbye is spoken.
    pub stopped: bool,
    pub finished: bool,
    pub listening: bool,
    pub speaking: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WorkerKind {
    Countdown,
    Listener,
    Speaker,
}

struct Worker {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    state: SessionState,
    session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished: bool,
    finished_taken: bool,
    /// Set by an explicit stop. A closed session accepts no further commands.
    closed: bool,
    device: AudioDevice,
    ticker: Option<Worker>,
    listener: Option<Worker>,
    speaker: Option<Worker>,
    next_worker_id: u64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: SessionState::new(),
            session_id: None,
            started_at: None,
            finished: false,
            finished_taken: false,
            closed: false,
            device: AudioDevice::new(),
            ticker: None,
            listener: None,
            speaker: None,
            next_worker_id: 1,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        id
    }

    fn slot(&mut self, kind: WorkerKind) -> &mut Option<Worker> {
        match kind {
            WorkerKind::Countdown => &mut self.ticker,
            WorkerKind::Listener => &mut self.listener,
            WorkerKind::Speaker => &mut self.speaker,
        }
    }

    fn session_label(&self) -> &str {
        self.session_id.as_deref().unwrap_or("-")
    }
}

/// Owns one workout session: its state, countdown, listener and speaker.
///
/// Every read and write of the session goes through a single mutex, so a
/// countdown tick and a concurrently arriving command are always serialized.
#[derive(Clone)]
pub struct SessionController {
    workout: Arc<Workout>,
    coach: Arc<dyn VoiceCoach>,
    shared: Arc<Mutex<Shared>>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    tick_interval: Duration,
    pause_poll_interval: Duration,
}

impl SessionController {
    pub fn new(workout: Workout, coach: Arc<dyn VoiceCoach>) -> Self {
        Self::with_settings(workout, coach, &SessionSettings::default())
    }

    pub fn with_settings(
        workout: Workout,
        coach: Arc<dyn VoiceCoach>,
        settings: &SessionSettings,
    ) -> Self {
        let shared = Shared::new();
        let (snapshots, _) = watch::channel(build_snapshot(&shared, &workout));

        Self {
            workout: Arc::new(workout),
            coach,
            shared: Arc::new(Mutex::new(shared)),
            snapshots: Arc::new(snapshots),
            tick_interval: settings.tick_interval(),
            pause_poll_interval: settings.pause_poll_interval(),
        }
    }

    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    pub(super) fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub(super) fn pause_poll_interval(&self) -> Duration {
        self.pause_poll_interval
    }

    pub async fn state(&self) -> SessionState {
        self.shared.lock().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.shared.lock().await;
        build_snapshot(&guard, &self.workout)
    }

    pub async fn current_exercise(&self) -> Option<Exercise> {
        let state = self.state().await;
        state.current_exercise(&self.workout).cloned()
    }

    pub async fn remaining_seconds(&self) -> Option<u32> {
        self.state().await.remaining_seconds()
    }

    pub async fn is_active(&self) -> bool {
        self.state().await.is_active()
    }

    pub async fn is_listening(&self) -> bool {
        self.shared.lock().await.device.is_listening()
    }

    pub async fn is_speaking(&self) -> bool {
        self.shared.lock().await.device.is_speaking()
    }

    /// Number of background loops (countdown, listener, speaker) still alive.
    pub async fn running_workers(&self) -> usize {
        let guard = self.shared.lock().await;
        [&guard.ticker, &guard.listener, &guard.speaker]
            .into_iter()
            .flatten()
            .filter(|worker| !worker.handle.is_finished())
            .count()
    }

    /// Receives a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Returns `true` exactly once after an explicit stop has been announced.
    pub async fn take_finished(&self) -> bool {
        let mut guard = self.shared.lock().await;
        if guard.finished && !guard.finished_taken {
            guard.finished_taken = true;
            true
        } else {
            false
        }
    }

    /// Resolves once the finished signal has been raised.
    pub async fn wait_finished(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this only errs on teardown.
        let _ = rx.wait_for(|snapshot| snapshot.finished).await;
    }

    /// Opens the microphone. Safe to call repeatedly; does nothing while an
    /// announcement is playing (listening resumes after it) or once stopped.
    pub async fn begin_listening(&self) {
        let mut guard = self.shared.lock().await;
        if guard.closed || guard.speaker.is_some() {
            return;
        }
        self.start_listener_locked(&mut guard);
        self.publish_locked(&guard);
    }

    pub async fn start(&self) {
        self.run_command(VoiceCommand::Start).await;
    }

    pub async fn pause(&self) {
        self.run_command(VoiceCommand::Pause).await;
    }

    pub async fn resume(&self) {
        self.run_command(VoiceCommand::Resume).await;
    }

    pub async fn next(&self) {
        self.run_command(VoiceCommand::Next).await;
    }

    /// Ends the session: cancels speech, countdown and listening in one step,
    /// announces the stop and raises the finished signal once it has been
    /// spoken. Nothing is listened to or announced afterwards.
    pub async fn stop(&self) {
        let mut guard = self.shared.lock().await;
        if guard.closed {
            return;
        }
        let Some(transition) = guard.state.apply(VoiceCommand::Stop, &self.workout) else {
            log_debug!("stop ignored while {:?}", guard.state);
            return;
        };

        if let Some(speaker) = guard.speaker.take() {
            speaker.cancel.cancel();
            guard.device.release(AudioOwner::Speaking(speaker.id));
        }
        if let Some(ticker) = guard.ticker.take() {
            ticker.cancel.cancel();
        }
        self.silence_listener_locked(&mut guard);
        guard.closed = true;

        log_info!("session {} stopped", guard.session_label());
        self.apply_locked(&mut guard, transition);
    }

    /// Cancels every background loop and waits for them to exit.
    pub async fn shutdown(&self) {
        let workers: Vec<Worker> = {
            let mut guard = self.shared.lock().await;
            guard.closed = true;
            self.coach.stop_listening();
            guard.device.release_all();
            [
                guard.ticker.take(),
                guard.listener.take(),
                guard.speaker.take(),
            ]
            .into_iter()
            .flatten()
            .collect()
        };

        for worker in workers {
            worker.cancel.cancel();
            if let Err(err) = worker.handle.await {
                log_warn!("worker {} failed to join: {err}", worker.id);
            }
        }
    }

    async fn run_command(&self, command: VoiceCommand) {
        let mut guard = self.shared.lock().await;
        if guard.closed {
            log_debug!("{command} ignored: session already stopped");
            return;
        }
        let Some(transition) = guard.state.apply(command, &self.workout) else {
            log_debug!("{command} ignored while {:?}", guard.state);
            return;
        };

        if command == VoiceCommand::Start {
            guard.session_id = Some(Uuid::new_v4().to_string());
            guard.started_at = Some(Utc::now());
        }

        log_info!("session {}: {command}", guard.session_label());
        self.apply_locked(&mut guard, transition);

        if command == VoiceCommand::Start {
            self.start_ticker_locked(&mut guard);
        }
    }

    /// Applies one countdown step on behalf of countdown worker `worker_id`.
    /// `observed` is the running state the worker saw before its wait; if
    /// anything changed since (next, pause, stop) the step is stale and
    /// dropped. Returns `false` when the worker has been replaced and should
    /// exit.
    pub(super) async fn apply_tick(&self, worker_id: u64, observed: SessionState) -> bool {
        let mut guard = self.shared.lock().await;
        if guard.ticker.as_ref().map(|w| w.id) != Some(worker_id) {
            return false;
        }

        if guard.state != observed {
            log_debug!(
                "discarding stale tick for {:?}, now {:?}",
                observed,
                guard.state
            );
            return true;
        }

        if let Some(transition) = guard.state.tick(&self.workout) {
            if transition.next == SessionState::Idle {
                log_info!("session {} completed", guard.session_label());
            }
            self.apply_locked(&mut guard, transition);
        }
        true
    }

    /// Called by speaker `worker_id` once its utterance is over.
    pub(super) async fn finish_speech(&self, worker_id: u64, after: AfterSpeech) {
        let mut guard = self.shared.lock().await;
        if guard.speaker.as_ref().map(|w| w.id) != Some(worker_id) {
            log_debug!("utterance {worker_id} was superseded");
            return;
        }
        guard.speaker = None;
        guard.device.release(AudioOwner::Speaking(worker_id));

        match after {
            AfterSpeech::ResumeListening => self.start_listener_locked(&mut guard),
            AfterSpeech::FinishSession => {
                if !guard.finished {
                    guard.finished = true;
                    log_info!("session {} finished", guard.session_label());
                }
            }
        }
        self.publish_locked(&guard);
    }

    /// Called by a loop that exits on its own.
    pub(super) async fn release_worker(&self, kind: WorkerKind, worker_id: u64) {
        let mut guard = self.shared.lock().await;
        let slot = guard.slot(kind);
        if slot.as_ref().map(|w| w.id) != Some(worker_id) {
            return;
        }
        *slot = None;
        if kind == WorkerKind::Listener {
            guard.device.release(AudioOwner::Listening(worker_id));
        }
        self.publish_locked(&guard);
    }

    fn apply_locked(&self, shared: &mut Shared, transition: Transition) {
        shared.state = transition.next;
        if let Some(announcement) = transition.announcement {
            self.announce_locked(shared, announcement);
        }
        self.publish_locked(shared);
    }

    /// Turns the microphone off, supersedes any utterance in flight and
    /// starts speaking `announcement`.
    fn announce_locked(&self, shared: &mut Shared, announcement: Announcement) {
        self.silence_listener_locked(shared);

        if let Some(previous) = shared.speaker.take() {
            log_debug!("superseding utterance {}", previous.id);
            previous.cancel.cancel();
        }

        let id = shared.allocate_id();
        match shared.device.claim_for_speaking(id) {
            AudioOwner::Released => {}
            AudioOwner::Listening(owner) | AudioOwner::Speaking(owner) => {
                log_debug!("audio device taken over from worker {owner}");
            }
        }

        log_info!(
            "session {} announcing \"{}\"",
            shared.session_label(),
            announcement.text
        );
        let events = self.coach.speak(&announcement.text);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(speaking_loop(
            self.clone(),
            id,
            events,
            announcement.after,
            cancel.clone(),
        ));
        shared.speaker = Some(Worker { id, cancel, handle });
    }

    fn silence_listener_locked(&self, shared: &mut Shared) {
        if let Some(listener) = shared.listener.take() {
            listener.cancel.cancel();
            shared.device.release(AudioOwner::Listening(listener.id));
        }
        self.coach.stop_listening();
    }

    fn start_listener_locked(&self, shared: &mut Shared) {
        if shared.closed || shared.listener.is_some() {
            return;
        }

        let id = shared.allocate_id();
        if let Err(err) = shared.device.claim_for_listening(id) {
            log_debug!("not listening: {err}");
            return;
        }

        let tokens = self.coach.start_listening();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listening_loop(self.clone(), id, tokens, cancel.clone()));
        shared.listener = Some(Worker { id, cancel, handle });
        log_debug!("listener {id} started");
    }

    fn start_ticker_locked(&self, shared: &mut Shared) {
        if let Some(previous) = shared.ticker.take() {
            previous.cancel.cancel();
        }

        let id = shared.allocate_id();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(countdown_loop(self.clone(), id, cancel.clone()));
        shared.ticker = Some(Worker { id, cancel, handle });
    }

    fn publish_locked(&self, shared: &Shared) {
        self.snapshots
            .send_replace(build_snapshot(shared, &self.workout));
    }
}

fn build_snapshot(shared: &Shared, workout: &Workout) -> SessionSnapshot {
    let owner = shared.device.owner();
    SessionSnapshot {
        session_id: shared.session_id.clone(),
        state: shared.state,
        current_exercise: shared.state.current_exercise(workout).cloned(),
        remaining_seconds: shared.state.remaining_seconds(),
        is_active: shared.state.is_active(),
        stopped: shared.closed,
        finished: shared.finished,
        listening: matches!(owner, AudioOwner::Listening(_)),
        speaking: matches!(owner, AudioOwner::Speaking(_)),
        started_at: shared.started_at,
        updated_at: Utc::now(),
    }
}
