pub mod catalog;
pub mod models;
pub mod session;
pub mod settings;
pub mod utils;
pub mod voice;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use tokio::sync::watch;
use log::{info, warn};
use session::{SessionController, SessionSnapshot, SessionState};
use settings::{SessionSettings, SettingsStore};
use voice::ConsoleCoach;

const DEFAULT_WORKOUT: &str = "option1";
const STOP_ANNOUNCEMENT_GRACE: Duration = Duration::from_secs(5);

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn load_settings() -> Result<SessionSettings> {
    match std::env::var("FITVOICE_SETTINGS") {
        Ok(path) => Ok(SettingsStore::new(PathBuf::from(path))?.get()),
        Err(_) => Ok(SessionSettings::default()),
    }
}

/// One line of console output for a snapshot.
pub fn render(snapshot: &SessionSnapshot) -> String {
    let label = match snapshot.state {
        SessionState::Idle if snapshot.finished => return "Workout finished".into(),
        SessionState::Idle if snapshot.stopped => return "Stopping...".into(),
        SessionState::Idle => return "Say \"start\" to begin".into(),
        SessionState::Running { .. } => "running",
        SessionState::Paused { .. } => "paused",
    };

    let name = snapshot
        .current_exercise
        .as_ref()
        .map(|exercise| exercise.name.as_str())
        .unwrap_or("?");
    let remaining = snapshot.remaining_seconds.unwrap_or(0);
    format!(
        "{name} | {:02}:{:02} ({label})",
        remaining / 60,
        remaining % 60
    )
}

/// Emits the current snapshot and every change after it, skipping lines that
/// render the same. Ends after the finished line.
async fn print_updates(
    mut updates: watch::Receiver<SessionSnapshot>,
    mut emit: impl FnMut(String),
) {
    let mut last = String::new();
    loop {
        let (line, finished) = {
            let snapshot = updates.borrow_and_update();
            (render(&snapshot), snapshot.finished)
        };
        if line != last {
            emit(line.clone());
            last = line;
        }
        if finished || updates.changed().await.is_err() {
            break;
        }
    }
}

/// Console presentation: reads voice commands from stdin, prints state
/// changes, and exits once the session has been stopped.
pub fn run() -> Result<()> {
    utils::logging::init_logging(env_flag("FITVOICE_DEBUG"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run_session());
    // The console reader thread may still be parked on stdin.
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn run_session() -> Result<()> {
    let settings = load_settings()?;
    let source = std::env::var("FITVOICE_WORKOUT").unwrap_or_else(|_| DEFAULT_WORKOUT.into());
    let workout = catalog::resolve(&source)?;

    info!(
        "FitVoice starting workout '{source}' ({} exercises, {}s)",
        workout.len(),
        workout.total_seconds()
    );
    for exercise in &workout.exercises {
        println!(
            "  - {} ({}s): {}",
            exercise.name, exercise.duration, exercise.description
        );
    }

    let coach = ConsoleCoach::with_stdin(settings.voice.clone());
    let controller = SessionController::with_settings(workout, coach, &settings);

    let printer = tokio::spawn(print_updates(controller.subscribe(), |line| {
        println!("{line}")
    }));

    controller.begin_listening().await;

    tokio::select! {
        _ = controller.wait_finished() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            if controller.is_active().await {
                controller.stop().await;
                if tokio::time::timeout(STOP_ANNOUNCEMENT_GRACE, controller.wait_finished())
                    .await
                    .is_err()
                {
                    warn!("stop announcement did not finish in time");
                }
            }
        }
    }

    let finished = controller.take_finished().await;
    controller.shutdown().await;
    if finished {
        info!("session finished");
        if let Err(err) = printer.await {
            warn!("printer task failed: {err}");
        }
    } else {
        printer.abort();
    }
    Ok(())
}
