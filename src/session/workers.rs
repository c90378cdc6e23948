use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::voice::{SpeechEvent, SpeechEvents, TokenStream};

use super::{
    controller::WorkerKind,
    state::AfterSpeech,
    SessionController, SessionState,
};

// Set to true to trace every tick and token.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Sleeps for `duration` unless cancelled first. Returns `false` on cancel.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Counts the running exercise down one tick at a time.
///
/// The state is re-read after every wait: a tick only applies if the same
/// exercise is still running, so a `next` or `stop` that lands mid-wait wins.
pub(super) async fn countdown_loop(
    controller: SessionController,
    worker_id: u64,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let observed = controller.state().await;
        let keep_going = match observed {
            SessionState::Running {
                remaining_seconds, ..
            } if remaining_seconds > 0 => {
                sleep_or_cancel(&cancel, controller.tick_interval()).await
                    && controller.apply_tick(worker_id, observed).await
            }
            SessionState::Running { .. } => controller.apply_tick(worker_id, observed).await,
            SessionState::Paused { .. } => {
                sleep_or_cancel(&cancel, controller.pause_poll_interval()).await
            }
            SessionState::Idle => false,
        };

        if !keep_going {
            break;
        }
    }

    log_debug!("countdown {worker_id} exiting");
    controller
        .release_worker(WorkerKind::Countdown, worker_id)
        .await;
}

/// Feeds recognized tokens into the controller until cancelled or until the
/// recognizer stops producing (denied permission, device failure).
pub(super) async fn listening_loop(
    controller: SessionController,
    worker_id: u64,
    mut tokens: TokenStream,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            token = tokens.next() => match token {
                Some(token) => {
                    log_debug!("listener {worker_id} heard '{token}'");
                    controller.handle_token(&token).await;
                }
                None => {
                    log_info!("listener {worker_id}: recognizer stopped producing tokens");
                    break;
                }
            }
        }
    }

    drop(tokens);
    controller
        .release_worker(WorkerKind::Listener, worker_id)
        .await;
}

/// Waits for one utterance to end, then hands control back to the
/// controller. Event payloads only drive sequencing; a failed utterance is
/// treated like a finished one. If superseded, the stream is dropped, which
/// cancels the utterance, and nothing else happens.
pub(super) async fn speaking_loop(
    controller: SessionController,
    worker_id: u64,
    mut events: SpeechEvents,
    after: AfterSpeech,
    cancel: CancellationToken,
) {
    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_debug!("utterance {worker_id} cancelled");
                return;
            }
            event = events.next() => match event {
                Some(event) if event.is_terminal() => break event,
                Some(_) => continue,
                None => break SpeechEvent::Completed,
            }
        }
    };

    if let SpeechEvent::Failed(reason) = &outcome {
        log_warn!("utterance {worker_id} failed: {reason}");
    }

    drop(events);
    controller.finish_speech(worker_id, after).await;
}
