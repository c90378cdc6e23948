mod common;

use common::{controller_with, sample_workout, settle, CoachCall, SpeechMode};
use fitvoice_lib::session::SessionState;

#[tokio::test(start_paused = true)]
async fn spoken_start_matches_presentation_start() {
    let (controller, coach) = controller_with(sample_workout());

    controller.begin_listening().await;
    settle().await;
    assert!(coach.simulate_command("start"));
    settle().await;

    assert_eq!(
        controller.state().await,
        SessionState::Running {
            exercise_index: 0,
            remaining_seconds: 30
        }
    );
    assert_eq!(
        coach.spoken_texts(),
        vec!["Workout started. First exercise: Push-ups"]
    );
}

#[tokio::test(start_paused = true)]
async fn stray_tokens_while_idle_change_nothing() {
    let (controller, coach) = controller_with(sample_workout());

    controller.begin_listening().await;
    assert!(coach.simulate_command("pause"));
    assert!(coach.simulate_command("jump"));
    settle().await;

    assert_eq!(controller.state().await, SessionState::Idle);
    assert!(coach.spoken_texts().is_empty());
    assert!(controller.is_listening().await);
}

#[tokio::test(start_paused = true)]
async fn spoken_next_after_start() {
    let (controller, coach) = controller_with(sample_workout());

    controller.begin_listening().await;
    controller.start().await;
    settle().await;

    assert!(coach.simulate_command("next"));
    settle().await;

    assert_eq!(
        controller.state().await,
        SessionState::Running {
            exercise_index: 1,
            remaining_seconds: 45
        }
    );
    assert_eq!(coach.spoken_texts().last().unwrap(), "Next exercise: Squats");
}

#[tokio::test(start_paused = true)]
async fn spoken_stop_finishes_and_stays_deaf() {
    let (controller, coach) = controller_with(sample_workout());

    controller.begin_listening().await;
    coach.simulate_command("start");
    settle().await;
    let listens_before_stop = coach.listen_count();

    assert!(coach.simulate_command("stop"));
    settle().await;

    assert_eq!(controller.state().await, SessionState::Idle);
    assert!(controller.take_finished().await);
    assert_eq!(coach.listen_count(), listens_before_stop);
    assert!(!controller.is_listening().await);
    assert_eq!(controller.running_workers().await, 0);
}

#[tokio::test(start_paused = true)]
async fn listening_and_speaking_never_overlap() {
    let (controller, coach) = controller_with(sample_workout());

    controller.begin_listening().await;
    for word in ["start", "pause", "resume", "next", "next", "stop"] {
        coach.simulate_command(word);
        settle().await;
    }

    assert_eq!(coach.overlaps(), 0);

    // Every utterance is preceded by closing the microphone.
    let calls = coach.calls();
    for (index, call) in calls.iter().enumerate() {
        if matches!(call, CoachCall::Speak(_)) {
            let last_start = calls[..index]
                .iter()
                .rposition(|c| *c == CoachCall::StartListening);
            let last_stop = calls[..index]
                .iter()
                .rposition(|c| *c == CoachCall::StopListening);
            assert!(last_stop > last_start, "spoke while listening at call {index}");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn microphone_waits_for_the_announcement() {
    let (controller, coach) = controller_with(sample_workout());
    coach.set_speech_mode(SpeechMode::Hold);

    controller.begin_listening().await;
    controller.start().await;
    settle().await;

    assert!(controller.is_speaking().await);
    assert!(!controller.is_listening().await);

    controller.begin_listening().await;
    assert_eq!(coach.listen_count(), 1);

    coach.release_speech();
    settle().await;

    assert!(!controller.is_speaking().await);
    assert!(controller.is_listening().await);
    assert_eq!(coach.listen_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn superseded_announcement_does_not_reopen_microphone() {
    let (controller, coach) = controller_with(sample_workout());
    coach.set_speech_mode(SpeechMode::Hold);

    controller.start().await;
    controller.pause().await;
    settle().await;

    coach.release_speech();
    settle().await;

    assert_eq!(
        coach.spoken_texts(),
        vec!["Workout started. First exercise: Push-ups", "Workout paused"]
    );
    assert_eq!(coach.listen_count(), 1);
    assert!(controller.is_listening().await);
}

#[tokio::test(start_paused = true)]
async fn failed_speech_counts_as_finished() {
    let (controller, coach) = controller_with(sample_workout());
    coach.set_speech_mode(SpeechMode::Fail);

    controller.begin_listening().await;
    controller.start().await;
    settle().await;

    assert!(controller.state().await.is_running());
    assert!(controller.is_listening().await);

    coach.simulate_command("stop");
    settle().await;
    assert!(controller.take_finished().await);
}

#[tokio::test(start_paused = true)]
async fn denied_microphone_still_allows_presentation_commands() {
    let (controller, coach) = controller_with(sample_workout());
    coach.deny_listening();

    controller.begin_listening().await;
    settle().await;
    assert!(!controller.is_listening().await);
    assert!(!coach.simulate_command("start"));

    controller.start().await;
    settle().await;
    assert_eq!(
        controller.state().await,
        SessionState::Running {
            exercise_index: 0,
            remaining_seconds: 30
        }
    );
    assert!(!controller.is_listening().await);

    controller.stop().await;
    settle().await;
    assert!(controller.take_finished().await);
}

#[tokio::test(start_paused = true)]
async fn begin_listening_is_idempotent() {
    let (controller, coach) = controller_with(sample_workout());

    controller.begin_listening().await;
    controller.begin_listening().await;
    settle().await;
    controller.begin_listening().await;

    assert_eq!(coach.listen_count(), 1);
    assert!(controller.is_listening().await);
}
