use std::sync::{Arc, Mutex};
use std::time::Duration;

use interview_core::model::{FlowTimings, FlowTimingsDraft, RoundId, SessionId, TaskKind};
use remote::{InMemoryRemote, RemoteOp, RoundSubmission, SessionRemote};
use serde_json::json;
use services::env::Viewport;
use services::{
    Capabilities, DriverError, DriverReport, EnvSignal, FakeEnvironment, ForceReason,
    RoundContext, RoundPresenter, RoundView, SessionDriver,
};
use tokio::time::Instant;

fn round(raw: &str) -> RoundId {
    RoundId::new(raw).unwrap()
}

/// Presenter that records what was shown. Task rounds submit answers after
/// `answer_delay` and complete on their own unless `manual` is set.
struct Recorder {
    remote: InMemoryRemote,
    session: SessionId,
    host: FakeEnvironment,
    manual: bool,
    answer_delay: Duration,
    shown: Mutex<Vec<String>>,
    scroll_during_rounds: Mutex<Vec<bool>>,
}

impl Recorder {
    fn new(remote: &InMemoryRemote, session: SessionId, host: &FakeEnvironment) -> Self {
        Self {
            remote: remote.clone(),
            session,
            host: host.clone(),
            manual: false,
            answer_delay: Duration::ZERO,
            shown: Mutex::new(Vec::new()),
            scroll_during_rounds: Mutex::new(Vec::new()),
        }
    }

    fn manual(mut self) -> Self {
        self.manual = true;
        self
    }

    fn answering_after(mut self, delay: Duration) -> Self {
        self.answer_delay = delay;
        self
    }

    fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.shown.lock().unwrap().push(entry);
    }
}

impl RoundPresenter for Recorder {
    fn show_round(&self, view: &RoundView, context: RoundContext) {
        self.push(view.component().to_owned());
        self.scroll_during_rounds
            .lock()
            .unwrap()
            .push(self.host.scroll_locked());

        if view.task() == Some(TaskKind::TechnicalChat) {
            context.speak("Walk me through your last project.").unwrap();
            context.listen().unwrap();
        }

        if view.task().is_some() && !self.manual {
            let remote = self.remote.clone();
            let session = self.session;
            let delay = self.answer_delay;
            let submission =
                RoundSubmission::new(view.round().clone()).with_field("answers", json!([1, 3]));
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(guard) = context.begin_submission() else {
                    return;
                };
                remote.submit_round(session, &submission).await.unwrap();
                guard.accepted();
                context.complete();
            });
        }
    }

    fn show_error(&self, message: &str) {
        self.push(format!("error: {message}"));
    }

    fn show_completed(&self) {
        self.push("completed".to_owned());
    }

    fn task_progress(&self, _round: &RoundId) -> serde_json::Value {
        json!({ "answers": [2] })
    }

    fn navigate_to_results(&self, session: SessionId) {
        self.push(format!("results {session}"));
    }
}

fn setup(rounds: &[&str]) -> (InMemoryRemote, SessionId, FakeEnvironment) {
    let remote = InMemoryRemote::new();
    let session = SessionId::new(7);
    remote
        .create_session_with_rounds(session, rounds.iter().map(|raw| round(raw)).collect())
        .unwrap();
    (remote, session, FakeEnvironment::new())
}

fn driver(
    remote: &InMemoryRemote,
    session: SessionId,
    host: &FakeEnvironment,
    presenter: Arc<Recorder>,
) -> SessionDriver {
    SessionDriver::new(
        session,
        Arc::new(remote.clone()),
        Capabilities::from_host(host.clone()),
        presenter,
    )
}

async fn wait_until(mut ready: impl FnMut() -> bool) {
    while !ready() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn walks_prep_and_task_rounds_to_results() {
    let (remote, session, host) = setup(&["prep_oa", "oa_mcq", "prep_coding", "oa_coding"]);
    let timings = FlowTimingsDraft {
        prep_overrides: vec![
            (round("prep_oa"), Duration::from_secs(2)),
            (round("prep_coding"), Duration::from_secs(2)),
        ],
        ..FlowTimingsDraft::new()
    }
    .validate()
    .unwrap();
    let presenter = Arc::new(Recorder::new(&remote, session, &host));

    let started = Instant::now();
    let report = driver(&remote, session, &host, Arc::clone(&presenter))
        .with_timings(timings)
        .run()
        .await
        .unwrap();

    assert_eq!(
        presenter.shown(),
        vec!["prep-timer", "mcq", "prep-timer", "coding", "completed", "results 7"]
    );
    assert_eq!(
        report,
        DriverReport {
            visited: vec![
                round("prep_oa"),
                round("oa_mcq"),
                round("prep_coding"),
                round("oa_coding"),
            ],
            forced: Vec::new(),
        }
    );
    assert_eq!(remote.calls(RemoteOp::Advance), 2);
    let submissions = remote.submissions(session).unwrap();
    assert_eq!(submissions.len(), 2);
    assert!(submissions.iter().all(|s| !s.is_auto_submitted()));
    // Two prep countdowns plus the redirect delay.
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert!(!host.scroll_locked());
    assert_eq!(host.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_hidden_tab_force_submits_and_moves_on() {
    let (remote, session, host) = setup(&["oa_mcq", "prep_coding"]);
    let presenter = Arc::new(Recorder::new(&remote, session, &host).manual());
    let driver = driver(&remote, session, &host, Arc::clone(&presenter));
    let run = tokio::spawn(async move { driver.run().await });

    wait_until(|| presenter.shown().len() == 1).await;
    assert_eq!(presenter.scroll_during_rounds.lock().unwrap().clone(), vec![true]);
    assert_eq!(host.fullscreen_requests(), 1);
    assert_eq!(host.listener_count(), 4);

    host.emit(EnvSignal::VisibilityChanged { hidden: true });
    host.emit(EnvSignal::VisibilityChanged { hidden: false });
    host.emit(EnvSignal::VisibilityChanged { hidden: true });

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.forced, vec![(round("oa_mcq"), ForceReason::Terminated)]);
    assert_eq!(
        presenter.shown(),
        vec!["mcq", "prep-timer", "completed", "results 7"]
    );

    let submissions = remote.submissions(session).unwrap();
    assert_eq!(submissions.len(), 1);
    let forced = &submissions[0];
    assert!(forced.is_auto_submitted());
    assert_eq!(forced.payload()["reason"], json!("proctoring_violation"));
    assert_eq!(forced.payload()["answers"], json!([2]));
    assert_eq!(forced.payload()["proctoring"]["violation_count"], json!(2));
    assert_eq!(forced.payload()["proctoring"]["terminated"], json!(true));
    assert_eq!(host.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn soft_signals_never_end_the_round() {
    let (remote, session, host) = setup(&["oa_coding"]);
    let presenter = Arc::new(Recorder::new(&remote, session, &host).manual());
    let driver = driver(&remote, session, &host, Arc::clone(&presenter));
    let controller = driver.controller();
    let run = tokio::spawn(async move { driver.run().await });

    wait_until(|| presenter.shown().len() == 1).await;
    for _ in 0..5 {
        host.emit(EnvSignal::WindowBlurred);
        host.emit(EnvSignal::Resized(Viewport {
            outer_width: 1600,
            inner_width: 1200,
            outer_height: 900,
            inner_height: 880,
        }));
    }
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(presenter.shown(), vec!["coding"]);
    assert!(remote.submissions(session).unwrap().is_empty());
    assert!(controller.current().is_some());
    run.abort();
}

#[tokio::test(start_paused = true)]
async fn time_up_proceeds_even_if_forced_submission_fails() {
    let (remote, session, host) = setup(&["oa_mcq"]);
    remote.fail_next(RemoteOp::SubmitRound, 500).unwrap();
    let timings = FlowTimingsDraft {
        mcq_limit: Some(Duration::from_secs(3)),
        ..FlowTimingsDraft::new()
    }
    .validate()
    .unwrap();
    let presenter = Arc::new(Recorder::new(&remote, session, &host).manual());

    let report = driver(&remote, session, &host, Arc::clone(&presenter))
        .with_timings(timings)
        .run()
        .await
        .unwrap();

    assert_eq!(report.forced, vec![(round("oa_mcq"), ForceReason::TimeUp)]);
    assert_eq!(remote.calls(RemoteOp::SubmitRound), 2);
    let submissions = remote.submissions(session).unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].payload()["reason"], json!("time_up"));
    assert_eq!(presenter.shown(), vec!["mcq", "completed", "results 7"]);
}

#[tokio::test(start_paused = true)]
async fn completed_session_goes_straight_to_results() {
    let (remote, session, host) = setup(&[]);
    let presenter = Arc::new(Recorder::new(&remote, session, &host));

    let report = driver(&remote, session, &host, Arc::clone(&presenter))
        .run()
        .await
        .unwrap();

    assert!(report.visited.is_empty());
    assert_eq!(presenter.shown(), vec!["completed", "results 7"]);
    assert_eq!(host.fullscreen_requests(), 0);
    assert_eq!(remote.calls(RemoteOp::Advance), 0);
}

#[tokio::test(start_paused = true)]
async fn leaving_a_chat_round_silences_speech() {
    let (remote, session, host) = setup(&["tech_1"]);
    let presenter = Arc::new(Recorder::new(&remote, session, &host));

    driver(&remote, session, &host, Arc::clone(&presenter))
        .run()
        .await
        .unwrap();

    assert_eq!(host.spoken(), vec!["Walk me through your last project."]);
    assert_eq!(host.speech_cancels(), 1);
    assert_eq!(host.listen_aborts(), 1);
    assert!(!host.is_listening());
}

#[tokio::test(start_paused = true)]
async fn speech_is_only_offered_in_chat_rounds() {
    struct Keeper(Arc<Mutex<Vec<RoundContext>>>);

    impl RoundPresenter for Keeper {
        fn show_round(&self, _view: &RoundView, context: RoundContext) {
            self.0.lock().unwrap().push(context);
        }

        fn navigate_to_results(&self, _session: SessionId) {}
    }

    let (remote, session, host) = setup(&["oa_mcq"]);
    let contexts = Arc::new(Mutex::new(Vec::new()));

    let driver = SessionDriver::new(
        session,
        Arc::new(remote.clone()),
        Capabilities::from_host(host.clone()),
        Arc::new(Keeper(Arc::clone(&contexts))),
    );
    let run = tokio::spawn(async move { driver.run().await });

    wait_until(|| !contexts.lock().unwrap().is_empty()).await;
    let context = contexts.lock().unwrap()[0].clone();
    assert!(context.speak("hello").is_err());
    assert!(context.listen().is_err());
    assert!(host.spoken().is_empty());
    run.abort();
}

#[tokio::test(start_paused = true)]
async fn unknown_round_is_reported_not_guessed() {
    let (remote, session, host) = setup(&["offer_letter"]);
    let presenter = Arc::new(Recorder::new(&remote, session, &host));

    let err = driver(&remote, session, &host, Arc::clone(&presenter))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::UnknownRound(ref r) if r.as_str() == "offer_letter"));
    assert_eq!(presenter.shown(), vec!["error: Unknown State: offer_letter"]);
}

#[tokio::test(start_paused = true)]
async fn failed_first_fetch_can_be_retried() {
    let (remote, session, host) = setup(&["tech_2"]);
    remote.fail_next(RemoteOp::FetchState, 503).unwrap();
    let presenter = Arc::new(Recorder::new(&remote, session, &host));
    let driver = driver(&remote, session, &host, Arc::clone(&presenter));

    assert!(matches!(
        driver.run().await,
        Err(DriverError::Controller(_))
    ));
    let report = driver.run().await.unwrap();
    assert_eq!(report.visited, vec![round("tech_2")]);
}

#[tokio::test(start_paused = true)]
async fn disabled_proctoring_attaches_nothing() {
    let (remote, session, host) = setup(&["oa_mcq"]);
    let presenter = Arc::new(Recorder::new(&remote, session, &host).manual());
    let policy = interview_core::model::ProctoringPolicy::default().with_enabled(false);
    let driver = driver(&remote, session, &host, Arc::clone(&presenter)).with_policy(policy);
    let run = tokio::spawn(async move { driver.run().await });

    wait_until(|| presenter.shown().len() == 1).await;
    assert_eq!(host.listener_count(), 0);
    assert_eq!(host.fullscreen_requests(), 0);
    host.emit(EnvSignal::VisibilityChanged { hidden: true });
    host.emit(EnvSignal::VisibilityChanged { hidden: true });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(presenter.shown(), vec!["mcq"]);
    run.abort();
}

fn two_prep_timings() -> FlowTimings {
    FlowTimingsDraft {
        prep_overrides: vec![
            (round("prep_oa"), Duration::from_secs(2)),
            (round("prep_coding"), Duration::from_secs(2)),
        ],
        ..FlowTimingsDraft::new()
    }
    .validate()
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_after_countdown_does_not_skip_a_round() {
    let (remote, session, host) = setup(&["prep_oa", "oa_mcq", "prep_coding", "oa_coding"]);
    let presenter = Arc::new(Recorder::new(&remote, session, &host));
    let driver =
        driver(&remote, session, &host, Arc::clone(&presenter)).with_timings(two_prep_timings());
    let run = tokio::spawn(async move { driver.run().await });

    wait_until(|| presenter.shown().len() == 1).await;
    remote.fail_next(RemoteOp::FetchState, 503).unwrap();

    let report = run.await.unwrap().unwrap();
    assert_eq!(
        presenter.shown(),
        vec!["prep-timer", "mcq", "prep-timer", "coding", "completed", "results 7"]
    );
    assert_eq!(
        report.visited,
        vec![
            round("prep_oa"),
            round("oa_mcq"),
            round("prep_coding"),
            round("oa_coding"),
        ]
    );
    assert_eq!(remote.calls(RemoteOp::Advance), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_advance_ends_the_run() {
    let (remote, session, host) = setup(&["prep_oa", "oa_mcq"]);
    remote.fail_next(RemoteOp::Advance, 404).unwrap();
    let presenter = Arc::new(Recorder::new(&remote, session, &host));

    let err = driver(&remote, session, &host, Arc::clone(&presenter))
        .with_timings(two_prep_timings())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::Controller(_)));
    assert_eq!(remote.calls(RemoteOp::Advance), 1);
    let shown = presenter.shown();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0], "prep-timer");
    assert!(shown[1].starts_with("error: "));
    assert!(!host.scroll_locked());
}

#[tokio::test(start_paused = true)]
async fn time_up_during_candidate_submission_submits_once() {
    let (remote, session, host) = setup(&["oa_mcq", "prep_coding"]);
    let remote = remote.with_latency(Duration::from_secs(1));
    let timings = FlowTimingsDraft {
        mcq_limit: Some(Duration::from_secs(3)),
        ..FlowTimingsDraft::new()
    }
    .validate()
    .unwrap();
    let presenter = Arc::new(
        Recorder::new(&remote, session, &host).answering_after(Duration::from_millis(2500)),
    );

    let report = driver(&remote, session, &host, Arc::clone(&presenter))
        .with_timings(timings)
        .run()
        .await
        .unwrap();

    assert_eq!(report.forced, vec![(round("oa_mcq"), ForceReason::TimeUp)]);
    assert_eq!(remote.calls(RemoteOp::SubmitRound), 1);
    let submissions = remote.submissions(session).unwrap();
    assert_eq!(submissions.len(), 1);
    assert!(!submissions[0].is_auto_submitted());
    assert_eq!(
        presenter.shown(),
        vec!["mcq", "prep-timer", "completed", "results 7"]
    );
}
