use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use interview_core::model::{RoundId, SessionId, TaskKind};
use interview_core::time::format_clock;
use remote::{RoundSubmission, SessionRemote};
use serde_json::{Value, json};
use services::{RoundContext, RoundPresenter, RoundView, SubmissionState};
use tokio::io::{AsyncBufReadExt, BufReader};

struct ActiveTask {
    round: RoundId,
    task: TaskKind,
    context: RoundContext,
}

/// Presenter that prints rounds to stdout and takes task answers from stdin.
#[derive(Default)]
pub struct TerminalPresenter {
    active: Mutex<Option<ActiveTask>>,
}

impl TerminalPresenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveTask>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RoundPresenter for TerminalPresenter {
    fn show_loading(&self) {
        println!("Loading interview...");
    }

    fn show_round(&self, view: &RoundView, context: RoundContext) {
        match view {
            RoundView::ResumeAnalysis { delay, .. } => {
                println!("Analyzing your resume ({})", format_clock(delay.as_secs()));
            }
            RoundView::Prep {
                message, duration, ..
            } => {
                println!("{message}");
                println!("Starting in {}", format_clock(duration.as_secs()));
            }
            RoundView::Task {
                round,
                task,
                time_limit,
            } => {
                let limit = time_limit.map_or_else(
                    || "untimed".to_owned(),
                    |limit| format_clock(limit.as_secs()),
                );
                println!("[{round}] {} ({limit})", prompt(*task));
                if *task == TaskKind::TechnicalChat {
                    if let Err(err) = context.speak(prompt(*task)) {
                        tracing::debug!(error = %err, "prompt not read aloud");
                    }
                    if let Err(err) = context.listen() {
                        tracing::debug!(error = %err, "spoken answers unavailable");
                    }
                }
                *self.active() = Some(ActiveTask {
                    round: round.clone(),
                    task: *task,
                    context,
                });
            }
            RoundView::Unknown { .. } => {}
        }
    }

    fn show_transition(&self) {
        *self.active() = None;
        println!("...");
    }

    fn show_error(&self, message: &str) {
        eprintln!("{message}");
    }

    fn show_completed(&self) {
        println!("Interview Completed!");
    }

    fn navigate_to_results(&self, session: SessionId) {
        println!("Results for session {session} are being prepared.");
    }
}

fn prompt(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Mcq => "Enter your answers separated by commas",
        TaskKind::Coding => "Enter your solution on one line",
        TaskKind::TechnicalChat => "Type your answer",
    }
}

fn answer_payload(task: TaskKind, line: &str) -> Value {
    match task {
        TaskKind::Mcq => json!({
            "answers": line
                .split(',')
                .map(str::trim)
                .filter(|answer| !answer.is_empty())
                .collect::<Vec<_>>(),
        }),
        TaskKind::Coding => json!({ "code": line }),
        TaskKind::TechnicalChat => json!({ "transcript": [{ "role": "candidate", "text": line }] }),
    }
}

/// Submit each stdin line as the answer to the task on screen.
///
/// Lines typed while no task is shown, or after the round was submitted, are
/// dropped.
pub async fn pump_answers(
    presenter: Arc<TerminalPresenter>,
    remote: Arc<dyn SessionRemote>,
    session: SessionId,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "stopped reading answers from stdin");
                break;
            }
        };
        let Some(active) = presenter.active().take() else {
            tracing::debug!("no task on screen; input ignored");
            continue;
        };

        let Some(guard) = active.context.begin_submission() else {
            if active.context.submission_state() == SubmissionState::Submitted {
                println!("This round was already submitted.");
            } else {
                println!("A submission for this round is in progress; try again.");
                *presenter.active() = Some(active);
            }
            continue;
        };

        let submission = RoundSubmission::new(active.round.clone())
            .with_payload(answer_payload(active.task, line.trim()));
        match remote.submit_round(session, &submission).await {
            Ok(()) => {
                guard.accepted();
                active.context.complete();
            }
            Err(err) => {
                drop(guard);
                eprintln!("Submission failed ({err}); try again.");
                *presenter.active() = Some(active);
            }
        }
    }
}
