use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use interview_core::model::{
    FlowTimings, FlowTimingsDraft, ProctoringPolicy, RoundId, SessionId,
};
use remote::memory::DEFAULT_PIPELINE;
use remote::{HttpRemote, InMemoryRemote, RemoteConfig, SessionRemote};
use services::{Capabilities, SessionDriver};
use tracing_subscriber::EnvFilter;

mod terminal;

use terminal::{TerminalPresenter, pump_answers};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidSessionId { raw: String },
    MissingSessionId,
    InvalidBaseUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSessionId { raw } => {
                write!(f, "invalid --session-id value: {raw}")
            }
            ArgsError::MissingSessionId => {
                write!(f, "a session id is required (--session-id or INTERVIEW_SESSION_ID)")
            }
            ArgsError::InvalidBaseUrl { raw } => write!(f, "invalid --base-url value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run  --session-id <id> [--base-url <url>] [--no-proctoring]");
    eprintln!("  cargo run -p app -- demo [--session-id <id>] [--no-proctoring]");
    eprintln!();
    eprintln!("Task rounds read one answer per line from stdin.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  INTERVIEW_SESSION_ID, INTERVIEW_API_BASE_URL, INTERVIEW_API_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Demo,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "demo" => Some(Self::Demo),
            _ => None,
        }
    }
}

struct Args {
    session: Option<SessionId>,
    base_url: Option<String>,
    proctoring: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut session = std::env::var("INTERVIEW_SESSION_ID")
            .ok()
            .and_then(|value| value.parse::<SessionId>().ok());
        let mut base_url = None;
        let mut proctoring = true;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--session-id" => {
                    let value = require_value(args, "--session-id")?;
                    let parsed = value
                        .parse::<SessionId>()
                        .map_err(|_| ArgsError::InvalidSessionId { raw: value.clone() })?;
                    session = Some(parsed);
                }
                "--base-url" => {
                    let value = require_value(args, "--base-url")?;
                    let trimmed = value.trim();
                    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                        return Err(ArgsError::InvalidBaseUrl { raw: value });
                    }
                    base_url = Some(trimmed.to_owned());
                }
                "--no-proctoring" => proctoring = false,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            session,
            base_url,
            proctoring,
        })
    }
}

/// Short interstitials keep an offline walkthrough brisk.
fn demo_timings() -> Result<FlowTimings, interview_core::Error> {
    let prep = Duration::from_secs(3);
    let mut prep_overrides = Vec::new();
    for raw in DEFAULT_PIPELINE.iter().filter(|raw| raw.starts_with("prep_")) {
        prep_overrides.push((RoundId::new(*raw)?, prep));
    }
    let timings = FlowTimingsDraft {
        analysis_delay: Some(Duration::from_secs(2)),
        prep_default: Some(prep),
        prep_overrides,
        ..FlowTimingsDraft::new()
    }
    .validate()?;
    Ok(timings)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let (remote, session, timings) = match cmd {
        Command::Run => {
            let session = parsed.session.ok_or(ArgsError::MissingSessionId)?;
            let mut config = RemoteConfig::from_env();
            if let Some(base_url) = parsed.base_url {
                config.base_url = base_url;
            }
            tracing::info!(%session, base_url = %config.base_url, "connecting to interview service");
            let remote: Arc<dyn SessionRemote> = Arc::new(HttpRemote::new(config)?);
            (remote, session, FlowTimings::default())
        }
        Command::Demo => {
            let session = parsed.session.unwrap_or_else(|| SessionId::new(1));
            let memory = InMemoryRemote::new();
            memory.create_session(session)?;
            let remote: Arc<dyn SessionRemote> = Arc::new(memory);
            (remote, session, demo_timings()?)
        }
    };

    let presenter = Arc::new(TerminalPresenter::new());
    let pump = tokio::spawn(pump_answers(
        Arc::clone(&presenter),
        Arc::clone(&remote),
        session,
    ));

    let driver = SessionDriver::new(session, remote, Capabilities::headless(), presenter)
        .with_timings(timings)
        .with_policy(ProctoringPolicy::default().with_enabled(parsed.proctoring));
    let result = driver.run().await;
    pump.abort();

    let report = result?;
    tracing::info!(
        rounds = report.visited.len(),
        forced = report.forced.len(),
        "session finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
