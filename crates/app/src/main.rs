use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use services::{AppServices, Clock};
use study_core::model::{ItemId, Participant, ParticipantId, SessionId};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    ReadFile { path: String, source: std::io::Error },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "missing required {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} id: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::ReadFile { path, source } => write!(f, "cannot read {path}: {source}"),
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

fn required<T>(value: Option<T>, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  study flashcards  (--text <text> | --file <path>)");
    eprintln!("  study notes       (--text <text> | --file <path>)");
    eprintln!("  study study-set   (--text <text> | --file <path>)");
    eprintln!("  study quiz        (--text <text> | --file <path>) [--count <1-20>] [--title <title>]");
    eprintln!("  study flowchart   (--text <text> | --file <path>)");
    eprintln!("  study flowcharts");
    eprintln!("  study sessions");
    eprintln!("  study session     --session <id>");
    eprintln!("  study join        --session <id> --name <name>");
    eprintln!("  study answer      --session <id> --participant <id> --question <id> --answer <text>");
    eprintln!("  study leaderboard --session <id>");
    eprintln!("  study standing    --session <id> --participant <id>");
    eprintln!("  study host <start|pause|next|previous> --session <id>");
    eprintln!();
    eprintln!("Every command accepts --db <sqlite_url> (default sqlite:study.sqlite3).");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_LOG");
    eprintln!("  STUDY_AI_API_KEY, STUDY_AI_BASE_URL, STUDY_AI_MODEL, STUDY_AI_JSON_MODE");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostAction {
    Start,
    Pause,
    Next,
    Previous,
}

impl HostAction {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "start" => Some(Self::Start),
            "pause" => Some(Self::Pause),
            "next" => Some(Self::Next),
            "previous" | "prev" => Some(Self::Previous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Flashcards,
    Notes,
    StudySet,
    Quiz,
    Flowchart,
    Flowcharts,
    Sessions,
    Session,
    Join,
    Answer,
    Leaderboard,
    Standing,
    Host(HostAction),
}

impl Command {
    fn from_args(args: &mut impl Iterator<Item = String>, first: &str) -> Option<Self> {
        Some(match first {
            "flashcards" => Self::Flashcards,
            "notes" => Self::Notes,
            "study-set" => Self::StudySet,
            "quiz" => Self::Quiz,
            "flowchart" => Self::Flowchart,
            "flowcharts" => Self::Flowcharts,
            "sessions" => Self::Sessions,
            "session" => Self::Session,
            "join" => Self::Join,
            "answer" => Self::Answer,
            "leaderboard" => Self::Leaderboard,
            "standing" => Self::Standing,
            "host" => Self::Host(HostAction::from_arg(&args.next()?)?),
            _ => return None,
        })
    }

    fn parse(args: &mut impl Iterator<Item = String>, first: &str) -> Result<Self, ArgsError> {
        Self::from_args(args, first).ok_or_else(|| ArgsError::UnknownCommand(first.to_string()))
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    text: Option<String>,
    file: Option<String>,
    count: Option<u32>,
    title: Option<String>,
    session: Option<SessionId>,
    participant: Option<ParticipantId>,
    question: Option<ItemId>,
    answer: Option<String>,
    name: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(value);
                }
                "--text" => parsed.text = Some(require_value(args, "--text")?),
                "--file" => parsed.file = Some(require_value(args, "--file")?),
                "--count" => {
                    let value = require_value(args, "--count")?;
                    let count = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--count",
                        raw: value.clone(),
                    })?;
                    parsed.count = Some(count);
                }
                "--title" => parsed.title = Some(require_value(args, "--title")?),
                "--session" => parsed.session = Some(parse_id(args, "--session")?),
                "--participant" => parsed.participant = Some(parse_id(args, "--participant")?),
                "--question" => parsed.question = Some(parse_id(args, "--question")?),
                "--answer" => parsed.answer = Some(require_value(args, "--answer")?),
                "--name" => parsed.name = Some(require_value(args, "--name")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    /// Source text from `--text`, or the contents of `--file`.
    fn source_text(&self) -> Result<String, ArgsError> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        let path = required(self.file.as_ref(), "--text or --file")?;
        std::fs::read_to_string(path).map_err(|source| ArgsError::ReadFile {
            path: path.clone(),
            source,
        })
    }

    fn db_url(&self) -> String {
        let raw = self
            .db_url
            .clone()
            .or_else(|| std::env::var("STUDY_DB_URL").ok())
            .unwrap_or_else(|| "sqlite:study.sqlite3".into());
        normalize_sqlite_url(raw)
    }
}

fn parse_id<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw: value.clone() })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = std::env::var("STUDY_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(log_fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardRow<'a> {
    rank: usize,
    participant_id: ParticipantId,
    name: &'a str,
    score: u32,
}

fn leaderboard_rows(board: &[Participant]) -> Vec<LeaderboardRow<'_>> {
    board
        .iter()
        .enumerate()
        .map(|(index, participant)| LeaderboardRow {
            rank: index + 1,
            participant_id: participant.id(),
            name: participant.name(),
            score: participant.score(),
        })
        .collect()
}

const SESSION_LIST_LIMIT: u32 = 50;
const DEFAULT_QUIZ_TITLE: &str = "Generated Quiz";

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::parse(&mut argv, &first).inspect_err(|_| print_usage())?,
    };

    let args = Args::parse(&mut argv).inspect_err(|_| print_usage())?;

    let db_url = args.db_url();
    prepare_sqlite_file(&db_url)?;
    let app = AppServices::new_sqlite(&db_url, Clock::default()).await?;
    info!(?cmd, %db_url, "running command");

    let quiz = app.quiz();
    match cmd {
        Command::Flashcards => {
            print_json(&app.generation().generate_flashcards(&args.source_text()?).await?)
        }
        Command::Notes => print_json(&app.generation().generate_notes(&args.source_text()?).await?),
        Command::StudySet => {
            print_json(&app.generation().generate_study_set(&args.source_text()?).await?)
        }
        Command::Quiz => {
            let count = args.count.unwrap_or(services::generation::DEFAULT_QUIZ_COUNT);
            let questions = app
                .generation()
                .generate_quiz(&args.source_text()?, count)
                .await?;
            let title = args.title.as_deref().unwrap_or(DEFAULT_QUIZ_TITLE);
            print_json(&quiz.create_session(title, questions).await?)
        }
        Command::Flowchart => {
            let chart = app
                .flowcharts()
                .generate_and_save(&app.generation(), &args.source_text()?)
                .await?;
            print_json(&chart)
        }
        Command::Flowcharts => print_json(&app.flowcharts().list().await?),
        Command::Sessions => print_json(&quiz.list_sessions(SESSION_LIST_LIMIT).await?),
        Command::Session => {
            print_json(&quiz.get_session(required(args.session, "--session")?).await?)
        }
        Command::Join => {
            let session = required(args.session, "--session")?;
            let name = required(args.name.as_deref(), "--name")?;
            print_json(&quiz.add_participant(session, name).await?)
        }
        Command::Answer => {
            let outcome = quiz
                .submit_answer(
                    required(args.session, "--session")?,
                    required(args.participant, "--participant")?,
                    &required(args.question.clone(), "--question")?,
                    required(args.answer.as_deref(), "--answer")?,
                )
                .await?;
            print_json(&outcome)
        }
        Command::Leaderboard => {
            let board = quiz.leaderboard(required(args.session, "--session")?).await?;
            print_json(&leaderboard_rows(&board))
        }
        Command::Standing => {
            let standing = quiz
                .standing(
                    required(args.session, "--session")?,
                    required(args.participant, "--participant")?,
                )
                .await?;
            print_json(&standing)
        }
        Command::Host(action) => {
            let session = required(args.session, "--session")?;
            let phase = match action {
                HostAction::Start => quiz.start(session).await?,
                HostAction::Pause => quiz.pause(session).await?,
                HostAction::Next => quiz.next(session).await?,
                HostAction::Previous => quiz.previous(session).await?,
            };
            print_json(&phase)
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    if let Err(err) = run().await {
        // Binary glue: print once and exit.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
