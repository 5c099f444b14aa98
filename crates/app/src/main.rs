use std::fmt;

use services::quiz::{QuizLoopService, QuizSession};
use services::{AppServices, Clock, ReaderService, ReaderSession, StudyConfig};
use study_core::annotate::Rect;
use study_core::model::{StudyTrack, Theme};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingTrack,
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidTheme { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingTrack => write!(f, "--subject and --topic are required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTheme { raw } => write!(f, "invalid theme: {raw}"),
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
    eprintln!("  cargo run -p app -- install [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- read    --subject <s> --topic <t> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- quiz    --subject <s> --topic <t> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- theme   [light|dark|toggle] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- name    <display name> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://study.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_ORIGIN, STUDY_CONTENT_ROOT, STUDY_QUIZ_MINUTES,");
    eprintln!("  STUDY_CACHE_VERSION, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Install,
    Read,
    Quiz,
    History,
    Theme,
    Name,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "install" => Some(Self::Install),
            "read" => Some(Self::Read),
            "quiz" => Some(Self::Quiz),
            "history" => Some(Self::History),
            "theme" => Some(Self::Theme),
            "name" => Some(Self::Name),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    subject: Option<String>,
    topic: Option<String>,
    positional: Vec<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("STUDY_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://study.sqlite3".into(), normalize_sqlite_url);
        let mut subject = None;
        let mut topic = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--subject" => subject = Some(require_value(args, "--subject")?),
                "--topic" => topic = Some(require_value(args, "--topic")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        Ok(Self {
            db_url,
            subject,
            topic,
            positional,
        })
    }

    fn track(&self) -> Result<StudyTrack, ArgsError> {
        StudyTrack::from_query(self.subject.as_deref(), self.topic.as_deref())
            .map_err(|_| ArgsError::MissingTrack)
    }
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
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
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

    let path = std::path::Path::new(path);
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

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

type InputLines = Lines<BufReader<Stdin>>;

async fn run_install(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let offline = services.offline();
    let (installed, activated) = offline.register().await?;
    println!("cached {} assets in {}", installed.stored, installed.cache);
    for name in &activated.deleted {
        println!("removed stale cache {name}");
    }
    for name in &activated.failed {
        println!("could not remove stale cache {name}");
    }
    Ok(())
}

async fn run_read(
    services: &AppServices,
    track: StudyTrack,
    lines: &mut InputLines,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = services.reader();
    let mut session = match reader.open_track(track).await {
        Ok(session) => session,
        Err(err) => {
            println!("{}", err.user_message());
            return Ok(());
        }
    };

    loop {
        print_page(&session);
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let line = line.trim();
        match line {
            "n" => {
                if let Err(err) = reader.next_page(&mut session).await {
                    println!("{}", err.user_message());
                }
            }
            "p" => {
                if let Err(err) = reader.previous_page(&mut session).await {
                    println!("{}", err.user_message());
                }
            }
            "q" | "" => return Ok(()),
            other => match other.strip_prefix("c ") {
                Some(text) => add_comment(&reader, &mut session, text).await,
                None => println!("commands: n (next), p (previous), c <text> (comment), q (quit)"),
            },
        }
    }
}

async fn add_comment(reader: &ReaderService, session: &mut ReaderSession, text: &str) {
    let origin = Rect::new(0.0, 0.0, 0.0, 0.0);
    match reader.add_comment(session, text, &origin, &origin).await {
        Ok(added) if added.persisted => println!("comment saved"),
        Ok(_) => println!("comment shown but could not be saved"),
        Err(err) => println!("{}", err.user_message()),
    }
}

fn print_page(session: &ReaderSession) {
    let nav = session.navigation();
    println!();
    println!(
        "== {} (page {}/{}) ==",
        session.heading(),
        session.page(),
        session.total_pages()
    );
    println!("{}", session.markup());
    for comment in session.comments() {
        println!("  [note] {}", comment.text);
    }
    let mut hints = Vec::new();
    if nav.has_prev {
        hints.push("p: previous");
    }
    if nav.has_next {
        hints.push("n: next");
    }
    hints.push("c <text>: comment");
    hints.push("q: quit");
    println!("{}", hints.join(" | "));
}

enum QuizInput {
    Line(Option<String>),
    TimeUp,
}

async fn run_quiz(
    services: &AppServices,
    track: StudyTrack,
    lines: &mut InputLines,
) -> Result<(), Box<dyn std::error::Error>> {
    let quiz = services.quiz_loop();
    let mut session = match quiz.start(track).await {
        Ok(session) => session,
        Err(err) => {
            println!("{}", err.user_message());
            return Ok(());
        }
    };
    if let Some(title) = session.title() {
        println!("== {title} ==");
    }
    if let Some(video) = session.video() {
        println!("video: {video}");
    }

    while let Some(current) = session.current_question() {
        let index = current.index;
        let options = current.question.options().to_vec();
        println!();
        println!("Q{}/{}: {}", current.number(), current.total, current.question.prompt());
        for (n, option) in options.iter().enumerate() {
            println!("  {}. {option}", n + 1);
        }
        println!("  (s: skip, q: save and quit)");

        let input = tokio::select! {
            () = quiz.wait_for_deadline(&session) => QuizInput::TimeUp,
            line = lines.next_line() => QuizInput::Line(line?),
        };

        let step = match input {
            QuizInput::TimeUp => {
                println!("Time is up!");
                quiz.expire(&mut session).await?;
                break;
            }
            QuizInput::Line(None) => return Ok(()),
            QuizInput::Line(Some(line)) => match line.trim() {
                "q" => return Ok(()),
                "s" => quiz.skip(&mut session, index).await?,
                raw => {
                    let Some(choice) = raw
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|n| options.get(n))
                    else {
                        println!("enter a number between 1 and {}", options.len());
                        continue;
                    };
                    quiz.answer(&mut session, index, choice).await?
                }
            },
        };

        if let Some(feedback) = &step.feedback {
            if feedback.is_correct {
                println!("Correct!");
            } else {
                println!("Wrong. Correct answer: {}", feedback.correct_answer);
            }
        }
        if let Some(milestone) = step.milestone {
            println!("*** {} ***", quiz.milestone_message(milestone).await);
        }
        if !step.persisted {
            println!("(progress could not be saved)");
        }
    }

    print_outcome(&quiz, &session).await;
    Ok(())
}

async fn print_outcome(quiz: &QuizLoopService, session: &QuizSession) {
    let Some(outcome) = session.outcome() else {
        return;
    };
    println!();
    println!("Total questions: {}", outcome.total);
    println!("Attempted:       {}", outcome.attempted);
    println!("Correct:         {}", outcome.score);
    println!("Wrong:           {}", outcome.wrong);
    println!("Unattempted:     {}", outcome.unattempted);
    println!("Score:           {:.2}%", outcome.percentage);
    println!("{}", quiz.feedback_message(outcome).await);
}

async fn run_history(services: &AppServices) {
    let history = services.history();
    let results = history.list().await;
    if results.is_empty() {
        println!("no quizzes taken yet");
        return;
    }
    for result in &results {
        println!(
            "{:<16} {:<24} {:>3}/{:<3} {:>6.1}%  {}",
            result.subject,
            result.topic,
            result.score,
            result.total,
            result.percentage(),
            result.date
        );
    }
    let summary = history.summary().await;
    println!(
        "{} attempts, best {:.1}%, average {:.1}%",
        summary.attempts, summary.best_percentage, summary.average_percentage
    );
}

async fn run_theme(services: &AppServices, arg: Option<&str>) -> Result<(), ArgsError> {
    let prefs = services.preferences();
    let theme = match arg {
        None => prefs.theme().await,
        Some("toggle") => prefs.toggle_theme().await,
        Some(raw) => {
            let theme: Theme = raw.parse().map_err(|_| ArgsError::InvalidTheme {
                raw: raw.to_owned(),
            })?;
            if !prefs.set_theme(theme).await {
                println!("(theme could not be saved)");
            }
            theme
        }
    };
    println!("{theme}");
    Ok(())
}

async fn run_name(services: &AppServices, name: &[String]) {
    let prefs = services.preferences();
    if !name.is_empty() && !prefs.set_user_name(&name.join(" ")).await {
        println!("(name could not be saved)");
    }
    println!("{}", prefs.display_name().await);
}

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
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = StudyConfig::from_env()?;
    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), config).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let outcome: Result<(), Box<dyn std::error::Error>> = async {
        match cmd {
            Command::Install => run_install(&services).await?,
            Command::Read => run_read(&services, parsed.track()?, &mut lines).await?,
            Command::Quiz => run_quiz(&services, parsed.track()?, &mut lines).await?,
            Command::History => run_history(&services).await,
            Command::Theme => {
                run_theme(&services, parsed.positional.first().map(String::as_str)).await?;
            }
            Command::Name => run_name(&services, &parsed.positional).await,
        }
        Ok(())
    }
    .await;

    settle(&services).await;
    outcome
}

/// Let background cache refreshes finish; the runtime aborts them on shutdown.
async fn settle(services: &AppServices) {
    services.offline().wait_until_idle().await;
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
