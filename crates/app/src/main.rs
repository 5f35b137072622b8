use std::fmt;

use study_core::model::{CategoryId, ParseIdError, TagError, TagName};
use study_services::{
    SessionConfig, SessionError, SessionFilter, SessionRunner, SessionStatus, StudyServices,
};
use study_storage::remote::{ApiConfig, ApiConfigError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    InvalidCategoryId(ParseIdError),
    InvalidTag(TagError),
    InvalidLimit { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCategoryId(err) => write!(f, "{err}"),
            ArgsError::InvalidTag(err) => write!(f, "{err}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
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
    eprintln!("  study overview                 [--api-url <url>] [--token <token>]");
    eprintln!("  study category <id>            [--api-url <url>] [--token <token>]");
    eprintln!("  study tag <name>               [--api-url <url>] [--token <token>]");
    eprintln!("  study due [--limit <n>]        [--api-url <url>] [--token <token>]");
    eprintln!();
    eprintln!("Session keys: f flip, y correct, n incorrect, r restart, q quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_API_URL, STUDY_API_TOKEN, STUDY_API_TIMEOUT_SECS");
    eprintln!("  STUDY_PAGE_SIZE, STUDY_DUE_LIMIT, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Overview,
    Study(SessionFilter),
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    command: Command,
    api_url: Option<String>,
    token: Option<String>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let command = args.next().ok_or(ArgsError::MissingCommand)?;

        let mut filter = match command.as_str() {
            "overview" => None,
            "category" => {
                let raw = args.next().ok_or(ArgsError::MissingArgument {
                    what: "category id",
                })?;
                let id = raw
                    .parse::<CategoryId>()
                    .map_err(ArgsError::InvalidCategoryId)?;
                Some(SessionFilter::Category(id))
            }
            "tag" => {
                let raw = args
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "tag name" })?;
                let tag = TagName::new(raw).map_err(ArgsError::InvalidTag)?;
                Some(SessionFilter::Tag(tag))
            }
            "due" => Some(SessionFilter::Due { limit: None }),
            _ => return Err(ArgsError::UnknownCommand(command)),
        };

        let mut api_url = None;
        let mut token = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api-url" => api_url = Some(require_value(&mut args, "--api-url")?),
                "--token" => token = Some(require_value(&mut args, "--token")?),
                "--limit" => {
                    let Some(SessionFilter::Due { limit }) = filter.as_mut() else {
                        return Err(ArgsError::UnknownArg(arg));
                    };
                    let value = require_value(&mut args, "--limit")?;
                    let parsed = value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidLimit { raw: value })?;
                    *limit = Some(parsed);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            command: filter.map_or(Command::Overview, Command::Study),
            api_url,
            token,
        })
    }

    /// Environment first, flags on top.
    fn api_config(&self) -> Result<ApiConfig, ApiConfigError> {
        let mut config = match (ApiConfig::from_env(), &self.api_url) {
            (Ok(mut config), Some(url)) => {
                config.base_url.clone_from(url);
                config
            }
            (Ok(config), None) => config,
            (Err(ApiConfigError::MissingBaseUrl), Some(url)) => {
                let config = ApiConfig::new(url.clone());
                match std::env::var("STUDY_API_TOKEN") {
                    Ok(token) if !token.trim().is_empty() => config.with_token(token),
                    _ => config,
                }
            }
            (Err(err), _) => return Err(err),
        };
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        Ok(config)
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn print_overview(services: &StudyServices) {
    let overview = services.overview();

    println!("Categories");
    for summary in overview.categories() {
        println!(
            "  [{}] {:<24} {}/{} studied",
            summary.category.id,
            summary.category.name,
            summary.studied_count,
            summary.card_count
        );
    }

    let tags = overview.tags();
    if !tags.is_empty() {
        println!("Tags");
        for tag in tags {
            println!(
                "  {:<28} {}/{} studied",
                tag.name, tag.studied_count, tag.card_count
            );
        }
    }

    let totals = overview.totals();
    println!(
        "Total: {}/{} cards studied",
        totals.studied_cards, totals.total_cards
    );
}

fn print_card(session: &SessionRunner) {
    match session.status() {
        SessionStatus::Empty => println!("No cards to study. [r] retry  [q] quit"),
        SessionStatus::Complete => {
            let report = session.report();
            println!(
                "Session complete: {} correct, {} incorrect. [r] restart  [q] quit",
                report.correct, report.incorrect
            );
        }
        SessionStatus::Reviewing => {
            let (position, total) = session.position().unwrap_or_default();
            let side = if session.is_flipped() { "back" } else { "front" };
            println!(
                "({position}/{total}) {side}: {}",
                session.visible_text().unwrap_or_default()
            );
        }
    }
}

/// Runs the key loop on stdin. Returns once the learner quits or stdin closes.
async fn study(
    services: &StudyServices,
    filter: SessionFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = services.start_session(filter).await?;
    print_card(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let outcome = match line.trim() {
            "" => continue,
            "q" => break,
            "f" => session.flip().map(|_| ()),
            "y" => session.answer(true).await.map(|_| ()),
            "n" => session.answer(false).await.map(|_| ()),
            "r" => session.restart().await.map(|_| ()),
            other => {
                println!("unknown key {other:?}; use f, y, n, r or q");
                continue;
            }
        };

        if let Err(err) = outcome {
            if err.is_authentication_required() {
                return Err(err.into());
            }
            report_error(&err);
        }
        print_card(&session);
    }

    if let Some(result) = session.settle().await {
        debug!(?result, "settled outstanding answer before exit");
    }
    Ok(())
}

fn report_error(err: &SessionError) {
    match err {
        SessionError::InvalidTransition { .. } | SessionError::AnswerPending { .. } => {
            println!("{err}");
        }
        _ => println!("error: {err}. Try again."),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    let args = Args::parse(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();

    let services = StudyServices::http(&args.api_config()?, SessionConfig::from_env())?;

    match args.command {
        Command::Overview => {
            services.refresh().await?;
            print_overview(&services);
        }
        Command::Study(filter) => {
            if let Err(err) = services.refresh().await {
                println!("could not load overview: {err}");
            }
            study(&services, filter).await?;
            print_overview(&services);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
