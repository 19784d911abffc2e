use std::fmt;
use std::path::PathBuf;

use practice_core::model::{Exercise, ExerciseId, PackageId, SessionSettings, TimerSettings};
use services::{AppServices, Clock, HttpProgressReporter, run_presenter};
use storage::repository::ProgressRepository;

mod terminal;

use terminal::{TerminalPresenter, print_results};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingExercise,
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    ConflictingLives,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingExercise => write!(f, "an exercise is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::ConflictingLives => write!(f, "--lives and --no-lives are exclusive"),
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

fn require_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play <exercise.json> [options]");
    eprintln!("  cargo run -p app -- history <exercise-id> [--db <sqlite_url>] [--limit <n>]");
    eprintln!();
    eprintln!("Options for play:");
    eprintln!("  --db <sqlite_url>      completion history (default sqlite:practice.sqlite3)");
    eprintln!("  --settings <file>      session settings as JSON");
    eprintln!("  --lives <n>            start with n lives");
    eprintln!("  --no-lives             disable lives");
    eprintln!("  --time-limit <secs>    end the session after secs");
    eprintln!("  --max-hints <n>        hint allowance");
    eprintln!("  --max-skips <n>        skip allowance");
    eprintln!("  --no-skip              disable skipping");
    eprintln!("  --shuffle              shuffle item order");
    eprintln!("  --package-id <id>      report under this package");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PRACTICE_DB_URL, PRACTICE_API_BASE_URL, PRACTICE_API_TOKEN, PRACTICE_API_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

/// Flags that adjust the session settings.
#[derive(Debug, Default, PartialEq, Eq)]
struct SettingsOverrides {
    file: Option<PathBuf>,
    lives: Option<u32>,
    no_lives: bool,
    time_limit_secs: Option<u64>,
    max_hints: Option<u32>,
    max_skips: Option<u32>,
    no_skip: bool,
    shuffle: bool,
}

impl SettingsOverrides {
    fn apply(&self, base: SessionSettings) -> Result<SessionSettings, Box<dyn std::error::Error>> {
        let mut settings = match &self.file {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => base,
        };
        if self.no_lives {
            settings = settings.without_lives();
        }
        if let Some(lives) = self.lives {
            settings = settings.with_lives(lives)?;
        }
        if let Some(secs) = self.time_limit_secs {
            let tick_ms = settings
                .timer()
                .map_or(TimerSettings::DEFAULT_TICK_MS, |t| {
                    u64::try_from(t.tick_interval().as_millis()).unwrap_or(TimerSettings::DEFAULT_TICK_MS)
                });
            settings = settings.with_timer(TimerSettings::new(tick_ms, Some(secs))?);
        }
        if self.max_hints.is_some() {
            settings = settings.with_max_hints(self.max_hints);
        }
        if self.max_skips.is_some() {
            settings = settings.with_max_skips(self.max_skips);
        }
        if self.no_skip {
            settings = settings.with_skip_enabled(false);
        }
        if self.shuffle {
            settings = settings.with_shuffle_items(true);
        }
        Ok(settings)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct PlayArgs {
    db_url: String,
    exercise_path: PathBuf,
    package_id: Option<PackageId>,
    overrides: SettingsOverrides,
}

#[derive(Debug, PartialEq, Eq)]
struct HistoryArgs {
    db_url: String,
    exercise_id: ExerciseId,
    limit: u32,
}

fn default_db_url() -> String {
    std::env::var("PRACTICE_DB_URL")
        .ok()
        .map_or_else(|| "sqlite://practice.sqlite3".into(), normalize_sqlite_url)
}

fn parse_db(args: &mut impl Iterator<Item = String>) -> Result<String, ArgsError> {
    let value = require_value(args, "--db")?;
    if value.trim().is_empty() {
        return Err(ArgsError::InvalidDbUrl { raw: value });
    }
    Ok(normalize_sqlite_url(value))
}

impl PlayArgs {
    fn parse(args: &mut impl Iterator<Item = String>, db_url: String) -> Result<Self, ArgsError> {
        let mut db_url = db_url;
        let mut exercise_path = None;
        let mut package_id = None;
        let mut overrides = SettingsOverrides::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => db_url = parse_db(args)?,
                "--settings" => overrides.file = Some(require_value(args, "--settings")?.into()),
                "--lives" => overrides.lives = Some(require_number(args, "--lives")?),
                "--no-lives" => overrides.no_lives = true,
                "--time-limit" => {
                    overrides.time_limit_secs = Some(require_number(args, "--time-limit")?);
                }
                "--max-hints" => overrides.max_hints = Some(require_number(args, "--max-hints")?),
                "--max-skips" => overrides.max_skips = Some(require_number(args, "--max-skips")?),
                "--no-skip" => overrides.no_skip = true,
                "--shuffle" => overrides.shuffle = true,
                "--package-id" => {
                    let raw = require_value(args, "--package-id")?;
                    let id = PackageId::new(raw.clone()).map_err(|_| ArgsError::InvalidId {
                        flag: "--package-id",
                        raw,
                    })?;
                    package_id = Some(id);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if exercise_path.is_none() => exercise_path = Some(PathBuf::from(arg)),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if overrides.no_lives && overrides.lives.is_some() {
            return Err(ArgsError::ConflictingLives);
        }

        Ok(Self {
            db_url,
            exercise_path: exercise_path.ok_or(ArgsError::MissingExercise)?,
            package_id,
            overrides,
        })
    }
}

impl HistoryArgs {
    fn parse(args: &mut impl Iterator<Item = String>, db_url: String) -> Result<Self, ArgsError> {
        let mut db_url = db_url;
        let mut exercise_id = None;
        let mut limit = 10;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => db_url = parse_db(args)?,
                "--limit" => limit = require_number(args, "--limit")?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if exercise_id.is_none() => {
                    let id = ExerciseId::new(arg.clone()).map_err(|_| ArgsError::InvalidId {
                        flag: "exercise-id",
                        raw: arg,
                    })?;
                    exercise_id = Some(id);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            exercise_id: exercise_id.ok_or(ArgsError::MissingExercise)?,
            limit,
        })
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

async fn play(args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(&args.exercise_path)?;
    let mut exercise = Exercise::from_json(&raw)?;
    if let Some(package_id) = args.package_id {
        exercise.package_id = package_id;
    }
    let settings = args.overrides.apply(SessionSettings::default())?;

    prepare_sqlite_file(&args.db_url)?;
    let app = AppServices::new_sqlite(
        &args.db_url,
        Clock::default(),
        settings,
        HttpProgressReporter::from_env(),
    )
    .await?;

    let sessions = app.sessions();
    println!("{}", exercise.title);
    let live = sessions.start_live(&exercise)?;
    let mut presenter = TerminalPresenter::stdin();
    let results = run_presenter(&live, &exercise, &mut presenter).await?;
    live.close().await;

    if let Some(results) = results {
        print_results(&results);
    }
    if let Some(best) = app.history().best_score(&exercise.id).await? {
        println!("best:     {best}%");
    }
    Ok(())
}

async fn history(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    prepare_sqlite_file(&args.db_url)?;
    let storage = storage::repository::Storage::sqlite(&args.db_url).await?;
    let records = storage
        .progress
        .list_completions(&args.exercise_id, args.limit)
        .await?;

    if records.is_empty() {
        println!("no completions for {}", args.exercise_id);
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {:>3}%  {:>5}s  {:<9} {}",
            record.result.completed_at_rfc3339(),
            record.result.score_percentage,
            record.result.time_spent_seconds,
            record.state,
            record.end_reason
        );
    }
    if let Some(best) = storage.progress.best_score(&args.exercise_id).await? {
        println!("best: {best}%");
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("practice_core=info".parse()?)
                .add_directive("services=info".parse()?),
        )
        .init();

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

    let report = |e: ArgsError| {
        eprintln!("{e}");
        print_usage();
        e
    };
    match cmd {
        Command::Play => play(PlayArgs::parse(&mut argv, default_db_url()).map_err(report)?).await,
        Command::History => {
            history(HistoryArgs::parse(&mut argv, default_db_url()).map_err(report)?).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| (*s).to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn play_collects_overrides() {
        let parsed = PlayArgs::parse(
            &mut args(&[
                "ex.json",
                "--lives",
                "5",
                "--time-limit",
                "90",
                "--shuffle",
                "--package-id",
                "pkg-7",
            ]),
            "sqlite::memory:".into(),
        )
        .unwrap();
        assert_eq!(parsed.exercise_path, PathBuf::from("ex.json"));
        assert_eq!(parsed.package_id, Some(PackageId::new("pkg-7").unwrap()));

        let settings = parsed.overrides.apply(SessionSettings::default()).unwrap();
        assert_eq!(settings.lives(), Some(5));
        assert!(settings.shuffle_items());
        let timer = settings.timer().unwrap();
        assert_eq!(timer.time_limit(), Some(std::time::Duration::from_secs(90)));
    }

    #[test]
    fn play_requires_an_exercise() {
        let err = PlayArgs::parse(&mut args(&["--shuffle"]), "sqlite::memory:".into()).unwrap_err();
        assert!(matches!(err, ArgsError::MissingExercise));
    }

    #[test]
    fn lives_flags_conflict() {
        let err = PlayArgs::parse(
            &mut args(&["ex.json", "--no-lives", "--lives", "2"]),
            "sqlite::memory:".into(),
        )
        .unwrap_err();
        assert!(matches!(err, ArgsError::ConflictingLives));
    }

    #[test]
    fn bad_numbers_are_reported_with_their_flag() {
        let err = PlayArgs::parse(
            &mut args(&["ex.json", "--time-limit", "soon"]),
            "sqlite::memory:".into(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid --time-limit value: soon");
    }

    #[test]
    fn zero_lives_fail_when_applied() {
        let overrides = SettingsOverrides {
            lives: Some(0),
            ..SettingsOverrides::default()
        };
        assert!(overrides.apply(SessionSettings::default()).is_err());
    }

    #[test]
    fn history_defaults_limit() {
        let parsed = HistoryArgs::parse(&mut args(&["ex-1"]), "sqlite::memory:".into()).unwrap();
        assert_eq!(parsed.limit, 10);
        assert_eq!(parsed.exercise_id.as_str(), "ex-1");
    }

    #[test]
    fn normalizes_relative_sqlite_paths() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert!(normalize_sqlite_url("sqlite:data/p.db".into()).ends_with("/data/p.db"));
    }
}
