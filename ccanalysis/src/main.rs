//! ccanalysis - record coding assistant sessions into a local SQLite database
//!
//! Administrative commands (`init`, `status`, `sessions`) print human-readable
//! text and fail loudly. Tracking commands (`track-*`) are called from the
//! assistant's hooks with JSON on stdin; they always print the response the
//! hook expects and exit 0, whatever happens internally.
//!
//! File locations:
//! - Database: ~/.ccanalysis/data.sqlite
//! - Config: ~/.ccanalysis/config.toml
//! - Logs: ~/.ccanalysis/logs/

use anyhow::{Context, Result};
use ccanalysis_core::format::{format_duration_ms, format_relative_time};
use ccanalysis_core::{logging, Config, Database, Hook};
use chrono::Local;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::io::Read;

#[derive(Parser)]
#[command(name = "ccanalysis")]
#[command(about = "CCAnalysis CLI - coding assistant session tracker")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the database and run migrations
    Init,

    /// Show database statistics
    Status,

    /// List recent sessions
    Sessions {
        /// Number of sessions to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Track tool call start (reads JSON from stdin)
    TrackToolStart,

    /// Track tool call end (reads JSON from stdin)
    TrackToolEnd,

    /// Track user prompt (reads JSON from stdin)
    TrackPrompt,

    /// Track session end (reads JSON from stdin)
    TrackSessionEnd,
}

fn main() -> Result<()> {
    let Some(command) = parse_command()? else {
        return Ok(());
    };

    match command {
        Command::Init => admin(cmd_init),
        Command::Status => admin(cmd_status),
        Command::Sessions { limit } => admin(|config| cmd_sessions(config, limit)),
        Command::TrackToolStart => track(Hook::ToolStart),
        Command::TrackToolEnd => track(Hook::ToolEnd),
        Command::TrackPrompt => track(Hook::Prompt),
        Command::TrackSessionEnd => track(Hook::SessionEnd),
    }
}

/// Parse arguments; unknown commands and a missing command print usage.
fn parse_command() -> Result<Option<Command>> {
    match Args::try_parse() {
        Ok(Args {
            command: Some(command),
        }) => Ok(Some(command)),
        Ok(Args { command: None }) => {
            print_usage()?;
            Ok(None)
        }
        Err(e) if matches!(e.kind(), ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument) => {
            print_usage()?;
            Ok(None)
        }
        Err(e) => e.exit(),
    }
}

fn print_usage() -> Result<()> {
    Args::command()
        .print_help()
        .context("failed to print usage")?;
    println!();
    Ok(())
}

// ============================================
// Tracking commands
// ============================================

/// Handle a hook invocation. Always prints the hook's response and succeeds.
fn track(hook: Hook) -> Result<()> {
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    // Tracking must not fail because logs cannot be written
    let _log_guard = logging::init(&config.logging, &config.log_dir()).ok();

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Invalid configuration, using defaults");
    }

    let outcome = read_stdin()
        .and_then(|input| hook.parse(&input))
        .and_then(|payload| {
            let db = Database::open_configured(&config)?;
            db.migrate()?;
            payload.apply(&db)
        });

    println!("{}", hook.respond(outcome));
    Ok(())
}

fn read_stdin() -> ccanalysis_core::Result<String> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

// ============================================
// Administrative commands
// ============================================

/// Run an administrative command with configuration and logging in place.
///
/// Errors propagate and end the process with a non-zero exit code.
fn admin<F>(run: F) -> Result<()>
where
    F: FnOnce(&Config) -> Result<()>,
{
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&config.logging, &config.log_dir())
        .context("failed to initialize logging")?;

    let result = run(&config);
    if let Err(ref e) = result {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
    }
    result
}

fn open_database(config: &Config) -> Result<Database> {
    let db_path = config.database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open_configured(config).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(db)
}

fn cmd_init(config: &Config) -> Result<()> {
    println!("Initializing CCAnalysis database...");

    let db = open_database(config)?;

    println!("Database initialized successfully!");
    println!("Database location: {}", config.database_path().display());
    println!("Schema version: {}", db.schema_version()?);
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let counts = db.table_counts().context("failed to count rows")?;

    println!("CCAnalysis Database Status");
    println!("{}", "=".repeat(50));
    println!("Database location: {}", config.database_path().display());
    println!("Schema version: {}", db.schema_version()?);

    println!("\nTable Statistics:");
    for (label, count) in counts.rows() {
        println!("  {}: {}", label, count);
    }
    Ok(())
}

fn cmd_sessions(config: &Config, limit: usize) -> Result<()> {
    let db = open_database(config)?;
    let sessions = db
        .recent_sessions(limit)
        .context("failed to list sessions")?;

    println!("Recent Sessions (last {})", limit);
    println!("{}", "=".repeat(50));

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    for session in &sessions {
        println!("\nSession ID: {}", session.id);
        println!("  Project: {}", session.project_path);
        if let Some(url) = &session.git_repo_url {
            println!("  Git: {}", url);
        }
        println!(
            "  Started: {} ({})",
            session
                .started_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            format_relative_time(session.started_at)
        );
        println!("  Status: {}", session.status);
        println!("  Total Tokens: {}", session.total_tokens);
        if let Some(ms) = session.duration_ms {
            println!("  Duration: {}", format_duration_ms(ms));
        }
    }
    Ok(())
}
