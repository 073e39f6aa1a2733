//! Command-line front end over the durable session store.

use crate::config::Config;
use crate::controller::{Controller, Notice, NoticeLevel};
use crate::host::{Clipboard, ClipboardError, DetachedHost};
use crate::options::RestoreTarget;
use crate::session::{Session, SessionId};
use crate::storage::SqliteStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Save, browse and back up browser tab sessions
#[derive(Parser, Debug)]
#[command(name = "tabhaiku", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List saved sessions, pinned first then newest first
    List {
        /// Only sessions whose name, URLs or titles contain this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Rename a session
    Rename { id: String, name: String },
    /// Pin or unpin a session
    Pin { id: String },
    /// Delete a session
    Delete { id: String },
    /// Write a backup file of all sessions
    Export {
        /// Directory to write into (default: current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Merge sessions from a backup file
    Import { file: PathBuf },
    /// Print a session's URLs, one per line
    Urls { id: String },
    /// Show or change restore options
    Options {
        /// Seconds to wait between restored tabs
        #[arg(long)]
        delay: Option<u32>,
        /// Where restored tabs open
        #[arg(long, value_enum)]
        target: Option<RestoreTarget>,
    },
}

/// Clipboard that prints to stdout.
struct StdoutClipboard;

#[async_trait]
impl Clipboard for StdoutClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{text}").map_err(|e| ClipboardError(e.to_string()))
    }
}

pub async fn run(cli: Cli) -> ExitCode {
    match run_inner(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run_inner(cli: Cli) -> Result<ExitCode> {
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let kv = Arc::new(SqliteStore::open(&config.storage_path())?);
    let mut controller =
        Controller::open(&config, kv, Arc::new(DetachedHost), Arc::new(StdoutClipboard)).await?;

    let notice = match cli.command {
        Commands::List { search } => {
            let sessions = controller.list(search.as_deref());
            if sessions.is_empty() {
                eprintln!("No saved sessions");
            }
            for session in sessions {
                println!("{}", format_session(session));
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Rename { id, name } => controller.rename(&SessionId::new(id), &name).await,
        Commands::Pin { id } => controller.toggle_pin(&SessionId::new(id)).await,
        Commands::Delete { id } => controller.delete(&SessionId::new(id)).await,
        Commands::Export { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            controller.export(&dir, Local::now().date_naive()).await
        }
        Commands::Import { file } => controller.import(&file).await,
        Commands::Urls { id } => controller.copy_urls(&SessionId::new(id)).await,
        Commands::Options { delay, target } => {
            let mut last = None;
            if let Some(delay) = delay {
                last = Some(controller.set_restore_delay(delay).await);
            }
            if let Some(target) = target
                && last.as_ref().is_none_or(|n| !n.is_error())
            {
                last = Some(controller.set_restore_target(target).await);
            }
            match last {
                Some(notice) => notice,
                None => {
                    let options = controller.options();
                    println!("restoreDelay = {}", options.delay_secs);
                    println!("restoreTarget = {}", options.target);
                    return Ok(ExitCode::SUCCESS);
                }
            }
        }
    };

    Ok(report(&notice))
}

/// Print a notice to stderr, mapping errors to a failing exit code.
fn report(notice: &Notice) -> ExitCode {
    match notice.level {
        NoticeLevel::Info => {
            eprintln!("{notice}");
            ExitCode::SUCCESS
        }
        NoticeLevel::Warning => {
            eprintln!("Warning: {notice}");
            ExitCode::SUCCESS
        }
        NoticeLevel::Error => {
            eprintln!("Error: {notice}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = match EnvFilter::try_from_env("TABHAIKU_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
    {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("tabhaiku=debug"),
        Err(_) => return,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn format_session(session: &Session) -> String {
    let created = session.created_at().map_or_else(
        || "unknown date".to_string(),
        |at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    );
    let groups = match session.group_count() {
        0 => String::new(),
        1 => ", 1 group".to_string(),
        n => format!(", {n} groups"),
    };
    format!(
        "{} {}  {}  ({} tabs{groups}, {created})",
        if session.is_pinned { "*" } else { " " },
        session.id,
        session.name,
        session.tabs.len(),
    )
}
