use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, LevelFilter};

use clockwise_timer::clockwise::ClockwiseClient;
use clockwise_timer::config::Config;
use clockwise_timer::console::{ConsoleMarkdownList, ConsolePresenter};
use clockwise_timer::datetime::parse_server_timestamp;
use clockwise_timer::store::{FileStore, SessionStore};
use clockwise_timer::time_entry::{EntryId, TaskId};
use clockwise_timer::timer::TimerState;
use clockwise_timer::tracker::Tracker;

type ClockwiseTracker = Tracker<ClockwiseClient, FileStore>;

/// ClockWiseのtime entryを計測するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- start "Write report"
/// $ cargo run -- pause
/// $ cargo run -- stop
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(short, long, help = "Print debug logs")]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Show the timer and the latest sessions
    Status,
    /// Start a timer, creating the task when only a title is given
    Start {
        title: Option<String>,
        #[clap(long = "task-id")]
        task_id: Option<TaskId>,
    },
    /// Pause the running timer
    Pause,
    /// Resume the paused timer
    Resume,
    /// Stop the timer and add it to the latest sessions
    Stop,
    /// List the latest sessions
    List,
    /// Start tracking the task of a listed session
    Track { entry_id: EntryId },
    /// Delete a time entry
    Delete { entry_id: EntryId },
    /// Correct the start and end time of a time entry
    Edit {
        entry_id: EntryId,
        #[clap(long, parse(try_from_str = parse_server_timestamp))]
        start: DateTime<Utc>,
        #[clap(long, parse(try_from_str = parse_server_timestamp))]
        end: DateTime<Utc>,
    },
    /// Suggest tasks without a time entry
    Suggest { query: String },
    /// Keep printing the clock until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = setup_logger(args.verbose) {
        eprintln!("{:?}", err);
        std::process::exit(1);
    }

    if let Err(err) = run(args.subcommand).await {
        error!("{:?}", err);
        std::process::exit(1);
    }
}

/// ログの出力先を設定する。
fn setup_logger(verbose: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .level_for("reqwest", LevelFilter::Warn)
        .chain(io::stderr())
        .apply()
        .context("Failed to set up logger")?;

    Ok(())
}

async fn run(subcommand: SubCommands) -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let store = SessionStore::new(FileStore::new(&config.data_dir));
    let mut tracker = Tracker::new(ClockwiseClient::new(&config), store, config.user_id);
    tracker.page_load().await?;

    let mut stdout = io::stdout();
    match subcommand {
        SubCommands::Status => {
            show_timer(&tracker, &mut stdout)?;
            ConsoleMarkdownList::new(&mut stdout).show_rows(tracker.list().rows())?;
        }
        SubCommands::Start { title, task_id } => {
            tracker.type_text(title.as_deref().unwrap_or_default());
            if let Some(task_id) = task_id {
                tracker.start_with(title.as_deref().unwrap_or_default(), Some(task_id)).await?;
            } else {
                tracker.start().await?;
            }
            show_timer(&tracker, &mut stdout)?;
        }
        SubCommands::Pause => {
            tracker.pause().await?;
            show_timer(&tracker, &mut stdout)?;
        }
        SubCommands::Resume => {
            tracker.resume().await?;
            show_timer(&tracker, &mut stdout)?;
        }
        SubCommands::Stop => {
            if let Some(row) = tracker.stop().await? {
                ConsoleMarkdownList::new(&mut stdout).show_rows(&[row])?;
            }
        }
        SubCommands::List => {
            ConsoleMarkdownList::new(&mut stdout).show_rows(tracker.list().rows())?;
        }
        SubCommands::Track { entry_id } => {
            tracker.resume_from_list(entry_id).await?;
            show_timer(&tracker, &mut stdout)?;
        }
        SubCommands::Delete { entry_id } => {
            tracker.delete(entry_id).await?;
            ConsoleMarkdownList::new(&mut stdout).show_rows(tracker.list().rows())?;
        }
        SubCommands::Edit {
            entry_id,
            start,
            end,
        } => {
            tracker.edit(entry_id, start, end).await?;
            ConsoleMarkdownList::new(&mut stdout).show_rows(tracker.list().rows())?;
        }
        SubCommands::Suggest { query } => {
            tracker.type_text(&query);
            ConsoleMarkdownList::new(&mut stdout).show_suggestions(&tracker.suggestions())?;
        }
        SubCommands::Watch => watch(&tracker, &mut stdout).await?,
    }

    Ok(())
}

fn show_timer<W: Write>(tracker: &ClockwiseTracker, writer: &mut W) -> Result<()> {
    ConsoleMarkdownList::new(writer).show_timer(
        tracker.state(),
        tracker.controls(),
        &tracker.clock_text(),
    )
}

/// 計測中の経過時間を、Ctrl-Cが押されるまで1秒ごとに表示する。
async fn watch<W: Write>(tracker: &ClockwiseTracker, writer: &mut W) -> Result<()> {
    if !matches!(tracker.state(), TimerState::Running { .. }) {
        return show_timer(tracker, writer);
    }

    let mut clock = tracker.ticker().subscribe();
    write!(writer, "{}", tracker.clock_text()).context("Failed to write clock")?;
    writer.flush().context("Failed to flush clock")?;
    loop {
        tokio::select! {
            changed = clock.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = clock.borrow().clone();
                write!(writer, "\r{}", text).context("Failed to write clock")?;
                writer.flush().context("Failed to flush clock")?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    writeln!(writer).context("Failed to write clock")?;

    Ok(())
}
