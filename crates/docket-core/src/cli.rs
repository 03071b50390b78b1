use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::navigation::NavigationState;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "docket",
    version,
    about = "Deadline list with a month calendar overlay",
    disable_help_subcommand = true,
    after_help = "\
INDEXES:
  Commands that take INDEX address a task by its position in the store
  (the `#` column of `docket list`), not by its row in the sorted list.

DATES:
  YYYY-MM-DD, today, tomorrow, yesterday, a weekday name, or +Nd / +Nw / +Nm."
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config key (repeatable)
    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    /// Config file to read instead of the default location
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding tasks.json and view.json
    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task
    Add {
        name: String,
        /// Deadline date
        date: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename a task and optionally recolor it
    Edit {
        index: usize,
        name: String,
        /// New color; omit to keep the current one
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a task
    Delete { index: usize },
    /// Flip a task between open and completed
    #[command(alias = "done")]
    Toggle { index: usize },
    /// Show tasks sorted by deadline
    List,
    /// Show the calendar for the viewed month
    Calendar,
    /// Move the calendar forward
    Next {
        #[arg(default_value_t = 1)]
        months: i32,
    },
    /// Move the calendar back
    Prev {
        #[arg(default_value_t = 1)]
        months: i32,
    },
    /// Show a specific month
    Goto {
        #[arg(value_name = "YYYY-MM")]
        month: NavigationState,
    },
    /// Return the calendar to the current month
    Today,
    /// Print all tasks as a legacy JSON array
    Export,
    /// Append tasks from a legacy JSON array file
    Import { file: PathBuf },
    /// Print the effective configuration
    ShowConfig,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
