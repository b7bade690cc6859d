//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gp - workout plan assistant client
#[derive(Parser)]
#[command(
    name = "gp",
    about = "Chat with the workout assistant and build, adjust and export training plans",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat with the assistant
    Chat {
        /// Start a fresh session instead of resuming the stored one
        #[arg(long)]
        new: bool,
    },

    /// Interactive plan builder
    Plan {
        /// Resume from an exported plan file
        #[arg(short, long, value_name = "FILE")]
        import: Option<PathBuf>,
    },

    /// Export a plan file as an iCalendar file (offline)
    Calendar {
        /// Exported plan file
        #[arg(value_name = "PLAN")]
        plan: PathBuf,

        /// Output file (default: <name>_workout_calendar.ics)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Stored chat history on the service
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Local chat session identity
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Reference documents on the service
    Docs {
        #[command(subcommand)]
        command: DocsCommand,
    },
}

/// History subcommands
#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Print the stored transcript
    Show {
        /// Session id (default: the stored one)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Delete the stored transcript
    Clear {
        /// Session id (default: the stored one)
        #[arg(short, long)]
        session: Option<String>,
    },
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Print the stored session id
    Show,

    /// Forget the stored session id
    Reset,
}

/// Document subcommands
#[derive(Debug, Subcommand)]
pub enum DocsCommand {
    /// List uploaded documents
    List,

    /// Upload a PDF
    Upload {
        /// PDF file
        file: PathBuf,
    },

    /// Delete an uploaded document
    Delete {
        /// Document file name
        name: String,
    },
}
