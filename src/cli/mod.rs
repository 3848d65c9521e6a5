//! CLI entry point for taskstore.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect and update the shared task store
#[derive(Parser, Debug)]
#[command(name = "taskstore", version, about = "Shared session/task store CLI")]
pub struct Cli {
    /// Store file to use instead of the configured one
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List sessions
    List(ListArgs),
    /// Print one session as JSON
    Show(ShowArgs),
    /// Create a session under a fresh id
    New(NewArgs),
    /// Update fields of an existing session
    Set(SetArgs),
    /// Inspect or clear the store lock
    Lock(LockArgs),
}

/// Arguments for `taskstore list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Print the whole document as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `taskstore show`.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Session id
    pub id: String,
}

/// Arguments for `taskstore new`.
#[derive(Parser, Debug)]
pub struct NewArgs {
    /// Agent name
    #[arg(short, long)]
    pub agent: String,

    /// Extra field as key=value (value parsed as JSON, else kept as a string)
    #[arg(short, long = "field")]
    pub fields: Vec<String>,
}

/// Arguments for `taskstore set`.
#[derive(Parser, Debug)]
pub struct SetArgs {
    /// Session id
    pub id: String,

    /// Fields as key=value (value parsed as JSON, else kept as a string)
    #[arg(required = true)]
    pub fields: Vec<String>,
}

/// Arguments for the `lock` subcommand group.
#[derive(Parser, Debug)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommands,
}

/// Lock subcommands.
#[derive(Subcommand, Debug)]
pub enum LockCommands {
    /// Show the current lock holder, if any
    Status,
    /// Remove the lock file
    Clear {
        /// Remove even if the lock is fresh or its holder is alive
        #[arg(long)]
        force: bool,
    },
}
