//! CLI module for grace
//!
//! This module provides the command-line interface using clap derive macros.

pub mod args;
pub mod commands;
pub mod exit_code;

use clap::{Parser, Subcommand};

use args::{AddArgs, LsArgs, RmArgs, RunArgs, StartArgs, StopArgs, SwitchArgs, WaitArgs};

/// Graceful port forwarder
#[derive(Parser, Debug)]
#[command(name = "grace")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the daemon's socket, pid, log and startup files
    #[arg(short, long, global = true, env = "GRACE_DIR", default_value = crate::config::DEFAULT_DIR)]
    pub dir: String,

    /// Enable verbose output
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the daemon forwarding from one endpoint to another
    Start(StartArgs),

    /// Stop the running daemon
    Stop(StopArgs),

    /// List pipes and their destinations
    #[command(alias = "list")]
    Ls(LsArgs),

    /// Send new connections on a pipe to a different destination
    Switch(SwitchArgs),

    /// Wait until a pipe's previous destinations have drained
    Wait(WaitArgs),

    /// Add a pipe to the running daemon
    Add(AddArgs),

    /// Remove a pipe from the running daemon
    Rm(RmArgs),

    /// Run the daemon in this process
    #[command(hide = true)]
    Run(RunArgs),
}
