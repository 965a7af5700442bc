//! Argument structures for CLI commands

use clap::Args;

/// Arguments for the `start` command
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Endpoint to listen on (e.g. tcp:8080, unix:/run/front.sock)
    pub src: String,

    /// Endpoint to forward to (e.g. tcp:127.0.0.1:9001)
    pub dst: String,

    /// Seconds to wait for the daemon to become ready
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

/// Arguments for the `stop` command
#[derive(Args, Debug, Clone)]
pub struct StopArgs {
    /// Seconds to wait for the daemon process to exit
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,
}

/// Arguments for the `ls` command
#[derive(Args, Debug, Clone)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

/// Arguments for the `switch` command
#[derive(Args, Debug, Clone)]
pub struct SwitchArgs {
    /// Source endpoint of the pipe
    pub src: String,

    /// New destination for incoming connections
    pub dst: String,
}

/// Arguments for the `wait` command
#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Source endpoint of the pipe
    pub src: String,

    /// Give up after this long (e.g. 30s, 5m); waits forever by default
    #[arg(short, long)]
    pub timeout: Option<String>,
}

/// Arguments for the `add` command
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Endpoint to listen on
    pub src: String,

    /// Endpoint to forward to
    pub dst: String,
}

/// Arguments for the `rm` command
#[derive(Args, Debug, Clone)]
pub struct RmArgs {
    /// Source endpoint of the pipe to remove
    pub src: String,
}

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Log to stderr instead of the directory's log file
    #[arg(long)]
    pub foreground: bool,
}
