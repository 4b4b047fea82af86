//! # CLI Interface
//!
//! Defines the command-line argument structure for `upacp-node` using
//! `clap` derive. Supports four subcommands: `serve`, `settle`, `sign`,
//! and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// UnionPay ACP merchant node.
///
/// Receives and verifies the gateway's asynchronous notifications, and
/// downloads and parses daily settlement files.
#[derive(Parser, Debug)]
#[command(
    name = "upacp-node",
    about = "UnionPay ACP merchant node",
    version,
    propagate_version = true
)]
pub struct UpacpNodeCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "UPACP_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the notify endpoint, `/health` and `/metrics`.
    Serve(ServeArgs),
    /// Download and parse the settlement files for one day.
    Settle(SettleArgs),
    /// Sign `key=value` pairs and print the form body.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Where the config file is.
#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Path to the node configuration file (TOML).
    #[arg(long, short = 'c', env = "UPACP_CONFIG", default_value = "upacp.toml")]
    pub config: PathBuf,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Listen port. Overrides `server.port`.
    #[arg(long, short = 'p', env = "UPACP_PORT")]
    pub port: Option<u16>,

    /// Path of the notify endpoint. Overrides `server.notify_path`.
    #[arg(long, env = "UPACP_NOTIFY_PATH")]
    pub notify_path: Option<String>,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
}

/// Arguments for the `settle` subcommand.
#[derive(Parser, Debug)]
pub struct SettleArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Settlement date as `MMDD`.
    #[arg(long, short = 'd')]
    pub date: String,

    /// Parent of the extraction directory. Overrides `settlement.work_dir`.
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Print the canonical string that was signed instead of the form body.
    #[arg(long)]
    pub canonical: bool,

    /// Fields as `key=value`.
    #[arg(required = true)]
    pub fields: Vec<String>,
}
