//! # CLI Interface
//!
//! Argument structure for `nova-submit`, via `clap` derive. Five
//! subcommands: `send`, `mint`, `classify`, `backoff`, and `version`.
//! Submission knobs fall back to `NOVA_*` environment variables.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use nova_client::config;

use crate::logging::LogFormat;

/// Submit token operations to a simulated NOVA devnet.
///
/// Every submission runs through the real retry/confirmation engine; only
/// the ledger and the wallet are simulated. Fault-injection flags let you
/// watch windows expire, subscriptions fail, and users say no.
#[derive(Parser, Debug)]
#[command(
    name = "nova-submit",
    about = "NOVA transaction submission client",
    version,
    propagate_version = true
)]
pub struct NovaSubmitCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "NOVA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// JSON file with submission options (camelCase keys, all optional).
    #[arg(long, global = true, env = "NOVA_SUBMIT_OPTIONS")]
    pub options: Option<PathBuf>,

    /// Print Prometheus metrics after the command finishes.
    #[arg(long, global = true)]
    pub print_metrics: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transfer tokens to a recipient.
    Send(SendArgs),
    /// Mint tokens into a recipient's account.
    Mint(MintArgs),
    /// Classify a raw error message and print the result.
    Classify(ClassifyArgs),
    /// Print the backoff schedule.
    Backoff(BackoffArgs),
    /// Print version information and exit.
    Version,
}

/// Options shared by `send` and `mint`.
#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Attempts per submission, each with a fresh validity window.
    #[arg(long, env = "NOVA_RPC_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Per-attempt confirmation deadline in milliseconds.
    #[arg(long, env = "NOVA_RPC_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Durability level to confirm at: processed, confirmed, or finalized.
    #[arg(long, env = "NOVA_RPC_COMMITMENT")]
    pub commitment: Option<String>,

    /// Skip the preflight simulation.
    #[arg(long)]
    pub skip_preflight: bool,

    /// Hex-encoded 32-byte wallet seed. A random key is used when omitted.
    #[arg(long, env = "NOVA_WALLET_SEED")]
    pub wallet_seed: Option<String>,

    /// Drop the first N transactions so their windows expire.
    #[arg(long, default_value_t = 0)]
    pub expired_windows: u32,

    /// Fail the first confirmation subscription with a window-expiry fault.
    #[arg(long)]
    pub drop_subscription: bool,

    /// Have the wallet reject the signing request.
    #[arg(long)]
    pub reject: bool,
}

/// Arguments for the `send` subcommand.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Base58 recipient address. Defaults to a fixed devnet address.
    #[arg(long)]
    pub recipient: Option<String>,

    /// Amount in base units.
    #[arg(long, default_value_t = 1_000)]
    pub amount: u64,

    /// Base58 mint address of the token being sent.
    #[arg(long)]
    pub mint: Option<String>,

    #[command(flatten)]
    pub submit: SubmitArgs,
}

/// Arguments for the `mint` subcommand.
#[derive(Args, Debug)]
pub struct MintArgs {
    /// Base58 recipient address. Defaults to the wallet itself.
    #[arg(long)]
    pub recipient: Option<String>,

    /// Amount in base units.
    #[arg(long, default_value_t = 1_000_000)]
    pub amount: u64,

    #[command(flatten)]
    pub submit: SubmitArgs,
}

/// Arguments for the `classify` subcommand.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Raw error text, as a wallet or node would report it.
    pub message: String,
}

/// Arguments for the `backoff` subcommand.
#[derive(Args, Debug)]
pub struct BackoffArgs {
    /// Number of attempts to show.
    #[arg(long, env = "NOVA_RPC_MAX_RETRIES", default_value_t = config::DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[arg(long, default_value_t = config::BACKOFF_BASE_MS)]
    pub base_ms: u64,

    /// Growth factor between retries.
    #[arg(long, default_value_t = config::BACKOFF_MULTIPLIER)]
    pub multiplier: f64,

    /// Ceiling on any single delay, in milliseconds.
    #[arg(long, default_value_t = config::BACKOFF_CAP_MS)]
    pub cap_ms: u64,
}
