//! # CLI Interface
//!
//! Defines the command-line argument structure for `aegis-node` using
//! `clap` derive. Every subcommand that touches a token takes the same
//! `--config` / `--data-dir` pair, with environment fallbacks.

use aegis_protocol::Address;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Aegis token host.
///
/// Hosts one token against an on-disk database. Calls arrive as JSON
/// batches; every call is applied atomically and journaled.
#[derive(Parser, Debug)]
#[command(
    name = "aegis-node",
    about = "Aegis token host",
    version,
    propagate_version = true
)]
pub struct AegisNodeCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "aegis_node=info,aegis_contracts=info")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and initialize the token with `--owner` in charge.
    Init(InitArgs),
    /// Apply a JSON batch of calls.
    Apply(ApplyArgs),
    /// Switch the token to role-based authorization.
    Upgrade(UpgradeArgs),
    /// Print the token state (or one account) as JSON.
    Inspect(InspectArgs),
    /// Generate a fresh secp256k1 keypair.
    Keygen(KeygenArgs),
    /// Sign a permit and print it as a ready-to-apply batch entry.
    SignPermit(SignPermitArgs),
    /// Print version information and exit.
    Version,
}

/// Where the token lives.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to the token configuration file (JSON).
    #[arg(long, short = 'c', env = "AEGIS_CONFIG")]
    pub config: PathBuf,

    /// Data directory holding the token database.
    ///
    /// Created on first use if it does not exist.
    #[arg(long, short = 'd', env = "AEGIS_DATA_DIR", default_value = ".aegis")]
    pub data_dir: PathBuf,
}

impl StoreArgs {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }
}

/// Arguments for `init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// The initial owner.
    #[arg(long)]
    pub owner: Address,
}

/// Arguments for `apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Batch file: a JSON array of `{"caller": ..., "call": {...}}`.
    pub batch: PathBuf,

    /// Clock used for permit deadlines, in Unix seconds. Defaults to now.
    #[arg(long)]
    pub now: Option<u64>,

    /// Stop at the first rejected call instead of carrying on.
    #[arg(long)]
    pub stop_on_error: bool,

    /// Print Prometheus metrics after the batch.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for `upgrade`.
#[derive(Args, Debug)]
pub struct UpgradeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Who asks for the upgrade. Must be the owner.
    #[arg(long)]
    pub caller: Address,

    /// Also grant `DEFAULT_ADMIN_ROLE` to the owner right after.
    #[arg(long)]
    pub bootstrap: bool,
}

/// Arguments for `inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Show a single account instead of the whole token.
    #[arg(long)]
    pub account: Option<Address>,

    /// Include journal entries from this sequence number on.
    #[arg(long)]
    pub events_from: Option<u64>,
}

/// Arguments for `keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the secret key (hex) here instead of printing it.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Arguments for `sign-permit`.
#[derive(Args, Debug)]
pub struct SignPermitArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Hex-encoded secp256k1 secret key of the allowance owner.
    ///
    /// **Prefer `--key-file`**; command lines end up in shell history.
    #[arg(long, env = "AEGIS_SECRET_KEY", conflicts_with = "key_file")]
    pub secret_key: Option<String>,

    /// File holding the hex-encoded secret key.
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Who may spend.
    #[arg(long)]
    pub spender: Address,

    /// Allowance to set, decimal or `0x` hex.
    #[arg(long)]
    pub value: String,

    /// Last valid second (Unix time).
    #[arg(long)]
    pub deadline: u64,

    /// Override the nonce instead of reading it from the token.
    #[arg(long)]
    pub nonce: Option<u64>,

    /// Account recorded as the relayer in the emitted batch entry.
    /// Defaults to the allowance owner.
    #[arg(long)]
    pub relayer: Option<Address>,
}
