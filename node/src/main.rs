// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Aegis Token Host
//!
//! Entry point for the `aegis-node` binary. Parses CLI arguments, initializes
//! logging, opens the token database and runs one subcommand against it.
//!
//! The binary supports these subcommands:
//!
//! - `init`        — create the database and initialize the token
//! - `apply`       — apply a JSON batch of calls, one JSON outcome per line
//! - `upgrade`     — switch to role-based authorization
//! - `inspect`     — dump the token (or one account) as JSON
//! - `keygen`      — generate a secp256k1 keypair
//! - `sign-permit` — sign an off-chain approval and print it as a batch entry
//! - `version`     — print build version information
//!
//! Every invocation opens the database, does its work and exits. Two
//! invocations against the same data directory must not run at once; sled
//! refuses the second open.

mod batch;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;

use aegis_contracts::permit::{sign_permit, Permit};
use aegis_contracts::{TokenCall, TokenService};
use aegis_protocol::config::TokenConfig;
use aegis_protocol::crypto::AegisKeypair;
use aegis_protocol::storage::TokenDB;
use aegis_protocol::types::parse_amount;

use batch::BatchEntry;
use cli::{AegisNodeCli, Commands, StoreArgs};
use metrics::NodeMetrics;

fn main() -> Result<()> {
    let cli = AegisNodeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Init(args) => init_token(args),
        Commands::Apply(args) => apply_batch(args),
        Commands::Upgrade(args) => upgrade_token(args),
        Commands::Inspect(args) => inspect_token(args),
        Commands::Keygen(args) => keygen(args),
        Commands::SignPermit(args) => sign_permit_entry(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Loads the config and opens (or creates) the token database.
fn open_service(store: &StoreArgs) -> Result<(TokenConfig, TokenService)> {
    let config = TokenConfig::load(&store.config)
        .with_context(|| format!("failed to load config {}", store.config.display()))?;

    let db_path = store.db_path();
    std::fs::create_dir_all(&store.data_dir).with_context(|| {
        format!(
            "failed to create data directory: {}",
            store.data_dir.display()
        )
    })?;
    let db = TokenDB::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");

    let service = TokenService::open(db, &config).context("failed to load token")?;
    Ok((config, service))
}

fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn init_token(args: cli::InitArgs) -> Result<()> {
    let (config, service) = open_service(&args.store)?;
    if service.read(|t| t.is_initialized()) {
        bail!(
            "token at {} is already initialized",
            args.store.data_dir.display()
        );
    }

    let call = TokenCall::Initialize {
        name: config.name.clone(),
        symbol: config.symbol.clone(),
        decimals: config.decimals,
    };
    service
        .execute(&args.owner, &call, now_unix())
        .context("initialize rejected")?;

    tracing::info!(
        token = %config.token_address,
        owner = %args.owner,
        chain_id = config.chain_id,
        "token initialized"
    );

    println!("Token initialized successfully.");
    println!("  Data directory : {}", args.store.data_dir.display());
    println!("  Token          : {} ({})", config.name, config.symbol);
    println!("  Address        : {}", config.token_address);
    println!("  Chain ID       : {}", config.chain_id);
    println!("  Owner          : {}", args.owner);
    println!(
        "  Domain sep.    : 0x{}",
        hex::encode(service.read(|t| t.domain_separator()))
    );
    Ok(())
}

fn apply_batch(args: cli::ApplyArgs) -> Result<()> {
    let entries = batch::load_batch(&args.batch)?;
    let (_, service) = open_service(&args.store)?;
    let metrics = NodeMetrics::new().context("failed to register metrics")?;
    let now = args.now.unwrap_or_else(now_unix);

    tracing::info!(
        calls = entries.len(),
        now,
        batch = %args.batch.display(),
        "applying batch"
    );

    let outcomes = batch::apply_batch(&service, &entries, now, args.stop_on_error, &metrics);
    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    let applied = outcomes.iter().filter(|o| o.is_applied()).count();
    tracing::info!(
        applied,
        rejected = outcomes.len() - applied,
        skipped = entries.len() - outcomes.len(),
        "batch finished"
    );

    if args.metrics {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

fn upgrade_token(args: cli::UpgradeArgs) -> Result<()> {
    let (_, service) = open_service(&args.store)?;
    let events = service
        .upgrade_to_role_based(&args.caller)
        .context("upgrade rejected")?;
    let mut all = events;

    if args.bootstrap {
        let granted = service
            .execute(&args.caller, &TokenCall::BootstrapAdminRole, now_unix())
            .context("bootstrap rejected")?;
        all.extend(granted);
    }

    let fingerprint = service.read(|t| t.fingerprint())?;
    tracing::info!(
        schema_version = service.read(|t| t.schema_version()),
        fingerprint = %hex::encode(fingerprint),
        "token upgraded"
    );
    print_json(&json!({ "events": all }))
}

fn inspect_token(args: cli::InspectArgs) -> Result<()> {
    let (_, service) = open_service(&args.store)?;
    let token = service.snapshot();

    let mut out = match args.account {
        Some(account) => json!({
            "account": account,
            "balance": token.balance_of(&account).to_string(),
            "nonce": token.nonces(&account),
            "blocked": token.is_blocked(&account),
            "is_owner": token.owner() == account,
            "roles": aegis_contracts::Role::ALL
                .iter()
                .filter(|r| token.has_role(**r, &account))
                .map(|r| r.name())
                .collect::<Vec<_>>(),
        }),
        None => json!({
            "initialized": token.is_initialized(),
            "name": token.name(),
            "symbol": token.symbol(),
            "decimals": token.decimals(),
            "chain_id": token.chain_id(),
            "token_address": token.token_address(),
            "owner": token.owner(),
            "schema_version": token.schema_version(),
            "authorization": token.authorization_variant(),
            "total_supply": token.total_supply().to_string(),
            "holders": token.holder_count(),
            "blocked": token.blocked_accounts(),
            "domain_separator": format!("0x{}", hex::encode(token.domain_separator())),
            "fingerprint": token
                .fingerprint()
                .ok()
                .map(|f| format!("0x{}", hex::encode(f))),
        }),
    };

    if let Some(start) = args.events_from {
        let mut history = service.history(start)?;
        if let Some(account) = args.account {
            history.retain(|r| r.event.involves(&account));
        }
        out["events"] = serde_json::to_value(history)?;
    }
    print_json(&out)
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = AegisKeypair::generate();
    let address = keypair.address();

    match args.out {
        Some(path) => {
            std::fs::write(&path, keypair.secret_key_hex())
                .with_context(|| format!("failed to write key to {}", path.display()))?;

            // Restrict permissions on Unix.
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
            }

            tracing::info!(address = %address, key_path = %path.display(), "keypair generated");
            println!("Address    : {}", address);
            println!("Secret key : {}", path.display());
        }
        None => {
            println!("Address    : {}", address);
            println!("Secret key : {}", keypair.secret_key_hex());
        }
    }
    Ok(())
}

fn sign_permit_entry(args: cli::SignPermitArgs) -> Result<()> {
    let secret = match (&args.secret_key, &args.key_file) {
        (Some(key), _) => key.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read key file {}", path.display()))?,
        (None, None) => bail!("one of --secret-key or --key-file is required"),
    };
    let keypair = AegisKeypair::from_hex(&secret).context("invalid secret key")?;
    let value = parse_amount(&args.value)
        .with_context(|| format!("invalid permit value: {}", args.value))?;

    let (_, service) = open_service(&args.store)?;
    let owner = keypair.address();
    let (separator, current_nonce) =
        service.read(|t| (t.domain_separator(), t.nonces(&owner)));

    let permit = Permit {
        owner,
        spender: args.spender,
        value,
        nonce: args.nonce.unwrap_or(current_nonce),
        deadline: args.deadline,
    };
    let signature = sign_permit(&keypair, &separator, &permit).context("signing failed")?;

    tracing::info!(
        owner = %owner,
        spender = %args.spender,
        nonce = permit.nonce,
        deadline = args.deadline,
        "permit signed"
    );

    let entry = BatchEntry {
        caller: args.relayer.unwrap_or(owner),
        call: TokenCall::Permit {
            owner,
            spender: args.spender,
            value,
            deadline: args.deadline,
            signature,
        },
    };
    print_json(&serde_json::to_value(entry)?)
}

/// Prints version information to stdout.
fn print_version() {
    println!("aegis-node {}", env!("CARGO_PKG_VERSION"));
    println!(
        "schema     v{}",
        aegis_protocol::config::SCHEMA_VERSION_ROLE_BASED
    );
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
