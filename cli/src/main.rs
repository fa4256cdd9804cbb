// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Submit
//!
//! Entry point for the `nova-submit` binary. Drives the `nova-client`
//! submission engine against the bundled devnet simulator and prints the
//! outcome as JSON on stdout.
//!
//! - `send`    : transfer tokens, with optional fault injection
//! - `mint`    : mint tokens, with optional fault injection
//! - `classify`: run the error classifier on a message
//! - `backoff` : print the retry backoff schedule
//! - `version` : print build version information

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::json;

use nova_client::simulator::{ConfirmBehavior, SimulatedLedger, SimulatedWallet};
use nova_client::{
    BackoffPolicy, CoSigner, Commitment, ErrorClassifier, InMemoryHistory, Instruction,
    MintRequest, PublicIdentity, RawFault, SubmissionEngine, SubmissionMetrics, SubmissionOptions,
    TokenOperations, TracingProgressSink, TransactionError, TransactionId, TransferRequest,
};

use cli::{Commands, NovaSubmitCli, SubmitArgs};

/// Program id the devnet token instructions are addressed to.
const TOKEN_PROGRAM: [u8; 32] = [0x06; 32];

/// Recipient used by `send` when none is given.
const DEVNET_RECIPIENT: [u8; 32] = [0x2a; 32];

/// Mint used by `send` when none is given.
const DEVNET_MINT: [u8; 32] = [0x4d; 32];

const TAG_MINT_TO: u8 = 7;
const TAG_TRANSFER: u8 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NovaSubmitCli::parse();
    logging::init_logging(logging::DEFAULT_DIRECTIVES, cli.log_format);

    match cli.command {
        Commands::Send(args) => {
            let options = load_options(cli.options.as_deref(), &args.submit)?;
            run_send(args, options, cli.print_metrics).await
        }
        Commands::Mint(args) => {
            let options = load_options(cli.options.as_deref(), &args.submit)?;
            run_mint(args, options, cli.print_metrics).await
        }
        Commands::Classify(args) => classify(&args.message),
        Commands::Backoff(args) => {
            print_backoff(&args);
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Reads the options file (if any), then applies command-line overrides.
fn load_options(path: Option<&std::path::Path>, args: &SubmitArgs) -> Result<SubmissionOptions> {
    let mut options = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read options file: {}", path.display()))?;
            SubmissionOptions::from_json(&raw)
                .with_context(|| format!("invalid options file: {}", path.display()))?
        }
        None => SubmissionOptions::default(),
    };

    if let Some(max_retries) = args.max_retries {
        options.max_retries = max_retries;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options.max_timeout_ms = timeout_ms;
    }
    if let Some(level) = &args.commitment {
        options.confirm_commitment = level
            .parse::<Commitment>()
            .context("invalid --commitment")?;
    }
    if args.skip_preflight {
        options.skip_preflight = true;
    }

    options
        .validate()
        .context("invalid submission options")?;
    tracing::debug!(?options, "submission options");
    Ok(options)
}

/// Everything one submission needs, wired to the simulator.
struct Devnet {
    ledger: Arc<SimulatedLedger>,
    wallet: SimulatedWallet,
    history: Arc<InMemoryHistory>,
    metrics: SubmissionMetrics,
    ops: TokenOperations,
}

fn devnet(args: &SubmitArgs) -> Result<Devnet> {
    let ledger = Arc::new(SimulatedLedger::new());
    ledger.drop_next_transactions(args.expired_windows);
    if args.drop_subscription {
        ledger.push_confirm(ConfirmBehavior::Fault(RawFault::new(
            "Blockhash not found while waiting for confirmation",
        )));
    }

    let wallet = match &args.wallet_seed {
        Some(seed) => {
            let key = CoSigner::from_hex_seed(seed).context("invalid --wallet-seed")?;
            SimulatedWallet::with_key(key, ledger.clone())
        }
        None => SimulatedWallet::connected(ledger.clone()),
    };
    if args.reject {
        wallet.push_send_fault(RawFault::new("User rejected the request."));
    }

    let metrics = SubmissionMetrics::new();
    let history = Arc::new(InMemoryHistory::new());
    let engine = SubmissionEngine::new(ledger.clone(), Arc::new(TracingProgressSink::new()))
        .with_metrics(metrics.clone());
    let ops = TokenOperations::new(engine, history.clone());

    tracing::info!(
        wallet = %wallet.key_identity(),
        expired_windows = args.expired_windows,
        drop_subscription = args.drop_subscription,
        reject = args.reject,
        "devnet ready"
    );

    Ok(Devnet {
        ledger,
        wallet,
        history,
        metrics,
        ops,
    })
}

fn parse_identity(value: Option<&str>, fallback: PublicIdentity, what: &str) -> Result<PublicIdentity> {
    match value {
        Some(s) => s
            .parse::<PublicIdentity>()
            .with_context(|| format!("invalid {} address", what)),
        None => Ok(fallback),
    }
}

fn instruction(tag: u8, accounts: Vec<PublicIdentity>, amount: u64) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(tag);
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction::new(PublicIdentity::from_bytes(TOKEN_PROGRAM), accounts, data)
}

async fn run_send(args: cli::SendArgs, options: SubmissionOptions, print_metrics: bool) -> Result<()> {
    let net = devnet(&args.submit)?;
    let recipient = parse_identity(
        args.recipient.as_deref(),
        PublicIdentity::from_bytes(DEVNET_RECIPIENT),
        "recipient",
    )?;
    let mint = parse_identity(
        args.mint.as_deref(),
        PublicIdentity::from_bytes(DEVNET_MINT),
        "mint",
    )?;

    let request = TransferRequest {
        mint_address: mint,
        recipient,
        amount: args.amount,
        instructions: vec![instruction(
            TAG_TRANSFER,
            vec![mint, net.wallet.key_identity(), recipient],
            args.amount,
        )],
    };

    let result = net.ops.send_tokens(request, &net.wallet, &options).await;
    report(&net, result, print_metrics)
}

async fn run_mint(args: cli::MintArgs, options: SubmissionOptions, print_metrics: bool) -> Result<()> {
    let net = devnet(&args.submit)?;
    let recipient = parse_identity(args.recipient.as_deref(), net.wallet.key_identity(), "recipient")?;
    let mint_key = CoSigner::generate();

    let request = MintRequest {
        mint_address: mint_key.identity(),
        recipient,
        amount: args.amount,
        instructions: vec![instruction(
            TAG_MINT_TO,
            vec![mint_key.identity(), recipient],
            args.amount,
        )],
        co_signers: vec![mint_key],
    };

    let result = net.ops.mint_tokens(request, &net.wallet, &options).await;
    report(&net, result, print_metrics)
}

/// Prints the outcome as JSON; a failed submission exits non-zero.
fn report(
    net: &Devnet,
    result: Result<TransactionId, TransactionError>,
    print_metrics: bool,
) -> Result<()> {
    let finished_at = Utc::now().to_rfc3339();
    let body = match &result {
        Ok(id) => json!({
            "status": "confirmed",
            "signature": id,
            "landed": net.ledger.is_landed(id),
            "attempts": net.wallet.sends(),
            "history": net.history.entries(),
            "finishedAt": finished_at,
        }),
        Err(err) => json!({
            "status": if err.is_ambiguous() { "unknown" } else { "failed" },
            "kind": err.kind(),
            "message": err.to_string(),
            "retryable": err.is_retryable(),
            "attempts": net.wallet.sends(),
            "finishedAt": finished_at,
        }),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&body).context("failed to render result")?
    );

    if print_metrics {
        let text = net.metrics.encode().context("failed to encode metrics")?;
        print!("{}", text);
    }

    match result {
        Ok(_) => Ok(()),
        Err(err) => bail!("submission failed: {}", err),
    }
}

fn classify(message: &str) -> Result<()> {
    let err = ErrorClassifier::default().classify(message);
    let body = json!({
        "kind": err.kind(),
        "retryable": err.is_retryable(),
        "message": err.to_string(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&body).context("failed to render classification")?
    );
    Ok(())
}

fn print_backoff(args: &cli::BackoffArgs) {
    let policy = BackoffPolicy::new(args.base_ms, args.multiplier, args.cap_ms);
    for (i, delay) in policy.schedule(args.max_retries).iter().enumerate() {
        println!("attempt {:>2}: wait {:>6} ms", i + 1, delay.as_millis());
    }
}

/// Prints the binary version and the defaults it was built with.
fn print_version() {
    println!("nova-submit {}", env!("CARGO_PKG_VERSION"));
    println!(
        "defaults    retries={} timeout={}ms window={}",
        nova_client::config::DEFAULT_MAX_RETRIES,
        nova_client::config::DEFAULT_MAX_TIMEOUT_MS,
        nova_client::config::WINDOW_FETCH_COMMITMENT,
    );
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
