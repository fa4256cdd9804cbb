//! Integration tests for the submission layer.
//!
//! Every test drives the public API only: a `SubmissionEngine` wired to the
//! devnet simulator, a recording progress sink, and an in-memory history.
//! Time is paused, so backoff sleeps and confirmation deadlines resolve
//! instantly and deterministically.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;

use nova_client::simulator::{ConfirmBehavior, SimulatedLedger, SimulatedWallet, StatusBehavior};
use nova_client::{
    CoSigner, ErrorKind, HistoryKind, InMemoryHistory, Instruction, MintRequest, NotificationKind,
    PublicIdentity, RawFault, RecordingProgressSink, SubmissionEngine, SubmissionMetrics,
    SubmissionOptions, TokenOperations, TransactionError, TransactionRequest, TransferRequest,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct Devnet {
    ledger: Arc<SimulatedLedger>,
    sink: Arc<RecordingProgressSink>,
    history: Arc<InMemoryHistory>,
    metrics: SubmissionMetrics,
    ops: TokenOperations,
}

fn devnet() -> Devnet {
    let ledger = Arc::new(SimulatedLedger::new());
    let sink = Arc::new(RecordingProgressSink::new());
    let history = Arc::new(InMemoryHistory::new());
    let metrics = SubmissionMetrics::new();
    let engine = SubmissionEngine::new(ledger.clone(), sink.clone()).with_metrics(metrics.clone());
    let ops = TokenOperations::new(engine, history.clone());
    Devnet {
        ledger,
        sink,
        history,
        metrics,
        ops,
    }
}

fn transfer_ix(recipient: PublicIdentity, amount: u64) -> Instruction {
    let mut data = vec![3];
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction::new(PublicIdentity::from_bytes([0x71; 32]), vec![recipient], data)
}

fn transfer(recipient: PublicIdentity, amount: u64) -> TransferRequest {
    TransferRequest {
        mint_address: PublicIdentity::from_bytes([0x55; 32]),
        recipient,
        amount,
        instructions: vec![transfer_ix(recipient, amount)],
    }
}

/// Asserts the notification sequence for one submission is
/// `loading+ → terminal` with exactly one terminal entry at the end.
fn assert_well_formed(sink: &RecordingProgressSink, correlation_id: &str) -> NotificationKind {
    let notes = sink.notifications_for(correlation_id);
    let (last, rest) = notes.split_last().expect("at least one notification");
    assert!(last.0.is_terminal(), "last notification must be terminal");
    assert!(
        rest.iter().all(|(k, _)| *k == NotificationKind::Loading),
        "only loading notifications may precede the outcome"
    );
    assert_eq!(sink.active_for(correlation_id).len(), 1);
    last.0
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn full_send_lifecycle() {
    let net = devnet();
    let wallet = SimulatedWallet::connected(net.ledger.clone());
    let recipient = PublicIdentity::from_bytes([0x22; 32]);

    let id = net
        .ops
        .send_tokens(transfer(recipient, 250), &wallet, &SubmissionOptions::default())
        .await
        .unwrap();

    assert!(net.ledger.is_landed(&id));
    assert_eq!(net.history.len(), 1);
    assert_eq!(net.history.entries()[0].recipient, recipient);

    let cid = &net.sink.correlation_ids()[0];
    assert_eq!(assert_well_formed(&net.sink, cid), NotificationKind::Success);
}

#[tokio::test(start_paused = true)]
async fn mint_with_co_signer_survives_window_rotation() {
    let net = devnet();
    let wallet = SimulatedWallet::connected(net.ledger.clone());
    let mint_key = CoSigner::generate();
    net.ledger.drop_next_transactions(2);

    let id = net
        .ops
        .mint_tokens(
            MintRequest {
                mint_address: mint_key.identity(),
                recipient: wallet.key_identity(),
                amount: 1_000,
                instructions: vec![Instruction::new(
                    PublicIdentity::from_bytes([0x72; 32]),
                    vec![mint_key.identity()],
                    vec![0, 9],
                )],
                co_signers: vec![mint_key],
            },
            &wallet,
            &SubmissionOptions::default(),
        )
        .await
        .unwrap();

    assert!(net.ledger.is_landed(&id));
    assert_eq!(wallet.sends(), 3);
    let hashes: HashSet<_> = wallet
        .sent_windows()
        .into_iter()
        .map(|w| w.reference_hash)
        .collect();
    assert_eq!(hashes.len(), 3, "no window may be signed twice");
    assert_eq!(net.history.by_kind(HistoryKind::Mint).len(), 1);
    assert_eq!(net.metrics.retries_total.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn fallback_scenario_consumes_no_retries() {
    let net = devnet();
    let wallet = SimulatedWallet::connected(net.ledger.clone());
    net.ledger
        .push_confirm(ConfirmBehavior::Fault(RawFault::new("blockhash not found")));

    let id = net
        .ops
        .send_tokens(
            transfer(PublicIdentity::from_bytes([1; 32]), 1),
            &wallet,
            &SubmissionOptions::default().with_max_retries(3),
        )
        .await
        .unwrap();

    assert!(net.ledger.is_landed(&id));
    assert_eq!(net.ledger.window_fetches(), 1);
    assert_eq!(net.metrics.retries_total.get(), 0);
    assert_eq!(net.ledger.status_history_flags(), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_last_error() {
    let net = devnet();
    let wallet = SimulatedWallet::connected(net.ledger.clone());
    net.ledger.drop_next_transactions(5);

    let err = net
        .ops
        .send_tokens(
            transfer(PublicIdentity::from_bytes([1; 32]), 1),
            &wallet,
            &SubmissionOptions::default().with_max_retries(5),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WindowExpired);
    assert_eq!(net.ledger.window_fetches(), 5);
    assert_eq!(net.metrics.retries_total.get(), 4);
    assert_eq!(net.metrics.failures(ErrorKind::WindowExpired), 1);
    assert!(net.history.is_empty());

    let cid = &net.sink.correlation_ids()[0];
    assert_eq!(assert_well_formed(&net.sink, cid), NotificationKind::Error);
}

#[tokio::test(start_paused = true)]
async fn concurrent_submissions_are_isolated() {
    let net = devnet();
    let wallets: Vec<_> = (0..8)
        .map(|_| SimulatedWallet::connected(net.ledger.clone()))
        .collect();
    // Some of the eight will hit a dropped transaction and retry.
    net.ledger.drop_next_transactions(3);

    let options = SubmissionOptions::default();
    let futures = wallets.iter().enumerate().map(|(i, wallet)| {
        let ops = net.ops.clone();
        let options = options.clone();
        async move {
            ops.send_tokens(
                transfer(PublicIdentity::from_bytes([i as u8; 32]), i as u64 + 1),
                wallet,
                &options,
            )
            .await
        }
    });

    let results = join_all(futures).await;
    let ids: HashSet<_> = results
        .into_iter()
        .map(|r| r.expect("every submission eventually lands"))
        .collect();

    assert_eq!(ids.len(), 8);
    assert_eq!(net.history.len(), 8);
    assert_eq!(net.ledger.landed_count(), 8);

    let cids = net.sink.correlation_ids();
    assert_eq!(cids.len(), 8);
    for cid in &cids {
        assert_eq!(assert_well_formed(&net.sink, cid), NotificationKind::Success);
    }
}

#[tokio::test(start_paused = true)]
async fn caller_imposed_wall_clock_bound() {
    let net = devnet();
    let wallet = SimulatedWallet::connected(net.ledger.clone());
    net.ledger.drop_next_transactions(1);
    net.ledger.push_confirm(ConfirmBehavior::Hang);

    let engine = net.ops.engine().clone();
    let request = TransactionRequest::builder()
        .instruction(transfer_ix(PublicIdentity::from_bytes([5; 32]), 10))
        .build()
        .unwrap();
    let options = SubmissionOptions::default();
    let start = Instant::now();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        engine.submit(request, &wallet, &options),
    )
    .await;

    // The race was lost by `submit`; the caller reports it as ambiguous.
    let result = outcome.unwrap_or_else(|_| {
        Err(TransactionError::ConfirmationTimeout {
            signature: String::new(),
            timeout_ms: 5_000,
        })
    });
    assert!(result.unwrap_err().is_ambiguous());
    assert!(start.elapsed() >= Duration::from_secs(5));
    // The transaction was sent exactly once and never retracted.
    assert_eq!(wallet.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnected_wallet_touches_nothing() {
    let net = devnet();
    let wallet = SimulatedWallet::disconnected();

    let err = net
        .ops
        .send_tokens(
            transfer(PublicIdentity::from_bytes([1; 32]), 1),
            &wallet,
            &SubmissionOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, TransactionError::WalletNotConnected);
    assert_eq!(net.ledger.window_fetches(), 0);
    assert_eq!(net.ledger.confirm_calls(), 0);
    assert_eq!(net.metrics.submissions_total.get(), 1);
    assert!(net.history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn options_loaded_from_json() {
    let options =
        SubmissionOptions::from_json(r#"{"maxRetries": 2, "maxTimeoutMs": 3000}"#).unwrap();
    let net = devnet();
    let wallet = SimulatedWallet::connected(net.ledger.clone());
    net.ledger.drop_next_transactions(2);

    let err = net
        .ops
        .send_tokens(
            transfer(PublicIdentity::from_bytes([1; 32]), 1),
            &wallet,
            &options,
        )
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(net.ledger.window_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_fault_after_send_lands_at_most_once() {
    let net = devnet();
    let wallet = SimulatedWallet::connected(net.ledger.clone());
    net.ledger
        .push_confirm(ConfirmBehavior::Fault(RawFault::new("connection refused")));
    net.ledger.push_status(StatusBehavior::NotFound);

    let err = net
        .ops
        .send_tokens(
            transfer(PublicIdentity::from_bytes([1; 32]), 1),
            &wallet,
            &SubmissionOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkUnavailable);
    assert_eq!(wallet.sends(), 1);
    assert_eq!(net.ledger.landed_count(), 1);
    assert!(net.history.is_empty());
}

#[test]
fn options_with_zero_budget_are_rejected() {
    assert!(SubmissionOptions::from_json(r#"{"maxRetries": 0, "maxTimeoutMs": 0}"#).is_err());
}
