//! # Confirmation Resolver
//!
//! Decides what happened to a transaction that was handed to the network.
//! Two independent signals race a hard deadline:
//!
//! ```text
//!   (a) subscription ──ok──────────────────────────────▶ Confirmed
//!        │        └──program err──────────────────────▶ ExecutionFailed
//!        └─fault─▶ status lookup (history) ──found ok─▶ Confirmed
//!                                    ├──found err─────▶ ExecutionFailed
//!                                    └──not found─────▶ classified fault
//!   (b) status poll every 2s ──found ok / err─────────▶ as above
//!   deadline ─────────────────────────────────────────▶ ConfirmationTimeout
//! ```
//!
//! The subscription frequently reports "block height exceeded" a moment
//! after the transaction actually landed. The status lookup reconciles
//! that false negative.
//!
//! On deadline the resolver stops waiting. The transaction is already on
//! the wire and nothing here can take it back, so the outcome is the
//! ambiguous [`TransactionError::ConfirmationTimeout`], not a failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::classifier::{truncate_message, ErrorClassifier};
use crate::config;
use crate::error::{ErrorKind, RawFault, TransactionError};
use crate::rpc::{ConfirmationOutcome, LedgerRpc, SignatureStatus};
use crate::types::{Commitment, TransactionId, ValidityWindow};

/// Which signal settled the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationSource {
    /// The subscription call returned.
    Subscription,
    /// The status lookup run after the subscription failed.
    StatusFallback,
    /// The background status poll, while the subscription was pending.
    StatusPoll,
}

/// Dual-path confirmation with a deadline.
#[derive(Clone)]
pub struct ConfirmationResolver {
    rpc: Arc<dyn LedgerRpc>,
    classifier: ErrorClassifier,
    poll_interval: Duration,
}

impl ConfirmationResolver {
    /// Creates a resolver polling at [`config::STATUS_POLL_INTERVAL`].
    pub fn new(rpc: Arc<dyn LedgerRpc>, classifier: ErrorClassifier) -> Self {
        Self {
            rpc,
            classifier,
            poll_interval: config::STATUS_POLL_INTERVAL,
        }
    }

    /// Overrides the background poll interval. Values below
    /// [`config::MIN_STATUS_POLL_INTERVAL`] are raised to it.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(config::MIN_STATUS_POLL_INTERVAL);
        self
    }

    /// The background poll interval in use.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolves `id` (sent under `window`) to a terminal state.
    pub async fn resolve(
        &self,
        id: &TransactionId,
        window: &ValidityWindow,
        commitment: Commitment,
        timeout: Duration,
    ) -> Result<ConfirmationSource, TransactionError> {
        match time::timeout(timeout, self.race(id, window, commitment)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    signature = %id,
                    timeout_ms = timeout.as_millis() as u64,
                    "confirmation deadline elapsed; transaction may still land, nothing retracted"
                );
                Err(TransactionError::ConfirmationTimeout {
                    signature: id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn race(
        &self,
        id: &TransactionId,
        window: &ValidityWindow,
        commitment: Commitment,
    ) -> Result<ConfirmationSource, TransactionError> {
        let subscription = self.rpc.confirm(id, window, commitment);
        tokio::pin!(subscription);

        let mut poll = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                result = &mut subscription => {
                    return match result {
                        Ok(outcome) => self
                            .settle_outcome(id, outcome)
                            .map(|_| ConfirmationSource::Subscription),
                        Err(fault) => self.fall_back(id, fault).await,
                    };
                }

                _ = poll.tick() => {
                    match self.rpc.signature_status(id, true).await {
                        Ok(Some(status)) => {
                            if let Some(result) = self.settle_polled(id, &status, commitment) {
                                return result.map(|_| ConfirmationSource::StatusPoll);
                            }
                        }
                        Ok(None) => debug!(signature = %id, "status poll: not yet visible"),
                        Err(fault) => debug!(signature = %id, error = %fault, "status poll failed"),
                    }
                }
            }
        }
    }

    /// Subscription failed: ask the node directly, searching history.
    async fn fall_back(
        &self,
        id: &TransactionId,
        fault: RawFault,
    ) -> Result<ConfirmationSource, TransactionError> {
        debug!(signature = %id, error = %fault, "subscription failed, checking status");

        match self.rpc.signature_status(id, true).await {
            Ok(Some(status)) => match status.err {
                None => {
                    info!(
                        signature = %id,
                        slot = status.slot,
                        "transaction landed despite subscription failure"
                    );
                    Ok(ConfirmationSource::StatusFallback)
                }
                Some(err) => Err(self.execution_error(id, &err)),
            },
            Ok(None) => Err(self.classifier.classify_fault(&fault)),
            Err(lookup_fault) => {
                warn!(signature = %id, error = %lookup_fault, "fallback status lookup failed");
                Err(self.classifier.classify_fault(&fault))
            }
        }
    }

    fn settle_outcome(
        &self,
        id: &TransactionId,
        outcome: ConfirmationOutcome,
    ) -> Result<(), TransactionError> {
        match outcome.err {
            None => Ok(()),
            Some(err) => Err(self.execution_error(id, &err)),
        }
    }

    /// `None` means keep waiting.
    fn settle_polled(
        &self,
        id: &TransactionId,
        status: &SignatureStatus,
        commitment: Commitment,
    ) -> Option<Result<(), TransactionError>> {
        if let Some(err) = &status.err {
            return Some(Err(self.execution_error(id, err)));
        }
        match status.confirmation_status {
            Some(level) if level.satisfies(commitment) => {
                debug!(signature = %id, level = %level, "status poll confirmed");
                Some(Ok(()))
            }
            _ => None,
        }
    }

    /// A landed transaction with a program error. Known user-facing causes
    /// keep their category; everything else is `ExecutionFailed`.
    fn execution_error(&self, id: &TransactionId, err: &str) -> TransactionError {
        warn!(signature = %id, error = err, "transaction failed on-chain");
        let classified = self.classifier.classify(err);
        match classified.kind() {
            ErrorKind::InsufficientFunds
            | ErrorKind::NotMintAuthority
            | ErrorKind::AlreadyInUse
            | ErrorKind::InvalidAccount => classified,
            _ => TransactionError::ExecutionFailed(truncate_message(
                err,
                config::UNKNOWN_ERROR_MAX_CHARS,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{ConfirmBehavior, SimulatedLedger, StatusBehavior};

    const DEADLINE: Duration = Duration::from_secs(10);

    fn setup() -> (Arc<SimulatedLedger>, ConfirmationResolver) {
        let ledger = Arc::new(SimulatedLedger::new());
        let resolver = ConfirmationResolver::new(ledger.clone(), ErrorClassifier::default());
        (ledger, resolver)
    }

    fn window() -> ValidityWindow {
        ValidityWindow::new("hash", 2_000)
    }

    fn found(err: Option<&str>) -> StatusBehavior {
        StatusBehavior::Found(SignatureStatus {
            slot: 42,
            confirmation_status: Some(Commitment::Confirmed),
            err: err.map(String::from),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_success() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Confirmed);
        let source = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap();
        assert_eq!(source, ConfirmationSource::Subscription);
        assert_eq!(ledger.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_subscription_reconciled_by_status() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Fault(RawFault::new("Blockhash not found")));
        ledger.push_status(found(None));

        let source = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap();

        assert_eq!(source, ConfirmationSource::StatusFallback);
        assert_eq!(ledger.status_history_flags(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn status_with_program_error_is_execution_failure() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Fault(RawFault::new("block height exceeded")));
        ledger.push_status(found(Some("InstructionError(0, Custom(6001))")));

        let err = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn program_error_with_known_cause_keeps_category() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::ExecutionError(
            "insufficient funds for rent".into(),
        ));
        let err = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_after_expiry_stays_retryable() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Fault(RawFault::new(
            "Signature sig has expired: block height exceeded.",
        )));
        ledger.push_status(StatusBehavior::NotFound);

        let err = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WindowExpired);
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_lookup_fault_reports_original_fault() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Fault(RawFault::new("blockhash not found")));
        ledger.push_status(StatusBehavior::Fault(RawFault::new("connection refused")));

        let err = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WindowExpired);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_subscription_times_out() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Hang);
        let start = Instant::now();

        let err = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap_err();

        assert!(err.is_ambiguous());
        assert_eq!(
            err,
            TransactionError::ConfirmationTimeout {
                signature: "sig".into(),
                timeout_ms: 10_000,
            }
        );
        assert!(start.elapsed() >= DEADLINE);
        // Polled every 2s while waiting.
        assert!(ledger.status_calls() >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_resolves_while_subscription_hangs() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Hang);
        ledger.push_status(StatusBehavior::NotFound);
        ledger.push_status(found(None));
        let start = Instant::now();

        let source = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap();

        assert_eq!(source, ConfirmationSource::StatusPoll);
        assert_eq!(ledger.status_calls(), 2);
        assert!(start.elapsed() < DEADLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_is_clamped() {
        let (ledger, resolver) = setup();
        let resolver = resolver.with_poll_interval(Duration::ZERO);
        assert_eq!(resolver.poll_interval(), config::MIN_STATUS_POLL_INTERVAL);

        ledger.push_confirm(ConfirmBehavior::Hang);
        ledger.push_status(found(None));
        let source = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap();
        assert_eq!(source, ConfirmationSource::StatusPoll);
    }

    #[tokio::test(start_paused = true)]
    async fn program_error_mentioning_transport_is_execution_failure() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::ExecutionError(
            "custom program error: connection refused".into(),
        ));
        let err = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Confirmed, DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_waits_for_requested_commitment() {
        let (ledger, resolver) = setup();
        ledger.push_confirm(ConfirmBehavior::Hang);
        ledger.push_status(StatusBehavior::Found(SignatureStatus {
            slot: 1,
            confirmation_status: Some(Commitment::Processed),
            err: None,
        }));
        ledger.push_status(StatusBehavior::Found(SignatureStatus {
            slot: 1,
            confirmation_status: Some(Commitment::Finalized),
            err: None,
        }));

        let source = resolver
            .resolve(&TransactionId::new("sig"), &window(), Commitment::Finalized, DEADLINE)
            .await
            .unwrap();
        assert_eq!(source, ConfirmationSource::StatusPoll);
        assert_eq!(ledger.status_calls(), 2);
    }
}
