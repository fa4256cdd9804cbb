//! # Submission Engine
//!
//! The retry loop. One call to [`SubmissionEngine::submit`] runs, in order:
//!
//! 1. Precondition: the signer has an identity, else `WalletNotConnected`
//!    with zero network calls.
//! 2. Per attempt: progress → fresh window → bind + co-sign → identity
//!    re-check → send → "confirming" → resolve.
//! 3. Retryable failure with attempts left: back off, go again with a new
//!    window. Anything else is terminal.
//!
//! Once a send has been attempted, only `WindowExpired` and `NetworkTimeout`
//! earn another attempt. A transport fault after that point could hide a
//! transaction that is still going to land, and a second send would then
//! double the operation. `NetworkUnavailable` is retried only when the
//! window fetch fails, where nothing has left the client yet.
//!
//! Attempts never overlap. The engine holds no per-submission state of its
//! own, so one engine can serve many concurrent `submit` calls; each owns
//! its request, its windows and its [`ProgressTracker`].
//!
//! A send-step failure costs the same backoff as a confirmation failure.

use std::sync::Arc;

use tokio::time::{self, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backoff::BackoffPolicy;
use crate::classifier::ErrorClassifier;
use crate::confirmation::{ConfirmationResolver, ConfirmationSource};
use crate::error::{ErrorKind, TransactionError};
use crate::metrics::SubmissionMetrics;
use crate::progress::{ProgressSink, ProgressTracker};
use crate::rpc::LedgerRpc;
use crate::signer::TransactionSigner;
use crate::types::{AttemptOutcome, AttemptRecord, SubmissionOptions, TransactionId, TransactionRequest};
use crate::window::ValidityWindowProvider;

/// A failed attempt, tagged with whether a send had been attempted.
#[derive(Debug)]
struct AttemptFailure {
    error: TransactionError,
    dispatched: bool,
}

impl AttemptFailure {
    fn before_send(error: TransactionError) -> Self {
        Self {
            error,
            dispatched: false,
        }
    }

    fn after_send(error: TransactionError) -> Self {
        Self {
            error,
            dispatched: true,
        }
    }

    fn is_retryable(&self) -> bool {
        self.error.is_retryable()
            || (!self.dispatched && self.error.kind() == ErrorKind::NetworkUnavailable)
    }
}

/// Orchestrates submission and confirmation of one transaction at a time
/// per call, any number of calls at once.
#[derive(Clone)]
pub struct SubmissionEngine {
    rpc: Arc<dyn LedgerRpc>,
    windows: ValidityWindowProvider,
    resolver: ConfirmationResolver,
    classifier: ErrorClassifier,
    progress: Arc<dyn ProgressSink>,
    backoff: BackoffPolicy,
    metrics: Option<SubmissionMetrics>,
}

impl SubmissionEngine {
    /// Creates an engine with the default classifier and backoff.
    pub fn new(rpc: Arc<dyn LedgerRpc>, progress: Arc<dyn ProgressSink>) -> Self {
        let classifier = ErrorClassifier::default();
        Self {
            windows: ValidityWindowProvider::new(rpc.clone()),
            resolver: ConfirmationResolver::new(rpc.clone(), classifier),
            rpc,
            classifier,
            progress,
            backoff: BackoffPolicy::default(),
            metrics: None,
        }
    }

    /// Records counters into `metrics`.
    pub fn with_metrics(mut self, metrics: SubmissionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replaces the backoff schedule.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the classifier used for every fault.
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self.resolver = ConfirmationResolver::new(self.rpc.clone(), classifier);
        self
    }

    /// The attached metrics, if any.
    pub fn metrics(&self) -> Option<&SubmissionMetrics> {
        self.metrics.as_ref()
    }

    /// The backoff schedule in use.
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Submits `request` and waits for a terminal outcome.
    ///
    /// Exactly one terminal notification (success or error) is emitted, and
    /// it is the last one for this submission.
    pub async fn submit(
        &self,
        mut request: TransactionRequest,
        signer: &dyn TransactionSigner,
        options: &SubmissionOptions,
    ) -> Result<TransactionId, TransactionError> {
        let correlation_id = Uuid::new_v4().to_string();
        let span = info_span!("submit", correlation_id = %correlation_id);
        let started = Instant::now();
        let mut progress = ProgressTracker::new(self.progress.clone(), correlation_id);

        if let Some(m) = &self.metrics {
            m.submissions_total.inc();
        }

        let result = self
            .run(&mut request, signer, options, &mut progress)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(id) => {
                info!(signature = %id, "transaction confirmed");
                progress.success(&format!("Transaction confirmed: {}", id));
                if let Some(m) = &self.metrics {
                    m.confirmed_total.inc();
                }
            }
            Err(err) => {
                warn!(kind = %err.kind(), error = %err, "submission failed");
                progress.error(&err.to_string());
                if let Some(m) = &self.metrics {
                    m.record_failure(err.kind());
                }
            }
        });
        if let Some(m) = &self.metrics {
            m.submission_latency_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        result
    }

    async fn run(
        &self,
        request: &mut TransactionRequest,
        signer: &dyn TransactionSigner,
        options: &SubmissionOptions,
        progress: &mut ProgressTracker,
    ) -> Result<TransactionId, TransactionError> {
        if signer.identity().is_none() {
            return Err(TransactionError::WalletNotConnected);
        }

        let max_attempts = options.max_retries;
        let mut last_error: Option<TransactionError> = None;

        for attempt in 1..=max_attempts {
            if attempt == 1 {
                progress.loading("Preparing transaction...");
            } else {
                progress.loading(&format!(
                    "Retrying with fresh window (attempt {}/{})...",
                    attempt, max_attempts
                ));
            }

            let mut record = AttemptRecord::start(attempt);
            match self
                .attempt(request, signer, options, progress, &mut record)
                .await
            {
                Ok(id) => {
                    record.finish(AttemptOutcome::Confirmed);
                    return Ok(id);
                }
                Err(failure) if failure.is_retryable() => {
                    let err = failure.error;
                    record.finish(AttemptOutcome::Retryable(err.kind()));
                    last_error = Some(err);
                    if attempt < max_attempts {
                        let delay = self.backoff.delay_for_attempt(attempt + 1);
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retryable failure, backing off"
                        );
                        if let Some(m) = &self.metrics {
                            m.retries_total.inc();
                        }
                        time::sleep(delay).await;
                    }
                }
                Err(AttemptFailure { error, dispatched }) => {
                    if dispatched && error.kind() == ErrorKind::NetworkUnavailable {
                        warn!("network unreachable after send; not resending");
                    }
                    record.finish(AttemptOutcome::Terminal(error.kind()));
                    return Err(error);
                }
            }
        }

        Err(last_error.unwrap_or(TransactionError::RetriesExhausted {
            attempts: max_attempts,
        }))
    }

    async fn attempt(
        &self,
        request: &mut TransactionRequest,
        signer: &dyn TransactionSigner,
        options: &SubmissionOptions,
        progress: &mut ProgressTracker,
        record: &mut AttemptRecord,
    ) -> Result<TransactionId, AttemptFailure> {
        if let Some(m) = &self.metrics {
            m.attempts_total.inc();
            m.window_fetches_total.inc();
        }
        let window = self
            .windows
            .fetch(options.confirm_commitment)
            .await
            .map_err(AttemptFailure::before_send)?;
        record.window = Some(window.clone());

        let fee_payer = signer
            .identity()
            .ok_or_else(|| AttemptFailure::before_send(TransactionError::WalletDisconnected))?;
        request.bind_window(window.clone(), fee_payer);

        // The wallet may have gone away while the user was approving.
        if signer.identity().is_none() {
            return Err(AttemptFailure::before_send(
                TransactionError::WalletDisconnected,
            ));
        }

        let id = signer
            .send(request, options.send_options())
            .await
            .map_err(|fault| {
                debug!(error = %fault, "send failed");
                AttemptFailure::after_send(self.classifier.classify_fault(&fault))
            })?;
        record.transaction_id = Some(id.clone());
        debug!(signature = %id, attempt = record.attempt, "sent");

        progress.loading("Confirming transaction...");
        let source = self
            .resolver
            .resolve(
                &id,
                &window,
                options.confirm_commitment,
                options.max_timeout(),
            )
            .await
            .map_err(AttemptFailure::after_send)?;

        if source != ConfirmationSource::Subscription {
            if let Some(m) = &self.metrics {
                m.fallback_confirmations_total.inc();
            }
        }
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
