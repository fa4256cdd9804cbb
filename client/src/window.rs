//! # Validity Window Provider
//!
//! Fetches a fresh `(reference hash, expiry height)` pair for every attempt.
//!
//! The requested durability level is deliberately ignored: windows are
//! always fetched at [`config::WINDOW_FETCH_COMMITMENT`] (finalized). A
//! window fetched at `processed` can be several hundred blocks closer to
//! expiry, and the wallet approval prompt alone can eat that margin.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::classifier::MSG_NETWORK_UNAVAILABLE;
use crate::config;
use crate::error::TransactionError;
use crate::rpc::LedgerRpc;
use crate::types::{Commitment, ValidityWindow};

/// Hands out fresh validity windows.
#[derive(Clone)]
pub struct ValidityWindowProvider {
    rpc: Arc<dyn LedgerRpc>,
}

impl ValidityWindowProvider {
    /// Creates a provider over the given network handle.
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    /// Fetches a new window. `requested` is logged and otherwise ignored.
    ///
    /// Any network failure surfaces as [`TransactionError::NetworkUnavailable`]
    /// with the fixed table message. The raw fault is only logged. Nothing
    /// has been sent at this point, so the engine retries it.
    pub async fn fetch(&self, requested: Commitment) -> Result<ValidityWindow, TransactionError> {
        if requested != config::WINDOW_FETCH_COMMITMENT {
            debug!(
                requested = %requested,
                used = %config::WINDOW_FETCH_COMMITMENT,
                "overriding window commitment"
            );
        }

        match self
            .rpc
            .latest_validity_window(config::WINDOW_FETCH_COMMITMENT)
            .await
        {
            Ok(window) => {
                debug!(
                    reference_hash = %window.reference_hash,
                    expiry_height = window.expiry_height,
                    "fetched validity window"
                );
                Ok(window)
            }
            Err(fault) => {
                warn!(error = %fault, "validity window fetch failed");
                Err(TransactionError::NetworkUnavailable(
                    MSG_NETWORK_UNAVAILABLE.to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RawFault};
    use crate::simulator::SimulatedLedger;

    #[tokio::test]
    async fn always_fetches_finalized() {
        let ledger = Arc::new(SimulatedLedger::new());
        let provider = ValidityWindowProvider::new(ledger.clone());

        provider.fetch(Commitment::Processed).await.unwrap();
        provider.fetch(Commitment::Confirmed).await.unwrap();

        assert_eq!(ledger.window_fetches(), 2);
        assert_eq!(
            ledger.window_commitments(),
            vec![Commitment::Finalized, Commitment::Finalized]
        );
    }

    #[tokio::test]
    async fn consecutive_windows_differ() {
        let ledger = Arc::new(SimulatedLedger::new());
        let provider = ValidityWindowProvider::new(ledger);
        let a = provider.fetch(Commitment::Finalized).await.unwrap();
        let b = provider.fetch(Commitment::Finalized).await.unwrap();
        assert_ne!(a.reference_hash, b.reference_hash);
    }

    #[tokio::test]
    async fn network_failure_maps_to_unavailable() {
        let ledger = Arc::new(SimulatedLedger::new());
        ledger.push_window_fault(RawFault::new("connection reset by peer"));
        let provider = ValidityWindowProvider::new(ledger);

        let err = provider.fetch(Commitment::Confirmed).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkUnavailable);
        assert_eq!(err.to_string(), MSG_NETWORK_UNAVAILABLE);
    }

    #[tokio::test]
    async fn raw_fault_text_never_reaches_the_caller() {
        let ledger = Arc::new(SimulatedLedger::new());
        let raw = format!("SECRET-RPC-INTERNAL {}", "z".repeat(400));
        ledger.push_window_fault(RawFault::new(raw));
        let provider = ValidityWindowProvider::new(ledger);

        let text = provider
            .fetch(Commitment::Finalized)
            .await
            .unwrap_err()
            .to_string();
        assert!(!text.contains("SECRET-RPC-INTERNAL"));
        assert!(text.chars().count() <= config::UNKNOWN_ERROR_MAX_CHARS);
    }
}
