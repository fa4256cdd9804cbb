//! # Network-Access Port
//!
//! The three ledger calls the submission layer needs, behind a trait so the
//! engine never knows which RPC client (or simulator) it is talking to.
//!
//! | Call                      | Used by                     |
//! |---------------------------|-----------------------------|
//! | `latest_validity_window`  | `ValidityWindowProvider`    |
//! | `confirm`                 | `ConfirmationResolver` (a)  |
//! | `signature_status`        | `ConfirmationResolver` (b)  |
//!
//! Implementations report failures as [`RawFault`]; classification happens
//! on this side of the boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RawFault;
use crate::types::{Commitment, TransactionId, ValidityWindow};

/// Result of a subscription-style confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationOutcome {
    /// Program-level execution error, if the transaction landed but failed.
    pub err: Option<String>,
}

impl ConfirmationOutcome {
    /// Landed and executed cleanly.
    pub fn ok() -> Self {
        Self { err: None }
    }

    /// Landed, but the program rejected it.
    pub fn failed(err: impl Into<String>) -> Self {
        Self {
            err: Some(err.into()),
        }
    }
}

/// Point-in-time status of a known transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    /// Slot the transaction was processed in.
    pub slot: u64,
    /// Durability level reached so far, if the node reports one.
    pub confirmation_status: Option<Commitment>,
    /// Program-level execution error, if any.
    pub err: Option<String>,
}

/// Network-access capability consumed by the submission layer.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Fetches a fresh `(reference hash, expiry height)` pair.
    async fn latest_validity_window(
        &self,
        commitment: Commitment,
    ) -> Result<ValidityWindow, RawFault>;

    /// Waits until `id` reaches `commitment`, or fails early if the network
    /// reports `window` expired first.
    async fn confirm(
        &self,
        id: &TransactionId,
        window: &ValidityWindow,
        commitment: Commitment,
    ) -> Result<ConfirmationOutcome, RawFault>;

    /// Looks up `id` once. `Ok(None)` means the node has never seen it.
    async fn signature_status(
        &self,
        id: &TransactionId,
        search_history: bool,
    ) -> Result<Option<SignatureStatus>, RawFault>;
}
