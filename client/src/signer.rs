//! # Signing Port
//!
//! The wallet is an external collaborator: it owns the keys, prompts the
//! user, and pushes the signed bytes to the network. This crate only asks
//! two things of it: who are you, and please send this.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RawFault;
use crate::types::{Commitment, PublicIdentity, TransactionId, TransactionRequest};

/// Options forwarded to the signer's send call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Skip the node's preflight simulation.
    pub skip_preflight: bool,
    /// Durability level for the preflight simulation.
    pub preflight_commitment: Commitment,
}

/// Signing capability supplied by the calling application.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// The connected identity, or `None` when no wallet is connected.
    /// May change between calls (users disconnect mid-flow).
    fn identity(&self) -> Option<PublicIdentity>;

    /// Signs `request` (already bound to a window) and sends it.
    /// Must fail when no identity is connected.
    async fn send(
        &self,
        request: &TransactionRequest,
        options: SendOptions,
    ) -> Result<TransactionId, RawFault>;
}
