//! Mint and send, as the application sees them.
//!
//! Instruction encoding belongs to the token program and arrives here
//! already built. This facade wraps the instructions in a request, runs it
//! through the [`SubmissionEngine`], and records a history entry when (and
//! only when) the engine reports success.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::SubmissionEngine;
use crate::error::TransactionError;
use crate::history::{HistoryKind, HistoryStore, TransactionHistoryEntry};
use crate::keys::CoSigner;
use crate::signer::TransactionSigner;
use crate::types::{Instruction, PublicIdentity, SubmissionOptions, TransactionId, TransactionRequest};

/// Mint `amount` base units of `mint_address` to `recipient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub mint_address: PublicIdentity,
    pub recipient: PublicIdentity,
    /// Amount in base units.
    pub amount: u64,
    /// Pre-encoded mint instructions.
    pub instructions: Vec<Instruction>,
    /// Local keypairs that must co-sign (e.g. a newly created mint account).
    #[serde(skip)]
    pub co_signers: Vec<CoSigner>,
}

/// Transfer `amount` base units of `mint_address` to `recipient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub mint_address: PublicIdentity,
    pub recipient: PublicIdentity,
    /// Amount in base units.
    pub amount: u64,
    /// Pre-encoded transfer instructions.
    pub instructions: Vec<Instruction>,
}

/// Token operations over a shared engine and history store.
#[derive(Clone)]
pub struct TokenOperations {
    engine: SubmissionEngine,
    history: Arc<dyn HistoryStore>,
}

impl TokenOperations {
    /// Wraps `engine`; successful operations are appended to `history`.
    pub fn new(engine: SubmissionEngine, history: Arc<dyn HistoryStore>) -> Self {
        Self { engine, history }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &SubmissionEngine {
        &self.engine
    }

    /// Submits a mint and records it on success.
    pub async fn mint_tokens(
        &self,
        request: MintRequest,
        signer: &dyn TransactionSigner,
        options: &SubmissionOptions,
    ) -> Result<TransactionId, TransactionError> {
        let tx = request
            .co_signers
            .iter()
            .cloned()
            .fold(
                TransactionRequest::builder().instructions(request.instructions.iter().cloned()),
                |builder, co_signer| builder.co_signer(co_signer),
            )
            .build()?;

        let id = self.engine.submit(tx, signer, options).await?;
        info!(signature = %id, amount = request.amount, mint = %request.mint_address, "minted");
        self.history.append(TransactionHistoryEntry::success(
            id.clone(),
            HistoryKind::Mint,
            request.amount,
            request.mint_address,
            request.recipient,
        ));
        Ok(id)
    }

    /// Submits a transfer and records it on success.
    pub async fn send_tokens(
        &self,
        request: TransferRequest,
        signer: &dyn TransactionSigner,
        options: &SubmissionOptions,
    ) -> Result<TransactionId, TransactionError> {
        let tx = TransactionRequest::builder()
            .instructions(request.instructions.iter().cloned())
            .build()?;

        let id = self.engine.submit(tx, signer, options).await?;
        info!(signature = %id, amount = request.amount, recipient = %request.recipient, "sent");
        self.history.append(TransactionHistoryEntry::success(
            id.clone(),
            HistoryKind::Send,
            request.amount,
            request.mint_address,
            request.recipient,
        ));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RawFault};
    use crate::history::{HistoryStatus, InMemoryHistory};
    use crate::progress::RecordingProgressSink;
    use crate::simulator::{SimulatedLedger, SimulatedWallet};

    struct Fixture {
        wallet: SimulatedWallet,
        history: Arc<InMemoryHistory>,
        ops: TokenOperations,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(SimulatedLedger::new());
        let wallet = SimulatedWallet::connected(ledger.clone());
        let history = Arc::new(InMemoryHistory::new());
        let engine = SubmissionEngine::new(ledger, Arc::new(RecordingProgressSink::new()));
        let ops = TokenOperations::new(engine, history.clone());
        Fixture {
            wallet,
            history,
            ops,
        }
    }

    fn mint_ix() -> Instruction {
        Instruction::new(PublicIdentity::from_bytes([6; 32]), vec![], vec![7, 1])
    }

    #[tokio::test(start_paused = true)]
    async fn mint_records_history() {
        let f = fixture();
        let mint_key = CoSigner::generate();
        let request = MintRequest {
            mint_address: mint_key.identity(),
            recipient: f.wallet.key_identity(),
            amount: 1_000_000,
            instructions: vec![mint_ix()],
            co_signers: vec![mint_key.clone()],
        };

        let id = f
            .ops
            .mint_tokens(request, &f.wallet, &SubmissionOptions::default())
            .await
            .unwrap();

        let entries = f.history.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].kind, HistoryKind::Mint);
        assert_eq!(entries[0].mint_address, mint_key.identity());
        assert_eq!(entries[0].status, HistoryStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_leaves_history_untouched() {
        let f = fixture();
        f.wallet
            .push_send_fault(RawFault::new("Attempt to debit an account but found no record of a prior credit. insufficient funds"));

        let err = f
            .ops
            .send_tokens(
                TransferRequest {
                    mint_address: PublicIdentity::from_bytes([3; 32]),
                    recipient: PublicIdentity::from_bytes([4; 32]),
                    amount: 5,
                    instructions: vec![mint_ix()],
                },
                &f.wallet,
                &SubmissionOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert!(f.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_records_recipient_and_amount() {
        let f = fixture();
        let recipient = PublicIdentity::from_bytes([4; 32]);
        f.ops
            .send_tokens(
                TransferRequest {
                    mint_address: PublicIdentity::from_bytes([3; 32]),
                    recipient,
                    amount: 42,
                    instructions: vec![mint_ix()],
                },
                &f.wallet,
                &SubmissionOptions::default(),
            )
            .await
            .unwrap();

        let sends = f.history.by_kind(HistoryKind::Send);
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].recipient, recipient);
        assert_eq!(sends[0].amount, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn unencodable_request_is_refused_before_sending() {
        let f = fixture();
        let accounts = vec![PublicIdentity::from_bytes([8; 32]); 256];

        let err = f
            .ops
            .send_tokens(
                TransferRequest {
                    mint_address: PublicIdentity::from_bytes([3; 32]),
                    recipient: PublicIdentity::from_bytes([4; 32]),
                    amount: 1,
                    instructions: vec![Instruction::new(
                        PublicIdentity::from_bytes([6; 32]),
                        accounts,
                        vec![],
                    )],
                },
                &f.wallet,
                &SubmissionOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(f.wallet.sends(), 0);
        assert!(f.history.is_empty());
    }
}
