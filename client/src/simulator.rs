//! # Devnet Simulator
//!
//! In-memory stand-ins for the two network-facing collaborators:
//!
//! - [`SimulatedLedger`] implements [`LedgerRpc`]. It hands out windows
//!   from an advancing block height, tracks which transactions landed, and
//!   replays scripted faults in FIFO order.
//! - [`SimulatedWallet`] implements [`TransactionSigner`]. It signs the
//!   request's message bytes with a real Ed25519 key (the signature *is*
//!   the transaction id), hands the result to the ledger, and can be told
//!   to fail or to disconnect halfway through a submission.
//!
//! Nothing here sleeps except a hanging confirmation, which waits forever
//! so tests can exercise deadlines with paused tokio time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::RawFault;
use crate::keys::CoSigner;
use crate::rpc::{ConfirmationOutcome, LedgerRpc, SignatureStatus};
use crate::signer::{SendOptions, TransactionSigner};
use crate::types::{Commitment, PublicIdentity, TransactionId, TransactionRequest, ValidityWindow};

/// Blocks a freshly issued window stays valid for.
pub const DEFAULT_VALIDITY_SPAN: u64 = 150;

/// Height the simulated chain starts at.
pub const GENESIS_HEIGHT: u64 = 1_000;

// ---------------------------------------------------------------------------
// Scripted Behaviours
// ---------------------------------------------------------------------------

/// What the next `confirm` call does.
#[derive(Debug, Clone)]
pub enum ConfirmBehavior {
    /// Report success regardless of ledger state.
    Confirmed,
    /// Report a program-level execution error.
    ExecutionError(String),
    /// Fail the call with a fault.
    Fault(RawFault),
    /// Never return.
    Hang,
}

/// What the next `signature_status` call does.
#[derive(Debug, Clone)]
pub enum StatusBehavior {
    /// Return this status.
    Found(SignatureStatus),
    /// Report the signature as unknown.
    NotFound,
    /// Fail the call with a fault.
    Fault(RawFault),
}

// ---------------------------------------------------------------------------
// SimulatedLedger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    height: u64,
    validity_span: u64,
    windows_issued: u64,
    window_faults: VecDeque<RawFault>,
    confirm_script: VecDeque<ConfirmBehavior>,
    status_script: VecDeque<StatusBehavior>,
    drop_next: u32,
    execution_failures: VecDeque<String>,
    landed: HashMap<TransactionId, (u64, Option<String>)>,
    window_commitments: Vec<Commitment>,
    confirm_calls: u32,
    status_history_flags: Vec<bool>,
}

/// Scriptable in-memory ledger.
pub struct SimulatedLedger {
    state: Mutex<LedgerState>,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLedger {
    /// A ledger at [`GENESIS_HEIGHT`] issuing windows valid for
    /// [`DEFAULT_VALIDITY_SPAN`] blocks.
    pub fn new() -> Self {
        Self::with_validity_span(DEFAULT_VALIDITY_SPAN)
    }

    /// A ledger issuing windows valid for `span` blocks.
    pub fn with_validity_span(span: u64) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                height: GENESIS_HEIGHT,
                validity_span: span,
                ..Default::default()
            }),
        }
    }

    /// Fails the next window fetch with `fault`.
    pub fn push_window_fault(&self, fault: RawFault) {
        self.state.lock().window_faults.push_back(fault);
    }

    /// Queues the behaviour of the next `confirm` call.
    pub fn push_confirm(&self, behavior: ConfirmBehavior) {
        self.state.lock().confirm_script.push_back(behavior);
    }

    /// Queues the behaviour of the next `signature_status` call.
    pub fn push_status(&self, behavior: StatusBehavior) {
        self.state.lock().status_script.push_back(behavior);
    }

    /// The next `n` submitted transactions never land.
    pub fn drop_next_transactions(&self, n: u32) {
        self.state.lock().drop_next += n;
    }

    /// The next landed transaction carries a program error.
    pub fn fail_next_execution(&self, err: impl Into<String>) {
        self.state.lock().execution_failures.push_back(err.into());
    }

    /// Moves the chain forward by `blocks`.
    pub fn advance_height(&self, blocks: u64) {
        self.state.lock().height += blocks;
    }

    /// Current block height.
    pub fn current_height(&self) -> u64 {
        self.state.lock().height
    }

    /// Called by the wallet when a transaction reaches the network.
    /// Returns `true` if it landed.
    pub fn accept_transaction(&self, id: &TransactionId) -> bool {
        let mut state = self.state.lock();
        if state.drop_next > 0 {
            state.drop_next -= 1;
            return false;
        }
        let err = state.execution_failures.pop_front();
        let slot = state.height;
        state.landed.insert(id.clone(), (slot, err));
        true
    }

    /// Whether `id` landed.
    pub fn is_landed(&self, id: &TransactionId) -> bool {
        self.state.lock().landed.contains_key(id)
    }

    /// Number of landed transactions.
    pub fn landed_count(&self) -> usize {
        self.state.lock().landed.len()
    }

    /// Number of window fetches served (successful or not).
    pub fn window_fetches(&self) -> usize {
        self.state.lock().window_commitments.len()
    }

    /// Commitment levels requested by each window fetch, in order.
    pub fn window_commitments(&self) -> Vec<Commitment> {
        self.state.lock().window_commitments.clone()
    }

    /// Number of `confirm` calls.
    pub fn confirm_calls(&self) -> u32 {
        self.state.lock().confirm_calls
    }

    /// Number of `signature_status` calls.
    pub fn status_calls(&self) -> usize {
        self.state.lock().status_history_flags.len()
    }

    /// The `search_history` flag of every status call, in order.
    pub fn status_history_flags(&self) -> Vec<bool> {
        self.state.lock().status_history_flags.clone()
    }

    fn window_hash(counter: u64) -> String {
        let digest = Sha256::digest(counter.to_le_bytes());
        bs58::encode(digest).into_string()
    }
}

#[async_trait]
impl LedgerRpc for SimulatedLedger {
    async fn latest_validity_window(
        &self,
        commitment: Commitment,
    ) -> Result<ValidityWindow, RawFault> {
        let mut state = self.state.lock();
        state.window_commitments.push(commitment);
        if let Some(fault) = state.window_faults.pop_front() {
            return Err(fault);
        }
        state.windows_issued += 1;
        state.height += 1;
        let hash = Self::window_hash(state.windows_issued);
        Ok(ValidityWindow::new(hash, state.height + state.validity_span))
    }

    async fn confirm(
        &self,
        id: &TransactionId,
        window: &ValidityWindow,
        _commitment: Commitment,
    ) -> Result<ConfirmationOutcome, RawFault> {
        let behavior = {
            let mut state = self.state.lock();
            state.confirm_calls += 1;
            match state.confirm_script.pop_front() {
                Some(behavior) => behavior,
                None => match state.landed.get(id) {
                    Some((_, Some(err))) => ConfirmBehavior::ExecutionError(err.clone()),
                    Some((_, None)) => ConfirmBehavior::Confirmed,
                    None => {
                        // Never landed: the chain runs past the window.
                        state.height = state.height.max(window.expiry_height + 1);
                        ConfirmBehavior::Fault(RawFault::new(format!(
                            "Signature {} has expired: block height exceeded.",
                            id
                        )))
                    }
                },
            }
        };

        match behavior {
            ConfirmBehavior::Confirmed => Ok(ConfirmationOutcome::ok()),
            ConfirmBehavior::ExecutionError(err) => Ok(ConfirmationOutcome::failed(err)),
            ConfirmBehavior::Fault(fault) => Err(fault),
            ConfirmBehavior::Hang => {
                futures::future::pending::<Result<ConfirmationOutcome, RawFault>>().await
            }
        }
    }

    async fn signature_status(
        &self,
        id: &TransactionId,
        search_history: bool,
    ) -> Result<Option<SignatureStatus>, RawFault> {
        let mut state = self.state.lock();
        state.status_history_flags.push(search_history);
        match state.status_script.pop_front() {
            Some(StatusBehavior::Found(status)) => Ok(Some(status)),
            Some(StatusBehavior::NotFound) => Ok(None),
            Some(StatusBehavior::Fault(fault)) => Err(fault),
            None => Ok(state.landed.get(id).map(|(slot, err)| SignatureStatus {
                slot: *slot,
                confirmation_status: Some(Commitment::Confirmed),
                err: err.clone(),
            })),
        }
    }
}

// ---------------------------------------------------------------------------
// SimulatedWallet
// ---------------------------------------------------------------------------

struct WalletState {
    connected: bool,
    identity_checks_left: Option<u32>,
    send_faults: VecDeque<RawFault>,
    sent: Vec<(TransactionId, ValidityWindow, SendOptions)>,
}

/// Scriptable wallet adapter backed by a real Ed25519 key.
pub struct SimulatedWallet {
    key: CoSigner,
    ledger: Option<Arc<SimulatedLedger>>,
    state: Mutex<WalletState>,
}

impl SimulatedWallet {
    /// A connected wallet that lands its transactions on `ledger`.
    pub fn connected(ledger: Arc<SimulatedLedger>) -> Self {
        Self::build(CoSigner::generate(), Some(ledger), true)
    }

    /// A connected wallet with a deterministic key.
    pub fn from_seed(seed: &[u8; 32], ledger: Arc<SimulatedLedger>) -> Self {
        Self::with_key(CoSigner::from_seed(seed), ledger)
    }

    /// A connected wallet signing with `key`.
    pub fn with_key(key: CoSigner, ledger: Arc<SimulatedLedger>) -> Self {
        Self::build(key, Some(ledger), true)
    }

    /// A wallet with nothing connected.
    pub fn disconnected() -> Self {
        Self::build(CoSigner::generate(), None, false)
    }

    fn build(key: CoSigner, ledger: Option<Arc<SimulatedLedger>>, connected: bool) -> Self {
        Self {
            key,
            ledger,
            state: Mutex::new(WalletState {
                connected,
                identity_checks_left: None,
                send_faults: VecDeque::new(),
                sent: Vec::new(),
            }),
        }
    }

    /// The key's identity, connected or not.
    pub fn key_identity(&self) -> PublicIdentity {
        self.key.identity()
    }

    /// Disconnects immediately.
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    /// Reports the identity for the next `n` `identity()` calls, then
    /// disconnects. Models a user closing the wallet mid-approval.
    pub fn disconnect_after_identity_checks(&self, n: u32) {
        self.state.lock().identity_checks_left = Some(n);
    }

    /// Fails the next send with `fault`.
    pub fn push_send_fault(&self, fault: RawFault) {
        self.state.lock().send_faults.push_back(fault);
    }

    /// Number of successful sends.
    pub fn sends(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Windows each successful send was signed under, in order.
    pub fn sent_windows(&self) -> Vec<ValidityWindow> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|(_, window, _)| window.clone())
            .collect()
    }

    /// Send options passed with each successful send.
    pub fn sent_options(&self) -> Vec<SendOptions> {
        self.state.lock().sent.iter().map(|(_, _, o)| *o).collect()
    }
}

#[async_trait]
impl TransactionSigner for SimulatedWallet {
    fn identity(&self) -> Option<PublicIdentity> {
        let mut state = self.state.lock();
        if let Some(left) = state.identity_checks_left {
            if left == 0 {
                state.connected = false;
                state.identity_checks_left = None;
            } else {
                state.identity_checks_left = Some(left - 1);
            }
        }
        state.connected.then(|| self.key.identity())
    }

    async fn send(
        &self,
        request: &TransactionRequest,
        options: SendOptions,
    ) -> Result<TransactionId, RawFault> {
        let window = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(RawFault::new("Wallet not connected"));
            }
            if let Some(fault) = state.send_faults.pop_front() {
                return Err(fault);
            }
            request
                .validity_window()
                .cloned()
                .ok_or_else(|| RawFault::new("Transaction recentBlockhash required"))?
        };

        let message = request
            .message_bytes()
            .ok_or_else(|| RawFault::new("Transaction fee payer required"))?;
        let signature = self.key.sign(&message);
        let id = TransactionId::new(bs58::encode(signature.to_bytes()).into_string());

        if let Some(ledger) = &self.ledger {
            ledger.accept_transaction(&id);
        }
        self.state.lock().sent.push((id.clone(), window, options));
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
