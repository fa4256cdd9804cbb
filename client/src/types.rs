//! Core type definitions for the submission layer.
//!
//! These types are the vocabulary shared by the engine, the resolver and
//! the collaborator traits. Anything that crosses a trait boundary lives
//! here so the ports stay free of engine internals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config;
use crate::error::{ErrorKind, TransactionError};
use crate::keys::CoSigner;
use crate::signer::SendOptions;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to parse an identity or a commitment level from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid base58 identity: {0}")]
    InvalidBase58(String),

    #[error("identity must be {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("unknown commitment level: {0}")]
    UnknownCommitment(String),
}

/// A request whose canonical encoding would not fit its length prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("too many instructions: {count} (max {max})", max = u16::MAX)]
    TooManyInstructions { count: usize },

    #[error("instruction {index} has {count} accounts (max {max})", max = u8::MAX)]
    TooManyAccounts { index: usize, count: usize },

    #[error("instruction {index} carries {len} data bytes (max {max})", max = u32::MAX)]
    DataTooLong { index: usize, len: usize },
}

impl From<RequestError> for TransactionError {
    fn from(err: RequestError) -> Self {
        TransactionError::InvalidRequest(err.to_string())
    }
}

/// Submission options that parse but cannot be honoured.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("malformed options: {0}")]
    Json(#[from] serde_json::Error),

    #[error("maxRetries must be at least 1")]
    ZeroRetries,

    #[error("maxTimeoutMs must be greater than zero")]
    ZeroTimeout,
}

// ---------------------------------------------------------------------------
// Commitment
// ---------------------------------------------------------------------------

/// Durability level the network guarantees for a piece of state.
///
/// Ordered weakest to strongest, so `Commitment::Confirmed >= Commitment::Processed`
/// reads the way you would expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Seen by the node we talked to. May still be rolled back.
    Processed,
    /// Voted on by a supermajority.
    Confirmed,
    /// Rooted. Not going anywhere.
    Finalized,
}

impl Commitment {
    /// The strongest durability level the network offers.
    pub fn strongest() -> Self {
        Self::Finalized
    }

    /// Returns `true` if `self` satisfies a requirement of `required`.
    pub fn satisfies(self, required: Commitment) -> bool {
        self >= required
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => write!(f, "processed"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

impl std::str::FromStr for Commitment {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(ParseError::UnknownCommitment(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PublicIdentity
// ---------------------------------------------------------------------------

/// A 32-byte Ed25519 public key: fee payers, signers, mints, recipients.
///
/// Displayed and serialized as base58, which is what users paste around.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PublicIdentity([u8; 32]);

impl PublicIdentity {
    /// Wraps raw public key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base58 representation.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Parses a base58-encoded public key.
    pub fn from_base58(s: &str) -> Result<Self, ParseError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| ParseError::InvalidBase58(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParseError::WrongLength {
                expected: 32,
                got: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b58 = self.to_base58();
        write!(f, "PublicIdentity({}..)", &b58[..b58.len().min(8)])
    }
}

impl From<PublicIdentity> for String {
    fn from(id: PublicIdentity) -> Self {
        id.to_base58()
    }
}

impl TryFrom<String> for PublicIdentity {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_base58(&s)
    }
}

impl std::str::FromStr for PublicIdentity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// The identifier the network knows a sent transaction by (its first
/// signature, base58-encoded). Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps an identifier returned by a signer or the network.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Instruction
// ---------------------------------------------------------------------------

/// One opaque program call. Encoding is the caller's business; the
/// submission layer only orders, signs over, and ships these bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Program that executes the instruction.
    pub program_id: PublicIdentity,
    /// Accounts the instruction touches, in program-defined order.
    pub accounts: Vec<PublicIdentity>,
    /// Program-specific instruction data.
    pub data: Vec<u8>,
}

impl Instruction {
    /// Creates a new instruction.
    pub fn new(program_id: PublicIdentity, accounts: Vec<PublicIdentity>, data: Vec<u8>) -> Self {
        Self {
            program_id,
            accounts,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// ValidityWindow
// ---------------------------------------------------------------------------

/// A time-bounded admission ticket: a recent reference hash plus the last
/// block height at which a transaction carrying it may still be included.
///
/// Immutable once issued. Retries get a new window; they never edit this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// Recent block hash the transaction is anchored to.
    pub reference_hash: String,
    /// Last block height at which the transaction is still admissible.
    pub expiry_height: u64,
}

impl ValidityWindow {
    /// Creates a new window.
    pub fn new(reference_hash: impl Into<String>, expiry_height: u64) -> Self {
        Self {
            reference_hash: reference_hash.into(),
            expiry_height,
        }
    }

    /// Returns `true` once the network has advanced past `expiry_height`.
    pub fn is_expired_at(&self, current_height: u64) -> bool {
        current_height > self.expiry_height
    }
}

// ---------------------------------------------------------------------------
// TransactionRequest
// ---------------------------------------------------------------------------

/// A transaction being submitted: ordered instructions, a fee payer, and
/// the mutable per-attempt state (validity window and signatures).
///
/// Owned by exactly one in-flight submission. [`bind_window`](Self::bind_window)
/// is the only way the window changes, and it wipes every signature made
/// over the previous one.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    instructions: Vec<Instruction>,
    fee_payer: Option<PublicIdentity>,
    validity_window: Option<ValidityWindow>,
    signatures: Vec<(PublicIdentity, Vec<u8>)>,
    co_signers: Vec<CoSigner>,
}

impl TransactionRequest {
    /// Starts a builder.
    pub fn builder() -> TransactionRequestBuilder {
        TransactionRequestBuilder::default()
    }

    /// The ordered instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The fee payer, if one has been set or bound.
    pub fn fee_payer(&self) -> Option<&PublicIdentity> {
        self.fee_payer.as_ref()
    }

    /// The currently bound window, if any.
    pub fn validity_window(&self) -> Option<&ValidityWindow> {
        self.validity_window.as_ref()
    }

    /// Signatures collected over the current window.
    pub fn signatures(&self) -> &[(PublicIdentity, Vec<u8>)] {
        &self.signatures
    }

    /// Number of local co-signers attached to the request.
    pub fn co_signer_count(&self) -> usize {
        self.co_signers.len()
    }

    /// Binds a fresh window and fee payer, then re-signs with every local
    /// co-signer. Signatures made over the previous window are discarded.
    pub fn bind_window(&mut self, window: ValidityWindow, fee_payer: PublicIdentity) {
        self.validity_window = Some(window);
        self.fee_payer = Some(fee_payer);
        self.signatures.clear();

        if let Some(message) = self.message_bytes() {
            for co_signer in &self.co_signers {
                let signature = co_signer.sign(&message);
                self.signatures
                    .push((co_signer.identity(), signature.to_bytes().to_vec()));
            }
        }
    }

    /// Canonical bytes every signer signs over.
    ///
    /// Layout: reference hash, `0x00`, expiry height (u64 LE), fee payer
    /// (32 bytes), instruction count (u16 LE), then per instruction the
    /// program id, account count (u8) and accounts, data length (u32 LE)
    /// and data.
    ///
    /// Returns `None` until both a window and a fee payer are bound. The
    /// builder rejects requests whose counts overflow their prefixes, so a
    /// built request always encodes.
    pub fn message_bytes(&self) -> Option<Vec<u8>> {
        let window = self.validity_window.as_ref()?;
        let fee_payer = self.fee_payer.as_ref()?;

        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(window.reference_hash.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&window.expiry_height.to_le_bytes());
        buf.extend_from_slice(fee_payer.as_bytes());
        buf.extend_from_slice(&u16::try_from(self.instructions.len()).ok()?.to_le_bytes());

        for ix in &self.instructions {
            buf.extend_from_slice(ix.program_id.as_bytes());
            buf.push(u8::try_from(ix.accounts.len()).ok()?);
            for account in &ix.accounts {
                buf.extend_from_slice(account.as_bytes());
            }
            buf.extend_from_slice(&u32::try_from(ix.data.len()).ok()?.to_le_bytes());
            buf.extend_from_slice(&ix.data);
        }

        Some(buf)
    }

    /// Records a signature produced outside the request (e.g. by a wallet).
    pub fn add_signature(&mut self, signer: PublicIdentity, signature: Vec<u8>) {
        self.signatures.push((signer, signature));
    }
}

/// Fluent builder for [`TransactionRequest`].
#[derive(Default)]
pub struct TransactionRequestBuilder {
    instructions: Vec<Instruction>,
    fee_payer: Option<PublicIdentity>,
    co_signers: Vec<CoSigner>,
}

impl TransactionRequestBuilder {
    /// Appends an instruction. Order is preserved.
    pub fn instruction(mut self, ix: Instruction) -> Self {
        self.instructions.push(ix);
        self
    }

    /// Appends several instructions.
    pub fn instructions(mut self, ixs: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(ixs);
        self
    }

    /// Sets the designated fee payer. The engine overrides this with the
    /// signer's identity when binding a window.
    pub fn fee_payer(mut self, fee_payer: PublicIdentity) -> Self {
        self.fee_payer = Some(fee_payer);
        self
    }

    /// Attaches a local co-signer (e.g. a freshly generated mint keypair).
    pub fn co_signer(mut self, co_signer: CoSigner) -> Self {
        self.co_signers.push(co_signer);
        self
    }

    /// Builds the request. No window is bound yet.
    ///
    /// Fails if any count exceeds its length prefix in
    /// [`TransactionRequest::message_bytes`].
    pub fn build(self) -> Result<TransactionRequest, RequestError> {
        if u16::try_from(self.instructions.len()).is_err() {
            return Err(RequestError::TooManyInstructions {
                count: self.instructions.len(),
            });
        }
        for (index, ix) in self.instructions.iter().enumerate() {
            if u8::try_from(ix.accounts.len()).is_err() {
                return Err(RequestError::TooManyAccounts {
                    index,
                    count: ix.accounts.len(),
                });
            }
            if u32::try_from(ix.data.len()).is_err() {
                return Err(RequestError::DataTooLong {
                    index,
                    len: ix.data.len(),
                });
            }
        }

        Ok(TransactionRequest {
            instructions: self.instructions,
            fee_payer: self.fee_payer,
            validity_window: None,
            signatures: Vec::new(),
            co_signers: self.co_signers,
        })
    }
}

// ---------------------------------------------------------------------------
// SubmissionOptions
// ---------------------------------------------------------------------------

/// Caller-tunable knobs for one submission. Every field is optional on the
/// wire and falls back to the constants in [`crate::config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionOptions {
    /// Upper bound on attempts (each with its own window).
    pub max_retries: u32,
    /// Skip server-side simulation before admission.
    pub skip_preflight: bool,
    /// Durability level used for the preflight simulation.
    pub preflight_commitment: Commitment,
    /// Durability level the transaction must reach to count as confirmed.
    pub confirm_commitment: Commitment,
    /// Per-attempt confirmation deadline in milliseconds.
    pub max_timeout_ms: u64,
}

impl Default for SubmissionOptions {
    fn default() -> Self {
        Self {
            max_retries: config::DEFAULT_MAX_RETRIES,
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
            confirm_commitment: Commitment::Confirmed,
            max_timeout_ms: config::DEFAULT_MAX_TIMEOUT_MS,
        }
    }
}

impl SubmissionOptions {
    /// Parses options from JSON, filling missing fields with defaults, and
    /// validates the result.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks `maxRetries >= 1` and `maxTimeoutMs > 0`.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_retries == 0 {
            return Err(OptionsError::ZeroRetries);
        }
        if self.max_timeout_ms == 0 {
            return Err(OptionsError::ZeroTimeout);
        }
        Ok(())
    }

    /// Sets the attempt budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the per-attempt confirmation deadline.
    pub fn with_max_timeout_ms(mut self, max_timeout_ms: u64) -> Self {
        self.max_timeout_ms = max_timeout_ms;
        self
    }

    /// Sets the confirmation durability level.
    pub fn with_confirm_commitment(mut self, commitment: Commitment) -> Self {
        self.confirm_commitment = commitment;
        self
    }

    /// Per-attempt confirmation deadline as a `Duration`.
    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    /// The subset of options the signer forwards with the send call.
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            skip_preflight: self.skip_preflight,
            preflight_commitment: self.preflight_commitment,
        }
    }
}

// ---------------------------------------------------------------------------
// AttemptRecord
// ---------------------------------------------------------------------------

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Still running.
    InFlight,
    /// Confirmed; the loop is done.
    Confirmed,
    /// Failed with a retryable category; another attempt may follow.
    Retryable(ErrorKind),
    /// Failed with a terminal category.
    Terminal(ErrorKind),
}

/// Ephemeral bookkeeping for one pass through the retry loop. Logged when
/// the attempt ends and dropped; never persisted.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// 1-based attempt ordinal.
    pub attempt: u32,
    /// Window the attempt was signed under, once fetched.
    pub window: Option<ValidityWindow>,
    /// Identifier returned by the signer, if the send succeeded.
    pub transaction_id: Option<TransactionId>,
    /// Terminal state of the attempt.
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    /// Opens a record for attempt `attempt`.
    pub fn start(attempt: u32) -> Self {
        Self {
            attempt,
            window: None,
            transaction_id: None,
            outcome: AttemptOutcome::InFlight,
        }
    }

    /// Closes the record with its outcome and emits it to the log.
    pub fn finish(mut self, outcome: AttemptOutcome) {
        self.outcome = outcome;
        tracing::debug!(
            attempt = self.attempt,
            expiry_height = self.window.as_ref().map(|w| w.expiry_height),
            signature = self.transaction_id.as_ref().map(|id| id.as_str()),
            outcome = ?self.outcome,
            "attempt finished"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
