//! Error types for the submission layer.
//!
//! Two shapes live here:
//!
//! - [`RawFault`] is what collaborators (network, signer) hand back. It is
//!   unclassified and never leaves the crate's public submission API.
//! - [`TransactionError`] is the classified error callers receive. Every
//!   variant has a stable [`ErrorKind`] and a human-readable message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// RawFault
// ---------------------------------------------------------------------------

/// An unclassified fault reported by the network or the signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RawFault {
    /// The fault's top-level message.
    pub message: String,
    /// Program logs attached to the fault, if any. Classification scans
    /// these too, since the interesting line is often buried in them.
    pub logs: Vec<String>,
}

impl RawFault {
    /// Creates a fault with no logs.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            logs: Vec::new(),
        }
    }

    /// Attaches program logs.
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Stable category of a [`TransactionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    WalletNotConnected,
    WalletDisconnected,
    UserRejected,
    WindowExpired,
    NetworkTimeout,
    NetworkUnavailable,
    ExecutionFailed,
    InsufficientFunds,
    NotMintAuthority,
    AlreadyInUse,
    InvalidAccount,
    ConfirmationTimeout,
    RetriesExhausted,
    InvalidRequest,
    Unknown,
}

impl ErrorKind {
    /// Whether the engine may spend another attempt (with a fresh window)
    /// on a failure of this kind once a transaction has been sent.
    ///
    /// `NetworkUnavailable` is not in this set: after a send it cannot rule
    /// out that the transaction is still on its way. The engine retries it
    /// only when the window fetch fails, before anything went out.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::WindowExpired | Self::NetworkTimeout)
    }

    /// Label used for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WalletNotConnected => "wallet_not_connected",
            Self::WalletDisconnected => "wallet_disconnected",
            Self::UserRejected => "user_rejected",
            Self::WindowExpired => "window_expired",
            Self::NetworkTimeout => "network_timeout",
            Self::NetworkUnavailable => "network_unavailable",
            Self::ExecutionFailed => "execution_failed",
            Self::InsufficientFunds => "insufficient_funds",
            Self::NotMintAuthority => "not_mint_authority",
            Self::AlreadyInUse => "already_in_use",
            Self::InvalidAccount => "invalid_account",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::RetriesExhausted => "retries_exhausted",
            Self::InvalidRequest => "invalid_request",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TransactionError
// ---------------------------------------------------------------------------

/// The classified outcome of a failed submission.
///
/// The `Display` output is the user-facing text. Variants carrying a
/// `String` hold the message chosen by the classifier's rule table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// No wallet identity at call time. Nothing was sent.
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// The wallet went away between preparing and sending.
    #[error("Wallet disconnected before the transaction could be sent")]
    WalletDisconnected,

    /// The user declined the signing prompt.
    #[error("{0}")]
    UserRejected(String),

    /// The validity window lapsed before the transaction landed.
    #[error("{0}")]
    WindowExpired(String),

    /// A network round trip timed out.
    #[error("{0}")]
    NetworkTimeout(String),

    /// The network could not be reached at all.
    #[error("{0}")]
    NetworkUnavailable(String),

    /// The transaction landed but the program rejected it. Resubmitting
    /// would only repeat the failure.
    #[error("Transaction failed on-chain: {0}")]
    ExecutionFailed(String),

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("{0}")]
    NotMintAuthority(String),

    #[error("{0}")]
    AlreadyInUse(String),

    #[error("{0}")]
    InvalidAccount(String),

    /// Neither confirmation signal resolved before the deadline. The
    /// transaction may still land; the caller has to check.
    #[error(
        "Transaction {signature} was not confirmed within {timeout_ms}ms. \
         It may still succeed; check the explorer before retrying"
    )]
    ConfirmationTimeout {
        /// Identifier of the transaction that was sent.
        signature: String,
        /// The per-attempt deadline that elapsed.
        timeout_ms: u64,
    },

    /// Attempt budget spent without a recorded error.
    #[error("Transaction failed after {attempts} attempts")]
    RetriesExhausted {
        /// How many attempts were made.
        attempts: u32,
    },

    /// The request could not be encoded. Nothing was sent.
    #[error("Invalid transaction: {0}")]
    InvalidRequest(String),

    /// Nothing in the rule table matched. Carries truncated raw text.
    #[error("Transaction failed: {0}")]
    Unknown(String),
}

impl TransactionError {
    /// Builds the error for `kind` with the given message.
    ///
    /// For kinds with structured payloads (`ConfirmationTimeout`,
    /// `RetriesExhausted`) the message is ignored and zeroed fields are
    /// used; the engine and resolver construct those variants directly.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::WalletNotConnected => Self::WalletNotConnected,
            ErrorKind::WalletDisconnected => Self::WalletDisconnected,
            ErrorKind::UserRejected => Self::UserRejected(message),
            ErrorKind::WindowExpired => Self::WindowExpired(message),
            ErrorKind::NetworkTimeout => Self::NetworkTimeout(message),
            ErrorKind::NetworkUnavailable => Self::NetworkUnavailable(message),
            ErrorKind::ExecutionFailed => Self::ExecutionFailed(message),
            ErrorKind::InsufficientFunds => Self::InsufficientFunds(message),
            ErrorKind::NotMintAuthority => Self::NotMintAuthority(message),
            ErrorKind::AlreadyInUse => Self::AlreadyInUse(message),
            ErrorKind::InvalidAccount => Self::InvalidAccount(message),
            ErrorKind::ConfirmationTimeout => Self::ConfirmationTimeout {
                signature: String::new(),
                timeout_ms: 0,
            },
            ErrorKind::RetriesExhausted => Self::RetriesExhausted { attempts: 0 },
            ErrorKind::InvalidRequest => Self::InvalidRequest(message),
            ErrorKind::Unknown => Self::Unknown(message),
        }
    }

    /// The stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WalletNotConnected => ErrorKind::WalletNotConnected,
            Self::WalletDisconnected => ErrorKind::WalletDisconnected,
            Self::UserRejected(_) => ErrorKind::UserRejected,
            Self::WindowExpired(_) => ErrorKind::WindowExpired,
            Self::NetworkTimeout(_) => ErrorKind::NetworkTimeout,
            Self::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            Self::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
            Self::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Self::NotMintAuthority(_) => ErrorKind::NotMintAuthority,
            Self::AlreadyInUse(_) => ErrorKind::AlreadyInUse,
            Self::InvalidAccount(_) => ErrorKind::InvalidAccount,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Shorthand for `self.kind().is_retryable()`.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// `true` when the outcome is genuinely unknown: the transaction may
    /// have landed and the caller must verify before acting.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. })
    }
}
