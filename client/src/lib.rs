// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Client: Submission & Confirmation Layer
//!
//! Getting a signed transfer *onto* a ledger is the easy part. Getting a
//! single, honest answer back ("it landed", or "it did not, and here is
//! why") is where wallets quietly lie to their users. This crate is the
//! part of the NOVA client stack that refuses to lie.
//!
//! Given a set of instructions and a signer, the [`SubmissionEngine`]
//! binds a fresh validity window, sends, confirms through two independent
//! signals, and retries with a new window when the old one expired while
//! the user was staring at their wallet. Whatever happens, the caller gets
//! exactly one outcome: a [`TransactionId`] or a classified
//! [`TransactionError`].
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **classifier**: Raw fault text to a fixed, user-facing taxonomy.
//! - **window**: Fetches fresh validity windows, always at `finalized`.
//! - **confirmation**: Subscription + status lookup, raced against a deadline.
//! - **engine**: The retry loop. Owns backoff, progress, and classification.
//! - **operations**: Mint/send facade that records history on success.
//!
//! The network, the signer, the progress display, and the history store
//! are all collaborators behind traits ([`LedgerRpc`], [`TransactionSigner`],
//! [`ProgressSink`], [`HistoryStore`]). The [`simulator`] module ships
//! scriptable implementations of the first two for tests and the CLI.
//!
//! ## Design Philosophy
//!
//! 1. One submission, one terminal notification. No stacked stale toasts.
//! 2. A stale window is never signed twice.
//! 3. "We don't know" is an answer ([`TransactionError::ConfirmationTimeout`]),
//!    and it is never dressed up as success or failure.
//! 4. Raw network errors never escape. Everything is classified first.

pub mod backoff;
pub mod classifier;
pub mod config;
pub mod confirmation;
pub mod engine;
pub mod error;
pub mod history;
pub mod keys;
pub mod metrics;
pub mod operations;
pub mod progress;
pub mod rpc;
pub mod signer;
pub mod simulator;
pub mod types;
pub mod window;

pub use backoff::BackoffPolicy;
pub use classifier::{classify, ErrorClassifier};
pub use confirmation::{ConfirmationResolver, ConfirmationSource};
pub use engine::SubmissionEngine;
pub use error::{ErrorKind, RawFault, TransactionError};
pub use history::{
    HistoryKind, HistoryStatus, HistoryStore, InMemoryHistory, TransactionHistoryEntry,
};
pub use keys::{CoSigner, KeyError};
pub use metrics::SubmissionMetrics;
pub use operations::{MintRequest, TokenOperations, TransferRequest};
pub use progress::{
    NotificationHandle, NotificationKind, ProgressEvent, ProgressSink, ProgressTracker,
    RecordingProgressSink, TracingProgressSink,
};
pub use rpc::{ConfirmationOutcome, LedgerRpc, SignatureStatus};
pub use signer::{SendOptions, TransactionSigner};
pub use types::{
    AttemptOutcome, AttemptRecord, Commitment, Instruction, OptionsError, ParseError,
    PublicIdentity, RequestError, SubmissionOptions, TransactionId, TransactionRequest,
    TransactionRequestBuilder, ValidityWindow,
};
pub use window::ValidityWindowProvider;
