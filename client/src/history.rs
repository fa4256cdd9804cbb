//! Caller-visible transaction history.
//!
//! Entries are created once, on success, and never mutated or removed by
//! this crate. The store is shared by every concurrent submission.

use std::fmt;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{PublicIdentity, TransactionId};

/// Which token operation produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Mint,
    Send,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mint => write!(f, "mint"),
            Self::Send => write!(f, "send"),
        }
    }
}

/// Final status recorded with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Error,
}

/// One row of the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryEntry {
    pub id: TransactionId,
    pub kind: HistoryKind,
    /// Amount in base units.
    pub amount: u64,
    pub mint_address: PublicIdentity,
    pub recipient: PublicIdentity,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub status: HistoryStatus,
}

impl TransactionHistoryEntry {
    /// A successful entry stamped with the current UTC time.
    pub fn success(
        id: TransactionId,
        kind: HistoryKind,
        amount: u64,
        mint_address: PublicIdentity,
        recipient: PublicIdentity,
    ) -> Self {
        Self {
            id,
            kind,
            amount,
            mint_address,
            recipient,
            timestamp: Utc::now().timestamp_millis(),
            status: HistoryStatus::Success,
        }
    }
}

/// Append-only history sink. Must tolerate concurrent appends.
pub trait HistoryStore: Send + Sync {
    /// Records `entry`.
    fn append(&self, entry: TransactionHistoryEntry);
}

/// Process-local history, newest first.
#[derive(Default)]
pub struct InMemoryHistory {
    entries: RwLock<Vec<TransactionHistoryEntry>>,
}

impl InMemoryHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<TransactionHistoryEntry> {
        self.entries.read().iter().rev().cloned().collect()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Entries for one operation kind, newest first.
    pub fn by_kind(&self, kind: HistoryKind) -> Vec<TransactionHistoryEntry> {
        self.entries
            .read()
            .iter()
            .rev()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

impl HistoryStore for InMemoryHistory {
    fn append(&self, entry: TransactionHistoryEntry) {
        tracing::debug!(id = %entry.id, kind = %entry.kind, amount = entry.amount, "history entry appended");
        self.entries.write().push(entry);
    }
}
