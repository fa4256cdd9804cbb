//! # Submission Configuration & Constants
//!
//! Every magic number in the submission layer lives here. Defaults for
//! [`SubmissionOptions`](crate::types::SubmissionOptions) are read from these
//! constants, and so is the backoff schedule.

use std::time::Duration;

use crate::types::Commitment;

// ---------------------------------------------------------------------------
// Retry Loop
// ---------------------------------------------------------------------------

/// Default number of attempts per submission. Each attempt gets its own
/// freshly fetched validity window.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-attempt confirmation deadline, in milliseconds.
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 60_000;

/// Durability level every validity window is fetched at, regardless of
/// what the caller asked to confirm at. Weaker levels hand out windows
/// that can expire before the wallet has even finished asking the user.
pub const WINDOW_FETCH_COMMITMENT: Commitment = Commitment::Finalized;

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Delay before the first retry (attempt 2).
pub const BACKOFF_BASE_MS: u64 = 1_000;

/// Growth factor between consecutive retries.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound on any single backoff delay.
pub const BACKOFF_CAP_MS: u64 = 8_000;

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

/// How often the resolver polls signature status while the subscription
/// is still pending.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Floor for a caller-supplied poll interval. A zero period is not a valid
/// timer interval.
pub const MIN_STATUS_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Error Presentation
// ---------------------------------------------------------------------------

/// Maximum length (in characters) of raw fault text surfaced through
/// [`TransactionError::Unknown`](crate::error::TransactionError::Unknown).
pub const UNKNOWN_ERROR_MAX_CHARS: usize = 100;
