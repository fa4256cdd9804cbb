//! # Error Classification
//!
//! Maps raw fault text to the fixed [`ErrorKind`] taxonomy and picks the
//! message the user actually sees. The rule table below is the single
//! source of truth for user-facing error text: add a row, don't add a
//! branch somewhere else.
//!
//! Matching is a case-insensitive substring search over the fault message
//! and its program logs. Rules are tried in order and the first hit wins,
//! so put specific patterns above general ones.

use crate::config;
use crate::error::{ErrorKind, RawFault, TransactionError};

// ---------------------------------------------------------------------------
// Rule Table
// ---------------------------------------------------------------------------

/// One row of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    /// Lowercase substring to look for.
    pub pattern: &'static str,
    /// Category assigned on a match.
    pub kind: ErrorKind,
    /// User-facing message for the category.
    pub message: &'static str,
}

const fn rule(pattern: &'static str, kind: ErrorKind, message: &'static str) -> ClassificationRule {
    ClassificationRule {
        pattern,
        kind,
        message,
    }
}

const MSG_USER_REJECTED: &str = "Transaction was rejected in the wallet";
const MSG_INSUFFICIENT_FUNDS: &str =
    "Insufficient balance to cover this transaction and its network fees";
const MSG_NOT_MINT_AUTHORITY: &str = "The connected wallet is not the mint authority for this token";
const MSG_ALREADY_IN_USE: &str = "Account already exists; use a different address";
const MSG_WINDOW_EXPIRED: &str =
    "Transaction expired before it was processed. Please try again";
const MSG_NETWORK_TIMEOUT: &str = "The network took too long to respond. Please try again";
pub(crate) const MSG_NETWORK_UNAVAILABLE: &str = "Unable to reach the network. Check your connection";
const MSG_INVALID_ACCOUNT: &str = "One of the accounts is invalid or does not exist";

/// Built-in rules, in priority order.
pub const DEFAULT_RULES: &[ClassificationRule] = &[
    rule("user rejected", ErrorKind::UserRejected, MSG_USER_REJECTED),
    rule("rejected the request", ErrorKind::UserRejected, MSG_USER_REJECTED),
    rule("insufficient funds", ErrorKind::InsufficientFunds, MSG_INSUFFICIENT_FUNDS),
    rule("insufficient lamports", ErrorKind::InsufficientFunds, MSG_INSUFFICIENT_FUNDS),
    rule("not the mint authority", ErrorKind::NotMintAuthority, MSG_NOT_MINT_AUTHORITY),
    rule("owner does not match", ErrorKind::NotMintAuthority, MSG_NOT_MINT_AUTHORITY),
    rule("already in use", ErrorKind::AlreadyInUse, MSG_ALREADY_IN_USE),
    rule("blockhash not found", ErrorKind::WindowExpired, MSG_WINDOW_EXPIRED),
    rule("block height exceeded", ErrorKind::WindowExpired, MSG_WINDOW_EXPIRED),
    rule("has expired", ErrorKind::WindowExpired, MSG_WINDOW_EXPIRED),
    rule("timed out", ErrorKind::NetworkTimeout, MSG_NETWORK_TIMEOUT),
    rule("timeout", ErrorKind::NetworkTimeout, MSG_NETWORK_TIMEOUT),
    rule("was not confirmed in", ErrorKind::NetworkTimeout, MSG_NETWORK_TIMEOUT),
    rule("failed to fetch", ErrorKind::NetworkUnavailable, MSG_NETWORK_UNAVAILABLE),
    rule("network request failed", ErrorKind::NetworkUnavailable, MSG_NETWORK_UNAVAILABLE),
    rule("connection refused", ErrorKind::NetworkUnavailable, MSG_NETWORK_UNAVAILABLE),
    rule("invalid account", ErrorKind::InvalidAccount, MSG_INVALID_ACCOUNT),
    rule("account not found", ErrorKind::InvalidAccount, MSG_INVALID_ACCOUNT),
    rule("could not find account", ErrorKind::InvalidAccount, MSG_INVALID_ACCOUNT),
];

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Pure, table-driven fault classifier.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    rules: &'static [ClassificationRule],
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES,
        }
    }
}

impl ErrorClassifier {
    /// A classifier over a custom rule table.
    pub fn with_rules(rules: &'static [ClassificationRule]) -> Self {
        Self { rules }
    }

    /// The rule table in priority order.
    pub fn rules(&self) -> &'static [ClassificationRule] {
        self.rules
    }

    /// Classifies a fault message.
    pub fn classify(&self, message: &str) -> TransactionError {
        self.classify_haystack(&message.to_lowercase(), message)
    }

    /// Classifies a collaborator fault, scanning its logs as well.
    pub fn classify_fault(&self, fault: &RawFault) -> TransactionError {
        let mut haystack = fault.message.to_lowercase();
        for line in &fault.logs {
            haystack.push('\n');
            haystack.push_str(&line.to_lowercase());
        }
        self.classify_haystack(&haystack, &fault.message)
    }

    fn classify_haystack(&self, haystack: &str, original: &str) -> TransactionError {
        match self.rules.iter().find(|r| haystack.contains(r.pattern)) {
            Some(r) => TransactionError::from_kind(r.kind, r.message),
            None => TransactionError::Unknown(truncate_message(
                original,
                config::UNKNOWN_ERROR_MAX_CHARS,
            )),
        }
    }
}

/// Classifies `message` with the built-in table.
pub fn classify(message: &str) -> TransactionError {
    ErrorClassifier::default().classify(message)
}

/// Caps `message` at `max_chars` characters, ending in `...` when cut.
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return "Unknown error".to_string();
    }
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = trimmed.chars().take(keep).collect();
    out.push_str("...");
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_for_rent() {
        let err = classify("insufficient funds for rent");
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), MSG_INSUFFICIENT_FUNDS);
    }

    #[test]
    fn blockhash_not_found_maps_to_window_expired() {
        let err = classify("Transaction simulation failed: Blockhash not found");
        assert_eq!(err.kind(), ErrorKind::WindowExpired);
        assert!(err.is_retryable());
    }

    #[test]
    fn block_height_exceeded_maps_to_window_expired() {
        let err = classify("Signature 3xyz has expired: block height exceeded.");
        assert_eq!(err.kind(), ErrorKind::WindowExpired);
    }

    #[test]
    fn user_rejection() {
        assert_eq!(
            classify("User rejected the request.").kind(),
            ErrorKind::UserRejected
        );
    }

    #[test]
    fn mint_authority_mismatch() {
        assert_eq!(
            classify("Error processing Instruction 0: owner does not match").kind(),
            ErrorKind::NotMintAuthority
        );
    }

    #[test]
    fn account_already_in_use() {
        assert_eq!(
            classify("Allocate: account Address { .. } already in use").kind(),
            ErrorKind::AlreadyInUse
        );
    }

    #[test]
    fn timeouts_and_connectivity() {
        assert_eq!(classify("request timed out").kind(), ErrorKind::NetworkTimeout);
        assert_eq!(
            classify("TypeError: Failed to fetch").kind(),
            ErrorKind::NetworkUnavailable
        );
    }

    #[test]
    fn invalid_account() {
        assert_eq!(
            classify("AccountNotFound: account not found").kind(),
            ErrorKind::InvalidAccount
        );
    }

    #[test]
    fn first_match_wins() {
        // Both "insufficient funds" and "timeout" appear; the funds rule is
        // earlier in the table.
        let err = classify("insufficient funds (rpc timeout while simulating)");
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn logs_are_scanned() {
        let fault = RawFault::new("Transaction simulation failed")
            .with_logs(vec!["Program log: Error: insufficient lamports 10, need 20".into()]);
        let err = ErrorClassifier::default().classify_fault(&fault);
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn unknown_is_truncated_to_limit() {
        let long = "x".repeat(500);
        match classify(&long) {
            TransactionError::Unknown(msg) => {
                assert_eq!(msg.chars().count(), config::UNKNOWN_ERROR_MAX_CHARS);
                assert!(msg.ends_with("..."));
            }
            other => panic!("expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn unknown_short_message_kept_verbatim() {
        assert_eq!(
            classify("something odd happened"),
            TransactionError::Unknown("something odd happened".into())
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(150);
        let out = truncate_message(&text, 100);
        assert_eq!(out.chars().count(), 100);
    }

    #[test]
    fn empty_message() {
        assert_eq!(truncate_message("   ", 100), "Unknown error");
    }

    #[test]
    fn custom_table() {
        static RULES: &[ClassificationRule] = &[rule(
            "slot skipped",
            ErrorKind::NetworkTimeout,
            "Slot skipped",
        )];
        let classifier = ErrorClassifier::with_rules(RULES);
        assert_eq!(
            classifier.classify("Slot skipped, try later").kind(),
            ErrorKind::NetworkTimeout
        );
        assert_eq!(
            classifier.classify("insufficient funds").kind(),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn every_pattern_is_lowercase() {
        for r in DEFAULT_RULES {
            assert_eq!(r.pattern, r.pattern.to_lowercase(), "pattern {:?}", r.pattern);
        }
    }
}
