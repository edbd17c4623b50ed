//! Credit ledger outcomes.

use filmgen_core::types::DbId;

/// Result of a debit or refund against `credit_accounts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The transaction was written; carries the new balance.
    Applied { balance_after: i64 },
    /// A transaction with the same idempotency key already existed.
    Replayed { balance_after: i64 },
    /// The account cannot cover the debit.
    Insufficient { balance: i64 },
}

/// A journal entry to write.
#[derive(Debug, Clone)]
pub struct CreditEntry<'a> {
    pub user_id: DbId,
    pub amount: i64,
    pub reason: &'a str,
    pub idempotency_key: &'a str,
}
