//! Repository for `credit_accounts` and the `credit_transactions` journal.
//!
//! Every balance change is journaled under an idempotency key in the same
//! transaction, so retrying a debit or refund with the same key replays the
//! recorded outcome instead of moving money twice.

use sqlx::PgPool;
use filmgen_core::types::DbId;

use crate::is_unique_violation;
use crate::models::credit::{CreditEntry, LedgerOutcome};

const IDEMPOTENCY_CONSTRAINT: &str = "uq_credit_transactions_idempotency_key";

pub struct CreditRepo;

impl CreditRepo {
    /// Current balance; users without an account have zero.
    pub async fn balance(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM credit_accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(balance.unwrap_or(0))
    }

    /// Debit `entry.amount` (positive) from the user's account.
    pub async fn spend(pool: &PgPool, entry: &CreditEntry<'_>) -> Result<LedgerOutcome, sqlx::Error> {
        if let Some(balance_after) = Self::find_replay(pool, entry.idempotency_key).await? {
            return Ok(LedgerOutcome::Replayed { balance_after });
        }

        let mut tx = pool.begin().await?;

        let balance_after: Option<i64> = sqlx::query_scalar(
            "UPDATE credit_accounts SET balance = balance - $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance >= $2 \
             RETURNING balance",
        )
        .bind(entry.user_id)
        .bind(entry.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance_after) = balance_after else {
            tx.rollback().await?;
            let balance = Self::balance(pool, entry.user_id).await?;
            return Ok(LedgerOutcome::Insufficient { balance });
        };

        match Self::journal(&mut tx, entry, -entry.amount, balance_after).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(LedgerOutcome::Applied { balance_after })
            }
            Err(e) if is_unique_violation(&e, IDEMPOTENCY_CONSTRAINT) => {
                // A concurrent call with the same key won; ours rolls back.
                drop(tx);
                Self::replayed(pool, entry.idempotency_key).await
            }
            Err(e) => Err(e),
        }
    }

    /// Credit `entry.amount` (positive) back to the user's account.
    pub async fn refund(pool: &PgPool, entry: &CreditEntry<'_>) -> Result<LedgerOutcome, sqlx::Error> {
        if let Some(balance_after) = Self::find_replay(pool, entry.idempotency_key).await? {
            return Ok(LedgerOutcome::Replayed { balance_after });
        }

        let mut tx = pool.begin().await?;

        let balance_after: i64 = sqlx::query_scalar(
            "INSERT INTO credit_accounts (user_id, balance) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE \
             SET balance = credit_accounts.balance + EXCLUDED.balance, updated_at = NOW() \
             RETURNING balance",
        )
        .bind(entry.user_id)
        .bind(entry.amount)
        .fetch_one(&mut *tx)
        .await?;

        match Self::journal(&mut tx, entry, entry.amount, balance_after).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(LedgerOutcome::Applied { balance_after })
            }
            Err(e) if is_unique_violation(&e, IDEMPOTENCY_CONSTRAINT) => {
                drop(tx);
                Self::replayed(pool, entry.idempotency_key).await
            }
            Err(e) => Err(e),
        }
    }

    async fn journal(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entry: &CreditEntry<'_>,
        signed_amount: i64,
        balance_after: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO credit_transactions \
                (user_id, amount, reason, idempotency_key, balance_after) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.user_id)
        .bind(signed_amount)
        .bind(entry.reason)
        .bind(entry.idempotency_key)
        .bind(balance_after)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn find_replay(pool: &PgPool, key: &str) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT balance_after FROM credit_transactions WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    async fn replayed(pool: &PgPool, key: &str) -> Result<LedgerOutcome, sqlx::Error> {
        let balance_after = Self::find_replay(pool, key)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok(LedgerOutcome::Replayed { balance_after })
    }
}
