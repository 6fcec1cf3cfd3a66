//! # Accounting Repository
//!
//! Ledgers, accounts and double-entry transactions. Invoicing only needs
//! enough of this to hold default accounts and link an invoice to the
//! transaction that booked it.
//!
//! ## Transaction Booking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_transaction(amount, debit, credit)                              │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    debit.balance  += amount   → snapshot debit_account_balance         │
//! │    credit.balance -= amount   → snapshot credit_account_balance        │
//! │    INSERT transactions(...)                                            │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use erp_core::{Account, Ledger, NewAccount, NewLedger, NewTransaction, Transaction};

/// Repository for ledgers, accounts and transactions.
#[derive(Debug, Clone)]
pub struct AccountingRepository {
    pool: SqlitePool,
}

impl AccountingRepository {
    /// Creates a new AccountingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountingRepository { pool }
    }

    // =========================================================================
    // Ledgers
    // =========================================================================

    /// Creates a ledger. Names are unique per company.
    pub async fn create_ledger(&self, new: NewLedger) -> DbResult<Ledger> {
        new.validate()?;

        let ledger = Ledger {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id,
            name: new.name,
        };

        debug!(id = %ledger.id, company_id = %ledger.company_id, "Creating ledger");

        sqlx::query("INSERT INTO ledgers (id, company_id, name) VALUES (?1, ?2, ?3)")
            .bind(&ledger.id)
            .bind(&ledger.company_id)
            .bind(&ledger.name)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::duplicate_on_insert(e, "name", &ledger.name))?;

        Ok(ledger)
    }

    pub async fn get_ledger(&self, id: &str) -> DbResult<Option<Ledger>> {
        let ledger = sqlx::query_as::<_, Ledger>(
            "SELECT id, company_id, name FROM ledgers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ledger)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Creates an account with a zero balance. Codes are unique per ledger.
    pub async fn create_account(&self, new: NewAccount) -> DbResult<Account> {
        new.validate()?;

        let account = Account {
            id: Uuid::new_v4().to_string(),
            ledger_id: new.ledger_id,
            code: new.code,
            name: new.name,
            account_type: new.account_type,
            balance_cents: 0,
        };

        debug!(id = %account.id, code = %account.code, "Creating account");

        sqlx::query(
            r#"
            INSERT INTO accounts (id, ledger_id, code, name, account_type, balance_cents)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&account.id)
        .bind(&account.ledger_id)
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type)
        .bind(account.balance_cents)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "code", &account.code))?;

        Ok(account)
    }

    pub async fn get_account(&self, id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, ledger_id, code, name, account_type, balance_cents
            FROM accounts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// ## Errors
    /// * `Protected` - a transaction or a company default still uses it
    pub async fn delete_account(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "Account", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }

        info!(id = %id, "Account deleted");
        Ok(())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Books `amount` from `credit_account_id` into `debit_account_id`.
    ///
    /// Both balances are updated and snapshotted in one database
    /// transaction; either account missing rolls everything back.
    pub async fn create_transaction(&self, new: NewTransaction) -> DbResult<Transaction> {
        new.validate()?;

        let amount = new.amount.cents();
        let mut tx = self.pool.begin().await?;

        let debit_balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET balance_cents = balance_cents + ?2 WHERE id = ?1 RETURNING balance_cents",
        )
        .bind(&new.debit_account_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;
        let debit_balance =
            debit_balance.ok_or_else(|| DbError::not_found("Account", &new.debit_account_id))?;

        let credit_balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET balance_cents = balance_cents - ?2 WHERE id = ?1 RETURNING balance_cents",
        )
        .bind(&new.credit_account_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;
        let credit_balance =
            credit_balance.ok_or_else(|| DbError::not_found("Account", &new.credit_account_id))?;

        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            amount_cents: amount,
            debit_account_id: new.debit_account_id,
            debit_account_balance_cents: debit_balance,
            credit_account_id: new.credit_account_id,
            credit_account_balance_cents: credit_balance,
        };

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, timestamp, amount_cents,
                debit_account_id, debit_account_balance_cents,
                credit_account_id, credit_account_balance_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&transaction.id)
        .bind(transaction.timestamp)
        .bind(transaction.amount_cents)
        .bind(&transaction.debit_account_id)
        .bind(transaction.debit_account_balance_cents)
        .bind(&transaction.credit_account_id)
        .bind(transaction.credit_account_balance_cents)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            id = %transaction.id,
            amount_cents = amount,
            debit = %transaction.debit_account_id,
            credit = %transaction.credit_account_id,
            "Transaction booked"
        );

        Ok(transaction)
    }

    pub async fn get_transaction(&self, id: &str) -> DbResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT
                id, timestamp, amount_cents,
                debit_account_id, debit_account_balance_cents,
                credit_account_id, credit_account_balance_cents
            FROM transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
