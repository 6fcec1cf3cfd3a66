//! Accounting entities referenced by invoicing: ledgers, accounts and
//! transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{
    validate_non_negative_cents, validate_required, validate_slug, validate_uuid,
    ValidationResult,
};

// =============================================================================
// Ledger
// =============================================================================

/// The collection of accounts used by a company. Name is unique per company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Ledger {
    pub id: String,
    pub company_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLedger {
    pub company_id: String,
    pub name: String,
}

impl NewLedger {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("company_id", &self.company_id)?;
        validate_required("name", &self.name, 150)
    }
}

// =============================================================================
// Account Type
// =============================================================================

/// Classic bookkeeping account classes.
///
/// - Personal: debit the receiver, credit the giver
/// - Real: debit what comes in, credit what goes out
/// - Nominal: debit expenses and losses, credit incomes and gains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Personal,
    Real,
    Nominal,
}

impl AccountType {
    pub const fn code(&self) -> &'static str {
        match self {
            AccountType::Personal => "P",
            AccountType::Real => "R",
            AccountType::Nominal => "N",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            AccountType::Personal => "Personal",
            AccountType::Real => "Real",
            AccountType::Nominal => "Nominal",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(AccountType::Personal),
            "R" => Some(AccountType::Real),
            "N" => Some(AccountType::Nominal),
            _ => None,
        }
    }
}

// =============================================================================
// Account
// =============================================================================

/// An account inside a ledger. Code is unique per ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub id: String,
    pub ledger_id: String,
    pub code: String,
    pub name: String,
    pub account_type: Option<AccountType>,
    pub balance_cents: i64,
}

impl Account {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub ledger_id: String,
    pub code: String,
    pub name: String,
    pub account_type: Option<AccountType>,
}

impl NewAccount {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("ledger_id", &self.ledger_id)?;
        validate_required("code", &self.code, 30)?;
        validate_slug("code", &self.code, 30)?;
        validate_required("name", &self.name, 150)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A double-entry movement between two accounts.
///
/// The balance columns snapshot each account's balance right after the
/// movement was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub amount_cents: i64,
    pub debit_account_id: String,
    pub debit_account_balance_cents: i64,
    pub credit_account_id: String,
    pub credit_account_balance_cents: i64,
}

impl Transaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Money,
    pub debit_account_id: String,
    pub credit_account_id: String,
}

impl NewTransaction {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_non_negative_cents("amount", self.amount.cents())?;
        validate_uuid("debit_account_id", &self.debit_account_id)?;
        validate_uuid("credit_account_id", &self.credit_account_id)?;
        if self.debit_account_id == self.credit_account_id {
            return Err(ValidationError::InvalidFormat {
                field: "credit_account_id".to_string(),
                reason: "must differ from the debit account".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_codes() {
        for t in [AccountType::Personal, AccountType::Real, AccountType::Nominal] {
            assert_eq!(AccountType::from_code(t.code()), Some(t));
        }
        assert_eq!(AccountType::from_code("X"), None);
    }

    #[test]
    fn test_account_code_is_slug() {
        let new = NewAccount {
            ledger_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            code: "1.1.01".to_string(),
            name: "Caja".to_string(),
            account_type: Some(AccountType::Real),
        };
        assert!(new.validate().is_err());

        let new = NewAccount {
            code: "1-1-01".to_string(),
            ..new
        };
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_transaction_needs_two_accounts() {
        let id = "550e8400-e29b-41d4-a716-446655440000".to_string();
        let new = NewTransaction {
            amount: Money::from_cents(100),
            debit_account_id: id.clone(),
            credit_account_id: id,
        };
        assert!(new.validate().is_err());
    }
}
