//! Parties: companies, contacts, addresses and their invoicing extensions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{
    validate_max_len, validate_not_future, validate_optional_uuid, validate_required,
    validate_slug, validate_uuid, ValidationResult,
};

// =============================================================================
// Company / Contact / PhysicalAddress
// =============================================================================
// Owned by the persons and contacts modules of a wider ERP. Only the columns
// invoicing needs are kept here.

/// A company that can issue invoices once it has a [`CompanyInvoice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Company {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
}

impl NewCompany {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name, 150)
    }
}

/// A customer or supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
}

impl NewContact {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name, 150)
    }
}

/// A postal address, used as fiscal address of companies, contacts and
/// points of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PhysicalAddress {
    pub id: String,
    pub street_address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPhysicalAddress {
    pub street_address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl NewPhysicalAddress {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("street_address", &self.street_address, 200)?;
        validate_max_len("city", &self.city, 100)?;
        validate_max_len("postal_code", &self.postal_code, 20)?;
        validate_max_len("country", &self.country, 100)
    }
}

// =============================================================================
// Fiscal Position
// =============================================================================

/// A government-assigned tax class (e.g. "Responsable Inscripto").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FiscalPosition {
    pub id: String,
    /// Unique across the system.
    pub name: String,
    /// Optional slug.
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFiscalPosition {
    pub name: String,
    pub code: String,
}

impl NewFiscalPosition {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name, 50)?;
        validate_slug("code", &self.code, 15)
    }
}

// =============================================================================
// Company Invoice
// =============================================================================

/// Invoicing extension of a [`Company`] (one-to-one).
///
/// A company needs one of these before it can own products or invoices.
/// Deleting the company deletes this row with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CompanyInvoice {
    pub id: String,
    pub company_id: String,
    pub legal_name: String,
    /// Date the company started its activities. Never in the future.
    pub initiated_activities: Option<NaiveDate>,
    /// Optional: not every country assigns one.
    pub fiscal_position_id: Option<String>,
    pub fiscal_address_id: Option<String>,
    pub default_invoice_debit_account_id: Option<String>,
    pub default_invoice_credit_account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompanyInvoice {
    pub company_id: String,
    pub legal_name: String,
    pub initiated_activities: Option<NaiveDate>,
    pub fiscal_position_id: Option<String>,
    pub fiscal_address_id: Option<String>,
    pub default_invoice_debit_account_id: Option<String>,
    pub default_invoice_credit_account_id: Option<String>,
}

impl NewCompanyInvoice {
    /// Minimal extension: just the legal name.
    pub fn new(company_id: impl Into<String>, legal_name: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            legal_name: legal_name.into(),
            initiated_activities: None,
            fiscal_position_id: None,
            fiscal_address_id: None,
            default_invoice_debit_account_id: None,
            default_invoice_credit_account_id: None,
        }
    }

    pub fn validate(&self, today: NaiveDate) -> ValidationResult<()> {
        validate_uuid("company_id", &self.company_id)?;
        validate_required("legal_name", &self.legal_name, 300)?;
        if let Some(date) = self.initiated_activities {
            validate_not_future("initiated_activities", date, today)?;
        }
        validate_optional_uuid("fiscal_position_id", self.fiscal_position_id.as_deref())?;
        validate_optional_uuid("fiscal_address_id", self.fiscal_address_id.as_deref())?;
        validate_optional_uuid(
            "default_invoice_debit_account_id",
            self.default_invoice_debit_account_id.as_deref(),
        )?;
        validate_optional_uuid(
            "default_invoice_credit_account_id",
            self.default_invoice_credit_account_id.as_deref(),
        )
    }
}

// =============================================================================
// Contact Invoice
// =============================================================================

/// Invoicing extension of a [`Contact`] (one-to-one).
///
/// Unlike companies, contacts must declare a fiscal position and address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ContactInvoice {
    pub id: String,
    pub contact_id: String,
    pub legal_name: String,
    pub fiscal_position_id: String,
    pub fiscal_address_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContactInvoice {
    pub contact_id: String,
    pub legal_name: String,
    pub fiscal_position_id: String,
    pub fiscal_address_id: String,
}

impl NewContactInvoice {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("contact_id", &self.contact_id)?;
        validate_required("legal_name", &self.legal_name, 300)?;
        validate_uuid("fiscal_position_id", &self.fiscal_position_id)?;
        validate_uuid("fiscal_address_id", &self.fiscal_address_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    const COMPANY: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_fiscal_position_limits() {
        let ok = NewFiscalPosition {
            name: "Responsable Inscripto".to_string(),
            code: "ri".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_code = NewFiscalPosition {
            name: "Exento".to_string(),
            code: "ex ento".to_string(),
        };
        assert!(bad_code.validate().is_err());
    }

    #[test]
    fn test_company_invoice_initiated_activities_not_future() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut new = NewCompanyInvoice::new(COMPANY, "ACME S.R.L.");
        new.initiated_activities = NaiveDate::from_ymd_opt(2020, 1, 1);
        assert!(new.validate(today).is_ok());

        new.initiated_activities = NaiveDate::from_ymd_opt(2024, 6, 2);
        assert!(matches!(
            new.validate(today),
            Err(ValidationError::FutureDate { .. })
        ));
    }

    #[test]
    fn test_contact_invoice_requires_fiscal_position() {
        let new = NewContactInvoice {
            contact_id: COMPANY.to_string(),
            legal_name: "Juan Pérez".to_string(),
            fiscal_position_id: String::new(),
            fiscal_address_id: COMPANY.to_string(),
        };
        assert_eq!(
            new.validate(),
            Err(ValidationError::Required {
                field: "fiscal_position_id".to_string()
            })
        );
    }
}
