//! # Argentina Extension
//!
//! Attributes AFIP requires on top of the generic invoicing entities.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CompanyInvoice ◄─1:1── CompanyInvoiceAr ──┬── PointOfSaleAr (afip_id)  │
//! │                          (cuit, key, cert) └── WebServiceSession        │
//! │  ContactInvoice ◄─1:1── ContactInvoiceAr (id_type, id_number)          │
//! │                                                                         │
//! │  Invoice ◄─1:1── InvoiceAr (primary key = invoice id)                  │
//! │                  ├── concept type, point of sale, due date, period     │
//! │                  ├── vat_total + InvoiceArVatSubtotal per VAT rate     │
//! │                  └── CAE + expiry once authorized                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{
    validate_afip_id, validate_cae, validate_cuit, validate_max_len, validate_period,
    validate_required, validate_slug, validate_tax_id, validate_uuid, ValidationResult,
};

// =============================================================================
// Id Type
// =============================================================================

/// Kind of national identification number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    Dni,
    Cuit,
    Cuil,
}

impl IdType {
    pub const fn code(&self) -> &'static str {
        match self {
            IdType::Dni => "D",
            IdType::Cuit => "T",
            IdType::Cuil => "L",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            IdType::Dni => "DNI",
            IdType::Cuit => "CUIT",
            IdType::Cuil => "CUIL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "D" => Some(IdType::Dni),
            "T" => Some(IdType::Cuit),
            "L" => Some(IdType::Cuil),
            _ => None,
        }
    }
}

// =============================================================================
// Contact / Company extensions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ContactInvoiceAr {
    pub id: String,
    pub contact_invoice_id: String,
    pub id_type: Option<IdType>,
    pub id_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContactInvoiceAr {
    pub contact_invoice_id: String,
    pub id_type: Option<IdType>,
    pub id_number: String,
}

impl NewContactInvoiceAr {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("contact_invoice_id", &self.contact_invoice_id)?;
        validate_max_len("id_number", &self.id_number, 14)?;
        match self.id_type {
            Some(id_type) => validate_tax_id(id_type, &self.id_number),
            None if self.id_number.trim().is_empty() => Ok(()),
            None => Err(ValidationError::Required {
                field: "id_type".to_string(),
            }),
        }
    }
}

/// AR extension of an invoicing company.
///
/// `key` and `cert` hold the PEM private key and certificate used to sign
/// webservice login tickets.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CompanyInvoiceAr {
    pub id: String,
    pub company_invoice_id: String,
    pub cuit: String,
    /// Ingresos Brutos, the provincial gross-revenue registration.
    pub iibb: String,
    pub key: String,
    pub cert: String,
}

impl fmt::Debug for CompanyInvoiceAr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompanyInvoiceAr")
            .field("id", &self.id)
            .field("company_invoice_id", &self.company_invoice_id)
            .field("cuit", &self.cuit)
            .field("iibb", &self.iibb)
            .field("key", &"<redacted>")
            .field("cert_len", &self.cert.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCompanyInvoiceAr {
    pub company_invoice_id: String,
    pub cuit: String,
    pub iibb: String,
    pub key: String,
    pub cert: String,
}

impl NewCompanyInvoiceAr {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("company_invoice_id", &self.company_invoice_id)?;
        validate_max_len("cuit", &self.cuit, 14)?;
        validate_cuit(&self.cuit)?;
        validate_max_len("iibb", &self.iibb, 15)
    }
}

// =============================================================================
// Web Service Session
// =============================================================================

/// A token/sign pair returned by the authentication webservice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WebServiceSession {
    pub id: String,
    pub company_invoice_ar_id: String,
    pub begin: DateTime<Utc>,
    pub generation: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub token: String,
    pub sign: String,
}

impl WebServiceSession {
    /// True while `now` lies in `[begin, expiration)`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.begin <= now && now < self.expiration
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWebServiceSession {
    pub company_invoice_ar_id: String,
    pub begin: DateTime<Utc>,
    pub generation: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub token: String,
    pub sign: String,
}

impl NewWebServiceSession {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("company_invoice_ar_id", &self.company_invoice_ar_id)?;
        if self.token.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "token".to_string(),
            });
        }
        if self.sign.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "sign".to_string(),
            });
        }
        if self.expiration <= self.begin {
            return Err(ValidationError::InvalidFormat {
                field: "expiration".to_string(),
                reason: "must be after begin".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Point of Sale
// =============================================================================

/// How a point of sale emits its invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PointOfSaleType {
    FiscalController,
    PrePrinted,
    #[default]
    WebService,
    Online,
}

impl PointOfSaleType {
    pub const fn code(&self) -> &'static str {
        match self {
            PointOfSaleType::FiscalController => "C",
            PointOfSaleType::PrePrinted => "F",
            PointOfSaleType::WebService => "W",
            PointOfSaleType::Online => "L",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            PointOfSaleType::FiscalController => "Fiscal Controller",
            PointOfSaleType::PrePrinted => "Pre-printed",
            PointOfSaleType::WebService => "Webservice",
            PointOfSaleType::Online => "Online",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "C" => Some(PointOfSaleType::FiscalController),
            "F" => Some(PointOfSaleType::PrePrinted),
            "W" => Some(PointOfSaleType::WebService),
            "L" => Some(PointOfSaleType::Online),
            _ => None,
        }
    }
}

/// A point of sale registered with AFIP. `afip_id` is unique per company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PointOfSaleAr {
    pub id: String,
    pub company_invoice_ar_id: String,
    pub afip_id: i64,
    pub fantasy_name: String,
    pub point_of_sale_type: PointOfSaleType,
    pub fiscal_address_id: String,
    pub is_inactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPointOfSaleAr {
    pub company_invoice_ar_id: String,
    pub afip_id: i64,
    pub fantasy_name: String,
    pub point_of_sale_type: PointOfSaleType,
    pub fiscal_address_id: String,
}

impl NewPointOfSaleAr {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("company_invoice_ar_id", &self.company_invoice_ar_id)?;
        validate_afip_id(self.afip_id)?;
        validate_required("fantasy_name", &self.fantasy_name, 150)?;
        validate_uuid("fiscal_address_id", &self.fiscal_address_id)
    }
}

// =============================================================================
// Concept Type
// =============================================================================

/// AFIP classification required on every invoice (products, services, both).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ConceptType {
    pub id: String,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConceptType {
    pub name: String,
    pub code: String,
}

impl NewConceptType {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name, 50)?;
        validate_required("code", &self.code, 15)?;
        validate_slug("code", &self.code, 15)
    }
}

// =============================================================================
// Invoice AR
// =============================================================================

/// AR extension of an [`Invoice`](crate::types::Invoice).
///
/// Keyed by the base invoice id; deleting the invoice deletes this row and
/// its VAT subtotals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceAr {
    pub invoice_id: String,
    pub company_invoice_ar_id: String,
    pub contact_invoice_ar_id: String,
    pub point_of_sale_ar_id: String,
    pub due_date: NaiveDate,
    pub service_start: Option<NaiveDate>,
    pub service_end: Option<NaiveDate>,
    pub concept_type_id: String,
    pub vat_total_cents: i64,
    /// Blank until authorized.
    pub cae: String,
    pub cae_expires: Option<NaiveDate>,
}

impl InvoiceAr {
    #[inline]
    pub fn vat_total(&self) -> Money {
        Money::from_cents(self.vat_total_cents)
    }

    pub fn is_authorized(&self) -> bool {
        !self.cae.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceAr {
    pub invoice_id: String,
    pub company_invoice_ar_id: String,
    pub contact_invoice_ar_id: String,
    pub point_of_sale_ar_id: String,
    pub due_date: NaiveDate,
    pub service_start: Option<NaiveDate>,
    pub service_end: Option<NaiveDate>,
    pub concept_type_id: String,
}

impl NewInvoiceAr {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("invoice_id", &self.invoice_id)?;
        validate_uuid("company_invoice_ar_id", &self.company_invoice_ar_id)?;
        validate_uuid("contact_invoice_ar_id", &self.contact_invoice_ar_id)?;
        validate_uuid("point_of_sale_ar_id", &self.point_of_sale_ar_id)?;
        validate_uuid("concept_type_id", &self.concept_type_id)?;
        validate_period("service", self.service_start, self.service_end)
    }
}

/// A CAE granted by AFIP for one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaeAuthorization {
    pub cae: String,
    pub cae_expires: NaiveDate,
}

impl CaeAuthorization {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.cae.is_empty() {
            return Err(ValidationError::Required {
                field: "cae".to_string(),
            });
        }
        validate_cae(&self.cae)
    }
}

/// Taxable base and VAT amount of one rate on an AR invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceArVatSubtotal {
    pub id: String,
    pub invoice_ar_id: String,
    pub vat_id: String,
    pub base_cents: i64,
    pub amount_cents: i64,
}

impl InvoiceArVatSubtotal {
    #[inline]
    pub fn base(&self) -> Money {
        Money::from_cents(self.base_cents)
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
