//! Invoicing entities: VAT rates, products, invoice types, invoices and
//! their lines, and the fiscal-position allow-list.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::{Fraction, Money};
use crate::validation::{
    validate_fraction, validate_max_len, validate_non_negative_cents, validate_not_future,
    validate_optional_uuid, validate_quantity, validate_required, validate_slug, validate_uuid,
    ValidationResult,
};

// =============================================================================
// VAT
// =============================================================================

/// A named value-added tax rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Vat {
    pub id: String,
    /// Unique, e.g. "IVA 21%".
    pub name: String,
    pub code: String,
    /// Rate in basis points (2100 = 0.21).
    pub tax_bps: u32,
}

impl Vat {
    #[inline]
    pub fn tax(&self) -> Fraction {
        Fraction::from_bps(self.tax_bps)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVat {
    pub name: String,
    pub code: String,
    pub tax: Fraction,
}

impl NewVat {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name, 15)?;
        validate_slug("code", &self.code, 15)?;
        validate_fraction("tax", self.tax)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product (or service) sold by one invoicing company.
///
/// `(company_invoice_id, name)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub company_invoice_id: String,
    pub name: String,
    pub current_price_cents: Option<i64>,
    pub vat_id: String,
}

impl Product {
    #[inline]
    pub fn current_price(&self) -> Option<Money> {
        self.current_price_cents.map(Money::from_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub company_invoice_id: String,
    pub name: String,
    pub current_price: Option<Money>,
    pub vat_id: String,
}

impl NewProduct {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("company_invoice_id", &self.company_invoice_id)?;
        validate_required("name", &self.name, 150)?;
        if let Some(price) = self.current_price {
            validate_non_negative_cents("current_price", price.cents())?;
        }
        validate_uuid("vat_id", &self.vat_id)
    }
}

// =============================================================================
// Invoice Line
// =============================================================================

/// One entry of an invoice: a product, the price it was sold at, a discount
/// and a quantity.
///
/// Lines are owned by their invoice and deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// When absent, the product's current price applies.
    pub price_sold_cents: Option<i64>,
    pub discount_bps: u32,
    pub quantity: i64,
    pub description: String,
}

impl InvoiceLine {
    #[inline]
    pub fn price_sold(&self) -> Option<Money> {
        self.price_sold_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn discount(&self) -> Fraction {
        Fraction::from_bps(self.discount_bps)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceLine {
    pub product_id: String,
    pub price_sold: Option<Money>,
    pub discount: Fraction,
    pub quantity: i64,
    pub description: String,
}

impl NewInvoiceLine {
    /// A line for `quantity` units at the product's current price.
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            price_sold: None,
            discount: Fraction::zero(),
            quantity,
            description: String::new(),
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("product_id", &self.product_id)?;
        if let Some(price) = self.price_sold {
            validate_non_negative_cents("price_sold", price.cents())?;
        }
        validate_fraction("discount", self.discount)?;
        validate_quantity(self.quantity)?;
        validate_max_len("description", &self.description, 300)
    }
}

// =============================================================================
// Invoice Type
// =============================================================================

/// The class of a government-defined invoice type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceTypeClass {
    Bill,
    Debit,
    Credit,
}

impl InvoiceTypeClass {
    pub const fn code(&self) -> &'static str {
        match self {
            InvoiceTypeClass::Bill => "B",
            InvoiceTypeClass::Debit => "D",
            InvoiceTypeClass::Credit => "C",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            InvoiceTypeClass::Bill => "Bill",
            InvoiceTypeClass::Debit => "Debit",
            InvoiceTypeClass::Credit => "Credit",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B" => Some(InvoiceTypeClass::Bill),
            "D" => Some(InvoiceTypeClass::Debit),
            "C" => Some(InvoiceTypeClass::Credit),
            _ => None,
        }
    }
}

/// A government-defined invoice type ("Factura A", "Nota de Crédito B").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceType {
    pub id: String,
    pub name: String,
    pub invoice_type_class: InvoiceTypeClass,
    /// The authority's code for this type (AFIP: "1" for Factura A).
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceType {
    pub name: String,
    pub invoice_type_class: InvoiceTypeClass,
    pub code: String,
}

impl NewInvoiceType {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name, 150)?;
        validate_slug("code", &self.code, 15)
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Lifecycle of an invoice. Transitions are not guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Accepted,
    /// Authorized by the tax authority (a CAE was granted).
    Authorized,
    Canceled,
}

impl InvoiceStatus {
    pub const fn code(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "D",
            InvoiceStatus::Accepted => "A",
            InvoiceStatus::Authorized => "T",
            InvoiceStatus::Canceled => "C",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "Draft",
            InvoiceStatus::Accepted => "Accepted",
            InvoiceStatus::Authorized => "Authorized",
            InvoiceStatus::Canceled => "Canceled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "D" => Some(InvoiceStatus::Draft),
            "A" => Some(InvoiceStatus::Accepted),
            "T" => Some(InvoiceStatus::Authorized),
            "C" => Some(InvoiceStatus::Canceled),
            _ => None,
        }
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice issued by a company to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub company_invoice_id: String,
    pub contact_invoice_id: String,
    /// The invoice a debit or credit note refers to.
    pub related_invoice_id: Option<String>,
    pub number: i64,
    pub invoice_type_id: Option<String>,
    pub invoice_date: NaiveDate,
    pub status: InvoiceStatus,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub notes: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub company_invoice_id: String,
    pub contact_invoice_id: String,
    pub related_invoice_id: Option<String>,
    /// `None` takes the next number for the company and type.
    pub number: Option<i64>,
    pub invoice_type_id: Option<String>,
    pub invoice_date: NaiveDate,
    pub notes: String,
}

impl NewInvoice {
    pub fn new(
        company_invoice_id: impl Into<String>,
        contact_invoice_id: impl Into<String>,
        invoice_date: NaiveDate,
    ) -> Self {
        Self {
            company_invoice_id: company_invoice_id.into(),
            contact_invoice_id: contact_invoice_id.into(),
            related_invoice_id: None,
            number: None,
            invoice_type_id: None,
            invoice_date,
            notes: String::new(),
        }
    }

    pub fn validate(&self, today: NaiveDate) -> ValidationResult<()> {
        validate_uuid("company_invoice_id", &self.company_invoice_id)?;
        validate_uuid("contact_invoice_id", &self.contact_invoice_id)?;
        validate_optional_uuid("related_invoice_id", self.related_invoice_id.as_deref())?;
        validate_optional_uuid("invoice_type_id", self.invoice_type_id.as_deref())?;
        if matches!(self.number, Some(n) if n < 0) {
            return Err(ValidationError::MustNotBeNegative {
                field: "number".to_string(),
            });
        }
        validate_not_future("invoice_date", self.invoice_date, today)
    }
}

// =============================================================================
// Invoice Type Rule
// =============================================================================

/// One allow-list entry: `issuer` may emit `invoice_type` to `receiver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceTypeRule {
    pub id: String,
    pub issuer_fiscal_position_id: String,
    pub invoice_type_id: String,
    pub receiver_fiscal_position_id: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
