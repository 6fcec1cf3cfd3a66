//! Sales module entities: product categories, the sales extension of
//! products, quotations and sales.
//!
//! A quotation precedes a sale; a sale precedes an invoice. Both documents
//! reuse the same line shape, [`NewSalesLine`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Fraction, Money};
use crate::validation::{
    validate_fraction, validate_max_len, validate_non_negative_cents, validate_not_future,
    validate_optional_uuid, validate_quantity, validate_required, validate_uuid,
    ValidationResult,
};

// =============================================================================
// Product Category
// =============================================================================

/// A product grouping. Name is unique per company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductCategory {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductCategory {
    pub company_id: String,
    pub name: String,
    pub description: String,
}

impl NewProductCategory {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("company_id", &self.company_id)?;
        validate_required("name", &self.name, 50)?;
        validate_max_len("description", &self.description, 200)
    }
}

// =============================================================================
// Product Sales
// =============================================================================

/// Sales extension of a [`Product`](crate::types::Product), keyed by the
/// product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductSales {
    pub product_id: String,
    pub description: String,
}

// =============================================================================
// Lines
// =============================================================================

/// Input for a quotation or sale line.
///
/// Price and VAT fall back to the product's when no override is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSalesLine {
    pub product_id: String,
    pub price_override: Option<Money>,
    pub vat_override_id: Option<String>,
    pub discount: Fraction,
    pub quantity: i64,
}

impl NewSalesLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            price_override: None,
            vat_override_id: None,
            discount: Fraction::zero(),
            quantity,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_uuid("product_id", &self.product_id)?;
        if let Some(price) = self.price_override {
            validate_non_negative_cents("product_price_override", price.cents())?;
        }
        validate_optional_uuid("product_vat_override_id", self.vat_override_id.as_deref())?;
        validate_fraction("product_discount", self.discount)?;
        validate_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QuotationLine {
    pub id: String,
    pub quotation_id: String,
    pub product_id: String,
    pub product_price_override_cents: Option<i64>,
    pub product_vat_override_id: Option<String>,
    pub product_discount_bps: u32,
    pub quantity: i64,
}

impl QuotationLine {
    #[inline]
    pub fn discount(&self) -> Fraction {
        Fraction::from_bps(self.product_discount_bps)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    /// References the product's sales extension.
    pub product_id: String,
    pub product_price_override_cents: Option<i64>,
    pub product_vat_override_id: Option<String>,
    pub product_discount_bps: u32,
    pub quantity: i64,
}

impl SaleLine {
    #[inline]
    pub fn discount(&self) -> Fraction {
        Fraction::from_bps(self.product_discount_bps)
    }
}

// =============================================================================
// Quotation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    #[default]
    Draft,
    Saved,
    /// A sale was created from this quotation.
    Sold,
    Canceled,
}

impl QuotationStatus {
    pub const fn code(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "D",
            QuotationStatus::Saved => "SA",
            QuotationStatus::Sold => "SO",
            QuotationStatus::Canceled => "C",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "Draft",
            QuotationStatus::Saved => "Saved",
            QuotationStatus::Sold => "Sold",
            QuotationStatus::Canceled => "Canceled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "D" => Some(QuotationStatus::Draft),
            "SA" => Some(QuotationStatus::Saved),
            "SO" => Some(QuotationStatus::Sold),
            "C" => Some(QuotationStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Quotation {
    pub id: String,
    pub company_id: String,
    pub quotation_date: NaiveDate,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub notes: String,
    pub status: QuotationStatus,
    pub created_at: DateTime<Utc>,
}

impl Quotation {
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
pub struct NewQuotation {
    pub company_id: String,
    pub contact_ids: Vec<String>,
    pub quotation_date: NaiveDate,
    pub notes: String,
}

impl NewQuotation {
    pub fn validate(&self, today: NaiveDate) -> ValidationResult<()> {
        validate_uuid("company_id", &self.company_id)?;
        for id in &self.contact_ids {
            validate_uuid("contact_id", id)?;
        }
        validate_not_future("quotation_date", self.quotation_date, today)
    }
}

// =============================================================================
// Sale
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Draft,
    Saved,
    Invoiced,
    Canceled,
}

impl SaleStatus {
    pub const fn code(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "D",
            SaleStatus::Saved => "S",
            SaleStatus::Invoiced => "I",
            SaleStatus::Canceled => "C",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "Draft",
            SaleStatus::Saved => "Saved",
            SaleStatus::Invoiced => "Invoiced",
            SaleStatus::Canceled => "Canceled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "D" => Some(SaleStatus::Draft),
            "S" => Some(SaleStatus::Saved),
            "I" => Some(SaleStatus::Invoiced),
            "C" => Some(SaleStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// At most one sale per quotation.
    pub quotation_id: Option<String>,
    pub company_id: String,
    pub sale_date: NaiveDate,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub notes: String,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl Sale {
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
pub struct NewSale {
    pub company_id: String,
    pub contact_ids: Vec<String>,
    pub sale_date: NaiveDate,
    pub notes: String,
}

impl NewSale {
    pub fn validate(&self, today: NaiveDate) -> ValidationResult<()> {
        validate_uuid("company_id", &self.company_id)?;
        for id in &self.contact_ids {
            validate_uuid("contact_id", id)?;
        }
        validate_not_future("sale_date", self.sale_date, today)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_status_codes() {
        assert_eq!(QuotationStatus::Saved.code(), "SA");
        assert_eq!(QuotationStatus::from_code("SO"), Some(QuotationStatus::Sold));
        assert_eq!(SaleStatus::Invoiced.code(), "I");
        assert_eq!(SaleStatus::default(), SaleStatus::Draft);
    }

    #[test]
    fn test_sales_line_discount_range() {
        let mut line = NewSalesLine::new(ID, 2);
        line.discount = Fraction::from_bps(2500);
        assert!(line.validate().is_ok());

        line.discount = Fraction::from_bps(10_001);
        assert!(line.validate().is_err());
    }

    #[test]
    fn test_sale_date_not_future() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let new = NewSale {
            company_id: ID.to_string(),
            contact_ids: vec![ID.to_string()],
            sale_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            notes: String::new(),
        };
        assert!(matches!(
            new.validate(today),
            Err(ValidationError::FutureDate { .. })
        ));
    }

    #[test]
    fn test_quotation_contact_ids_checked() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let new = NewQuotation {
            company_id: ID.to_string(),
            contact_ids: vec!["nope".to_string()],
            quotation_date: today,
            notes: String::new(),
        };
        assert!(new.validate(today).is_err());
    }
}
