//! # Validation Module
//!
//! Field-level rules shared by every `New*` input type.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure Rust)                                      │
//! │  ├── Lengths, slugs, tax ids, CAE format                               │
//! │  ├── Fractions in [0, 1], non-negative amounts                         │
//! │  └── "Not in the future" against a caller-supplied `today`             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository (erp-db)                                          │
//! │  ├── Calls `New*::validate(today)` before every insert                 │
//! │  └── Cross-row rules (invoice type allow-list, one sale per quote)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (bps ranges, quantities)                        │
//! │  ├── UNIQUE constraints (product name per company, afip_id per co.)    │
//! │  └── FOREIGN KEY … ON DELETE RESTRICT / CASCADE                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use chrono::NaiveDate;
//! use erp_core::validation::{validate_cuit, validate_not_future};
//!
//! validate_cuit("20-12345678-6").unwrap();
//!
//! let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let tomorrow = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
//! assert!(validate_not_future("invoice_date", tomorrow, today).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::{Fraction, BPS_PER_UNIT};
use crate::types::IdType;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest quantity a document line may carry.
pub const MAX_LINE_QUANTITY: i64 = 2_147_483_647;

/// Largest AFIP point-of-sale id.
pub const MAX_AFIP_ID: i64 = 32_767;

/// Largest price or amount a single field may hold: 12 digits, two of them
/// decimals (9,999,999,999.99).
pub const MAX_AMOUNT_CENTS: i64 = 999_999_999_999;

/// Largest computed document total: 15 digits, two of them decimals.
pub const MAX_TOTAL_CENTS: i64 = 999_999_999_999_999;

/// Longest CAE accepted.
///
/// AFIP issues 14-digit CAEs, so this is wider than the 12 characters older
/// schemas allowed for the column.
pub const MAX_CAE_DIGITS: usize = 14;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required text field.
///
/// ## Rules
/// - Must not be blank after trimming
/// - Must be at most `max` characters
///
/// ## Example
/// ```rust
/// use erp_core::validation::validate_required;
///
/// assert!(validate_required("name", "Responsable Inscripto", 50).is_ok());
/// assert!(validate_required("name", "   ", 50).is_err());
/// ```
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    validate_max_len(field, value, max)
}

/// Validates that an optional text field fits in `max` characters.
pub fn validate_max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a slug code.
///
/// ## Rules
/// - Blank is allowed (codes are optional on most master data)
/// - Only ASCII letters, digits, hyphens and underscores
/// - At most `max` characters
pub fn validate_slug(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    validate_max_len(field, value, max)?;

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a fraction (VAT rate or discount).
///
/// ## Rules
/// - Must be between 0.00 and 1.00 (0 to 10000 bps)
///
/// ## Example
/// ```rust
/// use erp_core::money::Fraction;
/// use erp_core::validation::validate_fraction;
///
/// assert!(validate_fraction("tax", Fraction::from_bps(2100)).is_ok());
/// assert!(validate_fraction("tax", Fraction::from_bps(10001)).is_err());
/// ```
pub fn validate_fraction(field: &str, value: Fraction) -> ValidationResult<()> {
    if value.bps() > BPS_PER_UNIT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 1,
        });
    }

    Ok(())
}

/// Validates an amount in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
/// - Must be at most [`MAX_AMOUNT_CENTS`]
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a line quantity.
///
/// ## Rules
/// - Must be between 0 and [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an AFIP point-of-sale id (a small unsigned integer).
pub fn validate_afip_id(id: i64) -> ValidationResult<()> {
    if !(0..=MAX_AFIP_ID).contains(&id) {
        return Err(ValidationError::OutOfRange {
            field: "afip_id".to_string(),
            min: 0,
            max: MAX_AFIP_ID,
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Rejects dates after `today`.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Repository: create invoice                                            │
/// │                                                                         │
/// │  today = Utc::now().date_naive()   (read once, in erp-db)              │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_not_future("invoice_date", date, today) ← THIS FUNCTION      │
/// │       │                                                                 │
/// │       ├── date > today? → Error: "invoice_date … is in the future"     │
/// │       │                                                                 │
/// │       └── OK → INSERT                                                  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_not_future(field: &str, date: NaiveDate, today: NaiveDate) -> ValidationResult<()> {
    if date > today {
        return Err(ValidationError::FutureDate {
            field: field.to_string(),
            date,
        });
    }

    Ok(())
}

/// Validates a period. Open ends are accepted.
pub fn validate_period(
    field: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ValidationResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ValidationError::InvalidPeriod {
                field: field.to_string(),
                start,
                end,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Argentine Identifiers
// =============================================================================

/// Mod-11 weights applied to the first ten CUIT digits.
const CUIT_WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

fn digits_without_hyphens(value: &str) -> Option<Vec<u32>> {
    value
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_digit(10))
        .collect()
}

/// Validates a CUIT or CUIL.
///
/// ## Rules
/// - Blank is allowed
/// - 11 digits, hyphens tolerated (`20-12345678-6`)
/// - Last digit is the mod-11 check digit
///
/// ## Example
/// ```rust
/// use erp_core::validation::validate_cuit;
///
/// assert!(validate_cuit("20123456786").is_ok());
/// assert!(validate_cuit("20-12345678-6").is_ok());
/// assert!(validate_cuit("20-12345678-7").is_err());
/// ```
pub fn validate_cuit(value: &str) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "cuit".to_string(),
        reason: reason.to_string(),
    };

    let digits = digits_without_hyphens(value).ok_or_else(|| invalid("must contain only digits"))?;
    if digits.len() != 11 {
        return Err(invalid("must have 11 digits"));
    }

    let sum: u32 = digits
        .iter()
        .zip(CUIT_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    let expected = match 11 - (sum % 11) {
        11 => 0,
        10 => return Err(invalid("check digit cannot be computed")),
        n => n,
    };

    if digits[10] != expected {
        return Err(invalid("check digit mismatch"));
    }

    Ok(())
}

/// Validates a national id number according to its type.
///
/// DNI is 7 or 8 digits; CUIT and CUIL go through [`validate_cuit`].
pub fn validate_tax_id(id_type: IdType, value: &str) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }

    match id_type {
        IdType::Dni => {
            let digits = value.chars().filter(|c| *c != '.').collect::<String>();
            if !(7..=8).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::InvalidFormat {
                    field: "id_number".to_string(),
                    reason: "DNI must have 7 or 8 digits".to_string(),
                });
            }
            Ok(())
        }
        IdType::Cuit | IdType::Cuil => validate_cuit(value),
    }
}

/// Validates a CAE authorization code: blank, or up to 14 digits.
pub fn validate_cae(value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Ok(());
    }

    if value.len() > MAX_CAE_DIGITS || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "cae".to_string(),
            reason: format!("must be at most {} digits", MAX_CAE_DIGITS),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string reference.
///
/// ## Example
/// ```rust
/// use erp_core::validation::validate_uuid;
///
/// assert!(validate_uuid("vat_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("vat_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates an optional UUID reference.
pub fn validate_optional_uuid(field: &str, id: Option<&str>) -> ValidationResult<()> {
    match id {
        Some(id) => validate_uuid(field, id),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("legal_name", "ACME S.A.", 300).is_ok());
        assert!(validate_required("legal_name", "", 300).is_err());
        assert_eq!(
            validate_required("name", &"a".repeat(51), 50),
            Err(ValidationError::TooLong {
                field: "name".to_string(),
                max: 50
            })
        );
        // Length counts characters, not bytes
        assert!(validate_required("name", &"ñ".repeat(50), 50).is_ok());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("code", "", 15).is_ok());
        assert!(validate_slug("code", "iva-21", 15).is_ok());
        assert!(validate_slug("code", "iva 21", 15).is_err());
        assert!(validate_slug("code", &"x".repeat(16), 15).is_err());
    }

    #[test]
    fn test_validate_fraction() {
        assert!(validate_fraction("discount", Fraction::zero()).is_ok());
        assert!(validate_fraction("discount", Fraction::one()).is_ok());
        assert!(validate_fraction("discount", Fraction::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(0).is_ok());
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_non_negative_cents() {
        assert!(validate_non_negative_cents("price", 0).is_ok());
        assert!(validate_non_negative_cents("price", 1099).is_ok());
        assert!(validate_non_negative_cents("price", -1).is_err());
        assert!(validate_non_negative_cents("price", MAX_AMOUNT_CENTS).is_ok());
        assert_eq!(
            validate_non_negative_cents("price", MAX_AMOUNT_CENTS + 1),
            Err(ValidationError::OutOfRange {
                field: "price".to_string(),
                min: 0,
                max: MAX_AMOUNT_CENTS,
            })
        );
    }

    #[test]
    fn test_validate_not_future() {
        let today = date(2024, 3, 15);
        assert!(validate_not_future("invoice_date", today, today).is_ok());
        assert!(validate_not_future("invoice_date", date(2024, 3, 14), today).is_ok());
        assert!(validate_not_future("invoice_date", date(2024, 3, 16), today).is_err());
    }

    #[test]
    fn test_validate_period() {
        let start = date(2024, 1, 1);
        let end = date(2024, 1, 31);
        assert!(validate_period("service", Some(start), Some(end)).is_ok());
        assert!(validate_period("service", Some(start), None).is_ok());
        assert!(validate_period("service", Some(end), Some(start)).is_err());
    }

    #[test]
    fn test_validate_afip_id() {
        assert!(validate_afip_id(1).is_ok());
        assert!(validate_afip_id(MAX_AFIP_ID).is_ok());
        assert!(validate_afip_id(-1).is_err());
        assert!(validate_afip_id(MAX_AFIP_ID + 1).is_err());
    }

    #[test]
    fn test_validate_cuit() {
        assert!(validate_cuit("").is_ok());
        assert!(validate_cuit("20-12345678-6").is_ok());
        assert!(validate_cuit("30712345671").is_ok());

        assert!(validate_cuit("20-12345678-5").is_err());
        assert!(validate_cuit("2012345678").is_err());
        assert!(validate_cuit("20-1234567A-6").is_err());
    }

    #[test]
    fn test_validate_tax_id() {
        assert!(validate_tax_id(IdType::Dni, "12345678").is_ok());
        assert!(validate_tax_id(IdType::Dni, "12.345.678").is_ok());
        assert!(validate_tax_id(IdType::Dni, "123456").is_err());
        assert!(validate_tax_id(IdType::Cuil, "20-12345678-6").is_ok());
        assert!(validate_tax_id(IdType::Cuit, "20-12345678-0").is_err());
    }

    #[test]
    fn test_validate_cae() {
        assert!(validate_cae("").is_ok());
        assert!(validate_cae("74123456789012").is_ok());
        assert!(validate_cae("741234567890123").is_err());
        assert!(validate_cae("7412A").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
        assert!(validate_optional_uuid("id", None).is_ok());
    }
}
