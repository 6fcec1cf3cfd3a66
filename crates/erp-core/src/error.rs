//! # Error Types
//!
//! Domain-specific error types for erp-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  erp-core errors (this file)                                           │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Field-level validation failures                │
//! │                                                                         │
//! │  erp-db errors (separate crate)                                        │
//! │  └── DbError          - Constraint and connection failures             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The issuer's fiscal position may not emit this invoice type to the
    /// receiver's fiscal position.
    ///
    /// ## When This Occurs
    /// - A monotributista tries to issue a type "A" bill
    /// - A type "A" bill is addressed to a final consumer
    #[error("Invoice type {invoice_type_id} is not allowed from fiscal position {issuer_id} to {receiver_id}")]
    InvoiceTypeNotAllowed {
        issuer_id: String,
        invoice_type_id: String,
        receiver_id: String,
    },

    /// A quotation can only be turned into one sale.
    #[error("Quotation {0} has already been sold")]
    QuotationAlreadySold(String),

    /// A document has no lines to total.
    #[error("{document} {id} has no lines")]
    EmptyDocument { document: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These mirror the field constraints of the schema: lengths, slug formats,
/// fraction ranges and "not in the future" dates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (slug, tax id, UUID, CAE, decimal text).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Date lies after the reference day.
    #[error("{field} {date} is in the future")]
    FutureDate { field: String, date: NaiveDate },

    /// Period start is after its end.
    #[error("{field} starts on {start} but ends on {end}")]
    InvalidPeriod {
        field: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
