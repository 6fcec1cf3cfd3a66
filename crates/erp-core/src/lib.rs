//! # erp-core: Domain Types and Rules for ERP Invoicing
//!
//! Entities, validation and document arithmetic for the invoicing and sales
//! schema, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ERP Invoicing Workspace                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ erp-core (THIS CRATE) ★                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │ validation│  │   │
//! │  │   │  Invoice  │  │   Money   │  │ LineAmts  │  │   rules   │  │   │
//! │  │   │  Product  │  │ Fraction  │  │ DocTotals │  │  (allow-  │  │   │
//! │  │   │  Sale ... │  │           │  │           │  │   list)   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    erp-db (Database Layer)                      │   │
//! │  │        SQLite schema, migrations, repositories, seed data       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities and enumerations (FiscalPosition, Invoice, InvoiceAr, Sale, ...)
//! - [`money`] - `Money` in cents and `Fraction` in basis points
//! - [`totals`] - Line and document totals with VAT breakdown
//! - [`rules`] - Fiscal position / invoice type allow-list
//! - [`validation`] - Field rules (lengths, fractions, dates, CUIT, CAE)
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use erp_core::money::{Fraction, Money};
//! use erp_core::totals::{DocumentTotals, LineAmounts};
//!
//! let vat_21 = Fraction::from_bps(2100);
//! let line = LineAmounts::compute(Money::from_cents(10000), 2, Fraction::zero(), vat_21)?;
//!
//! let totals = DocumentTotals::from_lines([("iva-21", line)])?;
//! assert_eq!(totals.subtotal.cents(), 20000);
//! assert_eq!(totals.vat_total.cents(), 4200);
//! assert_eq!(totals.total.to_string(), "$242.00");
//! # Ok::<(), erp_core::ValidationError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod rules;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Fraction, Money};
pub use totals::{DocumentTotals, LineAmounts, VatSubtotal};
pub use types::*;
