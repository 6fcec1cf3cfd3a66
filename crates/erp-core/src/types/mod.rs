//! # Domain Types
//!
//! Entities and enumerations of the invoicing and sales schema.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  party            accounting        invoice            invoice_ar       │
//! │  ─────────────    ─────────────     ─────────────      ─────────────    │
//! │  Company          Ledger            Vat                ContactInvoiceAr │
//! │  Contact          Account ◄──────── Product            CompanyInvoiceAr │
//! │  PhysicalAddress  Transaction ◄──── Invoice ◄───────── InvoiceAr        │
//! │  FiscalPosition                     InvoiceLine        PointOfSaleAr    │
//! │  CompanyInvoice ◄────────────────── InvoiceType        ConceptType      │
//! │  ContactInvoice                     InvoiceTypeRule    WebServiceSession│
//! │                                                                         │
//! │  sales                                                                  │
//! │  ─────────────                                                          │
//! │  ProductCategory   ProductSales   Quotation/Line   Sale/Line            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - `id`: UUID v4 string, immutable, used for relations
//! - Amounts are stored as `*_cents: i64`, rates as `*_bps: u32`; accessor
//!   methods return [`Money`](crate::money::Money) and
//!   [`Fraction`](crate::money::Fraction)
//! - Every entity has a `New*` input struct whose `validate(today)` runs the
//!   field rules before the row is written
//! - Status enums carry the legacy one/two-letter `code()` and a `label()`

mod accounting;
mod invoice;
mod invoice_ar;
mod party;
mod sales;

pub use accounting::*;
pub use invoice::*;
pub use invoice_ar::*;
pub use party::*;
pub use sales::*;
