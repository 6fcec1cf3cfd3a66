//! # Repository Module
//!
//! Database repository implementations for the invoicing and sales schema.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │  db.invoices().create_invoice(new)                             │
//! │       ▼                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐                  │
//! │  │   Party      │  │  Accounting  │  │   Catalog    │  master data     │
//! │  └──────────────┘  └──────────────┘  └──────────────┘                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐                  │
//! │  │   Invoice    │  │  InvoiceAr   │  │    Sales     │  documents       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘                  │
//! │       │                                                                 │
//! │       │  runtime-checked SQL (sqlx::query / query_as)                  │
//! │       ▼                                                                 │
//! │  SQLite (RESTRICT / CASCADE / UNIQUE / CHECK enforced by schema)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`PartyRepository`] - Companies, contacts, addresses, fiscal positions
//! - [`AccountingRepository`] - Ledgers, accounts, transactions
//! - [`CatalogRepository`] - VAT, products, invoice types, allow-list
//! - [`InvoiceRepository`] - Invoices and their lines
//! - [`InvoiceArRepository`] - AFIP sessions, points of sale, AR invoices
//! - [`SalesRepository`] - Categories, quotations, sales

pub mod accounting;
pub mod catalog;
pub mod invoice;
pub mod invoice_ar;
pub mod party;
pub mod sales;

pub use accounting::AccountingRepository;
pub use catalog::CatalogRepository;
pub use invoice::InvoiceRepository;
pub use invoice_ar::InvoiceArRepository;
pub use party::PartyRepository;
pub use sales::SalesRepository;

use erp_core::validation::ValidationResult;
use erp_core::{DocumentTotals, Fraction, LineAmounts, Money};

/// A document line with its effective price and VAT already resolved
/// (overrides first, then the product's own values).
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PricedLine {
    pub vat_id: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub discount_bps: u32,
    pub tax_bps: u32,
}

/// Totals for a set of priced lines, breakdown ordered by first appearance.
///
/// Fails with `OutOfRange` when a line or the document overflows.
pub(crate) fn totals_of(lines: &[PricedLine]) -> ValidationResult<DocumentTotals> {
    let amounts = lines
        .iter()
        .map(|line| {
            LineAmounts::compute(
                Money::from_cents(line.unit_price_cents),
                line.quantity,
                Fraction::from_bps(line.discount_bps),
                Fraction::from_bps(line.tax_bps),
            )
            .map(|amounts| (line.vat_id.as_str(), amounts))
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    DocumentTotals::from_lines(amounts)
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal master data shared by repository tests.

    use chrono::NaiveDate;
    use erp_core::*;

    use crate::pool::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// An issuer with an invoicing extension, a receiver with one, a 21 %
    /// VAT and one product priced at 100.00.
    pub struct World {
        pub company: Company,
        pub company_invoice: CompanyInvoice,
        pub contact: Contact,
        pub contact_invoice: ContactInvoice,
        pub issuer_position: FiscalPosition,
        pub receiver_position: FiscalPosition,
        pub address: PhysicalAddress,
        pub vat: Vat,
        pub product: Product,
    }

    pub async fn world(db: &Database) -> World {
        let parties = db.parties();
        let catalog = db.catalog();

        let company = parties
            .create_company(NewCompany {
                name: "Acme".into(),
            })
            .await
            .unwrap();
        let contact = parties
            .create_contact(NewContact {
                name: "Jane".into(),
            })
            .await
            .unwrap();
        let address = parties
            .create_address(NewPhysicalAddress {
                street_address: "Av. Corrientes 1234".into(),
                city: "Buenos Aires".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let issuer_position = parties
            .create_fiscal_position(NewFiscalPosition {
                name: "Responsable Inscripto".into(),
                code: "ri".into(),
            })
            .await
            .unwrap();
        let receiver_position = parties
            .create_fiscal_position(NewFiscalPosition {
                name: "Consumidor Final".into(),
                code: "cf".into(),
            })
            .await
            .unwrap();

        let mut new_company_invoice = NewCompanyInvoice::new(company.id.clone(), "Acme S.A.");
        new_company_invoice.fiscal_position_id = Some(issuer_position.id.clone());
        new_company_invoice.fiscal_address_id = Some(address.id.clone());
        let company_invoice = parties
            .create_company_invoice(new_company_invoice)
            .await
            .unwrap();

        let contact_invoice = parties
            .create_contact_invoice(NewContactInvoice {
                contact_id: contact.id.clone(),
                legal_name: "Jane Doe".into(),
                fiscal_position_id: receiver_position.id.clone(),
                fiscal_address_id: address.id.clone(),
            })
            .await
            .unwrap();

        let vat = catalog
            .create_vat(NewVat {
                name: "IVA 21%".into(),
                code: "5".into(),
                tax: Fraction::from_bps(2100),
            })
            .await
            .unwrap();
        let product = catalog
            .create_product(NewProduct {
                company_invoice_id: company_invoice.id.clone(),
                name: "Widget".into(),
                current_price: Some(Money::from_cents(10000)),
                vat_id: vat.id.clone(),
            })
            .await
            .unwrap();

        World {
            company,
            company_invoice,
            contact,
            contact_invoice,
            issuer_position,
            receiver_position,
            address,
            vat,
            product,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
