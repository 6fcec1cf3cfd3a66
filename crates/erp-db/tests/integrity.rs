//! End-to-end referential integrity checks against an in-memory database.
//!
//! Each test drives the public repositories only; the constraints under
//! test are the ones the schema and the `New*` validators enforce together.

use chrono::{Duration, NaiveDate, Utc};
use erp_core::{
    AccountType, Company, CompanyInvoice, ContactInvoice, Fraction, FiscalPosition, Money,
    NewAccount, NewCompany, NewCompanyInvoice, NewCompanyInvoiceAr, NewContact,
    NewContactInvoice, NewFiscalPosition, NewInvoice, NewInvoiceLine, NewLedger,
    NewPhysicalAddress, NewPointOfSaleAr, NewProduct, NewQuotation, NewSale, NewSalesLine,
    NewTransaction, NewVat, PhysicalAddress, PointOfSaleType, Product, ValidationError, Vat,
};
use erp_db::{Database, DbConfig, DbError};

// =============================================================================
// Setup
// =============================================================================

struct Setup {
    db: Database,
    address: PhysicalAddress,
    position: FiscalPosition,
    company: Company,
    company_invoice: CompanyInvoice,
    contact_invoice: ContactInvoice,
    vat: Vat,
    product: Product,
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(1)
}

async fn company_invoice(
    db: &Database,
    name: &str,
    position: &FiscalPosition,
    address: &PhysicalAddress,
) -> (Company, CompanyInvoice) {
    let company = db
        .parties()
        .create_company(NewCompany { name: name.into() })
        .await
        .unwrap();

    let mut new = NewCompanyInvoice::new(company.id.clone(), format!("{name} S.R.L."));
    new.fiscal_position_id = Some(position.id.clone());
    new.fiscal_address_id = Some(address.id.clone());
    let company_invoice = db.parties().create_company_invoice(new).await.unwrap();

    (company, company_invoice)
}

async fn setup() -> Setup {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let parties = db.parties();

    let address = parties
        .create_address(NewPhysicalAddress {
            street_address: "San Martín 50".into(),
            city: "Rosario".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let position = parties
        .create_fiscal_position(NewFiscalPosition {
            name: "Responsable Inscripto".into(),
            code: "1".into(),
        })
        .await
        .unwrap();

    let (company, company_invoice) = company_invoice(&db, "Norte", &position, &address).await;

    let contact = parties
        .create_contact(NewContact {
            name: "Lucía".into(),
        })
        .await
        .unwrap();
    let contact_invoice = parties
        .create_contact_invoice(NewContactInvoice {
            contact_id: contact.id.clone(),
            legal_name: "Lucía Gómez".into(),
            fiscal_position_id: position.id.clone(),
            fiscal_address_id: address.id.clone(),
        })
        .await
        .unwrap();

    let vat = db
        .catalog()
        .create_vat(NewVat {
            name: "IVA 21%".into(),
            code: "5".into(),
            tax: Fraction::from_bps(2100),
        })
        .await
        .unwrap();
    let product = db
        .catalog()
        .create_product(NewProduct {
            company_invoice_id: company_invoice.id.clone(),
            name: "Yerba 1kg".into(),
            current_price: Some(Money::from_cents(350000)),
            vat_id: vat.id.clone(),
        })
        .await
        .unwrap();

    Setup {
        db,
        address,
        position,
        company,
        company_invoice,
        contact_invoice,
        vat,
        product,
    }
}

fn new_invoice(s: &Setup, date: NaiveDate) -> NewInvoice {
    NewInvoice::new(s.company_invoice.id.clone(), s.contact_invoice.id.clone(), date)
}

// =============================================================================
// Fractions stay within [0, 1]
// =============================================================================

#[tokio::test]
async fn vat_above_one_is_rejected() {
    let s = setup().await;

    let err = s
        .db
        .catalog()
        .create_vat(NewVat {
            name: "IVA 101%".into(),
            code: "x".into(),
            tax: Fraction::from_bps(10_100),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    // The bounds themselves are fine
    s.db.catalog()
        .create_vat(NewVat {
            name: "IVA 100%".into(),
            code: "y".into(),
            tax: Fraction::one(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn discounts_above_one_are_rejected() {
    let s = setup().await;
    let invoice = s
        .db
        .invoices()
        .create_invoice(new_invoice(&s, day(2024, 2, 1)))
        .await
        .unwrap();

    let mut line = NewInvoiceLine::new(s.product.id.clone(), 1);
    line.discount = Fraction::from_bps(10_001);
    let err = s.db.invoices().add_line(&invoice.id, line).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let quotation = s
        .db
        .sales()
        .create_quotation(NewQuotation {
            company_id: s.company.id.clone(),
            contact_ids: vec![],
            quotation_date: day(2024, 2, 1),
            notes: String::new(),
        })
        .await
        .unwrap();
    let mut line = NewSalesLine::new(s.product.id.clone(), 1);
    line.discount = Fraction::from_bps(20_000);
    let err = s
        .db
        .sales()
        .add_quotation_line(&quotation.id, line)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let mut full = NewSalesLine::new(s.product.id.clone(), 1);
    full.discount = Fraction::one();
    s.db.sales()
        .add_quotation_line(&quotation.id, full)
        .await
        .unwrap();
}

// =============================================================================
// Document dates are never in the future
// =============================================================================

#[tokio::test]
async fn future_document_dates_are_rejected() {
    let s = setup().await;
    let is_future = |err: &DbError| {
        matches!(err, DbError::Validation(ValidationError::FutureDate { .. }))
    };

    let err = s
        .db
        .invoices()
        .create_invoice(new_invoice(&s, tomorrow()))
        .await
        .unwrap_err();
    assert!(is_future(&err));

    let err = s
        .db
        .sales()
        .create_quotation(NewQuotation {
            company_id: s.company.id.clone(),
            contact_ids: vec![],
            quotation_date: tomorrow(),
            notes: String::new(),
        })
        .await
        .unwrap_err();
    assert!(is_future(&err));

    let err = s
        .db
        .sales()
        .create_sale(NewSale {
            company_id: s.company.id.clone(),
            contact_ids: vec![],
            sale_date: tomorrow(),
            notes: String::new(),
        })
        .await
        .unwrap_err();
    assert!(is_future(&err));

    // Today is accepted
    s.db.invoices()
        .create_invoice(new_invoice(&s, Utc::now().date_naive()))
        .await
        .unwrap();
}

// =============================================================================
// Uniqueness scoped to the owning company
// =============================================================================

#[tokio::test]
async fn product_name_unique_per_company() {
    let s = setup().await;
    let catalog = s.db.catalog();

    let duplicate = NewProduct {
        company_invoice_id: s.company_invoice.id.clone(),
        name: "Yerba 1kg".into(),
        current_price: None,
        vat_id: s.vat.id.clone(),
    };
    let err = catalog.create_product(duplicate.clone()).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    let (_, other) = company_invoice(&s.db, "Sur", &s.position, &s.address).await;
    catalog
        .create_product(NewProduct {
            company_invoice_id: other.id.clone(),
            ..duplicate
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn point_of_sale_number_unique_per_company() {
    let s = setup().await;
    let repo = s.db.invoices_ar();

    let norte = repo
        .create_company_ar(NewCompanyInvoiceAr {
            company_invoice_id: s.company_invoice.id.clone(),
            cuit: "20-12345678-6".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let (_, sur_invoice) = company_invoice(&s.db, "Sur", &s.position, &s.address).await;
    let sur = repo
        .create_company_ar(NewCompanyInvoiceAr {
            company_invoice_id: sur_invoice.id.clone(),
            ..Default::default()
        })
        .await
        .unwrap();

    let pos = |company_ar_id: &str| NewPointOfSaleAr {
        company_invoice_ar_id: company_ar_id.to_string(),
        afip_id: 3,
        fantasy_name: "Casa central".into(),
        point_of_sale_type: PointOfSaleType::WebService,
        fiscal_address_id: s.address.id.clone(),
    };

    repo.create_point_of_sale(pos(&norte.id)).await.unwrap();
    let err = repo.create_point_of_sale(pos(&norte.id)).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    repo.create_point_of_sale(pos(&sur.id)).await.unwrap();
}

// =============================================================================
// Shared master data is protected
// =============================================================================

#[tokio::test]
async fn referenced_vat_and_product_are_protected() {
    let s = setup().await;
    let invoice = s
        .db
        .invoices()
        .create_invoice(new_invoice(&s, day(2024, 2, 1)))
        .await
        .unwrap();
    s.db.invoices()
        .add_line(&invoice.id, NewInvoiceLine::new(s.product.id.clone(), 1))
        .await
        .unwrap();

    let err = s.db.catalog().delete_vat(&s.vat.id).await.unwrap_err();
    assert!(matches!(err, DbError::Protected { .. }));

    let err = s.db.catalog().delete_product(&s.product.id).await.unwrap_err();
    assert!(matches!(err, DbError::Protected { .. }));

    // Once the invoice is gone only the product still pins the VAT
    s.db.invoices().delete_invoice(&invoice.id).await.unwrap();
    s.db.catalog().delete_product(&s.product.id).await.unwrap();
    s.db.catalog().delete_vat(&s.vat.id).await.unwrap();
}

#[tokio::test]
async fn referenced_account_is_protected() {
    let s = setup().await;
    let accounting = s.db.accounting();

    let ledger = accounting
        .create_ledger(NewLedger {
            company_id: s.company.id.clone(),
            name: "General".into(),
        })
        .await
        .unwrap();
    let account = |code: &str| NewAccount {
        ledger_id: ledger.id.clone(),
        code: code.into(),
        name: code.to_uppercase(),
        account_type: Some(AccountType::Nominal),
    };
    let receivables = accounting.create_account(account("receivables")).await.unwrap();
    let revenue = accounting.create_account(account("revenue")).await.unwrap();

    let transaction = accounting
        .create_transaction(NewTransaction {
            amount: Money::from_cents(423500),
            debit_account_id: receivables.id.clone(),
            credit_account_id: revenue.id.clone(),
        })
        .await
        .unwrap();

    let invoice = s
        .db
        .invoices()
        .create_invoice(new_invoice(&s, day(2024, 2, 1)))
        .await
        .unwrap();
    s.db.invoices()
        .link_transaction(&invoice.id, &transaction.id)
        .await
        .unwrap();

    for id in [&receivables.id, &revenue.id] {
        let err = accounting.delete_account(id).await.unwrap_err();
        assert!(matches!(err, DbError::Protected { ref entity, .. } if entity == "Account"));
    }
}

#[tokio::test]
async fn referenced_fiscal_position_is_protected() {
    let s = setup().await;
    let parties = s.db.parties();

    let err = parties
        .delete_fiscal_position(&s.position.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Protected { .. }));

    let unused = parties
        .create_fiscal_position(NewFiscalPosition {
            name: "Exento".into(),
            code: "4".into(),
        })
        .await
        .unwrap();
    parties.delete_fiscal_position(&unused.id).await.unwrap();
}

// =============================================================================
// Extensions follow their owner
// =============================================================================

#[tokio::test]
async fn deleting_owner_cascades_to_extension() {
    let s = setup().await;
    let parties = s.db.parties();

    // A company without products or documents
    let (bare, bare_invoice) = company_invoice(&s.db, "Oeste", &s.position, &s.address).await;
    parties.delete_company(&bare.id).await.unwrap();
    assert!(parties
        .get_company_invoice(&bare_invoice.id)
        .await
        .unwrap()
        .is_none());

    let contact_id = s.contact_invoice.contact_id.clone();
    parties.delete_contact(&contact_id).await.unwrap();
    assert!(parties
        .get_contact_invoice_by_contact(&contact_id)
        .await
        .unwrap()
        .is_none());
}
