//! # Invoice Repository
//!
//! Invoices and invoice lines.
//!
//! ## Creating an Invoice
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_invoice(new)                                                    │
//! │       │                                                                 │
//! │       ├── validate fields (date not in the future, ids, number ≥ 0)    │
//! │       │                                                                 │
//! │       ├── invoice type given?                                          │
//! │       │     issuer position  = company_invoices.fiscal_position_id     │
//! │       │     receiver position = contact_invoices.fiscal_position_id    │
//! │       │     rules for issuer → check_invoice_type_allowed              │
//! │       │                                                                 │
//! │       ├── number missing? → next_number(company, type)                 │
//! │       ▼                                                                 │
//! │  INSERT invoices (status = draft, totals = 0)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines belong to their invoice and are deleted with it. Totals are not
//! maintained on every write; call [`InvoiceRepository::recalculate_totals`]
//! after changing lines.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{totals_of, PricedLine};
use crate::error::{DbError, DbResult};
use erp_core::rules::check_invoice_type_allowed;
use erp_core::validation::validate_uuid;
use erp_core::{
    DocumentTotals, Invoice, InvoiceLine, InvoiceStatus, InvoiceTypeRule, NewInvoice,
    NewInvoiceLine,
};

const INVOICE_COLUMNS: &str = "id, company_invoice_id, contact_invoice_id, related_invoice_id, \
     number, invoice_type_id, invoice_date, status, subtotal_cents, total_cents, notes, \
     transaction_id, created_at";

/// Repository for invoices and their lines.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Creates a draft invoice.
    ///
    /// ## Errors
    /// * `Validation` - invoice date in the future, malformed ids
    /// * `NotFound` - the company or contact has no invoicing extension
    /// * `Domain(InvoiceTypeNotAllowed)` - the issuer's fiscal position may
    ///   not emit this type to the receiver's
    pub async fn create_invoice(&self, new: NewInvoice) -> DbResult<Invoice> {
        new.validate(Utc::now().date_naive())?;

        if let Some(invoice_type_id) = new.invoice_type_id.as_deref() {
            self.check_type_allowed(&new.company_invoice_id, invoice_type_id, &new.contact_invoice_id)
                .await?;
        }

        let number = match new.number {
            Some(number) => number,
            None => {
                self.next_number(&new.company_invoice_id, new.invoice_type_id.as_deref())
                    .await?
            }
        };

        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            company_invoice_id: new.company_invoice_id,
            contact_invoice_id: new.contact_invoice_id,
            related_invoice_id: new.related_invoice_id,
            number,
            invoice_type_id: new.invoice_type_id,
            invoice_date: new.invoice_date,
            status: InvoiceStatus::Draft,
            subtotal_cents: 0,
            total_cents: 0,
            notes: new.notes,
            transaction_id: None,
            created_at: Utc::now(),
        };

        debug!(
            id = %invoice.id,
            company_invoice_id = %invoice.company_invoice_id,
            number = invoice.number,
            "Creating invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, company_invoice_id, contact_invoice_id, related_invoice_id,
                number, invoice_type_id, invoice_date, status,
                subtotal_cents, total_cents, notes, transaction_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.company_invoice_id)
        .bind(&invoice.contact_invoice_id)
        .bind(&invoice.related_invoice_id)
        .bind(invoice.number)
        .bind(&invoice.invoice_type_id)
        .bind(invoice.invoice_date)
        .bind(invoice.status)
        .bind(invoice.subtotal_cents)
        .bind(invoice.total_cents)
        .bind(&invoice.notes)
        .bind(&invoice.transaction_id)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Enforces the allow-list for one invoice.
    ///
    /// Skipped when the issuing company has no fiscal position.
    async fn check_type_allowed(
        &self,
        company_invoice_id: &str,
        invoice_type_id: &str,
        contact_invoice_id: &str,
    ) -> DbResult<()> {
        let issuer = sqlx::query_scalar::<_, Option<String>>(
            "SELECT fiscal_position_id FROM company_invoices WHERE id = ?1",
        )
        .bind(company_invoice_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("CompanyInvoice", company_invoice_id))?;

        let receiver = sqlx::query_scalar::<_, String>(
            "SELECT fiscal_position_id FROM contact_invoices WHERE id = ?1",
        )
        .bind(contact_invoice_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("ContactInvoice", contact_invoice_id))?;

        let Some(issuer) = issuer else {
            return Ok(());
        };

        let rules = sqlx::query_as::<_, InvoiceTypeRule>(
            r#"
            SELECT id, issuer_fiscal_position_id, invoice_type_id, receiver_fiscal_position_id
            FROM invoice_type_rules
            WHERE issuer_fiscal_position_id = ?1
            "#,
        )
        .bind(&issuer)
        .fetch_all(&self.pool)
        .await?;

        check_invoice_type_allowed(&rules, &issuer, invoice_type_id, &receiver)?;
        Ok(())
    }

    pub async fn get_invoice(&self, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Lists a company's invoices by date, then number.
    pub async fn list_by_company(&self, company_invoice_id: &str) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE company_invoice_id = ?1 \
             ORDER BY invoice_date, number"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(company_invoice_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(invoices)
    }

    /// Next free number for a company and invoice type (`MAX + 1`, from 1).
    ///
    /// Invoices without a type share their own sequence.
    pub async fn next_number(
        &self,
        company_invoice_id: &str,
        invoice_type_id: Option<&str>,
    ) -> DbResult<i64> {
        let next: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(number), 0) + 1
            FROM invoices
            WHERE company_invoice_id = ?1 AND invoice_type_id IS ?2
            "#,
        )
        .bind(company_invoice_id)
        .bind(invoice_type_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }

    /// Sets the status. Any transition is accepted.
    pub async fn set_status(&self, id: &str, status: InvoiceStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE invoices SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        info!(id = %id, status = status.label(), "Invoice status changed");
        Ok(())
    }

    /// Links the accounting transaction that booked this invoice.
    pub async fn link_transaction(&self, id: &str, transaction_id: &str) -> DbResult<()> {
        validate_uuid("transaction_id", transaction_id)?;

        let result = sqlx::query("UPDATE invoices SET transaction_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(transaction_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        debug!(id = %id, transaction_id = %transaction_id, "Invoice linked to transaction");
        Ok(())
    }

    /// Deletes an invoice with its lines and AR extension.
    ///
    /// ## Errors
    /// * `Protected` - another invoice (e.g. a credit note) refers to it
    pub async fn delete_invoice(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "Invoice", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        info!(id = %id, "Invoice deleted");
        Ok(())
    }

    // =========================================================================
    // Lines
    // =========================================================================

    pub async fn add_line(&self, invoice_id: &str, new: NewInvoiceLine) -> DbResult<InvoiceLine> {
        new.validate()?;

        let line = InvoiceLine {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            product_id: new.product_id,
            price_sold_cents: new.price_sold.map(|p| p.cents()),
            discount_bps: new.discount.bps(),
            quantity: new.quantity,
            description: new.description,
        };

        debug!(invoice_id = %invoice_id, product_id = %line.product_id, "Adding invoice line");

        sqlx::query(
            r#"
            INSERT INTO invoice_lines (
                id, invoice_id, product_id, price_sold_cents, discount_bps, quantity, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&line.id)
        .bind(&line.invoice_id)
        .bind(&line.product_id)
        .bind(line.price_sold_cents)
        .bind(line.discount_bps)
        .bind(line.quantity)
        .bind(&line.description)
        .execute(&self.pool)
        .await?;

        Ok(line)
    }

    /// Lines in insertion order.
    pub async fn lines(&self, invoice_id: &str) -> DbResult<Vec<InvoiceLine>> {
        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT id, invoice_id, product_id, price_sold_cents, discount_bps, quantity, description
            FROM invoice_lines
            WHERE invoice_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Recomputes and stores `subtotal` and `total` from the lines.
    ///
    /// A line without `price_sold` uses the product's current price (zero
    /// when the product has none).
    pub async fn recalculate_totals(&self, invoice_id: &str) -> DbResult<DocumentTotals> {
        let mut tx = self.pool.begin().await?;

        let lines = priced_lines(&mut *tx, invoice_id).await?;
        let totals = totals_of(&lines)?;

        let result =
            sqlx::query("UPDATE invoices SET subtotal_cents = ?2, total_cents = ?3 WHERE id = ?1")
                .bind(invoice_id)
                .bind(totals.subtotal.cents())
                .bind(totals.total.cents())
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", invoice_id));
        }

        tx.commit().await?;

        debug!(
            invoice_id = %invoice_id,
            subtotal = %totals.subtotal,
            total = %totals.total,
            "Invoice totals recalculated"
        );

        Ok(totals)
    }
}

/// Invoice lines with price and VAT resolved through the product.
pub(crate) async fn priced_lines(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Vec<PricedLine>> {
    let lines = sqlx::query_as::<_, PricedLine>(
        r#"
        SELECT
            p.vat_id AS vat_id,
            COALESCE(l.price_sold_cents, p.current_price_cents, 0) AS unit_price_cents,
            l.quantity AS quantity,
            l.discount_bps AS discount_bps,
            v.tax_bps AS tax_bps
        FROM invoice_lines l
        INNER JOIN products p ON p.id = l.product_id
        INNER JOIN vats v ON v.id = p.vat_id
        WHERE l.invoice_id = ?1
        ORDER BY l.rowid
        "#,
    )
    .bind(invoice_id)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

// =============================================================================
// Unit Tests
// =============================================================================
