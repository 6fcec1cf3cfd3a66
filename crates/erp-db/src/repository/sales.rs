//! # Sales Repository
//!
//! Product categories, the sales extension of products, quotations and
//! sales.
//!
//! ## Document Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Quotation (Draft → Saved)                                              │
//! │     │ lines reference products                                          │
//! │     │                                                                   │
//! │     │ create_sale_from_quotation                                        │
//! │     │   • copies contacts and lines                                     │
//! │     │   • ensures a product_sales row per product                       │
//! │     │   • quotation → Sold (at most one sale per quotation)             │
//! │     ▼                                                                   │
//! │  Sale (Draft → Saved → Invoiced)                                        │
//! │       lines reference product_sales                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line price and VAT fall back to the product's when no override is set.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{totals_of, PricedLine};
use crate::error::{DbError, DbResult};
use erp_core::validation::validate_not_future;
use erp_core::{
    CoreError, DocumentTotals, NewProductCategory, NewQuotation, NewSale, NewSalesLine,
    ProductCategory, ProductSales, Quotation, QuotationLine, QuotationStatus, Sale, SaleLine,
    SaleStatus,
};

const QUOTATION_COLUMNS: &str =
    "id, company_id, quotation_date, subtotal_cents, total_cents, notes, status, created_at";

const SALE_COLUMNS: &str = "id, quotation_id, company_id, sale_date, subtotal_cents, \
     total_cents, notes, status, created_at";

const LINE_COLUMNS: &str = "product_id, product_price_override_cents, product_vat_override_id, \
     product_discount_bps, quantity";

/// The two line-carrying documents of this module.
#[derive(Debug, Clone, Copy)]
enum Document {
    Quotation,
    Sale,
}

impl Document {
    const fn entity(self) -> &'static str {
        match self {
            Document::Quotation => "Quotation",
            Document::Sale => "Sale",
        }
    }

    const fn table(self) -> &'static str {
        match self {
            Document::Quotation => "quotations",
            Document::Sale => "sales",
        }
    }

    const fn lines_table(self) -> &'static str {
        match self {
            Document::Quotation => "quotation_lines",
            Document::Sale => "sale_lines",
        }
    }

    const fn contacts_table(self) -> &'static str {
        match self {
            Document::Quotation => "quotation_contacts",
            Document::Sale => "sale_contacts",
        }
    }

    const fn parent_column(self) -> &'static str {
        match self {
            Document::Quotation => "quotation_id",
            Document::Sale => "sale_id",
        }
    }
}

/// Repository for the sales module.
#[derive(Debug, Clone)]
pub struct SalesRepository {
    pool: SqlitePool,
}

impl SalesRepository {
    /// Creates a new SalesRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SalesRepository { pool }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Creates a category. Names are unique per company.
    pub async fn create_category(&self, new: NewProductCategory) -> DbResult<ProductCategory> {
        new.validate()?;

        let category = ProductCategory {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id,
            name: new.name,
            description: new.description,
        };

        debug!(id = %category.id, name = %category.name, "Creating product category");

        sqlx::query(
            "INSERT INTO product_categories (id, company_id, name, description) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&category.id)
        .bind(&category.company_id)
        .bind(&category.name)
        .bind(&category.description)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "name", &category.name))?;

        Ok(category)
    }

    pub async fn list_categories(&self, company_id: &str) -> DbResult<Vec<ProductCategory>> {
        let categories = sqlx::query_as::<_, ProductCategory>(
            r#"
            SELECT id, company_id, name, description
            FROM product_categories
            WHERE company_id = ?1
            ORDER BY name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn delete_category(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM product_categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductCategory", id));
        }

        info!(id = %id, "Product category deleted");
        Ok(())
    }

    // =========================================================================
    // Product Sales Extension
    // =========================================================================

    /// Creates the sales extension of a product.
    pub async fn create_product_sales(
        &self,
        product_id: &str,
        description: &str,
    ) -> DbResult<ProductSales> {
        debug!(product_id = %product_id, "Creating product sales extension");

        sqlx::query("INSERT INTO product_sales (product_id, description) VALUES (?1, ?2)")
            .bind(product_id)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::duplicate_on_insert(e, "product_id", product_id))?;

        Ok(ProductSales {
            product_id: product_id.to_string(),
            description: description.to_string(),
        })
    }

    /// Returns the product's sales extension, creating an empty one first
    /// if needed.
    pub async fn ensure_product_sales(&self, product_id: &str) -> DbResult<ProductSales> {
        let mut conn = self.pool.acquire().await?;
        insert_product_sales_if_missing(&mut *conn, product_id).await?;

        let product_sales = sqlx::query_as::<_, ProductSales>(
            "SELECT product_id, description FROM product_sales WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(product_sales)
    }

    pub async fn get_product_sales(&self, product_id: &str) -> DbResult<Option<ProductSales>> {
        let product_sales = sqlx::query_as::<_, ProductSales>(
            "SELECT product_id, description FROM product_sales WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product_sales)
    }

    /// Puts a product in a category. Assigning twice is a no-op.
    pub async fn assign_category(&self, product_id: &str, category_id: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO product_sales_categories (product_id, category_id) VALUES (?1, ?2)",
        )
        .bind(product_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %product_id, category_id = %category_id, "Category assigned");
        Ok(())
    }

    pub async fn categories_of(&self, product_id: &str) -> DbResult<Vec<ProductCategory>> {
        let categories = sqlx::query_as::<_, ProductCategory>(
            r#"
            SELECT c.id, c.company_id, c.name, c.description
            FROM product_categories c
            INNER JOIN product_sales_categories pc ON pc.category_id = c.id
            WHERE pc.product_id = ?1
            ORDER BY c.name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    // =========================================================================
    // Quotations
    // =========================================================================

    /// Creates a draft quotation together with its contacts.
    ///
    /// ## Errors
    /// * `Validation` - future date or malformed ids
    /// * `ForeignKeyViolation` - unknown company or contact; nothing is kept
    pub async fn create_quotation(&self, new: NewQuotation) -> DbResult<Quotation> {
        new.validate(Utc::now().date_naive())?;

        let quotation = Quotation {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id,
            quotation_date: new.quotation_date,
            subtotal_cents: 0,
            total_cents: 0,
            notes: new.notes,
            status: QuotationStatus::Draft,
            created_at: Utc::now(),
        };

        debug!(
            id = %quotation.id,
            company_id = %quotation.company_id,
            contacts = new.contact_ids.len(),
            "Creating quotation"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO quotations (
                id, company_id, quotation_date, subtotal_cents, total_cents,
                notes, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&quotation.id)
        .bind(&quotation.company_id)
        .bind(quotation.quotation_date)
        .bind(quotation.subtotal_cents)
        .bind(quotation.total_cents)
        .bind(&quotation.notes)
        .bind(quotation.status)
        .bind(quotation.created_at)
        .execute(&mut *tx)
        .await?;

        insert_contacts(&mut *tx, Document::Quotation, &quotation.id, &new.contact_ids).await?;

        tx.commit().await?;

        Ok(quotation)
    }

    pub async fn get_quotation(&self, id: &str) -> DbResult<Option<Quotation>> {
        let sql = format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?1");
        let quotation = sqlx::query_as::<_, Quotation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quotation)
    }

    pub async fn quotation_contacts(&self, quotation_id: &str) -> DbResult<Vec<String>> {
        self.contacts(Document::Quotation, quotation_id).await
    }

    pub async fn add_quotation_line(
        &self,
        quotation_id: &str,
        new: NewSalesLine,
    ) -> DbResult<QuotationLine> {
        new.validate()?;

        let mut conn = self.pool.acquire().await?;
        let id = insert_line(&mut *conn, Document::Quotation, quotation_id, &new).await?;

        Ok(QuotationLine {
            id,
            quotation_id: quotation_id.to_string(),
            product_id: new.product_id,
            product_price_override_cents: new.price_override.map(|p| p.cents()),
            product_vat_override_id: new.vat_override_id,
            product_discount_bps: new.discount.bps(),
            quantity: new.quantity,
        })
    }

    pub async fn quotation_lines(&self, quotation_id: &str) -> DbResult<Vec<QuotationLine>> {
        let sql = format!(
            "SELECT id, quotation_id, {LINE_COLUMNS} FROM quotation_lines \
             WHERE quotation_id = ?1 ORDER BY rowid"
        );
        let lines = sqlx::query_as::<_, QuotationLine>(&sql)
            .bind(quotation_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    pub async fn recalculate_quotation_totals(&self, quotation_id: &str) -> DbResult<DocumentTotals> {
        self.recalculate(Document::Quotation, quotation_id).await
    }

    /// Sets the status without transition checks.
    pub async fn set_quotation_status(&self, id: &str, status: QuotationStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE quotations SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", id));
        }

        info!(id = %id, status = status.label(), "Quotation status changed");
        Ok(())
    }

    /// ## Errors
    /// * `Protected` - a sale was created from it
    pub async fn delete_quotation(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM quotations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "Quotation", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", id));
        }

        info!(id = %id, "Quotation deleted");
        Ok(())
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Creates a draft sale not linked to any quotation.
    pub async fn create_sale(&self, new: NewSale) -> DbResult<Sale> {
        new.validate(Utc::now().date_naive())?;

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            quotation_id: None,
            company_id: new.company_id,
            sale_date: new.sale_date,
            subtotal_cents: 0,
            total_cents: 0,
            notes: new.notes,
            status: SaleStatus::Draft,
            created_at: Utc::now(),
        };

        debug!(id = %sale.id, company_id = %sale.company_id, "Creating sale");

        let mut tx = self.pool.begin().await?;
        insert_sale(&mut *tx, &sale).await?;
        insert_contacts(&mut *tx, Document::Sale, &sale.id, &new.contact_ids).await?;
        tx.commit().await?;

        Ok(sale)
    }

    /// Turns a quotation into a sale.
    ///
    /// Contacts, lines and totals are copied, every quoted product gets a
    /// sales extension, and the quotation becomes Sold. All in one
    /// transaction.
    ///
    /// ## Errors
    /// * `NotFound` - unknown quotation
    /// * `Domain(QuotationAlreadySold)` - the quotation already has a sale
    /// * `Validation` - `sale_date` is in the future
    pub async fn create_sale_from_quotation(
        &self,
        quotation_id: &str,
        sale_date: NaiveDate,
    ) -> DbResult<Sale> {
        validate_not_future("sale_date", sale_date, Utc::now().date_naive())?;

        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?1");
        let quotation = sqlx::query_as::<_, Quotation>(&sql)
            .bind(quotation_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Quotation", quotation_id))?;

        if quotation.status == QuotationStatus::Sold {
            return Err(CoreError::QuotationAlreadySold(quotation.id).into());
        }

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            quotation_id: Some(quotation.id.clone()),
            company_id: quotation.company_id.clone(),
            sale_date,
            subtotal_cents: quotation.subtotal_cents,
            total_cents: quotation.total_cents,
            notes: quotation.notes.clone(),
            status: SaleStatus::Draft,
            created_at: Utc::now(),
        };

        insert_sale(&mut *tx, &sale)
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => {
                    DbError::Domain(CoreError::QuotationAlreadySold(quotation.id.clone()))
                }
                other => other,
            })?;

        sqlx::query(
            r#"
            INSERT INTO sale_contacts (sale_id, contact_id)
            SELECT ?1, contact_id FROM quotation_contacts WHERE quotation_id = ?2
            ORDER BY rowid
            "#,
        )
        .bind(&sale.id)
        .bind(&quotation.id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "SELECT id, quotation_id, {LINE_COLUMNS} FROM quotation_lines \
             WHERE quotation_id = ?1 ORDER BY rowid"
        );
        let quoted = sqlx::query_as::<_, QuotationLine>(&sql)
            .bind(&quotation.id)
            .fetch_all(&mut *tx)
            .await?;

        for line in &quoted {
            insert_product_sales_if_missing(&mut *tx, &line.product_id).await?;

            let sql = format!(
                "INSERT INTO sale_lines (id, sale_id, {LINE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            );
            sqlx::query(&sql)
                .bind(Uuid::new_v4().to_string())
                .bind(&sale.id)
                .bind(&line.product_id)
                .bind(line.product_price_override_cents)
                .bind(&line.product_vat_override_id)
                .bind(line.product_discount_bps)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE quotations SET status = ?2 WHERE id = ?1")
            .bind(&quotation.id)
            .bind(QuotationStatus::Sold)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            quotation_id = %quotation.id,
            lines = quoted.len(),
            "Sale created from quotation"
        );

        Ok(sale)
    }

    pub async fn get_sale(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    pub async fn sale_contacts(&self, sale_id: &str) -> DbResult<Vec<String>> {
        self.contacts(Document::Sale, sale_id).await
    }

    /// Adds a line, creating the product's sales extension if it has none.
    pub async fn add_sale_line(&self, sale_id: &str, new: NewSalesLine) -> DbResult<SaleLine> {
        new.validate()?;

        let mut tx = self.pool.begin().await?;
        insert_product_sales_if_missing(&mut *tx, &new.product_id).await?;
        let id = insert_line(&mut *tx, Document::Sale, sale_id, &new).await?;
        tx.commit().await?;

        Ok(SaleLine {
            id,
            sale_id: sale_id.to_string(),
            product_id: new.product_id,
            product_price_override_cents: new.price_override.map(|p| p.cents()),
            product_vat_override_id: new.vat_override_id,
            product_discount_bps: new.discount.bps(),
            quantity: new.quantity,
        })
    }

    pub async fn sale_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let sql = format!(
            "SELECT id, sale_id, {LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY rowid"
        );
        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    pub async fn recalculate_sale_totals(&self, sale_id: &str) -> DbResult<DocumentTotals> {
        self.recalculate(Document::Sale, sale_id).await
    }

    /// Sets the status without transition checks.
    pub async fn set_sale_status(&self, id: &str, status: SaleStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        info!(id = %id, status = status.label(), "Sale status changed");
        Ok(())
    }

    /// Deletes a sale with its lines and contacts.
    ///
    /// A quotation the sale came from goes back to `Saved`, so it can be
    /// sold again.
    pub async fn delete_sale(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let quotation_id =
            sqlx::query_scalar::<_, Option<String>>("SELECT quotation_id FROM sales WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(quotation_id) = quotation_id else {
            return Err(DbError::not_found("Sale", id));
        };

        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Some(quotation_id) = &quotation_id {
            sqlx::query("UPDATE quotations SET status = ?2 WHERE id = ?1 AND status = ?3")
                .bind(quotation_id)
                .bind(QuotationStatus::Saved)
                .bind(QuotationStatus::Sold)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(id = %id, quotation_id = ?quotation_id, "Sale deleted");
        Ok(())
    }

    // =========================================================================
    // Shared
    // =========================================================================

    async fn contacts(&self, document: Document, id: &str) -> DbResult<Vec<String>> {
        let sql = format!(
            "SELECT contact_id FROM {} WHERE {} = ?1 ORDER BY rowid",
            document.contacts_table(),
            document.parent_column()
        );
        let contacts = sqlx::query_scalar::<_, String>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(contacts)
    }

    async fn recalculate(&self, document: Document, id: &str) -> DbResult<DocumentTotals> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            SELECT
                COALESCE(l.product_vat_override_id, p.vat_id) AS vat_id,
                COALESCE(l.product_price_override_cents, p.current_price_cents, 0) AS unit_price_cents,
                l.quantity AS quantity,
                l.product_discount_bps AS discount_bps,
                v.tax_bps AS tax_bps
            FROM {lines} l
            INNER JOIN products p ON p.id = l.product_id
            INNER JOIN vats v ON v.id = COALESCE(l.product_vat_override_id, p.vat_id)
            WHERE l.{parent} = ?1
            ORDER BY l.rowid
            "#,
            lines = document.lines_table(),
            parent = document.parent_column(),
        );
        let lines = sqlx::query_as::<_, PricedLine>(&sql)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let totals = totals_of(&lines)?;

        let sql = format!(
            "UPDATE {} SET subtotal_cents = ?2, total_cents = ?3 WHERE id = ?1",
            document.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(totals.subtotal.cents())
            .bind(totals.total.cents())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(document.entity(), id));
        }

        tx.commit().await?;

        debug!(
            document = document.entity(),
            id = %id,
            total = %totals.total,
            "Totals recalculated"
        );

        Ok(totals)
    }
}

// =============================================================================
// Connection-level Helpers
// =============================================================================

async fn insert_product_sales_if_missing(conn: &mut SqliteConnection, product_id: &str) -> DbResult<()> {
    sqlx::query("INSERT OR IGNORE INTO product_sales (product_id) VALUES (?1)")
        .bind(product_id)
        .execute(conn)
        .await?;

    Ok(())
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, quotation_id, company_id, sale_date, subtotal_cents, total_cents,
            notes, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.quotation_id)
    .bind(&sale.company_id)
    .bind(sale.sale_date)
    .bind(sale.subtotal_cents)
    .bind(sale.total_cents)
    .bind(&sale.notes)
    .bind(sale.status)
    .bind(sale.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Links contacts to a document. Repeated ids are stored once.
async fn insert_contacts(
    conn: &mut SqliteConnection,
    document: Document,
    id: &str,
    contact_ids: &[String],
) -> DbResult<()> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, contact_id) VALUES (?1, ?2)",
        document.contacts_table(),
        document.parent_column()
    );

    for contact_id in contact_ids {
        sqlx::query(&sql)
            .bind(id)
            .bind(contact_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn insert_line(
    conn: &mut SqliteConnection,
    document: Document,
    parent_id: &str,
    new: &NewSalesLine,
) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();

    debug!(
        document = document.entity(),
        parent_id = %parent_id,
        product_id = %new.product_id,
        quantity = new.quantity,
        "Adding line"
    );

    let sql = format!(
        "INSERT INTO {} (id, {}, {LINE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        document.lines_table(),
        document.parent_column()
    );
    sqlx::query(&sql)
        .bind(&id)
        .bind(parent_id)
        .bind(&new.product_id)
        .bind(new.price_override.map(|p| p.cents()))
        .bind(&new.vat_override_id)
        .bind(new.discount.bps())
        .bind(new.quantity)
        .execute(conn)
        .await?;

    Ok(id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::fixtures::{date, db, world, World};
    use erp_core::{Fraction, Money, NewVat, ValidationError};

    fn new_quotation(w: &World) -> NewQuotation {
        NewQuotation {
            company_id: w.company.id.clone(),
            contact_ids: vec![w.contact.id.clone()],
            quotation_date: date(2024, 3, 1),
            notes: "Urgent".into(),
        }
    }

    async fn quoted(db: &Database, w: &World) -> Quotation {
        let repo = db.sales();
        let quotation = repo.create_quotation(new_quotation(w)).await.unwrap();
        repo.add_quotation_line(&quotation.id, NewSalesLine::new(w.product.id.clone(), 2))
            .await
            .unwrap();
        repo.recalculate_quotation_totals(&quotation.id).await.unwrap();
        repo.get_quotation(&quotation.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_category_name_unique_per_company() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();

        let category = NewProductCategory {
            company_id: w.company.id.clone(),
            name: "Hardware".into(),
            description: String::new(),
        };
        repo.create_category(category.clone()).await.unwrap();

        let err = repo.create_category(category).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "Hardware"));
        assert_eq!(repo.list_categories(&w.company.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_product_sales_and_categories() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();

        assert!(repo.get_product_sales(&w.product.id).await.unwrap().is_none());
        let first = repo.ensure_product_sales(&w.product.id).await.unwrap();
        let second = repo.ensure_product_sales(&w.product.id).await.unwrap();
        assert_eq!(first, second);

        let err = repo
            .create_product_sales(&w.product.id, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let tools = repo
            .create_category(NewProductCategory {
                company_id: w.company.id.clone(),
                name: "Tools".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let gifts = repo
            .create_category(NewProductCategory {
                company_id: w.company.id.clone(),
                name: "Gifts".into(),
                description: String::new(),
            })
            .await
            .unwrap();

        repo.assign_category(&w.product.id, &tools.id).await.unwrap();
        repo.assign_category(&w.product.id, &tools.id).await.unwrap();
        repo.assign_category(&w.product.id, &gifts.id).await.unwrap();

        let names: Vec<_> = repo
            .categories_of(&w.product.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Gifts", "Tools"]);

        repo.delete_category(&gifts.id).await.unwrap();
        assert_eq!(repo.categories_of(&w.product.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_quotation_with_contacts() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();

        let mut new = new_quotation(&w);
        new.contact_ids.push(w.contact.id.clone());
        let quotation = repo.create_quotation(new).await.unwrap();

        assert_eq!(quotation.status, QuotationStatus::Draft);
        assert_eq!(
            repo.quotation_contacts(&quotation.id).await.unwrap(),
            vec![w.contact.id.clone()]
        );
    }

    #[tokio::test]
    async fn test_quotation_rejects_future_date_and_unknown_contact() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();

        let mut future = new_quotation(&w);
        future.quotation_date = Utc::now().date_naive() + chrono::Duration::days(3);
        let err = repo.create_quotation(future).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::FutureDate { .. })
        ));

        let mut stranger = new_quotation(&w);
        stranger.contact_ids = vec![Uuid::new_v4().to_string()];
        let err = repo.create_quotation(stranger).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_quotation_totals_use_overrides() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();
        let reduced = db
            .catalog()
            .create_vat(NewVat {
                name: "IVA 10.5%".into(),
                code: "4".into(),
                tax: Fraction::from_bps(1050),
            })
            .await
            .unwrap();

        let quotation = repo.create_quotation(new_quotation(&w)).await.unwrap();

        let mut overridden = NewSalesLine::new(w.product.id.clone(), 2);
        overridden.price_override = Some(Money::from_cents(5000));
        overridden.vat_override_id = Some(reduced.id.clone());
        repo.add_quotation_line(&quotation.id, overridden).await.unwrap();

        let mut discounted = NewSalesLine::new(w.product.id.clone(), 1);
        discounted.discount = Fraction::from_bps(1000);
        repo.add_quotation_line(&quotation.id, discounted).await.unwrap();

        let totals = repo.recalculate_quotation_totals(&quotation.id).await.unwrap();

        // 100.00 at 10.5 % plus 90.00 at 21 %
        assert_eq!(totals.subtotal.cents(), 19000);
        assert_eq!(totals.vat_total.cents(), 1050 + 1890);
        assert_eq!(totals.vat_breakdown[0].vat_id, reduced.id);

        let stored = repo.get_quotation(&quotation.id).await.unwrap().unwrap();
        assert_eq!(stored.total(), Money::from_cents(21940));
        assert_eq!(repo.quotation_lines(&quotation.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_recalculate_missing_document() {
        let db = db().await;
        let missing = Uuid::new_v4().to_string();

        let err = db
            .sales()
            .recalculate_sale_totals(&missing)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Sale"));
    }

    #[tokio::test]
    async fn test_sale_from_quotation() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();
        let quotation = quoted(&db, &w).await;

        let sale = repo
            .create_sale_from_quotation(&quotation.id, date(2024, 3, 5))
            .await
            .unwrap();

        assert_eq!(sale.quotation_id.as_deref(), Some(quotation.id.as_str()));
        assert_eq!(sale.total_cents, quotation.total_cents);
        assert_eq!(sale.notes, "Urgent");
        assert_eq!(repo.sale_contacts(&sale.id).await.unwrap(), vec![w.contact.id.clone()]);

        let lines = repo.sale_lines(&sale.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, w.product.id);
        assert_eq!(lines[0].quantity, 2);
        assert!(repo.get_product_sales(&w.product.id).await.unwrap().is_some());

        let quotation = repo.get_quotation(&quotation.id).await.unwrap().unwrap();
        assert_eq!(quotation.status, QuotationStatus::Sold);

        let totals = repo.recalculate_sale_totals(&sale.id).await.unwrap();
        assert_eq!(totals.total.cents(), quotation.total_cents);
    }

    #[tokio::test]
    async fn test_one_sale_per_quotation() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();
        let quotation = quoted(&db, &w).await;

        repo.create_sale_from_quotation(&quotation.id, date(2024, 3, 5))
            .await
            .unwrap();

        let err = repo
            .create_sale_from_quotation(&quotation.id, date(2024, 3, 6))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::QuotationAlreadySold(ref id)) if *id == quotation.id
        ));

        // Reopening the quotation does not allow a second sale either
        repo.set_quotation_status(&quotation.id, QuotationStatus::Saved)
            .await
            .unwrap();
        let err = repo
            .create_sale_from_quotation(&quotation.id, date(2024, 3, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::QuotationAlreadySold(_))));
    }

    #[tokio::test]
    async fn test_sold_quotation_is_protected() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();
        let quotation = quoted(&db, &w).await;
        let sale = repo
            .create_sale_from_quotation(&quotation.id, date(2024, 3, 5))
            .await
            .unwrap();

        let err = repo.delete_quotation(&quotation.id).await.unwrap_err();
        assert!(matches!(err, DbError::Protected { .. }));

        repo.delete_sale(&sale.id).await.unwrap();
        repo.delete_quotation(&quotation.id).await.unwrap();
        assert!(repo.get_quotation(&quotation.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_sale_reopens_quotation() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();
        let quotation = quoted(&db, &w).await;
        let sale = repo
            .create_sale_from_quotation(&quotation.id, date(2024, 3, 5))
            .await
            .unwrap();

        repo.delete_sale(&sale.id).await.unwrap();

        let reopened = repo.get_quotation(&quotation.id).await.unwrap().unwrap();
        assert_eq!(reopened.status, QuotationStatus::Saved);

        let again = repo
            .create_sale_from_quotation(&quotation.id, date(2024, 3, 6))
            .await
            .unwrap();
        assert_eq!(again.quotation_id.as_deref(), Some(quotation.id.as_str()));

        let err = repo.delete_sale(&sale.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sale_line_ensures_product_sales() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();

        let sale = repo
            .create_sale(NewSale {
                company_id: w.company.id.clone(),
                contact_ids: vec![w.contact.id.clone()],
                sale_date: date(2024, 4, 1),
                notes: String::new(),
            })
            .await
            .unwrap();
        assert!(sale.quotation_id.is_none());

        let line = repo
            .add_sale_line(&sale.id, NewSalesLine::new(w.product.id.clone(), 3))
            .await
            .unwrap();
        assert_eq!(line.product_discount_bps, 0);
        assert!(repo.get_product_sales(&w.product.id).await.unwrap().is_some());

        let totals = repo.recalculate_sale_totals(&sale.id).await.unwrap();
        assert_eq!(totals.total.cents(), 36300);

        // products → product_sales cascades, sale_lines restricts
        let err = db.catalog().delete_product(&w.product.id).await.unwrap_err();
        assert!(matches!(err, DbError::Protected { .. }));

        repo.set_sale_status(&sale.id, SaleStatus::Invoiced).await.unwrap();
        let stored = repo.get_sale(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SaleStatus::Invoiced);
    }

    #[tokio::test]
    async fn test_sale_line_validation() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.sales();
        let quotation = repo.create_quotation(new_quotation(&w)).await.unwrap();

        let err = repo
            .add_quotation_line(&quotation.id, NewSalesLine::new(w.product.id.clone(), -1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }
}
