//! # Catalog Repository
//!
//! Invoicing master data: VAT rates, products, invoice types and the
//! fiscal-position allow-list.
//!
//! ## Protected References
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  vats ◄──(RESTRICT)── products ◄──(RESTRICT)── invoice_lines           │
//! │   ▲                      ▲                                              │
//! │   │                      └──────(RESTRICT)── quotation_lines           │
//! │   └──(RESTRICT)── quotation/sale line VAT overrides, AR subtotals      │
//! │                                                                         │
//! │  Deleting a row on the left while anything on the right points at it   │
//! │  fails with DbError::Protected.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use erp_core::validation::{validate_non_negative_cents, validate_uuid};
use erp_core::{
    InvoiceType, InvoiceTypeRule, Money, NewInvoiceType, NewProduct, NewVat, Product, Vat,
};

/// Repository for invoicing master data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // VAT
    // =========================================================================

    /// Creates a VAT rate. Names are unique; the rate must lie in [0, 1].
    pub async fn create_vat(&self, new: NewVat) -> DbResult<Vat> {
        new.validate()?;

        let vat = Vat {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            code: new.code,
            tax_bps: new.tax.bps(),
        };

        debug!(id = %vat.id, name = %vat.name, tax = %new.tax, "Creating VAT");

        sqlx::query("INSERT INTO vats (id, name, code, tax_bps) VALUES (?1, ?2, ?3, ?4)")
            .bind(&vat.id)
            .bind(&vat.name)
            .bind(&vat.code)
            .bind(vat.tax_bps)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::duplicate_on_insert(e, "name", &vat.name))?;

        Ok(vat)
    }

    pub async fn get_vat(&self, id: &str) -> DbResult<Option<Vat>> {
        let vat = sqlx::query_as::<_, Vat>("SELECT id, name, code, tax_bps FROM vats WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vat)
    }

    pub async fn get_vat_by_name(&self, name: &str) -> DbResult<Option<Vat>> {
        let vat =
            sqlx::query_as::<_, Vat>("SELECT id, name, code, tax_bps FROM vats WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(vat)
    }

    /// Lists VAT rates from lowest to highest.
    pub async fn list_vats(&self) -> DbResult<Vec<Vat>> {
        let vats = sqlx::query_as::<_, Vat>(
            "SELECT id, name, code, tax_bps FROM vats ORDER BY tax_bps, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(vats)
    }

    /// ## Errors
    /// * `Protected` - a product, line override or AR subtotal uses it
    pub async fn delete_vat(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM vats WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "VAT", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("VAT", id));
        }

        info!(id = %id, "VAT deleted");
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product.
    ///
    /// ## Errors
    /// * `UniqueViolation` - the company already has a product with this name
    pub async fn create_product(&self, new: NewProduct) -> DbResult<Product> {
        new.validate()?;

        let product = Product {
            id: Uuid::new_v4().to_string(),
            company_invoice_id: new.company_invoice_id,
            name: new.name,
            current_price_cents: new.current_price.map(|p| p.cents()),
            vat_id: new.vat_id,
        };

        debug!(
            id = %product.id,
            company_invoice_id = %product.company_invoice_id,
            name = %product.name,
            "Creating product"
        );

        sqlx::query(
            r#"
            INSERT INTO products (id, company_invoice_id, name, current_price_cents, vat_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(&product.company_invoice_id)
        .bind(&product.name)
        .bind(product.current_price_cents)
        .bind(&product.vat_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "name", &product.name))?;

        Ok(product)
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, company_invoice_id, name, current_price_cents, vat_id
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists a company's products ordered by name.
    pub async fn list_products_by_company(&self, company_invoice_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, company_invoice_id, name, current_price_cents, vat_id
            FROM products
            WHERE company_invoice_id = ?1
            ORDER BY name
            "#,
        )
        .bind(company_invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Sets or clears the current price. Existing lines keep their own
    /// `price_sold` and are not touched.
    pub async fn update_product_price(&self, id: &str, price: Option<Money>) -> DbResult<()> {
        if let Some(price) = price {
            validate_non_negative_cents("current_price", price.cents())?;
        }

        let result = sqlx::query("UPDATE products SET current_price_cents = ?2 WHERE id = ?1")
            .bind(id)
            .bind(price.map(|p| p.cents()))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, price = ?price, "Product price updated");
        Ok(())
    }

    /// ## Errors
    /// * `Protected` - an invoice, quotation or sale line uses it
    pub async fn delete_product(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "Product", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Invoice Types
    // =========================================================================

    /// Creates an invoice type. Non-blank codes are unique.
    pub async fn create_invoice_type(&self, new: NewInvoiceType) -> DbResult<InvoiceType> {
        new.validate()?;

        let invoice_type = InvoiceType {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            invoice_type_class: new.invoice_type_class,
            code: new.code,
        };

        debug!(
            id = %invoice_type.id,
            name = %invoice_type.name,
            class = invoice_type.invoice_type_class.label(),
            "Creating invoice type"
        );

        sqlx::query(
            "INSERT INTO invoice_types (id, name, invoice_type_class, code) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&invoice_type.id)
        .bind(&invoice_type.name)
        .bind(invoice_type.invoice_type_class)
        .bind(&invoice_type.code)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "code", &invoice_type.code))?;

        Ok(invoice_type)
    }

    pub async fn get_invoice_type(&self, id: &str) -> DbResult<Option<InvoiceType>> {
        let invoice_type = sqlx::query_as::<_, InvoiceType>(
            "SELECT id, name, invoice_type_class, code FROM invoice_types WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice_type)
    }

    /// Looks up an invoice type by its tax-authority code (e.g. `"1"` for
    /// Factura A).
    pub async fn get_invoice_type_by_code(&self, code: &str) -> DbResult<Option<InvoiceType>> {
        let invoice_type = sqlx::query_as::<_, InvoiceType>(
            "SELECT id, name, invoice_type_class, code FROM invoice_types WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice_type)
    }

    pub async fn list_invoice_types(&self) -> DbResult<Vec<InvoiceType>> {
        let invoice_types = sqlx::query_as::<_, InvoiceType>(
            "SELECT id, name, invoice_type_class, code FROM invoice_types ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(invoice_types)
    }

    // =========================================================================
    // Invoice Type Rules (allow-list)
    // =========================================================================

    /// Allows `issuer` to emit `invoice_type` to `receiver`.
    ///
    /// Idempotent: allowing an existing triple returns the stored rule.
    pub async fn allow_invoice_type(
        &self,
        issuer_fiscal_position_id: &str,
        invoice_type_id: &str,
        receiver_fiscal_position_id: &str,
    ) -> DbResult<InvoiceTypeRule> {
        validate_uuid("issuer_fiscal_position_id", issuer_fiscal_position_id)?;
        validate_uuid("invoice_type_id", invoice_type_id)?;
        validate_uuid("receiver_fiscal_position_id", receiver_fiscal_position_id)?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO invoice_type_rules (
                id, issuer_fiscal_position_id, invoice_type_id, receiver_fiscal_position_id
            ) VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(issuer_fiscal_position_id)
        .bind(invoice_type_id)
        .bind(receiver_fiscal_position_id)
        .execute(&self.pool)
        .await?;

        let rule = sqlx::query_as::<_, InvoiceTypeRule>(
            r#"
            SELECT id, issuer_fiscal_position_id, invoice_type_id, receiver_fiscal_position_id
            FROM invoice_type_rules
            WHERE issuer_fiscal_position_id = ?1
              AND invoice_type_id = ?2
              AND receiver_fiscal_position_id = ?3
            "#,
        )
        .bind(issuer_fiscal_position_id)
        .bind(invoice_type_id)
        .bind(receiver_fiscal_position_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            id = %rule.id,
            issuer = %issuer_fiscal_position_id,
            invoice_type = %invoice_type_id,
            receiver = %receiver_fiscal_position_id,
            "Invoice type allowed"
        );

        Ok(rule)
    }

    /// All rules whose issuer is `issuer_fiscal_position_id`.
    pub async fn list_rules_for_issuer(
        &self,
        issuer_fiscal_position_id: &str,
    ) -> DbResult<Vec<InvoiceTypeRule>> {
        let rules = sqlx::query_as::<_, InvoiceTypeRule>(
            r#"
            SELECT id, issuer_fiscal_position_id, invoice_type_id, receiver_fiscal_position_id
            FROM invoice_type_rules
            WHERE issuer_fiscal_position_id = ?1
            "#,
        )
        .bind(issuer_fiscal_position_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    pub async fn delete_rule(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM invoice_type_rules WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InvoiceTypeRule", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
