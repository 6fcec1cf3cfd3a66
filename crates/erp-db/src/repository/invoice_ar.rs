//! # Argentina Invoice Repository
//!
//! AFIP-specific extensions: taxpayer ids, webservice sessions, points of
//! sale, concept types and the AR side of invoices.
//!
//! ## Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  invoices (base)                                                        │
//! │     │ id                                                                │
//! │     ▼                                                                   │
//! │  invoices_ar (PK = invoice_id, ON DELETE CASCADE)                       │
//! │     │  point of sale, concept, service period, CAE                     │
//! │     ▼                                                                   │
//! │  invoice_ar_vat_subtotals (one row per VAT rate, CASCADE)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! 1. `create_invoice` on [`InvoiceRepository`](super::InvoiceRepository)
//! 2. `create_invoice_ar` with the point of sale and concept
//! 3. add lines, then `recalculate_vat`
//! 4. `authorize` with the CAE returned by AFIP → status Authorized

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::invoice::priced_lines;
use super::totals_of;
use crate::error::{DbError, DbResult};
use erp_core::{
    CaeAuthorization, CompanyInvoiceAr, ConceptType, ContactInvoiceAr, DocumentTotals,
    InvoiceAr, InvoiceArVatSubtotal, InvoiceStatus, NewCompanyInvoiceAr, NewConceptType,
    NewContactInvoiceAr, NewInvoiceAr, NewPointOfSaleAr, NewWebServiceSession, PointOfSaleAr,
    ValidationError, WebServiceSession,
};

const INVOICE_AR_COLUMNS: &str = "invoice_id, company_invoice_ar_id, contact_invoice_ar_id, \
     point_of_sale_ar_id, due_date, service_start, service_end, concept_type_id, \
     vat_total_cents, cae, cae_expires";

const POINT_OF_SALE_COLUMNS: &str = "id, company_invoice_ar_id, afip_id, fantasy_name, \
     point_of_sale_type, fiscal_address_id, is_inactive";

/// Repository for the Argentine invoicing extensions.
#[derive(Debug, Clone)]
pub struct InvoiceArRepository {
    pool: SqlitePool,
}

impl InvoiceArRepository {
    /// Creates a new InvoiceArRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceArRepository { pool }
    }

    // =========================================================================
    // Company / Contact Extensions
    // =========================================================================

    /// Creates the AR extension of an invoicing company. The CUIT, when
    /// given, must carry a valid check digit.
    pub async fn create_company_ar(&self, new: NewCompanyInvoiceAr) -> DbResult<CompanyInvoiceAr> {
        new.validate()?;

        let company_ar = CompanyInvoiceAr {
            id: Uuid::new_v4().to_string(),
            company_invoice_id: new.company_invoice_id,
            cuit: new.cuit,
            iibb: new.iibb,
            key: new.key,
            cert: new.cert,
        };

        debug!(
            id = %company_ar.id,
            company_invoice_id = %company_ar.company_invoice_id,
            cuit = %company_ar.cuit,
            "Creating company AR extension"
        );

        sqlx::query(
            r#"
            INSERT INTO company_invoices_ar (id, company_invoice_id, cuit, iibb, key, cert)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&company_ar.id)
        .bind(&company_ar.company_invoice_id)
        .bind(&company_ar.cuit)
        .bind(&company_ar.iibb)
        .bind(&company_ar.key)
        .bind(&company_ar.cert)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::duplicate_on_insert(e, "company_invoice_id", &company_ar.company_invoice_id)
        })?;

        Ok(company_ar)
    }

    pub async fn get_company_ar(&self, id: &str) -> DbResult<Option<CompanyInvoiceAr>> {
        let company_ar = sqlx::query_as::<_, CompanyInvoiceAr>(
            "SELECT id, company_invoice_id, cuit, iibb, key, cert FROM company_invoices_ar WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(company_ar)
    }

    pub async fn get_company_ar_by_company_invoice(
        &self,
        company_invoice_id: &str,
    ) -> DbResult<Option<CompanyInvoiceAr>> {
        let company_ar = sqlx::query_as::<_, CompanyInvoiceAr>(
            r#"
            SELECT id, company_invoice_id, cuit, iibb, key, cert
            FROM company_invoices_ar
            WHERE company_invoice_id = ?1
            "#,
        )
        .bind(company_invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(company_ar)
    }

    /// Creates the AR extension of an invoicing contact. The id number is
    /// checked against its type (DNI, CUIT or CUIL).
    pub async fn create_contact_ar(&self, new: NewContactInvoiceAr) -> DbResult<ContactInvoiceAr> {
        new.validate()?;

        let contact_ar = ContactInvoiceAr {
            id: Uuid::new_v4().to_string(),
            contact_invoice_id: new.contact_invoice_id,
            id_type: new.id_type,
            id_number: new.id_number,
        };

        debug!(
            id = %contact_ar.id,
            contact_invoice_id = %contact_ar.contact_invoice_id,
            "Creating contact AR extension"
        );

        sqlx::query(
            r#"
            INSERT INTO contact_invoices_ar (id, contact_invoice_id, id_type, id_number)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&contact_ar.id)
        .bind(&contact_ar.contact_invoice_id)
        .bind(contact_ar.id_type)
        .bind(&contact_ar.id_number)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::duplicate_on_insert(e, "contact_invoice_id", &contact_ar.contact_invoice_id)
        })?;

        Ok(contact_ar)
    }

    pub async fn get_contact_ar(&self, id: &str) -> DbResult<Option<ContactInvoiceAr>> {
        let contact_ar = sqlx::query_as::<_, ContactInvoiceAr>(
            "SELECT id, contact_invoice_id, id_type, id_number FROM contact_invoices_ar WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact_ar)
    }

    pub async fn get_contact_ar_by_contact_invoice(
        &self,
        contact_invoice_id: &str,
    ) -> DbResult<Option<ContactInvoiceAr>> {
        let contact_ar = sqlx::query_as::<_, ContactInvoiceAr>(
            r#"
            SELECT id, contact_invoice_id, id_type, id_number
            FROM contact_invoices_ar
            WHERE contact_invoice_id = ?1
            "#,
        )
        .bind(contact_invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact_ar)
    }

    // =========================================================================
    // Web Service Sessions
    // =========================================================================

    /// Stores a token/sign pair obtained from the AFIP login service.
    pub async fn record_session(&self, new: NewWebServiceSession) -> DbResult<WebServiceSession> {
        new.validate()?;

        let session = WebServiceSession {
            id: Uuid::new_v4().to_string(),
            company_invoice_ar_id: new.company_invoice_ar_id,
            begin: new.begin,
            generation: new.generation,
            expiration: new.expiration,
            token: new.token,
            sign: new.sign,
        };

        info!(
            id = %session.id,
            company_invoice_ar_id = %session.company_invoice_ar_id,
            expiration = %session.expiration,
            "Recording webservice session"
        );

        sqlx::query(
            r#"
            INSERT INTO web_service_sessions (
                id, company_invoice_ar_id, begin, generation, expiration, token, sign
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&session.id)
        .bind(&session.company_invoice_ar_id)
        .bind(session.begin)
        .bind(session.generation)
        .bind(session.expiration)
        .bind(&session.token)
        .bind(&session.sign)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// The session valid at `now` that expires last, if any.
    pub async fn latest_valid_session(
        &self,
        company_invoice_ar_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<WebServiceSession>> {
        let sessions = sqlx::query_as::<_, WebServiceSession>(
            r#"
            SELECT id, company_invoice_ar_id, begin, generation, expiration, token, sign
            FROM web_service_sessions
            WHERE company_invoice_ar_id = ?1
            "#,
        )
        .bind(company_invoice_ar_id)
        .fetch_all(&self.pool)
        .await?;

        // Timestamps are stored as text with variable precision, so the
        // comparison happens here rather than in SQL.
        Ok(sessions
            .into_iter()
            .filter(|s| s.is_valid_at(now))
            .max_by_key(|s| s.expiration))
    }

    // =========================================================================
    // Points of Sale
    // =========================================================================

    /// Registers a point of sale.
    ///
    /// ## Errors
    /// * `UniqueViolation` - the company already uses this AFIP number
    pub async fn create_point_of_sale(&self, new: NewPointOfSaleAr) -> DbResult<PointOfSaleAr> {
        new.validate()?;

        let point_of_sale = PointOfSaleAr {
            id: Uuid::new_v4().to_string(),
            company_invoice_ar_id: new.company_invoice_ar_id,
            afip_id: new.afip_id,
            fantasy_name: new.fantasy_name,
            point_of_sale_type: new.point_of_sale_type,
            fiscal_address_id: new.fiscal_address_id,
            is_inactive: false,
        };

        debug!(
            id = %point_of_sale.id,
            afip_id = point_of_sale.afip_id,
            kind = point_of_sale.point_of_sale_type.label(),
            "Creating point of sale"
        );

        sqlx::query(
            r#"
            INSERT INTO points_of_sale_ar (
                id, company_invoice_ar_id, afip_id, fantasy_name,
                point_of_sale_type, fiscal_address_id, is_inactive
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&point_of_sale.id)
        .bind(&point_of_sale.company_invoice_ar_id)
        .bind(point_of_sale.afip_id)
        .bind(&point_of_sale.fantasy_name)
        .bind(point_of_sale.point_of_sale_type)
        .bind(&point_of_sale.fiscal_address_id)
        .bind(point_of_sale.is_inactive)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "afip_id", point_of_sale.afip_id))?;

        Ok(point_of_sale)
    }

    pub async fn get_point_of_sale(&self, id: &str) -> DbResult<Option<PointOfSaleAr>> {
        let sql = format!("SELECT {POINT_OF_SALE_COLUMNS} FROM points_of_sale_ar WHERE id = ?1");
        let point_of_sale = sqlx::query_as::<_, PointOfSaleAr>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(point_of_sale)
    }

    /// Lists a company's points of sale by AFIP number, inactive ones
    /// included.
    pub async fn list_points_of_sale(
        &self,
        company_invoice_ar_id: &str,
    ) -> DbResult<Vec<PointOfSaleAr>> {
        let sql = format!(
            "SELECT {POINT_OF_SALE_COLUMNS} FROM points_of_sale_ar \
             WHERE company_invoice_ar_id = ?1 ORDER BY afip_id"
        );
        let points_of_sale = sqlx::query_as::<_, PointOfSaleAr>(&sql)
            .bind(company_invoice_ar_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(points_of_sale)
    }

    /// Marks a point of sale inactive. It keeps its number and history but
    /// no new AR invoices may use it.
    pub async fn deactivate_point_of_sale(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE points_of_sale_ar SET is_inactive = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PointOfSaleAr", id));
        }

        info!(id = %id, "Point of sale deactivated");
        Ok(())
    }

    // =========================================================================
    // Concept Types
    // =========================================================================

    pub async fn create_concept_type(&self, new: NewConceptType) -> DbResult<ConceptType> {
        new.validate()?;

        let concept_type = ConceptType {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            code: new.code,
        };

        debug!(id = %concept_type.id, code = %concept_type.code, "Creating concept type");

        sqlx::query("INSERT INTO concept_types (id, name, code) VALUES (?1, ?2, ?3)")
            .bind(&concept_type.id)
            .bind(&concept_type.name)
            .bind(&concept_type.code)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::duplicate_on_insert(e, "code", &concept_type.code))?;

        Ok(concept_type)
    }

    pub async fn get_concept_type_by_code(&self, code: &str) -> DbResult<Option<ConceptType>> {
        let concept_type = sqlx::query_as::<_, ConceptType>(
            "SELECT id, name, code FROM concept_types WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(concept_type)
    }

    pub async fn list_concept_types(&self) -> DbResult<Vec<ConceptType>> {
        let concept_types =
            sqlx::query_as::<_, ConceptType>("SELECT id, name, code FROM concept_types ORDER BY code")
                .fetch_all(&self.pool)
                .await?;

        Ok(concept_types)
    }

    // =========================================================================
    // AR Invoices
    // =========================================================================

    /// Attaches the AR extension to an existing invoice.
    ///
    /// The AR company and contact must extend the base invoice's own
    /// company and contact.
    ///
    /// ## Errors
    /// * `Validation` - service period ends before it starts, the point of
    ///   sale is inactive or belongs to another company, or an AR extension
    ///   does not match the base invoice
    /// * `NotFound` - unknown invoice, point of sale or AR extension
    /// * `UniqueViolation` - the invoice already has an AR extension
    pub async fn create_invoice_ar(&self, new: NewInvoiceAr) -> DbResult<InvoiceAr> {
        new.validate()?;

        let mut tx = self.pool.begin().await?;

        let (company_invoice_id, contact_invoice_id) = sqlx::query_as::<_, (String, String)>(
            "SELECT company_invoice_id, contact_invoice_id FROM invoices WHERE id = ?1",
        )
        .bind(&new.invoice_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", &new.invoice_id))?;

        let extended_company =
            sqlx::query_scalar::<_, String>("SELECT company_invoice_id FROM company_invoices_ar WHERE id = ?1")
                .bind(&new.company_invoice_ar_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("CompanyInvoiceAr", &new.company_invoice_ar_id))?;
        if extended_company != company_invoice_id {
            return Err(mismatch("company_invoice_ar_id", "extends another company than the invoice"));
        }

        let extended_contact =
            sqlx::query_scalar::<_, String>("SELECT contact_invoice_id FROM contact_invoices_ar WHERE id = ?1")
                .bind(&new.contact_invoice_ar_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("ContactInvoiceAr", &new.contact_invoice_ar_id))?;
        if extended_contact != contact_invoice_id {
            return Err(mismatch("contact_invoice_ar_id", "extends another contact than the invoice"));
        }

        let sql = format!("SELECT {POINT_OF_SALE_COLUMNS} FROM points_of_sale_ar WHERE id = ?1");
        let point_of_sale = sqlx::query_as::<_, PointOfSaleAr>(&sql)
            .bind(&new.point_of_sale_ar_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("PointOfSaleAr", &new.point_of_sale_ar_id))?;

        if point_of_sale.company_invoice_ar_id != new.company_invoice_ar_id {
            return Err(mismatch("point_of_sale_ar_id", "point of sale belongs to another company"));
        }
        if point_of_sale.is_inactive {
            return Err(mismatch("point_of_sale_ar_id", "point of sale is inactive"));
        }

        let invoice_ar = InvoiceAr {
            invoice_id: new.invoice_id,
            company_invoice_ar_id: new.company_invoice_ar_id,
            contact_invoice_ar_id: new.contact_invoice_ar_id,
            point_of_sale_ar_id: new.point_of_sale_ar_id,
            due_date: new.due_date,
            service_start: new.service_start,
            service_end: new.service_end,
            concept_type_id: new.concept_type_id,
            vat_total_cents: 0,
            cae: String::new(),
            cae_expires: None,
        };

        debug!(
            invoice_id = %invoice_ar.invoice_id,
            point_of_sale = point_of_sale.afip_id,
            "Creating AR invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoices_ar (
                invoice_id, company_invoice_ar_id, contact_invoice_ar_id, point_of_sale_ar_id,
                due_date, service_start, service_end, concept_type_id,
                vat_total_cents, cae, cae_expires
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&invoice_ar.invoice_id)
        .bind(&invoice_ar.company_invoice_ar_id)
        .bind(&invoice_ar.contact_invoice_ar_id)
        .bind(&invoice_ar.point_of_sale_ar_id)
        .bind(invoice_ar.due_date)
        .bind(invoice_ar.service_start)
        .bind(invoice_ar.service_end)
        .bind(&invoice_ar.concept_type_id)
        .bind(invoice_ar.vat_total_cents)
        .bind(&invoice_ar.cae)
        .bind(invoice_ar.cae_expires)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "invoice_id", &invoice_ar.invoice_id))?;

        tx.commit().await?;

        Ok(invoice_ar)
    }

    pub async fn get_invoice_ar(&self, invoice_id: &str) -> DbResult<Option<InvoiceAr>> {
        let sql = format!("SELECT {INVOICE_AR_COLUMNS} FROM invoices_ar WHERE invoice_id = ?1");
        let invoice_ar = sqlx::query_as::<_, InvoiceAr>(&sql)
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice_ar)
    }

    /// Next AFIP number for a point of sale and invoice type.
    ///
    /// AFIP numbers invoices per point of sale, so two points of sale of the
    /// same company count independently.
    pub async fn next_number(
        &self,
        point_of_sale_ar_id: &str,
        invoice_type_id: Option<&str>,
    ) -> DbResult<i64> {
        let next: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(i.number), 0) + 1
            FROM invoices i
            INNER JOIN invoices_ar a ON a.invoice_id = i.id
            WHERE a.point_of_sale_ar_id = ?1 AND i.invoice_type_id IS ?2
            "#,
        )
        .bind(point_of_sale_ar_id)
        .bind(invoice_type_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }

    /// Recomputes the VAT breakdown of an AR invoice.
    ///
    /// Replaces the per-rate subtotals, stores `vat_total` and refreshes
    /// the base invoice's subtotal and total, all in one transaction.
    pub async fn recalculate_vat(&self, invoice_id: &str) -> DbResult<DocumentTotals> {
        let mut tx = self.pool.begin().await?;

        let lines = priced_lines(&mut *tx, invoice_id).await?;
        let totals = totals_of(&lines)?;

        let result = sqlx::query("UPDATE invoices_ar SET vat_total_cents = ?2 WHERE invoice_id = ?1")
            .bind(invoice_id)
            .bind(totals.vat_total.cents())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InvoiceAr", invoice_id));
        }

        sqlx::query("UPDATE invoices SET subtotal_cents = ?2, total_cents = ?3 WHERE id = ?1")
            .bind(invoice_id)
            .bind(totals.subtotal.cents())
            .bind(totals.total.cents())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM invoice_ar_vat_subtotals WHERE invoice_ar_id = ?1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        for subtotal in &totals.vat_breakdown {
            sqlx::query(
                r#"
                INSERT INTO invoice_ar_vat_subtotals (id, invoice_ar_id, vat_id, base_cents, amount_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(invoice_id)
            .bind(&subtotal.vat_id)
            .bind(subtotal.base.cents())
            .bind(subtotal.amount.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            invoice_id = %invoice_id,
            vat_total = %totals.vat_total,
            rates = totals.vat_breakdown.len(),
            "AR invoice VAT recalculated"
        );

        Ok(totals)
    }

    /// Per-rate VAT subtotals, in the order they were computed.
    pub async fn vat_subtotals(&self, invoice_id: &str) -> DbResult<Vec<InvoiceArVatSubtotal>> {
        let subtotals = sqlx::query_as::<_, InvoiceArVatSubtotal>(
            r#"
            SELECT id, invoice_ar_id, vat_id, base_cents, amount_cents
            FROM invoice_ar_vat_subtotals
            WHERE invoice_ar_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subtotals)
    }

    /// Stores the CAE granted by AFIP and marks the invoice Authorized.
    pub async fn authorize(&self, invoice_id: &str, authorization: CaeAuthorization) -> DbResult<()> {
        authorization.validate()?;

        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE invoices_ar SET cae = ?2, cae_expires = ?3 WHERE invoice_id = ?1")
                .bind(invoice_id)
                .bind(&authorization.cae)
                .bind(authorization.cae_expires)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InvoiceAr", invoice_id));
        }

        sqlx::query("UPDATE invoices SET status = ?2 WHERE id = ?1")
            .bind(invoice_id)
            .bind(InvoiceStatus::Authorized)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            invoice_id = %invoice_id,
            cae = %authorization.cae,
            cae_expires = %authorization.cae_expires,
            "Invoice authorized"
        );

        Ok(())
    }
}

fn mismatch(field: &str, reason: &str) -> DbError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::fixtures::{date, db, world, World};
    use chrono::Duration;
    use erp_core::{
        Fraction, IdType, Invoice, Money, NewCompany, NewCompanyInvoice, NewContact,
        NewContactInvoice, NewInvoice, NewInvoiceLine, NewProduct, NewVat, PointOfSaleType,
    };

    struct ArWorld {
        w: World,
        company_ar: CompanyInvoiceAr,
        contact_ar: ContactInvoiceAr,
        point_of_sale: PointOfSaleAr,
        concept: ConceptType,
    }

    async fn ar_world(db: &Database) -> ArWorld {
        let w = world(db).await;
        let repo = db.invoices_ar();

        let company_ar = repo
            .create_company_ar(NewCompanyInvoiceAr {
                company_invoice_id: w.company_invoice.id.clone(),
                cuit: "30712345671".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let contact_ar = repo
            .create_contact_ar(NewContactInvoiceAr {
                contact_invoice_id: w.contact_invoice.id.clone(),
                id_type: Some(IdType::Cuit),
                id_number: "20-12345678-6".into(),
            })
            .await
            .unwrap();
        let point_of_sale = repo
            .create_point_of_sale(point_of_sale(&company_ar, &w, 1))
            .await
            .unwrap();
        let concept = repo
            .create_concept_type(NewConceptType {
                name: "Productos".into(),
                code: "1".into(),
            })
            .await
            .unwrap();

        ArWorld {
            w,
            company_ar,
            contact_ar,
            point_of_sale,
            concept,
        }
    }

    fn point_of_sale(company_ar: &CompanyInvoiceAr, w: &World, afip_id: i64) -> NewPointOfSaleAr {
        NewPointOfSaleAr {
            company_invoice_ar_id: company_ar.id.clone(),
            afip_id,
            fantasy_name: format!("Sucursal {afip_id}"),
            point_of_sale_type: PointOfSaleType::default(),
            fiscal_address_id: w.address.id.clone(),
        }
    }

    async fn base_invoice(db: &Database, ar: &ArWorld) -> Invoice {
        db.invoices()
            .create_invoice(NewInvoice::new(
                ar.w.company_invoice.id.clone(),
                ar.w.contact_invoice.id.clone(),
                date(2024, 5, 2),
            ))
            .await
            .unwrap()
    }

    fn new_invoice_ar(ar: &ArWorld, invoice: &Invoice) -> NewInvoiceAr {
        NewInvoiceAr {
            invoice_id: invoice.id.clone(),
            company_invoice_ar_id: ar.company_ar.id.clone(),
            contact_invoice_ar_id: ar.contact_ar.id.clone(),
            point_of_sale_ar_id: ar.point_of_sale.id.clone(),
            due_date: date(2024, 6, 1),
            service_start: None,
            service_end: None,
            concept_type_id: ar.concept.id.clone(),
        }
    }

    #[tokio::test]
    async fn test_invalid_tax_ids_rejected() {
        let db = db().await;
        let w = world(&db).await;
        let repo = db.invoices_ar();

        let err = repo
            .create_company_ar(NewCompanyInvoiceAr {
                company_invoice_id: w.company_invoice.id.clone(),
                cuit: "30712345670".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let err = repo
            .create_contact_ar(NewContactInvoiceAr {
                contact_invoice_id: w.contact_invoice.id.clone(),
                id_type: Some(IdType::Dni),
                id_number: "12".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_extension_lookups() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let repo = db.invoices_ar();

        let company_ar = repo
            .get_company_ar_by_company_invoice(&ar.w.company_invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(company_ar, ar.company_ar);

        let contact_ar = repo
            .get_contact_ar_by_contact_invoice(&ar.w.contact_invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact_ar.id_type, Some(IdType::Cuit));
        assert_eq!(
            repo.get_contact_ar(&contact_ar.id).await.unwrap(),
            Some(contact_ar.clone())
        );
        assert!(repo.get_company_ar(&ar.company_ar.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_afip_id_unique_per_company() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let repo = db.invoices_ar();

        let err = repo
            .create_point_of_sale(point_of_sale(&ar.company_ar, &ar.w, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "1"));

        repo.create_point_of_sale(point_of_sale(&ar.company_ar, &ar.w, 2))
            .await
            .unwrap();
        let listed = repo.list_points_of_sale(&ar.company_ar.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|p| p.afip_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_afip_id_out_of_range() {
        let db = db().await;
        let ar = ar_world(&db).await;

        let err = db
            .invoices_ar()
            .create_point_of_sale(point_of_sale(&ar.company_ar, &ar.w, 40_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_latest_valid_session() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let repo = db.invoices_ar();
        let now = Utc::now();

        let session = |begin: DateTime<Utc>, hours: i64, token: &str| NewWebServiceSession {
            company_invoice_ar_id: ar.company_ar.id.clone(),
            begin,
            generation: begin,
            expiration: begin + Duration::hours(hours),
            token: token.into(),
            sign: "sign".into(),
        };

        repo.record_session(session(now - Duration::hours(20), 12, "expired"))
            .await
            .unwrap();
        assert!(repo
            .latest_valid_session(&ar.company_ar.id, now)
            .await
            .unwrap()
            .is_none());

        repo.record_session(session(now - Duration::hours(1), 12, "short"))
            .await
            .unwrap();
        repo.record_session(session(now - Duration::minutes(5), 12, "fresh"))
            .await
            .unwrap();

        let latest = repo
            .latest_valid_session(&ar.company_ar.id, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.token, "fresh");
    }

    #[tokio::test]
    async fn test_concept_types() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let repo = db.invoices_ar();

        repo.create_concept_type(NewConceptType {
            name: "Servicios".into(),
            code: "2".into(),
        })
        .await
        .unwrap();

        let found = repo.get_concept_type_by_code("1").await.unwrap().unwrap();
        assert_eq!(found, ar.concept);
        assert_eq!(repo.list_concept_types().await.unwrap().len(), 2);

        let err = repo
            .create_concept_type(NewConceptType {
                name: "Otro".into(),
                code: "2".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_invoice_ar_composition() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let invoice = base_invoice(&db, &ar).await;
        let repo = db.invoices_ar();

        let created = repo
            .create_invoice_ar(new_invoice_ar(&ar, &invoice))
            .await
            .unwrap();
        assert!(!created.is_authorized());
        assert_eq!(repo.get_invoice_ar(&invoice.id).await.unwrap(), Some(created));

        // A second AR row for the same invoice is refused
        let err = repo
            .create_invoice_ar(new_invoice_ar(&ar, &invoice))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        db.invoices().delete_invoice(&invoice.id).await.unwrap();
        assert!(repo.get_invoice_ar(&invoice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invoice_ar_must_extend_base_parties() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let invoice = base_invoice(&db, &ar).await;
        let parties = db.parties();
        let repo = db.invoices_ar();

        // Globex, with its own AR identity and point of sale
        let globex = parties
            .create_company(NewCompany {
                name: "Globex".into(),
            })
            .await
            .unwrap();
        let globex_invoice = parties
            .create_company_invoice(NewCompanyInvoice::new(globex.id.clone(), "Globex S.R.L."))
            .await
            .unwrap();
        let globex_ar = repo
            .create_company_ar(NewCompanyInvoiceAr {
                company_invoice_id: globex_invoice.id.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        let globex_pos = repo
            .create_point_of_sale(point_of_sale(&globex_ar, &ar.w, 1))
            .await
            .unwrap();

        let mut foreign_company = new_invoice_ar(&ar, &invoice);
        foreign_company.company_invoice_ar_id = globex_ar.id.clone();
        foreign_company.point_of_sale_ar_id = globex_pos.id.clone();
        let err = repo.create_invoice_ar(foreign_company).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::InvalidFormat { ref field, .. })
                if field == "company_invoice_ar_id"
        ));

        let john = parties
            .create_contact(NewContact {
                name: "John".into(),
            })
            .await
            .unwrap();
        let john_invoice = parties
            .create_contact_invoice(NewContactInvoice {
                contact_id: john.id.clone(),
                legal_name: "John Roe".into(),
                fiscal_position_id: ar.w.receiver_position.id.clone(),
                fiscal_address_id: ar.w.address.id.clone(),
            })
            .await
            .unwrap();
        let john_ar = repo
            .create_contact_ar(NewContactInvoiceAr {
                contact_invoice_id: john_invoice.id.clone(),
                id_type: None,
                id_number: String::new(),
            })
            .await
            .unwrap();

        let mut foreign_contact = new_invoice_ar(&ar, &invoice);
        foreign_contact.contact_invoice_ar_id = john_ar.id.clone();
        let err = repo.create_invoice_ar(foreign_contact).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::InvalidFormat { ref field, .. })
                if field == "contact_invoice_ar_id"
        ));

        let mut orphan = new_invoice_ar(&ar, &invoice);
        orphan.invoice_id = Uuid::new_v4().to_string();
        let err = repo.create_invoice_ar(orphan).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Invoice"));

        assert!(repo.get_invoice_ar(&invoice.id).await.unwrap().is_none());
        repo.create_invoice_ar(new_invoice_ar(&ar, &invoice))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recalculate_vat_overflow_leaves_totals() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let invoice = base_invoice(&db, &ar).await;
        let repo = db.invoices_ar();
        repo.create_invoice_ar(new_invoice_ar(&ar, &invoice))
            .await
            .unwrap();

        let mut huge = NewInvoiceLine::new(ar.w.product.id.clone(), 2_147_483_647);
        huge.price_sold = Some(Money::from_cents(999_999_999_999));
        db.invoices().add_line(&invoice.id, huge).await.unwrap();

        let err = repo.recalculate_vat(&invoice.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::OutOfRange { .. })
        ));

        let stored = repo.get_invoice_ar(&invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.vat_total_cents, 0);
        assert!(repo.vat_subtotals(&invoice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_period_and_inactive_point_of_sale() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let invoice = base_invoice(&db, &ar).await;
        let repo = db.invoices_ar();

        let mut reversed = new_invoice_ar(&ar, &invoice);
        reversed.service_start = Some(date(2024, 5, 31));
        reversed.service_end = Some(date(2024, 5, 1));
        let err = repo.create_invoice_ar(reversed).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        repo.deactivate_point_of_sale(&ar.point_of_sale.id)
            .await
            .unwrap();
        let err = repo
            .create_invoice_ar(new_invoice_ar(&ar, &invoice))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_numbering_per_point_of_sale() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let repo = db.invoices_ar();
        let second_pos = repo
            .create_point_of_sale(point_of_sale(&ar.company_ar, &ar.w, 2))
            .await
            .unwrap();

        assert_eq!(repo.next_number(&ar.point_of_sale.id, None).await.unwrap(), 1);

        let invoice = base_invoice(&db, &ar).await;
        repo.create_invoice_ar(new_invoice_ar(&ar, &invoice))
            .await
            .unwrap();

        assert_eq!(repo.next_number(&ar.point_of_sale.id, None).await.unwrap(), 2);
        assert_eq!(repo.next_number(&second_pos.id, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recalculate_vat_and_authorize() {
        let db = db().await;
        let ar = ar_world(&db).await;
        let invoice = base_invoice(&db, &ar).await;
        let repo = db.invoices_ar();
        repo.create_invoice_ar(new_invoice_ar(&ar, &invoice))
            .await
            .unwrap();

        let reduced = db
            .catalog()
            .create_vat(NewVat {
                name: "IVA 10.5%".into(),
                code: "4".into(),
                tax: Fraction::from_bps(1050),
            })
            .await
            .unwrap();
        let book = db
            .catalog()
            .create_product(NewProduct {
                company_invoice_id: ar.w.company_invoice.id.clone(),
                name: "Book".into(),
                current_price: Some(Money::from_cents(2000)),
                vat_id: reduced.id.clone(),
            })
            .await
            .unwrap();

        db.invoices()
            .add_line(&invoice.id, NewInvoiceLine::new(ar.w.product.id.clone(), 1))
            .await
            .unwrap();
        db.invoices()
            .add_line(&invoice.id, NewInvoiceLine::new(book.id.clone(), 2))
            .await
            .unwrap();

        let totals = repo.recalculate_vat(&invoice.id).await.unwrap();
        assert_eq!(totals.vat_total.cents(), 2100 + 420);

        // Running twice replaces rather than duplicates the subtotals
        repo.recalculate_vat(&invoice.id).await.unwrap();
        let subtotals = repo.vat_subtotals(&invoice.id).await.unwrap();
        assert_eq!(subtotals.len(), 2);
        assert_eq!(subtotals[0].vat_id, ar.w.vat.id);
        assert_eq!(subtotals[0].base(), Money::from_cents(10000));
        assert_eq!(subtotals[1].amount(), Money::from_cents(420));

        let stored = repo.get_invoice_ar(&invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.vat_total(), Money::from_cents(2520));
        let base = db.invoices().get_invoice(&invoice.id).await.unwrap().unwrap();
        assert_eq!(base.total_cents, 14000 + 2520);

        // The reduced VAT is now referenced by a subtotal
        let err = db.catalog().delete_vat(&reduced.id).await.unwrap_err();
        assert!(matches!(err, DbError::Protected { .. }));

        let err = repo
            .authorize(
                &invoice.id,
                CaeAuthorization {
                    cae: "7412-3".into(),
                    cae_expires: date(2024, 5, 12),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        repo.authorize(
            &invoice.id,
            CaeAuthorization {
                cae: "74123456789012".into(),
                cae_expires: date(2024, 5, 12),
            },
        )
        .await
        .unwrap();

        let stored = repo.get_invoice_ar(&invoice.id).await.unwrap().unwrap();
        assert!(stored.is_authorized());
        assert_eq!(stored.cae_expires, Some(date(2024, 5, 12)));
        let base = db.invoices().get_invoice(&invoice.id).await.unwrap().unwrap();
        assert_eq!(base.status, InvoiceStatus::Authorized);
    }
}
