//! # Party Repository
//!
//! Companies, contacts, addresses and fiscal positions, plus the invoicing
//! extensions that hang off companies and contacts.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  companies ──(CASCADE)──► company_invoices ──(RESTRICT)──► fiscal_pos. │
//! │  contacts  ──(CASCADE)──► contact_invoices ──(RESTRICT)──► fiscal_pos. │
//! │                                          └──(RESTRICT)──► addresses    │
//! │                                                                         │
//! │  Deleting a company or contact removes its invoicing extension.        │
//! │  Deleting a fiscal position or address still in use is refused.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use erp_core::validation::validate_optional_uuid;
use erp_core::{
    Company, CompanyInvoice, Contact, ContactInvoice, FiscalPosition, NewCompany,
    NewCompanyInvoice, NewContact, NewContactInvoice, NewFiscalPosition, NewPhysicalAddress,
    PhysicalAddress,
};

const COMPANY_INVOICE_COLUMNS: &str = "id, company_id, legal_name, initiated_activities, \
     fiscal_position_id, fiscal_address_id, \
     default_invoice_debit_account_id, default_invoice_credit_account_id";

/// Repository for parties and their invoicing extensions.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    /// Creates a new PartyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    // =========================================================================
    // Companies
    // =========================================================================

    pub async fn create_company(&self, new: NewCompany) -> DbResult<Company> {
        new.validate()?;

        let company = Company {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            created_at: Utc::now(),
        };

        debug!(id = %company.id, name = %company.name, "Creating company");

        sqlx::query("INSERT INTO companies (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&company.id)
            .bind(&company.name)
            .bind(company.created_at)
            .execute(&self.pool)
            .await?;

        Ok(company)
    }

    pub async fn get_company(&self, id: &str) -> DbResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(
            "SELECT id, name, created_at FROM companies WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(company)
    }

    /// Deletes a company. Its invoicing extension goes with it.
    ///
    /// ## Errors
    /// * `Protected` - ledgers, categories, quotations or products still
    ///   reference the company (or its extension)
    pub async fn delete_company(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM companies WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "Company", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", id));
        }

        info!(id = %id, "Company deleted");
        Ok(())
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    pub async fn create_contact(&self, new: NewContact) -> DbResult<Contact> {
        new.validate()?;

        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            created_at: Utc::now(),
        };

        debug!(id = %contact.id, name = %contact.name, "Creating contact");

        sqlx::query("INSERT INTO contacts (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&contact.id)
            .bind(&contact.name)
            .bind(contact.created_at)
            .execute(&self.pool)
            .await?;

        Ok(contact)
    }

    pub async fn get_contact(&self, id: &str) -> DbResult<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            "SELECT id, name, created_at FROM contacts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    /// Deletes a contact together with its invoicing extension and its
    /// quotation/sale links.
    pub async fn delete_contact(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "Contact", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact", id));
        }

        info!(id = %id, "Contact deleted");
        Ok(())
    }

    // =========================================================================
    // Physical Addresses
    // =========================================================================

    pub async fn create_address(&self, new: NewPhysicalAddress) -> DbResult<PhysicalAddress> {
        new.validate()?;

        let address = PhysicalAddress {
            id: Uuid::new_v4().to_string(),
            street_address: new.street_address,
            city: new.city,
            postal_code: new.postal_code,
            country: new.country,
        };

        debug!(id = %address.id, "Creating physical address");

        sqlx::query(
            r#"
            INSERT INTO physical_addresses (id, street_address, city, postal_code, country)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&address.id)
        .bind(&address.street_address)
        .bind(&address.city)
        .bind(&address.postal_code)
        .bind(&address.country)
        .execute(&self.pool)
        .await?;

        Ok(address)
    }

    pub async fn get_address(&self, id: &str) -> DbResult<Option<PhysicalAddress>> {
        let address = sqlx::query_as::<_, PhysicalAddress>(
            r#"
            SELECT id, street_address, city, postal_code, country
            FROM physical_addresses
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    pub async fn delete_address(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM physical_addresses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "Address", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", id));
        }

        Ok(())
    }

    // =========================================================================
    // Fiscal Positions
    // =========================================================================

    /// Creates a fiscal position. Names are unique.
    pub async fn create_fiscal_position(&self, new: NewFiscalPosition) -> DbResult<FiscalPosition> {
        new.validate()?;

        let position = FiscalPosition {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            code: new.code,
        };

        debug!(id = %position.id, name = %position.name, "Creating fiscal position");

        sqlx::query("INSERT INTO fiscal_positions (id, name, code) VALUES (?1, ?2, ?3)")
            .bind(&position.id)
            .bind(&position.name)
            .bind(&position.code)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::duplicate_on_insert(e, "name", &position.name))?;

        Ok(position)
    }

    pub async fn get_fiscal_position(&self, id: &str) -> DbResult<Option<FiscalPosition>> {
        let position = sqlx::query_as::<_, FiscalPosition>(
            "SELECT id, name, code FROM fiscal_positions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(position)
    }

    pub async fn get_fiscal_position_by_name(&self, name: &str) -> DbResult<Option<FiscalPosition>> {
        let position = sqlx::query_as::<_, FiscalPosition>(
            "SELECT id, name, code FROM fiscal_positions WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(position)
    }

    /// Lists fiscal positions ordered by name.
    pub async fn list_fiscal_positions(&self) -> DbResult<Vec<FiscalPosition>> {
        let positions = sqlx::query_as::<_, FiscalPosition>(
            "SELECT id, name, code FROM fiscal_positions ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(positions)
    }

    /// ## Errors
    /// * `Protected` - a company, contact or allow-list rule uses it
    pub async fn delete_fiscal_position(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM fiscal_positions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::protected_on_delete(e, "FiscalPosition", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FiscalPosition", id));
        }

        info!(id = %id, "Fiscal position deleted");
        Ok(())
    }

    // =========================================================================
    // Company Invoice Extension
    // =========================================================================

    /// Creates the invoicing extension of a company (at most one each).
    pub async fn create_company_invoice(&self, new: NewCompanyInvoice) -> DbResult<CompanyInvoice> {
        new.validate(Utc::now().date_naive())?;

        let company_invoice = CompanyInvoice {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id,
            legal_name: new.legal_name,
            initiated_activities: new.initiated_activities,
            fiscal_position_id: new.fiscal_position_id,
            fiscal_address_id: new.fiscal_address_id,
            default_invoice_debit_account_id: new.default_invoice_debit_account_id,
            default_invoice_credit_account_id: new.default_invoice_credit_account_id,
        };

        debug!(
            id = %company_invoice.id,
            company_id = %company_invoice.company_id,
            "Creating company invoice extension"
        );

        sqlx::query(
            r#"
            INSERT INTO company_invoices (
                id, company_id, legal_name, initiated_activities,
                fiscal_position_id, fiscal_address_id,
                default_invoice_debit_account_id, default_invoice_credit_account_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&company_invoice.id)
        .bind(&company_invoice.company_id)
        .bind(&company_invoice.legal_name)
        .bind(company_invoice.initiated_activities)
        .bind(&company_invoice.fiscal_position_id)
        .bind(&company_invoice.fiscal_address_id)
        .bind(&company_invoice.default_invoice_debit_account_id)
        .bind(&company_invoice.default_invoice_credit_account_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "company_id", &company_invoice.company_id))?;

        Ok(company_invoice)
    }

    pub async fn get_company_invoice(&self, id: &str) -> DbResult<Option<CompanyInvoice>> {
        let sql = format!("SELECT {COMPANY_INVOICE_COLUMNS} FROM company_invoices WHERE id = ?1");
        let company_invoice = sqlx::query_as::<_, CompanyInvoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(company_invoice)
    }

    pub async fn get_company_invoice_by_company(
        &self,
        company_id: &str,
    ) -> DbResult<Option<CompanyInvoice>> {
        let sql =
            format!("SELECT {COMPANY_INVOICE_COLUMNS} FROM company_invoices WHERE company_id = ?1");
        let company_invoice = sqlx::query_as::<_, CompanyInvoice>(&sql)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(company_invoice)
    }

    /// Sets (or clears) the fiscal position of an invoicing company.
    pub async fn update_company_fiscal_position(
        &self,
        id: &str,
        fiscal_position_id: Option<&str>,
    ) -> DbResult<()> {
        validate_optional_uuid("fiscal_position_id", fiscal_position_id)?;

        let result = sqlx::query("UPDATE company_invoices SET fiscal_position_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(fiscal_position_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CompanyInvoice", id));
        }

        debug!(id = %id, fiscal_position_id = ?fiscal_position_id, "Company fiscal position updated");
        Ok(())
    }

    // =========================================================================
    // Contact Invoice Extension
    // =========================================================================

    /// Creates the invoicing extension of a contact (at most one each).
    pub async fn create_contact_invoice(&self, new: NewContactInvoice) -> DbResult<ContactInvoice> {
        new.validate()?;

        let contact_invoice = ContactInvoice {
            id: Uuid::new_v4().to_string(),
            contact_id: new.contact_id,
            legal_name: new.legal_name,
            fiscal_position_id: new.fiscal_position_id,
            fiscal_address_id: new.fiscal_address_id,
        };

        debug!(
            id = %contact_invoice.id,
            contact_id = %contact_invoice.contact_id,
            "Creating contact invoice extension"
        );

        sqlx::query(
            r#"
            INSERT INTO contact_invoices (
                id, contact_id, legal_name, fiscal_position_id, fiscal_address_id
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&contact_invoice.id)
        .bind(&contact_invoice.contact_id)
        .bind(&contact_invoice.legal_name)
        .bind(&contact_invoice.fiscal_position_id)
        .bind(&contact_invoice.fiscal_address_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::duplicate_on_insert(e, "contact_id", &contact_invoice.contact_id))?;

        Ok(contact_invoice)
    }

    pub async fn get_contact_invoice(&self, id: &str) -> DbResult<Option<ContactInvoice>> {
        let contact_invoice = sqlx::query_as::<_, ContactInvoice>(
            r#"
            SELECT id, contact_id, legal_name, fiscal_position_id, fiscal_address_id
            FROM contact_invoices
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact_invoice)
    }

    pub async fn get_contact_invoice_by_contact(
        &self,
        contact_id: &str,
    ) -> DbResult<Option<ContactInvoice>> {
        let contact_invoice = sqlx::query_as::<_, ContactInvoice>(
            r#"
            SELECT id, contact_id, legal_name, fiscal_position_id, fiscal_address_id
            FROM contact_invoices
            WHERE contact_id = ?1
            "#,
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact_invoice)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
