//! # erp-db: Database Layer for ERP Invoicing
//!
//! Owns the relational schema of the invoicing and sales modules and every
//! operation on it. SQLite through sqlx, with referential integrity enforced
//! by the schema itself.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ERP Invoicing Data Flow                            │
//! │                                                                         │
//! │  Caller (service, CLI, seed binary)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     erp-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Party         │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Catalog       │    │ 001_initial_ │  │   │
//! │  │   │ WAL + FKs ON  │    │ Invoice(Ar)   │    │ schema.sql   │  │   │
//! │  │   │               │    │ Sales ...     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   config.rs (erp.toml + ERP_* env)    logging.rs (EnvFilter)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (erp.db)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and repository accessors
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - Repository implementations
//! - [`config`] - `erp.toml` loading with environment overrides
//! - [`logging`] - `tracing` subscriber setup
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use erp_db::{Database, DbConfig, ErpConfig};
//!
//! let config = ErpConfig::load_or_default(None);
//! erp_db::logging::init_tracing(&config.logging.filter);
//!
//! let db = Database::new(DbConfig::from(&config.database)).await?;
//!
//! let invoice = db.invoices().create_invoice(new_invoice).await?;
//! db.invoices().add_line(&invoice.id, line).await?;
//! let totals = db.invoices().recalculate_totals(&invoice.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DatabaseSettings, ErpConfig, LoggingSettings};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    AccountingRepository, CatalogRepository, InvoiceArRepository, InvoiceRepository,
    PartyRepository, SalesRepository,
};
