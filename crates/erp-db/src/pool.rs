//! # Database Handle
//!
//! Opens the SQLite pool behind every repository.
//!
//! Each connection runs with `foreign_keys = ON`; the RESTRICT and CASCADE
//! rules of the invoicing schema (protected VATs, accounts and fiscal
//! positions, cascading AR extensions) depend on it. File databases use WAL
//! with `synchronous = NORMAL`.
//!
//! An in-memory database lives inside a single connection, so
//! [`DbConfig::in_memory`] caps the pool at one. Repository code must not
//! borrow the pool while it holds an open transaction.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{
    AccountingRepository, CatalogRepository, InvoiceArRepository, InvoiceRepository,
    PartyRepository, SalesRepository,
};

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings, usually built from `[database]` in `erp.toml`
/// (see [`crate::config::DatabaseSettings`]).
///
/// ```rust,ignore
/// let config = DbConfig::new("./data/erp.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long to wait for a free connection.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// Apply pending migrations when the pool opens.
    pub run_migrations: bool,
}

impl DbConfig {
    /// File database with 5 connections at most; created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Private in-memory database, migrated on open. Used by the tests.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}?mode=rwc", self.database_path.display());

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        Ok(options)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the invoicing database. Clones share one pool; the
/// repositories it hands out are cheap to create per call.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./erp.db")).await?;
/// let vats = db.catalog().list_vats().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening invoicing database");

        let options = config.connect_options()?;
        debug!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting"
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Needed only when the pool was opened
    /// with `run_migrations(false)`.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Companies, contacts, addresses, fiscal positions and their
    /// invoicing extensions.
    pub fn parties(&self) -> PartyRepository {
        PartyRepository::new(self.pool.clone())
    }

    /// Ledgers, accounts and transactions.
    pub fn accounting(&self) -> AccountingRepository {
        AccountingRepository::new(self.pool.clone())
    }

    /// VAT rates, products, invoice types and the invoice type allow-list.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Invoices and invoice lines.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Argentine extensions: AFIP sessions, points of sale, AR invoices.
    pub fn invoices_ar(&self) -> InvoiceArRepository {
        InvoiceArRepository::new(self.pool.clone())
    }

    /// Product categories, quotations and sales.
    pub fn sales(&self) -> SalesRepository {
        SalesRepository::new(self.pool.clone())
    }

    /// Closes every connection; later queries fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing invoicing database");
        self.pool.close().await;
    }

    /// `true` while a trivial query still succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
