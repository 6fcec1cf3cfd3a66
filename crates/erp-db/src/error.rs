//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  ValidationError / CoreError (erp-core)   SQLite error (sqlx::Error)   │
//! │       │                                          │                      │
//! │       │ #[from]                                  │ From<sqlx::Error>    │
//! │       ▼                                          ▼                      │
//! │  DbError (this module) ← classifies UNIQUE / FOREIGN KEY / CHECK       │
//! │       │                                                                 │
//! │       │ delete paths: FOREIGN KEY → Protected { entity, id }           │
//! │       ▼                                                                 │
//! │  Caller                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use erp_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second product with the same name for one company
    /// - Second point of sale with the same AFIP id for one company
    /// - Duplicate fiscal position, VAT or concept type name
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation on insert or update.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent VAT, product or fiscal position
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Delete refused because other rows still reference the entity.
    ///
    /// ## When This Occurs
    /// - Deleting a VAT used by a product
    /// - Deleting a product used by an invoice line
    /// - Deleting an account or fiscal position still referenced
    #[error("{entity} {id} is referenced by other records and cannot be deleted")]
    Protected { entity: String, id: String },

    /// CHECK constraint violation (range checks enforced by the schema).
    #[error("Check constraint failed: {0}")]
    CheckViolation(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    ///
    /// ## When This Occurs
    /// - Invalid SQL in migration
    /// - Migration version conflict
    /// - Schema incompatibility
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),

    /// Input rejected before reaching the database.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A business rule refused the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Configuration could not be read or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Re-labels a foreign key failure raised by a DELETE as [`DbError::Protected`].
    ///
    /// ## Usage
    /// ```rust,ignore
    /// sqlx::query("DELETE FROM vats WHERE id = ?1")
    ///     .bind(id)
    ///     .execute(&self.pool)
    ///     .await
    ///     .map_err(|e| DbError::protected_on_delete(e, "VAT", id))?;
    /// ```
    pub fn protected_on_delete(err: sqlx::Error, entity: &str, id: &str) -> Self {
        match DbError::from(err) {
            DbError::ForeignKeyViolation { .. } => DbError::Protected {
                entity: entity.to_string(),
                id: id.to_string(),
            },
            other => other,
        }
    }

    /// Attaches the offending field and value to a UNIQUE failure.
    ///
    /// SQLite only reports `table.column`, never the value.
    pub fn duplicate_on_insert(err: sqlx::Error, field: &str, value: impl ToString) -> Self {
        match DbError::from(err) {
            DbError::UniqueViolation { .. } => DbError::duplicate(field, value.to_string()),
            other => other,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>[, <table>.<column>]"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <expr or name>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation(
                        msg.split("CHECK constraint failed: ")
                            .nth(1)
                            .unwrap_or(msg)
                            .to_string(),
                    )
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DbError {
    fn from(err: toml::ser::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_message() {
        let err = DbError::Protected {
            entity: "VAT".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "VAT abc is referenced by other records and cannot be deleted"
        );
    }

    #[test]
    fn test_protected_on_delete_keeps_other_errors() {
        let err = DbError::protected_on_delete(sqlx::Error::PoolTimedOut, "VAT", "abc");
        assert!(matches!(err, DbError::PoolExhausted));
    }

    #[test]
    fn test_duplicate_message() {
        let err = DbError::duplicate("afip_id", "3");
        assert_eq!(err.to_string(), "Duplicate afip_id: '3' already exists");
    }

    #[test]
    fn test_validation_converts() {
        let err: DbError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::Validation(_)));
    }
}
