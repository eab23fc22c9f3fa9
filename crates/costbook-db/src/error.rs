//! # Database Error Types
//!
//! Error types for every record store in this crate.
//!
//! sqlx, file I/O, JSON and every `costbook-core` error funnel into
//! [`DbError`]; its `Display` text is what the UI shows.

use costbook_core::{BomError, CoreError, HeaderError, ImportError, ValidationError};
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Record store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Record not found (or owned by someone else).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The record is still referenced and cannot be deleted.
    ///
    /// ## When This Occurs
    /// - Deleting a BOM used as a sub-assembly by another BOM
    #[error("{entity} {id} is still used by {referenced_by}")]
    InUse {
        entity: String,
        id: String,
        referenced_by: String,
    },

    /// Field validation failed before the write.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A domain rule rejected the operation (cycle, bad import, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A JSON payload could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local store file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background task is gone.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// A corrupt stored row or an unexpected driver failure.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// A record check failed before the write; validation failures keep
    /// their own variant so every backend reports them the same way.
    pub fn rejected(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => DbError::Validation(e),
            other => DbError::Core(other),
        }
    }
}

impl From<BomError> for DbError {
    fn from(err: BomError) -> Self {
        DbError::Core(err.into())
    }
}

impl From<ImportError> for DbError {
    fn from(err: ImportError) -> Self {
        DbError::Core(err.into())
    }
}

impl From<HeaderError> for DbError {
    fn from(err: HeaderError) -> Self {
        DbError::Core(err.into())
    }
}

/// Classifies sqlx failures.
///
/// Constraint failures are told apart by [`ErrorKind`]; the failing
/// `table.column` is lifted from SQLite's message for unique violations.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    let field = db_err
                        .message()
                        .rsplit(": ")
                        .next()
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::duplicate(field, "unknown")
                }
                ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                    message: db_err.message().to_string(),
                },
                _ => DbError::QueryFailed(db_err.message().to_string()),
            },
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_convert() {
        let err: DbError = BomError::NotFound("b1".into()).into();
        assert!(matches!(err, DbError::Core(CoreError::Bom(_))));
        assert_eq!(err.to_string(), "bill of materials not found: b1");

        let err: DbError = ValidationError::Required {
            field: "name".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Validation failed: name is required");
    }

    #[test]
    fn test_rejected_keeps_validation_variant() {
        let err = DbError::rejected(CoreError::Validation(ValidationError::Required {
            field: "name".into(),
        }));
        assert!(matches!(err, DbError::Validation(_)));

        let err = DbError::rejected(BomError::NotFound("b1".into()).into());
        assert!(matches!(err, DbError::Core(CoreError::Bom(_))));
    }

    #[test]
    fn test_in_use_message() {
        let err = DbError::InUse {
            entity: "BOM".into(),
            id: "b1".into(),
            referenced_by: "Gift set".into(),
        };
        assert_eq!(err.to_string(), "BOM b1 is still used by Gift set");
    }

    #[test]
    fn test_sqlx_errors_map() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
    }

    #[tokio::test]
    async fn test_unique_violation_names_column() {
        let db = crate::pool::Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        sqlx::query("CREATE TABLE t (code TEXT UNIQUE)").execute(db.pool()).await.unwrap();
        sqlx::query("INSERT INTO t VALUES ('A')").execute(db.pool()).await.unwrap();

        let err: DbError = sqlx::query("INSERT INTO t VALUES ('A')")
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "t.code"));
    }
}
