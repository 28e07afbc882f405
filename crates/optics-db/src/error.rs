//! Errors raised by the repositories.
//!
//! Business rules are checked inside the transaction that performs the write,
//! so a rejected payment or an empty invoice reaches the caller as
//! [`DbError::Domain`] alongside the storage failures.
//!
//! ```text
//!   sqlx::Error ─┐
//!                ├──► DbError ──► ApiError (optics-server)
//!   CoreError ───┘
//! ```

use optics_core::{CoreError, ValidationError};
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// No row for the requested id or business number.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE column already holds the value: phone, barcode, username,
    /// employee ID, order number...
    #[error("{field} '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A reference points at a missing row, or a delete would orphan rows
    /// declared `ON DELETE RESTRICT` (a customer with invoices).
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Cannot open database: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

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
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify_constraint(db_err.message()),
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

/// Reads SQLite's constraint messages, e.g.
/// `UNIQUE constraint failed: products.barcode` or
/// `FOREIGN KEY constraint failed`.
///
/// The offending value is not part of the message; callers that know it
/// rebuild the error with [`DbError::duplicate`].
fn classify_constraint(message: &str) -> DbError {
    if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
        let field = columns
            .split(", ")
            .next()
            .and_then(|column| column.rsplit('.').next())
            .unwrap_or("value");
        return DbError::duplicate(field, "unknown");
    }
    if message.contains("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: message.to_string(),
        };
    }
    DbError::QueryFailed(message.to_string())
}

/// `map_err` adapter turning `RowNotFound` into a NotFound that names the
/// entity and id.
///
/// ```rust,ignore
/// let sale = query.fetch_one(&pool).await.map_err(not_found("Sale", id))?;
/// ```
pub(crate) fn not_found<'a>(entity: &'a str, id: &'a str) -> impl FnOnce(sqlx::Error) -> DbError + 'a {
    move |err| match err {
        sqlx::Error::RowNotFound => DbError::not_found(entity, id),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_message_names_the_column() {
        let err = classify_constraint("UNIQUE constraint failed: customers.phone");
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "phone"));
    }

    #[test]
    fn test_foreign_key_message() {
        let err = classify_constraint("FOREIGN KEY constraint failed");
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn test_other_messages_are_query_failures() {
        let err = classify_constraint("no such table: sales");
        assert!(matches!(err, DbError::QueryFailed(ref m) if m == "no such table: sales"));
    }
}
