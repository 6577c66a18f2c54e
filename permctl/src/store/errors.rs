//! Storage error types.
//!
//! `DbError` normalizes sqlx errors into a small set of variants the rest of
//! the crate can match on, extracting constraint metadata from PostgreSQL
//! error payloads where available.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Resource not found")]
    NotFound,

    #[error("Unique constraint violation: {message}")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error("Foreign key constraint violation: {message}")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().map(String::from);
                let table = db_err.table().map(String::from);
                let message = db_err.message().to_string();

                match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        constraint,
                        table,
                        message,
                    },
                    sqlx::error::ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                        constraint,
                        table,
                        message,
                    },
                    _ => DbError::Other(err.into()),
                }
            }
            _ => DbError::Other(err.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
