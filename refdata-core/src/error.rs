/// Structured error types for refdata-core.
///
/// Query failures are passed through untouched as [`RefdataError::Database`];
/// this layer never retries or translates them. The CLI wraps everything in
/// `anyhow` for reporting.
use thiserror::Error;

/// Main error type for refdata-core operations
#[derive(Error, Debug)]
pub enum RefdataError {
    /// Query execution failed (connection, syntax, constraint, timeout)
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A record did not have the shape of the expected row type
    #[error("Failed to decode {table} record: {source}")]
    Decode {
        table: &'static str,
        source: serde_json::Error,
    },

    /// The executor produced something other than a column-keyed object
    #[error("Invalid record from {table}: {reason}")]
    InvalidRecord { table: &'static str, reason: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for refdata-core operations
pub type Result<T> = std::result::Result<T, RefdataError>;

impl RefdataError {
    /// Create a decode error for a table
    pub fn decode(table: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { table, source }
    }

    /// Create an invalid record error
    pub fn invalid_record(table: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            table,
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
