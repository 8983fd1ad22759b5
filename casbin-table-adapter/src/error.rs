//! Error types for the table adapter.
//!
//! Database failures are relayed as-is; the adapter never retries. Contract
//! violations (such as mismatched update batches) are reported before any
//! statement reaches the database.

/// Errors raised by the table adapter
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Query, connection or transaction failure from the database layer
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Old and new rule lists of a batch update differ in length
    #[error("Rule count mismatch: {old} old rules but {new} new rules")]
    RuleCountMismatch { old: usize, new: usize },

    /// Table or column name that is not a plain SQL identifier
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Value column list narrower than the minimum rule width
    #[error("Field name mapping has {got} value columns, at least {min} are required")]
    TooFewValueColumns { got: usize, min: usize },

    /// Settings could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for casbin::Error {
    fn from(err: StoreError) -> Self {
        casbin::Error::from(casbin::error::AdapterError(Box::new(err)))
    }
}

impl StoreError {
    /// Check if this error originated in the database layer
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Check if this error was caused by invalid adapter configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_) | Self::TooFewValueColumns { .. } | Self::Config(_)
        )
    }
}
