//! Error types for the Historia core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Historia core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity configuration is invalid. Raised at registration time.
    #[error("configuration error for entity '{entity}': {message}")]
    Configuration {
        /// Entity the configuration belongs to.
        entity: String,
        /// Description of the problem.
        message: String,
    },

    /// Unknown ordering strategy name.
    #[error("unknown strategy: {name}")]
    UnknownStrategy {
        /// The unrecognized strategy name.
        name: String,
    },

    /// A version row for this (identity, transaction) pair already exists.
    ///
    /// Surfaces concurrency conflicts between near-simultaneous commits.
    /// The caller must retry the whole logical transaction; the core never
    /// retries internally.
    #[error("version conflict in table '{table}' for transaction {transaction_id}")]
    VersionConflict {
        /// Version table where the conflict occurred.
        table: String,
        /// The transaction ID that collided.
        transaction_id: u64,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The store has no record of the requested transaction.
    #[error("transaction not found: {transaction_id}")]
    TransactionNotFound {
        /// The missing transaction ID.
        transaction_id: u64,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown strategy error.
    pub fn unknown_strategy(name: impl Into<String>) -> Self {
        Self::UnknownStrategy { name: name.into() }
    }

    /// Creates a version conflict error.
    pub fn version_conflict(table: impl Into<String>, transaction_id: u64) -> Self {
        Self::VersionConflict {
            table: table.into(),
            transaction_id,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_display() {
        let err = CoreError::configuration("article", "no primary key columns");
        assert_eq!(
            err.to_string(),
            "configuration error for entity 'article': no primary key columns"
        );
    }

    #[test]
    fn version_conflict_display() {
        let err = CoreError::version_conflict("article_version", 7);
        assert!(err.to_string().contains("article_version"));
        assert!(err.to_string().contains('7'));
    }
}
