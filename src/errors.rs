//! Unified error types for the cheque ledger.
//!
//! Domain guard failures carry enough context for the caller to tell the operator
//! what went wrong. Infrastructure failures (database, I/O, configuration) wrap
//! their source error.

use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure the cheque ledger can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Amount is negative, zero where a positive value is required, or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Cheque number range is empty, inverted, or larger than the configured cap
    #[error("Invalid cheque range {start}..={end}: {reason}")]
    InvalidRange {
        /// First number of the requested range
        start: u64,
        /// Last number of the requested range
        end: u64,
        /// Why the range was rejected
        reason: String,
    },

    /// A cheque with this number already exists on the bank account
    #[error("Cheque number '{cheque_number}' already exists on bank account {bank_account_id}")]
    DuplicateChequeNumber {
        /// Bank account the number collides on
        bank_account_id: i64,
        /// Colliding cheque number
        cheque_number: String,
    },

    /// The requested transition is not allowed from the cheque's current state
    #[error("Invalid state for cheque {cheque_id}: {message}")]
    InvalidState {
        /// Cheque whose transition was rejected
        cheque_id: i64,
        /// Description of the violated guard
        message: String,
    },

    /// The cheque has already been settled
    #[error("Cheque {cheque_id} is already settled")]
    AlreadySettled {
        /// Cheque that was already settled
        cheque_id: i64,
    },

    /// Replacement settlement requested for a cheque that is within its face value
    #[error("Cheque {cheque_id} is not overspent")]
    NotOverspent {
        /// Cheque that is not overspent
        cheque_id: i64,
    },

    /// The cheque offered as a settling cheque is not drawn from the eligible pool
    #[error("Cheque {cheque_id} cannot be used as a settling cheque: {reason}")]
    SettlingChequeNotEligible {
        /// Rejected settling cheque
        cheque_id: i64,
        /// Why it was rejected
        reason: String,
    },

    /// A settlement that requires proof documents was submitted without them
    #[error("Missing proof: {message}")]
    MissingProof {
        /// What proof was expected
        message: String,
    },

    /// A proof document failed type or size validation
    #[error("Invalid document '{file_name}': {reason}")]
    InvalidDocument {
        /// Original file name of the rejected document
        file_name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The caller lacks the capability for this action
    #[error("Forbidden: {action}")]
    Forbidden {
        /// The action that was refused
        action: String,
    },

    /// The referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record (e.g. `"Cheque"`, `"Safe"`)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The target safe has been deactivated
    #[error("Safe {safe_id} is inactive")]
    SafeInactive {
        /// The inactive safe
        safe_id: i64,
    },

    /// Input failed a non-monetary validation rule
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the rule that failed
        message: String,
    },

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Details of the configuration problem
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON (de)serialization failure for stored settings
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Returns true for guard failures that the operator can fix and resubmit,
    /// as opposed to infrastructure failures.
    #[must_use]
    pub const fn is_domain(&self) -> bool {
        !matches!(
            self,
            Self::Config { .. }
                | Self::Database(_)
                | Self::Serialization(_)
                | Self::Io(_)
                | Self::EnvVar(_)
        )
    }

    pub(crate) fn cheque_not_found(cheque_id: i64) -> Self {
        Self::NotFound {
            entity: "Cheque",
            id: cheque_id.to_string(),
        }
    }

    pub(crate) fn safe_not_found(safe_id: i64) -> Self {
        Self::NotFound {
            entity: "Safe",
            id: safe_id.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_domain_errors_are_classified() {
        assert!(Error::InvalidAmount { amount: dec!(-1) }.is_domain());
        assert!(Error::AlreadySettled { cheque_id: 1 }.is_domain());
        assert!(
            Error::Forbidden {
                action: "cancel".to_string()
            }
            .is_domain()
        );
        assert!(
            !Error::Config {
                message: "bad".to_string()
            }
            .is_domain()
        );
        assert!(!Error::Database(sea_orm::DbErr::Custom("boom".to_string())).is_domain());
    }

    #[test]
    fn test_error_messages_include_context() {
        let err = Error::DuplicateChequeNumber {
            bank_account_id: 7,
            cheque_number: "CHQ-12".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cheque number 'CHQ-12' already exists on bank account 7"
        );
        assert_eq!(Error::cheque_not_found(42).to_string(), "Cheque 42 not found");
    }
}
