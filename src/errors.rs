//! Unified error types for the coaching backend.
//!
//! One enum covers the whole crate: the conversation/report failure taxonomy
//! (unknown user, completion-provider failure, empty aggregation set, failed
//! delivery) plus the ambient database, configuration, and environment
//! errors. Persistence failures arrive via the `sea_orm::DbErr` conversion.

use thiserror::Error;

/// All errors produced by the coaching backend.
#[derive(Debug, Error)]
pub enum Error {
    /// No user exists for the given id or WhatsApp identity.
    #[error("User not found: {id}")]
    UserNotFound {
        /// The identifier that failed to resolve
        id: String,
    },

    /// No transaction exists for the given id.
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// The transaction id that failed to resolve
        id: i64,
    },

    /// The completion provider failed, or returned content that could not be
    /// parsed into the expected structure.
    #[error("AI generation failed: {message}")]
    AiGeneration {
        /// What went wrong at the provider boundary
        message: String,
    },

    /// Short-report generation was requested but every transaction is
    /// already reported. Caller-visible "nothing to do", not a fault.
    #[error("No unreported transactions found for user {user_id}")]
    NoUnreportedTransactions {
        /// The user whose backlog was empty
        user_id: i64,
    },

    /// The messaging provider rejected or failed an outbound delivery.
    #[error("Message delivery failed: {message}")]
    Delivery {
        /// What went wrong at the messaging boundary
        message: String,
    },

    /// Transaction amount was zero or non-finite.
    #[error("Invalid transaction amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Store write or read failed.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Configuration was missing or malformed.
    #[error("Configuration error: {message}")]
    Config {
        /// Which setting was wrong
        message: String,
    },

    /// A required environment variable was missing or invalid.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Filesystem or socket error outside the database.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::AiGeneration {
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
