//! Core business logic - framework-agnostic conversation, transaction, and
//! reporting operations.
//!
//! Everything here works against a [`Services`] bundle: the database handle
//! plus the two external collaborators behind their traits. The HTTP layer
//! constructs one `Services` at startup; tests construct one around an
//! in-memory database and scripted fakes.

/// Conversation router - routes each inbound message to the open
/// transaction-context conversation or the general assistant
pub mod conversation;
/// Context-request initiator - proactively opens a conversation after a
/// transaction is created
pub mod context_request;
/// Message log operations
pub mod message;
/// Prompt builders for the completion provider
pub mod prompts;
/// Report aggregation - SHORT report generation and LIFE report folding
pub mod report;
/// Transaction operations, including the atomic create + balance update
pub mod transaction;
/// User provisioning and WhatsApp identity resolution
pub mod user;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::providers::{CompletionProvider, Messenger};

/// Collaborators injected into every core operation.
///
/// Cheap to clone; background tasks take their own copy.
#[derive(Clone)]
pub struct Services {
    /// Database connection
    pub db: DatabaseConnection,
    /// Language-model completion service
    pub completion: Arc<dyn CompletionProvider>,
    /// Outbound messaging channel, None when delivery is not configured
    pub messenger: Option<Arc<dyn Messenger>>,
}

impl Services {
    /// Bundles the injected collaborators.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        completion: Arc<dyn CompletionProvider>,
        messenger: Option<Arc<dyn Messenger>>,
    ) -> Self {
        Self {
            db,
            completion,
            messenger,
        }
    }
}
