//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases,
//! creating test entities with sensible defaults, and scripting the completion
//! and messaging providers.

#![allow(clippy::unwrap_used)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::{
    core::{Services, transaction, user},
    entities::{
        self,
        transaction::{Category, TransactionType},
    },
    errors::{Error, Result},
    providers::{Completion, CompletionProvider, CompletionRequest, Messenger},
};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test user with sensible defaults.
///
/// # Defaults
/// * `name`: `"Test User"`
/// * `balance`: 1000.0
/// * `whatsapp_id`: linked, `"15551230001"`
pub async fn create_test_user(db: &DatabaseConnection) -> Result<entities::user::Model> {
    user::create_user(
        db,
        "Test User".to_string(),
        1000.0,
        Some("15551230001".to_string()),
    )
    .await
}

/// Creates a test transaction with sensible defaults.
///
/// # Arguments
/// * `amount` - negative for a DEBIT, positive for a CREDIT
///
/// # Defaults
/// * `category`: `Other`
/// * `store_name`: None
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    amount: f64,
) -> Result<entities::transaction::Model> {
    let transaction_type = if amount < 0.0 {
        TransactionType::Debit
    } else {
        TransactionType::Credit
    };

    transaction::create_transaction(db, user_id, amount, Category::Other, transaction_type, None)
        .await
}

/// Creates a test transaction with custom parameters.
pub async fn create_custom_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    amount: f64,
    category: Category,
    transaction_type: TransactionType,
    store_name: Option<&str>,
) -> Result<entities::transaction::Model> {
    transaction::create_transaction(
        db,
        user_id,
        amount,
        category,
        transaction_type,
        store_name.map(ToString::to_string),
    )
    .await
}

/// Sets up a complete test environment with a user.
/// Returns (db, user) for common test scenarios.
pub async fn setup_with_user() -> Result<(DatabaseConnection, entities::user::Model)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db).await?;
    Ok((db, user))
}

/// Builds an unpersisted user model for pure functions like prompt builders.
pub fn sample_user(id: i64) -> entities::user::Model {
    entities::user::Model {
        id,
        name: "Test User".to_string(),
        balance: 1000.0,
        whatsapp_id: Some("15551230001".to_string()),
        created_at: chrono::Utc::now(),
    }
}

/// Builds an unpersisted DEBIT food transaction for pure functions.
pub fn sample_transaction(
    id: i64,
    user_id: i64,
    amount: f64,
    store_name: &str,
) -> entities::transaction::Model {
    let mut model =
        sample_typed_transaction(id, user_id, amount, Category::Food, TransactionType::Debit, 0);
    model.store_name = Some(store_name.to_string());
    model
}

/// Builds an unpersisted transaction with a fixed date for aggregation tests.
pub fn sample_typed_transaction(
    id: i64,
    user_id: i64,
    amount: f64,
    category: Category,
    transaction_type: TransactionType,
    timestamp_secs: i64,
) -> entities::transaction::Model {
    entities::transaction::Model {
        id,
        user_id,
        amount,
        category,
        transaction_type,
        store_name: None,
        date: chrono::DateTime::from_timestamp(timestamp_secs, 0).unwrap_or_default(),
        context: None,
        is_reported: false,
        is_conversation_closed: false,
        latest_response_id: None,
    }
}

/// A completion provider that replays a scripted queue of results and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<Completion>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    /// Queues a successful completion.
    pub fn push_text(&self, text: &str, response_id: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(Completion {
                text: text.to_string(),
                response_id: response_id.to_string(),
            }));
    }

    /// Queues a generation failure.
    pub fn push_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::AiGeneration {
                message: message.to_string(),
            }));
    }

    /// The most recent request, if any was made.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::AiGeneration {
                    message: "no scripted completion queued".to_string(),
                })
            })
    }
}

/// One message captured by [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient identity
    pub to: String,
    /// Message text
    pub body: String,
    /// Attached reply options, empty for plain text
    pub options: Vec<String>,
}

/// A messenger that records outbound messages instead of delivering them.
#[derive(Default)]
pub struct RecordingMessenger {
    messages: Mutex<Vec<SentMessage>>,
}

impl RecordingMessenger {
    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.messages.lock().unwrap().push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
            options: Vec::new(),
        });
        Ok(())
    }

    async fn send_buttons(&self, to: &str, body: &str, options: &[String]) -> Result<()> {
        self.messages.lock().unwrap().push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
            options: options.to_vec(),
        });
        Ok(())
    }
}

/// Sets up a complete test environment: in-memory database plus scripted
/// providers. Returns the services bundle alongside handles to the scripted
/// completion provider and the recording messenger.
pub async fn setup_services() -> Result<(
    Services,
    Arc<ScriptedCompletion>,
    Arc<RecordingMessenger>,
)> {
    let db = setup_test_db().await?;
    let completion = Arc::new(ScriptedCompletion::default());
    let messenger = Arc::new(RecordingMessenger::default());
    let services = Services::new(
        db,
        completion.clone(),
        Some(messenger.clone() as Arc<dyn Messenger>),
    );
    Ok((services, completion, messenger))
}
