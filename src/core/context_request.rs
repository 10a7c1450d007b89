//! Proactive context requests fired after a transaction is recorded.
//!
//! Debits get a personalized follow-up question built from the user's recent
//! spending history; anything else closes its conversation immediately so the
//! next inbound message routes to the general assistant.

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    core::{Services, conversation, message, prompts, transaction, user},
    entities::transaction::TransactionType,
    errors::Result,
    providers::CompletionRequest,
};

/// How many prior transactions of each flavor feed the question prompt.
const HISTORY_SAMPLE: u64 = 3;

/// Structured follow-up question returned by the provider.
#[derive(Debug, Deserialize)]
pub struct QuestionPayload {
    /// Question text
    pub content: String,
    /// Suggested quick answers
    #[serde(default)]
    pub options: Vec<String>,
}

/// Generates and delivers the follow-up question for a new transaction.
///
/// Non-debit transactions close their conversation and return without asking
/// anything. For debits, the continuation token is persisted and the question
/// logged before delivery is attempted, so a delivery failure never loses the
/// conversation thread.
pub async fn request_transaction_context(services: &Services, transaction_id: i64) -> Result<()> {
    let tx = transaction::require_transaction(&services.db, transaction_id).await?;

    if tx.transaction_type != TransactionType::Debit {
        transaction::close_conversation(&services.db, tx.id).await?;
        info!(
            transaction_id = tx.id,
            "non-debit transaction, no context question"
        );
        return Ok(());
    }

    let sender = user::require_user(&services.db, tx.user_id).await?;

    let category_history = transaction::recent_by_category(
        &services.db,
        tx.user_id,
        tx.category,
        tx.id,
        HISTORY_SAMPLE,
    )
    .await?;
    let store_history = match &tx.store_name {
        Some(store) => {
            transaction::recent_by_store(&services.db, tx.user_id, store, tx.id, HISTORY_SAMPLE)
                .await?
        }
        None => Vec::new(),
    };
    let recent_history =
        transaction::recent_overall(&services.db, tx.user_id, tx.id, HISTORY_SAMPLE).await?;

    let (system, user_prompt) = prompts::context_question(
        &tx,
        &sender,
        &category_history,
        &store_history,
        &recent_history,
    );
    let completion = services
        .completion
        .complete(CompletionRequest {
            system,
            user: user_prompt,
            previous_response_id: None,
            temperature: prompts::QUESTION_TEMPERATURE,
        })
        .await?;
    let payload: QuestionPayload = conversation::parse_structured(&completion.text)?;

    transaction::update_transaction_response_id(&services.db, tx.id, &completion.response_id)
        .await?;
    message::log_outbound(&services.db, tx.user_id, &payload.content, &payload.options).await?;

    conversation::dispatch_reply(
        services,
        &sender,
        &conversation::Reply {
            content: payload.content,
            options: payload.options,
        },
    )
    .await?;

    info!(transaction_id = tx.id, "context question delivered");
    Ok(())
}

/// Fires the context request in the background. Failures are logged and leave
/// the transaction's conversation open with no token.
pub fn spawn_context_request(services: &Services, transaction_id: i64) {
    let services = services.clone();
    tokio::spawn(async move {
        if let Err(e) = request_transaction_context(&services, transaction_id).await {
            warn!(transaction_id, error = %e, "context request failed");
        }
    });
}
