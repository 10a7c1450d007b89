//! Conversation routing - the per-user state machine for inbound messages.
//!
//! State is derived once per turn from the user's most recent transaction:
//! an open context conversation (`is_conversation_closed = false`) routes the
//! message through context extraction, anything else falls into general
//! assistant mode grounded in the user's reports. The ordering contract for
//! every turn is: log the inbound message, generate the reply, log the reply,
//! then dispatch it. A provider or parse failure aborts the turn before any
//! reply is logged or sent.

use serde::Deserialize;
use tracing::debug;

use crate::{
    core::{Services, message, prompts, report, transaction, user},
    entities::{transaction as transaction_entity, user as user_entity},
    errors::{Error, Result},
    providers::CompletionRequest,
};

/// Where an inbound message will be routed, computed once per turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationState {
    /// The most recent transaction still has an open context conversation
    OpenContext(transaction_entity::Model),
    /// No transaction, or the most recent conversation is closed
    General,
}

/// One reply produced by a conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply text
    pub content: String,
    /// Suggested reply options, empty when none are offered
    pub options: Vec<String>,
}

/// Structured result of a context-extraction exchange.
#[derive(Debug, Deserialize)]
pub struct ExtractionPayload {
    /// Whether the message relates to the open transaction
    #[serde(rename = "isRelated")]
    pub is_related: bool,
    /// Whether the provider wants another turn before closing
    #[serde(rename = "needFurtherInfo")]
    pub need_further_info: bool,
    /// Context extracted from the user's message
    #[serde(default)]
    pub context: String,
    /// The reply to send back
    pub response: ExtractionResponse,
}

/// Reply portion of an [`ExtractionPayload`].
#[derive(Debug, Deserialize)]
pub struct ExtractionResponse {
    /// Reply text
    pub content: String,
    /// Suggested reply options
    #[serde(default)]
    pub options: Vec<String>,
}

/// Parses a provider answer that was asked for as a bare JSON object.
///
/// Tolerates the one formatting slip providers still make after being told
/// not to use markdown: a fenced code block around the object.
pub fn parse_structured<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim);
    serde_json::from_str(body).map_err(|e| Error::AiGeneration {
        message: format!("unparsable structured completion: {e}"),
    })
}

/// Derives the routing state from the user's most recent transaction.
pub async fn conversation_state(services: &Services, user_id: i64) -> Result<ConversationState> {
    match transaction::latest_transaction(&services.db, user_id).await? {
        Some(latest) if !latest.is_conversation_closed => {
            Ok(ConversationState::OpenContext(latest))
        }
        _ => Ok(ConversationState::General),
    }
}

/// Handles one inbound message end to end and returns the reply.
///
/// The reply is logged and, for users with a linked messaging identity,
/// dispatched before this returns. Failures abort the turn with nothing sent.
pub async fn handle_inbound_message(
    services: &Services,
    user_id: i64,
    text: &str,
) -> Result<Reply> {
    let sender = user::require_user(&services.db, user_id).await?;
    let inbound = message::log_inbound(&services.db, user_id, text).await?;

    let state = conversation_state(services, user_id).await?;
    debug!(user_id, ?state, "routing inbound message");

    let reply = match state {
        ConversationState::OpenContext(open) => {
            open_context_turn(services, &open, text).await?
        }
        ConversationState::General => general_turn(services, &sender, &inbound, text).await?,
    };

    message::log_outbound(&services.db, user_id, &reply.content, &reply.options).await?;
    dispatch_reply(services, &sender, &reply).await?;

    Ok(reply)
}

/// One turn against the open transaction-context conversation.
async fn open_context_turn(
    services: &Services,
    open: &transaction_entity::Model,
    text: &str,
) -> Result<Reply> {
    let (system, user_prompt) = prompts::context_extraction(open, text);
    let completion = services
        .completion
        .complete(CompletionRequest {
            system,
            user: user_prompt,
            previous_response_id: open.latest_response_id.clone(),
            temperature: prompts::EXTRACTION_TEMPERATURE,
        })
        .await?;
    let payload: ExtractionPayload = parse_structured(&completion.text)?;

    // The token is persisted unconditionally, before any branching
    transaction::update_transaction_response_id(&services.db, open.id, &completion.response_id)
        .await?;

    if !payload.is_related {
        // Mismatch between message and open transaction; the conversation
        // stays open and untouched, the user still gets the reply
        return Ok(Reply {
            content: payload.response.content,
            options: payload.response.options,
        });
    }

    transaction::update_transaction_context(&services.db, open.id, &payload.context).await?;

    if payload.need_further_info {
        Ok(Reply {
            content: payload.response.content,
            options: payload.response.options,
        })
    } else {
        transaction::close_conversation(&services.db, open.id).await?;
        // Closing reply carries no options
        Ok(Reply {
            content: payload.response.content,
            options: Vec::new(),
        })
    }
}

/// One general-assistant turn grounded in the user's reports.
async fn general_turn(
    services: &Services,
    sender: &user_entity::Model,
    inbound: &crate::entities::message::Model,
    text: &str,
) -> Result<Reply> {
    let life = report::get_life_report(&services.db, sender.id).await?;
    let shorts = report::recent_short_reports(&services.db, sender.id, 2).await?;
    let prior = message::latest_prior_inbound(&services.db, sender.id, inbound.id).await?;
    let previous_response_id = prior.and_then(|m| m.ai_response_id);

    let (system, user_prompt) = prompts::general_assistant(sender, life.as_ref(), &shorts, text);
    let completion = services
        .completion
        .complete(CompletionRequest {
            system,
            user: user_prompt,
            previous_response_id,
            temperature: prompts::GENERAL_TEMPERATURE,
        })
        .await?;

    message::attach_response_id(&services.db, inbound.id, &completion.response_id).await?;

    Ok(Reply {
        content: completion.text,
        options: Vec::new(),
    })
}

/// Delivers a reply to the user's linked messaging identity, if any.
pub(crate) async fn dispatch_reply(
    services: &Services,
    recipient: &user_entity::Model,
    reply: &Reply,
) -> Result<()> {
    let (Some(messenger), Some(whatsapp_id)) = (&services.messenger, &recipient.whatsapp_id)
    else {
        return Ok(());
    };
    if reply.options.is_empty() {
        messenger.send_text(whatsapp_id, &reply.content).await
    } else {
        messenger
            .send_buttons(whatsapp_id, &reply.content, &reply.options)
            .await
    }
}
