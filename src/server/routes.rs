//! HTTP route handlers for the coaching API.

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    core::{Services, context_request, conversation, message, report, transaction, user},
    entities,
    entities::transaction::{Category, TransactionType},
    errors::Error,
    providers::parse_webhook_payload,
};

use super::AppState;

/// Greeting sent once to a user created from first WhatsApp contact.
const WELCOME_MESSAGE: &str = "Welcome! I'm your personal spending coach. \
I'll check in when new transactions come through and send you spending \
reports. Ask me anything about your finances whenever you like.";

/// Creates the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(create_user))
        .route("/users/link-whatsapp", post(link_whatsapp))
        .route("/users/:id", get(get_user))
        .route("/users/:id/transactions", get(list_transactions))
        .route("/users/:id/messages", get(list_messages))
        .route("/users/:id/reports/short", get(list_short_reports))
        .route("/users/:id/reports/life", get(get_life_report))
        .route("/transactions", get(list_all_transactions).post(create_transaction))
        .route("/messages", post(post_message))
        .route("/reports/short", post(generate_short_report))
        .route("/whatsapp/webhook", get(verify_webhook).post(receive_webhook))
        .route("/whatsapp/send", post(send_message))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// User creation request.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Display name
    pub name: String,
    /// Starting balance, zero when omitted
    #[serde(default)]
    pub balance: f64,
    /// WhatsApp identity to link immediately
    pub whatsapp_id: Option<String>,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<entities::user::Model>), Error> {
    let created = user::create_user(
        &state.services.db,
        request.name,
        request.balance,
        request.whatsapp_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// WhatsApp link request.
#[derive(Debug, Deserialize)]
pub struct LinkWhatsAppRequest {
    /// User to link
    pub user_id: i64,
    /// WhatsApp identity (phone number in international format)
    pub whatsapp_id: String,
}

async fn link_whatsapp(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkWhatsAppRequest>,
) -> Result<Json<entities::user::Model>, Error> {
    let linked =
        user::link_whatsapp(&state.services.db, request.user_id, &request.whatsapp_id).await?;
    Ok(Json(linked))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<entities::user::Model>, Error> {
    let found = user::require_user(&state.services.db, id).await?;
    Ok(Json(found))
}

/// Transaction ingestion request.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Owning user
    pub user_id: i64,
    /// Amount; DEBIT subtracts its absolute value from the balance
    pub amount: f64,
    /// Spending category
    pub category: Category,
    /// CREDIT or DEBIT
    pub transaction_type: TransactionType,
    /// Store or merchant name
    pub store_name: Option<String>,
}

/// Records a transaction and fires the context request in the background.
async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<entities::transaction::Model>), Error> {
    let created = transaction::create_transaction(
        &state.services.db,
        request.user_id,
        request.amount,
        request.category,
        request.transaction_type,
        request.store_name,
    )
    .await?;

    context_request::spawn_context_request(&state.services, created.id);

    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_all_transactions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<entities::transaction::Model>>, Error> {
    let transactions = transaction::get_transactions(&state.services.db).await?;
    Ok(Json(transactions))
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<entities::transaction::Model>>, Error> {
    user::require_user(&state.services.db, id).await?;
    let transactions = transaction::get_transactions_by_user(&state.services.db, id).await?;
    Ok(Json(transactions))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<entities::message::Model>>, Error> {
    user::require_user(&state.services.db, id).await?;
    let messages = message::get_messages_by_user(&state.services.db, id).await?;
    Ok(Json(messages))
}

/// Inbound message over HTTP, mirroring what the webhook does for WhatsApp.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    /// Sending user
    pub user_id: i64,
    /// Message text
    pub content: String,
}

/// Conversation reply returned to HTTP callers.
#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    /// Reply text
    pub content: String,
    /// Suggested reply options, empty when none
    pub options: Vec<String>,
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostMessageRequest>,
) -> Result<Json<ReplyResponse>, Error> {
    let reply =
        conversation::handle_inbound_message(&state.services, request.user_id, &request.content)
            .await?;
    Ok(Json(ReplyResponse {
        content: reply.content,
        options: reply.options,
    }))
}

/// Short-report generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    /// User whose unreported backlog gets aggregated
    pub user_id: i64,
}

async fn generate_short_report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateReportRequest>,
) -> Result<(StatusCode, Json<entities::report::Model>), Error> {
    let generated = report::generate_short_report(&state.services, request.user_id).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

/// Pagination for report listings.
#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    /// Maximum number of reports to return
    pub limit: Option<u64>,
}

async fn list_short_reports(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<Vec<entities::report::Model>>, Error> {
    user::require_user(&state.services.db, id).await?;
    let reports =
        report::recent_short_reports(&state.services.db, id, query.limit.unwrap_or(10)).await?;
    Ok(Json(reports))
}

async fn get_life_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Option<entities::report::Model>>, Error> {
    user::require_user(&state.services.db, id).await?;
    let life = report::get_life_report(&state.services.db, id).await?;
    Ok(Json(life))
}

/// Direct outbound send, bypassing the conversation loop.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Recipient user
    pub user_id: i64,
    /// Message text
    pub body: String,
    /// Reply buttons to attach
    #[serde(default)]
    pub options: Vec<String>,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<StatusCode, Error> {
    let recipient = user::require_user(&state.services.db, request.user_id).await?;
    message::log_outbound(
        &state.services.db,
        recipient.id,
        &request.body,
        &request.options,
    )
    .await?;
    conversation::dispatch_reply(
        &state.services,
        &recipient,
        &conversation::Reply {
            content: request.body,
            options: request.options,
        },
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Webhook verification handshake.
///
/// Meta calls this with `hub.mode=subscribe`, the configured verify token,
/// and a challenge that must be echoed back verbatim on success.
async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token");
    let challenge = params.get("hub.challenge");

    match (mode, token, challenge, &state.webhook_verify_token) {
        (Some("subscribe"), Some(token), Some(challenge), Some(expected)) if token == expected => {
            info!("webhook verification succeeded");
            (StatusCode::OK, challenge.clone())
        }
        _ => {
            warn!("webhook verification rejected");
            (StatusCode::FORBIDDEN, String::new())
        }
    }
}

/// Inbound webhook deliveries.
///
/// Always answers 200 so the platform does not retry; processing happens in
/// the background and failures are logged.
async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    if let Some(inbound) = parse_webhook_payload(&body) {
        let services = state.services.clone();
        tokio::spawn(async move {
            if let Err(e) = process_inbound(&services, inbound).await {
                warn!(error = %e, "webhook message processing failed");
            }
        });
    }
    Json(serde_json::json!({ "status": "received" }))
}

/// Routes one webhook message: resolves or provisions the user, then runs
/// the conversation turn. First contact gets a welcome instead of a turn.
async fn process_inbound(
    services: &Services,
    inbound: crate::providers::InboundMessage,
) -> crate::errors::Result<()> {
    match user::get_user_by_whatsapp_id(&services.db, &inbound.from).await? {
        Some(sender) => {
            conversation::handle_inbound_message(services, sender.id, &inbound.body).await?;
        }
        None => {
            let name = inbound.profile_name.as_deref().unwrap_or(&inbound.from);
            let created =
                user::create_user_from_whatsapp(&services.db, &inbound.from, name).await?;
            info!(user_id = created.id, "provisioned user from first contact");

            message::log_outbound(&services.db, created.id, WELCOME_MESSAGE, &[]).await?;
            conversation::dispatch_reply(
                services,
                &created,
                &conversation::Reply {
                    content: WELCOME_MESSAGE.to_string(),
                    options: Vec::new(),
                },
            )
            .await?;
        }
    }
    Ok(())
}
