//! HTTP server for the coaching API.
//!
//! Provides REST endpoints for:
//! - User provisioning and WhatsApp linking
//! - Transaction ingestion (which opens context conversations)
//! - The message conversation loop
//! - Report generation and retrieval
//! - The WhatsApp webhook (verification handshake and inbound messages)

pub mod routes;

pub use routes::create_router;

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{core::Services, errors::Error};

/// Shared application state.
pub struct AppState {
    /// Core collaborators bundle
    pub services: Services,
    /// Shared secret for the webhook verification handshake
    pub webhook_verify_token: Option<String>,
}

impl AppState {
    /// Creates the shared state.
    #[must_use]
    pub fn new(services: Services, webhook_verify_token: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            services,
            webhook_verify_token,
        })
    }
}

/// Starts the HTTP server on `listen_addr` and serves until shutdown.
pub async fn run_server(state: Arc<AppState>, listen_addr: &str) -> crate::errors::Result<()> {
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(listen_addr).await?;
    info!("listening on http://{listen_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::UserNotFound { .. } | Self::TransactionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidAmount { .. } | Self::NoUnreportedTransactions { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::AiGeneration { .. } | Self::Delivery { .. } => StatusCode::BAD_GATEWAY,
            Self::Database(_)
            | Self::Config { .. }
            | Self::EnvVar(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
