use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spendcoach::{
    config,
    core::Services,
    errors::Result,
    providers::{Messenger, OpenAiClient, WhatsAppClient},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the main application configuration
    let app_config = config::load_app_configuration()?;
    info!("Successfully processed application configuration.");

    // 4. Initialize database
    let db = config::database::create_connection(&app_config.database_url).await?;
    config::database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    // 5. Wire up the providers
    let completion = Arc::new(OpenAiClient::new(app_config.completion.clone())?);
    let messenger: Option<Arc<dyn Messenger>> = match &app_config.whatsapp {
        Some(whatsapp_config) => Some(Arc::new(WhatsAppClient::new(whatsapp_config)?)),
        None => {
            warn!("WhatsApp is not configured, outbound delivery is disabled");
            None
        }
    };
    let webhook_verify_token = app_config
        .whatsapp
        .as_ref()
        .map(|w| w.verify_token.clone());

    // 6. Run the HTTP server
    let services = Services::new(db, completion, messenger);
    let state = AppState::new(services, webhook_verify_token);
    server::run_server(state, &app_config.listen_addr).await
}
