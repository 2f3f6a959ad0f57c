use gemini_chatbot::{api::start_server, ChatConfig, ChatService, GeminiProvider};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ChatConfig::from_env()?;

    if !config.has_credential() {
        warn!("⚠️  GOOGLE_API_KEY not set in .env; chat requests will not be sent");
    }

    info!("🚀 Gemini Chatbot");
    info!("📍 Port: {}", config.port);
    info!("🤖 Model: {} (temperature {})", config.model.model, config.model.temperature);

    let provider = Arc::new(GeminiProvider::new(config.model.clone()));
    let chat = Arc::new(ChatService::new(config, provider));

    info!("📡 Starting chat server...");

    start_server(chat).await?;

    Ok(())
}
