use std::sync::Arc;
use tracing::{info, warn};

use medreport::{
    config::{Config, DEFAULT_JWT_SECRET},
    db::Database,
    gemini::GeminiClient,
    session::SessionStore,
    translation::Translator,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    if config.jwt_secret == DEFAULT_JWT_SECRET {
        warn!("JWT_SECRET is not set; using the built-in default. Tokens are forgeable.");
    }

    let db = Database::new(&config.database_url).await?;

    info!("Running SQLx migrations...");
    sqlx::migrate!("./migrations").run(db.get_pool()).await?;
    info!("Migrations completed");

    tokio::fs::create_dir_all(&config.upload_path).await?;

    let gemini = GeminiClient::new(
        config.gemini_base_url.clone(),
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    );
    let translator = Translator::new(config.translate_base_url.clone());

    let server_address = config.server_address.clone();
    let state = Arc::new(AppState {
        db,
        config,
        gemini,
        translator,
        sessions: SessionStore::new(),
    });

    let app = medreport::app(state);

    info!("Server starting on {}", server_address);

    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
