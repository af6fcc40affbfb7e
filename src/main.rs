use std::path::PathBuf;
use std::sync::Arc;

use convoy_core::config::Settings;
use convoy_openai::{OpenAiContactExtractor, OpenAiGreetingSynthesizer};
use convoy_server::{AppState, RealtimeBridgeFactory, ServerConfig};
use convoy_store::Database;
use convoy_telemetry::{init_telemetry, TelemetryConfig};
use convoy_telephony::TwilioClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    if let Some(dir) = settings.db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::create_dir_all(&settings.audio_dir)?;

    let log_db_path = settings
        .db_path
        .parent()
        .map(|dir| dir.join("logs.db"))
        .unwrap_or_else(|| PathBuf::from("logs.db"));
    let _telemetry = init_telemetry(TelemetryConfig {
        log_db_path,
        ..Default::default()
    });

    tracing::info!("starting convoy voice gateway");

    let db = Database::open(&settings.db_path)?;
    tracing::info!(path = %settings.db_path.display(), "database opened");

    let settings = Arc::new(settings);
    let state = AppState::new(
        db,
        Arc::clone(&settings),
        Arc::new(OpenAiGreetingSynthesizer::new(&settings)),
        Arc::new(OpenAiContactExtractor::new(&settings)),
        Arc::new(TwilioClient::new(&settings)),
        Arc::new(RealtimeBridgeFactory::new(Arc::clone(&settings))),
    );

    let config = ServerConfig {
        port: settings.port,
        ..Default::default()
    };
    let handle = convoy_server::start(config, state).await?;
    tracing::info!(port = handle.port, base_url = %settings.base_url, "convoy ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
