use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use convoy_core::collab::{CarrierLine, ContactExtractor, GreetingSynthesizer};
use convoy_core::config::Settings;
use convoy_store::Database;

use crate::handlers;
use crate::session::{BridgeFactory, SessionRegistry};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    /// Ceiling on webhook handling end to end. The carrier abandons slow
    /// webhooks, so a response past this point is worthless anyway.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5050,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Shared application state passed to Axum handlers. Built once at
/// startup; tests substitute an in-memory store and scripted fakes.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Arc<Settings>,
    pub greeting: Arc<dyn GreetingSynthesizer>,
    pub extractor: Arc<dyn ContactExtractor>,
    pub line: Arc<dyn CarrierLine>,
    pub bridges: Arc<dyn BridgeFactory>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        db: Database,
        settings: Arc<Settings>,
        greeting: Arc<dyn GreetingSynthesizer>,
        extractor: Arc<dyn ContactExtractor>,
        line: Arc<dyn CarrierLine>,
        bridges: Arc<dyn BridgeFactory>,
    ) -> Self {
        Self {
            db,
            settings,
            greeting,
            extractor,
            line,
            bridges,
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/telephony/incoming-call",
            get(handlers::incoming_call).post(handlers::incoming_call),
        )
        .route(
            "/telephony/agent-incoming-call",
            get(handlers::agent_incoming_call).post(handlers::agent_incoming_call),
        )
        .route(
            "/telephony/outgoing-call-handler",
            get(handlers::outgoing_call_handler).post(handlers::outgoing_call_handler),
        )
        .route("/telephony/initiate-call", post(handlers::initiate_call))
        .route("/carriers", post(handlers::create_carrier))
        .route("/assistants", post(handlers::create_assistant))
        .route("/audio/{filename}", get(handlers::audio_file))
        .route(
            "/media-stream/{call_sid}/{phone_number}",
            get(handlers::media_stream),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state).layer(TimeoutLayer::new(config.request_timeout));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "convoy server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
    })
}

/// Handle returned by `start()` — dropping it does not stop the server,
/// but it carries the bound port for callers that asked for port 0.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::path::PathBuf;

    use secrecy::SecretString;

    use convoy_core::config::{DEFAULT_EXTRACTION_MODEL, DEFAULT_REALTIME_MODEL};
    use convoy_core::phone::PhoneNumber;
    use convoy_openai::mock::{FakeExtractor, FakeGreeting, FakeLine};

    use crate::session::tests::ScriptedBridges;

    pub fn test_settings() -> Settings {
        Settings {
            port: 5050,
            base_url: "https://convoy.example.com".into(),
            db_path: PathBuf::from(":memory:"),
            audio_dir: std::env::temp_dir().join("convoy-test-audio"),
            twilio_account_sid: "AC000".into(),
            twilio_auth_token: SecretString::from("token"),
            twilio_phone_number: PhoneNumber::parse("+15550001111").unwrap(),
            openai_api_key: SecretString::from("sk-test"),
            realtime_model: DEFAULT_REALTIME_MODEL.into(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.into(),
            voice: "sage".into(),
        }
    }

    /// State over an in-memory store and the given fakes, with a
    /// no-extraction extractor.
    pub fn state_with(
        greeting: Arc<dyn GreetingSynthesizer>,
        line: Arc<dyn CarrierLine>,
        bridges: Arc<dyn BridgeFactory>,
    ) -> AppState {
        AppState::new(
            Database::in_memory().unwrap(),
            Arc::new(test_settings()),
            greeting,
            extractor_none(),
            line,
            bridges,
        )
    }

    pub fn extractor_none() -> Arc<dyn ContactExtractor> {
        Arc::new(FakeExtractor::returning(None, None))
    }

    fn default_state() -> AppState {
        state_with(
            Arc::new(FakeGreeting::returning("/audio/greeting_15551234567.mp3")),
            Arc::new(FakeLine::answering("CA900", None)),
            Arc::new(ScriptedBridges::with_transcript("")),
        )
    }

    #[test]
    fn build_router_creates_routes() {
        let _router = build_router(default_state());
        // Route syntax errors panic at build time, so getting here is the test.
    }

    #[tokio::test]
    async fn server_starts_and_serves_root() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let handle = start(config, default_state()).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.text().await.unwrap().contains("running"));
    }
}
