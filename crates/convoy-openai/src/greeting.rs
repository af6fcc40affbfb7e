use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use convoy_core::collab::GreetingSynthesizer;
use convoy_core::config::Settings;
use convoy_core::errors::GatewayError;

const API_BASE: &str = "https://api.openai.com";
const TTS_MODEL: &str = "tts-1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Renders the caller greeting to MP3 via the speech endpoint and caches
/// it under the audio directory, named by the caller's digits so repeat
/// callers overwrite their own file rather than piling up.
pub struct OpenAiGreetingSynthesizer {
    client: Client,
    api_key: SecretString,
    voice: String,
    audio_dir: PathBuf,
    api_base: String,
}

impl OpenAiGreetingSynthesizer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_key: settings.openai_api_key.clone(),
            voice: settings.voice.clone(),
            audio_dir: settings.audio_dir.clone(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Point requests at a different host. Used by tests.
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }
}

/// The spoken line itself. Known callers get addressed by name.
fn greeting_text(name: Option<&str>) -> String {
    match name {
        Some(name) => {
            format!("Hi {name}, welcome back to Super Truck AI. How can I help you today?")
        }
        None => "Hi there! I'm Alex, your sales agent at Super Truck AI. How can I assist you?"
            .to_string(),
    }
}

#[async_trait]
impl GreetingSynthesizer for OpenAiGreetingSynthesizer {
    #[instrument(skip(self, name), fields(known = name.is_some()))]
    async fn synthesize(
        &self,
        name: Option<&str>,
        phone_digits: &str,
    ) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "model": TTS_MODEL,
            "voice": self.voice,
            "input": greeting_text(name),
        });

        let resp = self
            .client
            .post(format!("{}/v1/audio/speech", self.api_base))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, body));
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        let filename = format!("greeting_{phone_digits}.mp3");
        tokio::fs::create_dir_all(&self.audio_dir)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        tokio::fs::write(self.audio_dir.join(&filename), &audio)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        debug!(filename = %filename, bytes = audio.len(), "greeting cached");
        Ok(format!("/audio/{filename}"))
    }
}
