use std::path::PathBuf;

use secrecy::SecretString;

use crate::ids::CallSid;
use crate::phone::PhoneNumber;

pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_BASE_URL: &str = "http://localhost:5050";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-mini-realtime-preview-2024-12-17";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_VOICE: &str = "sage";

/// Process-wide configuration, read once at startup and injected into
/// components. Secrets stay wrapped until the moment a request is built.
#[derive(Clone)]
pub struct Settings {
    pub port: u16,
    /// Public base URL the carrier can reach us at, scheme included.
    pub base_url: String,
    pub db_path: PathBuf,
    /// Directory where synthesized greeting files are written and served from.
    pub audio_dir: PathBuf,
    pub twilio_account_sid: String,
    pub twilio_auth_token: SecretString,
    /// Outbound caller id.
    pub twilio_phone_number: PhoneNumber,
    pub openai_api_key: SecretString,
    pub realtime_model: String,
    pub extraction_model: String,
    pub voice: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {detail}")]
    InvalidVar { name: &'static str, detail: String },
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("CONVOY_PORT") {
            Ok(v) => v.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidVar {
                name: "CONVOY_PORT",
                detail: e.to_string(),
            })?,
            Err(_) => DEFAULT_PORT,
        };
        let base_url = std::env::var("CONVOY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let db_path = std::env::var("CONVOY_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".convoy/convoy.db"));
        let audio_dir = std::env::var("CONVOY_AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("audio_cache"));

        let twilio_phone_number = PhoneNumber::parse(&required("TWILIO_PHONE_NUMBER")?)
            .map_err(|e| ConfigError::InvalidVar {
                name: "TWILIO_PHONE_NUMBER",
                detail: e.to_string(),
            })?;

        Ok(Self {
            port,
            base_url,
            db_path,
            audio_dir,
            twilio_account_sid: required("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: SecretString::from(required("TWILIO_AUTH_TOKEN")?),
            twilio_phone_number,
            openai_api_key: SecretString::from(required("OPENAI_API_KEY")?),
            realtime_model: std::env::var("OPENAI_REALTIME_MODEL")
                .unwrap_or_else(|_| DEFAULT_REALTIME_MODEL.to_owned()),
            extraction_model: std::env::var("OPENAI_EXTRACTION_MODEL")
                .unwrap_or_else(|_| DEFAULT_EXTRACTION_MODEL.to_owned()),
            voice: std::env::var("CONVOY_VOICE").unwrap_or_else(|_| DEFAULT_VOICE.to_owned()),
        })
    }

    /// The base URL without its scheme or trailing slash, suitable for
    /// building `wss://` stream addresses.
    pub fn public_host(&self) -> &str {
        self.base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
    }

    /// Address the carrier should open its media WebSocket to for one call.
    pub fn stream_url(&self, call_sid: &CallSid, phone: &PhoneNumber) -> String {
        format!(
            "wss://{}/media-stream/{}/{}",
            self.public_host(),
            call_sid,
            phone
        )
    }

    /// Join a relative audio path onto the public base.
    pub fn absolute_url(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
