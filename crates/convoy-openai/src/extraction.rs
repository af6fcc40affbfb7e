use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use convoy_core::collab::ContactExtractor;
use convoy_core::config::Settings;
use convoy_core::errors::GatewayError;

const API_BASE: &str = "https://api.openai.com";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are an expert text analysis assistant. \
    Extract names and emails precisely. \
    Output only in the format 'Name: [name/None] | Email: [email/None]'.";

/// Pulls a caller's name and email out of a finished transcript with a
/// low-temperature completion. Every failure mode collapses to
/// `(None, None)`; this runs after the call and must never bubble up.
pub struct OpenAiContactExtractor {
    client: Client,
    api_key: SecretString,
    model: String,
    api_base: String,
}

impl OpenAiContactExtractor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_key: settings.openai_api_key.clone(),
            model: settings.extraction_model.clone(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Point requests at a different host. Used by tests.
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    async fn request_extraction(&self, text: &str) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": extraction_prompt(text)},
            ],
            "temperature": 0.1,
            "max_tokens": 50,
        });

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.api_base))
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

        let completion: ChatCompletion = resp
            .json()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| GatewayError::InvalidRequest("completion reply had no content".into()))
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn extraction_prompt(text: &str) -> String {
    format!(
        "Analyze the following text and extract the person's full name and email address if present.\n\
         If a name is mentioned, provide the full name.\n\
         If an email address is mentioned, provide the email address.\n\
         If either is not found, output 'None' for that field.\n\
         Format the output *exactly* as: Name: [extracted name or None] | Email: [extracted email or None]\n\
         \n\
         Text: \"{text}\""
    )
}

/// Parse the `Name: ... | Email: ...` reply shape. A reply that does not
/// have exactly one separator yields nothing, and each side yields `None`
/// when its label is missing, its value is the literal "None", or (for
/// email) the value does not look like an address.
fn parse_extraction_reply(reply: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = reply.split('|').collect();
    if parts.len() != 2 {
        return (None, None);
    }

    let name = parts[0].split_once("Name:").and_then(|(_, v)| {
        let v = v.trim();
        if v.is_empty() || v.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(v.to_string())
        }
    });

    let email = parts[1].split_once("Email:").and_then(|(_, v)| {
        let v = v.trim();
        if v.eq_ignore_ascii_case("none") || !v.contains('@') || !v.contains('.') {
            None
        } else {
            Some(v.to_string())
        }
    });

    (name, email)
}

#[async_trait]
impl ContactExtractor for OpenAiContactExtractor {
    async fn extract(&self, text: &str) -> (Option<String>, Option<String>) {
        if text.trim().is_empty() {
            debug!("extraction input empty, skipping");
            return (None, None);
        }

        match self.request_extraction(text).await {
            Ok(reply) => {
                debug!(reply = %reply, "extraction raw reply");
                parse_extraction_reply(&reply)
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "contact extraction failed");
                (None, None)
            }
        }
    }
}
