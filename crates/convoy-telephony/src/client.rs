use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use convoy_core::collab::CarrierLine;
use convoy_core::config::Settings;
use convoy_core::errors::GatewayError;
use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;

const API_BASE: &str = "https://api.twilio.com";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the carrier account: places outbound calls and buys
/// local numbers. Call SIDs always come back from the carrier; nothing
/// here mints one.
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: PhoneNumber,
    /// Webhook the carrier fetches for markup once the callee answers.
    answer_url: String,
    api_base: String,
}

impl TwilioClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            account_sid: settings.twilio_account_sid.clone(),
            auth_token: settings.twilio_auth_token.clone(),
            from_number: settings.twilio_phone_number.clone(),
            answer_url: settings.absolute_url("/telephony/outgoing-call-handler"),
            api_base: API_BASE.to_string(),
        }
    }

    /// Point requests at a different host. Used by tests.
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn account_url(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{resource}",
            self.api_base, self.account_sid
        )
    }
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Deserialize)]
struct AvailableNumbers {
    available_phone_numbers: Vec<AvailableNumber>,
}

#[derive(Deserialize)]
struct AvailableNumber {
    phone_number: String,
}

#[derive(Deserialize)]
struct PurchasedNumber {
    phone_number: String,
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(GatewayError::from_status(status, body))
}

#[async_trait]
impl CarrierLine for TwilioClient {
    #[instrument(skip(self), fields(to = %to))]
    async fn place_call(&self, to: &PhoneNumber) -> Result<CallSid, GatewayError> {
        let resp = self
            .client
            .post(self.account_url("Calls.json"))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[
                ("To", to.as_str()),
                ("From", self.from_number.as_str()),
                ("Url", self.answer_url.as_str()),
                ("Method", "POST"),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        let resp = check_status(resp).await?;

        let created: CallResource = resp
            .json()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        info!(call_sid = %created.sid, "outbound call placed");
        Ok(CallSid::from_raw(&created.sid))
    }

    #[instrument(skip(self))]
    async fn provision_number(&self, area_code: &str) -> Result<Option<String>, GatewayError> {
        let resp = self
            .client
            .get(self.account_url("AvailablePhoneNumbers/US/Local.json"))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .query(&[("AreaCode", area_code), ("PageSize", "1")])
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        let resp = check_status(resp).await?;

        let found: AvailableNumbers = resp
            .json()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        let Some(candidate) = found.available_phone_numbers.into_iter().next() else {
            warn!(area_code, "no local numbers available");
            return Ok(None);
        };

        let resp = self
            .client
            .post(self.account_url("IncomingPhoneNumbers.json"))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("PhoneNumber", candidate.phone_number.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        let resp = check_status(resp).await?;

        let purchased: PurchasedNumber = resp
            .json()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        info!(number = %purchased.phone_number, "number provisioned");
        Ok(Some(purchased.phone_number))
    }
}
