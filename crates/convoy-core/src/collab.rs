use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::ids::CallSid;
use crate::phone::PhoneNumber;

/// Produces a playable greeting audio URL (relative to the public base)
/// for a caller. Failure here never fails the call: the flow degrades to
/// a spoken fallback line.
#[async_trait]
pub trait GreetingSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        name: Option<&str>,
        phone_digits: &str,
    ) -> Result<String, GatewayError>;
}

/// Best-effort name/email extraction from a call transcript. Runs only
/// after a call ends; any failure collapses to `(None, None)`.
#[async_trait]
pub trait ContactExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> (Option<String>, Option<String>);
}

/// Outbound operations against the telephony carrier's REST API.
#[async_trait]
pub trait CarrierLine: Send + Sync {
    /// Place a call to `to`; the carrier returns the call SID synchronously.
    async fn place_call(&self, to: &PhoneNumber) -> Result<CallSid, GatewayError>;

    /// Buy a local number in the given area code. `Ok(None)` means the
    /// search returned nothing, which is not an error.
    async fn provision_number(&self, area_code: &str) -> Result<Option<String>, GatewayError>;
}

/// One active realtime audio session. The session layer treats this as
/// opaque: it only ever calls `start` once and `stop` any number of times.
#[async_trait]
pub trait MediaBridge: Send + Sync {
    /// Drive the audio relay; returns when the carrier transport closes
    /// or the upstream connection fails.
    async fn start(&self) -> Result<(), GatewayError>;

    /// Idempotent teardown. The first effective call yields the transcript
    /// collected so far; later calls return `None`.
    async fn stop(&self) -> Option<String>;
}
