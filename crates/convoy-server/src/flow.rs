//! Webhook call flow: every inbound ring becomes a complete TwiML reply.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use convoy_core::errors::GatewayError;
use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;
use convoy_store::assistants::AssistantRepo;
use convoy_store::callers::CallerRepo;
use convoy_store::carriers::CarrierRepo;
use convoy_telephony::twiml;
use convoy_telephony::webhook::CallPayload;

use crate::server::AppState;

/// Ceiling on greeting synthesis. The carrier abandons webhooks that take
/// too long, so a slow synthesizer degrades to the spoken fallback line
/// instead of stalling the whole reply.
pub const GREETING_TIMEOUT: Duration = Duration::from_secs(10);

/// Which inbound number family a webhook arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundLine {
    /// The main line. Any caller, no extra context required.
    General,
    /// A per-carrier provisioned number. Requires the dialed number so the
    /// owning assistant can be identified.
    Agent,
}

/// Drive one inbound webhook to its markup. Never fails outward: anything
/// that goes wrong past payload validation collapses to the fixed
/// internal-error response, so the caller hears a message instead of
/// carrier dead air.
pub async fn handle_inbound(state: &AppState, line: InboundLine, payload: &CallPayload) -> String {
    match inbound_twiml(state, line, payload).await {
        Ok(markup) => markup,
        Err(e) => {
            error!(error = %e, "inbound call handling failed");
            twiml::INTERNAL_ERROR_RESPONSE.to_owned()
        }
    }
}

async fn inbound_twiml(
    state: &AppState,
    line: InboundLine,
    payload: &CallPayload,
) -> Result<String, GatewayError> {
    let (Some(call_sid), Some(caller)) = (payload.call_sid.as_deref(), payload.from_number())
    else {
        warn!(
            has_call_sid = payload.call_sid.is_some(),
            has_from = payload.from.is_some(),
            "webhook missing call sid or caller number"
        );
        return Ok(twiml::ERROR_RESPONSE.to_owned());
    };
    let call_sid = CallSid::from_raw(call_sid);
    info!(call_sid = %call_sid, phone = %caller, "inbound call received");

    if line == InboundLine::Agent {
        let Some(dialed) = payload.to_number() else {
            warn!(call_sid = %call_sid, "agent-line webhook missing dialed number");
            return Ok(twiml::ERROR_RESPONSE.to_owned());
        };
        log_agent_context(state, &caller, &dialed);
    }

    let known_name = CallerRepo::new(state.db.clone())
        .resolve_or_create(&caller, &call_sid)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    info!(
        call_sid = %call_sid,
        known = known_name.is_some(),
        "caller identity resolved"
    );

    let audio_url = greet(state, known_name.as_deref(), &caller).await;
    let stream_url = state.settings.stream_url(&call_sid, &caller);
    info!(call_sid = %call_sid, stream_url, "connecting call to media stream");
    Ok(twiml::greeting_and_connect(audio_url.as_deref(), &stream_url))
}

/// Best-effort enrichment for agent-line calls: log who owns the dialed
/// number and whether the caller is a registered carrier. A failed lookup
/// only costs the log line.
fn log_agent_context(state: &AppState, caller: &PhoneNumber, dialed: &PhoneNumber) {
    match AssistantRepo::new(state.db.clone()).find_by_number(dialed) {
        Ok(Some(assistant)) => info!(
            assistant_id = %assistant.id,
            carrier_id = %assistant.carrier_id,
            "call answered on provisioned assistant number"
        ),
        Ok(None) => debug!(dialed = %dialed, "no assistant assigned to dialed number"),
        Err(e) => warn!(error = %e, "assistant lookup failed"),
    }
    match CarrierRepo::new(state.db.clone()).find_by_phone(caller) {
        Ok(Some(carrier)) => info!(
            carrier_id = %carrier.id,
            mc_number = %carrier.mc_number,
            "caller matches a registered carrier"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "carrier lookup failed"),
    }
}

/// Synthesize the personalized greeting under a hard deadline. Failure or
/// timeout yields `None`, which the markup layer renders as the spoken
/// fallback line.
async fn greet(state: &AppState, name: Option<&str>, phone: &PhoneNumber) -> Option<String> {
    let synthesis = state.greeting.synthesize(name, phone.digits());
    match tokio::time::timeout(GREETING_TIMEOUT, synthesis).await {
        Ok(Ok(relative)) => {
            let url = state.settings.absolute_url(&relative);
            info!(phone = %phone, url, "greeting audio ready");
            Some(url)
        }
        Ok(Err(e)) => {
            warn!(phone = %phone, error = %e, "greeting synthesis failed, using spoken fallback");
            None
        }
        Err(_) => {
            warn!(phone = %phone, "greeting synthesis timed out, using spoken fallback");
            None
        }
    }
}

/// The outbound leg was answered. With both identifiers present the callee
/// gets connected to the stream; otherwise hang up, there is nothing to
/// connect.
pub fn handle_outgoing_connected(state: &AppState, payload: &CallPayload) -> String {
    let (Some(call_sid), Some(callee)) = (payload.call_sid.as_deref(), payload.to_number()) else {
        warn!(
            has_call_sid = payload.call_sid.is_some(),
            has_to = payload.to.is_some(),
            "outgoing-connected webhook missing call sid or callee number"
        );
        return twiml::HANGUP_RESPONSE.to_owned();
    };
    let call_sid = CallSid::from_raw(call_sid);
    let stream_url = state.settings.stream_url(&call_sid, &callee);
    info!(call_sid = %call_sid, phone = %callee, "outbound call answered, connecting stream");
    twiml::outgoing_connect(&stream_url)
}

/// Place an outbound call. The destination must already be in canonical
/// `+` form; shorthand is rejected before the carrier is involved.
pub async fn initiate_call(state: &AppState, to_number: &str) -> Result<CallSid, GatewayError> {
    let to =
        PhoneNumber::parse(to_number).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    let call_sid = state.line.place_call(&to).await?;
    info!(call_sid = %call_sid, phone = %to, "outbound call initiated");
    Ok(call_sid)
}
