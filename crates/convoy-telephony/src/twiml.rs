//! Call-control markup builders.
//!
//! The shapes are small and fixed, so responses are built as literal XML.
//! Every interpolated value is either validated upstream (SIDs, phone
//! numbers) or constructed by this crate (URLs), so no escaping is done.

/// Returned when the webhook payload is missing the call SID or caller.
pub const ERROR_RESPONSE: &str = "<Response><Say>Error processing call.</Say></Response>";

/// Returned when handling blew up after the payload parsed fine.
pub const INTERNAL_ERROR_RESPONSE: &str =
    "<Response><Say>An internal error occurred.</Say></Response>";

/// Returned on the outbound-connected path when context is missing;
/// nothing useful can be said to the callee, so end the call.
pub const HANGUP_RESPONSE: &str = "<Response><Hangup/></Response>";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
const GREETING_FALLBACK_LINE: &str = "Connecting your call.";
const OUTBOUND_OPENER_LINE: &str = "Hello! This is Alex from Super Truck AI.";

/// Markup for an answered inbound call: play the cached greeting, or
/// speak the fallback line when synthesis failed, then hand the call
/// audio over to the streaming session.
pub fn greeting_and_connect(greeting_audio_url: Option<&str>, stream_url: &str) -> String {
    let opening = match greeting_audio_url {
        Some(url) => format!("<Play>{url}</Play><Pause length=\"1\"/>"),
        None => format!("<Say>{GREETING_FALLBACK_LINE}</Say>"),
    };
    format!(
        "{XML_DECLARATION}<Response>{opening}\
         <Connect><Stream url=\"{stream_url}\"/></Connect></Response>"
    )
}

/// Markup for an answered outbound call: a spoken opener, then the stream.
pub fn outgoing_connect(stream_url: &str) -> String {
    format!(
        "{XML_DECLARATION}<Response><Say>{OUTBOUND_OPENER_LINE}</Say>\
         <Connect><Stream url=\"{stream_url}\"/></Connect></Response>"
    )
}
