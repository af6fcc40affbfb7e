use serde::Deserialize;
use tracing::warn;

use convoy_core::phone::PhoneNumber;

/// Form payload the carrier posts to webhook endpoints. Field names are
/// the carrier's own casing; everything is optional because the carrier
/// sends different subsets per event.
#[derive(Debug, Default, Deserialize)]
pub struct CallPayload {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
}

impl CallPayload {
    /// Caller number in canonical form. Unparsable input is logged and
    /// dropped, which downstream treats the same as absent.
    pub fn from_number(&self) -> Option<PhoneNumber> {
        normalize(self.from.as_deref(), "From")
    }

    /// Dialed number in canonical form.
    pub fn to_number(&self) -> Option<PhoneNumber> {
        normalize(self.to.as_deref(), "To")
    }
}

fn normalize(raw: Option<&str>, field: &'static str) -> Option<PhoneNumber> {
    let raw = raw?;
    match PhoneNumber::parse(raw) {
        Ok(number) => Some(number),
        Err(e) => {
            warn!(field, raw, error = %e, "dropping unparsable phone number");
            None
        }
    }
}
