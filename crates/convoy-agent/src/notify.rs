use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;
use tracing::info;

/// Hook invoked when a finished call should turn into a demo follow-up.
/// Currently logs the request; a calendar/CRM integration would hang off
/// this point.
pub async fn schedule_demo(
    transcript: &str,
    call_sid: &CallSid,
    phone: &PhoneNumber,
    name: Option<&str>,
    email: Option<&str>,
) {
    let chars = transcript.chars().count();
    let snippet: String = transcript
        .chars()
        .skip(chars.saturating_sub(200))
        .collect();

    info!(
        call_sid = %call_sid,
        phone = %phone,
        name = name.unwrap_or("unknown"),
        email = email.unwrap_or("unknown"),
        snippet = %snippet,
        "demo scheduling requested"
    );
}
