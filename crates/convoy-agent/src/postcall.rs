use convoy_core::collab::ContactExtractor;
use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;
use convoy_store::callers::CallerRepo;
use convoy_store::conversations::ConversationRepo;
use tracing::{debug, info, warn};

use crate::notify;

/// Post-call pipeline: persist the transcript, backfill name/email from
/// it, and fire the demo-notification hook. Everything here is
/// best-effort; a failure in one step is logged and the rest still runs.
pub async fn finish_call(
    callers: &CallerRepo,
    conversations: &ConversationRepo,
    extractor: &dyn ContactExtractor,
    phone: &PhoneNumber,
    call_sid: &CallSid,
    transcript: &str,
    instructions: &str,
) {
    if transcript.trim().is_empty() {
        debug!(call_sid = %call_sid, "empty transcript, nothing to persist");
        return;
    }

    if let Err(e) = conversations.append(phone, transcript, Some(instructions)) {
        warn!(call_sid = %call_sid, error = %e, "failed to persist conversation");
    }

    let (name, email) = extractor.extract(transcript).await;
    if name.is_some() || email.is_some() {
        match callers.update_contact(phone, name.as_deref(), email.as_deref()) {
            Ok(true) => {
                info!(call_sid = %call_sid, "caller contact details updated from transcript")
            }
            Ok(false) => {}
            Err(e) => warn!(call_sid = %call_sid, error = %e, "contact backfill failed"),
        }
    }

    notify::schedule_demo(transcript, call_sid, phone, name.as_deref(), email.as_deref()).await;
}
