use convoy_core::phone::PhoneNumber;
use convoy_store::conversations::ConversationRepo;
use convoy_store::StoreError;

/// Core persona for the voice agent. Always the first bytes of every
/// instruction set; history only ever appends after it.
pub const PERSONA: &str = "\
You are Alex, a friendly and professional sales agent for Super Truck AI,
a logistics software designed to help trucking carriers optimize their operations.
Your goal is to assist callers by understanding their needs, explaining how Super Truck AI
can benefit their business (load dispatching, invoicing, accounting, IFTA filing, carrier optimization),
and guiding them toward solutions, never pushing sales aggressively. Help carriers increase profits
and reduce costs by streamlining operations. Be concise and clear.
";

/// Added when the caller has at least one stored conversation.
pub const RETURNING_NOTICE: &str = "\
Remember you have spoken to this caller before. Refer to the previous conversation context below.
Continue the conversation naturally, acknowledging past discussions if relevant.
";

pub const DIGEST_HEADER: &str = "\n--- Previous Conversation Summary ---\n";
pub const DIGEST_FOOTER: &str = "--- End of Summary ---\n";

/// How many prior conversations feed the digest.
pub const HISTORY_LIMIT: u32 = 3;
/// Per-entry transcript cap, in characters.
pub const DIGEST_CHAR_BOUND: usize = 500;

#[derive(Clone, Debug)]
pub struct AssembledInstructions {
    pub text: String,
    pub is_returning: bool,
}

/// Build the system instructions for one session. Reads at most
/// `HISTORY_LIMIT` prior conversations (newest first from storage) and
/// renders them oldest first, numbered from 1, each entry capped at
/// `DIGEST_CHAR_BOUND` characters.
pub fn build_instructions(
    conversations: &ConversationRepo,
    phone: Option<&PhoneNumber>,
) -> Result<AssembledInstructions, StoreError> {
    let mut text = PERSONA.to_owned();

    let Some(phone) = phone else {
        return Ok(AssembledInstructions { text, is_returning: false });
    };

    let past = conversations.recent(phone, HISTORY_LIMIT)?;
    if past.is_empty() {
        return Ok(AssembledInstructions { text, is_returning: false });
    }

    text.push('\n');
    text.push_str(RETURNING_NOTICE);
    text.push_str(DIGEST_HEADER);
    for (i, row) in past.iter().rev().enumerate() {
        text.push_str(&digest_entry(i + 1, &row.transcript));
    }
    text.push_str(DIGEST_FOOTER);

    Ok(AssembledInstructions { text, is_returning: true })
}

fn digest_entry(n: usize, transcript: &str) -> String {
    let summary = if transcript.chars().count() > DIGEST_CHAR_BOUND {
        let cut: String = transcript.chars().take(DIGEST_CHAR_BOUND).collect();
        format!("{cut}...")
    } else {
        transcript.to_owned()
    };
    format!("Call {n}:\n{summary}\n\n")
}
