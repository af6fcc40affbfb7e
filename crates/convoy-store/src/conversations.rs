use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use convoy_core::ids::ConversationId;
use convoy_core::phone::PhoneNumber;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: ConversationId,
    pub phone_number: PhoneNumber,
    pub transcript: String,
    pub system_instructions: Option<String>,
    pub created_at: String,
}

pub struct ConversationRepo {
    db: Database,
}

impl ConversationRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one completed call. Pure insert; rows are never updated.
    #[instrument(skip(self, transcript, system_instructions), fields(phone = %phone))]
    pub fn append(
        &self,
        phone: &PhoneNumber,
        transcript: &str,
        system_instructions: Option<&str>,
    ) -> Result<ConversationRow, StoreError> {
        let id = ConversationId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, phone_number, transcript, system_instructions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id.as_str(),
                    phone.as_str(),
                    transcript,
                    system_instructions,
                    now,
                ],
            )?;

            Ok(ConversationRow {
                id,
                phone_number: phone.clone(),
                transcript: transcript.to_owned(),
                system_instructions: system_instructions.map(str::to_owned),
                created_at: now,
            })
        })
    }

    /// Most recent conversations for a caller, newest first. Ids are
    /// time-ordered so `ORDER BY id DESC` is creation order reversed.
    #[instrument(skip(self), fields(phone = %phone, limit))]
    pub fn recent(
        &self,
        phone: &PhoneNumber,
        limit: u32,
    ) -> Result<Vec<ConversationRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, phone_number, transcript, system_instructions, created_at
                 FROM conversations WHERE phone_number = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut rows = stmt.query(rusqlite::params![phone.as_str(), limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_conversation(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<ConversationRow, StoreError> {
    let phone_raw: String = row_helpers::get(row, 1, "conversations", "phone_number")?;
    Ok(ConversationRow {
        id: ConversationId::from_raw(row_helpers::get::<String>(row, 0, "conversations", "id")?),
        phone_number: row_helpers::parse_field(&phone_raw, "conversations", "phone_number")?,
        transcript: row_helpers::get(row, 2, "conversations", "transcript")?,
        system_instructions: row_helpers::get_opt(row, 3, "conversations", "system_instructions")?,
        created_at: row_helpers::get(row, 4, "conversations", "created_at")?,
    })
}
