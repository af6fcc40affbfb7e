use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use convoy_core::ids::{AssistantId, CarrierId};
use convoy_core::phone::PhoneNumber;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantRow {
    pub id: AssistantId,
    pub twilio_number: PhoneNumber,
    pub region: Option<String>,
    pub carrier_id: CarrierId,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AssistantRepo {
    db: Database,
}

impl AssistantRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Assign a provisioned number to a carrier. One assistant per carrier;
    /// a second create for the same carrier conflicts.
    #[instrument(skip(self), fields(twilio_number = %twilio_number, carrier_id = %carrier_id))]
    pub fn create(
        &self,
        twilio_number: &PhoneNumber,
        region: Option<&str>,
        carrier_id: &CarrierId,
    ) -> Result<AssistantRow, StoreError> {
        let id = AssistantId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO assistants (id, twilio_number, region, carrier_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    twilio_number.as_str(),
                    region,
                    carrier_id.as_str(),
                    now,
                    now,
                ],
            )?;

            Ok(AssistantRow {
                id,
                twilio_number: twilio_number.clone(),
                region: region.map(str::to_owned),
                carrier_id: carrier_id.clone(),
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(carrier_id = %carrier_id))]
    pub fn find_by_carrier(
        &self,
        carrier_id: &CarrierId,
    ) -> Result<Option<AssistantRow>, StoreError> {
        self.find_where("carrier_id = ?1", carrier_id.as_str())
    }

    /// Reverse lookup: which assistant answers on this number.
    #[instrument(skip(self), fields(number = %number))]
    pub fn find_by_number(
        &self,
        number: &PhoneNumber,
    ) -> Result<Option<AssistantRow>, StoreError> {
        self.find_where("twilio_number = ?1", number.as_str())
    }

    fn find_where(&self, clause: &str, value: &str) -> Result<Option<AssistantRow>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT id, twilio_number, region, carrier_id, created_at, updated_at
                 FROM assistants WHERE {clause}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([value])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_assistant(row)?)),
                None => Ok(None),
            }
        })
    }
}

fn row_to_assistant(row: &rusqlite::Row<'_>) -> Result<AssistantRow, StoreError> {
    let number_raw: String = row_helpers::get(row, 1, "assistants", "twilio_number")?;
    Ok(AssistantRow {
        id: AssistantId::from_raw(row_helpers::get::<String>(row, 0, "assistants", "id")?),
        twilio_number: row_helpers::parse_field(&number_raw, "assistants", "twilio_number")?,
        region: row_helpers::get_opt(row, 2, "assistants", "region")?,
        carrier_id: CarrierId::from_raw(row_helpers::get::<String>(row, 3, "assistants", "carrier_id")?),
        created_at: row_helpers::get(row, 4, "assistants", "created_at")?,
        updated_at: row_helpers::get(row, 5, "assistants", "updated_at")?,
    })
}
