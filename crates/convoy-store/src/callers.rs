use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallerRow {
    pub phone_number: PhoneNumber,
    pub call_sid: Option<CallSid>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CallerRepo {
    db: Database,
}

impl CallerRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up a caller by phone number. On a hit, refresh the stored call
    /// SID when the new one differs and return the stored name. On a miss,
    /// insert a bare record and return `None`. Absence of a name is a
    /// normal result, never an error.
    #[instrument(skip(self), fields(phone = %phone, call_sid = %call_sid))]
    pub fn resolve_or_create(
        &self,
        phone: &PhoneNumber,
        call_sid: &CallSid,
    ) -> Result<Option<String>, StoreError> {
        self.db.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT call_sid, full_name FROM callers WHERE phone_number = ?1",
                    [phone.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, Option<String>>(0)?,
                            row.get::<_, Option<String>>(1)?,
                        ))
                    },
                )
                .ok();

            if let Some((stored_sid, full_name)) = existing {
                if stored_sid.as_deref() != Some(call_sid.as_str()) {
                    let now = Utc::now().to_rfc3339();
                    conn.execute(
                        "UPDATE callers SET call_sid = ?1, updated_at = ?2 WHERE phone_number = ?3",
                        rusqlite::params![call_sid.as_str(), now, phone.as_str()],
                    )?;
                }
                return Ok(full_name);
            }

            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO callers (phone_number, call_sid, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![phone.as_str(), call_sid.as_str(), now, now],
            )?;
            Ok(None)
        })
    }

    /// Get a caller record by phone number.
    #[instrument(skip(self), fields(phone = %phone))]
    pub fn get(&self, phone: &PhoneNumber) -> Result<CallerRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT phone_number, call_sid, full_name, email, created_at, updated_at
                 FROM callers WHERE phone_number = ?1",
            )?;
            let mut rows = stmt.query([phone.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_caller(row),
                None => Err(StoreError::NotFound(format!("caller {phone}"))),
            }
        })
    }

    /// Update only the supplied fields, and only when they differ from the
    /// stored values. Returns `false` when the record is missing or nothing
    /// changed.
    #[instrument(skip(self), fields(phone = %phone))]
    pub fn update_contact(
        &self,
        phone: &PhoneNumber,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT full_name, email FROM callers WHERE phone_number = ?1",
                    [phone.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, Option<String>>(0)?,
                            row.get::<_, Option<String>>(1)?,
                        ))
                    },
                )
                .ok();

            let Some((stored_name, stored_email)) = existing else {
                return Ok(false);
            };

            let name_update = full_name.filter(|n| stored_name.as_deref() != Some(*n));
            let email_update = email.filter(|e| stored_email.as_deref() != Some(*e));

            if name_update.is_none() && email_update.is_none() {
                return Ok(false);
            }

            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE callers SET
                    full_name = COALESCE(?1, full_name),
                    email = COALESCE(?2, email),
                    updated_at = ?3
                 WHERE phone_number = ?4",
                rusqlite::params![name_update, email_update, now, phone.as_str()],
            )?;
            Ok(true)
        })
    }
}

fn row_to_caller(row: &rusqlite::Row<'_>) -> Result<CallerRow, StoreError> {
    let phone_raw: String = row_helpers::get(row, 0, "callers", "phone_number")?;
    Ok(CallerRow {
        phone_number: row_helpers::parse_field(&phone_raw, "callers", "phone_number")?,
        call_sid: row_helpers::get_opt::<String>(row, 1, "callers", "call_sid")?
            .map(CallSid::from_raw),
        full_name: row_helpers::get_opt(row, 2, "callers", "full_name")?,
        email: row_helpers::get_opt(row, 3, "callers", "email")?,
        created_at: row_helpers::get(row, 4, "callers", "created_at")?,
        updated_at: row_helpers::get(row, 5, "callers", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (CallerRepo, PhoneNumber) {
        let db = Database::in_memory().unwrap();
        let phone = PhoneNumber::parse("+15551234567").unwrap();
        (CallerRepo::new(db), phone)
    }

    #[test]
    fn unseen_phone_creates_bare_record() {
        let (repo, phone) = setup();
        let name = repo
            .resolve_or_create(&phone, &CallSid::from_raw("CA1"))
            .unwrap();
        assert!(name.is_none());

        let row = repo.get(&phone).unwrap();
        assert_eq!(row.phone_number, phone);
        assert!(row.full_name.is_none());
        assert!(row.email.is_none());
        assert_eq!(row.call_sid.unwrap().as_str(), "CA1");
    }

    #[test]
    fn resolve_returns_stored_name() {
        let (repo, phone) = setup();
        repo.resolve_or_create(&phone, &CallSid::from_raw("CA1"))
            .unwrap();
        assert!(repo.update_contact(&phone, Some("Dana Reed"), None).unwrap());

        let name = repo
            .resolve_or_create(&phone, &CallSid::from_raw("CA2"))
            .unwrap();
        assert_eq!(name.as_deref(), Some("Dana Reed"));
    }

    #[test]
    fn resolve_refreshes_call_sid() {
        let (repo, phone) = setup();
        repo.resolve_or_create(&phone, &CallSid::from_raw("CA1"))
            .unwrap();
        repo.resolve_or_create(&phone, &CallSid::from_raw("CA2"))
            .unwrap();

        let row = repo.get(&phone).unwrap();
        assert_eq!(row.call_sid.unwrap().as_str(), "CA2");
    }

    #[test]
    fn get_unknown_phone_fails() {
        let (repo, _) = setup();
        let other = PhoneNumber::parse("+15550009999").unwrap();
        assert!(matches!(repo.get(&other), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn update_contact_missing_record_is_noop() {
        let (repo, phone) = setup();
        let changed = repo.update_contact(&phone, Some("Dana"), None).unwrap();
        assert!(!changed);
    }

    #[test]
    fn update_contact_same_values_is_noop() {
        let (repo, phone) = setup();
        repo.resolve_or_create(&phone, &CallSid::from_raw("CA1"))
            .unwrap();
        assert!(repo
            .update_contact(&phone, Some("Dana"), Some("dana@example.com"))
            .unwrap());
        assert!(!repo
            .update_contact(&phone, Some("Dana"), Some("dana@example.com"))
            .unwrap());
    }

    #[test]
    fn update_contact_partial_fields() {
        let (repo, phone) = setup();
        repo.resolve_or_create(&phone, &CallSid::from_raw("CA1"))
            .unwrap();
        repo.update_contact(&phone, Some("Dana"), None).unwrap();
        assert!(repo
            .update_contact(&phone, None, Some("dana@example.com"))
            .unwrap());

        let row = repo.get(&phone).unwrap();
        assert_eq!(row.full_name.as_deref(), Some("Dana"));
        assert_eq!(row.email.as_deref(), Some("dana@example.com"));
    }

    #[test]
    fn corrupt_phone_surfaces_as_corrupt_row() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO callers (phone_number, created_at, updated_at)
                 VALUES ('not-a-number', 'now', 'now')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let result = db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT phone_number, call_sid, full_name, email, created_at, updated_at
                 FROM callers",
            )?;
            let mut rows = stmt.query([])?;
            row_to_caller(rows.next()?.expect("row present"))
        });
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "callers", column: "phone_number", .. })
        ));
    }
}
