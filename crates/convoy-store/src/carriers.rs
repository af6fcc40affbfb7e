use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use convoy_core::ids::CarrierId;
use convoy_core::phone::PhoneNumber;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const DEFAULT_COUNTRY: &str = "USA";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CarrierRow {
    pub id: CarrierId,
    pub mc_number: String,
    pub name: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub region: Option<String>,
    pub phone: PhoneNumber,
    pub agent_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CarrierRepo {
    db: Database,
}

impl CarrierRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a carrier record. Country always gets the fixed default.
    #[instrument(skip(self), fields(mc_number, phone = %phone))]
    pub fn create(
        &self,
        mc_number: &str,
        city: &str,
        state: &str,
        phone: &PhoneNumber,
        agent_name: Option<&str>,
    ) -> Result<CarrierRow, StoreError> {
        let id = CarrierId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO carriers (id, mc_number, city, state, country, phone, agent_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id.as_str(),
                    mc_number,
                    city,
                    state,
                    DEFAULT_COUNTRY,
                    phone.as_str(),
                    agent_name,
                    now,
                    now,
                ],
            )?;

            Ok(CarrierRow {
                id,
                mc_number: mc_number.to_owned(),
                name: None,
                city: city.to_owned(),
                state: state.to_owned(),
                country: DEFAULT_COUNTRY.to_owned(),
                region: None,
                phone: phone.clone(),
                agent_name: agent_name.map(str::to_owned),
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(phone = %phone))]
    pub fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<CarrierRow>, StoreError> {
        self.find_where("phone = ?1", phone.as_str())
    }

    #[instrument(skip(self), fields(mc_number))]
    pub fn find_by_mc_number(&self, mc_number: &str) -> Result<Option<CarrierRow>, StoreError> {
        self.find_where("mc_number = ?1", mc_number)
    }

    fn find_where(&self, clause: &str, value: &str) -> Result<Option<CarrierRow>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT id, mc_number, name, city, state, country, region, phone, agent_name, created_at, updated_at
                 FROM carriers WHERE {clause}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([value])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_carrier(row)?)),
                None => Ok(None),
            }
        })
    }
}

fn row_to_carrier(row: &rusqlite::Row<'_>) -> Result<CarrierRow, StoreError> {
    let phone_raw: String = row_helpers::get(row, 7, "carriers", "phone")?;
    Ok(CarrierRow {
        id: CarrierId::from_raw(row_helpers::get::<String>(row, 0, "carriers", "id")?),
        mc_number: row_helpers::get(row, 1, "carriers", "mc_number")?,
        name: row_helpers::get_opt(row, 2, "carriers", "name")?,
        city: row_helpers::get(row, 3, "carriers", "city")?,
        state: row_helpers::get(row, 4, "carriers", "state")?,
        country: row_helpers::get(row, 5, "carriers", "country")?,
        region: row_helpers::get_opt(row, 6, "carriers", "region")?,
        phone: row_helpers::parse_field(&phone_raw, "carriers", "phone")?,
        agent_name: row_helpers::get_opt(row, 8, "carriers", "agent_name")?,
        created_at: row_helpers::get(row, 9, "carriers", "created_at")?,
        updated_at: row_helpers::get(row, 10, "carriers", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (CarrierRepo, PhoneNumber) {
        let db = Database::in_memory().unwrap();
        let phone = PhoneNumber::parse("+15552223333").unwrap();
        (CarrierRepo::new(db), phone)
    }

    #[test]
    fn create_applies_country_default() {
        let (repo, phone) = setup();
        let carrier = repo
            .create("MC123456", "Dallas", "TX", &phone, Some("Alex"))
            .unwrap();
        assert!(carrier.id.as_str().starts_with("car_"));
        assert_eq!(carrier.country, "USA");
        assert_eq!(carrier.agent_name.as_deref(), Some("Alex"));
    }

    #[test]
    fn find_by_phone_and_mc_number() {
        let (repo, phone) = setup();
        let created = repo.create("MC123456", "Dallas", "TX", &phone, None).unwrap();

        let by_phone = repo.find_by_phone(&phone).unwrap().unwrap();
        assert_eq!(by_phone.id, created.id);

        let by_mc = repo.find_by_mc_number("MC123456").unwrap().unwrap();
        assert_eq!(by_mc.id, created.id);
    }

    #[test]
    fn find_missing_returns_none() {
        let (repo, phone) = setup();
        assert!(repo.find_by_phone(&phone).unwrap().is_none());
        assert!(repo.find_by_mc_number("MC999999").unwrap().is_none());
    }

    #[test]
    fn duplicate_mc_number_conflicts() {
        let (repo, phone) = setup();
        repo.create("MC123456", "Dallas", "TX", &phone, None).unwrap();
        let other = PhoneNumber::parse("+15554445555").unwrap();
        let result = repo.create("MC123456", "Austin", "TX", &other, None);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }
}
