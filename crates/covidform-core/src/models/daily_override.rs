use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Registration limit for a single day, replacing the general daily limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyOverride {
    #[serde(default, skip_serializing)]
    pub id: Option<i64>,
    /// Serialized as `YYYY-MM-DD`
    pub date: NaiveDate,
    pub registration_limit: i64,
}

impl DailyOverride {
    pub fn new(date: NaiveDate, registration_limit: i64) -> Self {
        Self {
            id: None,
            date,
            registration_limit,
        }
    }

    pub fn display_date(&self) -> String {
        self.date.format("%-d. %-m. %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_iso_date_without_id() {
        let mut entity = DailyOverride::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 120);
        entity.id = Some(4);
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!({"date": "2021-03-01", "registration_limit": 120})
        );
    }

    #[test]
    fn test_parses_backend_record() {
        let entity: DailyOverride =
            serde_json::from_value(json!({"id": 4, "date": "2021-03-01", "registration_limit": 0}))
                .unwrap();
        assert_eq!(entity.id, Some(4));
        assert_eq!(entity.display_date(), "1. 3. 2021");
    }
}
