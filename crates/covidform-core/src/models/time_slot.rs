use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::ExamType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(default, skip_serializing)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
    /// Relative share of the daily registration limit
    pub limit_coefficient: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_types: Option<Vec<ExamType>>,
}

impl TimeSlot {
    pub fn formatted_start_time(&self) -> String {
        self.start_time.format("%H:%M").to_string()
    }

    pub fn formatted_end_time(&self) -> String {
        self.end_time.format("%H:%M").to_string()
    }
}

/// Split `daily_limit` across slots in proportion to their coefficients,
/// rounding each share to the nearest whole registration.
pub fn slot_capacities(time_slots: &[TimeSlot], daily_limit: i64) -> Vec<i64> {
    let coefficient_sum: i64 = time_slots.iter().map(|slot| slot.limit_coefficient).sum();
    if coefficient_sum == 0 {
        return vec![0; time_slots.len()];
    }

    let multiplier = daily_limit as f64 / coefficient_sum as f64;
    time_slots
        .iter()
        .map(|slot| (multiplier * slot.limit_coefficient as f64).round() as i64)
        .collect()
}

/// `HH:MM` on the wire; seconds are accepted when parsing.
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| D::Error::custom(format!("invalid time {:?}: {}", raw, e)))
    }
}
