//! General settings: stored as snake_case key/value records, handed to the
//! front end as one camelCase map.

use serde_json::{Map, Value};
use tracing::debug;

use super::crud::{CrudOutcome, SettingService};
use crate::auth::{AuthError, KeyValueStorage};
use crate::models::Setting;
use crate::result::Outcome;
use crate::utils::{camel_to_snake_case, keys_to_camel_case};

/// Error code the backend uses when a record does not exist
pub const ERROR_CODE_NOT_FOUND: &str = "not_found";

/// Key of the general daily registration limit, as seen in `Settings`
const DAILY_REGISTRATION_LIMIT: &str = "dailyRegistrationLimit";

pub type Settings = Map<String, Value>;

pub fn settings_to_map(settings: &[Setting]) -> Settings {
    keys_to_camel_case(
        settings
            .iter()
            .map(|setting| (setting.key.clone(), setting.value.clone()))
            .collect(),
    )
}

/// The general daily limit, accepting both numbers and numeric strings
pub fn daily_registration_limit(settings: &Settings) -> Option<i64> {
    match settings.get(DAILY_REGISTRATION_LIMIT)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub async fn load_settings<S: KeyValueStorage>(
    service: &SettingService<'_, S>,
) -> Result<CrudOutcome<Settings>, AuthError> {
    Ok(service
        .load_all(None)
        .await?
        .transform(|settings| settings_to_map(&settings)))
}

/// Update a setting, creating it when the backend does not know the key yet.
/// `key` may be given in camelCase.
pub async fn save_setting<S: KeyValueStorage>(
    service: &SettingService<'_, S>,
    key: &str,
    value: Value,
) -> Result<CrudOutcome<Setting>, AuthError> {
    let key = camel_to_snake_case(key);
    let setting = Setting::new(key.clone(), value);

    match service.update(&key, &setting).await? {
        Outcome::Failure(failure) if failure.code() == Some(ERROR_CODE_NOT_FOUND) => {
            debug!(key = %key, "Setting missing, creating it");
            service.create(&setting).await
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_to_map_camel_cases_keys() {
        let settings = vec![
            Setting::new("daily_registration_limit", json!(250)),
            Setting::new("registration_open", json!(true)),
        ];
        let map = settings_to_map(&settings);
        assert_eq!(map.get("dailyRegistrationLimit"), Some(&json!(250)));
        assert_eq!(map.get("registrationOpen"), Some(&json!(true)));
    }

    #[test]
    fn test_daily_registration_limit() {
        let mut settings = Settings::new();
        assert_eq!(daily_registration_limit(&settings), None);

        settings.insert("dailyRegistrationLimit".into(), json!(300));
        assert_eq!(daily_registration_limit(&settings), Some(300));

        settings.insert("dailyRegistrationLimit".into(), json!(" 120 "));
        assert_eq!(daily_registration_limit(&settings), Some(120));
    }
}
