//! Generic CRUD service over the `/admin/crud/*` endpoints.
//!
//! Every call goes through
//! `Auth::authenticated_request_with_logout_when_session_expired`, so an
//! expired session shows up as `RequestFailure::SessionExpired` instead of
//! an error, and the user has already been sent to the login screen.

use std::fmt;
use std::marker::PhantomData;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::{ApiError, RequestOptions, ResponseData};
use crate::auth::{Auth, AuthError, KeyValueStorage, Navigator};
use crate::models::{DailyOverride, ExamType, Setting, TimeSlot};
use crate::result::Outcome;

/// A record type the backend exposes through the generic CRUD endpoints.
pub trait Resource: Serialize + DeserializeOwned {
    /// Key holding the record list in a `GET` response
    const DATA_KEY: &'static str;
    const BASE_PATH: &'static str;
    /// Fields holding associated records, sent to the backend as id lists
    const ASSOC_FIELDS: &'static [&'static str] = &[];
}

impl Resource for ExamType {
    const DATA_KEY: &'static str = "exam_types";
    const BASE_PATH: &'static str = "/admin/crud/exam_types";
    const ASSOC_FIELDS: &'static [&'static str] = &["time_slots"];
}

impl Resource for TimeSlot {
    const DATA_KEY: &'static str = "time_slots";
    const BASE_PATH: &'static str = "/admin/crud/time_slots";
    const ASSOC_FIELDS: &'static [&'static str] = &["exam_types"];
}

impl Resource for Setting {
    const DATA_KEY: &'static str = "settings";
    const BASE_PATH: &'static str = "/admin/crud/settings";
}

impl Resource for DailyOverride {
    const DATA_KEY: &'static str = "daily_overrides";
    const BASE_PATH: &'static str = "/admin/crud/daily_overrides";
}

/// Why a CRUD call did not produce a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestFailure {
    /// The session could not be refreshed; the user has been logged out
    SessionExpired,
    /// The backend answered with a non-2xx status
    Rejected { status: StatusCode, data: ResponseData },
    /// The backend answered 2xx with a body we could not read
    Malformed(String),
}

impl RequestFailure {
    /// Machine-readable error code from a rejection body
    pub fn code(&self) -> Option<&str> {
        match self {
            RequestFailure::Rejected { data, .. } => data.code(),
            _ => None,
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFailure::SessionExpired => write!(f, "session expired"),
            RequestFailure::Rejected { status, data } => match data.error_message() {
                Some(message) => write!(f, "{} ({})", message, status),
                None => write!(f, "request rejected with {}: {}", status, data),
            },
            RequestFailure::Malformed(reason) => write!(f, "unexpected response: {}", reason),
        }
    }
}

pub type CrudOutcome<T> = Outcome<T, RequestFailure>;

pub struct CrudService<'a, R, S> {
    auth: &'a Auth<S>,
    navigator: &'a dyn Navigator,
    _resource: PhantomData<fn() -> R>,
}

pub type ExamTypeService<'a, S> = CrudService<'a, ExamType, S>;
pub type TimeSlotService<'a, S> = CrudService<'a, TimeSlot, S>;
pub type SettingService<'a, S> = CrudService<'a, Setting, S>;
pub type DailyOverrideService<'a, S> = CrudService<'a, DailyOverride, S>;

impl<'a, R: Resource, S: KeyValueStorage> CrudService<'a, R, S> {
    pub fn new(auth: &'a Auth<S>, navigator: &'a dyn Navigator) -> Self {
        Self {
            auth,
            navigator,
            _resource: PhantomData,
        }
    }

    /// Fetch every record, optionally embedding an association
    /// (`?with[]=exam_types`).
    pub async fn load_all(&self, with_assocs: Option<&str>) -> Result<CrudOutcome<Vec<R>>, AuthError> {
        let mut options = RequestOptions::new();
        if let Some(assoc) = with_assocs {
            options = options.param("with[]", assoc);
        }

        let outcome = self.request(Method::GET, R::BASE_PATH, options).await?;
        Ok(outcome.chain(|data| {
            let list = data.field(R::DATA_KEY).cloned().unwrap_or(Value::Null);
            decode::<Vec<R>>(list)
        }))
    }

    pub async fn create(&self, entity: &R) -> Result<CrudOutcome<R>, AuthError> {
        let options = RequestOptions::new().json(Self::serialize_entity(entity)?);
        let outcome = self.request(Method::POST, R::BASE_PATH, options).await?;
        Ok(outcome.chain(decode_data::<R>))
    }

    pub async fn update(&self, id: impl fmt::Display, entity: &R) -> Result<CrudOutcome<R>, AuthError> {
        let options = RequestOptions::new().json(Self::serialize_entity(entity)?);
        let outcome = self.request(Method::PUT, &Self::record_path(id), options).await?;
        Ok(outcome.chain(decode_data::<R>))
    }

    pub async fn delete(&self, id: impl fmt::Display) -> Result<CrudOutcome<()>, AuthError> {
        let outcome = self
            .request(Method::DELETE, &Self::record_path(id), RequestOptions::new())
            .await?;
        Ok(outcome.transform(|_| ()))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<CrudOutcome<ResponseData>, AuthError> {
        debug!(method = %method, path = path, "CRUD request");

        let outcome = self
            .auth
            .authenticated_request_with_logout_when_session_expired(self.navigator, method, path, options)
            .await?;

        Ok(outcome
            .transform_failure(|_| RequestFailure::SessionExpired)
            .chain(|response| {
                let status = response.status();
                Outcome::from_response(&response)
                    .transform_failure(|data| RequestFailure::Rejected { status, data })
            }))
    }

    fn record_path(id: impl fmt::Display) -> String {
        format!("{}/{}", R::BASE_PATH, id)
    }

    /// Serialize for the backend, replacing embedded associations with
    /// their ids.
    pub fn serialize_entity(entity: &R) -> Result<Value, ApiError> {
        let mut data = serde_json::to_value(entity).map_err(ApiError::Encode)?;

        if let Value::Object(ref mut fields) = data {
            for field in R::ASSOC_FIELDS {
                if let Some(Value::Array(items)) = fields.get_mut(*field) {
                    for item in items.iter_mut() {
                        if let Some(id) = item.get("id").cloned() {
                            *item = id;
                        }
                    }
                }
            }
        }

        Ok(data)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> CrudOutcome<T> {
    serde_json::from_value(value)
        .map_err(|e| RequestFailure::Malformed(e.to_string()))
        .into()
}

fn decode_data<T: DeserializeOwned>(data: ResponseData) -> CrudOutcome<T> {
    match data {
        ResponseData::Json(value) => decode(value),
        ResponseData::Text(text) => Outcome::Failure(RequestFailure::Malformed(format!(
            "expected JSON, got {:?}",
            crate::utils::truncate_string(&text, 80)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;
    use chrono::NaiveTime;
    use serde_json::json;

    #[test]
    fn test_serialize_time_slot_maps_exam_types_to_ids() {
        let slot = TimeSlot {
            id: Some(1),
            name: "Ráno".to_string(),
            start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            limit_coefficient: 2,
            exam_types: Some(vec![
                ExamType { id: Some(3), description: "PCR".to_string() },
                ExamType { id: Some(5), description: "Antigen".to_string() },
            ]),
        };

        let data = TimeSlotService::<MemoryStorage>::serialize_entity(&slot).unwrap();
        assert_eq!(data["exam_types"], json!([3, 5]));
        assert!(data.get("id").is_none());
    }

    #[test]
    fn test_serialize_exam_type_keeps_fields() {
        let exam_type = ExamType { id: Some(3), description: "PCR".to_string() };
        let data = ExamTypeService::<MemoryStorage>::serialize_entity(&exam_type).unwrap();
        assert_eq!(data, json!({"id": 3, "description": "PCR"}));
    }

    #[test]
    fn test_request_failure_code_and_display() {
        let failure = RequestFailure::Rejected {
            status: StatusCode::NOT_FOUND,
            data: ResponseData::Json(json!({"error": "record not found", "code": "not_found"})),
        };
        assert_eq!(failure.code(), Some("not_found"));
        assert_eq!(failure.to_string(), "record not found (404 Not Found)");
        assert_eq!(RequestFailure::SessionExpired.code(), None);
    }

    #[test]
    fn test_decode_data_rejects_text() {
        let outcome: CrudOutcome<ExamType> = decode_data(ResponseData::Text("<html>".into()));
        assert!(matches!(outcome, Outcome::Failure(RequestFailure::Malformed(_))));
    }
}
