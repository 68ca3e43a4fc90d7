//! API client for communicating with the registration backend.
//!
//! Requests are plain JSON calls against `base_url + path`. Responses are
//! buffered into an `ApiResponse` right away: the auth layer needs to peek at
//! the error body of a 401 before handing the very same response back to the
//! caller, and a streaming `reqwest::Response` can only be read once.

use std::fmt;
use std::time::Duration;

use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client, Method, StatusCode, Url,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:9292";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Error marker the backend sends with a 401 when the access token is stale
const EXPIRED_ACCESS_TOKEN: &str = "expired JWT access token";

/// Error marker the backend sends with a 401 when the refresh token is unusable
const INVALID_REFRESH_TOKEN: &str = "invalid JWT refresh token";

// ============================================================================
// Request side
// ============================================================================

/// Optional parts of a request: query parameters, JSON body, extra headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters. Keys may repeat (`with[]=a&with[]=b`).
    pub params: Vec<(String, String)>,
    pub data: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing any existing value with the same name
    /// (names compare case-insensitively).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Look up a header value by name (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// API client for the registration backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the absolute URL for a backend path such as `/auth/login`
    pub fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", joined, e)))
    }

    /// Issue a request and buffer the response.
    ///
    /// Non-2xx statuses are not errors here; only transport failures and
    /// malformed request parts are.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(path)?;

        let mut builder = self
            .client
            .request(method.clone(), url)
            .headers(Self::build_headers(&options.headers)?);

        if !options.params.is_empty() {
            builder = builder.query(&options.params);
        }

        if let Some(ref data) = options.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let response = ApiResponse::from_reqwest(response).await?;

        debug!(
            method = %method,
            path = path,
            status = response.status().as_u16(),
            "Backend request finished"
        );

        Ok(response)
    }

    fn build_headers(extra: &[(String, String)]) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        for (name, value) in extra {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ApiError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

// ============================================================================
// Response side
// ============================================================================

/// Backend error markers, parsed once from the `error` field of a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    ExpiredAccessToken,
    InvalidRefreshToken,
    Other(String),
}

impl ErrorCode {
    pub fn parse(message: &str) -> Self {
        match message {
            EXPIRED_ACCESS_TOKEN => ErrorCode::ExpiredAccessToken,
            INVALID_REFRESH_TOKEN => ErrorCode::InvalidRefreshToken,
            other => ErrorCode::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Response body as the caller sees it: JSON when the backend says so, text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(Value),
    Text(String),
}

impl ResponseData {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            ResponseData::Text(_) => None,
        }
    }

    /// Top-level field of a JSON object body
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_json().and_then(|value| value.get(name))
    }

    /// The backend's human-readable `error` message, if any
    pub fn error_message(&self) -> Option<&str> {
        self.field("error").and_then(Value::as_str)
    }

    /// The backend's machine-readable error `code`, if any
    pub fn code(&self) -> Option<&str> {
        self.field("code").and_then(Value::as_str)
    }
}

impl fmt::Display for ResponseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseData::Json(value) => write!(f, "{}", value),
            ResponseData::Text(text) => write!(f, "{}", text),
        }
    }
}

/// A fully buffered backend response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    error_code: Option<ErrorCode>,
}

impl ApiResponse {
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self::from_parts(status, headers, body.to_vec()))
    }

    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        let error_code = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error)
            .map(|message| ErrorCode::parse(&message));

        Self {
            status,
            headers,
            body,
            error_code,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::decode("Failed to parse JSON response", e, &self.text()))
    }

    /// Whether the backend labelled the body as JSON
    pub fn is_json(&self) -> bool {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
            .unwrap_or(false)
    }

    /// Body as JSON when labelled JSON and parseable, as text otherwise
    pub fn data(&self) -> ResponseData {
        if self.is_json() {
            if let Ok(value) = serde_json::from_slice(&self.body) {
                return ResponseData::Json(value);
            }
        }
        ResponseData::Text(self.text())
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.error_code.as_ref()
    }

    /// 401 carrying the expired-access-token marker
    pub fn is_expired_access_token(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
            && self.error_code == Some(ErrorCode::ExpiredAccessToken)
    }

    /// 401 carrying the invalid-refresh-token marker
    pub fn is_invalid_refresh_token(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
            && self.error_code == Some(ErrorCode::InvalidRefreshToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn test_error_code_parse() {
        assert_eq!(ErrorCode::parse("expired JWT access token"), ErrorCode::ExpiredAccessToken);
        assert_eq!(ErrorCode::parse("invalid JWT refresh token"), ErrorCode::InvalidRefreshToken);
        assert_eq!(
            ErrorCode::parse("bad credentials"),
            ErrorCode::Other("bad credentials".to_string())
        );
    }

    #[test]
    fn test_expired_access_token_requires_401() {
        let body = br#"{"error":"expired JWT access token"}"#.to_vec();

        let unauthorized = ApiResponse::from_parts(StatusCode::UNAUTHORIZED, json_headers(), body.clone());
        assert!(unauthorized.is_expired_access_token());
        assert!(!unauthorized.is_invalid_refresh_token());

        let forbidden = ApiResponse::from_parts(StatusCode::FORBIDDEN, json_headers(), body);
        assert_eq!(forbidden.error_code(), Some(&ErrorCode::ExpiredAccessToken));
        assert!(!forbidden.is_expired_access_token());
    }

    #[test]
    fn test_non_json_body_has_no_error_code() {
        let response = ApiResponse::from_parts(StatusCode::UNAUTHORIZED, HeaderMap::new(), "nope");
        assert!(response.error_code().is_none());
        assert!(!response.is_expired_access_token());
        assert_eq!(response.data(), ResponseData::Text("nope".to_string()));
    }

    #[test]
    fn test_data_parses_json_when_labelled() {
        let response = ApiResponse::from_parts(
            StatusCode::UNPROCESSABLE_ENTITY,
            json_headers(),
            br#"{"error":"limit must be positive","code":"validation_failed"}"#.to_vec(),
        );
        let data = response.data();
        assert_eq!(data.error_message(), Some("limit must be positive"));
        assert_eq!(data.code(), Some("validation_failed"));
    }

    #[test]
    fn test_data_falls_back_to_text_for_csv() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        let response = ApiResponse::from_parts(StatusCode::OK, headers, "a,b\n1,2\n");
        assert_eq!(response.data(), ResponseData::Text("a,b\n1,2\n".to_string()));
    }

    #[test]
    fn test_request_options_set_header_replaces() {
        let mut options = RequestOptions::new().header("authorization", "old");
        options.set_header("Authorization", "new");
        assert_eq!(options.headers.len(), 1);
        assert_eq!(options.header_value("AUTHORIZATION"), Some("new"));
    }

    #[test]
    fn test_url_for_joins_base_and_path() {
        let client = ApiClient::new("http://localhost:9292/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9292");
        assert_eq!(
            client.url_for("/auth/login").unwrap().as_str(),
            "http://localhost:9292/auth/login"
        );
        assert_eq!(
            client.url_for("admin/export").unwrap().as_str(),
            "http://localhost:9292/admin/export"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(ApiClient::new("not a url"), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_json_decode_error() {
        let response = ApiResponse::from_parts(StatusCode::OK, json_headers(), "not json");
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        let ok = ApiResponse::from_parts(StatusCode::OK, json_headers(), json!({"a": 1}).to_string());
        assert_eq!(ok.json::<serde_json::Value>().unwrap()["a"], 1);
    }
}
