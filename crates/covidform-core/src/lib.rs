//! Client library for the COVID-19 registration backend's admin area.
//!
//! The heart of the crate is [`auth::Auth`], which keeps the access/refresh
//! token pair, persists it through a [`auth::KeyValueStorage`] backend and
//! wraps authenticated requests with a single refresh-and-retry when the
//! access token has expired. The [`services`] module builds the admin CRUD
//! operations on top of it, reporting expected failures through
//! [`result::Outcome`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod result;
pub mod services;
pub mod utils;

pub use api::{ApiClient, ApiError, ApiResponse, RequestOptions, ResponseData};
pub use auth::{Auth, AuthError, CredentialPair};
pub use config::Config;
pub use result::Outcome;

/// HTTP method type used throughout the API
pub use reqwest::Method;
