//! REST API client module for the registration backend.
//!
//! This module provides the `ApiClient` for issuing JSON requests against
//! the backend and the buffered `ApiResponse` type that lets callers inspect
//! a response body more than once.
//!
//! Error bodies of the shape `{"error": "..."}` are parsed into an
//! `ErrorCode` when the response is received, so the auth layer never has
//! to look for magic strings itself.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiResponse, ErrorCode, RequestOptions, ResponseData};
pub use error::ApiError;
