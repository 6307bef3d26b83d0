//! HTTP handlers, one module per resource.
//!
//! Each handler resolves the route-bound record, runs the policy gate, builds the DTO,
//! calls the service and wraps the result in the response envelope.

pub mod auth;
pub mod authors;
pub mod books;
pub mod comments;
pub mod genres;
pub mod posts;
pub mod reviews;
pub mod tags;
pub mod trash;
pub mod users;

use crate::errors::{AppError, AppResult};

/// Health check endpoint.
#[must_use]
#[allow(clippy::unused_async)]
pub async fn health_check() -> &'static str {
    "OK"
}

/// Numeric route key. Anything else cannot name a record.
pub(crate) fn parse_id(key: &str) -> AppResult<i64> {
    key.parse().map_err(|_| AppError::NotFound)
}
