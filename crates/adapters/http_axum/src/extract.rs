//! Request extractors shared by the API handlers.

use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use funnelhub_domain::error::ValidationError;
use funnelhub_domain::id::OwnerId;

use crate::error::ApiError;

/// Header carrying the tenant id.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The tenant a request acts for, read from the `X-Owner-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::BadRequest("missing X-Owner-Id header".to_string()))?;
        let value = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("invalid X-Owner-Id header".to_string()))?;
        OwnerId::from_str(value.trim())
            .map(Self)
            .map_err(|_| ApiError::BadRequest(format!("invalid X-Owner-Id header '{value}'")))
    }
}

/// Parse a path segment into a typed id.
pub(crate) fn parse_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    T::from_str(raw).map_err(|_| ValidationError::InvalidId(raw.to_string()).into())
}
