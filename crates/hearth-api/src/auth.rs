//! Caller identity from the fronting authentication proxy.
//!
//! The proxy verifies credentials and forwards the identity as
//! `x-hearth-user` / `x-hearth-role`. Requests without a usable identity
//! never reach a handler.

use axum::http::request::Parts;
use axum::extract::FromRequestParts;
use hearth_core::{Caller, Role};

use crate::handlers::ApiError;

pub const USER_HEADER: &str = "x-hearth-user";
pub const ROLE_HEADER: &str = "x-hearth-role";

/// Extractor for the authenticated caller.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let username = header(USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_HEADER}")))?;
        let role: Role = header(ROLE_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {ROLE_HEADER}")))?
            .parse()
            .map_err(|e| ApiError::Unauthorized(format!("{e}")))?;

        Ok(Authenticated(Caller::new(username, role)))
    }
}
