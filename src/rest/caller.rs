//! Caller identity from headers set by the fronting auth proxy.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::rest::error::ApiError;
use crate::services::{Principal, RequestContext};

pub const PRINCIPAL_UID_HEADER: &str = "x-principal-uid";
pub const PRINCIPAL_NAME_HEADER: &str = "x-principal-name";
pub const PRINCIPAL_ADMIN_HEADER: &str = "x-principal-admin";

/// Request context of the authenticated caller
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::Unauthenticated(format!("header {} is not valid text", name)))
        })
        .transpose()
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = header(parts, PRINCIPAL_UID_HEADER)?
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthenticated(format!("missing {} header", PRINCIPAL_UID_HEADER))
            })?;
        let username = header(parts, PRINCIPAL_NAME_HEADER)?.unwrap_or(uid);
        let is_admin = header(parts, PRINCIPAL_ADMIN_HEADER)?
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true") || flag == "1");

        Ok(Caller(RequestContext::new(Principal::new(
            uid, username, is_admin,
        ))))
    }
}
