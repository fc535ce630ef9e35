use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::router::PortalState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Check the presented admin token against the configured one.
/// Accepts either:
/// - Header: `x-admin-token: ...`
/// - Header: `Authorization: Bearer ...`
pub fn ensure_admin_token(expected: &str, headers: &HeaderMap) -> Result<(), Response> {
    let matches = |candidate: &str| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()));

    // 1) header: x-admin-token
    if let Some(hv) = headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok())
        && matches(hv)
    {
        return Ok(());
    }

    // 2) header: Authorization: Bearer <token>
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        let auth = auth.trim();
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            && matches(token)
        {
            return Ok(());
        }
    }

    Err((
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "unauthorized", "reason": "invalid or missing admin token"})),
    )
        .into_response())
}

/// Extractor guarding operator routes. Rejects with 404 when no admin is configured.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<PortalState> for RequireAdmin {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PortalState,
    ) -> Result<Self, Self::Rejection> {
        let Some(admin) = state.config.admin_credentials() else {
            return Err(StatusCode::NOT_FOUND.into_response());
        };
        ensure_admin_token(admin.token, &parts.headers)?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn accepts_header_and_bearer_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("tok"));
        assert!(ensure_admin_token("tok", &headers).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));
        assert!(ensure_admin_token("tok", &headers).is_ok());
    }

    #[test]
    fn rejects_wrong_or_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("nope"));
        let resp = ensure_admin_token("tok", &headers).unwrap_err();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = ensure_admin_token("tok", &HeaderMap::new()).unwrap_err();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
