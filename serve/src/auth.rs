//! `AuthContext` extraction (spec §6.2: "handlers extract userId and
//! companyId from an auth context injected by a middleware layer treated as
//! an external collaborator").
//!
//! JWT verification is out of scope (Non-goals). This reads two headers that
//! a real auth middleware would set after verifying a token; it's a stand-in
//! for that collaborator, not a security boundary.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: String,
    pub company_id: String,
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, "x-user-id")
            .ok_or((StatusCode::UNAUTHORIZED, "missing x-user-id".to_string()))?;
        let company_id = header_value(parts, "x-company-id")
            .ok_or((StatusCode::UNAUTHORIZED, "missing x-company-id".to_string()))?;
        Ok(AuthContext { user_id, company_id })
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
