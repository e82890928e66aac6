// Bearer-token extractor. Every authenticated request also makes sure the
// caller has a profile.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use cfmpicks_app::{Identity, ServiceError};

use crate::error::ApiError;
use crate::AppState;

pub struct AuthUser(pub Identity);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))?;
        let identity = state.verifier.verify(token)?;
        state.app.ensure_profile(&identity)?;
        Ok(AuthUser(identity))
    }
}
