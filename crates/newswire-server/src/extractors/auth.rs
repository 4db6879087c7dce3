//! Auth extractor for protected routes
//!
//! Resolves the bearer session token to a user before the handler runs;
//! rejection stops the request with 401 and no store mutation happens.

use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use newswire_types::Error;

/// Authenticated user identity, passed explicitly into every protected
/// handler.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(Error::AuthenticationRejected)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(Error::AuthenticationRejected)?;

        let user_id = state.auth_service.resolve_session(token)?;

        // The token must map to a user that still exists.
        let user = state
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or(Error::AuthenticationRejected)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
        })
    }
}
