//! Registration and sign-in handlers

use crate::error::ApiError;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use newswire_types::{Credentials, SessionToken, User};
use tracing::info;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    info!("Registration attempt for: {}", req.username);

    let user = state.auth_service.register(&req.username, &req.password).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Json<SessionToken>, ApiError> {
    info!("Sign-in attempt for: {}", req.username);

    let (_user, token) = state.auth_service.login(&req.username, &req.password).await?;

    Ok(Json(SessionToken { token }))
}
