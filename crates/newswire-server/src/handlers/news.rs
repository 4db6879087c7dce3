//! News and like handlers
//!
//! All routes here are protected: the `AuthUser` extractor resolves the
//! session before any store access.

use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use newswire_types::{Error, NewsDraft, NewsItem};
use tracing::info;

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(draft): Json<NewsDraft>,
) -> Result<(StatusCode, Json<NewsItem>), ApiError> {
    let item = state.db.create_news(user.id, &draft.content).await?;
    info!("User '{}' posted news item {}", user.username, item.id);

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<NewsItem>, ApiError> {
    let item = state
        .db
        .find_news_by_id(id)
        .await?
        .ok_or(Error::NewsNotFound(id))?;

    Ok(Json(item))
}

pub async fn top(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let items = state.db.top_news(state.top_news_limit).await?;

    Ok(Json(items))
}

pub async fn like(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.add_like(id, user.id).await?;
    info!("User '{}' liked news item {}", user.username, id);

    Ok(StatusCode::OK)
}

pub async fn dislike(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.remove_like(id, user.id).await?;
    info!("User '{}' removed like from news item {}", user.username, id);

    Ok(StatusCode::OK)
}
