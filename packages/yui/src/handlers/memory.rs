//! Read/write access to stored memory outside the chat socket.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;

#[derive(Deserialize)]
pub struct HistoryParams {
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
    limit: Option<i64>,
}

pub async fn get_database_stats(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    match state.db.get_stats().await {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => {
            tracing::error!("Failed to get database stats: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Recent turns, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = params
        .limit
        .unwrap_or(state.chat.max_history_turns as i64)
        .clamp(1, 100);
    match state.repository.recent_turns(&user_name, limit).await {
        Ok(turns) => Ok(Json(turns)),
        Err(e) => {
            tracing::error!(user = %user_name, "Failed to load history: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn search_history(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    match state
        .repository
        .search_turns(&user_name, &params.q, limit)
        .await
    {
        Ok(turns) => Ok(Json(turns)),
        Err(e) => {
            tracing::error!(user = %user_name, "Failed to search history: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    match state.repository.user_stats(&user_name).await {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => {
            tracing::error!(user = %user_name, "Failed to get user stats: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    match state.repository.get_profile(&user_name).await {
        Ok(Some(profile)) => Ok(Json(serde_json::json!({
            "user_name": profile.user_name,
            "preferences": profile.preferences(),
            "created_at": profile.created_at,
            "last_seen": profile.last_seen,
        }))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(user = %user_name, "Failed to get profile: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Shallow-merge a JSON object into the user's preferences.
pub async fn patch_preferences(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
    Json(updates): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<impl IntoResponse, StatusCode> {
    match state
        .repository
        .update_preferences(&user_name, &updates)
        .await
    {
        Ok(preferences) => Ok(Json(preferences)),
        Err(e) => {
            tracing::error!(user = %user_name, "Failed to update preferences: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    match state.repository.get_session(&session_id).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(session_id = %session_id, "Failed to get session: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
