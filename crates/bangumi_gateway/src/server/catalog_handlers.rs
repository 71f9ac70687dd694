//! Catalog proxy endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use super::{error::ApiError, AppState};
use crate::catalog::{AnimeDetail, SearchResults, ANIME_SUBJECT_TYPE};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default, rename = "type")]
    pub subject_type: Option<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    let query = params.q.unwrap_or_default();
    let subject_type = params
        .subject_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| ANIME_SUBJECT_TYPE.to_string());

    state
        .catalog
        .search(&query, &subject_type)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Search error: {}", e);
            ApiError::bad_gateway("Failed to fetch search results", &e)
        })
}

pub async fn anime_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnimeDetail>, ApiError> {
    state.catalog.anime_detail(&id).await.map(Json).map_err(|e| {
        error!("Anime detail error for {}: {}", id, e);
        ApiError::bad_gateway("Failed to fetch anime details", &e)
    })
}

pub async fn subject_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.catalog.subject(&id).await.map(Json).map_err(|e| {
        error!("Subject detail error for {}: {}", id, e);
        ApiError::bad_gateway("Failed to fetch subject details", &e)
    })
}
