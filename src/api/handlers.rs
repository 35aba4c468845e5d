use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::request_id::RequestId;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::request_id_str,
    models::{MovieId, MovieRecord, ResolutionResult},
    services::recommendations::DEFAULT_RECOMMENDATIONS,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub movie_name: Option<String>,
    /// Any JSON value; only integers are honored
    pub n_recommendations: Option<Value>,
    pub preference_genres: Option<Vec<String>>,
}

impl SearchRequest {
    /// Requested count, with anything that isn't an integer read as the default
    fn count(&self) -> i64 {
        self.n_recommendations
            .as_ref()
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_RECOMMENDATIONS as i64)
    }
}

/// Resolve a title and recommend similar movies
pub async fn search(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> AppResult<Json<ResolutionResult>> {
    let request_id = request_id
        .as_ref()
        .map(|Extension(id)| request_id_str(id))
        .unwrap_or("unknown");

    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(request_id = %request_id, error = %rejection, "Rejected search payload");
        AppError::InvalidInput("Invalid request body".to_string())
    })?;

    let movie_name = request
        .movie_name
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput("Movie name is required".to_string()))?;
    let genres = request.preference_genres.as_deref().unwrap_or_default();

    tracing::info!(
        request_id = %request_id,
        movie_name = %movie_name,
        count = request.count(),
        genres = ?genres,
        "Search request"
    );

    let result = state
        .recommender
        .resolve(movie_name, request.count(), genres)
        .await?;

    Ok(Json(result))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "services": {
            "movie_recommender": state.recommender.is_ready(),
            "api_service": state.providers_ready,
        }
    }))
}

/// Full record for a TMDB ID, following cross-references to OMDB
pub async fn movie_by_tmdb_id(
    State(state): State<AppState>,
    tmdb_id: Result<Path<u64>, PathRejection>,
) -> AppResult<Json<MovieRecord>> {
    let Path(tmdb_id) = tmdb_id.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected TMDB ID");
        AppError::InvalidInput("TMDB ID must be a non-negative integer".to_string())
    })?;
    let id = MovieId::Tmdb(tmdb_id);
    state
        .providers
        .details(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", id)))
}

/// Fallback for unmatched routes
pub async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/api/") {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Endpoint not found",
                "status": "error",
                "path": uri.path(),
            })),
        )
            .into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(count: Value) -> SearchRequest {
        SearchRequest {
            movie_name: Some("Heat".to_string()),
            n_recommendations: Some(count),
            preference_genres: None,
        }
    }

    #[test]
    fn test_count_accepts_integers_only() {
        assert_eq!(request(json!(5)).count(), 5);
        assert_eq!(request(json!(-2)).count(), -2);
        assert_eq!(request(json!("5")).count(), 10);
        assert_eq!(request(json!(2.5)).count(), 10);
        assert_eq!(request(Value::Null).count(), 10);
    }

    #[test]
    fn test_count_defaults_when_absent() {
        let request = SearchRequest {
            movie_name: None,
            n_recommendations: None,
            preference_genres: None,
        };
        assert_eq!(request.count(), DEFAULT_RECOMMENDATIONS as i64);
    }
}
