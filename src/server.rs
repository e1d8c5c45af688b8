use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::config::ServeConfig;
use crate::error::QueryError;
use crate::query::{Filters, PlayDetail, QueryService, SearchQuery};

type SharedService = Arc<QueryService>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

pub fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        QueryError::NotFound { .. } => StatusCode::NOT_FOUND,
        QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Raw query string; empty values count as absent and an unparsable `down` is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    team: Option<String>,
    player_name: Option<String>,
    down: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<SearchParams> for SearchQuery {
    fn from(params: SearchParams) -> Self {
        SearchQuery {
            team: non_empty(params.team),
            player_name: non_empty(params.player_name),
            down: non_empty(params.down).and_then(|d| d.trim().parse().ok()),
        }
    }
}

async fn filters(State(service): State<SharedService>) -> Result<Json<Filters>, ApiError> {
    Ok(Json(service.list_filters()?))
}

async fn search(
    State(service): State<SharedService>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Map<String, Value>>>, ApiError> {
    let query = SearchQuery::from(params);
    debug!(?query, "search");
    Ok(Json(service.search(&query)?))
}

async fn play_detail(
    State(service): State<SharedService>,
    Path((game_id, play_id)): Path<(i64, i64)>,
) -> Result<Json<PlayDetail>, ApiError> {
    // Tracking files are read synchronously.
    let detail = tokio::task::spawn_blocking(move || service.get_play(game_id, play_id))
        .await
        .map_err(|err| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        })??;
    Ok(Json(detail))
}

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/filters", get(filters))
        .route("/search", get(search))
        .route("/plays/:game_id/:play_id", get(play_detail))
        .with_state(service)
}

pub async fn serve(service: QueryService, config: &ServeConfig) -> std::io::Result<()> {
    let app = router(Arc::new(service));
    let addr = SocketAddr::from((config.host, config.port));
    info!(%addr, "query service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::tables::SourcePaths;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn errors_map_to_status_codes() {
        let unavailable = QueryError::Unavailable { reason: "x".into() };
        let not_found = QueryError::NotFound { what: "play 1/2".into() };
        let internal = QueryError::Internal(PipelineError::Unfitted);
        assert_eq!(status_for(&unavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&not_found), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn blank_and_malformed_params_are_absent() {
        let query = SearchQuery::from(SearchParams {
            team: Some(String::new()),
            player_name: Some("Runner One".into()),
            down: Some("third".into()),
        });
        assert_eq!(query.team, None);
        assert_eq!(query.player_name.as_deref(), Some("Runner One"));
        assert_eq!(query.down, None);

        let query = SearchQuery::from(SearchParams {
            down: Some(" 3 ".into()),
            ..Default::default()
        });
        assert_eq!(query.down, Some(3));
    }

    #[tokio::test]
    async fn unloaded_store_answers_503_with_error_body() {
        let dir = tempfile::TempDir::new().unwrap();
        let service = Arc::new(QueryService::load(SourcePaths::new(dir.path(), dir.path())));

        let response = filters(State(service.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("unavailable"));

        let response = play_detail(State(service), Path((1, 1))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
