use crate::auth::{AuthUser, JwtValidator};
use crate::cluster::{ClusterField, ClusterQueryService};
use crate::config::ApiConfig;
use crate::error::PostError;
use crate::geo_search::GeoSearchService;
use crate::ingest::IngestionCoordinator;
use crate::models::{parse_coordinate, Location, MediaUpload, Post};
use crate::search_index::SearchIndex;
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Application state shared across handlers; every backend client inside
/// is created once at startup
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestionCoordinator>,
    pub geo_search: Arc<GeoSearchService>,
    pub cluster: Arc<ClusterQueryService>,
    pub index: Arc<dyn SearchIndex>,
    pub jwt: Arc<JwtValidator>,
    pub require_media: bool,
}

/// Query parameters for `GET /search`
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    /// Radius in kilometers
    pub range: Option<String>,
}

/// Query parameters for `GET /cluster`
#[derive(Debug, Deserialize)]
pub struct ClusterParams {
    pub term: Option<String>,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route(
            "/post",
            post(create_post)
                .options(preflight)
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/search", get(search_posts).options(preflight))
        .route("/cluster", get(cluster_posts).options(preflight))
        .layer(TraceLayer::new_for_http());

    let router = if config.cors_enabled {
        router.layer(cors_layer(config))
    } else {
        router
    };

    router.with_state(state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = if config.cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "post-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.index.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "search_index": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "search_index": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// CORS preflight on any route answers with an empty 200
async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Publish a post from a multipart form
#[instrument(skip(state, multipart), fields(user = %user.0))]
async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<StatusCode, PostError> {
    let mut message = String::new();
    let mut lat: Option<String> = None;
    let mut lon: Option<String> = None;
    let mut media: Option<MediaUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PostError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| PostError::Validation(format!("Failed to read image: {e}")))?;
                // Browsers send an empty, unnamed part when no file was picked
                if !(filename.is_empty() && data.is_empty()) {
                    media = Some(MediaUpload {
                        filename,
                        data: data.to_vec(),
                    });
                }
            }
            "message" | "lat" | "lon" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| PostError::Validation(format!("Failed to read {name}: {e}")))?;
                match name.as_str() {
                    "message" => message = value,
                    "lat" => lat = Some(value),
                    _ => lon = Some(value),
                }
            }
            // "user" and anything else is ignored; the author comes from the token
            _ => {}
        }
    }

    if media.is_none() && state.require_media {
        return Err(PostError::Validation("Image is not available".to_string()));
    }

    let location = Location::new(
        parse_coordinate(lat.as_deref()),
        parse_coordinate(lon.as_deref()),
    );

    state
        .ingest
        .publish(&user.0, &message, location, media)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to publish post");
            e
        })?;

    Ok(StatusCode::OK)
}

/// Posts around a point
#[instrument(skip(state, _user))]
async fn search_posts(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Post>>, PostError> {
    let lat = parse_coordinate(params.lat.as_deref());
    let lon = parse_coordinate(params.lon.as_deref());
    let radius_km = parse_range(params.range.as_deref())?;

    let posts = state.geo_search.search(lat, lon, radius_km).await?;
    Ok(Json(posts))
}

/// Posts whose confidence field crosses the cluster threshold
#[instrument(skip(state, _user))]
async fn cluster_posts(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<ClusterParams>,
) -> Result<Json<Vec<Post>>, PostError> {
    let field: ClusterField = params
        .term
        .as_deref()
        .ok_or_else(|| PostError::Validation("missing term".to_string()))?
        .parse()?;

    let posts = state.cluster.cluster(field).await?;
    Ok(Json(posts))
}

/// Empty or absent `range` means the default radius
fn parse_range(raw: Option<&str>) -> Result<Option<f64>, PostError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .strip_suffix("km")
            .unwrap_or(value)
            .parse::<f64>()
            .map(Some)
            .map_err(|_| PostError::Validation(format!("range is not a number: {value:?}"))),
    }
}

/// Start the API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting post API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range(None).unwrap(), None);
        assert_eq!(parse_range(Some("")).unwrap(), None);
        assert_eq!(parse_range(Some("50")).unwrap(), Some(50.0));
        assert_eq!(parse_range(Some("12.5km")).unwrap(), Some(12.5));
        assert!(matches!(parse_range(Some("far")), Err(PostError::Validation(_))));
        assert!(matches!(parse_range(Some("5kmkm")), Err(PostError::Validation(_))));
    }
}
