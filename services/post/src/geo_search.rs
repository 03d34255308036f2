use crate::error::PostError;
use crate::models::Post;
use crate::search_index::{PostQuery, SearchIndex, SearchIndexError};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Radius search over post locations
pub struct GeoSearchService {
    index: Arc<dyn SearchIndex>,
    post_index: String,
    default_radius_km: f64,
    max_results: i64,
}

impl GeoSearchService {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        post_index: &str,
        default_radius_km: f64,
        max_results: i64,
    ) -> Self {
        Self {
            index,
            post_index: post_index.to_string(),
            default_radius_km,
            max_results,
        }
    }

    /// Posts within `radius_km` (or the default radius) of `(lat, lon)`, in
    /// the order the index returns them
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        lat: f64,
        lon: f64,
        radius_km: Option<f64>,
    ) -> Result<Vec<Post>, PostError> {
        let radius_km = radius_km.unwrap_or(self.default_radius_km);
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(PostError::Validation(format!(
                "range must be a positive number of kilometers, got {radius_km}"
            )));
        }

        let query = PostQuery::GeoDistance {
            field: "location".to_string(),
            lat,
            lon,
            radius_km,
        };

        metrics::counter!("queries.geo").increment(1);

        let posts = self
            .index
            .search(&self.post_index, &query, self.max_results)
            .await
            .map_err(query_error)?;

        debug!(hits = posts.len(), radius_km = radius_km, "Geo search completed");
        Ok(posts)
    }
}

/// Shared by both read paths
pub(crate) fn query_error(err: SearchIndexError) -> PostError {
    error!(error = %err, "Failed to read posts from the search index");
    metrics::counter!("queries.failed").increment(1);
    match err {
        SearchIndexError::Unavailable(e) => PostError::UpstreamUnavailable(e),
        other => PostError::QueryFailure(other.to_string()),
    }
}
