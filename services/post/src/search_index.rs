use crate::models::Post;
use async_trait::async_trait;
use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    Elasticsearch, IndexParts, SearchParts,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum SearchIndexError {
    #[error("invalid search index URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("search index unreachable: {0}")]
    Unavailable(String),

    #[error("search index returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<elasticsearch::Error> for SearchIndexError {
    fn from(err: elasticsearch::Error) -> Self {
        if err.is_timeout() || is_connect_error(&err) {
            SearchIndexError::Unavailable(err.to_string())
        } else {
            SearchIndexError::Transport(err.to_string())
        }
    }
}

fn is_connect_error(err: &elasticsearch::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(reqwest_err) = e.downcast_ref::<reqwest::Error>() {
            return reqwest_err.is_connect();
        }
        source = e.source();
    }
    false
}

/// Structured query against the post index
#[derive(Debug, Clone, PartialEq)]
pub enum PostQuery {
    /// Documents whose geo-point `field` lies within `radius_km` of the center
    GeoDistance {
        field: String,
        lat: f64,
        lon: f64,
        radius_km: f64,
    },
    /// Documents whose numeric `field` is `>= gte`
    Range { field: String, gte: f64 },
}

impl PostQuery {
    /// Query DSL body for this filter
    pub fn to_dsl(&self) -> Value {
        match self {
            PostQuery::GeoDistance {
                field,
                lat,
                lon,
                radius_km,
            } => json!({
                "bool": {
                    "filter": {
                        "geo_distance": {
                            "distance": format!("{}km", radius_km),
                            field.as_str(): { "lat": lat, "lon": lon }
                        }
                    }
                }
            }),
            PostQuery::Range { field, gte } => json!({
                "range": {
                    field.as_str(): { "gte": gte }
                }
            }),
        }
    }
}

/// Schema-aware document store holding posts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create `index` with the given settings/mappings body
    async fn create_index(&self, index: &str, body: Value) -> Result<(), SearchIndexError>;

    /// Write `post` under `id`; an existing document with that id is replaced
    async fn index_document(&self, index: &str, id: &str, post: &Post)
        -> Result<(), SearchIndexError>;

    /// Run `query`, returning at most `size` posts in index order
    async fn search(
        &self,
        index: &str,
        query: &PostQuery,
        size: i64,
    ) -> Result<Vec<Post>, SearchIndexError>;

    async fn ping(&self) -> Result<(), SearchIndexError>;
}

/// Elasticsearch-backed index; the transport keeps its own connection pool
#[derive(Clone)]
pub struct ElasticsearchIndex {
    client: Elasticsearch,
}

impl ElasticsearchIndex {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SearchIndexError> {
        let parsed = Url::parse(url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool)
            .timeout(timeout)
            .build()
            .map_err(|e| SearchIndexError::Transport(e.to_string()))?;

        Ok(Self {
            client: Elasticsearch::new(transport),
        })
    }
}

async fn ensure_success(
    response: elasticsearch::http::response::Response,
) -> Result<elasticsearch::http::response::Response, SearchIndexError> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SearchIndexError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SearchIndexError::Status {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self, post))]
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        post: &Post,
    ) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(post)
            .send()
            .await?;

        ensure_success(response).await?;
        debug!(index = %index, id = %id, "Document indexed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        index: &str,
        query: &PostQuery,
        size: i64,
    ) -> Result<Vec<Post>, SearchIndexError> {
        let body = json!({
            "size": size,
            "query": query.to_dsl(),
        });

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await?;

        let search_response: SearchResponse = ensure_success(response).await?.json().await?;
        Ok(search_response.into_posts())
    }

    async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self.client.ping().send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: InnerHits,
}

#[derive(Debug, Deserialize)]
struct InnerHits {
    #[serde(default)]
    hits: Vec<PostHit>,
}

#[derive(Debug, Deserialize)]
struct PostHit {
    #[serde(rename = "_source")]
    source: Option<Post>,
}

impl SearchResponse {
    /// Hits without a usable `_source` are dropped
    fn into_posts(self) -> Vec<Post> {
        self.hits
            .hits
            .into_iter()
            .filter_map(|hit| hit.source)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_distance_dsl() {
        let query = PostQuery::GeoDistance {
            field: "location".to_string(),
            lat: 37.5,
            lon: -122.0,
            radius_km: 200.0,
        };
        assert_eq!(
            query.to_dsl(),
            json!({
                "bool": {
                    "filter": {
                        "geo_distance": {
                            "distance": "200km",
                            "location": {"lat": 37.5, "lon": -122.0}
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_fractional_radius_dsl() {
        let query = PostQuery::GeoDistance {
            field: "location".to_string(),
            lat: 0.0,
            lon: 0.0,
            radius_km: 12.5,
        };
        assert_eq!(
            query.to_dsl()["bool"]["filter"]["geo_distance"]["distance"],
            "12.5km"
        );
    }

    #[test]
    fn test_range_dsl() {
        let query = PostQuery::Range {
            field: "face".to_string(),
            gte: 0.8,
        };
        assert_eq!(query.to_dsl(), json!({"range": {"face": {"gte": 0.8}}}));
    }

    #[test]
    fn test_search_response_mapping() {
        let response: SearchResponse = serde_json::from_value(json!({
            "took": 3,
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {"_id": "a", "_source": {
                        "user": "alice", "message": "hi",
                        "location": {"lat": 1.0, "lon": 2.0},
                        "url": "", "type": "", "face": 0.0
                    }},
                    {"_id": "b"}
                ]
            }
        }))
        .unwrap();

        let posts = response.into_posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].user, "alice");
    }

    #[test]
    fn test_empty_hits() {
        let response: SearchResponse =
            serde_json::from_value(json!({"hits": {"hits": []}})).unwrap();
        assert!(response.into_posts().is_empty());
    }
}
