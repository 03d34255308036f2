use crate::error::PostError;
use crate::geo_search::query_error;
use crate::models::Post;
use crate::search_index::{PostQuery, SearchIndex};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Numeric post fields a cluster query may filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterField {
    /// Face detection confidence, stored as `face`
    Face,
}

impl ClusterField {
    /// Field name in the post mapping
    pub fn index_field(&self) -> &'static str {
        match self {
            ClusterField::Face => "face",
        }
    }
}

impl FromStr for ClusterField {
    type Err = PostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "face" | "faceScore" => Ok(ClusterField::Face),
            other => Err(PostError::Validation(format!(
                "unknown cluster term {other:?}; expected \"face\""
            ))),
        }
    }
}

/// Threshold range query selecting high-confidence posts
pub struct ClusterQueryService {
    index: Arc<dyn SearchIndex>,
    post_index: String,
    threshold: f64,
    max_results: i64,
}

impl ClusterQueryService {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        post_index: &str,
        threshold: f64,
        max_results: i64,
    ) -> Self {
        Self {
            index,
            post_index: post_index.to_string(),
            threshold,
            max_results,
        }
    }

    /// All posts whose `field` is at or above the threshold
    #[instrument(skip(self))]
    pub async fn cluster(&self, field: ClusterField) -> Result<Vec<Post>, PostError> {
        let query = PostQuery::Range {
            field: field.index_field().to_string(),
            gte: self.threshold,
        };

        metrics::counter!("queries.cluster").increment(1);

        let posts = self
            .index
            .search(&self.post_index, &query, self.max_results)
            .await
            .map_err(query_error)?;

        debug!(hits = posts.len(), "Cluster query completed");
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use crate::search_index::{MockSearchIndex, SearchIndexError};

    #[test]
    fn test_parse_cluster_field() {
        assert_eq!("face".parse::<ClusterField>().unwrap(), ClusterField::Face);
        assert_eq!("faceScore".parse::<ClusterField>().unwrap(), ClusterField::Face);
        assert!(matches!(
            "message".parse::<ClusterField>(),
            Err(PostError::Validation(_))
        ));
        assert!("".parse::<ClusterField>().is_err());
    }

    #[tokio::test]
    async fn test_range_query_uses_threshold() {
        let mut index = MockSearchIndex::new();
        index
            .expect_search()
            .withf(|name, query, _| {
                name == "post"
                    && *query
                        == PostQuery::Range {
                            field: "face".to_string(),
                            gte: 0.8,
                        }
            })
            .returning(|_, _, _| {
                let mut post = Post::new("carol", "", Location::default());
                post.face = 0.97;
                Ok(vec![post])
            });

        let service = ClusterQueryService::new(Arc::new(index), "post", 0.8, 10_000);
        let posts = service.cluster(ClusterField::Face).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].face, 0.97);
    }

    #[tokio::test]
    async fn test_unreachable_index() {
        let mut index = MockSearchIndex::new();
        index
            .expect_search()
            .returning(|_, _, _| Err(SearchIndexError::Unavailable("timeout".into())));

        let service = ClusterQueryService::new(Arc::new(index), "post", 0.8, 10_000);
        assert!(matches!(
            service.cluster(ClusterField::Face).await,
            Err(PostError::UpstreamUnavailable(_))
        ));
    }
}
