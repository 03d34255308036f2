use crate::error::PostError;
use crate::search_index::SearchIndex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Creates the post and user indices with their fixed mappings.
///
/// Runs once before the API starts listening. Geo queries depend on
/// `location` being mapped as a geo-point before the first document is
/// written, so any failure here must abort startup.
pub struct SchemaManager {
    index: Arc<dyn SearchIndex>,
    post_index: String,
    user_index: String,
}

impl SchemaManager {
    pub fn new(index: Arc<dyn SearchIndex>, post_index: &str, user_index: &str) -> Self {
        Self {
            index,
            post_index: post_index.to_string(),
            user_index: user_index.to_string(),
        }
    }

    /// Idempotent: existing indices are left untouched
    pub async fn ensure_schemas(&self) -> Result<(), PostError> {
        self.ensure_index(&self.post_index, post_mapping()).await?;
        self.ensure_index(&self.user_index, user_mapping()).await?;
        Ok(())
    }

    async fn ensure_index(&self, name: &str, body: Value) -> Result<(), PostError> {
        let exists = self.index.index_exists(name).await.map_err(|e| {
            PostError::SchemaInitFailure(format!("checking index {name}: {e}"))
        })?;

        if exists {
            info!(index = %name, "Index already exists");
            return Ok(());
        }

        self.index
            .create_index(name, body)
            .await
            .map_err(|e| PostError::SchemaInitFailure(format!("creating index {name}: {e}")))?;

        info!(index = %name, "Index created");
        Ok(())
    }
}

/// Post documents: opaque keyword fields, geo-point location, float face score
pub fn post_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "user":     { "type": "keyword", "index": false },
                "message":  { "type": "keyword", "index": false },
                "location": { "type": "geo_point" },
                "url":      { "type": "keyword", "index": false },
                "type":     { "type": "keyword", "index": false },
                "face":     { "type": "float" }
            }
        }
    })
}

/// User documents: only `username` is searchable
pub fn user_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "username": { "type": "keyword" },
                "password": { "type": "keyword", "index": false },
                "age":      { "type": "long", "index": false },
                "gender":   { "type": "keyword", "index": false }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_index::{MockSearchIndex, SearchIndexError};
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_creates_missing_indices() {
        let mut index = MockSearchIndex::new();
        index.expect_index_exists().returning(|_| Ok(false));
        index
            .expect_create_index()
            .with(eq("post"), eq(post_mapping()))
            .times(1)
            .returning(|_, _| Ok(()));
        index
            .expect_create_index()
            .with(eq("user"), eq(user_mapping()))
            .times(1)
            .returning(|_, _| Ok(()));

        let manager = SchemaManager::new(Arc::new(index), "post", "user");
        manager.ensure_schemas().await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_indices_are_untouched() {
        let mut index = MockSearchIndex::new();
        index.expect_index_exists().times(2).returning(|_| Ok(true));
        index.expect_create_index().never();

        let manager = SchemaManager::new(Arc::new(index), "post", "user");
        manager.ensure_schemas().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_failure_is_fatal() {
        let mut index = MockSearchIndex::new();
        index
            .expect_index_exists()
            .returning(|_| Err(SearchIndexError::Unavailable("connection refused".into())));
        index.expect_create_index().never();

        let manager = SchemaManager::new(Arc::new(index), "post", "user");
        let err = manager.ensure_schemas().await.unwrap_err();
        assert!(matches!(err, PostError::SchemaInitFailure(_)));
    }

    #[tokio::test]
    async fn test_create_failure_is_fatal() {
        let mut index = MockSearchIndex::new();
        index.expect_index_exists().returning(|_| Ok(false));
        index.expect_create_index().returning(|_, _| {
            Err(SearchIndexError::Status {
                status: 400,
                body: "resource_already_exists_exception".into(),
            })
        });

        let manager = SchemaManager::new(Arc::new(index), "post", "user");
        assert!(matches!(
            manager.ensure_schemas().await,
            Err(PostError::SchemaInitFailure(_))
        ));
    }

    #[test]
    fn test_post_mapping_has_geo_point() {
        let mapping = post_mapping();
        assert_eq!(mapping["mappings"]["properties"]["location"]["type"], "geo_point");
        assert_eq!(mapping["mappings"]["properties"]["face"]["type"], "float");
    }
}
