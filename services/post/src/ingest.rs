use crate::annotation::{AnnotationError, FaceAnnotator};
use crate::error::PostError;
use crate::models::{content_type_for, Location, MediaKind, MediaUpload, Post};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::search_index::{SearchIndex, SearchIndexError};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Publishes a post: blob upload, classification, annotation, index write.
///
/// Each step only runs if the previous one succeeded. A failure after the
/// upload leaves the blob in place; it is logged and counted as orphaned but
/// never deleted.
pub struct IngestionCoordinator {
    object_store: Arc<dyn ObjectStore>,
    annotator: Arc<dyn FaceAnnotator>,
    index: Arc<dyn SearchIndex>,
    post_index: String,
}

impl IngestionCoordinator {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        annotator: Arc<dyn FaceAnnotator>,
        index: Arc<dyn SearchIndex>,
        post_index: &str,
    ) -> Self {
        Self {
            object_store,
            annotator,
            index,
            post_index: post_index.to_string(),
        }
    }

    /// Returns the id shared by the blob and the index document
    #[instrument(skip(self, message, media), fields(has_media = media.is_some()))]
    pub async fn publish(
        &self,
        author: &str,
        message: &str,
        location: Location,
        media: Option<MediaUpload>,
    ) -> Result<Uuid, PostError> {
        let result = self.run(author, message, location, media).await;

        match &result {
            Ok(id) => {
                metrics::counter!("posts.published").increment(1);
                info!(post_id = %id, "Post published");
            }
            Err(e) => {
                metrics::counter!("posts.publish_failed", "stage" => e.stage()).increment(1);
            }
        }
        result
    }

    async fn run(
        &self,
        author: &str,
        message: &str,
        location: Location,
        media: Option<MediaUpload>,
    ) -> Result<Uuid, PostError> {
        let mut post = Post::new(author, message, location);
        let id = Uuid::new_v4();
        let key = id.to_string();

        if let Some(media) = media {
            let kind = MediaKind::from_filename(&media.filename);
            let content_type = content_type_for(&media.filename);

            post.url = self
                .object_store
                .put_public(&key, media.data, content_type)
                .await
                .map_err(upload_error)?;
            post.media_type = kind.to_string();

            if kind == MediaKind::Image {
                let uri = self.object_store.storage_uri(&key);
                match self.annotator.score(&uri).await {
                    Ok(score) => post.face = score.unwrap_or(0.0),
                    Err(e) => {
                        self.orphaned(&key, "annotation");
                        return Err(annotation_error(e));
                    }
                }
                debug!(post_id = %id, face = post.face, "Image annotated");
            }
        }

        if let Err(e) = self.index.index_document(&self.post_index, &key, &post).await {
            if !post.url.is_empty() {
                self.orphaned(&key, "indexing");
            }
            return Err(indexing_error(e));
        }

        Ok(id)
    }

    fn orphaned(&self, key: &str, stage: &'static str) {
        warn!(
            bucket = %self.object_store.bucket(),
            key = %key,
            stage = stage,
            "Post failed after upload; blob left orphaned"
        );
        metrics::counter!("posts.orphaned_blobs", "stage" => stage).increment(1);
    }
}

fn upload_error(err: ObjectStoreError) -> PostError {
    match err {
        ObjectStoreError::Unavailable(e) => PostError::UpstreamUnavailable(e),
        ObjectStoreError::Request(e) => PostError::UploadFailure(e),
    }
}

fn annotation_error(err: AnnotationError) -> PostError {
    match err {
        AnnotationError::Unavailable(e) => PostError::UpstreamUnavailable(e),
        other => PostError::AnnotationFailure(other.to_string()),
    }
}

fn indexing_error(err: SearchIndexError) -> PostError {
    match err {
        SearchIndexError::Unavailable(e) => PostError::UpstreamUnavailable(e),
        other => PostError::IndexingFailure(other.to_string()),
    }
}
