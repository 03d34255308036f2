use crate::config::ObjectStoreConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The store could not be reached at all
    #[error("object store unreachable: {0}")]
    Unavailable(String),

    #[error("object store request failed: {0}")]
    Request(String),
}

/// Durable blob storage with public read URLs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, grant public read, and return the public URL
    async fn put_public(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;

    /// Storage-scheme URI of `key` (e.g. `gs://bucket/key`), as understood
    /// by the annotation service
    fn storage_uri(&self, key: &str) -> String;

    /// Bucket every object is written to
    fn bucket(&self) -> &str;
}

/// S3-compatible object store client, built once and shared by every request
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    config: ObjectStoreConfig,
}

impl S3ObjectStore {
    /// Create a new client for the configured bucket
    pub async fn new(config: &ObjectStoreConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // GCS interoperability, MinIO, LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "Object store client initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            config: config.clone(),
        }
    }

    /// Public read URL of `key`
    pub fn public_url(&self, key: &str) -> String {
        public_url(&self.config.public_base_url, &self.bucket, key)
    }

    /// Single-part upload for small bodies
    async fn simple_upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| sdk_error("put object", e))?;

        Ok(())
    }

    /// Multipart upload for bodies above the threshold
    async fn multipart_upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| sdk_error("create multipart upload", e))?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| ObjectStoreError::Request("no upload id in response".to_string()))?
            .to_string();

        match self.upload_parts(key, &upload_id, &data).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| sdk_error("complete multipart upload", e))?;
                Ok(())
            }
            Err(e) => {
                // Parts of an abandoned upload are billed until aborted
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        key = %key,
                        error = %DisplayErrorContext(&abort_err),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: &[u8],
    ) -> Result<Vec<CompletedPart>, ObjectStoreError> {
        let mut completed_parts = Vec::new();

        for (index, chunk) in data.chunks(self.config.part_size_bytes.max(1)).enumerate() {
            let part_number = index as i32 + 1;

            let response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| sdk_error("upload part", e))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(response.e_tag().unwrap_or_default())
                    .build(),
            );
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, data), fields(bucket = %self.bucket, size_bytes = data.len()))]
    async fn put_public(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        debug!(key = %key, content_type = %content_type, "Uploading object");

        if data.len() > self.config.multipart_threshold_bytes {
            self.multipart_upload(key, data, content_type).await?;
        } else {
            self.simple_upload(key, data, content_type).await?;
        }

        let url = self.public_url(key);
        info!(key = %key, url = %url, "Media saved to object store");
        Ok(url)
    }

    fn storage_uri(&self, key: &str) -> String {
        storage_uri(&self.config.storage_scheme, &self.bucket, key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn public_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

fn storage_uri(scheme: &str, bucket: &str, key: &str) -> String {
    format!("{}://{}/{}", scheme, bucket, key)
}

fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> ObjectStoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = format!("{operation}: {}", DisplayErrorContext(&err));
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            ObjectStoreError::Unavailable(detail)
        }
        _ => ObjectStoreError::Request(detail),
    }
}
