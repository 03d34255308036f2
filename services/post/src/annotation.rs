//! Face-confidence scoring for stored images.
//!
//! The ingestion path only sees [`FaceAnnotator`]; the wire format of the
//! detection backend stays inside [`VisionAnnotator`].

use crate::config::AnnotationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("annotation service unreachable: {0}")]
    Unavailable(String),

    #[error("annotation request failed: {0}")]
    Request(String),

    #[error("annotation service rejected the image ({code}): {message}")]
    Rejected { code: i32, message: String },
}

/// Scores a stored image for a detectable face
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceAnnotator: Send + Sync {
    /// Confidence of the most prominent face, or `None` when no face was found
    async fn score(&self, image_uri: &str) -> Result<Option<f32>, AnnotationError>;
}

/// HTTP client for an `images:annotate` face-detection endpoint
pub struct VisionAnnotator {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl VisionAnnotator {
    pub fn new(config: &AnnotationConfig, timeout: Duration) -> Result<Self, AnnotationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnnotationError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl FaceAnnotator for VisionAnnotator {
    #[instrument(skip(self))]
    async fn score(&self, image_uri: &str) -> Result<Option<f32>, AnnotationError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&AnnotateRequest::face_detection(image_uri, 1));
        if let Some(ref key) = self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnotationError::Rejected {
                code: i32::from(status.as_u16()),
                message: body,
            });
        }

        let body: AnnotateResponse = response.json().await.map_err(transport_error)?;
        let score = body.first_face_confidence()?;

        if score.is_none() {
            debug!(image_uri = %image_uri, "No faces found");
        }
        Ok(score)
    }
}

fn transport_error(err: reqwest::Error) -> AnnotationError {
    if err.is_connect() || err.is_timeout() {
        AnnotationError::Unavailable(err.to_string())
    } else {
        AnnotationError::Request(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    image: Image,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct Image {
    source: ImageSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSource {
    image_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    max_results: u32,
}

impl AnnotateRequest {
    fn face_detection(image_uri: &str, max_results: u32) -> Self {
        Self {
            requests: vec![ImageRequest {
                image: Image {
                    source: ImageSource {
                        image_uri: image_uri.to_string(),
                    },
                },
                features: vec![Feature {
                    kind: "FACE_DETECTION",
                    max_results,
                }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    face_annotations: Vec<FaceAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceAnnotation {
    #[serde(default)]
    detection_confidence: f32,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl AnnotateResponse {
    fn first_face_confidence(self) -> Result<Option<f32>, AnnotationError> {
        let Some(image) = self.responses.into_iter().next() else {
            return Ok(None);
        };
        if let Some(status) = image.error {
            return Err(AnnotationError::Rejected {
                code: status.code,
                message: status.message,
            });
        }
        Ok(image
            .face_annotations
            .first()
            .map(|face| face.detection_confidence))
    }
}
