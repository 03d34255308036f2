use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the post service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Object storage configuration
    pub object_store: ObjectStoreConfig,
    /// Search index configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Face annotation configuration
    #[serde(default)]
    pub annotation: AnnotationConfig,
    /// Token validation configuration
    pub auth: AuthConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Reject posts that carry no `image` part
    #[serde(default)]
    pub require_media: bool,
    /// Maximum accepted request body for `POST /post`
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Object storage configuration (any S3-compatible endpoint)
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// Bucket that receives post media
    pub bucket: String,
    /// Region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (GCS interoperability, MinIO, LocalStack, ...)
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: Option<String>,
    /// Force path-style access
    #[serde(default = "default_true")]
    pub force_path_style: bool,
    /// Base of the public read URL; objects resolve to `{base}/{bucket}/{key}`
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// URI scheme handed to the annotation service (`gs` -> `gs://bucket/key`)
    #[serde(default = "default_storage_scheme")]
    pub storage_scheme: String,
    /// Multipart upload threshold in bytes (5MB default)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes (5MB default)
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
}

/// Search index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Index endpoint
    #[serde(default = "default_search_url")]
    pub url: String,
    /// Index holding post documents
    #[serde(default = "default_post_index")]
    pub post_index: String,
    /// Index holding user documents
    #[serde(default = "default_user_index")]
    pub user_index: String,
    /// Radius used by `/search` when the caller sends no `range`
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
    /// Lower bound (inclusive) of the cluster range query
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,
    /// Maximum hits returned by a single query
    #[serde(default = "default_max_results")]
    pub max_results: i64,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Face annotation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    /// `images:annotate` endpoint
    #[serde(default = "default_annotation_endpoint")]
    pub endpoint: String,
    /// API key appended as `?key=`
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Bearer token validation
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the identity service
    pub jwt_secret: String,
    /// Claim carrying the principal's username
    #[serde(default = "default_username_claim")]
    pub username_claim: String,
}

/// Errors raised by [`Config::validate`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

// Default value functions
fn default_service_name() -> String {
    "post-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024 // 32MB
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_endpoint_url() -> Option<String> {
    Some("https://storage.googleapis.com".to_string())
}

fn default_public_base_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_storage_scheme() -> String {
    "gs".to_string()
}

fn default_multipart_threshold() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_part_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_search_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_post_index() -> String {
    "post".to_string()
}

fn default_user_index() -> String {
    "user".to_string()
}

fn default_radius_km() -> f64 {
    200.0
}

fn default_cluster_threshold() -> f64 {
    0.8
}

fn default_max_results() -> i64 {
    10_000 // index.max_result_window default
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_annotation_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".to_string()
}

fn default_username_claim() -> String {
    "username".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "post-service")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            // Add config file if present
            .add_source(config::File::with_name("config/post").required(false))
            .add_source(config::File::with_name("/etc/around/post").required(false))
            // Override with environment variables
            // POST__SEARCH__URL -> search.url
            .add_source(
                config::Environment::with_prefix("POST")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("api.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.object_store.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("object_store.bucket"));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("auth.jwt_secret"));
        }
        if !(self.search.default_radius_km.is_finite() && self.search.default_radius_km > 0.0) {
            return Err(ConfigError::Invalid {
                key: "search.default_radius_km",
                message: format!("must be positive, got {}", self.search.default_radius_km),
            });
        }
        if !(0.0..=1.0).contains(&self.search.cluster_threshold) {
            return Err(ConfigError::Invalid {
                key: "search.cluster_threshold",
                message: format!("must be within [0, 1], got {}", self.search.cluster_threshold),
            });
        }
        if self.search.max_results <= 0 {
            return Err(ConfigError::Invalid {
                key: "search.max_results",
                message: format!("must be positive, got {}", self.search.max_results),
            });
        }
        Ok(())
    }

    /// Get search request timeout as Duration
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }

    /// Get annotation request timeout as Duration
    pub fn annotation_timeout(&self) -> Duration {
        Duration::from_secs(self.annotation.timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            require_media: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            post_index: default_post_index(),
            user_index: default_user_index(),
            default_radius_km: default_radius_km(),
            cluster_threshold: default_cluster_threshold(),
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_annotation_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ObjectStoreConfig {
    /// Configuration pointing at `bucket` with every other field defaulted
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: default_region(),
            endpoint_url: default_endpoint_url(),
            force_path_style: true,
            public_base_url: default_public_base_url(),
            storage_scheme: default_storage_scheme(),
            multipart_threshold_bytes: default_multipart_threshold(),
            part_size_bytes: default_part_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            service: ServiceConfig::default(),
            api: ApiConfig::default(),
            object_store: ObjectStoreConfig::for_bucket("around-media"),
            search: SearchConfig::default(),
            annotation: AnnotationConfig::default(),
            auth: AuthConfig {
                jwt_secret: "secret".to_string(),
                username_claim: default_username_claim(),
            },
        }
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_radius_km(), 200.0);
        assert_eq!(default_cluster_threshold(), 0.8);
        assert_eq!(default_post_index(), "post");
        assert_eq!(default_user_index(), "user");
        assert_eq!(default_storage_scheme(), "gs");
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_radius() {
        let mut config = test_config();
        config.search.default_radius_km = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "search.default_radius_km", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = test_config();
        config.search.cluster_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = test_config();
        config.auth.jwt_secret.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("auth.jwt_secret"))
        ));
    }
}
