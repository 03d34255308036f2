//! Around Post Service
//!
//! Accepts geotagged posts with optional media, stores the media in an
//! S3-compatible object store, scores images for face confidence, and makes
//! posts discoverable by radius search and by a confidence-threshold cluster
//! query over an Elasticsearch index.
//!
//! ## Architecture
//!
//! ```text
//!   POST /post            GET /search            GET /cluster
//!       │                     │                      │
//!       ▼                     ▼                      ▼
//! ┌──────────────┐     ┌──────────────┐      ┌──────────────┐
//! │ Ingestion    │     │ Geo Search   │      │ Cluster      │
//! │ Coordinator  │     │ Service      │      │ Query Svc    │
//! └──────────────┘     └──────────────┘      └──────────────┘
//!   │     │     │             │                      │
//!   │     │     └─────────────┼──────────┬───────────┘
//!   ▼     ▼                   ▼          ▼
//! ┌──────────┐ ┌───────────┐ ┌─────────────────────────┐
//! │ Object   │ │ Face      │ │ Search Index            │
//! │ Store    │ │ Annotator │ │ (post, user indices)    │
//! └──────────┘ └───────────┘ └─────────────────────────┘
//!                                        ▲
//!                              ┌──────────────────┐
//!                              │ Schema Manager   │ (startup)
//!                              └──────────────────┘
//! ```
//!
//! The publish sequence is upload → classify → annotate (images only) →
//! index. The blob key and the index document id are the same UUID.

pub mod annotation;
pub mod api;
pub mod auth;
pub mod cluster;
pub mod config;
pub mod error;
pub mod geo_search;
pub mod ingest;
pub mod models;
pub mod object_store;
pub mod schema;
pub mod search_index;

pub use annotation::{AnnotationError, FaceAnnotator, VisionAnnotator};
pub use api::{create_router, AppState};
pub use auth::{AuthUser, JwtValidator};
pub use cluster::{ClusterField, ClusterQueryService};
pub use config::Config;
pub use error::PostError;
pub use geo_search::GeoSearchService;
pub use ingest::IngestionCoordinator;
pub use models::{Location, MediaKind, MediaUpload, Post};
pub use object_store::{ObjectStore, ObjectStoreError, S3ObjectStore};
pub use schema::SchemaManager;
pub use search_index::{ElasticsearchIndex, PostQuery, SearchIndex, SearchIndexError};
