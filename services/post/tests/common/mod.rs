//! In-memory backends that evaluate queries the way the real index does.

#![allow(dead_code)]

use async_trait::async_trait;
use post_service::annotation::AnnotationError;
use post_service::object_store::ObjectStoreError;
use post_service::{FaceAnnotator, Location, ObjectStore, Post, PostQuery, SearchIndex, SearchIndexError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub const BUCKET: &str = "around-media";

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_public(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(format!("https://storage.googleapis.com/{BUCKET}/{key}"))
    }

    fn storage_uri(&self, key: &str) -> String {
        format!("gs://{BUCKET}/{key}")
    }

    fn bucket(&self) -> &str {
        BUCKET
    }
}

/// Annotator with a fixed answer
pub enum FixedAnnotator {
    Score(Option<f32>),
    Fail,
}

#[async_trait]
impl FaceAnnotator for FixedAnnotator {
    async fn score(&self, _image_uri: &str) -> Result<Option<f32>, AnnotationError> {
        match self {
            FixedAnnotator::Score(score) => Ok(*score),
            FixedAnnotator::Fail => Err(AnnotationError::Rejected {
                code: 13,
                message: "internal error".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct MemoryIndex {
    mappings: Mutex<HashMap<String, Value>>,
    create_calls: Mutex<usize>,
    documents: Mutex<HashMap<String, Vec<(String, Post)>>>,
}

impl MemoryIndex {
    pub fn mapping(&self, index: &str) -> Option<Value> {
        self.mappings.lock().unwrap().get(index).cloned()
    }

    pub fn create_calls(&self) -> usize {
        *self.create_calls.lock().unwrap()
    }

    pub fn get(&self, index: &str, id: &str) -> Option<Post> {
        self.documents
            .lock()
            .unwrap()
            .get(index)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| doc_id == id))
            .map(|(_, post)| post.clone())
    }

    pub fn count(&self, index: &str) -> usize {
        self.documents
            .lock()
            .unwrap()
            .get(index)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn matches(query: &PostQuery, post: &Post) -> Result<bool, SearchIndexError> {
    match query {
        PostQuery::GeoDistance {
            lat,
            lon,
            radius_km,
            ..
        } => Ok(Location::new(*lat, *lon).distance_km(&post.location) <= *radius_km),
        PostQuery::Range { field, gte } => match field.as_str() {
            "face" => Ok(f64::from(post.face) >= *gte),
            other => Err(SearchIndexError::Status {
                status: 400,
                body: format!("field [{other}] is not numeric"),
            }),
        },
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        Ok(self.mappings.lock().unwrap().contains_key(index))
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<(), SearchIndexError> {
        let mut mappings = self.mappings.lock().unwrap();
        if mappings.contains_key(index) {
            return Err(SearchIndexError::Status {
                status: 400,
                body: "resource_already_exists_exception".to_string(),
            });
        }
        mappings.insert(index.to_string(), body);
        *self.create_calls.lock().unwrap() += 1;
        Ok(())
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        post: &Post,
    ) -> Result<(), SearchIndexError> {
        let mut documents = self.documents.lock().unwrap();
        let docs = documents.entry(index.to_string()).or_default();
        // last write wins on the id
        docs.retain(|(doc_id, _)| doc_id != id);
        docs.push((id.to_string(), post.clone()));
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &PostQuery,
        size: i64,
    ) -> Result<Vec<Post>, SearchIndexError> {
        let documents = self.documents.lock().unwrap();
        let mut hits = Vec::new();
        for (_, post) in documents.get(index).into_iter().flatten() {
            if matches(query, post)? {
                hits.push(post.clone());
            }
        }
        hits.truncate(size.max(0) as usize);
        Ok(hits)
    }

    async fn ping(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }
}

/// Deterministic pseudo-random sequence in `[0, 1)`
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}
