//! Vector Store (§6, §4.7): namespaced ANN query / fetch-by-id adapter.
//!
//! A file-backed implementation ships here; a real ANN service (Pinecone
//! or equivalent) is an out-of-scope deployment concern (§1) that would
//! implement the same trait over network I/O, including the batching
//! and fork-join fan-out described in §5.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::debug;

use crate::embedding_strategy::VectorNamespace;
use crate::error::Result;
use crate::scoring::cosine_similarity;

/// Batch size used by `fetch_by_ids` against a network-backed store
/// (§4.6, §6): never one-shot-fetch all ids.
pub const FETCH_BATCH_SIZE: usize = 100;

/// Bounded fan-out for concurrent batch fetches (§5).
pub const MAX_IN_FLIGHT_BATCHES: usize = 8;

/// Cap on exclusion-set ids pushed into a single ANN query filter; the
/// remainder is applied as a post-filter by the caller (§4.6, §6).
pub const EXCLUDED_IDS_FILTER_CAP: usize = 10_000;

/// The AND-of-predicates metadata filter pushed down to `query` (§6).
#[derive(Debug, Clone, Default)]
pub struct VectorStoreFilter {
    /// Minimum credibility.
    pub min_credibility: Option<u8>,
    /// Minimum `credibility + insight`.
    pub min_combined: Option<u16>,
    /// Minimum `published_at`, as a unix timestamp.
    pub published_at_since: Option<i64>,
    /// Ids to exclude, capped at [`EXCLUDED_IDS_FILTER_CAP`] for the
    /// purposes of this filter; overflow must be post-filtered by the
    /// caller.
    pub excluded_ids: Vec<String>,
}

/// Upsert-time metadata attached to a vector (§6): used to satisfy
/// `VectorStoreFilter` predicates without re-fetching the episode.
#[derive(Debug, Clone, Default)]
pub struct VectorMetadata {
    /// Episode credibility score.
    pub credibility: Option<u8>,
    /// `credibility + insight`.
    pub combined_score: Option<u16>,
    /// Publication timestamp as unix seconds.
    pub published_at: Option<i64>,
}

/// Namespaced ANN read/write contract (§6, §4.7).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether embeddings have been built for this namespace triple at
    /// all. Pipeline code must check this before relying on ANN query
    /// results (§4.7).
    async fn has_namespace(&self, namespace: &VectorNamespace) -> Result<bool>;

    /// Batch-upsert vectors (and optional per-vector metadata) into a
    /// namespace.
    async fn upsert(
        &self,
        namespace: &VectorNamespace,
        vectors: HashMap<String, Vec<f64>>,
        metadata: Option<HashMap<String, VectorMetadata>>,
    ) -> Result<()>;

    /// Fetch vectors by id, batched at [`FETCH_BATCH_SIZE`] per call,
    /// with up to [`MAX_IN_FLIGHT_BATCHES`] batches in flight
    /// concurrently (§5).
    async fn fetch_by_ids(
        &self,
        namespace: &VectorNamespace,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<f64>>>;

    /// ANN query: `top_k` nearest neighbors to `vector`, optionally
    /// filtered, returned as `(episode_id, score)` pairs with scores
    /// cosine-derived and normalized to `[0, 1]`.
    async fn query(
        &self,
        namespace: &VectorNamespace,
        vector: &[f64],
        top_k: usize,
        filter: Option<&VectorStoreFilter>,
    ) -> Result<Vec<(String, f64)>>;
}

#[derive(Debug, Default, Clone)]
struct NamespaceData {
    vectors: HashMap<String, Vec<f64>>,
    metadata: HashMap<String, VectorMetadata>,
}

/// A manifest recorded per namespace so operators can audit which build
/// produced which vectors (§4.7).
#[derive(Debug, Clone)]
pub struct NamespaceManifest {
    /// The namespace this manifest describes.
    pub namespace: VectorNamespace,
    /// Declared embedding model for this build.
    pub embedding_model: String,
    /// Declared embedding dimensionality for this build.
    pub embedding_dimensions: usize,
    /// When this namespace was first populated.
    pub created_at: DateTime<Utc>,
    /// Number of episodes embedded under this namespace.
    pub episode_count: usize,
}

/// A file-backed (in-memory) `VectorStore`. Namespaces are fully
/// disjoint maps; nothing is ever compared or migrated across them
/// (§4.7 "namespaces never interleave").
#[derive(Debug, Default)]
pub struct FileVectorStore {
    namespaces: Arc<RwLock<HashMap<VectorNamespace, NamespaceData>>>,
    manifests: Arc<RwLock<HashMap<VectorNamespace, NamespaceManifest>>>,
}

impl FileVectorStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a namespace's manifest — `embedding_model`,
    /// `embedding_dimensions`, `created_at`, `episode_count` — typically
    /// called by the offline embedding-generation job (out of scope,
    /// §1) after an `upsert` batch.
    pub fn record_manifest(
        &self,
        namespace: VectorNamespace,
        embedding_model: impl Into<String>,
        embedding_dimensions: usize,
        created_at: DateTime<Utc>,
        episode_count: usize,
    ) {
        self.manifests.write().insert(
            namespace.clone(),
            NamespaceManifest {
                namespace,
                embedding_model: embedding_model.into(),
                embedding_dimensions,
                created_at,
                episode_count,
            },
        );
    }

    /// The manifest for a namespace, if one has been recorded.
    #[must_use]
    pub fn manifest(&self, namespace: &VectorNamespace) -> Option<NamespaceManifest> {
        self.manifests.read().get(namespace).cloned()
    }

    fn matches_filter(metadata: Option<&VectorMetadata>, filter: &VectorStoreFilter, id: &str) -> bool {
        if filter.excluded_ids.iter().any(|excluded| excluded == id) {
            return false;
        }
        let Some(metadata) = metadata else {
            return filter.min_credibility.is_none()
                && filter.min_combined.is_none()
                && filter.published_at_since.is_none();
        };
        if let Some(floor) = filter.min_credibility {
            if metadata.credibility.unwrap_or(0) < floor {
                return false;
            }
        }
        if let Some(floor) = filter.min_combined {
            if metadata.combined_score.unwrap_or(0) < floor {
                return false;
            }
        }
        if let Some(since) = filter.published_at_since {
            if metadata.published_at.unwrap_or(0) < since {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn has_namespace(&self, namespace: &VectorNamespace) -> Result<bool> {
        Ok(self.namespaces.read().contains_key(namespace))
    }

    async fn upsert(
        &self,
        namespace: &VectorNamespace,
        vectors: HashMap<String, Vec<f64>>,
        metadata: Option<HashMap<String, VectorMetadata>>,
    ) -> Result<()> {
        let mut namespaces = self.namespaces.write();
        let entry = namespaces.entry(namespace.clone()).or_default();
        entry.vectors.extend(vectors);
        if let Some(metadata) = metadata {
            entry.metadata.extend(metadata);
        }
        Ok(())
    }

    async fn fetch_by_ids(
        &self,
        namespace: &VectorNamespace,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<f64>>> {
        let data = self.namespaces.read().get(namespace).cloned().unwrap_or_default();
        let batches: Vec<&[String]> = ids.chunks(FETCH_BATCH_SIZE).collect();
        debug!(
            namespace = %namespace,
            total_ids = ids.len(),
            batches = batches.len(),
            "fetching embeddings in batches"
        );

        let fetch_one = |batch: &[String]| {
            let data = data.clone();
            let batch = batch.to_vec();
            async move {
                batch
                    .into_iter()
                    .filter_map(|id| data.vectors.get(&id).cloned().map(|v| (id, v)))
                    .collect::<Vec<_>>()
            }
        };

        let mut results = HashMap::new();
        for chunk_of_batches in batches.chunks(MAX_IN_FLIGHT_BATCHES) {
            let futures = chunk_of_batches.iter().map(|batch| fetch_one(batch));
            for found in join_all(futures).await {
                results.extend(found);
            }
        }
        Ok(results)
    }

    async fn query(
        &self,
        namespace: &VectorNamespace,
        vector: &[f64],
        top_k: usize,
        filter: Option<&VectorStoreFilter>,
    ) -> Result<Vec<(String, f64)>> {
        let namespaces = self.namespaces.read();
        let Some(data) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(String, f64)> = data
            .vectors
            .iter()
            .filter(|(id, _)| {
                filter.is_none_or(|f| Self::matches_filter(data.metadata.get(*id), f, id))
            })
            .map(|(id, candidate)| (id.clone(), cosine_similarity(vector, candidate).clamp(0.0, 1.0)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> VectorNamespace {
        VectorNamespace::new("algo-1", "v1", "ds-1")
    }

    #[tokio::test]
    async fn has_namespace_is_false_until_upsert() {
        let store = FileVectorStore::new();
        assert!(!store.has_namespace(&ns()).await.unwrap());
        store
            .upsert(&ns(), HashMap::from([("a".to_string(), vec![1.0])]), None)
            .await
            .unwrap();
        assert!(store.has_namespace(&ns()).await.unwrap());
    }

    #[tokio::test]
    async fn fetch_by_ids_batches_and_returns_all_found() {
        let store = FileVectorStore::new();
        let vectors: HashMap<String, Vec<f64>> = (0..250)
            .map(|i| (i.to_string(), vec![i as f64]))
            .collect();
        store.upsert(&ns(), vectors, None).await.unwrap();
        let ids: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        let result = store.fetch_by_ids(&ns(), &ids).await.unwrap();
        assert_eq!(result.len(), 250);
    }

    #[tokio::test]
    async fn query_returns_top_k_sorted_by_similarity() {
        let store = FileVectorStore::new();
        store
            .upsert(
                &ns(),
                HashMap::from([
                    ("a".to_string(), vec![1.0, 0.0]),
                    ("b".to_string(), vec![0.0, 1.0]),
                    ("c".to_string(), vec![0.9, 0.1]),
                ]),
                None,
            )
            .await
            .unwrap();
        let result = store.query(&ns(), &[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].0, "a");
    }

    #[tokio::test]
    async fn query_applies_metadata_filter() {
        let store = FileVectorStore::new();
        store
            .upsert(
                &ns(),
                HashMap::from([
                    ("low".to_string(), vec![1.0]),
                    ("high".to_string(), vec![1.0]),
                ]),
                Some(HashMap::from([
                    (
                        "low".to_string(),
                        VectorMetadata {
                            credibility: Some(1),
                            ..Default::default()
                        },
                    ),
                    (
                        "high".to_string(),
                        VectorMetadata {
                            credibility: Some(4),
                            ..Default::default()
                        },
                    ),
                ])),
            )
            .await
            .unwrap();
        let filter = VectorStoreFilter {
            min_credibility: Some(2),
            ..Default::default()
        };
        let result = store.query(&ns(), &[1.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, "high");
    }

    #[tokio::test]
    async fn query_excludes_ids_in_the_exclusion_filter() {
        let store = FileVectorStore::new();
        store
            .upsert(
                &ns(),
                HashMap::from([("a".to_string(), vec![1.0]), ("b".to_string(), vec![1.0])]),
                None,
            )
            .await
            .unwrap();
        let filter = VectorStoreFilter {
            excluded_ids: vec!["a".to_string()],
            ..Default::default()
        };
        let result = store.query(&ns(), &[1.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, "b");
    }

    #[tokio::test]
    async fn query_on_unknown_namespace_returns_empty() {
        let store = FileVectorStore::new();
        let result = store.query(&ns(), &[1.0], 10, None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn manifest_round_trips() {
        let store = FileVectorStore::new();
        store.record_manifest(ns(), "text-embedding-3-large", 1536, Utc::now(), 42);
        let manifest = store.manifest(&ns()).unwrap();
        assert_eq!(manifest.episode_count, 42);
        assert_eq!(manifest.embedding_dimensions, 1536);
    }
}
