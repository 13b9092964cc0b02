//! Embedding strategy: the canonical text formula and the versioning
//! contract that keys the vector store's namespaces (§4.7, §6).
//!
//! `strategy_version` is opaque to this crate — it is whatever the caller
//! supplies when constructing a strategy, typically a hash or semantic
//! version of the canonical-text formula and the underlying model.
//! Changing it invalidates every namespace built under the old value;
//! this crate never migrates vectors across namespaces implicitly.

use crate::model::Episode;

/// Declares the embedding model/dimension pair a strategy targets, and
/// turns an episode into the canonical text fed to that model.
pub trait EmbeddingStrategy: Send + Sync {
    /// Opaque marker identifying this strategy's canonical-text formula
    /// and underlying model. Part of the vector-store namespace triple.
    fn strategy_version(&self) -> &str;

    /// The declared embedding model identifier (e.g. `"text-embedding-3-large"`).
    fn embedding_model(&self) -> &str;

    /// The declared embedding dimensionality, `D`.
    fn embedding_dimensions(&self) -> usize;

    /// Canonical embedding input text for an episode: `"{title}. {key_insight}"`,
    /// with no truncation, falling back to the episode id when both are
    /// empty (§6). Delegates to [`Episode::embedding_text`] so there is a
    /// single implementation of the formula.
    fn embed_text(&self, episode: &Episode) -> String {
        episode.embedding_text()
    }
}

/// The canonical embedding strategy: title + key insight, title-then-insight
/// fallback, id as last resort. This is the only strategy implementation
/// the ranking pipeline ships; alternate strategies are a deployment
/// concern (a different `strategy_version` + model pair), not a pipeline
/// concern.
#[derive(Debug, Clone)]
pub struct CanonicalEmbeddingStrategy {
    strategy_version: String,
    embedding_model: String,
    embedding_dimensions: usize,
}

impl CanonicalEmbeddingStrategy {
    /// Construct a strategy identified by `strategy_version`, targeting
    /// `embedding_model` at `embedding_dimensions`.
    #[must_use]
    pub fn new(
        strategy_version: impl Into<String>,
        embedding_model: impl Into<String>,
        embedding_dimensions: usize,
    ) -> Self {
        Self {
            strategy_version: strategy_version.into(),
            embedding_model: embedding_model.into(),
            embedding_dimensions,
        }
    }

    /// The default production strategy: `text-embedding-3-large` at
    /// `D=1536` (§3 "typical D=1536").
    #[must_use]
    pub fn default_v1() -> Self {
        Self::new("v1", "text-embedding-3-large", 1536)
    }
}

impl EmbeddingStrategy for CanonicalEmbeddingStrategy {
    fn strategy_version(&self) -> &str {
        &self.strategy_version
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn embedding_dimensions(&self) -> usize {
        self.embedding_dimensions
    }
}

/// The triple that namespaces a vector store: `(algorithm_version,
/// strategy_version, dataset_version)`. Embeddings built under different
/// triples are disjoint and never mixed (§4.7, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct VectorNamespace {
    /// Ranking-algorithm version (e.g. the scoring formula generation).
    pub algorithm_version: String,
    /// Embedding-strategy version (see [`EmbeddingStrategy::strategy_version`]).
    pub strategy_version: String,
    /// Version of the dataset the embeddings were built against.
    pub dataset_version: String,
}

impl VectorNamespace {
    /// Construct a namespace triple.
    #[must_use]
    pub fn new(
        algorithm_version: impl Into<String>,
        strategy_version: impl Into<String>,
        dataset_version: impl Into<String>,
    ) -> Self {
        Self {
            algorithm_version: algorithm_version.into(),
            strategy_version: strategy_version.into(),
            dataset_version: dataset_version.into(),
        }
    }
}

impl std::fmt::Display for VectorNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.algorithm_version, self.strategy_version, self.dataset_version
        )
    }
}
