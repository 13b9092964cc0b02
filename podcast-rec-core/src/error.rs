//! Error taxonomy for the recommendation pipeline.

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which external collaborator a dependency failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// The episode catalog.
    EpisodeProvider,
    /// The per-user engagement history store.
    EngagementStore,
    /// The ANN vector index.
    VectorStore,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EpisodeProvider => "episode provider",
            Self::EngagementStore => "engagement store",
            Self::VectorStore => "vector store",
        };
        write!(f, "{s}")
    }
}

/// Error types for the recommendation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `RecommendationConfig` failed validation at construction time (weight sum,
    /// out-of-range parameter). Fatal: the config that produced this must never
    /// be used to serve a request.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// A collaborator call failed outright (connection refused, 5xx, malformed
    /// response). Surfaces as a request failure; the pipeline never retries.
    #[error("{dependency} unavailable: {reason}")]
    DependencyUnavailable {
        /// Which collaborator failed.
        dependency: Dependency,
        /// Human-readable reason.
        reason: String,
    },

    /// A collaborator call exceeded its configured timeout.
    #[error("{dependency} timed out after {elapsed_ms}ms")]
    DependencyTimeout {
        /// Which collaborator timed out.
        dependency: Dependency,
        /// How long the call ran before being abandoned.
        elapsed_ms: u64,
    },

    /// The circuit breaker protecting a dependency is open; the call was
    /// rejected without being attempted.
    #[error("circuit breaker open for {0}")]
    CircuitBreakerOpen(Dependency),

    /// `LoadMore` / `Engage` referenced a session id that does not exist (or
    /// has been evicted). Distinct from a dependency failure; never a 5xx.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The request was cancelled before it completed; no partial session was
    /// persisted.
    #[error("request cancelled")]
    Cancelled,

    /// Case 4 of the user-vector builder found the engagement mean and the
    /// category anchor at different dimensions; the engagement mean is
    /// returned unblended and this is logged as a warning, not propagated —
    /// kept as a distinct variant so callers that want to surface the event
    /// themselves (e.g. in a debug payload) can match on it.
    #[error("user vector dimension mismatch: engagement mean has {engagement_dim}, category anchor has {anchor_dim}")]
    DimensionMismatch {
        /// Dimension of the engagement-mean vector.
        engagement_dim: usize,
        /// Dimension of the category-anchor vector.
        anchor_dim: usize,
    },

    /// A value failed basic structural validation (e.g. `limit` out of the
    /// allowed range, an empty vector where one is required).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// JSON (de)serialization failure, e.g. reading a file-backed catalog.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O failure, e.g. reading a file-backed catalog or vector
    /// store manifest.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the transport layer might reasonably retry the whole request.
    ///
    /// The pipeline itself never retries (see the concurrency model); this
    /// classification exists purely for callers above the pipeline.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DependencyUnavailable { .. }
                | Error::DependencyTimeout { .. }
                | Error::CircuitBreakerOpen(_)
        )
    }

    /// Whether this error should ever surface as a 5xx-shaped response.
    ///
    /// `SessionNotFound` and `InvalidInput` are client errors and must not be
    /// treated as server failures by a transport layer.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::SessionNotFound(_) | Error::InvalidInput(_))
    }
}
