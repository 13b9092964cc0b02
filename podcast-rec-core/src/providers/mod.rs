//! External collaborator traits (§6) and their file-backed
//! implementations. The pipeline is polymorphic over these via trait
//! objects, not a class hierarchy (§9) — a document-store- or
//! ANN-service-backed implementation plugs in behind the same trait
//! without the pipeline interior changing.

pub mod engagement_store;
pub mod episode_provider;
pub mod vector_store;

pub use engagement_store::{EngagementStore, InMemoryEngagementStore};
pub use episode_provider::{EpisodeProvider, FileEpisodeProvider};
pub use vector_store::{FileVectorStore, VectorStore, VectorStoreFilter};
