#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

//! # podcast-rec-core
//!
//! The two-stage candidate-retrieval-and-ranking pipeline behind a
//! podcast episode recommendation feed.
//!
//! ## Pipeline stages
//!
//! - [`retrieval`] (Stage A): gates the catalog by credibility, combined
//!   quality, freshness, and exclusions, with a single-level freshness
//!   fallback when too few candidates survive.
//! - [`user_vector`]: collapses engagement history and an optional
//!   category anchor into at most one query vector per request.
//! - [`similarity`]: resolves a per-candidate similarity scalar, falling
//!   back to cosine similarity and then to a neutral constant.
//! - [`blend`] (Stage B): combines similarity, quality, and recency into
//!   a final per-episode score.
//! - [`cold_start`]: reshapes the top slot for category coverage when a
//!   request has only a category anchor to go on.
//! - [`diversity`]: greedy, per-slot series-diversity selection over the
//!   blended ranking.
//! - [`session`]: orchestrates the stages above into `CreateSession`,
//!   `LoadMore`, and `Engage`, and owns the TTL/LRU session table.
//!
//! ## Collaborators
//!
//! The pipeline is polymorphic over three external collaborators
//! ([`providers::EpisodeProvider`], [`providers::EngagementStore`],
//! [`providers::VectorStore`]), each wrapped by a [`circuit_breaker`] in
//! [`session::SessionManager`]. File-backed in-memory implementations of
//! all three ship in [`providers`]; a networked deployment swaps in its
//! own implementation behind the same trait.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use podcast_rec_core::config::RecommendationConfig;
//! use podcast_rec_core::embedding_strategy::VectorNamespace;
//! use podcast_rec_core::providers::{FileEpisodeProvider, InMemoryEngagementStore};
//! use podcast_rec_core::session::{CreateSessionRequest, SessionManager};
//!
//! # async fn example() -> podcast_rec_core::error::Result<()> {
//! let episodes = Arc::new(FileEpisodeProvider::new(vec![]));
//! let engagements = Arc::new(InMemoryEngagementStore::new());
//! let namespace = VectorNamespace::new("v1", "v1", "catalog-2026-01");
//! let manager = SessionManager::new(
//!     episodes,
//!     engagements,
//!     None,
//!     namespace,
//!     RecommendationConfig::default(),
//! );
//!
//! let page = manager.create_session(CreateSessionRequest::default()).await?;
//! println!("queue has {} episodes", page.total_in_queue);
//! # Ok(())
//! # }
//! ```

pub mod blend;
pub mod circuit_breaker;
pub mod cold_start;
pub mod config;
pub mod diversity;
pub mod embedding_strategy;
pub mod error;
pub mod model;
pub mod providers;
pub mod retrieval;
pub mod scoring;
pub mod session;
pub mod similarity;
pub mod user_vector;
pub mod wire;

pub use config::RecommendationConfig;
pub use error::{Error, Result};
pub use model::{Categories, Engagement, EngagementType, Episode, ScoredEpisode, Scores, Series};
pub use session::{CreateSessionRequest, Page, Session, SessionManager};
pub use wire::{derive_badges, to_episode_card, Badge, EpisodeCard};
