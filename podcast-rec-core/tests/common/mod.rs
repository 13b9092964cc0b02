//! Shared fixtures for black-box tests against `SessionManager`'s public
//! API (§8 end-to-end scenarios).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use podcast_rec_core::config::RecommendationConfig;
use podcast_rec_core::embedding_strategy::VectorNamespace;
use podcast_rec_core::model::{Categories, Episode, Scores, Series};
use podcast_rec_core::providers::vector_store::VectorMetadata;
use podcast_rec_core::providers::{
    FileEpisodeProvider, FileVectorStore, InMemoryEngagementStore, VectorStore,
};
use podcast_rec_core::session::SessionManager;

/// Build an episode with sane defaults, overridable per test.
pub fn episode(id: &str, credibility: u8, insight: u8, days_old: i64, series_id: Option<&str>) -> Episode {
    Episode {
        id: id.to_string(),
        content_id: None,
        title: format!("Episode {id}"),
        published_at: Some(Utc::now() - Duration::days(days_old)),
        scores: Scores {
            credibility,
            insight,
            information: 2,
            entertainment: 2,
        },
        series: series_id.map(|s| Series {
            id: s.to_string(),
            name: format!("Series {s}"),
        }),
        categories: Categories::default(),
        key_insight: Some(format!("{id} key insight")),
    }
}

/// As [`episode`], but with a primary category assigned.
pub fn episode_with_category(id: &str, category: &str, days_old: i64) -> Episode {
    let mut ep = episode(id, 4, 4, days_old, None);
    ep.categories = Categories {
        major: vec![category.to_string()],
        subcategories: vec![],
    };
    ep
}

/// A catalog of `n` episodes passing the default Stage A gates, spread
/// across `series_count` distinct series round-robin.
pub fn catalog_passing_gates(n: usize, series_count: usize) -> Vec<Episode> {
    (0..n)
        .map(|i| {
            let series = format!("series-{}", i % series_count.max(1));
            episode(&format!("ep{i}"), 4, 4, 5, Some(&series))
        })
        .collect()
}

/// A `SessionManager` over an in-memory catalog, no vector store (the
/// pure in-process cosine execution mode).
pub fn manager_without_vector_store(catalog: Vec<Episode>) -> SessionManager {
    manager_without_vector_store_with_config(catalog, RecommendationConfig::default())
}

pub fn manager_without_vector_store_with_config(
    catalog: Vec<Episode>,
    config: RecommendationConfig,
) -> SessionManager {
    let episodes = Arc::new(FileEpisodeProvider::new(catalog));
    let engagements = Arc::new(InMemoryEngagementStore::new());
    SessionManager::new(
        episodes,
        engagements,
        None,
        VectorNamespace::new("algo-v1", "embed-v1", "catalog-test"),
        config,
    )
}

/// A `SessionManager` with a populated `FileVectorStore`: every episode
/// in `embeddings` gets its vector and a `VectorMetadata` derived from
/// its own scores/`published_at`, so the ANN query's metadata filter
/// (credibility/combined/freshness, mirrored from Stage A) admits it.
/// This is the execution mode a real deployment uses once a namespace
/// has been built (§4.7) — personalized-similarity scenarios need it,
/// since `fetch_by_ids`/`query` are both served from this same store.
pub async fn manager_with_personalization(
    catalog: Vec<Episode>,
    embeddings: HashMap<String, Vec<f64>>,
    config: RecommendationConfig,
) -> SessionManager {
    let namespace = VectorNamespace::new("algo-v1", "embed-v1", "catalog-test");
    let store = FileVectorStore::new();

    let mut metadata = HashMap::new();
    for ep in &catalog {
        if embeddings.contains_key(&ep.id) {
            metadata.insert(
                ep.id.clone(),
                VectorMetadata {
                    credibility: Some(ep.scores.credibility),
                    combined_score: Some(ep.combined_score()),
                    published_at: ep.published_at.map(|t| t.timestamp()),
                },
            );
        }
    }
    store
        .upsert(&namespace, embeddings, Some(metadata))
        .await
        .unwrap();

    let store = Arc::new(store);
    let episodes = Arc::new(FileEpisodeProvider::new(catalog));
    let engagements = Arc::new(InMemoryEngagementStore::new());
    SessionManager::new(episodes, engagements, Some(store), namespace, config)
}
