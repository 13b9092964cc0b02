//! Episode Provider (§6): read-only access to the episode catalog.
//!
//! Two implementations are envisioned by the spec: file-backed (full
//! catalog in RAM) and document-store-backed (paginated queries). Only
//! the file-backed adapter ships here — a document-store adapter would
//! implement the same trait against a network collaborator, which is an
//! out-of-scope deployment concern (§1).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::Result;
use crate::model::Episode;

/// Read contract for the episode catalog (§6).
#[async_trait]
pub trait EpisodeProvider: Send + Sync {
    /// Page through the catalog, newest-first. When `episode_ids` is
    /// given, only those episodes are returned (order irrelevant); the
    /// other filters are ignored in that mode.
    async fn get_episodes(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        episode_ids: Option<&[String]>,
    ) -> Result<Vec<Episode>>;

    /// Fetch a single episode by `id` or `content_id`.
    async fn get_episode(&self, id_or_content_id: &str) -> Result<Option<Episode>>;

    /// A full `content_id -> Episode` map, for content-id-based
    /// engagement resolution (§6).
    async fn get_episode_by_content_id_map(&self) -> Result<HashMap<String, Episode>>;
}

/// An in-memory, file-backed catalog snapshot. The whole catalog lives
/// in RAM; reads are served from an `Arc<RwLock<...>>` snapshot so
/// concurrent requests share one copy (§5 "Config, strategy, and catalog
/// snapshots are immutable-per-request and freely shared").
#[derive(Debug, Clone)]
pub struct FileEpisodeProvider {
    episodes: Arc<RwLock<Vec<Episode>>>,
}

impl FileEpisodeProvider {
    /// Build a provider over an already-loaded catalog. Loading from disk
    /// (JSON parsing, path resolution) is left to the caller — this type
    /// only owns the in-memory representation, matching the "adapter
    /// conversion happens at the provider boundary" design note (§9).
    #[must_use]
    pub fn new(episodes: Vec<Episode>) -> Self {
        Self {
            episodes: Arc::new(RwLock::new(episodes)),
        }
    }

    /// Replace the catalog snapshot wholesale (e.g. after a batch
    /// reload). Does not affect snapshots already read by in-flight
    /// requests, which hold their own clone.
    pub fn replace(&self, episodes: Vec<Episode>) {
        *self.episodes.write() = episodes;
    }

    /// A read-only snapshot of the full catalog, newest-first, for
    /// callers (like the candidate retriever) that need to scan it
    /// directly rather than through the trait's paging API.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Episode> {
        let mut episodes = self.episodes.read().clone();
        episodes.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        episodes
    }
}

#[async_trait]
impl EpisodeProvider for FileEpisodeProvider {
    async fn get_episodes(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        episode_ids: Option<&[String]>,
    ) -> Result<Vec<Episode>> {
        if let Some(ids) = episode_ids {
            let wanted: std::collections::HashSet<&str> = ids.iter().map(String::as_str).collect();
            let episodes = self.episodes.read();
            return Ok(episodes
                .iter()
                .filter(|ep| {
                    wanted.contains(ep.id.as_str())
                        || ep
                            .content_id
                            .as_deref()
                            .is_some_and(|cid| wanted.contains(cid))
                })
                .cloned()
                .collect());
        }

        let mut episodes = self.snapshot();
        episodes.retain(|ep| {
            let after_since = since.is_none_or(|s| ep.published_at.is_some_and(|p| p >= s));
            let before_until = until.is_none_or(|u| ep.published_at.is_some_and(|p| p <= u));
            after_since && before_until
        });

        let offset = offset.unwrap_or(0);
        let episodes = if offset < episodes.len() {
            episodes.split_off(offset)
        } else {
            Vec::new()
        };
        Ok(match limit {
            Some(limit) => episodes.into_iter().take(limit).collect(),
            None => episodes,
        })
    }

    async fn get_episode(&self, id_or_content_id: &str) -> Result<Option<Episode>> {
        let episodes = self.episodes.read();
        Ok(episodes
            .iter()
            .find(|ep| ep.id == id_or_content_id || ep.content_id.as_deref() == Some(id_or_content_id))
            .cloned())
    }

    async fn get_episode_by_content_id_map(&self) -> Result<HashMap<String, Episode>> {
        let episodes = self.episodes.read();
        Ok(episodes
            .iter()
            .filter_map(|ep| ep.content_id.clone().map(|cid| (cid, ep.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Categories, Scores};
    use chrono::Duration;

    fn episode(id: &str, content_id: Option<&str>, days_old: i64) -> Episode {
        Episode {
            id: id.into(),
            content_id: content_id.map(str::to_string),
            title: format!("Episode {id}"),
            published_at: Some(Utc::now() - Duration::days(days_old)),
            scores: Scores::default(),
            series: None,
            categories: Categories::default(),
            key_insight: None,
        }
    }

    #[tokio::test]
    async fn get_episodes_orders_newest_first() {
        let provider = FileEpisodeProvider::new(vec![
            episode("old", None, 100),
            episode("new", None, 1),
        ]);
        let episodes = provider.get_episodes(None, None, None, None, None).await.unwrap();
        assert_eq!(episodes[0].id, "new");
        assert_eq!(episodes[1].id, "old");
    }

    #[tokio::test]
    async fn get_episodes_by_ids_ignores_other_filters() {
        let provider = FileEpisodeProvider::new(vec![
            episode("a", None, 1),
            episode("b", None, 2),
            episode("c", None, 3),
        ]);
        let ids = vec!["a".to_string(), "c".to_string()];
        let episodes = provider
            .get_episodes(None, None, None, None, Some(&ids))
            .await
            .unwrap();
        assert_eq!(episodes.len(), 2);
    }

    #[tokio::test]
    async fn get_episode_resolves_by_content_id() {
        let provider = FileEpisodeProvider::new(vec![episode("a", Some("alt"), 1)]);
        let found = provider.get_episode("alt").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().id, "a");
    }

    #[tokio::test]
    async fn get_episode_by_content_id_map_only_includes_episodes_with_content_id() {
        let provider = FileEpisodeProvider::new(vec![
            episode("a", Some("alt-a"), 1),
            episode("b", None, 2),
        ]);
        let map = provider.get_episode_by_content_id_map().await.unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("alt-a"));
    }

    #[tokio::test]
    async fn get_episodes_applies_limit_and_offset() {
        let provider = FileEpisodeProvider::new(vec![
            episode("a", None, 1),
            episode("b", None, 2),
            episode("c", None, 3),
        ]);
        let episodes = provider
            .get_episodes(Some(1), Some(1), None, None, None)
            .await
            .unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].id, "b");
    }
}
