//! Session lifecycle (§4.6): `CreateSession` runs the full ranking
//! pipeline once and persists the resulting queue; `LoadMore` and
//! `Engage` mutate a session without ever re-ranking it.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex as PlMutex;
use parking_lot::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::blend::score_candidates;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::cold_start::apply_cold_start_diversity;
use crate::config::RecommendationConfig;
use crate::diversity::select_with_series_diversity;
use crate::embedding_strategy::VectorNamespace;
use crate::error::{Dependency, Error, Result};
use crate::model::{Engagement, EngagementType, ScoredEpisode};
use crate::providers::vector_store::VectorStoreFilter;
use crate::providers::{EngagementStore, EpisodeProvider, VectorStore};
use crate::retrieval::retrieve_candidates;
use crate::user_vector::build_user_vector;
use crate::wire::{to_episode_card, EpisodeCard};

/// Default/maximum page sizes (§4.6).
pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Maximum items allowed in a single page.
pub const MAX_PAGE_SIZE: usize = 20;
/// Default session TTL (§5, §10).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Default hard cap on concurrent sessions (§5, §10).
pub const DEFAULT_SESSION_TABLE_CAP: usize = 10_000;

/// A category-anchor input for Case 3/4 (§4.2, §4.5). Supplied by an
/// upstream onboarding system, not constructed here (GLOSSARY).
#[derive(Debug, Clone)]
pub struct CategoryAnchorInput {
    /// The anchor vector itself.
    pub vector: Vec<f64>,
    /// Target categories used by cold-start diversity reshaping (§4.5).
    /// Ignored outside Case 3.
    pub target_categories: Vec<String>,
}

/// `CreateSession` request parameters (§6 "create_session").
#[derive(Debug, Clone, Default)]
pub struct CreateSessionRequest {
    /// Engagements supplied verbatim by the caller; superseded by stored
    /// history when `user_id` is set (§4.6 step 1).
    pub engagements: Vec<Engagement>,
    /// Episode ids to exclude outright, merged with engaged-episode ids.
    pub excluded_ids: HashSet<String>,
    /// The requesting user, if known.
    pub user_id: Option<String>,
    /// A category anchor, if the user has chosen onboarding categories.
    pub category_anchor: Option<CategoryAnchorInput>,
}

/// Per-request pre-computed queue (§3 "Session"). Immutable after
/// creation apart from the three fields `LoadMore`/`Engage` are allowed
/// to mutate.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session identifier.
    pub session_id: String,
    /// The fully ordered ranked queue.
    pub queue: Vec<ScoredEpisode>,
    /// Indices of `queue` already revealed to the caller.
    pub shown_indices: HashSet<usize>,
    /// Episode ids the user has engaged with during this session.
    pub engaged_ids: HashSet<String>,
    /// Episode ids excluded from all pages (request-supplied + engaged).
    pub excluded_ids: HashSet<String>,
    /// Whether this session had no personalization signal beyond a
    /// possible category anchor (Case 1 or Case 3).
    pub cold_start: bool,
    /// How many engagements contributed to the user vector.
    pub user_vector_episode_count: usize,
    /// Creation time; immutable.
    pub created_at: DateTime<Utc>,
    /// Last time this session was read or mutated; drives TTL eviction.
    pub last_accessed_at: DateTime<Utc>,
    /// Immutable config snapshot used to build this session's queue.
    pub config: RecommendationConfig,
}

impl Session {
    /// `shown_indices ∪ {not yet shown}` never exceeds `queue.len()`;
    /// this is the number of items not yet revealed.
    #[must_use]
    pub fn remaining_count(&self) -> usize {
        self.queue.len().saturating_sub(self.shown_indices.len())
    }
}

/// One page of results, returned by `CreateSession` and `LoadMore`
/// (§6 "episodes[]").
#[derive(Debug, Clone)]
pub struct Page {
    /// Session identifier.
    pub session_id: String,
    /// Episode cards for this page, in queue order.
    pub episodes: Vec<EpisodeCard>,
    /// Total number of items in the persisted queue.
    pub total_in_queue: usize,
    /// Number of items shown so far, including this page.
    pub shown_count: usize,
    /// Number of items not yet shown.
    pub remaining_count: usize,
    /// Whether the session had no personalization signal.
    pub cold_start: bool,
    /// Free-form debug payload (e.g. `user_vector_episode_count`).
    pub debug: SessionDebugInfo,
}

/// Debug metadata surfaced alongside a page (§6 "debug").
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionDebugInfo {
    /// How many engagements contributed to the user vector.
    pub user_vector_episode_count: usize,
}

/// Circuit breakers guarding each external collaborator (§5, §10).
struct Breakers {
    episode_provider: CircuitBreaker,
    engagement_store: CircuitBreaker,
    vector_store: CircuitBreaker,
}

impl Breakers {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            episode_provider: CircuitBreaker::new(Dependency::EpisodeProvider, config),
            engagement_store: CircuitBreaker::new(Dependency::EngagementStore, config),
            vector_store: CircuitBreaker::new(Dependency::VectorStore, config),
        }
    }
}

/// Orchestrates the ranking pipeline end to end and owns the in-memory
/// session table. The only process-wide mutable structure in this
/// crate (§9 "Global mutable state"); scoring code itself stays pure and
/// never sees the table.
pub struct SessionManager {
    episode_provider: Arc<dyn EpisodeProvider>,
    engagement_store: Arc<dyn EngagementStore>,
    vector_store: Option<Arc<dyn VectorStore>>,
    namespace: VectorNamespace,
    config: RecommendationConfig,
    sessions: RwLock<LruCache<String, Arc<PlMutex<Session>>>>,
    ttl: Duration,
    breakers: Breakers,
}

impl SessionManager {
    /// Construct a manager over the given collaborators and config.
    /// `vector_store` is optional: when absent, every request runs the
    /// in-memory Stage A + per-candidate cosine path (§4.1, §4.3
    /// "Execution mode").
    #[must_use]
    pub fn new(
        episode_provider: Arc<dyn EpisodeProvider>,
        engagement_store: Arc<dyn EngagementStore>,
        vector_store: Option<Arc<dyn VectorStore>>,
        namespace: VectorNamespace,
        config: RecommendationConfig,
    ) -> Self {
        Self::with_capacity(
            episode_provider,
            engagement_store,
            vector_store,
            namespace,
            config,
            DEFAULT_SESSION_TABLE_CAP,
            DEFAULT_SESSION_TTL,
        )
    }

    /// Construct a manager with explicit session-table bounds (§5, §10).
    #[must_use]
    pub fn with_capacity(
        episode_provider: Arc<dyn EpisodeProvider>,
        engagement_store: Arc<dyn EngagementStore>,
        vector_store: Option<Arc<dyn VectorStore>>,
        namespace: VectorNamespace,
        config: RecommendationConfig,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            episode_provider,
            engagement_store,
            vector_store,
            namespace,
            config,
            sessions: RwLock::new(LruCache::new(cap)),
            ttl,
            breakers: Breakers::new(CircuitBreakerConfig::default()),
        }
    }

    /// Run the full pipeline for one request and persist the resulting
    /// queue (§4.6 "CreateSession").
    ///
    /// # Errors
    ///
    /// Surfaces any collaborator failure (§7 "Dependency unavailable")
    /// or circuit-breaker rejection; never returns a partial pool.
    #[instrument(skip(self, request), fields(correlation_id = %Uuid::new_v4()))]
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<Page> {
        let engagements = self.resolve_engagements(&request).await?;

        let mut excluded_ids = request.excluded_ids.clone();
        for engagement in &engagements {
            excluded_ids.insert(engagement.episode_id.clone());
        }

        let catalog = self.fetch_catalog_snapshot().await?;
        let content_id_map = self.episode_provider.get_episode_by_content_id_map().await?;

        // Resolve engaged episode ids through the content-id map so an
        // engagement keyed by content_id still excludes the canonical id.
        for engagement in &engagements {
            if let Some(episode) = content_id_map.get(&engagement.episode_id) {
                excluded_ids.insert(episode.id.clone());
            }
        }

        let engaged_embedding_ids: Vec<String> =
            engagements.iter().map(|e| e.episode_id.clone()).collect();
        let embeddings_by_episode_id = self
            .fetch_embeddings(&engaged_embedding_ids, &catalog)
            .await?;

        let category_anchor_vector = request
            .category_anchor
            .as_ref()
            .map(|a| a.vector.as_slice());
        let user_vector_result = build_user_vector(
            &engagements,
            &embeddings_by_episode_id,
            &self.config.stage_b,
            &self.config.engagement_weights,
            category_anchor_vector,
        );

        // Case 3 (anchor only): no engagement contributed to the vector,
        // but a category anchor did, so cold-start diversity reshaping
        // still applies even though `user_vector_result.vector` is set.
        let is_case_three =
            user_vector_result.engagement_count == 0 && category_anchor_vector.is_some();
        let cold_start = user_vector_result.vector.is_none() || is_case_three;

        let (candidates, similarity_by_id) = self
            .retrieve_candidates(&catalog, &excluded_ids, user_vector_result.vector.as_deref())
            .await?;

        let embeddings_for_scoring = if similarity_by_id.is_some() {
            embeddings_by_episode_id
        } else {
            self.merge_candidate_embeddings(embeddings_by_episode_id, &candidates)
                .await?
        };

        let mut scored = score_candidates(
            &candidates.iter().collect::<Vec<_>>(),
            &self.config,
            similarity_by_id.as_ref(),
            user_vector_result.vector.as_deref(),
            &embeddings_for_scoring,
        );

        if is_case_three && self.config.category_anchor.cold_start_diversity_enabled {
            let target = request
                .category_anchor
                .as_ref()
                .map(|a| a.target_categories.clone())
                .unwrap_or_default();
            scored = apply_cold_start_diversity(scored, &target, &self.config.category_anchor);
        }

        let queue = select_with_series_diversity(scored, &self.config.series_diversity);

        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = Session {
            session_id: session_id.clone(),
            queue,
            shown_indices: HashSet::new(),
            engaged_ids: engagements.iter().map(|e| e.episode_id.clone()).collect(),
            excluded_ids,
            cold_start,
            user_vector_episode_count: user_vector_result.engagement_count,
            created_at: now,
            last_accessed_at: now,
            config: self.config.clone(),
        };

        info!(
            session_id = %session_id,
            queue_len = session.queue.len(),
            cold_start,
            "session created"
        );

        let session = Arc::new(PlMutex::new(session));
        self.insert_session(session_id.clone(), Arc::clone(&session));

        let page = Self::take_page(&session, DEFAULT_PAGE_SIZE);
        Ok(page)
    }

    /// Serve the next page of an existing session without re-ranking
    /// (§4.6 "LoadMore"). `limit` is clamped to `[1, MAX_PAGE_SIZE]`.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] if `session_id` is unknown or expired.
    #[instrument(skip(self), fields(correlation_id = %Uuid::new_v4()))]
    pub fn load_more(&self, session_id: &str, limit: usize) -> Result<Page> {
        let session = self.lookup_session(session_id)?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        Ok(Self::take_page(&session, limit))
    }

    /// Record an engagement against a session: adds the episode to
    /// `engaged_ids`/`excluded_ids` and delegates persistence to the
    /// Engagement Store (§4.6 "Engage"). Does not re-rank.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] if `session_id` is unknown or expired;
    /// otherwise surfaces the Engagement Store's failure.
    #[instrument(skip(self), fields(correlation_id = %Uuid::new_v4()))]
    pub async fn engage(
        &self,
        session_id: &str,
        episode_id: &str,
        engagement_type: EngagementType,
        user_id: Option<&str>,
        episode_title: Option<&str>,
        series_name: Option<&str>,
    ) -> Result<usize> {
        let session = self.lookup_session(session_id)?;
        let engaged_count = {
            let mut session = session.lock();
            session.engaged_ids.insert(episode_id.to_string());
            session.excluded_ids.insert(episode_id.to_string());
            session.last_accessed_at = Utc::now();
            session.engaged_ids.len()
        };

        self.call_engagement_store(|store| {
            let engagement_type = engagement_type.clone();
            Box::pin(async move {
                store
                    .record_engagement(
                        user_id,
                        episode_id,
                        engagement_type,
                        None,
                        episode_title,
                        series_name,
                    )
                    .await
            })
        })
        .await?;

        Ok(engaged_count)
    }

    fn take_page(session: &Arc<PlMutex<Session>>, limit: usize) -> Page {
        let mut session = session.lock();
        session.last_accessed_at = Utc::now();

        let mut cards = Vec::with_capacity(limit);
        let mut newly_shown = Vec::new();
        for (idx, scored) in session.queue.iter().enumerate() {
            if cards.len() >= limit {
                break;
            }
            if session.shown_indices.contains(&idx) {
                continue;
            }
            if session.engaged_ids.contains(&scored.episode.id)
                || scored
                    .episode
                    .content_id
                    .as_deref()
                    .is_some_and(|cid| session.engaged_ids.contains(cid))
            {
                continue;
            }
            cards.push(to_episode_card(scored, idx));
            newly_shown.push(idx);
        }
        for idx in newly_shown {
            session.shown_indices.insert(idx);
        }

        Page {
            session_id: session.session_id.clone(),
            episodes: cards,
            total_in_queue: session.queue.len(),
            shown_count: session.shown_indices.len(),
            remaining_count: session.remaining_count(),
            cold_start: session.cold_start,
            debug: SessionDebugInfo {
                user_vector_episode_count: session.user_vector_episode_count,
            },
        }
    }

    fn insert_session(&self, session_id: String, session: Arc<PlMutex<Session>>) {
        let mut sessions = self.sessions.write();
        if let Some((evicted_id, _)) = sessions.push(session_id, session) {
            warn!(session_id = %evicted_id, "session table at capacity; evicted oldest idle session");
        }
    }

    fn lookup_session(&self, session_id: &str) -> Result<Arc<PlMutex<Session>>> {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get(session_id).cloned() else {
            return Err(Error::SessionNotFound(session_id.to_string()));
        };
        let expired = {
            let guard = session.lock();
            Utc::now().signed_duration_since(guard.last_accessed_at)
                > chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero())
        };
        if expired {
            sessions.pop(session_id);
            return Err(Error::SessionNotFound(session_id.to_string()));
        }
        Ok(session)
    }

    async fn resolve_engagements(&self, request: &CreateSessionRequest) -> Result<Vec<Engagement>> {
        self.breakers.engagement_store.allow_request()?;
        match self
            .engagement_store
            .get_engagements_for_ranking(request.user_id.as_deref(), &request.engagements)
            .await
        {
            Ok(engagements) => {
                self.breakers.engagement_store.record_success();
                Ok(engagements)
            }
            Err(err) => {
                self.breakers.engagement_store.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn fetch_catalog_snapshot(&self) -> Result<Vec<crate::model::Episode>> {
        self.breakers.episode_provider.allow_request()?;
        match self
            .episode_provider
            .get_episodes(None, None, None, None, None)
            .await
        {
            Ok(episodes) => {
                self.breakers.episode_provider.record_success();
                Ok(episodes)
            }
            Err(err) => {
                self.breakers.episode_provider.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn fetch_embeddings(
        &self,
        ids: &[String],
        catalog: &[crate::model::Episode],
    ) -> Result<HashMap<String, Vec<f64>>> {
        let Some(store) = &self.vector_store else {
            return Ok(HashMap::new());
        };
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.breakers.vector_store.allow_request()?;
        match store.fetch_by_ids(&self.namespace, ids).await {
            Ok(mut found) => {
                self.breakers.vector_store.record_success();
                // Also index under content_id so callers that only know
                // the content_id still resolve (§4.2 "content-id fallback").
                for episode in catalog {
                    if let (Some(cid), Some(v)) = (
                        episode.content_id.as_ref(),
                        found.get(&episode.id).cloned(),
                    ) {
                        found.entry(cid.clone()).or_insert(v);
                    }
                }
                Ok(found)
            }
            Err(err) => {
                self.breakers.vector_store.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn merge_candidate_embeddings(
        &self,
        mut base: HashMap<String, Vec<f64>>,
        candidates: &[crate::model::Episode],
    ) -> Result<HashMap<String, Vec<f64>>> {
        let Some(store) = &self.vector_store else {
            return Ok(base);
        };
        let ids: Vec<String> = candidates
            .iter()
            .map(|ep| ep.id.clone())
            .filter(|id| !base.contains_key(id))
            .collect();
        if ids.is_empty() {
            return Ok(base);
        }
        self.breakers.vector_store.allow_request()?;
        match store.fetch_by_ids(&self.namespace, &ids).await {
            Ok(found) => {
                self.breakers.vector_store.record_success();
                base.extend(found);
                Ok(base)
            }
            Err(err) => {
                self.breakers.vector_store.record_failure(&err);
                Err(err)
            }
        }
    }

    /// Returns the candidate pool and, when an ANN query was issued, the
    /// `similarity_by_id` map it produced (§4.6 step 5).
    async fn retrieve_candidates(
        &self,
        catalog: &[crate::model::Episode],
        excluded_ids: &HashSet<String>,
        user_vector: Option<&[f64]>,
    ) -> Result<(
        Vec<crate::model::Episode>,
        Option<HashMap<String, f64>>,
    )> {
        let has_ann = match &self.vector_store {
            Some(store) => {
                self.breakers.vector_store.allow_request()?;
                match store.has_namespace(&self.namespace).await {
                    Ok(has) => {
                        self.breakers.vector_store.record_success();
                        has
                    }
                    Err(err) => {
                        self.breakers.vector_store.record_failure(&err);
                        return Err(err);
                    }
                }
            }
            None => false,
        };

        if has_ann {
            if let Some(user_vector) = user_vector {
                let store = self.vector_store.as_ref().unwrap();
                let cutoff = Utc::now()
                    - chrono::Duration::days(i64::from(self.config.stage_a.freshness_window_days));
                let mut filter_excluded: Vec<String> = excluded_ids.iter().cloned().collect();
                let overflow: Vec<String> = if filter_excluded.len()
                    > self.config.vector_store.excluded_ids_filter_cap
                {
                    filter_excluded.split_off(self.config.vector_store.excluded_ids_filter_cap)
                } else {
                    Vec::new()
                };
                let filter = VectorStoreFilter {
                    min_credibility: Some(self.config.stage_a.credibility_floor),
                    min_combined: Some(self.config.stage_a.combined_floor),
                    published_at_since: Some(cutoff.timestamp()),
                    excluded_ids: filter_excluded,
                };
                self.breakers.vector_store.allow_request()?;
                let ann_result = match store
                    .query(
                        &self.namespace,
                        user_vector,
                        self.config.vector_store.pinecone_query_top_k,
                        Some(&filter),
                    )
                    .await
                {
                    Ok(result) => {
                        self.breakers.vector_store.record_success();
                        result
                    }
                    Err(err) => {
                        self.breakers.vector_store.record_failure(&err);
                        return Err(err);
                    }
                };

                let overflow_set: HashSet<&str> = overflow.iter().map(String::as_str).collect();
                let ids: Vec<String> = ann_result
                    .iter()
                    .map(|(id, _)| id.clone())
                    .filter(|id| !overflow_set.contains(id.as_str()))
                    .collect();
                let similarity_by_id: HashMap<String, f64> = ann_result
                    .into_iter()
                    .filter(|(id, _)| !overflow_set.contains(id.as_str()))
                    .collect();

                self.breakers.episode_provider.allow_request()?;
                let mut episodes = match self
                    .episode_provider
                    .get_episodes(None, None, None, None, Some(&ids))
                    .await
                {
                    Ok(episodes) => {
                        self.breakers.episode_provider.record_success();
                        episodes
                    }
                    Err(err) => {
                        self.breakers.episode_provider.record_failure(&err);
                        return Err(err);
                    }
                };
                // The ANN query's top_k (pinecone_query_top_k) only feeds
                // `similarity_by_id`; the candidate pool itself is still the
                // Stage A pool bounded by `candidate_pool_size`, sorted by
                // `quality_raw` descending (§4.1, §5) — never the raw,
                // untruncated query result.
                episodes.sort_by(|a, b| {
                    b.quality_raw(self.config.stage_b.credibility_multiplier)
                        .partial_cmp(&a.quality_raw(self.config.stage_b.credibility_multiplier))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                episodes.truncate(self.config.stage_a.candidate_pool_size);
                return Ok((episodes, Some(similarity_by_id)));
            }
        }

        let fallback_windows = self.config.freshness_fallback_windows();
        let candidates = retrieve_candidates(catalog, excluded_ids, &self.config.stage_a, &fallback_windows)
            .into_iter()
            .cloned()
            .collect();
        Ok((candidates, None))
    }

    async fn call_engagement_store<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(
            &Arc<dyn EngagementStore>,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>,
    {
        self.breakers.engagement_store.allow_request()?;
        match f(&self.engagement_store).await {
            Ok(()) => {
                self.breakers.engagement_store.record_success();
                Ok(())
            }
            Err(err) => {
                self.breakers.engagement_store.record_failure(&err);
                Err(err)
            }
        }
    }
}
