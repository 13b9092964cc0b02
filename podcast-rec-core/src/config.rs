//! Recommendation pipeline configuration.
//!
//! The source system parses this from nested JSON with optional keys
//! grouped as `stage_a`, `stage_b`, `engagement_weights`, `category_anchor`,
//! and `series_diversity`. Here each group is a typed sub-struct with a
//! `Default` impl documenting the production default for every field;
//! [`RecommendationConfig::from_groups`] assembles them and runs fail-fast
//! validation. A config that fails validation is never used to serve a
//! request (§7) — construction returns `Err`, not a clamped-and-warned
//! best effort.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::EngagementType;

/// Stage A (candidate retrieval) knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAConfig {
    /// Minimum credibility score to admit an episode (0-4 scale).
    pub credibility_floor: u8,
    /// Minimum `credibility + insight` to admit an episode.
    pub combined_floor: u16,
    /// Episodes older than this many days are gated out (absent a
    /// freshness-fallback widening).
    pub freshness_window_days: u32,
    /// Maximum size of the Stage A candidate pool.
    pub candidate_pool_size: usize,
}

impl Default for StageAConfig {
    fn default() -> Self {
        Self {
            credibility_floor: 2,
            combined_floor: 5,
            freshness_window_days: 90,
            candidate_pool_size: 150,
        }
    }
}

/// Stage B (blended scoring) knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct StageBConfig {
    /// Newest-N engagements retained for user-vector construction.
    pub user_vector_limit: usize,
    /// Weight on the similarity term of the final blend.
    pub weight_similarity: f64,
    /// Weight on the quality term of the final blend.
    pub weight_quality: f64,
    /// Weight on the recency term of the final blend.
    pub weight_recency: f64,
    /// Multiplier applied to `credibility` in the quality-raw formula.
    pub credibility_multiplier: f64,
    /// Decay rate `lambda` in `recency = exp(-lambda * days_since)`.
    pub recency_lambda: f64,
    /// Weight on a category-anchor vector when blended with the
    /// engagement mean (Case 4).
    pub category_anchor_weight: f64,
}

impl Default for StageBConfig {
    fn default() -> Self {
        Self {
            user_vector_limit: 10,
            weight_similarity: 0.55,
            weight_quality: 0.30,
            weight_recency: 0.15,
            credibility_multiplier: 1.5,
            recency_lambda: 0.03,
            category_anchor_weight: 0.15,
        }
    }
}

/// Per-engagement-type weights used when averaging engagement embeddings
/// into a user vector. A type absent from this map (including any
/// `EngagementType::Other`) defaults to 1.0 (§4.2, §9) — the type list is
/// never silently extended with a bespoke weight.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementWeightsConfig {
    /// Weight for `EngagementType::Bookmark`.
    pub bookmark: f64,
    /// Weight for `EngagementType::Click`.
    pub click: f64,
}

impl Default for EngagementWeightsConfig {
    fn default() -> Self {
        Self {
            bookmark: 2.0,
            click: 1.0,
        }
    }
}

impl EngagementWeightsConfig {
    /// Look up the configured weight for an engagement type, defaulting to
    /// 1.0 for anything not explicitly configured.
    #[must_use]
    pub fn weight_for(&self, engagement_type: &EngagementType) -> f64 {
        match engagement_type {
            EngagementType::Bookmark => self.bookmark,
            EngagementType::Click => self.click,
            EngagementType::Listen | EngagementType::View | EngagementType::Other => 1.0,
        }
    }
}

/// Cold-start category-diversity knobs (§4.5). Only consulted in Case 3.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAnchorConfig {
    /// Whether cold-start category diversity reshaping is enabled.
    pub cold_start_diversity_enabled: bool,
    /// Size of the top slot reshaped to guarantee category coverage.
    pub cold_start_top_n: usize,
    /// Minimum items to take from each target category's bucket.
    pub cold_start_min_per_category: usize,
}

impl Default for CategoryAnchorConfig {
    fn default() -> Self {
        Self {
            cold_start_diversity_enabled: false,
            cold_start_top_n: 10,
            cold_start_min_per_category: 2,
        }
    }
}

/// Series-diversity selection knobs (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDiversityConfig {
    /// Hard cap on episodes from the same series in the output.
    pub max_episodes_per_series: usize,
    /// Exponential penalty base applied per prior pick from a series;
    /// must be in `(0, 1]`.
    pub series_penalty_alpha: f64,
    /// Whether two adjacent output positions may share a series.
    pub no_adjacent_same_series: bool,
}

impl Default for SeriesDiversityConfig {
    fn default() -> Self {
        Self {
            max_episodes_per_series: 2,
            series_penalty_alpha: 0.7,
            no_adjacent_same_series: true,
        }
    }
}

/// Vector-store query knobs. These fold into the `stage_a`/`stage_b`
/// groups for construction purposes (§10) but are kept as a distinct
/// sub-struct because they describe the ANN collaborator, not scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStoreConfig {
    /// `top_k` requested from the ANN query.
    pub pinecone_query_top_k: usize,
    /// Maximum number of excluded ids pushed into a single ANN query
    /// filter; overflow is applied as a post-filter.
    pub excluded_ids_filter_cap: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            pinecone_query_top_k: 250,
            excluded_ids_filter_cap: 10_000,
        }
    }
}

/// Tolerance for the Stage B weight-sum invariant.
pub const WEIGHT_SUM_EPSILON: f64 = 0.01;

/// The full, validated set of tunables for one ranking request. Immutable
/// once constructed; a [`crate::model::Session`] snapshots this at
/// `CreateSession` time.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationConfig {
    /// Candidate-retrieval knobs.
    pub stage_a: StageAConfig,
    /// Blended-scoring knobs.
    pub stage_b: StageBConfig,
    /// Per-engagement-type weights.
    pub engagement_weights: EngagementWeightsConfig,
    /// Cold-start category-diversity knobs.
    pub category_anchor: CategoryAnchorConfig,
    /// Series-diversity knobs.
    pub series_diversity: SeriesDiversityConfig,
    /// Vector-store query knobs.
    pub vector_store: VectorStoreConfig,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            stage_a: StageAConfig::default(),
            stage_b: StageBConfig::default(),
            engagement_weights: EngagementWeightsConfig::default(),
            category_anchor: CategoryAnchorConfig::default(),
            series_diversity: SeriesDiversityConfig::default(),
            vector_store: VectorStoreConfig::default(),
        }
    }
}

impl RecommendationConfig {
    /// Assemble a config from its named groups and validate it.
    ///
    /// Any group left `None` falls back to that group's `Default`. This
    /// mirrors the source system's dynamic-dict-with-optional-keys
    /// loading (§9) while keeping the pipeline interior typed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if the Stage B weights do not sum
    /// to 1.0 within [`WEIGHT_SUM_EPSILON`], or if any bounded parameter
    /// is out of range.
    pub fn from_groups(
        stage_a: Option<StageAConfig>,
        stage_b: Option<StageBConfig>,
        engagement_weights: Option<EngagementWeightsConfig>,
        category_anchor: Option<CategoryAnchorConfig>,
        series_diversity: Option<SeriesDiversityConfig>,
        vector_store: Option<VectorStoreConfig>,
    ) -> Result<Self> {
        let config = Self {
            stage_a: stage_a.unwrap_or_default(),
            stage_b: stage_b.unwrap_or_default(),
            engagement_weights: engagement_weights.unwrap_or_default(),
            category_anchor: category_anchor.unwrap_or_default(),
            series_diversity: series_diversity.unwrap_or_default(),
            vector_store: vector_store.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every invariant called out in §3/§7. Fatal at load time;
    /// never clamps a value and continues.
    pub fn validate(&self) -> Result<()> {
        let sum =
            self.stage_b.weight_similarity + self.stage_b.weight_quality + self.stage_b.weight_recency;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(Error::ConfigInvalid(format!(
                "stage_b weights must sum to 1.0 (+/- {WEIGHT_SUM_EPSILON}), got {sum}"
            )));
        }
        if !(0.0..=1.0).contains(&self.stage_b.category_anchor_weight) {
            return Err(Error::ConfigInvalid(format!(
                "category_anchor_weight must be in [0, 1], got {}",
                self.stage_b.category_anchor_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.series_diversity.series_penalty_alpha)
            || self.series_diversity.series_penalty_alpha <= 0.0
        {
            return Err(Error::ConfigInvalid(format!(
                "series_penalty_alpha must be in (0, 1], got {}",
                self.series_diversity.series_penalty_alpha
            )));
        }
        if self.stage_a.candidate_pool_size == 0 {
            return Err(Error::ConfigInvalid(
                "candidate_pool_size must be positive".into(),
            ));
        }
        if self.stage_a.combined_floor < u16::from(self.stage_a.credibility_floor) {
            return Err(Error::ConfigInvalid(
                "combined_floor must be at least credibility_floor".into(),
            ));
        }
        if self.series_diversity.max_episodes_per_series == 0 {
            return Err(Error::ConfigInvalid(
                "max_episodes_per_series must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The freshness-window widening sequence for the Stage A fallback
    /// (§4.1, §9 Open Questions): `[current, 60, 90]`, skipping any
    /// threshold not strictly greater than the current window. A single
    /// widening step only — never unbounded recursion.
    #[must_use]
    pub fn freshness_fallback_windows(&self) -> Vec<u32> {
        let current = self.stage_a.freshness_window_days;
        [60u32, 90u32]
            .into_iter()
            .filter(|w| *w > current)
            .collect()
    }
}

/// A fixed engagement-type → weight map, for callers that want to
/// construct an [`EngagementWeightsConfig`]-equivalent lookup without the
/// named fields (e.g. when round-tripping a dynamic config document).
#[must_use]
pub fn engagement_weight_map(config: &EngagementWeightsConfig) -> HashMap<EngagementType, f64> {
    let mut map = HashMap::new();
    map.insert(EngagementType::Bookmark, config.bookmark);
    map.insert(EngagementType::Click, config.click);
    map
}
