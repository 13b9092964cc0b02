//! Stage A: the candidate retriever (§4.1). Gates the catalog by quality,
//! freshness, and exclusions, then truncates to `candidate_pool_size`
//! ordered by `quality_raw` descending — with a single-level freshness
//! widening when too few episodes survive.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::StageAConfig;
use crate::model::Episode;
use crate::scoring::days_since;

/// Does `episode` survive the Stage A gate at `freshness_window_days`?
fn admits(episode: &Episode, config: &StageAConfig, freshness_window_days: u32, excluded_ids: &HashSet<String>) -> bool {
    if episode.scores.credibility < config.credibility_floor {
        return false;
    }
    if episode.combined_score() < config.combined_floor {
        return false;
    }
    if days_since(episode.published_at, Utc::now()) > f64::from(freshness_window_days) {
        return false;
    }
    if episode.is_excluded(excluded_ids) {
        return false;
    }
    true
}

/// Run the gate once at a fixed freshness window; returns admitted
/// episodes sorted by `quality_raw` descending, *not yet* truncated.
fn run_gate<'a>(
    catalog: &'a [Episode],
    config: &StageAConfig,
    freshness_window_days: u32,
    excluded_ids: &HashSet<String>,
) -> Vec<&'a Episode> {
    let mut admitted: Vec<&Episode> = catalog
        .iter()
        .filter(|ep| admits(ep, config, freshness_window_days, excluded_ids))
        .collect();
    admitted.sort_by(|a, b| {
        b.quality_raw(config.credibility_multiplier)
            .partial_cmp(&a.quality_raw(config.credibility_multiplier))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    admitted
}

/// Retrieve the Stage A candidate pool from an in-memory catalog
/// snapshot (the non-ANN execution mode of §4.1; the ANN-pushed-down
/// mode is expressed by the Vector Store adapter issuing an equivalent
/// metadata-filtered query instead of calling this function).
///
/// Applies the single-level freshness-fallback widening: if fewer than
/// `candidate_pool_size / 2` episodes are admitted, re-runs once with
/// `freshness_window_days` promoted to the next threshold in
/// `[current, 60, 90]` (skipping thresholds that do not widen the
/// window). Never recurses further.
#[must_use]
pub fn retrieve_candidates<'a>(
    catalog: &'a [Episode],
    excluded_ids: &HashSet<String>,
    config: &StageAConfig,
    fallback_windows: &[u32],
) -> Vec<&'a Episode> {
    let admitted = run_gate(catalog, config, config.freshness_window_days, excluded_ids);
    let half_pool = config.candidate_pool_size / 2;

    let admitted = if admitted.len() < half_pool {
        let mut widened = admitted;
        for &window in fallback_windows {
            let retry = run_gate(catalog, config, window, excluded_ids);
            info!(
                previous_count = widened.len(),
                widened_window_days = window,
                retried_count = retry.len(),
                "freshness fallback widened window after too few candidates admitted"
            );
            widened = retry;
            break; // single-level widening only (§4.1, §9)
        }
        widened
    } else {
        admitted
    };

    debug!(admitted = admitted.len(), pool_size = config.candidate_pool_size, "stage A gate complete");
    admitted.into_iter().take(config.candidate_pool_size).collect()
}
