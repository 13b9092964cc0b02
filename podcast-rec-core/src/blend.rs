//! Blended scorer (§4.4): combines similarity, quality, and recency into
//! the final per-episode score and produces the initial, diversity-free
//! ranking.

use std::collections::HashMap;

use chrono::Utc;

use crate::config::RecommendationConfig;
use crate::model::{Episode, ScoredEpisode};
use crate::scoring::{days_since, quality_score, recency_score};
use crate::similarity::resolve_similarity;

/// Score every candidate and sort by `final_score` descending (§4.4
/// "Initial ordering"). The same blend formula applies regardless of
/// which user-vector case produced `user_vector`/`similarity_by_id`;
/// Case 1 simply inherits `similarity = 0.5` from the resolver.
#[must_use]
pub fn score_candidates(
    candidates: &[&Episode],
    config: &RecommendationConfig,
    similarity_by_id: Option<&HashMap<String, f64>>,
    user_vector: Option<&[f64]>,
    embeddings_by_episode_id: &HashMap<String, Vec<f64>>,
) -> Vec<ScoredEpisode> {
    let now = Utc::now();
    let mut scored: Vec<ScoredEpisode> = candidates
        .iter()
        .map(|episode| {
            let similarity =
                resolve_similarity(episode, similarity_by_id, user_vector, embeddings_by_episode_id);
            let quality = quality_score(episode, config.stage_b.credibility_multiplier);
            let recency = recency_score(
                days_since(episode.published_at, now),
                config.stage_b.recency_lambda,
            );
            let final_score = config.stage_b.weight_similarity * similarity
                + config.stage_b.weight_quality * quality
                + config.stage_b.weight_recency * recency;
            ScoredEpisode {
                episode: (*episode).clone(),
                similarity_score: similarity,
                quality_score: quality,
                recency_score: recency,
                final_score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}
