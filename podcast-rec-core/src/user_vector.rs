//! User-vector construction (§4.2): engagements plus an optional category
//! anchor collapse into at most one query vector per request.

use std::collections::HashMap;

use tracing::warn;

use crate::config::{EngagementWeightsConfig, StageBConfig};
use crate::model::Engagement;
use crate::scoring::l2_normalize;

/// The result of building a user vector, distinguishing the no-signal
/// case from a real vector so the caller can set `cold_start` and
/// `user_vector_episode_count` correctly without re-deriving them.
#[derive(Debug, Clone, Default)]
pub struct UserVectorResult {
    /// The constructed query vector, or `None` if no personalization
    /// signal exists (Case 1).
    pub vector: Option<Vec<f64>>,
    /// How many engagements contributed to the vector (0 for Cases 1/3).
    pub engagement_count: usize,
}

/// Resolve an engagement's episode id, preferring `id` and falling back
/// to looking the engagement's `episode_id` up as a `content_id` in the
/// embeddings map key space — callers pass `embeddings_by_episode_id`
/// keyed by whichever id the embedding was stored against, so this
/// function simply tries the literal `episode_id` and lets the caller's
/// map decide whether it resolves.
fn lookup_embedding<'a>(
    embeddings_by_episode_id: &'a HashMap<String, Vec<f64>>,
    episode_id: &str,
) -> Option<&'a Vec<f64>> {
    embeddings_by_episode_id.get(episode_id)
}

/// Build the weighted mean of the newest `user_vector_limit` engagements
/// that have a resolvable embedding. Returns `None` if nothing resolves
/// (the empty-after-filtering case falls through to Case 1/3, §4.2).
fn engagement_mean(
    engagements: &[Engagement],
    embeddings_by_episode_id: &HashMap<String, Vec<f64>>,
    stage_b: &StageBConfig,
    weights: &EngagementWeightsConfig,
) -> Option<(Vec<f64>, usize)> {
    let mut sorted: Vec<&Engagement> = engagements.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.truncate(stage_b.user_vector_limit);

    let mut weighted_sum: Option<Vec<f64>> = None;
    let mut weight_total = 0.0_f64;
    let mut retained = 0usize;

    for engagement in sorted {
        let Some(embedding) = lookup_embedding(embeddings_by_episode_id, &engagement.episode_id) else {
            warn!(
                episode_id = %engagement.episode_id,
                "engagement has no resolvable embedding; skipped from user vector"
            );
            continue;
        };
        let weight = weights.weight_for(&engagement.engagement_type);
        let sum = weighted_sum.get_or_insert_with(|| vec![0.0; embedding.len()]);
        if sum.len() != embedding.len() {
            warn!(
                episode_id = %engagement.episode_id,
                expected_dim = sum.len(),
                actual_dim = embedding.len(),
                "engagement embedding dimension mismatch within user vector; skipped"
            );
            continue;
        }
        for (acc, value) in sum.iter_mut().zip(embedding.iter()) {
            *acc += weight * value;
        }
        weight_total += weight;
        retained += 1;
    }

    let sum = weighted_sum?;
    if retained == 0 || weight_total == 0.0 {
        return None;
    }
    let mean: Vec<f64> = sum.into_iter().map(|v| v / weight_total).collect();
    Some((mean, retained))
}

/// Build the user vector for one request (§4.2). The four cases are
/// mutually exclusive and dispatched purely on whether an engagement
/// mean and/or a category anchor are present after resolution.
#[must_use]
pub fn build_user_vector(
    engagements: &[Engagement],
    embeddings_by_episode_id: &HashMap<String, Vec<f64>>,
    stage_b: &StageBConfig,
    weights: &EngagementWeightsConfig,
    category_anchor_vector: Option<&[f64]>,
) -> UserVectorResult {
    let mean = engagement_mean(engagements, embeddings_by_episode_id, stage_b, weights);

    match (mean, category_anchor_vector) {
        // Case 1: no engagements, no anchor.
        (None, None) => UserVectorResult::default(),
        // Case 2: engagements only.
        (Some((mean, count)), None) => UserVectorResult {
            vector: Some(mean),
            engagement_count: count,
        },
        // Case 3: anchor only.
        (None, Some(anchor)) => UserVectorResult {
            vector: Some(anchor.to_vec()),
            engagement_count: 0,
        },
        // Case 4: blend, with a dimension guard (§4.2, §7).
        (Some((mean, count)), Some(anchor)) => {
            if mean.len() != anchor.len() {
                warn!(
                    engagement_dim = mean.len(),
                    anchor_dim = anchor.len(),
                    "user vector dimension mismatch between engagement mean and category anchor; \
                     returning unblended engagement mean"
                );
                return UserVectorResult {
                    vector: Some(mean),
                    engagement_count: count,
                };
            }
            let alpha = stage_b.category_anchor_weight;
            let mut blended: Vec<f64> = mean
                .iter()
                .zip(anchor.iter())
                .map(|(m, a)| (1.0 - alpha) * m + alpha * a)
                .collect();
            l2_normalize(&mut blended);
            UserVectorResult {
                vector: Some(blended),
                engagement_count: count,
            }
        }
    }
}
