//! Similarity resolver (§4.3): maps a candidate to a similarity scalar,
//! preferring an ANN-returned score over an in-process cosine
//! computation, and falling back to the neutral 0.5 when neither is
//! available.

use std::collections::HashMap;

use tracing::warn;

use crate::model::Episode;
use crate::scoring::{clamp_similarity, cosine_similarity};

/// The documented neutral fallback (§4.3, §7, §9 Open Questions:
/// resolved to keep 0.5 as specified).
pub const NEUTRAL_FALLBACK_SIMILARITY: f64 = 0.5;

/// Resolve the similarity score for one candidate, in the order
/// specified by §4.3:
/// 1. an ANN `similarity_by_id` hit (by `id`, then `content_id`),
/// 2. the neutral fallback if there is no user vector (Case 1),
/// 3. cosine similarity between the user vector and the episode's own
///    embedding,
/// 4. the neutral fallback if that embedding is missing.
#[must_use]
pub fn resolve_similarity(
    episode: &Episode,
    similarity_by_id: Option<&HashMap<String, f64>>,
    user_vector: Option<&[f64]>,
    embeddings_by_episode_id: &HashMap<String, Vec<f64>>,
) -> f64 {
    if let Some(map) = similarity_by_id {
        if let Some(score) = map.get(&episode.id).or_else(|| {
            episode
                .content_id
                .as_deref()
                .and_then(|cid| map.get(cid))
        }) {
            return clamp_similarity(*score);
        }
        warn!(
            episode_id = %episode.id,
            "ANN query result missing similarity for candidate; falling back to neutral score"
        );
        return NEUTRAL_FALLBACK_SIMILARITY;
    }

    let Some(user_vector) = user_vector else {
        return NEUTRAL_FALLBACK_SIMILARITY;
    };

    let embedding = embeddings_by_episode_id.get(&episode.id).or_else(|| {
        episode
            .content_id
            .as_deref()
            .and_then(|cid| embeddings_by_episode_id.get(cid))
    });
    match embedding {
        Some(embedding) => cosine_similarity(user_vector, embedding),
        None => {
            warn!(
                episode_id = %episode.id,
                "candidate has no resolvable embedding for cosine similarity; falling back to neutral score"
            );
            NEUTRAL_FALLBACK_SIMILARITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Categories, Scores};

    fn episode(id: &str, content_id: Option<&str>) -> Episode {
        Episode {
            id: id.into(),
            content_id: content_id.map(str::to_string),
            title: "t".into(),
            published_at: None,
            scores: Scores::default(),
            series: None,
            categories: Categories::default(),
            key_insight: None,
        }
    }

    #[test]
    fn ann_hit_by_id_is_returned() {
        let ep = episode("a", None);
        let mut ann = HashMap::new();
        ann.insert("a".to_string(), 0.8);
        let result = resolve_similarity(&ep, Some(&ann), None, &HashMap::new());
        assert_eq!(result, 0.8);
    }

    #[test]
    fn ann_hit_falls_back_to_content_id() {
        let ep = episode("a", Some("alt"));
        let mut ann = HashMap::new();
        ann.insert("alt".to_string(), 0.9);
        let result = resolve_similarity(&ep, Some(&ann), None, &HashMap::new());
        assert_eq!(result, 0.9);
    }

    #[test]
    fn ann_miss_falls_back_to_neutral() {
        let ep = episode("a", None);
        let ann: HashMap<String, f64> = HashMap::new();
        let result = resolve_similarity(&ep, Some(&ann), None, &HashMap::new());
        assert_eq!(result, NEUTRAL_FALLBACK_SIMILARITY);
    }

    #[test]
    fn no_ann_no_user_vector_is_neutral() {
        let ep = episode("a", None);
        let result = resolve_similarity(&ep, None, None, &HashMap::new());
        assert_eq!(result, NEUTRAL_FALLBACK_SIMILARITY);
    }

    #[test]
    fn no_ann_with_user_vector_computes_cosine() {
        let ep = episode("a", None);
        let mut embeddings = HashMap::new();
        embeddings.insert("a".to_string(), vec![1.0, 0.0]);
        let user_vector = vec![1.0, 0.0];
        let result = resolve_similarity(&ep, None, Some(&user_vector), &embeddings);
        assert!((result - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_ann_missing_embedding_falls_back_to_neutral() {
        let ep = episode("a", None);
        let user_vector = vec![1.0, 0.0];
        let result = resolve_similarity(&ep, None, Some(&user_vector), &HashMap::new());
        assert_eq!(result, NEUTRAL_FALLBACK_SIMILARITY);
    }

    #[test]
    fn ann_score_out_of_range_is_clamped() {
        let ep = episode("a", None);
        let mut ann = HashMap::new();
        ann.insert("a".to_string(), 1.5);
        let result = resolve_similarity(&ep, Some(&ann), None, &HashMap::new());
        assert_eq!(result, 1.0);
    }
}
