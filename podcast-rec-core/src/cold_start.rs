//! Cold-start category diversity (§4.5): the alternate reshaping path
//! for Case 3 (category anchor, no engagements) when enabled in config.
//! Runs after blended scoring and before series diversity — it never
//! runs in Cases 1, 2, or 4.

use std::collections::HashMap;

use crate::config::CategoryAnchorConfig;
use crate::model::ScoredEpisode;

fn primary_category(scored: &ScoredEpisode) -> Option<&str> {
    scored.episode.categories.primary()
}

/// Reshape the top-N slot to guarantee `min_per_category` items from
/// each target category, then re-sort that slot by final score and
/// concatenate the untouched remainder (also sorted by final score).
///
/// `candidates` is expected already sorted by `final_score` descending.
#[must_use]
pub fn apply_cold_start_diversity(
    candidates: Vec<ScoredEpisode>,
    target_categories: &[String],
    config: &CategoryAnchorConfig,
) -> Vec<ScoredEpisode> {
    let top_n = config.cold_start_top_n.min(candidates.len());
    if top_n == 0 || target_categories.is_empty() {
        return candidates;
    }

    // Bucket every candidate's original index by primary category;
    // "other" catches anything not in `target_categories`.
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
    let mut other: Vec<usize> = Vec::new();
    for (idx, scored) in candidates.iter().enumerate() {
        match primary_category(scored) {
            Some(cat) if target_categories.iter().any(|t| t == cat) => {
                buckets.entry(cat.to_string()).or_default().push(idx);
            }
            _ => other.push(idx),
        }
    }

    let mut selected: Vec<usize> = Vec::with_capacity(top_n);
    let mut selected_set = vec![false; candidates.len()];
    let mut cursors: HashMap<&str, usize> = HashMap::new();

    // Round-robin across target categories until each has contributed
    // `min_per_category` or the top-N slot is full.
    let mut remaining_min: HashMap<&str, usize> = target_categories
        .iter()
        .map(|c| (c.as_str(), config.cold_start_min_per_category))
        .collect();

    'round_robin: loop {
        let mut progressed = false;
        for category in target_categories {
            if selected.len() >= top_n {
                break 'round_robin;
            }
            let need = remaining_min.get(category.as_str()).copied().unwrap_or(0);
            if need == 0 {
                continue;
            }
            let cursor = cursors.entry(category.as_str()).or_insert(0);
            if let Some(bucket) = buckets.get(category.as_str()) {
                if let Some(&idx) = bucket.get(*cursor) {
                    *cursor += 1;
                    selected.push(idx);
                    selected_set[idx] = true;
                    *remaining_min.get_mut(category.as_str()).unwrap() -= 1;
                    progressed = true;
                }
            }
        }
        if !progressed {
            break;
        }
        if remaining_min.values().all(|&n| n == 0) {
            break;
        }
    }

    // Fill remaining top-N slots from whatever is left, by original
    // (final-score) order: continue draining target-category buckets
    // past their minimum, then the "other" bucket.
    if selected.len() < top_n {
        let mut leftover: Vec<usize> = Vec::new();
        for category in target_categories {
            if let Some(bucket) = buckets.get(category.as_str()) {
                let cursor = cursors.get(category.as_str()).copied().unwrap_or(0);
                leftover.extend(bucket.iter().skip(cursor).copied());
            }
        }
        leftover.extend(other.iter().copied());
        leftover.sort_unstable();
        for idx in leftover {
            if selected.len() >= top_n {
                break;
            }
            if !selected_set[idx] {
                selected.push(idx);
                selected_set[idx] = true;
            }
        }
    }

    // Re-sort the selected top-N by final score.
    let mut top: Vec<ScoredEpisode> = selected
        .iter()
        .map(|&idx| candidates[idx].clone())
        .collect();
    top.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));

    // The rest, also sorted by final score (they already are, since the
    // input was sorted and we only need to drop the selected indices).
    let mut rest: Vec<ScoredEpisode> = candidates
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !selected_set[*idx])
        .map(|(_, scored)| scored)
        .collect();
    rest.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));

    top.into_iter().chain(rest).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Categories, Episode, Scores};

    fn scored(id: &str, category: &str, final_score: f64) -> ScoredEpisode {
        ScoredEpisode {
            episode: Episode {
                id: id.into(),
                content_id: None,
                title: "t".into(),
                published_at: None,
                scores: Scores::default(),
                series: None,
                categories: Categories {
                    major: vec![category.to_string()],
                    subcategories: vec![],
                },
                key_insight: None,
            },
            similarity_score: 0.5,
            quality_score: 0.5,
            recency_score: 0.5,
            final_score,
        }
    }

    #[test]
    fn guarantees_minimum_per_target_category() {
        let candidates = vec![
            scored("a1", "A", 0.95),
            scored("a2", "A", 0.9),
            scored("x1", "X", 0.85),
            scored("x2", "X", 0.8),
            scored("x3", "X", 0.75),
            scored("b1", "B", 0.5),
            scored("b2", "B", 0.45),
            scored("c1", "C", 0.4),
            scored("c2", "C", 0.35),
            scored("c3", "C", 0.3),
        ];
        let target = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let config = CategoryAnchorConfig {
            cold_start_diversity_enabled: true,
            cold_start_top_n: 10,
            cold_start_min_per_category: 2,
        };
        let output = apply_cold_start_diversity(candidates, &target, &config);
        let top10 = &output[..10];
        for category in &target {
            let count = top10
                .iter()
                .filter(|s| s.episode.categories.primary() == Some(category.as_str()))
                .count();
            assert!(count >= 2, "category {category} has only {count} in top 10");
        }
    }

    #[test]
    fn top_n_is_resorted_by_final_score_after_reshaping() {
        let candidates = vec![
            scored("a1", "A", 0.95),
            scored("x1", "X", 0.9),
            scored("b1", "B", 0.1),
            scored("b2", "B", 0.05),
        ];
        let target = vec!["A".to_string(), "B".to_string()];
        let config = CategoryAnchorConfig {
            cold_start_diversity_enabled: true,
            cold_start_top_n: 4,
            cold_start_min_per_category: 1,
        };
        let output = apply_cold_start_diversity(candidates, &target, &config);
        let scores: Vec<f64> = output.iter().map(|s| s.final_score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(scores, sorted);
    }

    #[test]
    fn empty_target_categories_is_a_no_op() {
        let candidates = vec![scored("a1", "A", 0.9)];
        let config = CategoryAnchorConfig::default();
        let output = apply_cold_start_diversity(candidates.clone(), &[], &config);
        assert_eq!(output.len(), candidates.len());
        assert_eq!(output[0].episode.id, "a1");
    }
}
