//! Series diversity selector (§4.4): greedy in-processing selection under
//! a per-series cap and an optional no-adjacent-same-series constraint.
//!
//! This runs on an already `final_score`-sorted candidate list but does
//! not simply reorder it — at each slot it picks the best *eligible*
//! remaining candidate, paying the diversity penalty only when the next
//! best item would actually violate a constraint (§4.4 rationale).

use crate::config::SeriesDiversityConfig;
use crate::model::ScoredEpisode;
use std::collections::HashMap;

/// Episodes with no series are bucketed under this anonymous key, which
/// receives its own count and its own adjacency check (§4.4).
const ANONYMOUS_SERIES: &str = "\0__no_series__";

fn series_key(scored: &ScoredEpisode) -> &str {
    scored
        .episode
        .series
        .as_ref()
        .map_or(ANONYMOUS_SERIES, |s| s.id.as_str())
}

/// Select the full output ordering under the series-diversity
/// constraints. `candidates` must already be sorted by `final_score`
/// descending (the caller's responsibility — this function only breaks
/// ties by original order, it does not perform the initial sort).
#[must_use]
pub fn select_with_series_diversity(
    candidates: Vec<ScoredEpisode>,
    config: &SeriesDiversityConfig,
) -> Vec<ScoredEpisode> {
    let mut remaining: Vec<(usize, ScoredEpisode)> = candidates.into_iter().enumerate().collect();
    let mut series_count: HashMap<String, usize> = HashMap::new();
    let mut last_selected_series: Option<String> = None;
    let mut output = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let mut best_idx: Option<usize> = None;
        let mut best_effective_score = f64::MIN;
        let mut best_original_order = usize::MAX;

        for (pos, (original_order, scored)) in remaining.iter().enumerate() {
            let key = series_key(scored).to_string();
            let count = *series_count.get(&key).unwrap_or(&0);

            if count >= config.max_episodes_per_series {
                continue;
            }
            if config.no_adjacent_same_series
                && last_selected_series.as_deref() == Some(key.as_str())
            {
                continue;
            }

            let effective_score = scored.final_score * config.series_penalty_alpha.powi(count as i32);

            let better = effective_score > best_effective_score
                || (effective_score == best_effective_score && *original_order < best_original_order);
            if better {
                best_effective_score = effective_score;
                best_idx = Some(pos);
                best_original_order = *original_order;
            }
        }

        let Some(idx) = best_idx else {
            break; // no eligible candidate remains
        };

        let (_, chosen) = remaining.remove(idx);
        let key = series_key(&chosen).to_string();
        *series_count.entry(key.clone()).or_insert(0) += 1;
        last_selected_series = Some(key);
        output.push(chosen);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Categories, Episode, Scores, Series};

    fn scored(id: &str, series_id: Option<&str>, final_score: f64) -> ScoredEpisode {
        ScoredEpisode {
            episode: Episode {
                id: id.into(),
                content_id: None,
                title: "t".into(),
                published_at: None,
                scores: Scores::default(),
                series: series_id.map(|s| Series {
                    id: s.into(),
                    name: s.into(),
                }),
                categories: Categories::default(),
                key_insight: None,
            },
            similarity_score: 0.5,
            quality_score: 0.5,
            recency_score: 0.5,
            final_score,
        }
    }

    #[test]
    fn enforces_max_episodes_per_series() {
        let candidates = vec![
            scored("a1", Some("s1"), 0.9),
            scored("a2", Some("s1"), 0.8),
            scored("a3", Some("s1"), 0.7),
            scored("b1", Some("s2"), 0.6),
        ];
        let config = SeriesDiversityConfig {
            max_episodes_per_series: 2,
            series_penalty_alpha: 0.7,
            no_adjacent_same_series: false,
        };
        let output = select_with_series_diversity(candidates, &config);
        let s1_count = output
            .iter()
            .filter(|s| s.episode.series.as_ref().is_some_and(|s| s.id == "s1"))
            .count();
        assert_eq!(s1_count, 2);
        assert_eq!(output.len(), 3); // a3 excluded, hard cap on s1
    }

    #[test]
    fn no_adjacent_same_series_prevents_back_to_back_picks() {
        let candidates = vec![
            scored("a1", Some("s1"), 0.9),
            scored("a2", Some("s1"), 0.85),
            scored("b1", Some("s2"), 0.5),
        ];
        let config = SeriesDiversityConfig {
            max_episodes_per_series: 2,
            series_penalty_alpha: 0.7,
            no_adjacent_same_series: true,
        };
        let output = select_with_series_diversity(candidates, &config);
        assert_eq!(output[0].episode.id, "a1");
        assert_eq!(output[1].episode.id, "b1"); // not a2, adjacency blocked
        assert_eq!(output[2].episode.id, "a2");
    }

    #[test]
    fn anonymous_series_bucket_has_its_own_cap() {
        let candidates = vec![
            scored("a1", None, 0.9),
            scored("a2", None, 0.8),
            scored("a3", None, 0.7),
        ];
        let config = SeriesDiversityConfig {
            max_episodes_per_series: 2,
            series_penalty_alpha: 0.7,
            no_adjacent_same_series: false,
        };
        let output = select_with_series_diversity(candidates, &config);
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn ties_are_broken_by_original_order() {
        let candidates = vec![
            scored("a", Some("s1"), 0.5),
            scored("b", Some("s2"), 0.5),
        ];
        let config = SeriesDiversityConfig {
            max_episodes_per_series: 2,
            series_penalty_alpha: 0.7,
            no_adjacent_same_series: false,
        };
        let output = select_with_series_diversity(candidates, &config);
        assert_eq!(output[0].episode.id, "a");
    }

    #[test]
    fn every_prefix_respects_the_series_cap() {
        let candidates = vec![
            scored("a1", Some("s1"), 0.95),
            scored("a2", Some("s1"), 0.9),
            scored("a3", Some("s1"), 0.85),
            scored("a4", Some("s1"), 0.8),
            scored("b1", Some("s2"), 0.75),
            scored("b2", Some("s2"), 0.7),
        ];
        let config = SeriesDiversityConfig {
            max_episodes_per_series: 2,
            series_penalty_alpha: 0.7,
            no_adjacent_same_series: false,
        };
        let output = select_with_series_diversity(candidates, &config);
        for prefix_len in 1..=output.len() {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for scored in &output[..prefix_len] {
                let key = series_key(scored);
                *counts.entry(key).or_insert(0) += 1;
                assert!(counts[key] <= config.max_episodes_per_series);
            }
        }
    }
}
