//! The episode card wire format (§6) and badge derivation. Transport-
//! agnostic: this is the shape a transport layer (out of scope, §1)
//! would serialize, not an HTTP response type itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Categories, ScoredEpisode, Series};

/// A badge highlighting a notably strong dimension of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    /// `insight >= 3`.
    HighInsight,
    /// `credibility >= 3`.
    HighCredibility,
    /// `information >= 3`.
    DataRich,
    /// `entertainment >= 3`.
    Engaging,
}

/// Minimum per-dimension score for a badge to apply.
const BADGE_THRESHOLD: u8 = 3;

/// Maximum badges shown on a card.
const MAX_BADGES: usize = 2;

/// Derive at most [`MAX_BADGES`] badges for a scored episode, evaluated
/// in the fixed priority order `high_insight`, `high_credibility`,
/// `data_rich`, `engaging` (§6) — a deterministic priority, not a
/// score-sorted pick.
#[must_use]
pub fn derive_badges(scored: &ScoredEpisode) -> Vec<Badge> {
    let scores = &scored.episode.scores;
    let candidates = [
        (scores.insight >= BADGE_THRESHOLD, Badge::HighInsight),
        (scores.credibility >= BADGE_THRESHOLD, Badge::HighCredibility),
        (scores.information >= BADGE_THRESHOLD, Badge::DataRich),
        (scores.entertainment >= BADGE_THRESHOLD, Badge::Engaging),
    ];
    candidates
        .into_iter()
        .filter_map(|(applies, badge)| applies.then_some(badge))
        .take(MAX_BADGES)
        .collect()
}

/// The per-dimension quality scores on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoresCard {
    /// Editorial/source credibility.
    pub credibility: u8,
    /// Depth of insight.
    pub insight: u8,
    /// Density of concrete information.
    pub information: u8,
    /// How entertaining the episode is.
    pub entertainment: u8,
}

/// The episode card wire format emitted to callers (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeCard {
    /// Primary identifier.
    pub id: String,
    /// Alternate key, if any.
    pub content_id: Option<String>,
    /// Episode title.
    pub title: String,
    /// Series membership, if any.
    pub series: Option<Series>,
    /// Publication timestamp.
    pub published_at: Option<DateTime<Utc>>,
    /// Per-dimension scores.
    pub scores: ScoresCard,
    /// At most 2 badges, in priority order.
    pub badges: Vec<Badge>,
    /// Short embedding-input text, if present.
    pub key_insight: Option<String>,
    /// Category assignment.
    pub categories: Categories,
    /// Similarity component of the final score.
    pub similarity_score: f64,
    /// Quality component of the final score.
    pub quality_score: f64,
    /// Recency component of the final score.
    pub recency_score: f64,
    /// The blended final score.
    pub final_score: f64,
    /// This episode's 0-based position in the session's ranked queue.
    pub queue_position: usize,
}

/// Render a [`ScoredEpisode`] at a known queue position into its wire
/// format, including badge derivation.
#[must_use]
pub fn to_episode_card(scored: &ScoredEpisode, queue_position: usize) -> EpisodeCard {
    let badges = derive_badges(scored);
    let episode = &scored.episode;
    EpisodeCard {
        id: episode.id.clone(),
        content_id: episode.content_id.clone(),
        title: episode.title.clone(),
        series: episode.series.clone(),
        published_at: episode.published_at,
        scores: ScoresCard {
            credibility: episode.scores.credibility,
            insight: episode.scores.insight,
            information: episode.scores.information,
            entertainment: episode.scores.entertainment,
        },
        badges,
        key_insight: episode.key_insight.clone(),
        categories: episode.categories.clone(),
        similarity_score: scored.similarity_score,
        quality_score: scored.quality_score,
        recency_score: scored.recency_score,
        final_score: scored.final_score,
        queue_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Categories as Cats, Episode, Scores};

    fn scored(credibility: u8, insight: u8, information: u8, entertainment: u8) -> ScoredEpisode {
        ScoredEpisode {
            episode: Episode {
                id: "e1".into(),
                content_id: None,
                title: "t".into(),
                published_at: None,
                scores: Scores {
                    credibility,
                    insight,
                    information,
                    entertainment,
                },
                series: None,
                categories: Cats::default(),
                key_insight: None,
            },
            similarity_score: 0.5,
            quality_score: 0.5,
            recency_score: 0.5,
            final_score: 0.5,
        }
    }

    #[test]
    fn derives_no_badges_below_threshold() {
        assert!(derive_badges(&scored(1, 1, 1, 1)).is_empty());
    }

    #[test]
    fn derives_badges_in_fixed_priority_order() {
        let s = scored(4, 4, 4, 4);
        let badges = derive_badges(&s);
        assert_eq!(badges, vec![Badge::HighInsight, Badge::HighCredibility]);
    }

    #[test]
    fn caps_at_two_badges_even_when_more_qualify() {
        let s = scored(3, 3, 3, 3);
        assert_eq!(derive_badges(&s).len(), 2);
    }

    #[test]
    fn picks_only_qualifying_badges_in_order() {
        // insight and entertainment qualify, credibility and information don't.
        let s = scored(1, 3, 1, 3);
        assert_eq!(derive_badges(&s), vec![Badge::HighInsight, Badge::Engaging]);
    }

    #[test]
    fn to_episode_card_carries_queue_position() {
        let s = scored(4, 4, 4, 4);
        let card = to_episode_card(&s, 7);
        assert_eq!(card.queue_position, 7);
        assert_eq!(card.id, "e1");
    }
}
