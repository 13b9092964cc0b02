//! Domain types shared across the ranking pipeline: episodes, engagements,
//! scored episodes, and the per-request session.
//!
//! The pipeline interior operates exclusively on these typed records; any
//! dict-like or partially-populated representation from a provider is
//! adapted into an `Episode` at the provider boundary, never threaded
//! further in.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four per-dimension quality scores attached to an episode, each on a
/// 0-4 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    /// Editorial/source credibility. Missing or null is treated as 0.
    pub credibility: u8,
    /// Depth of insight offered by the episode.
    pub insight: u8,
    /// Density of concrete information.
    pub information: u8,
    /// How entertaining the episode is.
    pub entertainment: u8,
}

/// The series an episode belongs to, used for diversity constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Stable series identifier.
    pub id: String,
    /// Human-readable series name.
    pub name: String,
}

/// Category assignment for an episode. `major[0]`, if present, is the
/// primary category used for cold-start bucketing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    /// Major (top-level) categories; first entry is primary.
    pub major: Vec<String>,
    /// Finer-grained subcategories.
    pub subcategories: Vec<String>,
}

impl Categories {
    /// The primary category, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.major.first().map(String::as_str)
    }
}

/// An item in the podcast catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Primary identifier, unique within the catalog.
    pub id: String,
    /// Optional alternate key; engagement resolution falls back to this
    /// when `id` misses.
    pub content_id: Option<String>,
    /// Episode title.
    pub title: String,
    /// Publication timestamp, UTC.
    pub published_at: Option<DateTime<Utc>>,
    /// Per-dimension quality scores.
    pub scores: Scores,
    /// Series membership, if any.
    pub series: Option<Series>,
    /// Category assignment.
    pub categories: Categories,
    /// Short text used as embedding input alongside the title.
    pub key_insight: Option<String>,
}

impl Episode {
    /// `credibility + insight`, the raw combined-quality threshold used by
    /// Stage A gating.
    #[must_use]
    pub fn combined_score(&self) -> u16 {
        u16::from(self.scores.credibility) + u16::from(self.scores.insight)
    }

    /// `quality_raw = credibility * credibility_multiplier + insight`, used
    /// both for the Stage A sort key and as the numerator of the Stage B
    /// quality score.
    #[must_use]
    pub fn quality_raw(&self, credibility_multiplier: f64) -> f64 {
        f64::from(self.scores.credibility) * credibility_multiplier + f64::from(self.scores.insight)
    }

    /// Does this episode (by id or content_id) appear in `excluded_ids`?
    #[must_use]
    pub fn is_excluded(&self, excluded_ids: &HashSet<String>) -> bool {
        excluded_ids.contains(&self.id)
            || self
                .content_id
                .as_deref()
                .is_some_and(|cid| excluded_ids.contains(cid))
    }

    /// The canonical text fed to the embedding strategy: `"{title}. {key_insight}"`,
    /// falling back to the id when both are empty.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        let title = self.title.trim();
        let insight = self.key_insight.as_deref().unwrap_or("").trim();
        match (title.is_empty(), insight.is_empty()) {
            (true, true) => self.id.clone(),
            (false, true) => title.to_string(),
            (true, false) => insight.to_string(),
            (false, false) => format!("{title}. {insight}"),
        }
    }
}

/// A recorded user interaction with an episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engagement {
    /// Opaque id assigned by the Engagement Store on `record_engagement`;
    /// absent for engagements supplied verbatim in a request body.
    pub id: Option<String>,
    /// The episode interacted with (may resolve via `content_id`).
    pub episode_id: String,
    /// The kind of interaction.
    pub engagement_type: EngagementType,
    /// When the interaction happened.
    pub timestamp: DateTime<Utc>,
}

/// The recognized engagement kinds. Unknown kinds deserialize into
/// `Other`, which always carries the default weight of 1.0 in user-vector
/// construction (§4.2) — the type list is never silently extended with a
/// bespoke weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementType {
    /// A tap/click on the episode card.
    Click,
    /// The user bookmarked the episode for later.
    Bookmark,
    /// The user listened to (some portion of) the episode.
    Listen,
    /// The user viewed the episode detail page.
    View,
    /// Any other engagement kind reported by an upstream client.
    #[serde(other)]
    Other,
}

/// An episode annotated with its four scalar pipeline scores, all in
/// `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEpisode {
    /// The underlying episode.
    pub episode: Episode,
    /// Similarity between the episode and the user vector (or ANN score).
    pub similarity_score: f64,
    /// Normalized quality score.
    pub quality_score: f64,
    /// Exponential recency score.
    pub recency_score: f64,
    /// Blended final score; the sort key for ranking and diversity
    /// selection.
    pub final_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(credibility: u8, insight: u8) -> Episode {
        Episode {
            id: "ep1".into(),
            content_id: None,
            title: "Title".into(),
            published_at: None,
            scores: Scores {
                credibility,
                insight,
                information: 0,
                entertainment: 0,
            },
            series: None,
            categories: Categories::default(),
            key_insight: None,
        }
    }

    #[test]
    fn combined_score_sums_credibility_and_insight() {
        assert_eq!(episode(2, 3).combined_score(), 5);
    }

    #[test]
    fn quality_raw_applies_the_credibility_multiplier() {
        assert!((episode(4, 4).quality_raw(1.5) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn is_excluded_checks_both_id_and_content_id() {
        let mut ep = episode(1, 1);
        ep.content_id = Some("alt".into());
        let mut excluded = HashSet::new();
        excluded.insert("alt".to_string());
        assert!(ep.is_excluded(&excluded));
        assert!(!episode(1, 1).is_excluded(&excluded));
    }

    #[test]
    fn embedding_text_combines_title_and_key_insight() {
        let mut ep = episode(1, 1);
        ep.key_insight = Some("insight here".into());
        assert_eq!(ep.embedding_text(), "Title. insight here");
    }

    #[test]
    fn embedding_text_falls_back_to_id_when_empty() {
        let mut ep = episode(1, 1);
        ep.title = String::new();
        assert_eq!(ep.embedding_text(), "ep1");
    }

    #[test]
    fn unknown_engagement_type_deserializes_to_other() {
        let json = r#"{"id":null,"episode_id":"e1","engagement_type":"downloaded","timestamp":"2026-01-01T00:00:00Z"}"#;
        let e: Engagement = serde_json::from_str(json).unwrap();
        assert_eq!(e.engagement_type, EngagementType::Other);
    }
}
