//! Score primitives shared by Stage A and Stage B: quality, recency, and
//! cosine similarity. Pure functions only — no I/O, no config mutation.

use chrono::{DateTime, Utc};

use crate::model::Episode;

/// Days since `published_at`, clamped and defaulted per §4.4 / §7:
/// - missing or future timestamps clamp to 0 (never negative),
/// - a timestamp that fails to parse is not representable in this typed
///   model (it would have failed deserialization upstream), so the only
///   "parse failure" this function models is a missing `published_at`,
///   which is treated as maximally old via the caller's `None` branch.
#[must_use]
pub fn days_since(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match published_at {
        None => 999.0,
        Some(ts) => {
            let delta = now.signed_duration_since(ts);
            let days = delta.num_seconds() as f64 / 86_400.0;
            days.max(0.0)
        }
    }
}

/// `quality_raw / max_quality_score`, saturating at 1.0.
///
/// `max_quality_score = 4 * credibility_multiplier + 4`, the score a
/// max-credibility, max-insight episode would receive.
#[must_use]
pub fn quality_score(episode: &Episode, credibility_multiplier: f64) -> f64 {
    let max_quality_score = 4.0 * credibility_multiplier + 4.0;
    if max_quality_score <= 0.0 {
        return 0.0;
    }
    (episode.quality_raw(credibility_multiplier) / max_quality_score).min(1.0)
}

/// `exp(-lambda * days_since)`, monotonically decreasing in `days_since`.
#[must_use]
pub fn recency_score(days_since: f64, lambda: f64) -> f64 {
    (-lambda * days_since).exp()
}

/// Cosine similarity of two vectors. Returns 0.0 if either vector is empty
/// or has zero norm (undefined direction), rather than NaN.
#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Clamp an ANN-returned similarity score into `[0, 1]`; the contract
/// (§4.3, §6) assumes scores already land there, but a defensive clamp
/// keeps a misbehaving vector store from poisoning the blend.
#[must_use]
pub fn clamp_similarity(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

/// L2-normalize a vector in place. A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}


#[cfg(all(test, feature = "proptest-arbitrary"))]
mod proptest_suite {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Cosine similarity of equal-length, non-zero vectors never
        /// leaves `[-1, 1]`, regardless of magnitude.
        #[test]
        fn cosine_similarity_stays_in_unit_range(
            a in prop::collection::vec(-1e6_f64..1e6_f64, 1..16),
            b in prop::collection::vec(-1e6_f64..1e6_f64, 1..16),
        ) {
            prop_assume!(a.len() == b.len());
            prop_assume!(a.iter().any(|x| *x != 0.0));
            prop_assume!(b.iter().any(|x| *x != 0.0));
            let sim = cosine_similarity(&a, &b);
            prop_assert!((-1.0..=1.0).contains(&sim));
        }

        /// Recency score is always in `(0, 1]` for non-negative inputs and
        /// strictly decreases as `days_since` grows.
        #[test]
        fn recency_score_is_bounded_and_decreasing(
            days_since in 0.0_f64..10_000.0,
            extra_days in 0.1_f64..10_000.0,
            lambda in 0.0001_f64..1.0,
        ) {
            let near = recency_score(days_since, lambda);
            let far = recency_score(days_since + extra_days, lambda);
            prop_assert!(near > 0.0 && near <= 1.0);
            prop_assert!(far <= near);
        }

        /// L2-normalizing a non-zero vector always yields unit length.
        #[test]
        fn l2_normalize_is_idempotent_on_unit_vectors(
            v in prop::collection::vec(-1e3_f64..1e3_f64, 1..16),
        ) {
            prop_assume!(v.iter().any(|x| *x != 0.0));
            let mut once = v.clone();
            l2_normalize(&mut once);
            let mut twice = once.clone();
            l2_normalize(&mut twice);
            for (a, b) in once.iter().zip(twice.iter()) {
                prop_assert!((a - b).abs() < 1e-9);
            }
        }
    }
}
