//! Recommendation Ranking
//!
//! Turns a distance map into an ordered candidate list: drops the target and
//! its existing friends, scores by `1 / (1 + distance)`, attaches the factor
//! breakdown for the pair and sorts by score descending with ascending user id
//! as the tie-break.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use crate::error::Result;

use super::strength::ConnectionStrengthCalculator;
use super::types::{Recommendation, SocialDistanceMap, UserId};

/// Score of a candidate at the given social distance, in (0, 1]
pub fn distance_to_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Deterministic ordering: higher score first, then smaller id
pub fn compare_recommendations(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

#[derive(Clone)]
pub struct RecommendationRanker {
    calculator: ConnectionStrengthCalculator,
}

impl RecommendationRanker {
    pub fn new(calculator: ConnectionStrengthCalculator) -> Self {
        Self { calculator }
    }

    /// All eligible candidates, fully ordered, stamped with `generated_at`
    pub async fn rank(
        &self,
        target: UserId,
        distances: &SocialDistanceMap,
        existing_friends: &HashSet<UserId>,
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        let mut eligible: Vec<(UserId, f64)> = distances
            .iter()
            .filter(|(candidate, _)| **candidate != target && !existing_friends.contains(*candidate))
            .map(|(candidate, distance)| (*candidate, *distance))
            .collect();
        // breakdowns are fetched in id order so provider reads are reproducible
        eligible.sort_unstable_by_key(|(candidate, _)| *candidate);

        let mut recommendations = Vec::with_capacity(eligible.len());
        for (candidate, distance) in eligible {
            let breakdown = self.calculator.breakdown(target, candidate).await?;
            recommendations.push(Recommendation {
                candidate_id: candidate,
                score: distance_to_score(distance),
                breakdown,
                generated_at,
            });
        }

        recommendations.sort_by(compare_recommendations);

        debug!(
            %target,
            reached = distances.len(),
            ranked = recommendations.len(),
            "Ranked friend recommendation candidates"
        );

        Ok(recommendations)
    }
}
