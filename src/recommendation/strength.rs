//! Connection Strength Calculator
//!
//! Aggregates the registered factors into a per-factor breakdown and a single
//! strength in [0, 1] for a user pair.

use std::sync::Arc;
use tracing::warn;

use crate::error::{Error, Result};

use super::factors::{default_factors, ConnectionStrengthFactor, FactorError};
use super::providers::SocialProviders;
use super::types::{StrengthBreakdown, UserId};

/// Evaluates every registered factor for a pair of users
#[derive(Clone)]
pub struct ConnectionStrengthCalculator {
    factors: Arc<[Box<dyn ConnectionStrengthFactor>]>,
}

impl ConnectionStrengthCalculator {
    pub fn new(factors: Vec<Box<dyn ConnectionStrengthFactor>>) -> Self {
        Self {
            factors: factors.into(),
        }
    }

    /// Calculator over the five production factors
    pub fn with_default_factors(providers: &SocialProviders) -> Self {
        Self::new(default_factors(providers))
    }

    /// Contribution of every factor, in registration order, zeros included.
    ///
    /// A factor that fails on a single query or on bad data contributes 0.0
    /// and the failure is logged. An unreachable provider fails the whole
    /// evaluation with `Error::ProviderUnavailable`.
    pub async fn breakdown(&self, user: UserId, target: UserId) -> Result<StrengthBreakdown> {
        let mut breakdown = StrengthBreakdown::with_capacity(self.factors.len());

        for factor in self.factors.iter() {
            let contribution = match factor.evaluate(user, target).await {
                Ok(value) if value.is_finite() => value.clamp(0.0, factor.weight()),
                Ok(value) => {
                    warn!(
                        factor = factor.name(),
                        %user,
                        %target,
                        "Factor produced non-finite value {}, using 0.0",
                        value
                    );
                    0.0
                }
                Err(FactorError::Provider(e)) if e.is_unavailable() => {
                    let provider = e.provider();
                    return Err(Error::provider_unavailable(provider, e));
                }
                Err(e) => {
                    warn!(
                        factor = factor.name(),
                        %user,
                        %target,
                        "Factor evaluation failed, using 0.0: {}",
                        e
                    );
                    metrics::counter!(
                        "friendgraph_factor_failures_total",
                        "factor" => factor.name()
                    )
                    .increment(1);
                    0.0
                }
            };
            breakdown.insert(factor.name(), contribution);
        }

        Ok(breakdown)
    }

    /// Clamped sum of the breakdown
    pub async fn connection_strength(&self, user: UserId, target: UserId) -> Result<f64> {
        Ok(Self::strength_from(&self.breakdown(user, target).await?))
    }

    /// Weights are not normalized, so the raw sum can exceed 1.0
    pub fn strength_from(breakdown: &StrengthBreakdown) -> f64 {
        breakdown.total().clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::providers::ProviderError;
    use crate::recommendation::store::{InMemorySocialGraph, PROFILE_PROVIDER};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    enum Outcome {
        Value(f64),
        BadData,
        Outage,
    }

    struct Fixed {
        name: &'static str,
        weight: f64,
        outcome: Outcome,
    }

    #[async_trait]
    impl ConnectionStrengthFactor for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn weight(&self) -> f64 {
            self.weight
        }

        async fn evaluate(&self, user: UserId, _target: UserId) -> std::result::Result<f64, FactorError> {
            match self.outcome {
                Outcome::Value(value) => Ok(value),
                Outcome::BadData => Err(FactorError::InvalidData {
                    user,
                    message: "garbled".to_string(),
                }),
                Outcome::Outage => Err(ProviderError::unavailable("test", "connection refused").into()),
            }
        }
    }

    fn fixed(name: &'static str, weight: f64, outcome: Outcome) -> Box<dyn ConnectionStrengthFactor> {
        Box::new(Fixed {
            name,
            weight,
            outcome,
        })
    }

    #[tokio::test]
    async fn test_strength_is_clamped_to_one() {
        let calculator = ConnectionStrengthCalculator::new(vec![
            fixed("a", 0.8, Outcome::Value(0.8)),
            fixed("b", 0.7, Outcome::Value(0.7)),
        ]);

        let breakdown = calculator.breakdown(UserId(1), UserId(2)).await.unwrap();
        assert!((breakdown.total() - 1.5).abs() < 1e-12);
        assert_eq!(calculator.connection_strength(UserId(1), UserId(2)).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_contributions_are_bounded_by_weight() {
        let calculator = ConnectionStrengthCalculator::new(vec![
            fixed("over", 0.2, Outcome::Value(0.9)),
            fixed("under", 0.2, Outcome::Value(-0.5)),
            fixed("nan", 0.2, Outcome::Value(f64::NAN)),
        ]);

        let breakdown = calculator.breakdown(UserId(1), UserId(2)).await.unwrap();
        assert_eq!(breakdown.get("over"), Some(0.2));
        assert_eq!(breakdown.get("under"), Some(0.0));
        assert_eq!(breakdown.get("nan"), Some(0.0));
    }

    #[tokio::test]
    async fn test_failed_factor_contributes_zero_and_keeps_its_slot() {
        let calculator = ConnectionStrengthCalculator::new(vec![
            fixed("first", 0.5, Outcome::Value(0.3)),
            fixed("broken", 0.4, Outcome::BadData),
            fixed("last", 0.1, Outcome::Value(0.1)),
        ]);

        let breakdown = calculator.breakdown(UserId(1), UserId(2)).await.unwrap();
        let entries: Vec<_> = breakdown.iter().collect();
        assert_eq!(entries, vec![("first", 0.3), ("broken", 0.0), ("last", 0.1)]);
        assert!((calculator.connection_strength(UserId(1), UserId(2)).await.unwrap() - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_default_breakdown_is_complete() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph.befriend(1, 10).befriend(2, 10).add_conversation(1, 2);
        graph
            .set_profile(1, Some("Lyon"), NaiveDate::from_ymd_opt(1990, 1, 1))
            .set_profile(2, Some("Lyon"), NaiveDate::from_ymd_opt(1991, 1, 1));
        let calculator =
            ConnectionStrengthCalculator::with_default_factors(&SocialProviders::from_store(graph.clone()));

        let breakdown = calculator.breakdown(UserId(1), UserId(2)).await.unwrap();
        assert_eq!(breakdown.len(), 5);
        assert!((breakdown.get("mutual_friends").unwrap() - 0.12).abs() < 1e-12);
        assert_eq!(breakdown.get("communication"), Some(0.4));
        assert_eq!(breakdown.get("common_comment_likes"), Some(0.0));
        assert_eq!(breakdown.get("geographic"), Some(0.15));
        assert_eq!(breakdown.get("demographic"), Some(0.13));

        // an unreachable profile store fails the evaluation
        graph.set_unavailable(PROFILE_PROVIDER, true);
        let outage = calculator.breakdown(UserId(1), UserId(2)).await;
        assert!(matches!(
            outage,
            Err(Error::ProviderUnavailable { provider: PROFILE_PROVIDER, .. })
        ));
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_propagated() {
        let calculator = ConnectionStrengthCalculator::new(vec![
            fixed("first", 0.5, Outcome::Value(0.3)),
            fixed("down", 0.4, Outcome::Outage),
        ]);

        let result = calculator.connection_strength(UserId(1), UserId(2)).await;
        assert!(matches!(
            result,
            Err(Error::ProviderUnavailable { provider: "test", .. })
        ));
    }
}
