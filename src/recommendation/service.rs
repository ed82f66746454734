//! Recommendation Service
//!
//! Public entry point of the engine:
//! 1. validate the page request
//! 2. weighted social distance search from the target
//! 3. load the target's accepted friends
//! 4. rank the remaining candidates
//! 5. cut the requested page
//!
//! The service holds no mutable state; concurrent requests are independent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::RecommendationConfig;
use crate::error::{Error, Result};

use super::distance::{SearchLimits, SocialDistanceSearch};
use super::metrics::{record_request, RequestTimer};
use super::providers::{FriendshipProvider, SocialProviders};
use super::ranking::RecommendationRanker;
use super::store::FRIENDSHIP_PROVIDER;
use super::strength::ConnectionStrengthCalculator;
use super::types::{Page, PageRequest, Recommendation, StrengthBreakdown, UserId};

/// Explanation of the tie between two users
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStrengthReport {
    pub user_id: UserId,
    pub target_user_id: UserId,
    pub strength: f64,
    pub breakdown: StrengthBreakdown,
}

#[derive(Clone)]
pub struct RecommendationService {
    friendships: Arc<dyn FriendshipProvider>,
    calculator: ConnectionStrengthCalculator,
    search: SocialDistanceSearch,
    ranker: RecommendationRanker,
    config: RecommendationConfig,
    clock: fn() -> DateTime<Utc>,
}

impl RecommendationService {
    /// Service over the production factor set
    pub fn new(providers: SocialProviders, config: RecommendationConfig) -> Self {
        let calculator = ConnectionStrengthCalculator::with_default_factors(&providers);
        Self::with_calculator(providers.friendships, calculator, config)
    }

    pub fn with_calculator(
        friendships: Arc<dyn FriendshipProvider>,
        calculator: ConnectionStrengthCalculator,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            search: SocialDistanceSearch::new(friendships.clone(), calculator.clone()),
            ranker: RecommendationRanker::new(calculator.clone()),
            friendships,
            calculator,
            config,
            clock: Utc::now,
        }
    }

    /// Source of the `generated_at` stamp on recommendations
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Ranked, paginated friend recommendations bounded by the configured deadline
    pub async fn get_friend_recommendations(
        &self,
        target: UserId,
        page: PageRequest,
    ) -> Result<Page<Recommendation>> {
        let limits =
            SearchLimits::unbounded().with_deadline(Instant::now() + self.config.search_timeout);
        self.get_friend_recommendations_with_limits(target, page, limits)
            .await
    }

    /// Same as `get_friend_recommendations` with caller-supplied stop conditions
    #[instrument(skip(self, limits), fields(target = %target, page = page.page, size = page.size))]
    pub async fn get_friend_recommendations_with_limits(
        &self,
        target: UserId,
        page: PageRequest,
        limits: SearchLimits,
    ) -> Result<Page<Recommendation>> {
        let timer = RequestTimer::new("get_friend_recommendations", self.config.slow_request_threshold);

        let result = self.recommend(target, page, &limits).await;

        let (outcome, candidates) = match &result {
            Ok(page) => ("ok", page.total_elements),
            Err(e) => {
                if e.is_error_level() {
                    warn!(
                        retryable = e.is_retryable(),
                        "Friend recommendations failed for {}: {}",
                        target,
                        e
                    );
                }
                (e.error_code(), 0)
            }
        };
        record_request(outcome, timer.elapsed(), candidates);

        result
    }

    async fn recommend(
        &self,
        target: UserId,
        page: PageRequest,
        limits: &SearchLimits,
    ) -> Result<Page<Recommendation>> {
        page.validate()?;
        if page.size > self.config.max_page_size {
            return Err(Error::invalid_argument(
                "size",
                format!(
                    "page size must be <= {}, got {}",
                    self.config.max_page_size, page.size
                ),
            ));
        }

        let distances = self
            .search
            .find_social_distances(target, self.config.max_depth, limits)
            .await?;
        if distances.is_empty() {
            return Ok(Page::empty(&page));
        }

        let existing_friends = self
            .friendships
            .accepted_friend_ids(target)
            .await
            .map_err(|e| Error::provider_unavailable(FRIENDSHIP_PROVIDER, e))?;

        let ranked = self
            .ranker
            .rank(target, &distances, &existing_friends, (self.clock)())
            .await?;
        let result = Page::slice(ranked, &page);

        info!(
            "Generated {} friend recommendations for user {} (page {}, {} total)",
            result.content.len(),
            target,
            page.page,
            result.total_elements
        );

        Ok(result)
    }

    /// Breakdown and clamped strength for a pair of users
    #[instrument(skip(self))]
    pub async fn connection_strength(
        &self,
        user: UserId,
        target: UserId,
    ) -> Result<ConnectionStrengthReport> {
        if user == target {
            return Err(Error::invalid_argument(
                "target_user_id",
                "connection strength needs two distinct users",
            ));
        }

        let breakdown = self.calculator.breakdown(user, target).await?;
        Ok(ConnectionStrengthReport {
            user_id: user,
            target_user_id: target,
            strength: ConnectionStrengthCalculator::strength_from(&breakdown),
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::store::{InMemorySocialGraph, PROFILE_PROVIDER};
    use tokio_util::sync::CancellationToken;

    fn service(graph: Arc<InMemorySocialGraph>) -> RecommendationService {
        RecommendationService::new(
            SocialProviders::from_store(graph),
            RecommendationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_invalid_page_is_rejected_before_search() {
        let graph = Arc::new(InMemorySocialGraph::new());
        // an outage would surface if the search ran
        graph.set_unavailable(FRIENDSHIP_PROVIDER, true);
        let service = service(graph);

        for request in [PageRequest::new(-1, 10), PageRequest::new(0, 0), PageRequest::new(0, -3)] {
            let result = service.get_friend_recommendations(UserId(1), request).await;
            assert!(matches!(result, Err(Error::InvalidArgument { .. })));
        }
    }

    #[tokio::test]
    async fn test_oversized_page_is_rejected() {
        let service = service(Arc::new(InMemorySocialGraph::new()));
        let result = service
            .get_friend_recommendations(UserId(1), PageRequest::new(0, 1000))
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument { argument: "size", .. })));
    }

    #[tokio::test]
    async fn test_cancellation_is_distinct_from_empty_result() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph.befriend(1, 2).befriend(2, 3);
        let service = service(graph);

        let token = CancellationToken::new();
        token.cancel();
        let result = service
            .get_friend_recommendations_with_limits(
                UserId(1),
                PageRequest::new(0, 10),
                SearchLimits::unbounded().with_cancellation(token),
            )
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_connection_strength_report() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph.add_conversation(1, 2);
        let service = service(graph);

        let report = service.connection_strength(UserId(1), UserId(2)).await.unwrap();
        assert_eq!(report.breakdown.len(), 5);
        assert!((report.strength - 0.4).abs() < 1e-12);

        assert!(service.connection_strength(UserId(1), UserId(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_connection_strength_fails_when_providers_are_down() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph.befriend(1, 2);
        graph
            .set_unavailable(FRIENDSHIP_PROVIDER, true)
            .set_unavailable(PROFILE_PROVIDER, true);
        let service = service(graph);

        let result = service.connection_strength(UserId(1), UserId(2)).await;
        assert!(matches!(result, Err(Error::ProviderUnavailable { .. })));
    }
}
