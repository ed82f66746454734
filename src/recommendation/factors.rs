//! Connection Strength Factors
//!
//! Independent signals that each contribute a bounded amount to the strength
//! of a tie between two users:
//! - Mutual friends (0.60): shared accepted friends, saturating at 5
//! - Communication (0.40): any direct conversation
//! - Common comment likes (0.18): comments both users liked, saturating at 10
//! - Geographic (0.15): same city, exact match
//! - Demographic (0.13): ages within 5 years
//!
//! Weights are tuned independently and intentionally do not sum to 1.0; the
//! calculator clamps the total.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;

use super::providers::{
    CommentLikeProvider, ConversationProvider, FriendshipProvider, ProfileProvider, ProviderError,
    SocialProviders,
};
use super::types::{UserId, UserProfile};

pub const MUTUAL_FRIENDS_WEIGHT: f64 = 0.6;
pub const COMMUNICATION_WEIGHT: f64 = 0.4;
pub const COMMON_COMMENT_LIKES_WEIGHT: f64 = 0.18;
pub const GEOGRAPHIC_WEIGHT: f64 = 0.15;
pub const DEMOGRAPHIC_WEIGHT: f64 = 0.13;

/// Mutual friend count at which the factor saturates
const MUTUAL_FRIENDS_SCALE: f64 = 5.0;
/// Common comment like count at which the factor saturates
const COMMON_COMMENT_LIKES_SCALE: f64 = 10.0;
/// Largest age gap, in whole years, that still counts as the same cohort
const MAX_AGE_GAP_YEARS: i64 = 5;

/// Why a single factor could not be evaluated
#[derive(Debug, Error)]
pub enum FactorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid data for user {user}: {message}")]
    InvalidData { user: UserId, message: String },
}

/// One signal of the connection strength model
#[async_trait]
pub trait ConnectionStrengthFactor: Send + Sync {
    /// Key of this factor in a breakdown
    fn name(&self) -> &'static str;

    /// Upper bound of the contribution
    fn weight(&self) -> f64;

    /// Contribution in `[0, weight]` for the pair
    async fn evaluate(&self, user: UserId, target: UserId) -> Result<f64, FactorError>;
}

/// `min(count / scale, 1) * weight`
pub fn normalize(count: u64, scale: f64, weight: f64) -> f64 {
    (count as f64 / scale).min(1.0) * weight
}

/// All production factors, in registration order
pub fn default_factors(providers: &SocialProviders) -> Vec<Box<dyn ConnectionStrengthFactor>> {
    vec![
        Box::new(MutualFriendsFactor::new(providers.friendships.clone())),
        Box::new(CommunicationFactor::new(providers.conversations.clone())),
        Box::new(CommonLikeOnCommentFactor::new(providers.comment_likes.clone())),
        Box::new(GeographicFactor::new(providers.profiles.clone())),
        Box::new(DemographicFactor::new(providers.profiles.clone())),
    ]
}

// ============================================================================
// Mutual friends
// ============================================================================

pub struct MutualFriendsFactor {
    friendships: Arc<dyn FriendshipProvider>,
}

impl MutualFriendsFactor {
    pub fn new(friendships: Arc<dyn FriendshipProvider>) -> Self {
        Self { friendships }
    }
}

#[async_trait]
impl ConnectionStrengthFactor for MutualFriendsFactor {
    fn name(&self) -> &'static str {
        "mutual_friends"
    }

    fn weight(&self) -> f64 {
        MUTUAL_FRIENDS_WEIGHT
    }

    async fn evaluate(&self, user: UserId, target: UserId) -> Result<f64, FactorError> {
        let mutual = self.friendships.mutual_friend_count(user, target).await?;
        Ok(normalize(mutual, MUTUAL_FRIENDS_SCALE, self.weight()))
    }
}

// ============================================================================
// Communication
// ============================================================================

/// Binary: any conversation earns the full weight
pub struct CommunicationFactor {
    conversations: Arc<dyn ConversationProvider>,
}

impl CommunicationFactor {
    pub fn new(conversations: Arc<dyn ConversationProvider>) -> Self {
        Self { conversations }
    }
}

#[async_trait]
impl ConnectionStrengthFactor for CommunicationFactor {
    fn name(&self) -> &'static str {
        "communication"
    }

    fn weight(&self) -> f64 {
        COMMUNICATION_WEIGHT
    }

    async fn evaluate(&self, user: UserId, target: UserId) -> Result<f64, FactorError> {
        let talked = self.conversations.conversation_exists(user, target).await?;
        Ok(if talked { self.weight() } else { 0.0 })
    }
}

// ============================================================================
// Common likes on comments
// ============================================================================

pub struct CommonLikeOnCommentFactor {
    comment_likes: Arc<dyn CommentLikeProvider>,
}

impl CommonLikeOnCommentFactor {
    pub fn new(comment_likes: Arc<dyn CommentLikeProvider>) -> Self {
        Self { comment_likes }
    }
}

#[async_trait]
impl ConnectionStrengthFactor for CommonLikeOnCommentFactor {
    fn name(&self) -> &'static str {
        "common_comment_likes"
    }

    fn weight(&self) -> f64 {
        COMMON_COMMENT_LIKES_WEIGHT
    }

    async fn evaluate(&self, user: UserId, target: UserId) -> Result<f64, FactorError> {
        let common = self
            .comment_likes
            .common_comment_like_count(user, target)
            .await?;
        Ok(normalize(common, COMMON_COMMENT_LIKES_SCALE, self.weight()))
    }
}

// ============================================================================
// Profile based factors
// ============================================================================

async fn profile_pair(
    profiles: &dyn ProfileProvider,
    user: UserId,
    target: UserId,
) -> Result<Option<(UserProfile, UserProfile)>, FactorError> {
    let Some(first) = profiles.get_profile(user).await? else {
        return Ok(None);
    };
    let Some(second) = profiles.get_profile(target).await? else {
        return Ok(None);
    };
    Ok(Some((first, second)))
}

/// Same city, compared exactly as stored
pub struct GeographicFactor {
    profiles: Arc<dyn ProfileProvider>,
}

impl GeographicFactor {
    pub fn new(profiles: Arc<dyn ProfileProvider>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ConnectionStrengthFactor for GeographicFactor {
    fn name(&self) -> &'static str {
        "geographic"
    }

    fn weight(&self) -> f64 {
        GEOGRAPHIC_WEIGHT
    }

    async fn evaluate(&self, user: UserId, target: UserId) -> Result<f64, FactorError> {
        let Some((first, second)) = profile_pair(self.profiles.as_ref(), user, target).await?
        else {
            return Ok(0.0);
        };

        match (first.city, second.city) {
            (Some(a), Some(b)) if a == b => Ok(self.weight()),
            _ => Ok(0.0),
        }
    }
}

/// Ages at most five years apart
pub struct DemographicFactor {
    profiles: Arc<dyn ProfileProvider>,
    reference_date: Option<NaiveDate>,
}

impl DemographicFactor {
    pub fn new(profiles: Arc<dyn ProfileProvider>) -> Self {
        Self {
            profiles,
            reference_date: None,
        }
    }

    /// Compute ages as of a fixed date instead of today
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn age(user: UserId, birthdate: NaiveDate, today: NaiveDate) -> Result<i64, FactorError> {
        today
            .years_since(birthdate)
            .map(i64::from)
            .ok_or_else(|| FactorError::InvalidData {
                user,
                message: format!("birthdate {} is in the future", birthdate),
            })
    }
}

#[async_trait]
impl ConnectionStrengthFactor for DemographicFactor {
    fn name(&self) -> &'static str {
        "demographic"
    }

    fn weight(&self) -> f64 {
        DEMOGRAPHIC_WEIGHT
    }

    async fn evaluate(&self, user: UserId, target: UserId) -> Result<f64, FactorError> {
        let Some((first, second)) = profile_pair(self.profiles.as_ref(), user, target).await?
        else {
            return Ok(0.0);
        };
        let (Some(born_first), Some(born_second)) = (first.birthdate, second.birthdate) else {
            return Ok(0.0);
        };

        let today = self
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let gap = (Self::age(user, born_first, today)? - Self::age(target, born_second, today)?)
            .abs();

        Ok(if gap <= MAX_AGE_GAP_YEARS {
            self.weight()
        } else {
            0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::store::{InMemorySocialGraph, PROFILE_PROVIDER};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_saturates() {
        assert_eq!(normalize(0, 5.0, 0.6), 0.0);
        assert!((normalize(2, 5.0, 0.6) - 0.24).abs() < 1e-12);
        assert_eq!(normalize(5, 5.0, 0.6), 0.6);
        assert_eq!(normalize(50, 5.0, 0.6), 0.6);
    }

    #[tokio::test]
    async fn test_mutual_friends_factor() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph.befriend(1, 10).befriend(1, 11).befriend(2, 10).befriend(2, 11);
        let factor = MutualFriendsFactor::new(graph.clone());

        let score = factor.evaluate(UserId(1), UserId(2)).await.unwrap();
        assert!((score - 0.24).abs() < 1e-12);
        assert_eq!(factor.evaluate(UserId(1), UserId(3)).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_communication_factor_is_binary() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph.add_conversation(1, 2);
        let factor = CommunicationFactor::new(graph.clone());

        assert_eq!(factor.evaluate(UserId(2), UserId(1)).await.unwrap(), 0.4);
        assert_eq!(factor.evaluate(UserId(1), UserId(3)).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_common_comment_likes_factor() {
        let graph = Arc::new(InMemorySocialGraph::new());
        for comment in 0..12 {
            graph.add_comment_like(1, comment).add_comment_like(2, comment);
        }
        graph.add_comment_like(3, 0);
        let factor = CommonLikeOnCommentFactor::new(graph.clone());

        assert_eq!(factor.evaluate(UserId(1), UserId(2)).await.unwrap(), 0.18);
        assert!((factor.evaluate(UserId(1), UserId(3)).await.unwrap() - 0.018).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_geographic_factor_exact_city_match() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph
            .set_profile(1, Some("Berlin"), None)
            .set_profile(2, Some("Berlin"), None)
            .set_profile(3, Some("berlin"), None)
            .set_profile(4, None, None);
        let factor = GeographicFactor::new(graph.clone());

        assert_eq!(factor.evaluate(UserId(1), UserId(2)).await.unwrap(), 0.15);
        assert_eq!(factor.evaluate(UserId(1), UserId(3)).await.unwrap(), 0.0);
        assert_eq!(factor.evaluate(UserId(1), UserId(4)).await.unwrap(), 0.0);
        // no profile at all
        assert_eq!(factor.evaluate(UserId(1), UserId(5)).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_demographic_factor_age_gap() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph
            .set_profile(1, None, Some(date(1990, 3, 1)))
            .set_profile(2, None, Some(date(1995, 2, 1)))
            .set_profile(3, None, Some(date(1984, 1, 1)))
            .set_profile(4, Some("Oslo"), None);
        let factor =
            DemographicFactor::new(graph.clone()).with_reference_date(date(2024, 6, 1));

        // 34 vs 29
        assert_eq!(factor.evaluate(UserId(1), UserId(2)).await.unwrap(), 0.13);
        // 34 vs 40
        assert_eq!(factor.evaluate(UserId(1), UserId(3)).await.unwrap(), 0.0);
        // missing birthdate
        assert_eq!(factor.evaluate(UserId(1), UserId(4)).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_future_birthdate_is_an_evaluation_error() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph
            .set_profile(1, None, Some(date(2030, 1, 1)))
            .set_profile(2, None, Some(date(1990, 1, 1)));
        let factor =
            DemographicFactor::new(graph.clone()).with_reference_date(date(2024, 1, 1));

        assert!(matches!(
            factor.evaluate(UserId(1), UserId(2)).await,
            Err(FactorError::InvalidData { user: UserId(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_profile_outage_surfaces_as_factor_error() {
        let graph = Arc::new(InMemorySocialGraph::new());
        graph.set_unavailable(PROFILE_PROVIDER, true);
        let factor = GeographicFactor::new(graph.clone());

        assert!(matches!(
            factor.evaluate(UserId(1), UserId(2)).await,
            Err(FactorError::Provider(_))
        ));
    }

    #[test]
    fn test_default_factor_registration_order() {
        let providers = SocialProviders::from_store(Arc::new(InMemorySocialGraph::new()));
        let names: Vec<_> = default_factors(&providers).iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "mutual_friends",
                "communication",
                "common_comment_likes",
                "geographic",
                "demographic"
            ]
        );
    }
}
