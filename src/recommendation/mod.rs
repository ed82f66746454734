//! Recommendation Module
//!
//! Friend recommendations from a weighted walk over the social graph.
//!
//! ## Architecture
//!
//! 1. **Factors** - Independent connection-strength signals read through providers
//! 2. **Strength** - Aggregates factors into a breakdown and a clamped [0, 1] score
//! 3. **Distance** - Dijkstra from the target, strong ties are cheaper edges
//! 4. **Ranking** - Excludes self and existing friends, scores `1 / (1 + distance)`
//! 5. **Service** - Validation, orchestration and pagination
//!
//! ## Factor Weights
//!
//! - Mutual friends (0.60): saturates at 5 shared friends
//! - Communication (0.40): any conversation
//! - Common comment likes (0.18): saturates at 10 shared likes
//! - Geographic (0.15): same city
//! - Demographic (0.13): ages within 5 years
//!
//! Weights are not normalized; the aggregate strength is clamped to 1.0.

pub mod distance;
pub mod factors;
pub mod metrics;
pub mod providers;
pub mod ranking;
pub mod service;
pub mod store;
pub mod strength;
pub mod types;

// Re-export the types that are actually used externally
pub use distance::{SearchLimits, SocialDistanceSearch};
pub use providers::{ProviderError, SocialProviders};
pub use service::{ConnectionStrengthReport, RecommendationService};
pub use store::{InMemorySocialGraph, PgSocialStore};
pub use strength::ConnectionStrengthCalculator;
pub use types::{Page, PageRequest, Recommendation, SocialDistanceMap, StrengthBreakdown, UserId};
