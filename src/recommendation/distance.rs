//! Social Distance Search
//!
//! Single-source shortest paths over the accepted-friendship graph. Edges are
//! weighted by connection strength so that strong ties are cheaper to cross:
//!
//! `cost(u, v) = 1.0 - max(strength(u, v), 0.1) * 0.3`
//!
//! which keeps every edge within [0.7, 0.97]. The depth bound applies to the
//! accumulated cost, not to the hop count: a node is only expanded while its
//! settled distance is below `max_depth`, but every reached node is recorded.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

use super::providers::FriendshipProvider;
use super::store::FRIENDSHIP_PROVIDER;
use super::strength::ConnectionStrengthCalculator;
use super::types::{SocialDistanceMap, UserId};

/// Strength floor applied before discounting, so no edge is ever free
pub const MIN_EDGE_STRENGTH: f64 = 0.1;
/// Share of the unit edge cost a maximal strength can remove
pub const STRENGTH_DISCOUNT: f64 = 0.3;

/// Traversal cost of an edge with the given connection strength
pub fn edge_weight(strength: f64) -> f64 {
    1.0 - strength.max(MIN_EDGE_STRENGTH) * STRENGTH_DISCOUNT
}

/// External stop conditions, checked each time a node is popped
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancellationToken>,
}

impl SearchLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check(&self, started: Instant) -> Result<()> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::DeadlineExceeded {
                    elapsed_ms: now.duration_since(started).as_millis() as u64,
                });
            }
        }
        Ok(())
    }
}

/// Priority queue entry; ordered so that `BinaryHeap` pops the smallest
/// distance first and breaks ties by the smaller user id.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    distance: f64,
    user: UserId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.user.cmp(&self.user))
    }
}

/// Dijkstra over the friendship graph with strength-derived edge costs
#[derive(Clone)]
pub struct SocialDistanceSearch {
    friendships: Arc<dyn FriendshipProvider>,
    calculator: ConnectionStrengthCalculator,
}

impl SocialDistanceSearch {
    pub fn new(
        friendships: Arc<dyn FriendshipProvider>,
        calculator: ConnectionStrengthCalculator,
    ) -> Self {
        Self {
            friendships,
            calculator,
        }
    }

    /// Distances from `start` to every user reached within `max_depth`.
    ///
    /// `start` is never part of the result. A negative depth is rejected, a
    /// zero depth yields an empty map. Friend list failures and unreachable
    /// factor providers abort the search.
    #[instrument(skip(self, limits), fields(start = %start))]
    pub async fn find_social_distances(
        &self,
        start: UserId,
        max_depth: i32,
        limits: &SearchLimits,
    ) -> Result<SocialDistanceMap> {
        if max_depth < 0 {
            return Err(Error::invalid_argument(
                "max_depth",
                format!("max depth must be >= 0, got {}", max_depth),
            ));
        }
        let max_depth = f64::from(max_depth);
        let started = Instant::now();

        let mut distances: SocialDistanceMap = HashMap::new();
        let mut visited: HashSet<UserId> = HashSet::new();
        let mut queue = BinaryHeap::new();

        distances.insert(start, 0.0);
        queue.push(QueueEntry {
            distance: 0.0,
            user: start,
        });

        let mut edges_relaxed = 0usize;

        while let Some(QueueEntry { distance, user }) = queue.pop() {
            limits.check(started)?;

            if !visited.insert(user) {
                continue;
            }
            if distance >= max_depth {
                continue;
            }

            let friends = self
                .friendships
                .friend_ids(user)
                .await
                .map_err(|e| Error::provider_unavailable(FRIENDSHIP_PROVIDER, e))?;

            // sorted so strength lookups happen in a reproducible order
            let mut friends: Vec<UserId> = friends.into_iter().collect();
            friends.sort_unstable();

            for friend in friends {
                if visited.contains(&friend) {
                    continue;
                }
                let strength = self.calculator.connection_strength(user, friend).await?;
                let candidate = distance + edge_weight(strength);
                edges_relaxed += 1;

                let improved = distances
                    .get(&friend)
                    .map_or(true, |&known| candidate < known);
                if improved {
                    distances.insert(friend, candidate);
                    queue.push(QueueEntry {
                        distance: candidate,
                        user: friend,
                    });
                }
            }
        }

        distances.remove(&start);

        debug!(
            reached = distances.len(),
            nodes_settled = visited.len(),
            edges_relaxed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Social distance search finished"
        );

        Ok(distances)
    }
}
