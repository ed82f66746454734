//! In-process social graph.
//!
//! Deterministic backing store for tests and local runs. Friendships are
//! symmetric and only accepted ones are visible through the providers.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::recommendation::providers::{
    CommentLikeProvider, ConversationProvider, FriendshipProvider, ProfileProvider, ProviderError,
    ProviderResult,
};
use crate::recommendation::types::{UserId, UserProfile};

use super::{COMMENT_LIKE_PROVIDER, CONVERSATION_PROVIDER, FRIENDSHIP_PROVIDER, PROFILE_PROVIDER};

#[derive(Debug, Default)]
struct GraphState {
    accepted: HashMap<UserId, BTreeSet<UserId>>,
    pending: HashSet<(UserId, UserId)>,
    conversations: HashSet<(UserId, UserId)>,
    comment_likes: HashMap<UserId, HashSet<i64>>,
    profiles: HashMap<UserId, UserProfile>,
    unavailable: HashSet<&'static str>,
}

/// Social graph held in memory behind a lock
#[derive(Debug, Default)]
pub struct InMemorySocialGraph {
    state: RwLock<GraphState>,
}

fn ordered(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an accepted friendship between `a` and `b`
    pub fn befriend(&self, a: i64, b: i64) -> &Self {
        let (a, b) = (UserId(a), UserId(b));
        if a == b {
            return self;
        }
        let mut state = self.write();
        state.pending.remove(&ordered(a, b));
        state.accepted.entry(a).or_default().insert(b);
        state.accepted.entry(b).or_default().insert(a);
        self
    }

    /// Record a friendship request that has not been accepted yet
    pub fn request_friendship(&self, from: i64, to: i64) -> &Self {
        let (from, to) = (UserId(from), UserId(to));
        self.write().pending.insert(ordered(from, to));
        self
    }

    pub fn add_conversation(&self, a: i64, b: i64) -> &Self {
        let (a, b) = (UserId(a), UserId(b));
        self.write().conversations.insert(ordered(a, b));
        self
    }

    pub fn add_comment_like(&self, user: i64, comment_id: i64) -> &Self {
        self.write()
            .comment_likes
            .entry(UserId(user))
            .or_default()
            .insert(comment_id);
        self
    }

    pub fn set_profile(
        &self,
        user: i64,
        city: Option<&str>,
        birthdate: Option<NaiveDate>,
    ) -> &Self {
        self.write().profiles.insert(
            UserId(user),
            UserProfile {
                city: city.map(str::to_string),
                birthdate,
            },
        );
        self
    }

    /// Make every read through the named provider fail, or restore it
    pub fn set_unavailable(&self, provider: &'static str, unavailable: bool) -> &Self {
        let mut state = self.write();
        if unavailable {
            state.unavailable.insert(provider);
        } else {
            state.unavailable.remove(provider);
        }
        self
    }

    fn check(state: &GraphState, provider: &'static str) -> ProviderResult<()> {
        if state.unavailable.contains(provider) {
            return Err(ProviderError::unavailable(provider, "store marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl FriendshipProvider for InMemorySocialGraph {
    async fn accepted_friend_ids(&self, user: UserId) -> ProviderResult<HashSet<UserId>> {
        let state = self.read();
        Self::check(&state, FRIENDSHIP_PROVIDER)?;
        Ok(state
            .accepted
            .get(&user)
            .map(|friends| friends.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn mutual_friend_count(&self, a: UserId, b: UserId) -> ProviderResult<u64> {
        let state = self.read();
        Self::check(&state, FRIENDSHIP_PROVIDER)?;
        let count = match (state.accepted.get(&a), state.accepted.get(&b)) {
            (Some(fa), Some(fb)) => fa.intersection(fb).count(),
            _ => 0,
        };
        Ok(count as u64)
    }
}

#[async_trait]
impl ConversationProvider for InMemorySocialGraph {
    async fn conversation_exists(&self, a: UserId, b: UserId) -> ProviderResult<bool> {
        let state = self.read();
        Self::check(&state, CONVERSATION_PROVIDER)?;
        Ok(state.conversations.contains(&ordered(a, b)))
    }
}

#[async_trait]
impl CommentLikeProvider for InMemorySocialGraph {
    async fn common_comment_like_count(&self, a: UserId, b: UserId) -> ProviderResult<u64> {
        let state = self.read();
        Self::check(&state, COMMENT_LIKE_PROVIDER)?;
        let count = match (state.comment_likes.get(&a), state.comment_likes.get(&b)) {
            (Some(la), Some(lb)) => la.intersection(lb).count(),
            _ => 0,
        };
        Ok(count as u64)
    }
}

#[async_trait]
impl ProfileProvider for InMemorySocialGraph {
    async fn get_profile(&self, user: UserId) -> ProviderResult<Option<UserProfile>> {
        let state = self.read();
        Self::check(&state, PROFILE_PROVIDER)?;
        Ok(state.profiles.get(&user).cloned())
    }
}
