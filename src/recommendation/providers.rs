//! Read-only data contracts the engine consumes from the surrounding service.
//!
//! Absent data is never an error: a user without friends yields an empty set,
//! a user without a profile yields `Ok(None)`. An `Err` means the backing
//! store could not answer at all.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use super::types::{UserId, UserProfile};

/// Failure of a provider to answer a read
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} provider unavailable: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} provider query failed")]
    Backend {
        provider: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl ProviderError {
    pub fn unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            provider,
            message: message.into(),
        }
    }

    pub fn backend(provider: &'static str, source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable {
                    provider,
                    message: source.to_string(),
                }
            }
            source => Self::Backend { provider, source },
        }
    }

    /// The store could not be reached at all, as opposed to one failed query
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn provider(&self) -> &'static str {
        match self {
            Self::Unavailable { provider, .. } | Self::Backend { provider, .. } => provider,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Accepted friendships
#[async_trait]
pub trait FriendshipProvider: Send + Sync {
    /// Users with an accepted friendship to `user`
    async fn accepted_friend_ids(&self, user: UserId) -> ProviderResult<HashSet<UserId>>;

    /// Neighbours used for traversal; same relation as `accepted_friend_ids`
    async fn friend_ids(&self, user: UserId) -> ProviderResult<HashSet<UserId>> {
        self.accepted_friend_ids(user).await
    }

    async fn mutual_friend_count(&self, a: UserId, b: UserId) -> ProviderResult<u64>;
}

/// Direct messaging
#[async_trait]
pub trait ConversationProvider: Send + Sync {
    async fn conversation_exists(&self, a: UserId, b: UserId) -> ProviderResult<bool>;
}

/// Likes on comments
#[async_trait]
pub trait CommentLikeProvider: Send + Sync {
    /// Number of comments liked by both users
    async fn common_comment_like_count(&self, a: UserId, b: UserId) -> ProviderResult<u64>;
}

/// Profiles
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn get_profile(&self, user: UserId) -> ProviderResult<Option<UserProfile>>;
}

/// Handles to every provider the engine reads from
#[derive(Clone)]
pub struct SocialProviders {
    pub friendships: Arc<dyn FriendshipProvider>,
    pub conversations: Arc<dyn ConversationProvider>,
    pub comment_likes: Arc<dyn CommentLikeProvider>,
    pub profiles: Arc<dyn ProfileProvider>,
}

impl SocialProviders {
    /// Wire a single store that answers every contract
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: FriendshipProvider
            + ConversationProvider
            + CommentLikeProvider
            + ProfileProvider
            + 'static,
    {
        Self {
            friendships: store.clone(),
            conversations: store.clone(),
            comment_likes: store.clone(),
            profiles: store,
        }
    }
}
