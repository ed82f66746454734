//! PostgreSQL-backed providers.
//!
//! Reads the social tables created by `migrations/0001_social_graph.sql`.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::instrument;

use crate::recommendation::providers::{
    CommentLikeProvider, ConversationProvider, FriendshipProvider, ProfileProvider, ProviderError,
    ProviderResult,
};
use crate::recommendation::types::{UserId, UserProfile};

use super::{COMMENT_LIKE_PROVIDER, CONVERSATION_PROVIDER, FRIENDSHIP_PROVIDER, PROFILE_PROVIDER};

/// Database row for profiles
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    city: Option<String>,
    birthdate: Option<NaiveDate>,
}

/// Social data read straight from Postgres
#[derive(Clone)]
pub struct PgSocialStore {
    pool: PgPool,
}

impl PgSocialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FriendshipProvider for PgSocialStore {
    #[instrument(skip(self), level = "trace")]
    async fn accepted_friend_ids(&self, user: UserId) -> ProviderResult<HashSet<UserId>> {
        let rows = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT CASE WHEN requester_id = $1 THEN addressee_id ELSE requester_id END
            FROM friendships
            WHERE status = 'ACCEPTED'
            AND (requester_id = $1 OR addressee_id = $1)
            "#,
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ProviderError::backend(FRIENDSHIP_PROVIDER, e))?;

        Ok(rows.into_iter().map(UserId).collect())
    }

    async fn mutual_friend_count(&self, a: UserId, b: UserId) -> ProviderResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            WITH friends_a AS (
                SELECT CASE WHEN requester_id = $1 THEN addressee_id ELSE requester_id END AS friend_id
                FROM friendships
                WHERE status = 'ACCEPTED' AND (requester_id = $1 OR addressee_id = $1)
            ),
            friends_b AS (
                SELECT CASE WHEN requester_id = $2 THEN addressee_id ELSE requester_id END AS friend_id
                FROM friendships
                WHERE status = 'ACCEPTED' AND (requester_id = $2 OR addressee_id = $2)
            )
            -- both directions of one friendship may be stored
            SELECT COUNT(DISTINCT friend_id) FROM friends_a JOIN friends_b USING (friend_id)
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ProviderError::backend(FRIENDSHIP_PROVIDER, e))?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ConversationProvider for PgSocialStore {
    async fn conversation_exists(&self, a: UserId, b: UserId) -> ProviderResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM conversation_participants pa
                JOIN conversation_participants pb ON pa.conversation_id = pb.conversation_id
                WHERE pa.user_id = $1 AND pb.user_id = $2
            )
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ProviderError::backend(CONVERSATION_PROVIDER, e))?;

        Ok(exists)
    }
}

#[async_trait]
impl CommentLikeProvider for PgSocialStore {
    async fn common_comment_like_count(&self, a: UserId, b: UserId) -> ProviderResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM comment_likes la
            JOIN comment_likes lb ON la.comment_id = lb.comment_id
            WHERE la.user_id = $1 AND lb.user_id = $2
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ProviderError::backend(COMMENT_LIKE_PROVIDER, e))?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ProfileProvider for PgSocialStore {
    async fn get_profile(&self, user: UserId) -> ProviderResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT city, birthdate
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ProviderError::backend(PROFILE_PROVIDER, e))?;

        Ok(row.map(|r| UserProfile {
            city: r.city,
            birthdate: r.birthdate,
        }))
    }
}
