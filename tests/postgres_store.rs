use std::sync::Arc;
use std::time::Duration;

use friendgraph::config::{DatabaseConfig, RecommendationConfig};
use friendgraph::database::{run_migrations, Database};
use friendgraph::recommendation::providers::{
    CommentLikeProvider, ConversationProvider, FriendshipProvider, ProfileProvider,
};
use friendgraph::recommendation::{
    PageRequest, PgSocialStore, RecommendationService, SocialProviders, UserId,
};

const BASE: i64 = 9_100_000;

async fn cleanup(db: &Database) {
    let pool = db.pool();
    let upper = BASE + 1000;
    for statement in [
        "DELETE FROM friendships WHERE requester_id BETWEEN $1 AND $2 OR addressee_id BETWEEN $1 AND $2",
        "DELETE FROM conversation_participants WHERE user_id BETWEEN $1 AND $2",
        "DELETE FROM comment_likes WHERE user_id BETWEEN $1 AND $2",
        "DELETE FROM profiles WHERE user_id BETWEEN $1 AND $2",
    ] {
        sqlx::query(statement)
            .bind(BASE)
            .bind(upper)
            .execute(pool)
            .await
            .unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn postgres_store_serves_recommendations() {
    // Run with `cargo test -- --ignored` against a scratch database in DATABASE_URL.
    let Ok(url) = std::env::var("DATABASE_URL") else {
        return;
    };

    let db = Database::new(&DatabaseConfig {
        url,
        max_connections: 4,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(60),
        max_lifetime: Duration::from_secs(300),
        statement_cache_size: 10,
        run_migrations: true,
    })
    .await
    .unwrap();
    run_migrations(db.pool()).await.unwrap();
    cleanup(&db).await;

    let (a, b, c, pending) = (BASE + 1, BASE + 2, BASE + 3, BASE + 4);
    for (requester, addressee, status) in [
        (a, b, "ACCEPTED"),
        (c, b, "ACCEPTED"),
        // the same friendship stored from both sides
        (b, c, "ACCEPTED"),
        (b, a, "ACCEPTED"),
        (a, pending, "PENDING"),
    ] {
        sqlx::query("INSERT INTO friendships (requester_id, addressee_id, status) VALUES ($1, $2, $3)")
            .bind(requester)
            .bind(addressee)
            .bind(status)
            .execute(db.pool())
            .await
            .unwrap();
    }
    for user in [a, c] {
        sqlx::query("INSERT INTO conversation_participants (conversation_id, user_id) VALUES ($1, $2)")
            .bind(BASE)
            .bind(user)
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO comment_likes (user_id, comment_id) VALUES ($1, $2)")
            .bind(user)
            .bind(BASE + 500)
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO profiles (user_id, city) VALUES ($1, 'Porto')")
            .bind(user)
            .execute(db.pool())
            .await
            .unwrap();
    }

    let store = Arc::new(PgSocialStore::new(db.pool().clone()));

    let friends = store.accepted_friend_ids(UserId(a)).await.unwrap();
    assert_eq!(friends.len(), 1);
    assert!(friends.contains(&UserId(b)));
    assert_eq!(store.mutual_friend_count(UserId(a), UserId(c)).await.unwrap(), 1);
    assert!(store.conversation_exists(UserId(a), UserId(c)).await.unwrap());
    assert_eq!(store.common_comment_like_count(UserId(a), UserId(c)).await.unwrap(), 1);
    let profile = store.get_profile(UserId(c)).await.unwrap().unwrap();
    assert_eq!(profile.city.as_deref(), Some("Porto"));
    assert!(store.get_profile(UserId(BASE + 999)).await.unwrap().is_none());

    let service = RecommendationService::new(
        SocialProviders::from_store(store),
        RecommendationConfig::default(),
    );
    let page = service
        .get_friend_recommendations(UserId(a), PageRequest::new(0, 20))
        .await
        .unwrap();

    let ids: Vec<i64> = page.content.iter().map(|r| r.candidate_id.0).collect();
    assert_eq!(ids, vec![c]);
    assert!(page.content[0].breakdown.get("geographic").unwrap() > 0.0);

    cleanup(&db).await;
    db.close().await;
}
