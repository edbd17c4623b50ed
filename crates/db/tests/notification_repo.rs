//! Integration tests for `NotificationRepo`.

use filmgen_db::models::notification::NewNotification;
use filmgen_db::repositories::NotificationRepo;
use serde_json::json;
use sqlx::PgPool;

async fn seed_user(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (display_name, email) VALUES ('Reviewer', $1) RETURNING id")
        .bind(email)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn notice(user_id: i64) -> NewNotification {
    NewNotification {
        user_id,
        event_type: "regeneration.requested".to_string(),
        title: "New regeneration request".to_string(),
        message: "Harbor at dawn needs review".to_string(),
        action_url: Some("/projects/1/regeneration-requests/7".to_string()),
        metadata: json!({ "source_entity_id": 7 }),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_create_all_stores_every_row(pool: PgPool) {
    let owner = seed_user(&pool, "owner@example.com").await;
    let admin = seed_user(&pool, "admin@example.com").await;

    let ids = NotificationRepo::create_all(&pool, &[notice(owner), notice(admin)])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    assert_eq!(NotificationRepo::unread_count(&pool, owner).await.unwrap(), 1);
    let inbox = NotificationRepo::list_for_user(&pool, admin, true, 10, 0)
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].event_type, "regeneration.requested");
    assert_eq!(inbox[0].metadata["source_entity_id"], 7);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_create_all_is_all_or_nothing(pool: PgPool) {
    let owner = seed_user(&pool, "owner@example.com").await;

    // The second recipient does not exist, so the foreign key fails.
    let result = NotificationRepo::create_all(&pool, &[notice(owner), notice(owner + 1000)]).await;

    assert!(result.is_err());
    assert_eq!(NotificationRepo::unread_count(&pool, owner).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_mark_read_once(pool: PgPool) {
    let owner = seed_user(&pool, "owner@example.com").await;
    let ids = NotificationRepo::create_all(&pool, &[notice(owner)]).await.unwrap();

    assert!(NotificationRepo::mark_read(&pool, ids[0], owner).await.unwrap());
    assert!(!NotificationRepo::mark_read(&pool, ids[0], owner).await.unwrap());
    assert_eq!(NotificationRepo::unread_count(&pool, owner).await.unwrap(), 0);
}
