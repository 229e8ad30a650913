//! Integration Tests: Subscription Sync
//!
//! Coverage:
//! - Keyword phrases expand into OR-ed single-word terms
//! - Failed sync appends a failed history row and keeps the counters
//! - New-item count window and cap
//! - Creation triggers an initial sync without waiting for it
//! - Subscribed content view

use chrono::{Duration, Utc};
use feed_engine::models::{
    ContentItem, ContentType, NewSubscription, SubscriptionFilters, SyncStatus, SyncType,
};
use feed_engine::store::memory::MemoryStores;
use feed_engine::store::SubscriptionStore;
use feed_engine::{Config, EngineError, FeedEngine};
use std::time::Duration as StdDuration;
use uuid::Uuid;

async fn add(stores: &MemoryStores, ct: ContentType, id: &str, title: &str, age_hours: i64) {
    let mut item = ContentItem::new(ct, id, title);
    item.published_at = Some(Utc::now() - Duration::hours(age_hours));
    item.updated_at = item.published_at;
    stores.insert_item(item).await;
}

fn subscription(user_id: Uuid, ct: ContentType, keywords: &[&str]) -> NewSubscription {
    NewSubscription {
        user_id,
        content_type: ct,
        filters: SubscriptionFilters::from_lists(keywords, &[], &[]),
        notify_enabled: true,
    }
}

/// Poll until the background initial sync has written its history row
async fn wait_for_history(stores: &MemoryStores, id: Uuid) -> usize {
    for _ in 0..100 {
        let history = stores.subscriptions.history(id, 10).await.unwrap();
        if !history.is_empty() {
            return history.len();
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    0
}

#[tokio::test]
async fn test_phrase_keywords_match_any_term() {
    let stores = MemoryStores::new();
    add(&stores, ContentType::Paper, "p-a", "alpha methods", 1).await;
    add(&stores, ContentType::Paper, "p-b", "beta methods", 1).await;
    add(&stores, ContentType::Paper, "p-ab", "alpha beta", 1).await;
    add(&stores, ContentType::Paper, "p-none", "gamma methods", 1).await;

    let engine = FeedEngine::new(&Config::default(), stores.engine_stores());
    let created = engine
        .subscriptions()
        .create(subscription(Uuid::new_v4(), ContentType::Paper, &["alpha beta"]))
        .await
        .unwrap();
    wait_for_history(&stores, created.id).await;

    let result = engine.sync_subscription(created.id).await.unwrap();
    assert_eq!(result.matched_count, 3);
}

#[tokio::test]
async fn test_failed_sync_keeps_counters_and_records_history() {
    let stores = MemoryStores::new();
    for i in 0..4 {
        add(&stores, ContentType::Video, &format!("v{}", i), "rust tutorial", 2).await;
    }
    let engine = FeedEngine::new(&Config::default(), stores.engine_stores());
    let created = engine
        .subscriptions()
        .create(subscription(Uuid::new_v4(), ContentType::Video, &["rust"]))
        .await
        .unwrap();
    assert_eq!(wait_for_history(&stores, created.id).await, 1);

    let before = stores.subscriptions.get(created.id).await.unwrap().unwrap();
    assert_eq!(before.total_matched, 4);
    assert_eq!(before.new_count, 4);

    stores
        .family(ContentType::Video)
        .expect("video adapter")
        .set_unavailable(true);

    let err = engine.sync_subscription(created.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::StoreUnavailable {
            content_type: ContentType::Video,
            ..
        }
    ));

    let after = stores.subscriptions.get(created.id).await.unwrap().unwrap();
    assert_eq!(after.total_matched, before.total_matched);
    assert_eq!(after.new_count, before.new_count);
    assert_eq!(after.last_sync_at, before.last_sync_at);

    let history = engine.subscriptions().history(created.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, SyncStatus::Failed);
    assert_eq!(history[0].sync_type, SyncType::Manual);
    assert!(history[0].error_message.is_some());
    assert_eq!(history[1].status, SyncStatus::Success);
    assert_eq!(history[1].sync_type, SyncType::Initial);
}

#[tokio::test]
async fn test_new_count_window_and_cap() {
    let stores = MemoryStores::new();
    for i in 0..25 {
        add(&stores, ContentType::Repo, &format!("fresh-{}", i), "vector db", 3).await;
    }
    for i in 0..5 {
        add(&stores, ContentType::Repo, &format!("old-{}", i), "vector db", 48).await;
    }

    let engine = FeedEngine::new(&Config::default(), stores.engine_stores());
    let created = engine
        .subscriptions()
        .create(subscription(Uuid::new_v4(), ContentType::Repo, &["vector"]))
        .await
        .unwrap();
    wait_for_history(&stores, created.id).await;

    let result = engine.sync_subscription(created.id).await.unwrap();
    assert_eq!(result.matched_count, 30);
    assert_eq!(result.new_count, 20);
}

#[tokio::test]
async fn test_create_returns_even_when_initial_sync_fails() {
    let stores = MemoryStores::new();
    stores
        .family(ContentType::Job)
        .expect("job adapter")
        .set_unavailable(true);
    let engine = FeedEngine::new(&Config::default(), stores.engine_stores());

    let created = engine
        .subscriptions()
        .create(subscription(Uuid::new_v4(), ContentType::Job, &["rust"]))
        .await
        .unwrap();
    assert_eq!(wait_for_history(&stores, created.id).await, 1);

    let history = stores.subscriptions.history(created.id, 10).await.unwrap();
    assert_eq!(history[0].status, SyncStatus::Failed);
    assert_eq!(history[0].sync_type, SyncType::Initial);

    let sub = stores.subscriptions.get(created.id).await.unwrap().unwrap();
    assert_eq!(sub.last_sync_at, None);
    assert_eq!(sub.total_matched, 0);
}

#[tokio::test]
async fn test_sync_unknown_subscription() {
    let stores = MemoryStores::new();
    let engine = FeedEngine::new(&Config::default(), stores.engine_stores());
    let missing = Uuid::new_v4();

    let err = engine.sync_subscription(missing).await.unwrap_err();
    assert!(matches!(err, EngineError::SubscriptionNotFound(id) if id == missing));
    assert!(stores.subscriptions.history(missing, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_subscribed_content_uses_active_subscription() {
    let stores = MemoryStores::new();
    add(&stores, ContentType::Post, "post-1", "Rust async patterns", 1).await;
    add(&stores, ContentType::Post, "post-2", "Gardening tips", 2).await;
    add(&stores, ContentType::Post, "post-3", "Async cancellation", 3).await;

    let engine = FeedEngine::new(&Config::default(), stores.engine_stores());
    let user = Uuid::new_v4();
    let created = engine
        .subscriptions()
        .create(subscription(user, ContentType::Post, &["async"]))
        .await
        .unwrap();

    let page = engine
        .get_subscribed_content(user, ContentType::Post, 0, 10)
        .await
        .unwrap();
    assert_eq!(page.subscription_id, Some(created.id));
    assert_eq!(page.total, 2);
    let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["post-1", "post-3"]);

    engine
        .subscriptions()
        .set_active(created.id, false)
        .await
        .unwrap();
    let paused = engine
        .get_subscribed_content(user, ContentType::Post, 0, 10)
        .await
        .unwrap();
    assert_eq!(paused.subscription_id, None);
    assert!(paused.items.is_empty());
}
