//! In-memory adapters for every store trait.
//!
//! Each adapter carries an `unavailable` switch so callers can simulate an
//! outage of one collaborator without touching the others.

use super::{
    BehaviorLog, BehaviorQuery, ContentQuery, ContentStore, ContentStores, PinService, Predicate,
    SubscriptionStore,
};
use crate::engine::EngineStores;
use crate::error::{EngineError, Result, StoreError, StoreResult};
use crate::models::{
    BehaviorRecord, ContentItem, ContentType, PinnedItem, SortOrder, Subscription,
    SubscriptionFilters, SubscriptionHistory, SyncCounters, DISCOVERY_TYPES, FEED_TYPES,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

fn check_available(flag: &AtomicBool, what: &str) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Unavailable(format!("{} store offline", what)))
    } else {
        Ok(())
    }
}

// ============================================
// Content
// ============================================

pub struct MemoryContentStore {
    content_type: ContentType,
    items: RwLock<Vec<ContentItem>>,
    unavailable: AtomicBool,
}

impl MemoryContentStore {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            items: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_items(content_type: ContentType, items: Vec<ContentItem>) -> Self {
        Self {
            content_type,
            items: RwLock::new(items),
            unavailable: AtomicBool::new(false),
        }
    }

    pub async fn insert(&self, item: ContentItem) {
        self.items.write().await.push(item);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

fn sort_items(items: &mut [&ContentItem], order: SortOrder) {
    // Undated rows sort last
    match order {
        SortOrder::PublishedDesc => {
            items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        }
        SortOrder::UpdatedDesc => {
            items.sort_by(|a, b| {
                b.updated_at
                    .or(b.published_at)
                    .cmp(&a.updated_at.or(a.published_at))
            });
        }
        SortOrder::Natural => {}
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    async fn find_many(&self, query: &ContentQuery) -> StoreResult<Vec<ContentItem>> {
        check_available(&self.unavailable, self.content_type.as_str())?;

        let items = self.items.read().await;
        let mut matched: Vec<&ContentItem> =
            items.iter().filter(|i| query.filter.matches(i)).collect();
        sort_items(&mut matched, query.order);

        Ok(matched
            .into_iter()
            .skip(query.skip)
            .take(query.take)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &Predicate) -> StoreResult<u64> {
        check_available(&self.unavailable, self.content_type.as_str())?;

        let items = self.items.read().await;
        Ok(items.iter().filter(|i| filter.matches(i)).count() as u64)
    }
}

// ============================================
// Behavior log
// ============================================

#[derive(Default)]
pub struct MemoryBehaviorLog {
    records: RwLock<Vec<BehaviorRecord>>,
    unavailable: AtomicBool,
}

impl MemoryBehaviorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, record: BehaviorRecord) {
        self.records.write().await.push(record);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl BehaviorLog for MemoryBehaviorLog {
    async fn find(&self, query: &BehaviorQuery) -> StoreResult<Vec<BehaviorRecord>> {
        check_available(&self.unavailable, "behavior")?;

        let records = self.records.read().await;
        let mut found: Vec<BehaviorRecord> = records
            .iter()
            .filter(|r| r.user_id == query.user_id)
            .filter(|r| query.actions.contains(&r.action_type))
            .filter(|r| query.since.map(|since| r.created_at >= since).unwrap_or(true))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

// ============================================
// Pins
// ============================================

#[derive(Default)]
pub struct MemoryPinService {
    pins: RwLock<Vec<PinnedItem>>,
    unavailable: AtomicBool,
}

impl MemoryPinService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pin(&self, item: PinnedItem) {
        self.pins.write().await.push(item);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl PinService for MemoryPinService {
    async fn pinned_items(
        &self,
        content_type: Option<ContentType>,
    ) -> StoreResult<Vec<PinnedItem>> {
        check_available(&self.unavailable, "pin")?;

        let pins = self.pins.read().await;
        Ok(pins
            .iter()
            .filter(|p| content_type.map(|ct| p.content_type == ct).unwrap_or(true))
            .cloned()
            .collect())
    }
}

// ============================================
// Subscriptions
// ============================================

#[derive(Default)]
struct SubscriptionTables {
    subscriptions: HashMap<Uuid, Subscription>,
    history: Vec<SubscriptionHistory>,
}

/// Both tables sit behind one lock so `commit_sync` is atomic
#[derive(Default)]
pub struct MemorySubscriptionStore {
    tables: RwLock<SubscriptionTables>,
    unavailable: AtomicBool,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Subscription>> {
        check_available(&self.unavailable, "subscription")?;
        Ok(self.tables.read().await.subscriptions.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Subscription>> {
        check_available(&self.unavailable, "subscription")?;

        let tables = self.tables.read().await;
        let mut subs: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs)
    }

    async fn list_active(&self) -> StoreResult<Vec<Subscription>> {
        check_available(&self.unavailable, "subscription")?;

        let tables = self.tables.read().await;
        let mut subs: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        subs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(subs)
    }

    async fn insert(&self, subscription: Subscription) -> StoreResult<()> {
        check_available(&self.unavailable, "subscription")?;

        let mut tables = self.tables.write().await;
        if tables.subscriptions.contains_key(&subscription.id) {
            return Err(StoreError::Conflict(format!(
                "subscription {} already exists",
                subscription.id
            )));
        }
        tables.subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    async fn update_filters(
        &self,
        id: Uuid,
        filters: SubscriptionFilters,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>> {
        check_available(&self.unavailable, "subscription")?;

        let mut tables = self.tables.write().await;
        Ok(tables.subscriptions.get_mut(&id).map(|sub| {
            sub.filters = filters;
            sub.updated_at = now;
            sub.clone()
        }))
    }

    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>> {
        check_available(&self.unavailable, "subscription")?;

        let mut tables = self.tables.write().await;
        Ok(tables.subscriptions.get_mut(&id).map(|sub| {
            sub.is_active = active;
            sub.updated_at = now;
            sub.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        check_available(&self.unavailable, "subscription")?;

        let mut tables = self.tables.write().await;
        let removed = tables.subscriptions.remove(&id).is_some();
        if removed {
            tables.history.retain(|h| h.subscription_id != id);
        }
        Ok(removed)
    }

    async fn commit_sync(
        &self,
        id: Uuid,
        counters: Option<SyncCounters>,
        history: SubscriptionHistory,
    ) -> StoreResult<()> {
        check_available(&self.unavailable, "subscription")?;

        let mut tables = self.tables.write().await;
        if !tables.subscriptions.contains_key(&id) {
            return Err(StoreError::Conflict(format!(
                "subscription {} no longer exists",
                id
            )));
        }
        if let Some(counters) = counters {
            if let Some(sub) = tables.subscriptions.get_mut(&id) {
                sub.last_sync_at = Some(counters.synced_at);
                sub.last_checked = Some(counters.synced_at);
                sub.total_matched = counters.total_matched;
                sub.new_count = counters.new_count;
            }
        }
        tables.history.push(history);
        Ok(())
    }

    async fn history(&self, id: Uuid, limit: usize) -> StoreResult<Vec<SubscriptionHistory>> {
        check_available(&self.unavailable, "subscription")?;

        let tables = self.tables.read().await;
        Ok(tables
            .history
            .iter()
            .rev()
            .filter(|h| h.subscription_id == id)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============================================
// Fixture snapshot
// ============================================

/// All in-memory adapters, with typed handles kept for failure injection
pub struct MemoryStores {
    pub families: HashMap<ContentType, Arc<MemoryContentStore>>,
    pub behavior: Arc<MemoryBehaviorLog>,
    pub pins: Arc<MemoryPinService>,
    pub subscriptions: Arc<MemorySubscriptionStore>,
}

impl MemoryStores {
    /// Empty adapters for every feed and discovery family
    pub fn new() -> Self {
        let families = FEED_TYPES
            .iter()
            .chain(DISCOVERY_TYPES.iter())
            .map(|ct| (*ct, Arc::new(MemoryContentStore::new(*ct))))
            .collect();

        Self {
            families,
            behavior: Arc::new(MemoryBehaviorLog::new()),
            pins: Arc::new(MemoryPinService::new()),
            subscriptions: Arc::new(MemorySubscriptionStore::new()),
        }
    }

    pub fn family(&self, content_type: ContentType) -> Option<&Arc<MemoryContentStore>> {
        self.families.get(&content_type)
    }

    pub async fn insert_item(&self, item: ContentItem) {
        if let Some(store) = self.families.get(&item.content_type) {
            store.insert(item).await;
        }
    }

    pub fn content_stores(&self) -> ContentStores {
        let mut stores = ContentStores::new();
        for store in self.families.values() {
            stores.register(store.clone() as Arc<dyn ContentStore>);
        }
        stores
    }

    /// Every adapter behind its trait, ready for `FeedEngine::new`
    pub fn engine_stores(&self) -> EngineStores {
        EngineStores {
            content: self.content_stores(),
            behavior: self.behavior.clone(),
            pins: self.pins.clone(),
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl Default for MemoryStores {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON fixture describing every store's contents
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub items: Vec<ContentItem>,
    pub behaviors: Vec<BehaviorRecord>,
    pub subscriptions: Vec<Subscription>,
    pub pins: Vec<PinnedItem>,
}

impl MemorySnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read fixture {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            EngineError::Config(format!("invalid fixture {}: {}", path.display(), e))
        })
    }

    pub async fn into_stores(self) -> Result<MemoryStores> {
        let stores = MemoryStores::new();
        for item in self.items {
            stores.insert_item(item).await;
        }
        for record in self.behaviors {
            stores.behavior.push(record).await;
        }
        for pin in self.pins {
            stores.pins.pin(pin).await;
        }
        for subscription in self.subscriptions {
            stores.subscriptions.insert(subscription).await?;
        }
        Ok(stores)
    }
}
