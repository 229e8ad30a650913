// ============================================
// Store Adapters
// ============================================
//
// The engine never owns persistence. Every collaborator is an injected
// trait object:
//
// - ContentStore      per-family findMany / count
// - BehaviorLog       user action history (read-only)
// - PinService        discovery pins
// - SubscriptionStore subscriptions + append-only sync history
//
// `memory` holds in-process implementations used by tests and the
// fixture-backed binary.

pub mod memory;
mod predicate;

pub use predicate::Predicate;

use crate::error::{EngineError, Result, StoreResult};
use crate::models::{
    ActionType, BehaviorRecord, ContentItem, ContentType, PinnedItem, SortOrder, Subscription,
    SubscriptionFilters, SubscriptionHistory, SyncCounters,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// `findMany(where, orderBy, skip, take)`
#[derive(Debug, Clone, PartialEq)]
pub struct ContentQuery {
    pub filter: Predicate,
    pub order: SortOrder,
    pub skip: usize,
    pub take: usize,
}

impl ContentQuery {
    pub fn new(filter: Predicate, order: SortOrder, skip: usize, take: usize) -> Self {
        Self {
            filter,
            order,
            skip,
            take,
        }
    }

    /// Most recent `take` rows in the family's natural recency order
    pub fn latest(content_type: ContentType, filter: Predicate, take: usize) -> Self {
        Self::new(filter, content_type.recency_order(), 0, take)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    fn content_type(&self) -> ContentType;

    async fn find_many(&self, query: &ContentQuery) -> StoreResult<Vec<ContentItem>>;

    async fn count(&self, filter: &Predicate) -> StoreResult<u64>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorQuery {
    pub user_id: Uuid,
    pub actions: Vec<ActionType>,
    /// Lower bound on `created_at`; `None` reads the full history
    pub since: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BehaviorLog: Send + Sync {
    async fn find(&self, query: &BehaviorQuery) -> StoreResult<Vec<BehaviorRecord>>;
}

#[async_trait]
pub trait PinService: Send + Sync {
    /// Pins for one family, or every pin when `content_type` is `None`
    async fn pinned_items(&self, content_type: Option<ContentType>)
        -> StoreResult<Vec<PinnedItem>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Subscription>>;

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Subscription>>;

    async fn list_active(&self) -> StoreResult<Vec<Subscription>>;

    async fn insert(&self, subscription: Subscription) -> StoreResult<()>;

    async fn update_filters(
        &self,
        id: Uuid,
        filters: SubscriptionFilters,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>>;

    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>>;

    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Append `history` and, when `counters` is set, update the subscription's
    /// aggregates. Both writes commit together or not at all.
    async fn commit_sync(
        &self,
        id: Uuid,
        counters: Option<SyncCounters>,
        history: SubscriptionHistory,
    ) -> StoreResult<()>;

    /// Newest first
    async fn history(&self, id: Uuid, limit: usize) -> StoreResult<Vec<SubscriptionHistory>>;
}

/// Content adapters keyed by family
#[derive(Clone, Default)]
pub struct ContentStores {
    stores: HashMap<ContentType, Arc<dyn ContentStore>>,
}

impl ContentStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.register(store);
        self
    }

    pub fn register(&mut self, store: Arc<dyn ContentStore>) {
        self.stores.insert(store.content_type(), store);
    }

    pub fn get(&self, content_type: ContentType) -> Result<&Arc<dyn ContentStore>> {
        self.stores.get(&content_type).ok_or_else(|| {
            EngineError::store(
                content_type,
                crate::error::StoreError::Unavailable("no adapter registered".to_string()),
            )
        })
    }

    pub async fn find_many(
        &self,
        content_type: ContentType,
        query: &ContentQuery,
    ) -> Result<Vec<ContentItem>> {
        self.get(content_type)?
            .find_many(query)
            .await
            .map_err(|e| EngineError::store(content_type, e))
    }

    pub async fn count(&self, content_type: ContentType, filter: &Predicate) -> Result<u64> {
        self.get(content_type)?
            .count(filter)
            .await
            .map_err(|e| EngineError::store(content_type, e))
    }

    /// `find_many` that degrades a failing family to an empty result
    pub async fn find_many_or_empty(
        &self,
        content_type: ContentType,
        query: &ContentQuery,
    ) -> Vec<ContentItem> {
        match self.find_many(content_type, query).await {
            Ok(items) => items,
            Err(e) => {
                warn!(content_type = %content_type, error = %e, "Content fetch failed, using empty result");
                Vec::new()
            }
        }
    }

    /// `count` that degrades a failing family to zero
    pub async fn count_or_zero(&self, content_type: ContentType, filter: &Predicate) -> u64 {
        match self.count(content_type, filter).await {
            Ok(count) => count,
            Err(e) => {
                warn!(content_type = %content_type, error = %e, "Content count failed, using zero");
                0
            }
        }
    }
}
