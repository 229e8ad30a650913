use crate::error::Result;
use crate::models::{ContentItem, ContentType};
use crate::store::{ContentQuery, ContentStores, Predicate};
use crate::utils::per_type_share;
use futures::future::join_all;
use tracing::debug;

/// Descending-by-date queries, one per family
#[derive(Clone)]
pub struct LatestSelector {
    stores: ContentStores,
}

impl LatestSelector {
    pub fn new(stores: ContentStores) -> Self {
        Self { stores }
    }

    /// Newest `take` items of one family after `skip`
    pub async fn latest_for_type(
        &self,
        content_type: ContentType,
        filter: Predicate,
        skip: usize,
        take: usize,
    ) -> Result<Vec<ContentItem>> {
        let query = ContentQuery::new(filter, content_type.recency_order(), skip, take);
        self.stores.find_many(content_type, &query).await
    }

    /// Newest `count` active items across `types`, fetched concurrently.
    ///
    /// Each family gets an equal share; a failing family contributes nothing.
    pub async fn latest_mixed(&self, types: &[ContentType], count: usize) -> Vec<ContentItem> {
        if count == 0 || types.is_empty() {
            return Vec::new();
        }

        let share = per_type_share(count, types.len());
        let fetches = types.iter().map(|ct| {
            let query = ContentQuery::latest(*ct, Predicate::active(), share);
            let stores = &self.stores;
            async move { stores.find_many_or_empty(*ct, &query).await }
        });

        let mut merged: Vec<ContentItem> = join_all(fetches).await.into_iter().flatten().collect();
        sort_by_recency(&mut merged);
        merged.truncate(count);

        debug!(requested = count, returned = merged.len(), "Latest selection completed");
        merged
    }
}

/// Stable newest-first sort on each item's natural recency field; undated items last
pub fn sort_by_recency(items: &mut [ContentItem]) {
    items.sort_by(|a, b| b.recency().cmp(&a.recency()));
}
