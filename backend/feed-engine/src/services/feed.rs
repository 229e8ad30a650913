// ============================================
// Feed Composer
// ============================================
//
// Recommend tab, one request:
//
//   FetchHot ─┐
//   FetchLatest ─┼─> Merge -> Dedupe -> Shuffle -> Paginate
//   FetchPersonalized ─┘   (only with a user id)
//
// Buckets and their per-family fan-out run concurrently. A failing family
// contributes nothing instead of failing the page. The shuffle trades
// cursor stability for diversity; pass a seed for reproducible order.

use crate::config::FeedConfig;
use crate::models::{ContentItem, ContentType, DegradeReason, FeedPage, FEED_TYPES};
use crate::services::hotness::HotnessScorer;
use crate::services::latest::LatestSelector;
use crate::services::personalization::PersonalizationSelector;
use crate::store::{ContentQuery, ContentStores, Predicate};
use crate::utils::{dedupe_by_key, paginate, per_type_share, ShuffleMode};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Ordering of a single-family tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSort {
    Latest,
    Hot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedTab {
    /// Hot + latest + personalized buckets
    Recommend,
    /// Newest items across every feed family
    Latest,
    /// One family, bypassing the composer
    Type {
        content_type: ContentType,
        sort: TypeSort,
    },
}

/// Target size of each bucket for one composed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketAllocation {
    pub hot: usize,
    pub latest: usize,
    pub personalized: usize,
}

impl BucketAllocation {
    /// `floor(ratio × target)` per bucket; anonymous users get no personalized bucket
    pub fn for_target(target: usize, authenticated: bool, config: &FeedConfig) -> Self {
        let quota = |ratio: f64| (ratio * target as f64).floor() as usize;
        Self {
            hot: quota(config.hot_ratio),
            latest: quota(config.latest_ratio),
            personalized: if authenticated {
                quota(config.personalized_ratio)
            } else {
                0
            },
        }
    }

    pub fn total(&self) -> usize {
        self.hot
            .saturating_add(self.latest)
            .saturating_add(self.personalized)
    }
}

pub struct FeedComposer {
    stores: ContentStores,
    scorer: HotnessScorer,
    latest: LatestSelector,
    personalization: PersonalizationSelector,
    config: FeedConfig,
    shuffle: ShuffleMode,
}

impl FeedComposer {
    pub fn new(
        stores: ContentStores,
        scorer: HotnessScorer,
        personalization: PersonalizationSelector,
        config: FeedConfig,
    ) -> Self {
        let shuffle = ShuffleMode::from_seed(config.shuffle_seed);
        Self {
            latest: LatestSelector::new(stores.clone()),
            stores,
            scorer,
            personalization,
            config,
            shuffle,
        }
    }

    pub fn with_shuffle(mut self, shuffle: ShuffleMode) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// `composeFeed(mode, skip, take, userId?)`
    pub async fn compose(
        &self,
        tab: FeedTab,
        skip: usize,
        take: usize,
        user_id: Option<Uuid>,
    ) -> FeedPage {
        let now = Utc::now();
        let page = match tab {
            FeedTab::Recommend => self.compose_recommend(skip, take, user_id, now).await,
            FeedTab::Latest => self.compose_latest(skip, take).await,
            FeedTab::Type { content_type, sort } => {
                self.compose_type(content_type, sort, skip, take, now).await
            }
        };

        info!(
            tab = ?tab,
            skip = skip,
            take = take,
            returned = page.items.len(),
            total = page.total,
            degraded = page.personalization.is_some(),
            "Feed composed"
        );
        page
    }

    async fn compose_recommend(
        &self,
        skip: usize,
        take: usize,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> FeedPage {
        // Buckets cover the whole window up to the requested page
        let window = skip.saturating_add(take);
        let allocation = BucketAllocation::for_target(window, user_id.is_some(), &self.config);

        let (hot, latest, (personalized, degraded), corpus_total) = tokio::join!(
            self.hot_bucket(allocation.hot, now),
            self.latest.latest_mixed(&FEED_TYPES, allocation.latest),
            self.personalized_bucket(user_id, allocation.personalized, now),
            self.corpus_total(),
        );

        debug!(
            hot = hot.len(),
            latest = latest.len(),
            personalized = personalized.len(),
            "Feed buckets fetched"
        );

        // Bucket priority on collision: hot > latest > personalized
        let mut merged = hot;
        merged.extend(latest);
        merged.extend(personalized);

        let mut composed = dedupe_by_key(merged);
        self.shuffle.shuffle(&mut composed);

        FeedPage {
            total: composed.len(),
            items: paginate(composed, skip, take),
            corpus_total: Some(corpus_total),
            personalization: degraded,
        }
    }

    async fn compose_latest(&self, skip: usize, take: usize) -> FeedPage {
        let (items, corpus_total) = tokio::join!(
            self.latest.latest_mixed(&FEED_TYPES, skip.saturating_add(take)),
            self.corpus_total(),
        );

        FeedPage {
            total: items.len(),
            items: paginate(items, skip, take),
            corpus_total: Some(corpus_total),
            personalization: None,
        }
    }

    async fn compose_type(
        &self,
        content_type: ContentType,
        sort: TypeSort,
        skip: usize,
        take: usize,
        now: DateTime<Utc>,
    ) -> FeedPage {
        let items_fut = async {
            match sort {
                TypeSort::Latest => self
                    .latest
                    .latest_for_type(content_type, Predicate::active(), skip, take)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(content_type = %content_type, error = %e, "Type tab fetch failed, using empty result");
                        Vec::new()
                    }),
                TypeSort::Hot => {
                    let query = ContentQuery::latest(
                        content_type,
                        Predicate::active(),
                        skip.saturating_add(take)
                            .saturating_mul(self.config.hot_overfetch),
                    );
                    let fetched = self.stores.find_many_or_empty(content_type, &query).await;
                    paginate(self.scorer.rank(fetched, now), skip, take)
                }
            }
        };
        let active = Predicate::active();
        let (items, count) =
            tokio::join!(items_fut, self.stores.count_or_zero(content_type, &active));

        FeedPage {
            items,
            total: count as usize,
            corpus_total: Some(count),
            personalization: None,
        }
    }

    /// Top `count` by hotness across all feed families
    async fn hot_bucket(&self, count: usize, now: DateTime<Utc>) -> Vec<ContentItem> {
        if count == 0 {
            return Vec::new();
        }

        let share = per_type_share(count, FEED_TYPES.len());
        let fetch_size = share.saturating_mul(self.config.hot_overfetch);

        let fetches = FEED_TYPES.into_iter().map(|ct| {
            let query = ContentQuery::latest(ct, Predicate::active(), fetch_size);
            async move {
                let fetched = self.stores.find_many_or_empty(ct, &query).await;
                let mut ranked = self.scorer.rank(fetched, now);
                ranked.truncate(share);
                ranked
            }
        });

        // Families score on different scales; the merged list is ranked on the generic one
        let merged: Vec<ContentItem> = join_all(fetches).await.into_iter().flatten().collect();
        let mut ranked = self.scorer.rank_generic(merged, now);
        ranked.truncate(count);
        ranked
    }

    async fn personalized_bucket(
        &self,
        user_id: Option<Uuid>,
        count: usize,
        now: DateTime<Utc>,
    ) -> (Vec<ContentItem>, Option<DegradeReason>) {
        match user_id {
            Some(user_id) if count > 0 => self
                .personalization
                .select(user_id, count, now)
                .await
                .into_parts(),
            _ => (Vec::new(), None),
        }
    }

    /// Servable corpus size across feed families; failing families count as zero
    async fn corpus_total(&self) -> u64 {
        let active = Predicate::active();
        let counts = FEED_TYPES
            .into_iter()
            .map(|ct| self.stores.count_or_zero(ct, &active));
        join_all(counts).await.into_iter().sum()
    }
}
