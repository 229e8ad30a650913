// ============================================
// Discovery Composer
// ============================================
//
// Browse page over the discovery families. Two sorts (hot, latest), one
// family or all of them mixed. Only active items are shown.
//
// Pinned items are an overlay: fetched alongside the page, returned in their
// own array and never counted against `take`.

use crate::config::DiscoveryConfig;
use crate::error::{EngineError, Result};
use crate::models::{
    ContentItem, ContentKey, ContentType, DiscoveryPage, PinnedItem, SortOrder, DISCOVERY_TYPES,
};
use crate::services::hotness::HotnessScorer;
use crate::services::latest::sort_by_recency;
use crate::store::{ContentQuery, ContentStores, PinService, Predicate};
use crate::utils::{paginate, InnerWindow};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryScope {
    /// Every discovery family except news, mixed
    All,
    Type(ContentType),
}

impl DiscoveryScope {
    /// Families mixed by `All`
    pub fn mixed_types() -> Vec<ContentType> {
        DISCOVERY_TYPES
            .into_iter()
            .filter(|ct| *ct != ContentType::News)
            .collect()
    }

    fn has_pinned_overlay(&self) -> bool {
        matches!(self, DiscoveryScope::All | DiscoveryScope::Type(ContentType::News))
    }

    fn pin_filter(&self) -> Option<ContentType> {
        match self {
            DiscoveryScope::All => None,
            DiscoveryScope::Type(ct) => Some(*ct),
        }
    }
}

impl FromStr for DiscoveryScope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(DiscoveryScope::All);
        }
        let content_type = ContentType::from_str(s).map_err(EngineError::InvalidFilter)?;
        if !DISCOVERY_TYPES.contains(&content_type) {
            return Err(EngineError::InvalidFilter(format!(
                "{} is not a discovery content type",
                content_type
            )));
        }
        Ok(DiscoveryScope::Type(content_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoverySort {
    #[default]
    Hot,
    Latest,
}

impl FromStr for DiscoverySort {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Ok(DiscoverySort::Hot),
            "latest" => Ok(DiscoverySort::Latest),
            other => Err(EngineError::InvalidFilter(format!(
                "unknown discovery sort: {}",
                other
            ))),
        }
    }
}

pub struct DiscoveryComposer {
    stores: ContentStores,
    scorer: HotnessScorer,
    pins: Arc<dyn PinService>,
    config: DiscoveryConfig,
}

impl DiscoveryComposer {
    pub fn new(
        stores: ContentStores,
        scorer: HotnessScorer,
        pins: Arc<dyn PinService>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            stores,
            scorer,
            pins,
            config,
        }
    }

    /// `composeDiscovery(contentType, sortType, skip, take)`
    pub async fn compose(
        &self,
        scope: DiscoveryScope,
        sort: DiscoverySort,
        skip: usize,
        take: usize,
    ) -> DiscoveryPage {
        let page_fut = async {
            match scope {
                DiscoveryScope::All => self.compose_mixed(sort, skip, take).await,
                DiscoveryScope::Type(ct) => self.compose_single(ct, sort, skip, take).await,
            }
        };
        let pinned_fut = async {
            if scope.has_pinned_overlay() {
                self.pinned_overlay(scope.pin_filter()).await
            } else {
                Vec::new()
            }
        };

        let ((items, total), pinned_items) = tokio::join!(page_fut, pinned_fut);

        debug!(
            scope = ?scope,
            sort = ?sort,
            returned = items.len(),
            total = total,
            pinned = pinned_items.len(),
            "Discovery page composed"
        );

        DiscoveryPage {
            items,
            total,
            pinned_items,
        }
    }

    async fn compose_single(
        &self,
        content_type: ContentType,
        sort: DiscoverySort,
        skip: usize,
        take: usize,
    ) -> (Vec<ContentItem>, u64) {
        let active = Predicate::active();
        let items_fut = async {
            match sort {
                DiscoverySort::Latest => {
                    let query = ContentQuery::new(
                        Predicate::active(),
                        content_type.recency_order(),
                        skip,
                        take,
                    );
                    self.stores.find_many_or_empty(content_type, &query).await
                }
                DiscoverySort::Hot => {
                    let ranked = self.hot_window(content_type, skip.saturating_add(take)).await;
                    paginate(ranked, skip, take)
                }
            }
        };

        tokio::join!(items_fut, self.stores.count_or_zero(content_type, &active))
    }

    /// Mixed page: the outer page maps onto the same page index in every
    /// family, each family filling `ceil(take / families)` slots.
    async fn compose_mixed(
        &self,
        sort: DiscoverySort,
        skip: usize,
        take: usize,
    ) -> (Vec<ContentItem>, u64) {
        let types = DiscoveryScope::mixed_types();
        let window = InnerWindow::for_page(skip, take, types.len());

        let fetches = types.iter().map(|ct| {
            let ct = *ct;
            async move {
                match sort {
                    DiscoverySort::Latest => {
                        let query = ContentQuery::new(
                            Predicate::active(),
                            ct.recency_order(),
                            window.skip,
                            window.take,
                        );
                        self.stores.find_many_or_empty(ct, &query).await
                    }
                    DiscoverySort::Hot => {
                        let ranked = self.hot_window(ct, window.end()).await;
                        paginate(ranked, window.skip, window.take)
                    }
                }
            }
        });

        let active = Predicate::active();
        let counts = types.iter().map(|ct| self.stores.count_or_zero(*ct, &active));

        let (pages, counts) = tokio::join!(join_all(fetches), join_all(counts));

        let merged: Vec<ContentItem> = pages.into_iter().flatten().collect();
        let mut merged = match sort {
            DiscoverySort::Latest => {
                let mut merged = merged;
                sort_by_recency(&mut merged);
                merged
            }
            DiscoverySort::Hot => self.scorer.rank_generic(merged, Utc::now()),
        };
        merged.truncate(take);

        (merged, counts.into_iter().sum())
    }

    /// Over-fetch recent active items and rank the top `window` by hotness
    async fn hot_window(&self, content_type: ContentType, window: usize) -> Vec<ContentItem> {
        if window == 0 {
            return Vec::new();
        }
        let query = ContentQuery::latest(
            content_type,
            Predicate::active(),
            window.saturating_mul(self.config.hot_overfetch),
        );
        let fetched = self.stores.find_many_or_empty(content_type, &query).await;
        let mut ranked = self.scorer.rank(fetched, Utc::now());
        ranked.truncate(window);
        ranked
    }

    /// Pinned content, most recently pinned first; failures yield no overlay
    async fn pinned_overlay(&self, content_type: Option<ContentType>) -> Vec<ContentItem> {
        let pins = match self.pins.pinned_items(content_type).await {
            Ok(pins) => pins,
            Err(e) => {
                warn!(error = %e, "Pin service failed, serving page without pinned items");
                return Vec::new();
            }
        };
        if pins.is_empty() {
            return Vec::new();
        }

        let mut by_type: HashMap<ContentType, Vec<String>> = HashMap::new();
        for pin in &pins {
            by_type
                .entry(pin.content_type)
                .or_default()
                .push(pin.content_id.clone());
        }

        let lookups = by_type.into_iter().map(|(ct, ids)| async move {
            let take = ids.len();
            let filter = Predicate::and(vec![Predicate::active(), Predicate::IdIn(ids)]);
            let query = ContentQuery::new(filter, SortOrder::Natural, 0, take);
            self.stores.find_many_or_empty(ct, &query).await
        });
        let resolved: Vec<ContentItem> = join_all(lookups).await.into_iter().flatten().collect();

        order_by_pins(&pins, resolved)
    }
}

/// Arrange resolved items by `pinned_at` descending, dropping unresolved pins
fn order_by_pins(pins: &[PinnedItem], resolved: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut by_key: HashMap<ContentKey, ContentItem> =
        resolved.into_iter().map(|item| (item.key(), item)).collect();

    let mut ordered: Vec<&PinnedItem> = pins.iter().collect();
    ordered.sort_by(|a, b| b.pinned_at.cmp(&a.pinned_at));

    ordered
        .into_iter()
        .filter_map(|pin| {
            by_key.remove(&ContentKey {
                content_type: pin.content_type,
                id: pin.content_id.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentStatus;
    use crate::store::memory::MemoryStores;
    use chrono::Duration;
    use std::collections::HashSet;

    async fn seeded(per_type: usize) -> MemoryStores {
        let stores = MemoryStores::new();
        let now = Utc::now();
        for ct in DISCOVERY_TYPES {
            for i in 0..per_type {
                let mut item = ContentItem::new(ct, format!("{}-{}", ct, i), format!("{} {}", ct, i));
                item.published_at = Some(now - Duration::hours(i as i64 + 1));
                item.updated_at = item.published_at;
                item.counters.view_count = (i as u64 * 17) % 40;
                item.counters.like_count = (i as u64 * 5) % 25;
                stores.insert_item(item).await;
            }
        }
        stores
    }

    fn composer(stores: &MemoryStores) -> DiscoveryComposer {
        DiscoveryComposer::new(
            stores.content_stores(),
            HotnessScorer::default(),
            stores.pins.clone(),
            DiscoveryConfig::default(),
        )
    }

    async fn pin(stores: &MemoryStores, ct: ContentType, id: &str, minutes_ago: i64) {
        stores
            .pins
            .pin(PinnedItem {
                content_type: ct,
                content_id: id.to_string(),
                pinned_at: Utc::now() - Duration::minutes(minutes_ago),
            })
            .await;
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("all".parse::<DiscoveryScope>().unwrap(), DiscoveryScope::All);
        assert_eq!(
            "news".parse::<DiscoveryScope>().unwrap(),
            DiscoveryScope::Type(ContentType::News)
        );
        assert!("job".parse::<DiscoveryScope>().is_err());
        assert_eq!("LATEST".parse::<DiscoverySort>().unwrap(), DiscoverySort::Latest);
        assert_eq!(DiscoveryScope::mixed_types().len(), 5);
    }

    #[tokio::test]
    async fn test_all_scope_mixes_five_families_without_news() {
        let stores = seeded(10).await;
        let page = composer(&stores)
            .compose(DiscoveryScope::All, DiscoverySort::Latest, 0, 20)
            .await;

        assert_eq!(page.items.len(), 20);
        assert_eq!(page.total, 50);
        assert!(page.items.iter().all(|i| i.content_type != ContentType::News));
        let families: HashSet<_> = page.items.iter().map(|i| i.content_type).collect();
        assert_eq!(families.len(), 5);
    }

    #[tokio::test]
    async fn test_mixed_pages_do_not_overlap() {
        let stores = seeded(10).await;
        let composer = composer(&stores);

        let first = composer
            .compose(DiscoveryScope::All, DiscoverySort::Latest, 0, 10)
            .await;
        let second = composer
            .compose(DiscoveryScope::All, DiscoverySort::Latest, 10, 10)
            .await;

        let first_keys: HashSet<_> = first.items.iter().map(|i| i.key()).collect();
        assert_eq!(second.items.len(), 10);
        assert!(second.items.iter().all(|i| !first_keys.contains(&i.key())));
    }

    #[tokio::test]
    async fn test_hidden_items_are_filtered() {
        let stores = seeded(3).await;
        let mut hidden = ContentItem::new(ContentType::Paper, "paper-hidden", "hidden");
        hidden.published_at = Some(Utc::now());
        hidden.status = ContentStatus::Hidden;
        stores.insert_item(hidden).await;

        let page = composer(&stores)
            .compose(
                DiscoveryScope::Type(ContentType::Paper),
                DiscoverySort::Latest,
                0,
                10,
            )
            .await;
        assert_eq!(page.total, 3);
        assert!(page.items.iter().all(|i| i.id != "paper-hidden"));
    }

    #[tokio::test]
    async fn test_hot_single_family_is_score_ordered() {
        let stores = seeded(12).await;
        let page = composer(&stores)
            .compose(
                DiscoveryScope::Type(ContentType::Video),
                DiscoverySort::Hot,
                0,
                6,
            )
            .await;
        let scores: Vec<f64> = page.items.iter().filter_map(|i| i.score).collect();
        assert_eq!(scores.len(), 6);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(page.pinned_items.is_empty());
    }

    #[tokio::test]
    async fn test_pinned_overlay_is_separate_and_ordered() {
        let stores = seeded(5).await;
        pin(&stores, ContentType::News, "news-3", 30).await;
        pin(&stores, ContentType::Paper, "paper-4", 5).await;
        pin(&stores, ContentType::News, "news-missing", 1).await;
        let composer = composer(&stores);

        let page = composer
            .compose(DiscoveryScope::All, DiscoverySort::Latest, 0, 5)
            .await;
        let pinned: Vec<&str> = page.pinned_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(pinned, vec!["paper-4", "news-3"]);
        assert_eq!(page.items.len(), 5);

        let news = composer
            .compose(
                DiscoveryScope::Type(ContentType::News),
                DiscoverySort::Latest,
                0,
                5,
            )
            .await;
        let pinned: Vec<&str> = news.pinned_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(pinned, vec!["news-3"]);

        let papers = composer
            .compose(
                DiscoveryScope::Type(ContentType::Paper),
                DiscoverySort::Latest,
                0,
                5,
            )
            .await;
        assert!(papers.pinned_items.is_empty());
    }

    #[tokio::test]
    async fn test_pin_service_failure_drops_overlay_only() {
        let stores = seeded(4).await;
        pin(&stores, ContentType::News, "news-0", 1).await;
        stores.pins.set_unavailable(true);

        let page = composer(&stores)
            .compose(DiscoveryScope::All, DiscoverySort::Latest, 0, 10)
            .await;
        assert!(page.pinned_items.is_empty());
        assert_eq!(page.items.len(), 10);
    }

    #[tokio::test]
    async fn test_failing_family_counts_as_zero() {
        let stores = seeded(4).await;
        if let Some(family) = stores.family(ContentType::Repo) {
            family.set_unavailable(true);
        }

        let page = composer(&stores)
            .compose(DiscoveryScope::All, DiscoverySort::Hot, 0, 20)
            .await;
        assert_eq!(page.total, 16);
        assert!(page.items.iter().all(|i| i.content_type != ContentType::Repo));
    }

    #[tokio::test]
    async fn test_extreme_skip_returns_empty_page() {
        let stores = seeded(3).await;
        let composer = composer(&stores);

        for scope in [DiscoveryScope::All, DiscoveryScope::Type(ContentType::Repo)] {
            let page = composer
                .compose(scope, DiscoverySort::Hot, usize::MAX - 1, 10)
                .await;
            assert!(page.items.is_empty());
        }
    }
}
