// ============================================
// Personalized Candidate Selector
// ============================================
//
// 1. Load user signals (profile window + favorites)
// 2. Collect authors of favorited papers
// 3. Fetch recent candidates from the top favorite families, skipping saved items
// 4. Backfill from the most viewed family when short
// 5. Score and keep the top `count`
//
// Any failure along the way degrades to latest content; personalization is
// never allowed to take the feed down.

use super::profile_builder::{ProfileBuilder, UserSignals};
use super::PersonalizedOutcome;
use crate::config::PersonalizationConfig;
use crate::error::Result;
use crate::models::{ContentItem, ContentType, DegradeReason, SortOrder, FEED_TYPES};
use crate::services::hotness::sort_by_score;
use crate::services::latest::LatestSelector;
use crate::store::{ContentQuery, ContentStores, Predicate};
use crate::utils::{dedupe_by_key, per_type_share};
use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct PersonalizationSelector {
    stores: ContentStores,
    builder: ProfileBuilder,
    latest: LatestSelector,
    config: PersonalizationConfig,
}

impl PersonalizationSelector {
    pub fn new(
        stores: ContentStores,
        builder: ProfileBuilder,
        latest: LatestSelector,
        config: PersonalizationConfig,
    ) -> Self {
        Self {
            stores,
            builder,
            latest,
            config,
        }
    }

    /// Up to `count` items tailored to `user_id`, or latest content when that fails
    pub async fn select(&self, user_id: Uuid, count: usize, now: DateTime<Utc>) -> PersonalizedOutcome {
        if count == 0 {
            return PersonalizedOutcome::Personalized(Vec::new());
        }

        let reason = match self.try_select(user_id, count, now).await {
            Ok(Some(items)) => {
                info!(user_id = %user_id, count = items.len(), "Personalized selection completed");
                return PersonalizedOutcome::Personalized(items);
            }
            Ok(None) => {
                debug!(user_id = %user_id, "No behavior history, falling back to latest");
                DegradeReason::ColdStart
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Personalization failed, falling back to latest");
                DegradeReason::Failure(e.to_string())
            }
        };

        let items = self.latest.latest_mixed(&FEED_TYPES, count).await;
        PersonalizedOutcome::Degraded { items, reason }
    }

    /// `Ok(None)` when the user has no usable history
    async fn try_select(
        &self,
        user_id: Uuid,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<ContentItem>>> {
        let signals = self.builder.load_signals(user_id, now).await?;
        if !signals.has_history() {
            return Ok(None);
        }

        let favorite_types = Self::preferred_types(&signals);
        let favorite_authors = self.favorited_paper_authors(&signals).await?;

        let candidate_types: Vec<ContentType> = favorite_types
            .iter()
            .copied()
            .take(self.config.candidate_types)
            .collect();
        let mut candidates = self
            .fetch_candidates(&candidate_types, &signals, count)
            .await?;

        if candidates.len() < count {
            if let Some(backfill_type) = signals.most_viewed_type {
                let backfill = self
                    .fetch_backfill(backfill_type, &signals, &candidates, count - candidates.len())
                    .await?;
                debug!(
                    user_id = %user_id,
                    content_type = %backfill_type,
                    backfilled = backfill.len(),
                    "Backfilled personalized candidates"
                );
                candidates.extend(backfill);
            }
        }

        let type_set: HashSet<ContentType> = favorite_types.into_iter().collect();
        let mut scored: Vec<ContentItem> = dedupe_by_key(candidates)
            .into_iter()
            .map(|mut item| {
                item.score = Some(self.score_candidate(&item, &type_set, &favorite_authors, now));
                item
            })
            .collect();
        sort_by_score(&mut scored);
        scored.truncate(count);

        Ok(Some(scored))
    }

    /// Profile families first, then favorited families not already listed
    fn preferred_types(signals: &UserSignals) -> Vec<ContentType> {
        let mut types = signals.profile.favorite_types.clone();
        for ct in signals.favorited_types() {
            if !types.contains(&ct) {
                types.push(ct);
            }
        }
        types
    }

    /// Lower-cased union of authors across favorited papers
    async fn favorited_paper_authors(&self, signals: &UserSignals) -> Result<Vec<String>> {
        let paper_ids = signals.favorited_ids(ContentType::Paper);
        if paper_ids.is_empty() {
            return Ok(Vec::new());
        }

        let take = paper_ids.len();
        let query = ContentQuery::new(Predicate::IdIn(paper_ids), SortOrder::Natural, 0, take);
        let papers = self.stores.find_many(ContentType::Paper, &query).await?;

        let mut seen = HashSet::new();
        Ok(papers
            .into_iter()
            .flat_map(|p| p.authors)
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty() && seen.insert(a.clone()))
            .collect())
    }

    async fn fetch_candidates(
        &self,
        types: &[ContentType],
        signals: &UserSignals,
        count: usize,
    ) -> Result<Vec<ContentItem>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        let share = per_type_share(count, types.len());
        let fetches = types.iter().map(|ct| {
            let filter = Predicate::and(vec![
                Predicate::active(),
                Predicate::exclude_ids(signals.favorited_ids(*ct)),
            ]);
            let query = ContentQuery::latest(*ct, filter, share);
            let stores = &self.stores;
            async move { stores.find_many(*ct, &query).await }
        });

        Ok(try_join_all(fetches).await?.into_iter().flatten().collect())
    }

    async fn fetch_backfill(
        &self,
        content_type: ContentType,
        signals: &UserSignals,
        collected: &[ContentItem],
        missing: usize,
    ) -> Result<Vec<ContentItem>> {
        let mut excluded = signals.favorited_ids(content_type);
        excluded.extend(
            collected
                .iter()
                .filter(|i| i.content_type == content_type)
                .map(|i| i.id.clone()),
        );

        let filter = Predicate::and(vec![Predicate::active(), Predicate::exclude_ids(excluded)]);
        let query = ContentQuery::latest(content_type, filter, missing);
        self.stores.find_many(content_type, &query).await
    }

    /// Type match + favorited-author match + engagement + freshness
    pub fn score_candidate(
        &self,
        item: &ContentItem,
        favorite_types: &HashSet<ContentType>,
        favorite_authors: &[String],
        now: DateTime<Utc>,
    ) -> f64 {
        let c = &self.config;
        let mut score = 0.0;

        if favorite_types.contains(&item.content_type) {
            score += c.type_match_bonus;
        }

        if item.content_type == ContentType::Paper && !favorite_authors.is_empty() {
            let matches = item
                .authors
                .iter()
                .filter(|a| favorite_authors.contains(&a.trim().to_lowercase()))
                .count();
            score += c.author_match_bonus * matches as f64;
        }

        score += c.view_weight * ((item.counters.view_count as f64) + 1.0).ln();
        score += c.favorite_weight * ((item.counters.favorite_count as f64) + 1.0).ln();

        if let Some(published) = item.published_at.or(item.updated_at) {
            let age = now - published;
            if age < Duration::days(7) {
                score += c.week_bonus;
            } else if age < Duration::days(30) {
                score += c.month_bonus;
            }
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionType, BehaviorRecord};
    use crate::store::memory::MemoryStores;
    use serde_json::json;

    fn selector(stores: &MemoryStores) -> PersonalizationSelector {
        selector_with(stores, PersonalizationConfig::default())
    }

    fn selector_with(stores: &MemoryStores, config: PersonalizationConfig) -> PersonalizationSelector {
        let content = stores.content_stores();
        PersonalizationSelector::new(
            content.clone(),
            ProfileBuilder::new(stores.behavior.clone(), config.clone()),
            LatestSelector::new(content),
            config,
        )
    }

    fn item(ct: ContentType, id: &str, age_days: i64, authors: &[&str]) -> ContentItem {
        let mut item = ContentItem::new(ct, id, id);
        item.published_at = Some(Utc::now() - Duration::days(age_days));
        item.authors = authors.iter().map(|a| a.to_string()).collect();
        item
    }

    async fn act(stores: &MemoryStores, user: Uuid, action: ActionType, ct: ContentType, id: &str) {
        stores
            .behavior
            .push(BehaviorRecord {
                user_id: user,
                action_type: action,
                content_type: ct,
                content_id: id.to_string(),
                created_at: Utc::now() - Duration::hours(1),
                metadata: json!({}),
            })
            .await;
    }

    #[test]
    fn test_score_candidate_components() {
        let stores = MemoryStores::new();
        let selector = selector(&stores);
        let now = Utc::now();

        let mut paper = item(ContentType::Paper, "p1", 3, &["Alice", "Bob"]);
        paper.counters.view_count = 0;
        paper.counters.favorite_count = 0;

        let types: HashSet<ContentType> = [ContentType::Paper].into_iter().collect();
        let authors = vec!["alice".to_string(), "bob".to_string()];

        // 10 type + 2 × 5 authors + 5 freshness
        let score = selector.score_candidate(&paper, &types, &authors, now);
        assert!((score - 25.0).abs() < 1e-9);

        let old_video = item(ContentType::Video, "v1", 20, &["Alice"]);
        // Authors only count for papers; 20 days old earns the month bonus
        let score = selector.score_candidate(&old_video, &types, &authors, now);
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_select_excludes_favorited_items() {
        let stores = MemoryStores::new();
        let user = Uuid::new_v4();
        for (id, age) in [("p1", 1), ("p2", 2), ("p3", 3)] {
            stores.insert_item(item(ContentType::Paper, id, age, &["Alice"])).await;
        }
        stores.insert_item(item(ContentType::Paper, "p4", 4, &["Carol"])).await;
        act(&stores, user, ActionType::Favorite, ContentType::Paper, "p1").await;

        let outcome = selector(&stores).select(user, 3, Utc::now()).await;
        assert!(!outcome.is_degraded());

        let ids: Vec<&str> = outcome.items().iter().map(|i| i.id.as_str()).collect();
        assert!(!ids.contains(&"p1"));
        assert_eq!(ids.len(), 3);
        // Alice favorites boost p2/p3 above p4
        assert_eq!(ids[2], "p4");
    }

    #[tokio::test]
    async fn test_backfill_from_most_viewed_type() {
        let stores = MemoryStores::new();
        let user = Uuid::new_v4();
        stores.insert_item(item(ContentType::Video, "v1", 1, &[])).await;
        stores.insert_item(item(ContentType::Video, "v2", 2, &[])).await;
        for id in ["r7", "r8", "r9"] {
            act(&stores, user, ActionType::Comment, ContentType::Repo, id).await;
        }
        act(&stores, user, ActionType::View, ContentType::Video, "v9").await;
        act(&stores, user, ActionType::View, ContentType::Video, "v8").await;

        // Only the top family (repos, which have no content) is queried directly
        let config = PersonalizationConfig {
            candidate_types: 1,
            ..PersonalizationConfig::default()
        };
        let outcome = selector_with(&stores, config).select(user, 4, Utc::now()).await;
        assert!(!outcome.is_degraded());
        assert!(outcome
            .items()
            .iter()
            .all(|i| i.content_type == ContentType::Video));
        assert_eq!(outcome.items().len(), 2);
    }

    #[tokio::test]
    async fn test_cold_start_degrades_to_latest() {
        let stores = MemoryStores::new();
        stores.insert_item(item(ContentType::Job, "j1", 1, &[])).await;

        let outcome = selector(&stores).select(Uuid::new_v4(), 5, Utc::now()).await;
        match outcome {
            PersonalizedOutcome::Degraded { items, reason } => {
                assert_eq!(reason, DegradeReason::ColdStart);
                assert_eq!(items.len(), 1);
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_latest() {
        let stores = MemoryStores::new();
        let user = Uuid::new_v4();
        stores.insert_item(item(ContentType::Job, "j1", 1, &[])).await;
        act(&stores, user, ActionType::View, ContentType::Paper, "p1").await;
        stores.behavior.set_unavailable(true);

        let outcome = selector(&stores).select(user, 5, Utc::now()).await;
        assert!(outcome.is_degraded());
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::Failure(_))
        ));
        assert_eq!(outcome.items().len(), 1);
    }
}
