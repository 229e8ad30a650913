// ============================================
// Personalization Profile Builder
// ============================================
//
// Rebuilt on every personalized request from the rolling behavior window;
// nothing is cached so the profile always reflects the latest actions.
//
// Signals:
// 1. favorite types   - frequency of view/favorite/comment per family
// 2. favorite tags    - tags carried in action metadata
// 3. favorite authors - authors carried in action metadata
// 4. favorites        - favorite/unfavorite replay over the full history

use crate::config::PersonalizationConfig;
use crate::error::Result;
use crate::models::{
    split_packed_list, ActionType, BehaviorRecord, ContentKey, ContentType,
    PersonalizationProfile,
};
use crate::store::{BehaviorLog, BehaviorQuery};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Actions that count towards the profile window
const PROFILE_ACTIONS: [ActionType; 3] =
    [ActionType::View, ActionType::Favorite, ActionType::Comment];

/// Everything the selector needs to know about a user
#[derive(Debug, Clone, Default)]
pub struct UserSignals {
    pub profile: PersonalizationProfile,
    /// Family with the most views inside the window
    pub most_viewed_type: Option<ContentType>,
    /// Items currently favorited, most recently favorited first
    pub favorites: Vec<ContentKey>,
}

impl UserSignals {
    pub fn has_history(&self) -> bool {
        !self.profile.is_empty() || !self.favorites.is_empty() || self.most_viewed_type.is_some()
    }

    /// Distinct favorited families in favorite order
    pub fn favorited_types(&self) -> Vec<ContentType> {
        let mut seen = HashSet::new();
        self.favorites
            .iter()
            .map(|k| k.content_type)
            .filter(|ct| seen.insert(*ct))
            .collect()
    }

    pub fn favorited_ids(&self, content_type: ContentType) -> Vec<String> {
        self.favorites
            .iter()
            .filter(|k| k.content_type == content_type)
            .map(|k| k.id.clone())
            .collect()
    }
}

pub struct ProfileBuilder {
    behavior: Arc<dyn BehaviorLog>,
    config: PersonalizationConfig,
}

impl ProfileBuilder {
    pub fn new(behavior: Arc<dyn BehaviorLog>, config: PersonalizationConfig) -> Self {
        Self { behavior, config }
    }

    /// Read the behavior window and favorite history for `user_id`
    pub async fn load_signals(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<UserSignals> {
        let window = BehaviorQuery {
            user_id,
            actions: PROFILE_ACTIONS.to_vec(),
            // An unrepresentable window reads the whole history
            since: Duration::try_days(self.config.window_days)
                .and_then(|window| now.checked_sub_signed(window)),
        };
        let favorites = BehaviorQuery {
            user_id,
            actions: vec![ActionType::Favorite, ActionType::Unfavorite],
            since: None,
        };

        let (window_records, favorite_records) =
            tokio::join!(self.behavior.find(&window), self.behavior.find(&favorites));
        let window_records = window_records?;
        let favorite_records = favorite_records?;

        let signals = UserSignals {
            profile: self.profile_from_records(&window_records),
            most_viewed_type: most_viewed_type(&window_records),
            favorites: replay_favorites(favorite_records),
        };

        debug!(
            user_id = %user_id,
            window_records = window_records.len(),
            favorite_types = signals.profile.favorite_types.len(),
            favorites = signals.favorites.len(),
            "Personalization signals loaded"
        );

        Ok(signals)
    }

    /// Rank families, tags and authors by frequency within `records`
    pub fn profile_from_records(&self, records: &[BehaviorRecord]) -> PersonalizationProfile {
        let relevant: Vec<&BehaviorRecord> = records
            .iter()
            .filter(|r| PROFILE_ACTIONS.contains(&r.action_type))
            .collect();

        let favorite_types = rank_by_frequency(
            relevant.iter().map(|r| r.content_type),
            self.config.max_profile_types,
        );
        let favorite_tags = rank_by_frequency(
            relevant
                .iter()
                .flat_map(|r| metadata_list(&r.metadata, "tags"))
                .map(|t| t.to_lowercase()),
            self.config.max_profile_tags,
        );
        let favorite_authors = rank_by_frequency(
            relevant
                .iter()
                .flat_map(|r| metadata_list(&r.metadata, "authors")),
            self.config.max_profile_authors,
        );

        PersonalizationProfile {
            favorite_types,
            favorite_tags,
            favorite_authors,
        }
    }
}

/// Most frequent first; ties keep first-seen order
fn rank_by_frequency<T, I>(values: I, limit: usize) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (index, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, index)).0 += 1;
    }

    let mut ranked: Vec<(T, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(limit).map(|(value, _)| value).collect()
}

fn most_viewed_type(records: &[BehaviorRecord]) -> Option<ContentType> {
    rank_by_frequency(
        records
            .iter()
            .filter(|r| r.action_type == ActionType::View)
            .map(|r| r.content_type),
        1,
    )
    .into_iter()
    .next()
}

/// Apply favorite/unfavorite actions in time order
fn replay_favorites(mut records: Vec<BehaviorRecord>) -> Vec<ContentKey> {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut current: Vec<ContentKey> = Vec::new();
    for record in records {
        let key = ContentKey {
            content_type: record.content_type,
            id: record.content_id,
        };
        current.retain(|k| k != &key);
        if record.action_type == ActionType::Favorite {
            current.push(key);
        }
    }
    current.reverse();
    current
}

/// List-valued metadata field: JSON array or packed string
fn metadata_list(metadata: &Value, field: &str) -> Vec<String> {
    match metadata.get(field) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(packed)) => split_packed_list(packed),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBehaviorLog;
    use serde_json::json;

    fn record(
        user_id: Uuid,
        action: ActionType,
        ct: ContentType,
        id: &str,
        age_days: i64,
        metadata: Value,
    ) -> BehaviorRecord {
        BehaviorRecord {
            user_id,
            action_type: action,
            content_type: ct,
            content_id: id.to_string(),
            created_at: Utc::now() - Duration::days(age_days),
            metadata,
        }
    }

    #[test]
    fn test_profile_ranks_types_by_frequency() {
        let user = Uuid::new_v4();
        let builder = ProfileBuilder::new(
            Arc::new(MemoryBehaviorLog::new()),
            PersonalizationConfig::default(),
        );
        let records = vec![
            record(user, ActionType::View, ContentType::Video, "v1", 1, json!({})),
            record(user, ActionType::View, ContentType::Paper, "p1", 1, json!({"tags": ["NLP"]})),
            record(user, ActionType::Comment, ContentType::Paper, "p2", 2, json!({"tags": "nlp, cv"})),
            record(user, ActionType::Favorite, ContentType::Paper, "p3", 3, json!({"authors": ["Hinton"]})),
            record(user, ActionType::Share, ContentType::Job, "j1", 1, json!({})),
        ];

        let profile = builder.profile_from_records(&records);
        assert_eq!(
            profile.favorite_types,
            vec![ContentType::Paper, ContentType::Video]
        );
        assert_eq!(profile.favorite_tags, vec!["nlp", "cv"]);
        assert_eq!(profile.favorite_authors, vec!["Hinton"]);
    }

    #[test]
    fn test_profile_caps_types_at_limit() {
        let user = Uuid::new_v4();
        let config = PersonalizationConfig {
            max_profile_types: 2,
            ..PersonalizationConfig::default()
        };
        let builder = ProfileBuilder::new(Arc::new(MemoryBehaviorLog::new()), config);
        let records: Vec<BehaviorRecord> = [
            ContentType::Paper,
            ContentType::Video,
            ContentType::Repo,
            ContentType::Model,
        ]
        .iter()
        .map(|ct| record(user, ActionType::View, *ct, "x", 1, json!({})))
        .collect();

        assert_eq!(builder.profile_from_records(&records).favorite_types.len(), 2);
    }

    #[test]
    fn test_replay_favorites_honours_unfavorite() {
        let user = Uuid::new_v4();
        let records = vec![
            record(user, ActionType::Favorite, ContentType::Paper, "p1", 10, json!({})),
            record(user, ActionType::Favorite, ContentType::Repo, "r1", 8, json!({})),
            record(user, ActionType::Unfavorite, ContentType::Paper, "p1", 5, json!({})),
            record(user, ActionType::Favorite, ContentType::Video, "v1", 1, json!({})),
        ];
        let favorites = replay_favorites(records);
        let ids: Vec<&str> = favorites.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "r1"]);
    }

    #[tokio::test]
    async fn test_load_signals_respects_window() {
        let user = Uuid::new_v4();
        let log = Arc::new(MemoryBehaviorLog::new());
        log.push(record(user, ActionType::View, ContentType::Model, "m1", 45, json!({})))
            .await;
        log.push(record(user, ActionType::View, ContentType::Repo, "r1", 2, json!({})))
            .await;
        log.push(record(user, ActionType::Favorite, ContentType::Paper, "p1", 90, json!({})))
            .await;

        let builder = ProfileBuilder::new(log, PersonalizationConfig::default());
        let signals = builder.load_signals(user, Utc::now()).await.unwrap();

        assert_eq!(signals.profile.favorite_types, vec![ContentType::Repo]);
        assert_eq!(signals.most_viewed_type, Some(ContentType::Repo));
        assert_eq!(signals.favorited_types(), vec![ContentType::Paper]);
        assert!(signals.has_history());
    }

    #[tokio::test]
    async fn test_oversized_window_reads_whole_history() {
        let user = Uuid::new_v4();
        let log = Arc::new(MemoryBehaviorLog::new());
        log.push(record(user, ActionType::View, ContentType::Model, "m1", 900, json!({})))
            .await;

        let config = PersonalizationConfig {
            window_days: 200_000_000,
            ..PersonalizationConfig::default()
        };
        let signals = ProfileBuilder::new(log, config)
            .load_signals(user, Utc::now())
            .await
            .unwrap();

        assert_eq!(signals.most_viewed_type, Some(ContentType::Model));
        assert!(signals.has_history());
    }
}
