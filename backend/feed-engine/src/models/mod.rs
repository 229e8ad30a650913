use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Content families served by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Paper,
    Video,
    Repo,
    Model,
    Job,
    Post,
    News,
}

/// Families mixed by the home feed
pub const FEED_TYPES: [ContentType; 6] = [
    ContentType::Paper,
    ContentType::Video,
    ContentType::Repo,
    ContentType::Model,
    ContentType::Job,
    ContentType::Post,
];

/// Families browsable from the discovery page
pub const DISCOVERY_TYPES: [ContentType; 6] = [
    ContentType::Paper,
    ContentType::Video,
    ContentType::Repo,
    ContentType::Model,
    ContentType::News,
    ContentType::Post,
];

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Paper => "paper",
            ContentType::Video => "video",
            ContentType::Repo => "repo",
            ContentType::Model => "model",
            ContentType::Job => "job",
            ContentType::Post => "post",
            ContentType::News => "news",
        }
    }

    /// Text fields a keyword is matched against
    pub fn searchable_fields(&self) -> &'static [TextField] {
        match self {
            ContentType::Video => &[TextField::Title],
            _ => &[TextField::Title, TextField::Summary],
        }
    }

    /// Recency order natural to the family.
    /// Repositories and models are ranked by last update, everything else by publish date.
    pub fn recency_order(&self) -> SortOrder {
        match self {
            ContentType::Repo | ContentType::Model => SortOrder::UpdatedDesc,
            _ => SortOrder::PublishedDesc,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paper" | "papers" => Ok(ContentType::Paper),
            "video" | "videos" => Ok(ContentType::Video),
            "repo" | "repos" | "repository" => Ok(ContentType::Repo),
            "model" | "models" => Ok(ContentType::Model),
            "job" | "jobs" => Ok(ContentType::Job),
            "post" | "posts" => Ok(ContentType::Post),
            "news" => Ok(ContentType::News),
            other => Err(format!("unknown content type: {}", other)),
        }
    }
}

/// Searchable text columns of a content record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    /// title / repository name
    Title,
    /// abstract / description / body
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    PublishedDesc,
    UpdatedDesc,
    /// Whatever the store returns by default
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Active,
    Hidden,
    Deleted,
}

/// Engagement counters. Each family fills the subset it tracks, the rest stay zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngagementCounters {
    pub view_count: u64,
    pub like_count: u64,
    pub favorite_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub play_count: u64,
    pub citation_count: u64,
    pub stars_count: u64,
    pub forks_count: u64,
    pub downloads: u64,
}

/// Projection of a stored record of any family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub counters: EngagementCounters,
    #[serde(default, deserialize_with = "packed_list")]
    pub tags: Vec<String>,
    /// Authors, uploader or owner depending on the family
    #[serde(default, deserialize_with = "packed_list")]
    pub authors: Vec<String>,
    #[serde(default)]
    pub status: ContentStatus,
    /// Ranking score attached while composing, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ContentItem {
    pub fn new(content_type: ContentType, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type,
            title: title.into(),
            summary: String::new(),
            published_at: None,
            updated_at: None,
            counters: EngagementCounters::default(),
            tags: Vec::new(),
            authors: Vec::new(),
            status: ContentStatus::Active,
            score: None,
        }
    }

    pub fn key(&self) -> ContentKey {
        ContentKey {
            content_type: self.content_type,
            id: self.id.clone(),
        }
    }

    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Title => &self.title,
            TextField::Summary => &self.summary,
        }
    }

    /// Timestamp used by the family's natural recency order
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        match self.content_type.recency_order() {
            SortOrder::UpdatedDesc => self.updated_at.or(self.published_at),
            _ => self.published_at.or(self.updated_at),
        }
    }
}

/// Composite identity used for deduplication across families
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentKey {
    pub content_type: ContentType,
    pub id: String,
}

/// Parse the timestamp formats content stores emit. Returns `None` on anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Split a packed list column: either a JSON array or a comma/semicolon separated string.
pub fn split_packed_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
            return values
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
        }
    }
    trimmed
        .split([',', ';'])
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Value::String(s) => parse_timestamp(&s),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }))
}

fn packed_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => split_packed_list(&s),
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

// ============================================
// Behavior log
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    View,
    Favorite,
    Unfavorite,
    Comment,
    Share,
}

/// Immutable user action, written by external callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorRecord {
    pub user_id: Uuid,
    pub action_type: ActionType,
    pub content_type: ContentType,
    pub content_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Value,
}

/// Preferences derived from recent behavior, most frequent first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationProfile {
    pub favorite_types: Vec<ContentType>,
    pub favorite_tags: Vec<String>,
    pub favorite_authors: Vec<String>,
}

impl PersonalizationProfile {
    pub fn is_empty(&self) -> bool {
        self.favorite_types.is_empty()
            && self.favorite_tags.is_empty()
            && self.favorite_authors.is_empty()
    }
}

// ============================================
// Subscriptions
// ============================================

/// Filter lists as stored: each field is a JSON-encoded string array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilters {
    pub keywords: Option<String>,
    pub tags: Option<String>,
    /// Authors, uploaders or owners depending on the subscribed family
    pub authors: Option<String>,
}

impl SubscriptionFilters {
    pub fn from_lists(keywords: &[&str], tags: &[&str], authors: &[&str]) -> Self {
        fn encode(values: &[&str]) -> Option<String> {
            if values.is_empty() {
                None
            } else {
                serde_json::to_string(values).ok()
            }
        }

        Self {
            keywords: encode(keywords),
            tags: encode(tags),
            authors: encode(authors),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_type: ContentType,
    pub filters: SubscriptionFilters,
    pub is_active: bool,
    pub notify_enabled: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
    pub total_matched: u64,
    pub new_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub content_type: ContentType,
    pub filters: SubscriptionFilters,
    #[serde(default = "default_true")]
    pub notify_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Subscription {
    pub fn from_new(new: NewSubscription, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            content_type: new.content_type,
            filters: new.filters,
            is_active: true,
            notify_enabled: new.notify_enabled,
            last_sync_at: None,
            last_checked: None,
            total_matched: 0,
            new_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    /// Fired once right after creation
    Initial,
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
}

/// Append-only audit row, one per sync attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionHistory {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub sync_type: SyncType,
    pub matched_count: u64,
    pub new_count: u64,
    pub status: SyncStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters written back to a subscription after a successful sync
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncCounters {
    pub synced_at: DateTime<Utc>,
    pub total_matched: u64,
    pub new_count: u64,
}

/// Result of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub matched_count: u64,
    pub new_count: u64,
}

// ============================================
// Pins and pages
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedItem {
    pub content_type: ContentType,
    pub content_id: String,
    pub pinned_at: DateTime<Utc>,
}

/// Why the personalized bucket fell back to latest content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DegradeReason {
    /// No usable behavior history for the user
    ColdStart,
    /// A store call failed while personalizing
    Failure(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<ContentItem>,
    /// Size of the composed window the page was sliced from
    pub total: usize,
    /// Sum of per-family counts, when they were computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_total: Option<u64>,
    /// Set when the personalized bucket degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalization: Option<DegradeReason>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryPage {
    pub items: Vec<ContentItem>,
    pub total: u64,
    pub pinned_items: Vec<ContentItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedContentPage {
    pub items: Vec<ContentItem>,
    pub total: u64,
    pub subscription_id: Option<Uuid>,
}
