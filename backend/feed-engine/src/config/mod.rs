use crate::error::{EngineError, Result};
use crate::services::hotness::HotnessWeights;
use serde::Deserialize;
use std::path::PathBuf;

/// Longest behavior window the profile builder accepts
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Longest new-item window a subscription sync accepts
pub const MAX_NEW_WINDOW_HOURS: i64 = MAX_WINDOW_DAYS * 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub feed: FeedConfig,
    pub discovery: DiscoveryConfig,
    pub personalization: PersonalizationConfig,
    pub subscription: SubscriptionConfig,
    pub weights: HotnessWeights,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    /// JSON snapshot used to seed the in-memory stores
    pub fixture_path: Option<PathBuf>,
}

/// Bucket quotas for the recommend feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub hot_ratio: f64,
    pub latest_ratio: f64,
    pub personalized_ratio: f64,
    /// Multiplier applied to each family's hot share before score trimming
    pub hot_overfetch: usize,
    /// Fixed seed for the post-merge shuffle; random when absent
    pub shuffle_seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            hot_ratio: 0.4,
            latest_ratio: 0.3,
            personalized_ratio: 0.3,
            hot_overfetch: 2,
            shuffle_seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub hot_overfetch: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { hot_overfetch: 3 }
    }
}

#[derive(Debug, Clone)]
pub struct PersonalizationConfig {
    /// Rolling behavior window
    pub window_days: i64,
    pub max_profile_types: usize,
    pub max_profile_tags: usize,
    pub max_profile_authors: usize,
    /// Favorite families candidates are drawn from
    pub candidate_types: usize,
    pub type_match_bonus: f64,
    pub author_match_bonus: f64,
    pub view_weight: f64,
    pub favorite_weight: f64,
    /// Bonus for items published within 7 days
    pub week_bonus: f64,
    /// Bonus for items published within 30 days
    pub month_bonus: f64,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            max_profile_types: 5,
            max_profile_tags: 10,
            max_profile_authors: 10,
            candidate_types: 3,
            type_match_bonus: 10.0,
            author_match_bonus: 5.0,
            view_weight: 2.0,
            favorite_weight: 3.0,
            week_bonus: 5.0,
            month_bonus: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Row bound of one sync query
    pub fetch_limit: usize,
    pub new_window_hours: i64,
    pub new_count_cap: u64,
    pub sync_interval_secs: u64,
    pub sync_enabled: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 100,
            new_window_hours: 24,
            new_count_cap: 20,
            sync_interval_secs: 3600,
            sync_enabled: true,
        }
    }
}

/// Flat view of the `FEED_ENGINE_*` environment
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default = "default_service_name")]
    service_name: String,
    fixture_path: Option<PathBuf>,
    weights_path: Option<PathBuf>,

    feed_hot_ratio: Option<f64>,
    feed_latest_ratio: Option<f64>,
    feed_personalized_ratio: Option<f64>,
    feed_hot_overfetch: Option<usize>,
    feed_shuffle_seed: Option<u64>,

    discovery_hot_overfetch: Option<usize>,

    personalization_window_days: Option<i64>,
    personalization_candidate_types: Option<usize>,

    subscription_fetch_limit: Option<usize>,
    subscription_new_window_hours: Option<i64>,
    subscription_new_count_cap: Option<u64>,
    subscription_sync_interval_secs: Option<u64>,
    subscription_sync_enabled: Option<bool>,
}

fn default_service_name() -> String {
    "feed-engine".to_string()
}

impl Config {
    /// Load configuration from `FEED_ENGINE_*` variables (and `.env` when present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let env: EnvSettings = envy::prefixed("FEED_ENGINE_")
            .from_env()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let weights = match &env.weights_path {
            Some(path) => HotnessWeights::from_json_file(path)?,
            None => HotnessWeights::default(),
        };

        let feed_defaults = FeedConfig::default();
        let personalization_defaults = PersonalizationConfig::default();
        let subscription_defaults = SubscriptionConfig::default();

        let config = Config {
            service: ServiceConfig {
                service_name: env.service_name,
                fixture_path: env.fixture_path,
            },
            feed: FeedConfig {
                hot_ratio: env.feed_hot_ratio.unwrap_or(feed_defaults.hot_ratio),
                latest_ratio: env.feed_latest_ratio.unwrap_or(feed_defaults.latest_ratio),
                personalized_ratio: env
                    .feed_personalized_ratio
                    .unwrap_or(feed_defaults.personalized_ratio),
                hot_overfetch: env.feed_hot_overfetch.unwrap_or(feed_defaults.hot_overfetch),
                shuffle_seed: env.feed_shuffle_seed,
            },
            discovery: DiscoveryConfig {
                hot_overfetch: env
                    .discovery_hot_overfetch
                    .unwrap_or(DiscoveryConfig::default().hot_overfetch),
            },
            personalization: PersonalizationConfig {
                window_days: env
                    .personalization_window_days
                    .unwrap_or(personalization_defaults.window_days),
                candidate_types: env
                    .personalization_candidate_types
                    .unwrap_or(personalization_defaults.candidate_types),
                ..personalization_defaults
            },
            subscription: SubscriptionConfig {
                fetch_limit: env
                    .subscription_fetch_limit
                    .unwrap_or(subscription_defaults.fetch_limit),
                new_window_hours: env
                    .subscription_new_window_hours
                    .unwrap_or(subscription_defaults.new_window_hours),
                new_count_cap: env
                    .subscription_new_count_cap
                    .unwrap_or(subscription_defaults.new_count_cap),
                sync_interval_secs: env
                    .subscription_sync_interval_secs
                    .unwrap_or(subscription_defaults.sync_interval_secs),
                sync_enabled: env
                    .subscription_sync_enabled
                    .unwrap_or(subscription_defaults.sync_enabled),
            },
            weights,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("hot_ratio", self.feed.hot_ratio),
            ("latest_ratio", self.feed.latest_ratio),
            ("personalized_ratio", self.feed.personalized_ratio),
        ];
        for (name, ratio) in ratios {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(EngineError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, ratio
                )));
            }
        }
        let sum = self.feed.hot_ratio + self.feed.latest_ratio + self.feed.personalized_ratio;
        if sum > 1.0 + f64::EPSILON {
            return Err(EngineError::Config(format!(
                "bucket ratios must not exceed 1.0, got {}",
                sum
            )));
        }
        if self.feed.hot_overfetch == 0 || self.discovery.hot_overfetch == 0 {
            return Err(EngineError::Config(
                "hot_overfetch must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.personalization.window_days) {
            return Err(EngineError::Config(format!(
                "personalization window_days must be within [1, {}], got {}",
                MAX_WINDOW_DAYS, self.personalization.window_days
            )));
        }
        if self.subscription.fetch_limit == 0 {
            return Err(EngineError::Config(
                "subscription fetch_limit must be positive".to_string(),
            ));
        }
        if !(1..=MAX_NEW_WINDOW_HOURS).contains(&self.subscription.new_window_hours) {
            return Err(EngineError::Config(format!(
                "subscription new_window_hours must be within [1, {}], got {}",
                MAX_NEW_WINDOW_HOURS, self.subscription.new_window_hours
            )));
        }
        if self.subscription.sync_interval_secs == 0 {
            return Err(EngineError::Config(
                "subscription sync_interval_secs must be at least 1".to_string(),
            ));
        }
        self.weights.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: default_service_name(),
                fixture_path: None,
            },
            feed: FeedConfig::default(),
            discovery: DiscoveryConfig::default(),
            personalization: PersonalizationConfig::default(),
            subscription: SubscriptionConfig::default(),
            weights: HotnessWeights::default(),
        }
    }
}
