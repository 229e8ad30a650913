pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use engine::{EngineStores, FeedEngine};
pub use error::{EngineError, Result, StoreError};
pub use services::{
    DiscoveryComposer, DiscoveryScope, DiscoverySort, FeedComposer, FeedTab, HotnessScorer,
    PersonalizationSelector, PersonalizedOutcome, SubscriptionService, SyncEngine, TypeSort,
};
pub use utils::ShuffleMode;
