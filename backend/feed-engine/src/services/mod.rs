pub mod decay;
pub mod discovery;
pub mod feed;
pub mod hotness;
pub mod latest;
pub mod personalization;
pub mod subscription;

pub use discovery::{DiscoveryComposer, DiscoveryScope, DiscoverySort};
pub use feed::{BucketAllocation, FeedComposer, FeedTab, TypeSort};
pub use hotness::{HotnessScorer, HotnessWeights, TypeWeights};
pub use latest::LatestSelector;
pub use personalization::{PersonalizationSelector, PersonalizedOutcome, ProfileBuilder};
pub use subscription::{BulkSyncReport, SubscriptionService, SyncEngine};
