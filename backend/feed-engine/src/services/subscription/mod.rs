pub mod filter_compiler;
pub mod service;
pub mod sync;

pub use filter_compiler::{compile, validate, FilterTerms};
pub use service::SubscriptionService;
pub use sync::{BulkSyncReport, SyncEngine, SyncFailure};
