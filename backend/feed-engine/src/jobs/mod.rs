// ============================================
// Background Jobs
// ============================================
//
// Contains background job runners for:
// 1. Scheduled subscription sync
//
// Started from the binary; a web layer embedding the library can spawn the
// same runner next to its server.

pub mod subscription_sync;

pub use subscription_sync::{
    start_subscription_sync, SubscriptionSyncJob, SubscriptionSyncJobConfig,
};
