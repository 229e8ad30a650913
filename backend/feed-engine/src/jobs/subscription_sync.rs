// ============================================
// Subscription Sync Job
// ============================================
//
// Re-evaluates every active subscription on a fixed interval.
//
// Workflow:
// 1. List active subscriptions
// 2. Sync them one by one (failures are recorded per subscription)
// 3. Log a cycle summary and sleep until the next pass

use crate::config::SubscriptionConfig;
use crate::services::subscription::{BulkSyncReport, SyncEngine};
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SubscriptionSyncJobConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Delay before the first pass
    pub initial_delay: Duration,
}

impl From<&SubscriptionConfig> for SubscriptionSyncJobConfig {
    fn from(config: &SubscriptionConfig) -> Self {
        Self {
            enabled: config.sync_enabled,
            interval: Duration::from_secs(config.sync_interval_secs),
            initial_delay: Duration::from_secs(5),
        }
    }
}

pub struct SubscriptionSyncJob {
    engine: Arc<SyncEngine>,
    config: SubscriptionSyncJobConfig,
}

impl SubscriptionSyncJob {
    pub fn new(engine: Arc<SyncEngine>, config: SubscriptionSyncJobConfig) -> Self {
        Self { engine, config }
    }

    /// One pass over all active subscriptions
    pub async fn run_cycle(&self) -> anyhow::Result<BulkSyncReport> {
        let report = self
            .engine
            .sync_all_active()
            .await
            .context("failed to list active subscriptions")?;

        for failure in &report.failures {
            warn!(
                subscription_id = %failure.subscription_id,
                error = %failure.error,
                "Scheduled subscription sync failed"
            );
        }

        Ok(report)
    }

    /// Loop forever, one cycle per interval
    pub async fn run(self) {
        if !self.config.enabled {
            info!("Subscription sync disabled by configuration");
            return;
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting subscription sync background job"
        );

        sleep(self.config.initial_delay).await;

        loop {
            let cycle_start = Instant::now();

            match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        attempted = report.attempted,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        matched_total = report.matched_total,
                        duration_ms = cycle_start.elapsed().as_millis() as u64,
                        "Subscription sync cycle completed"
                    );
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        duration_ms = cycle_start.elapsed().as_millis() as u64,
                        "Subscription sync cycle failed"
                    );
                }
            }

            sleep(self.config.interval).await;
        }
    }
}

/// Spawn the job on the current runtime
pub fn start_subscription_sync(
    engine: Arc<SyncEngine>,
    config: &SubscriptionConfig,
) -> tokio::task::JoinHandle<()> {
    let job = SubscriptionSyncJob::new(engine, SubscriptionSyncJobConfig::from(config));
    tokio::spawn(job.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentItem, ContentType, NewSubscription, Subscription, SubscriptionFilters};
    use crate::store::memory::MemoryStores;
    use crate::store::SubscriptionStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn job(stores: &MemoryStores) -> SubscriptionSyncJob {
        let config = SubscriptionConfig::default();
        let engine = SyncEngine::new(
            stores.content_stores(),
            stores.subscriptions.clone(),
            config.clone(),
        );
        SubscriptionSyncJob::new(Arc::new(engine), SubscriptionSyncJobConfig::from(&config))
    }

    #[test]
    fn test_job_config_from_subscription_config() {
        let config = SubscriptionConfig {
            sync_interval_secs: 90,
            sync_enabled: false,
            ..SubscriptionConfig::default()
        };
        let job_config = SubscriptionSyncJobConfig::from(&config);
        assert_eq!(job_config.interval, Duration::from_secs(90));
        assert!(!job_config.enabled);
    }

    #[tokio::test]
    async fn test_run_cycle_syncs_active_subscriptions() {
        let stores = MemoryStores::new();
        stores
            .insert_item(ContentItem::new(ContentType::Model, "m1", "Tiny llama"))
            .await;
        let subscription = Subscription::from_new(
            NewSubscription {
                user_id: Uuid::new_v4(),
                content_type: ContentType::Model,
                filters: SubscriptionFilters::from_lists(&["llama"], &[], &[]),
                notify_enabled: false,
            },
            Utc::now(),
        );
        let id = subscription.id;
        stores.subscriptions.insert(subscription).await.unwrap();

        let report = job(&stores).run_cycle().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(stores.subscriptions.get(id).await.unwrap().unwrap().total_matched, 1);
    }

    #[tokio::test]
    async fn test_run_cycle_surfaces_store_outage() {
        let stores = MemoryStores::new();
        stores.subscriptions.set_unavailable(true);
        assert!(job(&stores).run_cycle().await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_job_returns_immediately() {
        let stores = MemoryStores::new();
        let mut job = job(&stores);
        job.config.enabled = false;
        job.run().await;
    }
}
