// ============================================
// Subscription Sync Engine
// ============================================
//
// Per subscription: Idle -> Running -> {Success, Failed}
//
// Success writes a history row and the new aggregates in one commit.
// Failure writes a failed history row, leaves the aggregates alone and
// returns the error to the caller.

use super::filter_compiler;
use crate::config::SubscriptionConfig;
use crate::error::{EngineError, Result};
use crate::models::{
    ContentItem, Subscription, SubscriptionHistory, SyncCounters, SyncResult, SyncStatus,
    SyncType,
};
use crate::store::{ContentQuery, ContentStores, SubscriptionStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of one scheduled pass over every active subscription
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub matched_total: u64,
    pub failures: Vec<SyncFailure>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub subscription_id: Uuid,
    pub error: String,
}

pub struct SyncEngine {
    stores: ContentStores,
    subscriptions: Arc<dyn SubscriptionStore>,
    config: SubscriptionConfig,
}

impl SyncEngine {
    pub fn new(
        stores: ContentStores,
        subscriptions: Arc<dyn SubscriptionStore>,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            stores,
            subscriptions,
            config,
        }
    }

    /// `syncSubscription(subscriptionId)`
    pub async fn sync(&self, subscription_id: Uuid, sync_type: SyncType) -> Result<SyncResult> {
        let subscription = self
            .subscriptions
            .get(subscription_id)
            .await?
            .ok_or(EngineError::SubscriptionNotFound(subscription_id))?;

        let started = Instant::now();
        let now = Utc::now();
        let evaluated = self.evaluate(&subscription, now).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        // A rejected success commit is recorded like any other failed attempt
        let outcome = match evaluated {
            Ok(result) => {
                let history = history_row(&subscription, sync_type, duration_ms, now, Ok(&result));
                let counters = SyncCounters {
                    synced_at: now,
                    total_matched: result.matched_count,
                    new_count: result.new_count,
                };
                self.subscriptions
                    .commit_sync(subscription_id, Some(counters), history)
                    .await
                    .map(|_| result)
                    .map_err(EngineError::from)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                info!(
                    subscription_id = %subscription_id,
                    content_type = %subscription.content_type,
                    sync_type = ?sync_type,
                    matched = result.matched_count,
                    new = result.new_count,
                    duration_ms = duration_ms,
                    "Subscription sync succeeded"
                );
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                let history =
                    history_row(&subscription, sync_type, duration_ms, now, Err(&message));
                if let Err(commit_err) = self
                    .subscriptions
                    .commit_sync(subscription_id, None, history)
                    .await
                {
                    warn!(
                        subscription_id = %subscription_id,
                        error = %commit_err,
                        "Failed to record failed sync"
                    );
                }

                warn!(
                    subscription_id = %subscription_id,
                    content_type = %subscription.content_type,
                    sync_type = ?sync_type,
                    error = %message,
                    duration_ms = duration_ms,
                    "Subscription sync failed"
                );
                Err(e)
            }
        }
    }

    /// Sync every active subscription, one at a time
    pub async fn sync_all_active(&self) -> Result<BulkSyncReport> {
        let started = Instant::now();
        let active = self.subscriptions.list_active().await?;

        let mut report = BulkSyncReport {
            attempted: active.len(),
            ..BulkSyncReport::default()
        };

        for subscription in active {
            match self.sync(subscription.id, SyncType::Scheduled).await {
                Ok(result) => {
                    report.succeeded += 1;
                    report.matched_total += result.matched_count;
                }
                Err(e) => {
                    report.failed += 1;
                    report.failures.push(SyncFailure {
                        subscription_id: subscription.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Run the compiled filter against the subscribed family
    async fn evaluate(&self, subscription: &Subscription, now: DateTime<Utc>) -> Result<SyncResult> {
        let filter = filter_compiler::compile(subscription.content_type, &subscription.filters)?;
        let query = ContentQuery::latest(subscription.content_type, filter, self.config.fetch_limit);
        let matched = self
            .stores
            .find_many(subscription.content_type, &query)
            .await?;

        debug!(
            subscription_id = %subscription.id,
            matched = matched.len(),
            "Subscription filter evaluated"
        );

        Ok(SyncResult {
            matched_count: matched.len() as u64,
            new_count: self.count_new(&matched, now),
        })
    }

    /// Matches published or updated inside the new-item window, capped
    fn count_new(&self, matched: &[ContentItem], now: DateTime<Utc>) -> u64 {
        let cutoff = Duration::try_hours(self.config.new_window_hours)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let fresh = matched
            .iter()
            .filter(|item| {
                item.published_at
                    .or(item.updated_at)
                    .map(|ts| ts >= cutoff)
                    .unwrap_or(false)
            })
            .count() as u64;
        fresh.min(self.config.new_count_cap)
    }
}

fn history_row(
    subscription: &Subscription,
    sync_type: SyncType,
    duration_ms: u64,
    now: DateTime<Utc>,
    outcome: std::result::Result<&SyncResult, &str>,
) -> SubscriptionHistory {
    let (status, matched_count, new_count, error_message) = match outcome {
        Ok(result) => (
            SyncStatus::Success,
            result.matched_count,
            result.new_count,
            None,
        ),
        Err(message) => (SyncStatus::Failed, 0, 0, Some(message.to_string())),
    };

    SubscriptionHistory {
        id: Uuid::new_v4(),
        subscription_id: subscription.id,
        sync_type,
        matched_count,
        new_count,
        status,
        duration_ms,
        error_message,
        created_at: now,
    }
}
