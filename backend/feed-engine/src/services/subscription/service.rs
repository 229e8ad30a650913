use super::filter_compiler::{self, FilterTerms};
use super::sync::SyncEngine;
use crate::error::{EngineError, Result};
use crate::models::{
    ContentType, NewSubscription, SubscribedContentPage, Subscription, SubscriptionFilters,
    SubscriptionHistory, SyncResult, SyncType,
};
use crate::store::{ContentQuery, ContentStores, SubscriptionStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Subscription lifecycle plus the content view a subscription defines
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionStore>,
    stores: ContentStores,
    engine: Arc<SyncEngine>,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        stores: ContentStores,
        engine: Arc<SyncEngine>,
    ) -> Self {
        Self {
            subscriptions,
            stores,
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Persist a subscription and kick off its initial sync in the background.
    ///
    /// The initial sync's outcome never affects the returned value.
    pub async fn create(&self, new: NewSubscription) -> Result<Subscription> {
        let terms = FilterTerms::parse(&new.filters)?;
        if terms.is_empty() {
            debug!(
                user_id = %new.user_id,
                content_type = %new.content_type,
                "Subscription has no filters, it will match the whole family"
            );
        }

        let subscription = Subscription::from_new(new, Utc::now());
        self.subscriptions.insert(subscription.clone()).await?;

        info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            content_type = %subscription.content_type,
            "Subscription created"
        );

        let engine = Arc::clone(&self.engine);
        let subscription_id = subscription.id;
        tokio::spawn(async move {
            if let Err(e) = engine.sync(subscription_id, SyncType::Initial).await {
                warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Initial subscription sync failed"
                );
            }
        });

        Ok(subscription)
    }

    /// Replace the filters; the content family is fixed at creation
    pub async fn update_filters(
        &self,
        subscription_id: Uuid,
        filters: SubscriptionFilters,
    ) -> Result<Subscription> {
        filter_compiler::validate(&filters)?;
        self.subscriptions
            .update_filters(subscription_id, filters, Utc::now())
            .await?
            .ok_or(EngineError::SubscriptionNotFound(subscription_id))
    }

    pub async fn set_active(&self, subscription_id: Uuid, active: bool) -> Result<Subscription> {
        self.subscriptions
            .set_active(subscription_id, active, Utc::now())
            .await?
            .ok_or(EngineError::SubscriptionNotFound(subscription_id))
    }

    pub async fn delete(&self, subscription_id: Uuid) -> Result<()> {
        if self.subscriptions.delete(subscription_id).await? {
            info!(subscription_id = %subscription_id, "Subscription deleted");
            Ok(())
        } else {
            Err(EngineError::SubscriptionNotFound(subscription_id))
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Subscription>> {
        Ok(self.subscriptions.list_by_user(user_id).await?)
    }

    /// Most recent sync attempts first
    pub async fn history(
        &self,
        subscription_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SubscriptionHistory>> {
        if self.subscriptions.get(subscription_id).await?.is_none() {
            return Err(EngineError::SubscriptionNotFound(subscription_id));
        }
        Ok(self.subscriptions.history(subscription_id, limit).await?)
    }

    /// Manual sync
    pub async fn sync(&self, subscription_id: Uuid) -> Result<SyncResult> {
        self.engine.sync(subscription_id, SyncType::Manual).await
    }

    /// `getSubscribedContent(userId, contentType, skip, take)`.
    ///
    /// Uses the user's most recent active subscription for the family; a user
    /// without one gets an empty page and no subscription id.
    pub async fn get_subscribed_content(
        &self,
        user_id: Uuid,
        content_type: ContentType,
        skip: usize,
        take: usize,
    ) -> Result<SubscribedContentPage> {
        let subscription = self
            .subscriptions
            .list_by_user(user_id)
            .await?
            .into_iter()
            .find(|s| s.is_active && s.content_type == content_type);

        let Some(subscription) = subscription else {
            return Ok(SubscribedContentPage {
                items: Vec::new(),
                total: 0,
                subscription_id: None,
            });
        };

        let filter = filter_compiler::compile(content_type, &subscription.filters)?;
        let query = ContentQuery::new(filter.clone(), content_type.recency_order(), skip, take);
        let (items, total) = tokio::join!(
            self.stores.find_many(content_type, &query),
            self.stores.count(content_type, &filter),
        );

        Ok(SubscribedContentPage {
            items: items?,
            total: total?,
            subscription_id: Some(subscription.id),
        })
    }
}
