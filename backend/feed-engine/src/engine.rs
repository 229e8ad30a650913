use crate::config::Config;
use crate::error::Result;
use crate::models::{ContentType, DiscoveryPage, FeedPage, SubscribedContentPage, SyncResult};
use crate::services::{
    DiscoveryComposer, DiscoveryScope, DiscoverySort, FeedComposer, FeedTab, HotnessScorer,
    LatestSelector, PersonalizationSelector, ProfileBuilder, SubscriptionService, SyncEngine,
};
use crate::store::{BehaviorLog, ContentStores, PinService, SubscriptionStore};
use std::sync::Arc;
use uuid::Uuid;

/// External collaborators the engine is built on
#[derive(Clone)]
pub struct EngineStores {
    pub content: ContentStores,
    pub behavior: Arc<dyn BehaviorLog>,
    pub pins: Arc<dyn PinService>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
}

/// In-process entry point used by the web layer and the scheduler
pub struct FeedEngine {
    feed: FeedComposer,
    discovery: DiscoveryComposer,
    subscriptions: SubscriptionService,
}

impl FeedEngine {
    pub fn new(config: &Config, stores: EngineStores) -> Self {
        let scorer = HotnessScorer::new(config.weights.clone());

        let personalization = PersonalizationSelector::new(
            stores.content.clone(),
            ProfileBuilder::new(stores.behavior, config.personalization.clone()),
            LatestSelector::new(stores.content.clone()),
            config.personalization.clone(),
        );
        let feed = FeedComposer::new(
            stores.content.clone(),
            scorer.clone(),
            personalization,
            config.feed.clone(),
        );
        let discovery = DiscoveryComposer::new(
            stores.content.clone(),
            scorer,
            stores.pins,
            config.discovery.clone(),
        );

        let sync_engine = Arc::new(SyncEngine::new(
            stores.content.clone(),
            stores.subscriptions.clone(),
            config.subscription.clone(),
        ));
        let subscriptions =
            SubscriptionService::new(stores.subscriptions, stores.content, sync_engine);

        Self {
            feed,
            discovery,
            subscriptions,
        }
    }

    pub async fn compose_feed(
        &self,
        tab: FeedTab,
        skip: usize,
        take: usize,
        user_id: Option<Uuid>,
    ) -> FeedPage {
        self.feed.compose(tab, skip, take, user_id).await
    }

    pub async fn compose_discovery(
        &self,
        scope: DiscoveryScope,
        sort: DiscoverySort,
        skip: usize,
        take: usize,
    ) -> DiscoveryPage {
        self.discovery.compose(scope, sort, skip, take).await
    }

    pub async fn sync_subscription(&self, subscription_id: Uuid) -> Result<SyncResult> {
        self.subscriptions.sync(subscription_id).await
    }

    pub async fn get_subscribed_content(
        &self,
        user_id: Uuid,
        content_type: ContentType,
        skip: usize,
        take: usize,
    ) -> Result<SubscribedContentPage> {
        self.subscriptions
            .get_subscribed_content(user_id, content_type, skip, take)
            .await
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }

    pub fn sync_engine(&self) -> Arc<SyncEngine> {
        Arc::clone(self.subscriptions.engine())
    }
}
