use std::sync::Arc;

use forum_domain::content::ContentMetricsService;
use forum_domain::likes::LikeCoordinator;
use forum_domain::ports::content::ContentDirectory;
use forum_domain::ports::metrics::MetricStore;
use forum_domain::ports::relations::RelationLedger;
use forum_domain::ports::views::ViewWindowStore;
use forum_domain::reconciliation::ReconciliationJob;
use forum_domain::views::{InMemoryViewWindowStore, ViewDedupConfig, ViewDeduplicator};

use crate::config::AppConfig;
use crate::db::{DbConfig, connect, ensure_schema};
use crate::repositories::{
    InMemoryMetricStore, InMemoryRelationLedger, SurrealMetricStore, SurrealRelationLedger,
};
use crate::views::RedisViewWindowStore;

/// The interaction services wired against one set of stores.
#[derive(Clone)]
pub struct InteractionServices {
    pub ledger: Arc<dyn RelationLedger>,
    pub metric_store: Arc<dyn MetricStore>,
    pub likes: LikeCoordinator,
    pub views: ViewDeduplicator,
    pub content_metrics: ContentMetricsService,
    pub reconciler: ReconciliationJob,
}

impl InteractionServices {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let (ledger, metric_store): (Arc<dyn RelationLedger>, Arc<dyn MetricStore>) =
            if config.uses_surreal() {
                let client = connect(&DbConfig::from_app_config(config)).await?;
                ensure_schema(&client).await?;
                (
                    Arc::new(SurrealRelationLedger::with_client(client.clone())),
                    Arc::new(SurrealMetricStore::with_client(client)),
                )
            } else {
                (
                    Arc::new(InMemoryRelationLedger::new()),
                    Arc::new(InMemoryMetricStore::new()),
                )
            };

        let window_store: Arc<dyn ViewWindowStore> = if config.uses_redis_view_dedup() {
            Arc::new(
                RedisViewWindowStore::connect_with_prefix(
                    &config.redis_url,
                    config.view_dedup_prefix.clone(),
                )
                .await?,
            )
        } else {
            Arc::new(InMemoryViewWindowStore::new())
        };
        let views = ViewDeduplicator::new(
            window_store,
            ViewDedupConfig {
                window: config.view_window(),
            },
        );

        Ok(Self::assemble(ledger, metric_store, views, None))
    }

    /// Memory-only wiring with the default dedup window.
    pub fn in_memory() -> Self {
        let views = ViewDeduplicator::new(
            Arc::new(InMemoryViewWindowStore::new()),
            ViewDedupConfig::default(),
        );
        Self::assemble(
            Arc::new(InMemoryRelationLedger::new()),
            Arc::new(InMemoryMetricStore::new()),
            views,
            None,
        )
    }

    pub fn assemble(
        ledger: Arc<dyn RelationLedger>,
        metric_store: Arc<dyn MetricStore>,
        views: ViewDeduplicator,
        directory: Option<Arc<dyn ContentDirectory>>,
    ) -> Self {
        let mut reconciler = ReconciliationJob::new(ledger.clone(), metric_store.clone());
        if let Some(directory) = directory {
            reconciler = reconciler.with_directory(directory);
        }
        let likes = LikeCoordinator::new(ledger.clone(), metric_store.clone())
            .with_reconciler(reconciler.clone());
        let content_metrics =
            ContentMetricsService::new(metric_store.clone(), views.clone(), reconciler.clone());
        Self {
            ledger,
            metric_store,
            likes,
            views,
            content_metrics,
            reconciler,
        }
    }
}
