//! Entity View Latest Telemetry Copy
//!
//! An entity view exposes a time window of another entity's telemetry. For
//! each view, the most recent sample of every exposed key inside
//! `[start_time_ms, end_time_ms]` is copied into the view's own latest
//! values. An `end_time_ms` of 0 leaves the window open-ended.
//!
//! Keys come from the view configuration; a view without configured keys
//! exposes every key the viewed entity currently has a latest value for.
//! Blank keys are ignored.
//!
//! Tenants are walked one by one; the views of one tenant are processed a
//! page at a time with the whole page in flight.

use crate::db::{PagedSource, TimeseriesStore};
use crate::models::{EntityView, Tenant, UpdateScope};
use crate::services::bulk_updater::{BulkUpdater, EntityUpdater, PageMode, ProgressCounter};
use crate::services::MigrationError;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;

const NAME: &str = "Tenants entity views updater";

pub struct EntityViewTelemetryUpdater {
    views: Arc<dyn PagedSource<EntityView>>,
    copier: LatestTelemetryCopier,
    page_size: usize,
    progress: ProgressCounter,
}

impl EntityViewTelemetryUpdater {
    pub fn new(
        views: Arc<dyn PagedSource<EntityView>>,
        timeseries: Arc<dyn TimeseriesStore>,
        page_size: usize,
        report_every: u64,
    ) -> Self {
        Self {
            views,
            copier: LatestTelemetryCopier { timeseries },
            page_size,
            progress: ProgressCounter::new(NAME, report_every),
        }
    }
}

#[async_trait]
impl EntityUpdater<Tenant> for EntityViewTelemetryUpdater {
    fn name(&self) -> &str {
        NAME
    }

    fn force_report_total(&self) -> bool {
        true
    }

    async fn update_entity(&self, tenant: Tenant) -> Result<(), MigrationError> {
        let outcome = BulkUpdater::new(NAME, self.page_size)
            .with_mode(PageMode::Concurrent)
            .with_progress(self.progress.clone())
            .run(self.views.as_ref(), &UpdateScope::Tenant(tenant.id), &self.copier)
            .await?;
        if outcome.failed > 0 {
            tracing::warn!(
                "[{}] Failed to copy latest telemetry to {} entity view(s)",
                tenant.id,
                outcome.failed
            );
        }
        Ok(())
    }
}

struct LatestTelemetryCopier {
    timeseries: Arc<dyn TimeseriesStore>,
}

impl LatestTelemetryCopier {
    async fn exposed_keys(&self, view: &EntityView) -> Result<Vec<String>, MigrationError> {
        let configured = view.timeseries_keys();
        let keys = if configured.is_empty() {
            self.timeseries
                .find_all_latest(&view.entity_id)
                .await?
                .into_iter()
                .map(|entry| entry.key)
                .collect()
        } else {
            configured.to_vec()
        };
        Ok(keys
            .into_iter()
            .filter(|key| !key.trim().is_empty())
            .collect())
    }
}

#[async_trait]
impl EntityUpdater<EntityView> for LatestTelemetryCopier {
    fn name(&self) -> &str {
        NAME
    }

    async fn update_entity(&self, view: EntityView) -> Result<(), MigrationError> {
        let keys = self.exposed_keys(&view).await?;
        if keys.is_empty() {
            return Ok(());
        }

        let end_ts = view.window_end_ms();
        let found = try_join_all(keys.iter().map(|key| {
            self.timeseries
                .find_latest_in_range(&view.entity_id, key, view.start_time_ms, end_ts)
        }))
        .await?;
        let latest: Vec<_> = found.into_iter().flatten().collect();
        if latest.is_empty() {
            return Ok(());
        }

        tracing::trace!("[{}] Copying {} latest value(s)", view.id, latest.len());
        self.timeseries
            .save_latest(&view.id.entity_id(), latest)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::{EntityId, EntityType, EntityViewId, TelemetryKeys, TsKvEntry};
    use serde_json::json;
    use uuid::Uuid;

    fn view(tenant: &Tenant, keys: Option<Vec<&str>>, start: i64, end: i64) -> EntityView {
        EntityView {
            id: EntityViewId::random(),
            tenant_id: tenant.id,
            name: "Boiler view".to_string(),
            entity_id: EntityId::new(EntityType::Device, Uuid::new_v4()),
            keys: keys.map(|keys| TelemetryKeys {
                timeseries: Some(keys.into_iter().map(String::from).collect()),
            }),
            start_time_ms: start,
            end_time_ms: end,
        }
    }

    fn entry(key: &str, ts: i64, value: i64) -> TsKvEntry {
        TsKvEntry {
            key: key.to_string(),
            ts,
            value: json!(value),
        }
    }

    async fn latest_of(store: &InMemoryStore, view: &EntityView) -> Vec<TsKvEntry> {
        store.find_all_latest(&view.id.entity_id()).await.unwrap()
    }

    #[tokio::test]
    async fn test_copies_latest_sample_inside_window() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        let view = view(&tenant, Some(vec!["temperature", " "]), 100, 200);
        store.add_entity_view(view.clone()).await;
        for (ts, value) in [(50, 1), (150, 2), (180, 3), (250, 4)] {
            store
                .add_timeseries(view.entity_id, entry("temperature", ts, value))
                .await;
        }

        let updater = EntityViewTelemetryUpdater::new(store.clone(), store.clone(), 10, 0);
        updater.update_entity(tenant).await.unwrap();

        assert_eq!(latest_of(&store, &view).await, vec![entry("temperature", 180, 3)]);
    }

    #[tokio::test]
    async fn test_open_window_and_discovered_keys() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        let view = view(&tenant, None, 0, 0);
        store.add_entity_view(view.clone()).await;
        store.add_latest(view.entity_id, entry("humidity", 900, 40)).await;
        store
            .add_timeseries(view.entity_id, entry("humidity", 5_000_000, 41))
            .await;

        let updater = EntityViewTelemetryUpdater::new(store.clone(), store.clone(), 10, 0);
        updater.update_entity(tenant).await.unwrap();

        assert_eq!(latest_of(&store, &view).await, vec![entry("humidity", 5_000_000, 41)]);
    }

    #[tokio::test]
    async fn test_view_without_samples_is_not_written() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        store
            .add_entity_view(view(&tenant, Some(vec!["pressure"]), 0, 0))
            .await;

        let updater = EntityViewTelemetryUpdater::new(store.clone(), store.clone(), 10, 0);
        updater.update_entity(tenant).await.unwrap();

        assert_eq!(store.write_count(), 0);
    }
}
