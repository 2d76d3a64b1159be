//! Paginated Bulk Updater
//!
//! Drives "for every entity matching a scope, transform it" without loading
//! the whole set into memory:
//!
//! 1. Fetch page 0 from a [`PagedSource`]
//! 2. Hand every entity of the page to an [`EntityUpdater`]
//! 3. Advance the [`PageLink`] and repeat until a page reports `has_next == false`
//!
//! ## Failure containment
//!
//! A failing `update_entity` call is logged with the entity id, counted in
//! [`UpdateOutcome::failed`] and skipped; the rest of the batch continues. A
//! failing page fetch aborts the run, because without the page there is
//! nothing left to iterate.
//!
//! ## Concurrency
//!
//! In [`PageMode::Concurrent`] every entity of a page is transformed
//! concurrently and the page is joined before the next fetch, so in-flight
//! work is bounded by the page size.
//!
//! ## Re-runs
//!
//! Nothing here is transactional across pages. Re-running a step after a crash
//! is safe only because every updater is idempotent.

use crate::db::PagedSource;
use crate::models::{Identifiable, PageLink, UpdateScope};
use crate::services::MigrationError;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of entities fetched per page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default progress log interval, in processed entities
pub const DEFAULT_REPORT_EVERY: u64 = 1000;

/// Per-entity transform applied by a [`BulkUpdater`]
#[async_trait]
pub trait EntityUpdater<T: Send + 'static>: Send + Sync {
    /// Human-readable name used as the log prefix
    fn name(&self) -> &str;

    /// Log the total number of matching entities before iterating
    fn force_report_total(&self) -> bool {
        false
    }

    /// Transform one entity. Must be idempotent.
    async fn update_entity(&self, entity: T) -> Result<(), MigrationError>;
}

/// How entities within one page are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageMode {
    #[default]
    Sequential,
    /// Fan out the whole page, join before fetching the next one
    Concurrent,
}

/// Shared processed-entity counter with periodic progress logging
///
/// Cloning shares the underlying count, so one counter can span nested
/// updaters (e.g. every tenant's alarm pages).
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    name: Arc<str>,
    processed: Arc<AtomicU64>,
    report_every: u64,
}

impl ProgressCounter {
    pub fn new(name: impl Into<String>, report_every: u64) -> Self {
        Self {
            name: Arc::from(name.into()),
            processed: Arc::new(AtomicU64::new(0)),
            report_every,
        }
    }

    /// Count one processed entity and return the new total
    pub fn increment(&self) -> u64 {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.report_every > 0 && processed % self.report_every == 0 {
            tracing::info!("{}: {} entities processed so far...", self.name, processed);
        }
        processed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

/// Result of one [`BulkUpdater::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Entities whose transform succeeded
    pub updated: u64,
    /// Entities whose transform failed and were skipped
    pub failed: u64,
    /// Pages fetched, including a trailing empty one
    pub pages: u64,
}

impl UpdateOutcome {
    pub fn processed(&self) -> u64 {
        self.updated + self.failed
    }
}

/// Paginate-transform-advance driver for one entity kind
#[derive(Debug, Clone)]
pub struct BulkUpdater {
    page_size: usize,
    mode: PageMode,
    progress: ProgressCounter,
}

impl BulkUpdater {
    pub fn new(name: impl Into<String>, page_size: usize) -> Self {
        Self {
            page_size,
            mode: PageMode::Sequential,
            progress: ProgressCounter::new(name, DEFAULT_REPORT_EVERY),
        }
    }

    pub fn with_mode(mut self, mode: PageMode) -> Self {
        self.mode = mode;
        self
    }

    /// Report into an existing (possibly shared) counter
    pub fn with_progress(mut self, progress: ProgressCounter) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &ProgressCounter {
        &self.progress
    }

    /// Walk every page of `source` within `scope`, applying `updater` to each entity
    pub async fn run<T>(
        &self,
        source: &dyn PagedSource<T>,
        scope: &UpdateScope,
        updater: &dyn EntityUpdater<T>,
    ) -> Result<UpdateOutcome, MigrationError>
    where
        T: Identifiable + Send + 'static,
    {
        let mut link = PageLink::new(self.page_size);
        let mut page = source.fetch(scope, &link).await?;
        if updater.force_report_total() {
            tracing::info!(
                "{}: {} entities found",
                updater.name(),
                page.total_elements
            );
        }

        let mut outcome = UpdateOutcome::default();
        loop {
            outcome.pages += 1;
            let has_next = page.has_next;
            let succeeded = match self.mode {
                PageMode::Sequential => {
                    let mut results = Vec::with_capacity(page.data.len());
                    for entity in page.data {
                        results.push(self.update_one(updater, entity).await);
                    }
                    results
                }
                PageMode::Concurrent => {
                    join_all(
                        page.data
                            .into_iter()
                            .map(|entity| self.update_one(updater, entity)),
                    )
                    .await
                }
            };
            for ok in succeeded {
                if ok {
                    outcome.updated += 1;
                } else {
                    outcome.failed += 1;
                }
            }

            if !has_next {
                break;
            }
            link = link.next_page_link();
            page = source.fetch(scope, &link).await?;
        }

        tracing::debug!(
            "{}: finished after {} page(s), {} updated, {} failed",
            updater.name(),
            outcome.pages,
            outcome.updated,
            outcome.failed
        );
        Ok(outcome)
    }

    async fn update_one<T>(&self, updater: &dyn EntityUpdater<T>, entity: T) -> bool
    where
        T: Identifiable + Send + 'static,
    {
        let id = entity.identity();
        let ok = match updater.update_entity(entity).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{}: unable to update {}: {}", updater.name(), id, e);
                false
            }
        };
        self.progress.increment();
        ok
    }
}
