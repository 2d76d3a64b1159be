//! Upgrade Steps
//!
//! A step is one named unit of work inside a version upgrade. Most steps are a
//! [`PaginatedStep`]: a [`BulkUpdater`] run pairing a paged source with an
//! entity updater. Steps run strictly one after another.

use crate::db::PagedSource;
use crate::models::{Identifiable, UpdateScope};
use crate::services::bulk_updater::{BulkUpdater, EntityUpdater, UpdateOutcome};
use crate::services::MigrationError;
use async_trait::async_trait;
use std::sync::Arc;

/// What a finished step reports back to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub outcome: UpdateOutcome,
}

#[async_trait]
pub trait MigrationStep: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion. Per-entity failures are contained and counted;
    /// an `Err` means the step itself could not proceed.
    async fn run(&self) -> Result<StepReport, MigrationError>;
}

/// Bulk update of every `T` the source yields
pub struct PaginatedStep<T: Send + 'static> {
    source: Arc<dyn PagedSource<T>>,
    updater: Arc<dyn EntityUpdater<T>>,
    bulk: BulkUpdater,
}

impl<T: Send + 'static> PaginatedStep<T> {
    pub fn new(
        source: Arc<dyn PagedSource<T>>,
        updater: Arc<dyn EntityUpdater<T>>,
        bulk: BulkUpdater,
    ) -> Self {
        Self {
            source,
            updater,
            bulk,
        }
    }
}

#[async_trait]
impl<T> MigrationStep for PaginatedStep<T>
where
    T: Identifiable + Send + 'static,
{
    fn name(&self) -> &str {
        self.updater.name()
    }

    async fn run(&self) -> Result<StepReport, MigrationError> {
        let outcome = self
            .bulk
            .run(self.source.as_ref(), &UpdateScope::All, self.updater.as_ref())
            .await?;
        Ok(StepReport {
            name: self.name().to_string(),
            outcome,
        })
    }
}

/// Step that only tells the operator about a manual follow-up
pub struct NoticeStep {
    name: String,
    message: String,
}

impl NoticeStep {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl MigrationStep for NoticeStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<StepReport, MigrationError> {
        tracing::warn!("CAUTION: {}", self.message);
        Ok(StepReport {
            name: self.name.clone(),
            outcome: UpdateOutcome::default(),
        })
    }
}
