//! Data Update Orchestrator
//!
//! Maps a source version to the ordered list of steps that bring stored data
//! up to the next release, then runs those steps one after another.
//!
//! | from    | to    | steps                                                       |
//! |---------|-------|-------------------------------------------------------------|
//! | 1.4.0   | 2.0.0 | default rule chains                                         |
//! | 3.0.1   | 3.1.0 | entity view latest telemetry                                |
//! | 3.1.1   | 3.2.0 | device profile node in root chains                          |
//! | 3.2.2   | 3.3.0 | edge chains, alarm customers, alarm conditions, OAuth2 note |
//! | 3.3.2   | 3.3.3 | nested rule node rewrite                                    |
//!
//! An unknown source version is rejected before anything touches the store.

use crate::db::PagedSource;
use crate::models::{DeviceProfile, Identifiable, Tenant};
use crate::services::bulk_updater::{BulkUpdater, EntityUpdater, ProgressCounter};
use crate::services::context::UpgradeContext;
use crate::services::graph_rewriter::NestedRuleNodeRewriter;
use crate::services::migration_step::{MigrationStep, NoticeStep, PaginatedStep, StepReport};
use crate::services::migrations::{
    AlarmCustomerUpdater, DefaultRuleChainUpdater, DeviceProfileConditionsUpdater,
    EdgeRuleChainUpdater, EntityViewTelemetryUpdater, RootRuleChainUpdater,
};
use crate::services::MigrationError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const OAUTH2_NOTICE: &str =
    "Update of OAuth2 parameters from 3.2.2 to 3.3.0 is only available in releases 3.3.0 and 3.3.1";

/// Release a stored data set can be upgraded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceVersion {
    V1_4_0,
    V3_0_1,
    V3_1_1,
    V3_2_2,
    V3_3_2,
}

impl SourceVersion {
    pub const ALL: [SourceVersion; 5] = [
        SourceVersion::V1_4_0,
        SourceVersion::V3_0_1,
        SourceVersion::V3_1_1,
        SourceVersion::V3_2_2,
        SourceVersion::V3_3_2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceVersion::V1_4_0 => "1.4.0",
            SourceVersion::V3_0_1 => "3.0.1",
            SourceVersion::V3_1_1 => "3.1.1",
            SourceVersion::V3_2_2 => "3.2.2",
            SourceVersion::V3_3_2 => "3.3.2",
        }
    }

    /// Release the data is in after this version's steps complete
    pub fn target(&self) -> &'static str {
        match self {
            SourceVersion::V1_4_0 => "2.0.0",
            SourceVersion::V3_0_1 => "3.1.0",
            SourceVersion::V3_1_1 => "3.2.0",
            SourceVersion::V3_2_2 => "3.3.0",
            SourceVersion::V3_3_2 => "3.3.3",
        }
    }
}

impl fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceVersion {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|version| version.as_str() == trimmed)
            .ok_or_else(|| MigrationError::unsupported_version(s))
    }
}

/// Everything one `update_data` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub from_version: SourceVersion,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl UpgradeReport {
    pub fn to_version(&self) -> &'static str {
        self.from_version.target()
    }

    /// Entities that failed across all steps
    pub fn failed(&self) -> u64 {
        self.steps.iter().map(|step| step.outcome.failed).sum()
    }

    pub fn updated(&self) -> u64 {
        self.steps.iter().map(|step| step.outcome.updated).sum()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Runs the upgrade steps for a source version
///
/// # Example
///
/// ```no_run
/// # use rulegraph_core::config::UpgradeConfig;
/// # use rulegraph_core::db::InMemoryStore;
/// # use rulegraph_core::services::{DataUpdateService, UpgradeContext};
/// # use std::sync::Arc;
/// # async fn run() -> Result<(), rulegraph_core::services::MigrationError> {
/// let store = Arc::new(InMemoryStore::new());
/// let service = DataUpdateService::new(UpgradeContext::in_memory(store, UpgradeConfig::default()));
/// let report = service.update_data("3.3.2").await?;
/// assert_eq!(report.to_version(), "3.3.3");
/// # Ok(())
/// # }
/// ```
pub struct DataUpdateService {
    context: UpgradeContext,
}

impl DataUpdateService {
    pub fn new(context: UpgradeContext) -> Self {
        Self { context }
    }

    /// Ordered steps for `version`; builds them without touching the store
    pub fn plan(&self, version: SourceVersion) -> Vec<Box<dyn MigrationStep>> {
        let ctx = &self.context;
        let config = &ctx.config;
        match version {
            SourceVersion::V1_4_0 => vec![self.tenant_step(Arc::new(DefaultRuleChainUpdater::new(
                ctx.rule_chains.clone(),
                ctx.templates.clone(),
            )))],
            SourceVersion::V3_0_1 => {
                vec![self.tenant_step(Arc::new(EntityViewTelemetryUpdater::new(
                    ctx.entity_view_source.clone(),
                    ctx.timeseries.clone(),
                    config.entity_view_page_size,
                    config.report_every,
                )))]
            }
            SourceVersion::V3_1_1 => vec![self.tenant_step(Arc::new(RootRuleChainUpdater::new(
                ctx.rule_chains.clone(),
                ctx.templates.clone(),
            )))],
            SourceVersion::V3_2_2 => vec![
                self.tenant_step(Arc::new(EdgeRuleChainUpdater::new(
                    ctx.rule_chains.clone(),
                    ctx.templates.clone(),
                ))),
                self.tenant_step(Arc::new(AlarmCustomerUpdater::new(
                    ctx.alarm_source.clone(),
                    ctx.alarms.clone(),
                    ctx.customers.clone(),
                    config.alarm_page_size,
                    config.report_every,
                ))),
                self.device_profile_step(Arc::new(DeviceProfileConditionsUpdater::new(
                    ctx.device_profiles.clone(),
                ))),
                Box::new(NoticeStep::new("OAuth2 configuration notice", OAUTH2_NOTICE))
                    as Box<dyn MigrationStep>,
            ],
            SourceVersion::V3_3_2 => vec![self.tenant_step(Arc::new(
                NestedRuleNodeRewriter::new(ctx.relations.clone(), ctx.rule_chains.clone())
                    .with_pack_size(config.nested_rule_node_pack_size),
            ))],
        }
    }

    /// Upgrade stored data from `from_version` to its successor release
    ///
    /// Steps run strictly in order; the first step that cannot proceed aborts
    /// the upgrade. Per-entity failures inside a step do not.
    pub async fn update_data(&self, from_version: &str) -> Result<UpgradeReport, MigrationError> {
        let version: SourceVersion = from_version.parse()?;
        tracing::info!("Updating data from version {} to {} ...", version, version.target());

        let started_at = Utc::now();
        let mut report = UpgradeReport {
            from_version: version,
            steps: Vec::new(),
            started_at,
            finished_at: started_at,
        };
        for step in self.plan(version) {
            tracing::info!("{}: started", step.name());
            let step_report = step.run().await?;
            tracing::info!(
                "{}: done, {} updated, {} failed",
                step_report.name,
                step_report.outcome.updated,
                step_report.outcome.failed
            );
            report.steps.push(step_report);
        }
        report.finished_at = Utc::now();
        Ok(report)
    }

    fn tenant_step(&self, updater: Arc<dyn EntityUpdater<Tenant>>) -> Box<dyn MigrationStep> {
        self.step(
            self.context.tenant_source.clone(),
            updater,
            self.context.config.tenant_page_size,
        )
    }

    fn device_profile_step(
        &self,
        updater: Arc<dyn EntityUpdater<DeviceProfile>>,
    ) -> Box<dyn MigrationStep> {
        self.step(
            self.context.device_profile_source.clone(),
            updater,
            self.context.config.device_profile_page_size,
        )
    }

    fn step<T>(
        &self,
        source: Arc<dyn PagedSource<T>>,
        updater: Arc<dyn EntityUpdater<T>>,
        page_size: usize,
    ) -> Box<dyn MigrationStep>
    where
        T: Identifiable + Send + 'static,
    {
        let progress = ProgressCounter::new(updater.name(), self.context.config.report_every);
        let bulk = BulkUpdater::new(updater.name(), page_size).with_progress(progress);
        Box::new(PaginatedStep::new(source, updater, bulk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpgradeConfig;
    use crate::db::InMemoryStore;

    fn service() -> DataUpdateService {
        let store = Arc::new(InMemoryStore::new());
        DataUpdateService::new(UpgradeContext::in_memory(store, UpgradeConfig::default()))
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("3.3.2".parse::<SourceVersion>().unwrap(), SourceVersion::V3_3_2);
        assert_eq!(" 1.4.0 ".parse::<SourceVersion>().unwrap(), SourceVersion::V1_4_0);
        assert!(matches!(
            "3.3.3".parse::<SourceVersion>(),
            Err(MigrationError::UnsupportedVersion { .. })
        ));
        assert_eq!(SourceVersion::V3_2_2.target(), "3.3.0");
    }

    #[test]
    fn test_plan_order_for_3_2_2() {
        let names: Vec<String> = service()
            .plan(SourceVersion::V3_2_2)
            .iter()
            .map(|step| step.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Tenants edge rule chain updater",
                "Tenants alarms customer updater",
                "Device profile alarm conditions updater",
                "OAuth2 configuration notice",
            ]
        );
    }

    #[test]
    fn test_every_version_has_steps() {
        let service = service();
        for version in SourceVersion::ALL {
            assert!(!service.plan(version).is_empty(), "{version}");
        }
    }
}
