//! Seed default root rule chains for tenants that have none.

use crate::db::{RuleChainStore, RuleChainTemplates};
use crate::models::Tenant;
use crate::services::bulk_updater::EntityUpdater;
use crate::services::MigrationError;
use async_trait::async_trait;
use std::sync::Arc;

/// Creates the default core rule chains when a tenant has no root chain
pub struct DefaultRuleChainUpdater {
    rule_chains: Arc<dyn RuleChainStore>,
    templates: Arc<dyn RuleChainTemplates>,
}

impl DefaultRuleChainUpdater {
    pub fn new(rule_chains: Arc<dyn RuleChainStore>, templates: Arc<dyn RuleChainTemplates>) -> Self {
        Self {
            rule_chains,
            templates,
        }
    }
}

#[async_trait]
impl EntityUpdater<Tenant> for DefaultRuleChainUpdater {
    fn name(&self) -> &str {
        "Tenants default rule chain updater"
    }

    fn force_report_total(&self) -> bool {
        true
    }

    async fn update_entity(&self, tenant: Tenant) -> Result<(), MigrationError> {
        if self
            .rule_chains
            .get_root_tenant_rule_chain(&tenant.id)
            .await?
            .is_none()
        {
            tracing::info!("[{}] Creating default rule chains", tenant.id);
            self.templates.create_default_rule_chains(&tenant.id).await?;
        }
        Ok(())
    }
}

/// Creates the default edge rule chains when a tenant has no edge template root
pub struct EdgeRuleChainUpdater {
    rule_chains: Arc<dyn RuleChainStore>,
    templates: Arc<dyn RuleChainTemplates>,
}

impl EdgeRuleChainUpdater {
    pub fn new(rule_chains: Arc<dyn RuleChainStore>, templates: Arc<dyn RuleChainTemplates>) -> Self {
        Self {
            rule_chains,
            templates,
        }
    }
}

#[async_trait]
impl EntityUpdater<Tenant> for EdgeRuleChainUpdater {
    fn name(&self) -> &str {
        "Tenants edge rule chain updater"
    }

    fn force_report_total(&self) -> bool {
        true
    }

    async fn update_entity(&self, tenant: Tenant) -> Result<(), MigrationError> {
        if self
            .rule_chains
            .get_edge_template_root_rule_chain(&tenant.id)
            .await?
            .is_none()
        {
            tracing::info!("[{}] Creating default edge rule chains", tenant.id);
            self.templates
                .create_default_edge_rule_chains(&tenant.id)
                .await?;
        }
        Ok(())
    }
}
