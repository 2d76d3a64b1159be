//! Device Profile Node Insertion
//!
//! Alarm rules of device profiles are evaluated by a dedicated rule node.
//! Every tenant's root chain gets one placed in front of its current first
//! node:
//!
//! ```text
//! before:  first -> ...
//! after:   [Device Profile Node] --Success--> first -> ...
//! ```
//!
//! Chains whose first node already is a device profile node are left alone,
//! which makes the transform safe to re-run. Tenants without any root chain
//! get the default chains instead.

use crate::db::{RuleChainStore, RuleChainTemplates};
use crate::models::{RuleNode, Tenant, DEVICE_PROFILE_NODE_TYPE};
use crate::services::bulk_updater::EntityUpdater;
use crate::services::MigrationError;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const DEVICE_PROFILE_NODE_NAME: &str = "Device Profile Node";
const SUCCESS_LABEL: &str = "Success";

pub struct RootRuleChainUpdater {
    rule_chains: Arc<dyn RuleChainStore>,
    templates: Arc<dyn RuleChainTemplates>,
}

impl RootRuleChainUpdater {
    pub fn new(rule_chains: Arc<dyn RuleChainStore>, templates: Arc<dyn RuleChainTemplates>) -> Self {
        Self {
            rule_chains,
            templates,
        }
    }
}

#[async_trait]
impl EntityUpdater<Tenant> for RootRuleChainUpdater {
    fn name(&self) -> &str {
        "Tenants root rule chain updater"
    }

    fn force_report_total(&self) -> bool {
        true
    }

    async fn update_entity(&self, tenant: Tenant) -> Result<(), MigrationError> {
        let Some(root) = self.rule_chains.get_root_tenant_rule_chain(&tenant.id).await? else {
            tracing::info!("[{}] No root rule chain, creating defaults", tenant.id);
            self.templates.create_default_rule_chains(&tenant.id).await?;
            return Ok(());
        };

        let mut meta_data = self
            .rule_chains
            .load_rule_chain_meta_data(&tenant.id, &root.id)
            .await?;
        let Some(old_first) = meta_data.first_node_index else {
            return Ok(());
        };
        let Some(first_node) = meta_data.nodes.get(old_first) else {
            tracing::warn!(
                "[{}] Root rule chain {} points at missing node index {}",
                tenant.id,
                root.id,
                old_first
            );
            return Ok(());
        };
        if first_node.node_type == DEVICE_PROFILE_NODE_TYPE {
            return Ok(());
        }

        let mut node = RuleNode::new(root.id, DEVICE_PROFILE_NODE_TYPE, DEVICE_PROFILE_NODE_NAME);
        node.configuration = json!({
            "persistAlarmRulesState": false,
            "fetchAlarmRulesStateOnStart": false
        });
        node.additional_info = Some(json!({
            "description": "Process incoming messages from devices with the alarm rules defined in the device profile. Dispatch all incoming messages with \"Success\" relation type.",
            "layoutX": 204,
            "layoutY": 240
        }));

        let new_first = meta_data.nodes.len();
        meta_data.nodes.push(node);
        meta_data.add_connection_info(new_first, old_first, SUCCESS_LABEL);
        meta_data.first_node_index = Some(new_first);
        self.rule_chains
            .save_rule_chain_meta_data(&tenant.id, meta_data)
            .await?;
        tracing::debug!("[{}] Added device profile node to root chain {}", tenant.id, root.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    #[tokio::test]
    async fn test_device_profile_node_becomes_first_node() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        store.create_default_rule_chains(&tenant.id).await.unwrap();
        let updater = RootRuleChainUpdater::new(store.clone(), store.clone());

        updater.update_entity(tenant.clone()).await.unwrap();
        updater.update_entity(tenant.clone()).await.unwrap();

        let root = store
            .get_root_tenant_rule_chain(&tenant.id)
            .await
            .unwrap()
            .unwrap();
        let meta_data = store.load_rule_chain_meta_data(&tenant.id, &root.id).await.unwrap();
        let first = &meta_data.nodes[meta_data.first_node_index.unwrap()];
        assert_eq!(first.node_type, DEVICE_PROFILE_NODE_TYPE);

        let profile_nodes = meta_data
            .nodes
            .iter()
            .filter(|node| node.node_type == DEVICE_PROFILE_NODE_TYPE)
            .count();
        assert_eq!(profile_nodes, 1);

        let out: Vec<_> = meta_data
            .connections
            .iter()
            .filter(|conn| Some(conn.from_index) == meta_data.first_node_index)
            .collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, SUCCESS_LABEL);
        assert_eq!(meta_data.nodes[out[0].to_index].name, "Message Type Switch");
    }

    #[tokio::test]
    async fn test_tenant_without_root_chain_gets_defaults() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Empty");
        let updater = RootRuleChainUpdater::new(store.clone(), store.clone());

        updater.update_entity(tenant.clone()).await.unwrap();

        assert!(store
            .get_root_tenant_rule_chain(&tenant.id)
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_reports_tenant_total() {
        let store = Arc::new(InMemoryStore::new());
        assert!(RootRuleChainUpdater::new(store.clone(), store).force_report_total());
    }
}
