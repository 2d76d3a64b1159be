//! Rule chain persistence and the install-script collaborator that seeds
//! default chains for tenants which have none.

use crate::db::DatabaseError;
use crate::models::{RuleChain, RuleChainId, RuleChainMetaData, RuleNode, RuleNodeId, TenantId};
use async_trait::async_trait;

#[async_trait]
pub trait RuleChainStore: Send + Sync {
    async fn find_rule_chain_by_id(
        &self,
        tenant_id: &TenantId,
        id: &RuleChainId,
    ) -> Result<Option<RuleChain>, DatabaseError>;

    async fn find_rule_node_by_id(
        &self,
        tenant_id: &TenantId,
        id: &RuleNodeId,
    ) -> Result<Option<RuleNode>, DatabaseError>;

    async fn find_rule_nodes_by_chain(
        &self,
        tenant_id: &TenantId,
        rule_chain_id: &RuleChainId,
    ) -> Result<Vec<RuleNode>, DatabaseError>;

    /// Insert or replace a rule node; the owning chain must exist
    async fn save_rule_node(
        &self,
        tenant_id: &TenantId,
        node: RuleNode,
    ) -> Result<RuleNode, DatabaseError>;

    /// The tenant's root chain of type `Core`
    async fn get_root_tenant_rule_chain(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<RuleChain>, DatabaseError>;

    /// The tenant's root chain of type `Edge` (edge template)
    async fn get_edge_template_root_rule_chain(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<RuleChain>, DatabaseError>;

    async fn load_rule_chain_meta_data(
        &self,
        tenant_id: &TenantId,
        rule_chain_id: &RuleChainId,
    ) -> Result<RuleChainMetaData, DatabaseError>;

    /// Persist nodes, first-node pointer and internal links of a chain,
    /// replacing the chain's previous internal links
    async fn save_rule_chain_meta_data(
        &self,
        tenant_id: &TenantId,
        meta_data: RuleChainMetaData,
    ) -> Result<RuleChainMetaData, DatabaseError>;
}

/// Seeds the default rule chains shipped with the product
#[async_trait]
pub trait RuleChainTemplates: Send + Sync {
    async fn create_default_rule_chains(&self, tenant_id: &TenantId) -> Result<(), DatabaseError>;

    async fn create_default_edge_rule_chains(
        &self,
        tenant_id: &TenantId,
    ) -> Result<(), DatabaseError>;
}
