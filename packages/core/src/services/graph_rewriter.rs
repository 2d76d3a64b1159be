//! Nested Rule Node Rewriter
//!
//! Older rule chains could route a rule node directly into *another* rule
//! chain with a single node-link edge:
//!
//! ```text
//! chain X:  A --Success--> (chain Y)
//! ```
//!
//! The upgraded model forbids edges that cross chain boundaries. Each such
//! edge is replaced by a proxy node living in X that forwards into Y:
//!
//! ```text
//! chain X --Contains--> P            (P = RuleChainInputNode, ruleChainId = Y)
//! A --Success--> P                   (label and metadata copied)
//! A --Success--> (chain Y)           deleted
//! ```
//!
//! ## Progress and termination
//!
//! Edges are pulled in packs of `pack_size` with the same filter every round.
//! Deleting the original edge is the only mutation that removes a match from
//! that filter and it happens once per processed edge, so the matching set
//! strictly shrinks. A full pack means "more may remain"; a short pack ends
//! the loop. A full pack that deleted nothing is reported as
//! [`MigrationError::NoProgress`] instead of spinning.
//!
//! ## Resuming after a crash
//!
//! Creating the proxy, inserting the two edges and deleting the original are
//! separate writes. Every proxy records the rule node it was created for under
//! [`PROXY_SOURCE_KEY`] in its configuration. Before creating a proxy the
//! rewriter looks for one left by an interrupted run: a proxy created for the
//! same source node and forwarding to the same target that already carries the
//! `A --label--> P` edge, or one with the expected name and metadata and no
//! inbound links at all. Forwarders without the marker, e.g. ones an operator
//! placed in the chain, are never adopted. Edge inserts that find the edge
//! already present are no-ops. Re-running converges to the same graph without
//! duplicate proxies.

use crate::db::{RelationStore, RuleChainStore};
use crate::models::{
    RelationEdge, RelationTypeGroup, RuleChain, RuleChainId, RuleChainType, RuleNode, RuleNodeId,
    Tenant, TenantId,
};
use crate::services::bulk_updater::EntityUpdater;
use crate::services::MigrationError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Default number of cross-chain edges fetched per round
pub const DEFAULT_PACK_SIZE: usize = 1024;

/// Proxy configuration key naming the rule node the proxy was created for
pub const PROXY_SOURCE_KEY: &str = "proxyForRuleNodeId";

/// Proxy that stands in for `source_node --label--> target_chain`
pub fn proxy_node(
    source_node: &RuleNode,
    target_chain: &RuleChain,
    additional_info: Option<Value>,
) -> RuleNode {
    let mut proxy = RuleNode::rule_chain_input(source_node.rule_chain_id, target_chain);
    if let Some(config) = proxy.configuration.as_object_mut() {
        config.insert(
            PROXY_SOURCE_KEY.to_string(),
            Value::String(source_node.id.to_string()),
        );
    }
    proxy.additional_info = additional_info;
    proxy
}

fn is_proxy_for(node: &RuleNode, source_node_id: RuleNodeId) -> bool {
    node.configuration
        .get(PROXY_SOURCE_KEY)
        .and_then(Value::as_str)
        .is_some_and(|raw| raw == source_node_id.to_string())
}

/// Counters for one tenant's rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Edge queries issued, including the final short (possibly empty) one
    pub fetch_rounds: u64,
    /// Original cross-chain edges deleted
    pub edges_rewritten: u64,
    pub proxies_created: u64,
    /// Proxies left behind by an interrupted run and picked up again
    pub proxies_reused: u64,
}

pub struct NestedRuleNodeRewriter {
    relations: Arc<dyn RelationStore>,
    rule_chains: Arc<dyn RuleChainStore>,
    chain_type: RuleChainType,
    pack_size: usize,
}

impl NestedRuleNodeRewriter {
    pub fn new(relations: Arc<dyn RelationStore>, rule_chains: Arc<dyn RuleChainStore>) -> Self {
        Self {
            relations,
            rule_chains,
            chain_type: RuleChainType::Core,
            pack_size: DEFAULT_PACK_SIZE,
        }
    }

    pub fn with_pack_size(mut self, pack_size: usize) -> Self {
        self.pack_size = pack_size;
        self
    }

    pub fn with_chain_type(mut self, chain_type: RuleChainType) -> Self {
        self.chain_type = chain_type;
        self
    }

    /// Replace every cross-chain node link of one tenant with a proxy node
    pub async fn rewrite_tenant(&self, tenant_id: &TenantId) -> Result<RewriteStats, MigrationError> {
        let mut stats = RewriteStats::default();
        loop {
            let relations = self
                .relations
                .find_rule_node_to_rule_chain_relations(tenant_id, self.chain_type, self.pack_size)
                .await?;
            stats.fetch_rounds += 1;
            let has_next = relations.len() == self.pack_size;

            let mut removed = 0usize;
            for relation in &relations {
                if self.rewrite_edge(tenant_id, relation, &mut stats).await? {
                    removed += 1;
                }
            }

            if !has_next {
                break;
            }
            if removed == 0 {
                return Err(MigrationError::no_progress(format!(
                    "cross-chain relations of tenant {tenant_id}"
                )));
            }
        }
        Ok(stats)
    }

    /// Rewrite one edge; returns whether the original edge was deleted
    async fn rewrite_edge(
        &self,
        tenant_id: &TenantId,
        relation: &RelationEdge,
        stats: &mut RewriteStats,
    ) -> Result<bool, MigrationError> {
        let source_node_id = RuleNodeId::from_entity_id(&relation.from).ok_or_else(|| {
            MigrationError::invalid_document(format!(
                "relation source {} is not a rule node",
                relation.from
            ))
        })?;
        let target_chain_id = RuleChainId::from_entity_id(&relation.to).ok_or_else(|| {
            MigrationError::invalid_document(format!(
                "relation target {} is not a rule chain",
                relation.to
            ))
        })?;

        let source_node = self
            .rule_chains
            .find_rule_node_by_id(tenant_id, &source_node_id)
            .await?
            .ok_or_else(|| MigrationError::entity_not_found("RuleNode", source_node_id))?;
        let target_chain = self
            .rule_chains
            .find_rule_chain_by_id(tenant_id, &target_chain_id)
            .await?
            .ok_or_else(|| MigrationError::entity_not_found("RuleChain", target_chain_id))?;
        let source_chain_id = source_node.rule_chain_id;

        let proxy = match self
            .find_resumable_proxy(tenant_id, relation, &source_node, &target_chain)
            .await?
        {
            Some(proxy) => {
                tracing::debug!(
                    "[{}] Reusing proxy node {} for {} --{}--> {}",
                    tenant_id,
                    proxy.id,
                    source_node.id,
                    relation.relation_type,
                    target_chain.id
                );
                stats.proxies_reused += 1;
                proxy
            }
            None => {
                let proxy =
                    proxy_node(&source_node, &target_chain, relation.additional_info.clone());
                let proxy = self.rule_chains.save_rule_node(tenant_id, proxy).await?;
                stats.proxies_created += 1;
                proxy
            }
        };

        let containment = RelationEdge::contains(source_chain_id, proxy.id);
        if !self.relations.save_relation(tenant_id, &containment).await? {
            tracing::debug!("[{}] Chain {} already contains {}", tenant_id, source_chain_id, proxy.id);
        }

        let link = RelationEdge::new(
            source_node.id,
            proxy.id,
            relation.relation_type.clone(),
            RelationTypeGroup::NodeLink,
        )
        .with_additional_info(relation.additional_info.clone());
        if !self.relations.save_relation(tenant_id, &link).await? {
            tracing::debug!(
                "[{}] Link {} --{}--> {} already present",
                tenant_id,
                source_node.id,
                relation.relation_type,
                proxy.id
            );
        }

        let removed = self.relations.delete_relation(tenant_id, relation).await?;
        if removed {
            stats.edges_rewritten += 1;
        }
        Ok(removed)
    }

    async fn find_resumable_proxy(
        &self,
        tenant_id: &TenantId,
        relation: &RelationEdge,
        source_node: &RuleNode,
        target_chain: &RuleChain,
    ) -> Result<Option<RuleNode>, MigrationError> {
        let candidates = self
            .rule_chains
            .find_rule_nodes_by_chain(tenant_id, &source_node.rule_chain_id)
            .await?
            .into_iter()
            .filter(|node| {
                node.forwarding_target() == Some(target_chain.id)
                    && is_proxy_for(node, source_node.id)
            });

        let mut orphan = None;
        for candidate in candidates {
            let inbound = self
                .relations
                .find_by_to(tenant_id, &candidate.id.entity_id(), RelationTypeGroup::NodeLink)
                .await?;
            let already_linked = inbound.iter().any(|edge| {
                edge.from == relation.from && edge.relation_type == relation.relation_type
            });
            if already_linked {
                return Ok(Some(candidate));
            }
            let matches_signature = candidate.name == target_chain.name
                && candidate.additional_info == relation.additional_info
                && !candidate.debug_mode;
            if orphan.is_none() && inbound.is_empty() && matches_signature {
                orphan = Some(candidate);
            }
        }
        Ok(orphan)
    }
}

#[async_trait]
impl EntityUpdater<Tenant> for NestedRuleNodeRewriter {
    fn name(&self) -> &str {
        "Tenants nested rule chain updater"
    }

    fn force_report_total(&self) -> bool {
        true
    }

    async fn update_entity(&self, tenant: Tenant) -> Result<(), MigrationError> {
        let stats = self.rewrite_tenant(&tenant.id).await?;
        if stats.edges_rewritten > 0 {
            tracing::info!(
                "[{}] Rewrote {} cross-chain relation(s) of tenant '{}' ({} proxies created, {} reused)",
                tenant.id,
                stats.edges_rewritten,
                tenant.name,
                stats.proxies_created,
                stats.proxies_reused
            );
        }
        Ok(())
    }
}
