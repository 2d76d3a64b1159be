//! Nested Rule Node Rewrite Tests
//!
//! Integration tests for replacing cross-chain node links with proxy
//! `RuleChainInputNode`s.
//!
//! ## Test Coverage
//! - Every rewritten source keeps reaching its target chain through a proxy
//! - Fetch round count for full and short final packs
//! - Resuming after an interrupted run reuses the half-built proxy
//! - Forwarders the upgrade did not create are never adopted
//! - Edges of the source node other than the rewritten one are untouched
//! - A failing tenant does not stop the others
//! - Re-running is a no-op

#[cfg(test)]
mod nested_rule_node_rewrite_tests {
    use anyhow::Result;
    use rulegraph_core::db::{InMemoryStore, RelationStore, RuleChainStore};
    use rulegraph_core::models::{
        EntityType, RelationEdge, RelationTypeGroup, RuleChain, RuleChainType, RuleNode, Tenant,
        TenantId, CONTAINS_TYPE, RULE_CHAIN_INPUT_NODE_TYPE,
    };
    use rulegraph_core::services::{
        proxy_node, DataUpdateService, NestedRuleNodeRewriter, UpgradeContext, PROXY_SOURCE_KEY,
    };
    use rulegraph_core::UpgradeConfig;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<InMemoryStore>,
        tenant: Tenant,
        source_chain: RuleChain,
        target_chain: RuleChain,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        store.add_tenant(tenant.clone()).await;
        let source_chain = RuleChain::new(tenant.id, "Ingest", RuleChainType::Core);
        let target_chain = RuleChain::new(tenant.id, "Alarms", RuleChainType::Core);
        store.add_rule_chain(source_chain.clone()).await;
        store.add_rule_chain(target_chain.clone()).await;
        Fixture {
            store,
            tenant,
            source_chain,
            target_chain,
        }
    }

    impl Fixture {
        /// Add `count` nodes to the source chain, each linked straight into the target chain
        async fn cross_links(&self, count: usize, label: &str) -> Result<Vec<(RuleNode, RelationEdge)>> {
            let mut links = Vec::with_capacity(count);
            for i in 0..count {
                let node = RuleNode::new(self.source_chain.id, "rule.filter.Script", format!("Filter {i}"));
                let node = self.store.add_rule_node(self.tenant.id, node).await?;
                let edge = RelationEdge::new(
                    node.id,
                    self.target_chain.id,
                    label,
                    RelationTypeGroup::NodeLink,
                )
                .with_additional_info(Some(json!({ "ruleChainNodeId": format!("rule-chain-node-{i}") })));
                assert!(self.store.add_relation(self.tenant.id, edge.clone()).await);
                links.push((node, edge));
            }
            Ok(links)
        }

        async fn proxies(&self) -> Result<Vec<RuleNode>> {
            Ok(self
                .store
                .find_rule_nodes_by_chain(&self.tenant.id, &self.source_chain.id)
                .await?
                .into_iter()
                .filter(|node| node.node_type == RULE_CHAIN_INPUT_NODE_TYPE)
                .collect())
        }

        fn rewriter(&self, pack_size: usize) -> NestedRuleNodeRewriter {
            NestedRuleNodeRewriter::new(self.store.clone(), self.store.clone()).with_pack_size(pack_size)
        }
    }

    async fn cross_chain_edges(store: &InMemoryStore, tenant_id: &TenantId) -> Result<Vec<RelationEdge>> {
        Ok(store
            .find_rule_node_to_rule_chain_relations(tenant_id, RuleChainType::Core, usize::MAX)
            .await?)
    }

    #[tokio::test]
    async fn test_sources_reach_target_through_proxy() -> Result<()> {
        let fx = fixture().await;
        let links = fx.cross_links(3, "Success").await?;

        let stats = fx.rewriter(1024).rewrite_tenant(&fx.tenant.id).await?;

        assert_eq!(stats.edges_rewritten, 3);
        assert_eq!(stats.proxies_created, 3);
        assert!(cross_chain_edges(&fx.store, &fx.tenant.id).await?.is_empty());

        for (node, original) in &links {
            let outgoing = fx
                .store
                .find_by_from(&fx.tenant.id, &node.id.entity_id(), RelationTypeGroup::NodeLink)
                .await?;
            assert_eq!(outgoing.len(), 1);
            let link = &outgoing[0];
            assert_eq!(link.relation_type, "Success");
            assert_eq!(link.to.entity_type, EntityType::RuleNode);
            assert_eq!(link.additional_info, original.additional_info);

            let proxy = fx
                .proxies()
                .await?
                .into_iter()
                .find(|proxy| proxy.id.uuid() == link.to.id)
                .expect("link must end at a proxy in the source chain");
            assert_eq!(proxy.forwarding_target(), Some(fx.target_chain.id));
            assert_eq!(proxy.name, fx.target_chain.name);
            assert_eq!(
                proxy.configuration,
                json!({
                    "ruleChainId": fx.target_chain.id.to_string(),
                    PROXY_SOURCE_KEY: node.id.to_string(),
                })
            );

            let containers = fx
                .store
                .find_by_to(&fx.tenant.id, &proxy.id.entity_id(), RelationTypeGroup::Containment)
                .await?;
            assert_eq!(containers.len(), 1);
            assert_eq!(containers[0].from, fx.source_chain.id.entity_id());
            assert_eq!(containers[0].relation_type, CONTAINS_TYPE);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_rounds_with_short_final_pack() -> Result<()> {
        let fx = fixture().await;
        fx.cross_links(5, "Success").await?;

        let stats = fx.rewriter(2).rewrite_tenant(&fx.tenant.id).await?;

        assert_eq!(stats.fetch_rounds, 3);
        assert_eq!(stats.edges_rewritten, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_rounds_with_exact_multiple() -> Result<()> {
        let fx = fixture().await;
        fx.cross_links(4, "Success").await?;

        let stats = fx.rewriter(2).rewrite_tenant(&fx.tenant.id).await?;

        // Two full packs, then an empty one that ends the loop.
        assert_eq!(stats.fetch_rounds, 3);
        assert_eq!(stats.edges_rewritten, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_resume_reuses_linked_proxy() -> Result<()> {
        let fx = fixture().await;
        let links = fx.cross_links(1, "Success").await?;
        let (node, original) = &links[0];

        // Interrupted after the proxy and its inbound link were written.
        let proxy = proxy_node(node, &fx.target_chain, original.additional_info.clone());
        let proxy = fx.store.add_rule_node(fx.tenant.id, proxy).await?;
        fx.store
            .add_relation(
                fx.tenant.id,
                RelationEdge::new(node.id, proxy.id, "Success", RelationTypeGroup::NodeLink)
                    .with_additional_info(original.additional_info.clone()),
            )
            .await;

        let stats = fx.rewriter(1024).rewrite_tenant(&fx.tenant.id).await?;

        assert_eq!(stats.proxies_reused, 1);
        assert_eq!(stats.proxies_created, 0);
        assert_eq!(stats.edges_rewritten, 1);
        let proxies = fx.proxies().await?;
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].id, proxy.id);
        assert!(cross_chain_edges(&fx.store, &fx.tenant.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_resume_adopts_orphan_proxy() -> Result<()> {
        let fx = fixture().await;
        let links = fx.cross_links(1, "Failure").await?;
        let (node, original) = &links[0];

        // Interrupted right after the proxy node was saved.
        let orphan = proxy_node(node, &fx.target_chain, original.additional_info.clone());
        let orphan = fx.store.add_rule_node(fx.tenant.id, orphan).await?;

        let stats = fx.rewriter(1024).rewrite_tenant(&fx.tenant.id).await?;

        assert_eq!(stats.proxies_reused, 1);
        assert_eq!(fx.proxies().await?.len(), 1);
        let outgoing = fx
            .store
            .find_by_from(&fx.tenant.id, &node.id.entity_id(), RelationTypeGroup::NodeLink)
            .await?;
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].to, orphan.id.entity_id());
        assert_eq!(outgoing[0].relation_type, "Failure");
        Ok(())
    }

    #[tokio::test]
    async fn test_unlinked_operator_forwarder_is_not_adopted() -> Result<()> {
        let fx = fixture().await;
        // Forwarder placed by an operator; same name and metadata as a fresh proxy.
        let manual = RuleNode::rule_chain_input(fx.source_chain.id, &fx.target_chain);
        let manual = fx.store.add_rule_node(fx.tenant.id, manual).await?;
        let node = fx
            .store
            .add_rule_node(
                fx.tenant.id,
                RuleNode::new(fx.source_chain.id, "rule.filter.Script", "Filter"),
            )
            .await?;
        fx.store
            .add_relation(
                fx.tenant.id,
                RelationEdge::new(node.id, fx.target_chain.id, "True", RelationTypeGroup::NodeLink),
            )
            .await;

        let stats = fx.rewriter(1024).rewrite_tenant(&fx.tenant.id).await?;

        assert_eq!(stats.proxies_created, 1);
        assert_eq!(stats.proxies_reused, 0);
        let proxies = fx.proxies().await?;
        assert_eq!(proxies.len(), 2);
        let outgoing = fx
            .store
            .find_by_from(&fx.tenant.id, &node.id.entity_id(), RelationTypeGroup::NodeLink)
            .await?;
        assert_eq!(outgoing.len(), 1);
        assert_ne!(outgoing[0].to, manual.id.entity_id());
        assert!(fx
            .store
            .find_by_to(&fx.tenant.id, &manual.id.entity_id(), RelationTypeGroup::NodeLink)
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_other_edges_of_source_are_untouched() -> Result<()> {
        let fx = fixture().await;
        let links = fx.cross_links(1, "Success").await?;
        let (node, original) = &links[0];
        let next = fx
            .store
            .add_rule_node(
                fx.tenant.id,
                RuleNode::new(fx.source_chain.id, "rule.action.Log", "Log"),
            )
            .await?;
        let upstream = fx
            .store
            .add_rule_node(
                fx.tenant.id,
                RuleNode::new(fx.source_chain.id, "rule.input.Message", "Input"),
            )
            .await?;
        let in_chain = RelationEdge::new(node.id, next.id, "Failure", RelationTypeGroup::NodeLink);
        let inbound = RelationEdge::new(upstream.id, node.id, "Success", RelationTypeGroup::NodeLink);
        fx.store.add_relation(fx.tenant.id, in_chain.clone()).await;
        fx.store.add_relation(fx.tenant.id, inbound.clone()).await;

        let stats = fx.rewriter(1024).rewrite_tenant(&fx.tenant.id).await?;

        assert_eq!(stats.edges_rewritten, 1);
        let outgoing = fx
            .store
            .find_by_from(&fx.tenant.id, &node.id.entity_id(), RelationTypeGroup::NodeLink)
            .await?;
        assert_eq!(outgoing.len(), 2);
        assert!(outgoing.contains(&in_chain));
        assert!(!outgoing.contains(original));
        let incoming = fx
            .store
            .find_by_to(&fx.tenant.id, &node.id.entity_id(), RelationTypeGroup::NodeLink)
            .await?;
        assert_eq!(incoming, vec![inbound]);
        Ok(())
    }

    #[tokio::test]
    async fn test_rerun_writes_nothing() -> Result<()> {
        let fx = fixture().await;
        fx.cross_links(3, "Success").await?;
        let rewriter = fx.rewriter(2);
        rewriter.rewrite_tenant(&fx.tenant.id).await?;
        let writes = fx.store.write_count();
        let relations = fx.store.snapshot().await.relations.len();

        let stats = rewriter.rewrite_tenant(&fx.tenant.id).await?;

        assert_eq!(stats.fetch_rounds, 1);
        assert_eq!(stats.edges_rewritten, 0);
        assert_eq!(fx.store.write_count(), writes);
        assert_eq!(fx.store.snapshot().await.relations.len(), relations);
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_tenant_does_not_stop_others() -> Result<()> {
        let fx = fixture().await;
        fx.cross_links(2, "Success").await?;

        let broken = Tenant::new("Broken");
        fx.store.add_tenant(broken.clone()).await;
        let broken_chain = RuleChain::new(broken.id, "Ingest", RuleChainType::Core);
        let broken_target = RuleChain::new(broken.id, "Elsewhere", RuleChainType::Core);
        fx.store.add_rule_chain(broken_chain.clone()).await;
        fx.store.add_rule_chain(broken_target.clone()).await;
        let node = fx
            .store
            .add_rule_node(broken.id, RuleNode::new(broken_chain.id, "rule.filter.Script", "Filter"))
            .await?;
        fx.store
            .add_relation(
                broken.id,
                RelationEdge::new(node.id, broken_target.id, "Success", RelationTypeGroup::NodeLink),
            )
            .await;
        fx.store.poison(broken.id.uuid()).await;

        let config = UpgradeConfig {
            nested_rule_node_pack_size: 1,
            ..Default::default()
        };
        let service = DataUpdateService::new(UpgradeContext::in_memory(fx.store.clone(), config));
        let report = service.update_data("3.3.2").await?;

        assert_eq!(report.to_version(), "3.3.3");
        assert_eq!(report.updated(), 1);
        assert_eq!(report.failed(), 1);
        assert!(cross_chain_edges(&fx.store, &fx.tenant.id).await?.is_empty());
        assert_eq!(fx.proxies().await?.len(), 2);
        Ok(())
    }
}
