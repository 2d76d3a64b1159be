//! RelationStore Trait - Relation Edge Persistence
//!
//! Insert and delete are idempotent-safe: re-applying a change that already
//! happened returns `Ok(false)` instead of failing or duplicating the edge.
//! Stores enforce the `(from, to, type, group)` uniqueness invariant.

use crate::db::DatabaseError;
use crate::models::{EntityId, RelationEdge, RelationTypeGroup, RuleChainType, TenantId};
use async_trait::async_trait;

#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Up to `limit` node-link edges whose source is a rule node inside a
    /// chain of `chain_type` and whose destination is a rule chain
    async fn find_rule_node_to_rule_chain_relations(
        &self,
        tenant_id: &TenantId,
        chain_type: RuleChainType,
        limit: usize,
    ) -> Result<Vec<RelationEdge>, DatabaseError>;

    async fn find_by_from(
        &self,
        tenant_id: &TenantId,
        from: &EntityId,
        type_group: RelationTypeGroup,
    ) -> Result<Vec<RelationEdge>, DatabaseError>;

    async fn find_by_to(
        &self,
        tenant_id: &TenantId,
        to: &EntityId,
        type_group: RelationTypeGroup,
    ) -> Result<Vec<RelationEdge>, DatabaseError>;

    /// Insert an edge; `Ok(false)` when an edge with the same key already exists
    async fn save_relation(
        &self,
        tenant_id: &TenantId,
        relation: &RelationEdge,
    ) -> Result<bool, DatabaseError>;

    /// Delete an edge by key; `Ok(false)` when it was already gone
    async fn delete_relation(
        &self,
        tenant_id: &TenantId,
        relation: &RelationEdge,
    ) -> Result<bool, DatabaseError>;
}
