//! Relation Edges
//!
//! Directed, typed edges between entities. The store guarantees that the
//! tuple `(from, to, relation_type, type_group)` is unique within a tenant.

use crate::models::ids::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relation type used for container → member edges
pub const CONTAINS_TYPE: &str = "Contains";

/// Edge category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationTypeGroup {
    /// Rule chain owns a rule node
    Containment,
    /// Rule node routes messages to another node (or, before the upgrade, to a chain)
    NodeLink,
}

/// Identity of an edge without its payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationKey {
    pub from: EntityId,
    pub to: EntityId,
    pub relation_type: String,
    pub type_group: RelationTypeGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    pub from: EntityId,
    pub to: EntityId,
    /// Label, e.g. `Success`, `Failure` or [`CONTAINS_TYPE`]
    #[serde(rename = "type")]
    pub relation_type: String,
    pub type_group: RelationTypeGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

impl RelationEdge {
    pub fn new(
        from: impl Into<EntityId>,
        to: impl Into<EntityId>,
        relation_type: impl Into<String>,
        type_group: RelationTypeGroup,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            type_group,
            additional_info: None,
        }
    }

    /// Container edge `chain --Contains--> member`
    pub fn contains(from: impl Into<EntityId>, to: impl Into<EntityId>) -> Self {
        Self::new(from, to, CONTAINS_TYPE, RelationTypeGroup::Containment)
    }

    pub fn with_additional_info(mut self, info: Option<Value>) -> Self {
        self.additional_info = info;
        self
    }

    pub fn key(&self) -> RelationKey {
        RelationKey {
            from: self.from,
            to: self.to,
            relation_type: self.relation_type.clone(),
            type_group: self.type_group,
        }
    }
}
