//! Rule Chain Graph Model
//!
//! A `RuleChain` is a container of `RuleNode`s. Membership is recorded twice:
//! on the node (`rule_chain_id`) and as a `Contains` edge from the chain.
//! Routing between nodes is expressed as `NodeLink` relation edges.

use crate::models::ids::{RuleChainId, RuleNodeId, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Node type that forwards execution into another rule chain
pub const RULE_CHAIN_INPUT_NODE_TYPE: &str = "rule.flow.RuleChainInputNode";

/// Node type that evaluates device-profile alarm rules
pub const DEVICE_PROFILE_NODE_TYPE: &str = "rule.profile.DeviceProfileNode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleChainType {
    Core,
    Edge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleChain {
    pub id: RuleChainId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(rename = "type")]
    pub chain_type: RuleChainType,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub first_rule_node_id: Option<RuleNodeId>,
}

impl RuleChain {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, chain_type: RuleChainType) -> Self {
        Self {
            id: RuleChainId::random(),
            tenant_id,
            name: name.into(),
            chain_type,
            root: false,
            first_rule_node_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleNode {
    pub id: RuleNodeId,
    pub rule_chain_id: RuleChainId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub configuration: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

impl RuleNode {
    pub fn new(
        rule_chain_id: RuleChainId,
        node_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: RuleNodeId::random(),
            rule_chain_id,
            node_type: node_type.into(),
            name: name.into(),
            debug_mode: false,
            configuration: json!({}),
            additional_info: None,
        }
    }

    /// Proxy node living in `owner` that forwards messages into `target`
    pub fn rule_chain_input(owner: RuleChainId, target: &RuleChain) -> Self {
        let mut node = Self::new(owner, RULE_CHAIN_INPUT_NODE_TYPE, target.name.clone());
        node.configuration = json!({ "ruleChainId": target.id.to_string() });
        node
    }

    /// Chain a [`RULE_CHAIN_INPUT_NODE_TYPE`] node forwards to, if this is one
    pub fn forwarding_target(&self) -> Option<RuleChainId> {
        if self.node_type != RULE_CHAIN_INPUT_NODE_TYPE {
            return None;
        }
        self.configuration
            .get("ruleChainId")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
            .map(RuleChainId)
    }
}

/// `from_index --label--> to_index` within one chain's node list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConnectionInfo {
    pub from_index: usize,
    pub to_index: usize,
    #[serde(rename = "type")]
    pub label: String,
}

/// Index-addressed view of a chain's nodes and internal links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleChainMetaData {
    pub rule_chain_id: RuleChainId,
    pub first_node_index: Option<usize>,
    pub nodes: Vec<RuleNode>,
    pub connections: Vec<NodeConnectionInfo>,
}

impl RuleChainMetaData {
    pub fn add_connection_info(&mut self, from_index: usize, to_index: usize, label: &str) {
        self.connections.push(NodeConnectionInfo {
            from_index,
            to_index,
            label: label.to_string(),
        });
    }
}
