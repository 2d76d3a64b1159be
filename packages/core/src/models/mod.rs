//! Data Models
//!
//! Records the upgrade reads and rewrites:
//!
//! - Typed identifiers (`TenantId`, `RuleChainId`, ...) and the polymorphic `EntityId`
//! - The rule-chain graph: `RuleChain`, `RuleNode`, `RelationEdge`
//! - Tenant-scoped records: entity views, alarms, device profiles
//! - Pagination primitives shared by every paged source

pub mod entity;
pub mod ids;
pub mod page;
pub mod relation;
pub mod rule_chain;

pub use entity::{
    Alarm, AlarmSeverity, DeviceProfile, EntityOwner, EntityView, TelemetryKeys, Tenant, TsKvEntry,
};
pub use ids::{
    AlarmId, CustomerId, DeviceProfileId, EntityId, EntityType, EntityViewId, Identifiable,
    RuleChainId, RuleNodeId, TenantId,
};
pub use page::{Page, PageLink, UpdateScope};
pub use relation::{RelationEdge, RelationKey, RelationTypeGroup, CONTAINS_TYPE};
pub use rule_chain::{
    NodeConnectionInfo, RuleChain, RuleChainMetaData, RuleChainType, RuleNode,
    DEVICE_PROFILE_NODE_TYPE, RULE_CHAIN_INPUT_NODE_TYPE,
};
