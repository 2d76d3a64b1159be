//! Typed Entity Identifiers
//!
//! Every persisted record is addressed by a UUID wrapped in a type that names
//! the entity kind. `EntityId` is the polymorphic form used on relation edges
//! and as an alarm originator, where the kind is only known at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Entity kinds that can appear at either end of a relation edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Tenant,
    Customer,
    Device,
    Asset,
    EntityView,
    RuleChain,
    RuleNode,
    Alarm,
    DeviceProfile,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Tenant => "TENANT",
            EntityType::Customer => "CUSTOMER",
            EntityType::Device => "DEVICE",
            EntityType::Asset => "ASSET",
            EntityType::EntityView => "ENTITY_VIEW",
            EntityType::RuleChain => "RULE_CHAIN",
            EntityType::RuleNode => "RULE_NODE",
            EntityType::Alarm => "ALARM",
            EntityType::DeviceProfile => "DEVICE_PROFILE",
        };
        f.write_str(name)
    }
}

/// Polymorphic reference to any entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityId {
    pub entity_type: EntityType,
    pub id: Uuid,
}

impl EntityId {
    pub fn new(entity_type: EntityType, id: Uuid) -> Self {
        Self { entity_type, id }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// Records that can name themselves in logs and error reports
pub trait Identifiable {
    fn identity(&self) -> EntityId;
}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn uuid(&self) -> Uuid {
                self.0
            }

            pub fn entity_id(&self) -> EntityId {
                EntityId::new($kind, self.0)
            }
        }

        impl From<$name> for EntityId {
            fn from(id: $name) -> Self {
                id.entity_id()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_id!(
    /// Tenant identifier; scopes every other record
    TenantId => EntityType::Tenant
);
typed_id!(CustomerId => EntityType::Customer);
typed_id!(RuleChainId => EntityType::RuleChain);
typed_id!(RuleNodeId => EntityType::RuleNode);
typed_id!(EntityViewId => EntityType::EntityView);
typed_id!(AlarmId => EntityType::Alarm);
typed_id!(DeviceProfileId => EntityType::DeviceProfile);

impl RuleChainId {
    /// Narrow a polymorphic id, returning `None` when it names another kind
    pub fn from_entity_id(id: &EntityId) -> Option<Self> {
        (id.entity_type == EntityType::RuleChain).then_some(Self(id.id))
    }
}

impl RuleNodeId {
    /// Narrow a polymorphic id, returning `None` when it names another kind
    pub fn from_entity_id(id: &EntityId) -> Option<Self> {
        (id.entity_type == EntityType::RuleNode).then_some(Self(id.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_serialization_contract() {
        let id = RuleChainId(Uuid::nil()).entity_id();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json["entityType"], "RULE_CHAIN");
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_narrowing_rejects_other_kinds() {
        let node = RuleNodeId::random().entity_id();
        assert!(RuleChainId::from_entity_id(&node).is_none());
        assert_eq!(
            RuleNodeId::from_entity_id(&node).map(|id| id.uuid()),
            Some(node.id)
        );
    }
}
