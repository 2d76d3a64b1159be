//! Per-Entity Upgrade Transforms
//!
//! Each submodule provides one [`EntityUpdater`](crate::services::EntityUpdater)
//! used by a version upgrade:
//!
//! - `default_rule_chains` - seed missing core and edge root chains (1.4.0, 3.2.2)
//! - `entity_view_telemetry` - copy latest telemetry onto entity views (3.0.1)
//! - `root_rule_chain` - put a device profile node in front of the root chain (3.1.1)
//! - `alarm_customers` - propagate originator customers onto alarms (3.2.2)
//! - `device_profile_conditions` - wrap scalar alarm thresholds (3.2.2)
//!
//! The nested rule node rewrite (3.3.2) lives in
//! [`graph_rewriter`](crate::services::graph_rewriter).

pub mod alarm_customers;
pub mod default_rule_chains;
pub mod device_profile_conditions;
pub mod entity_view_telemetry;
pub mod root_rule_chain;

pub use alarm_customers::AlarmCustomerUpdater;
pub use default_rule_chains::{DefaultRuleChainUpdater, EdgeRuleChainUpdater};
pub use device_profile_conditions::DeviceProfileConditionsUpdater;
pub use entity_view_telemetry::EntityViewTelemetryUpdater;
pub use root_rule_chain::RootRuleChainUpdater;
