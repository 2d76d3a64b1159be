//! Tenant-scoped records touched by the upgrade steps

use crate::models::ids::{
    AlarmId, CustomerId, DeviceProfileId, EntityId, EntityViewId, Identifiable, TenantId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TenantId::random(),
            name: name.into(),
        }
    }
}

/// Telemetry keys an entity view exposes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryKeys {
    #[serde(default)]
    pub timeseries: Option<Vec<String>>,
}

/// Time-windowed projection of another entity's telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub id: EntityViewId,
    pub tenant_id: TenantId,
    pub name: String,
    /// The entity whose telemetry is viewed
    pub entity_id: EntityId,
    #[serde(default)]
    pub keys: Option<TelemetryKeys>,
    #[serde(default)]
    pub start_time_ms: i64,
    /// `0` means the window is open-ended
    #[serde(default)]
    pub end_time_ms: i64,
}

impl EntityView {
    /// Explicitly configured timeseries keys; empty when none are configured
    pub fn timeseries_keys(&self) -> &[String] {
        self.keys
            .as_ref()
            .and_then(|keys| keys.timeseries.as_deref())
            .unwrap_or(&[])
    }

    pub fn window_end_ms(&self) -> i64 {
        if self.end_time_ms == 0 {
            i64::MAX
        } else {
            self.end_time_ms
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsKvEntry {
    pub key: String,
    pub ts: i64,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmSeverity {
    Critical,
    Major,
    Minor,
    Warning,
    Indeterminate,
}

impl AlarmSeverity {
    /// All severities, most severe first
    pub const ALL: [AlarmSeverity; 5] = [
        AlarmSeverity::Critical,
        AlarmSeverity::Major,
        AlarmSeverity::Minor,
        AlarmSeverity::Warning,
        AlarmSeverity::Indeterminate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSeverity::Critical => "CRITICAL",
            AlarmSeverity::Major => "MAJOR",
            AlarmSeverity::Minor => "MINOR",
            AlarmSeverity::Warning => "WARNING",
            AlarmSeverity::Indeterminate => "INDETERMINATE",
        }
    }
}

impl fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: AlarmId,
    pub tenant_id: TenantId,
    #[serde(rename = "type")]
    pub alarm_type: String,
    pub severity: AlarmSeverity,
    #[serde(default)]
    pub originator: Option<EntityId>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub id: DeviceProfileId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Semi-structured profile document (alarm rules live under `alarms`)
    #[serde(default)]
    pub profile_data: Value,
}

/// Ownership record: `entity_id` is assigned to `customer_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOwner {
    pub entity_id: EntityId,
    pub customer_id: CustomerId,
}

impl Identifiable for Tenant {
    fn identity(&self) -> EntityId {
        self.id.entity_id()
    }
}

impl Identifiable for EntityView {
    fn identity(&self) -> EntityId {
        self.id.entity_id()
    }
}

impl Identifiable for Alarm {
    fn identity(&self) -> EntityId {
        self.id.entity_id()
    }
}

impl Identifiable for DeviceProfile {
    fn identity(&self) -> EntityId {
        self.id.entity_id()
    }
}
