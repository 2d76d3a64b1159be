//! Point-write and lookup collaborators for alarms, device profiles,
//! entity ownership and latest telemetry.

use crate::db::DatabaseError;
use crate::models::{Alarm, CustomerId, DeviceProfile, EntityId, TenantId, TsKvEntry};
use async_trait::async_trait;

#[async_trait]
pub trait AlarmStore: Send + Sync {
    async fn save_alarm(&self, tenant_id: &TenantId, alarm: Alarm) -> Result<Alarm, DatabaseError>;
}

#[async_trait]
pub trait DeviceProfileStore: Send + Sync {
    async fn save_device_profile(
        &self,
        profile: DeviceProfile,
    ) -> Result<DeviceProfile, DatabaseError>;
}

#[async_trait]
pub trait CustomerLookup: Send + Sync {
    /// Customer that owns `entity_id`, `None` when it is tenant-owned
    async fn fetch_entity_customer_id(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
    ) -> Result<Option<CustomerId>, DatabaseError>;
}

#[async_trait]
pub trait TimeseriesStore: Send + Sync {
    /// Latest value of every key recorded for `entity_id`
    async fn find_all_latest(&self, entity_id: &EntityId) -> Result<Vec<TsKvEntry>, DatabaseError>;

    /// Most recent sample of `key` with `start_ts <= ts <= end_ts`
    async fn find_latest_in_range(
        &self,
        entity_id: &EntityId,
        key: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Option<TsKvEntry>, DatabaseError>;

    /// Overwrite the latest values of `entity_id` for the given keys
    async fn save_latest(
        &self,
        entity_id: &EntityId,
        entries: Vec<TsKvEntry>,
    ) -> Result<(), DatabaseError>;
}
