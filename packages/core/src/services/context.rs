//! Collaborators and settings shared by every upgrade step

use crate::config::UpgradeConfig;
use crate::db::{
    AlarmStore, CustomerLookup, DeviceProfileStore, InMemoryStore, PagedSource, RelationStore,
    RuleChainStore, RuleChainTemplates, TimeseriesStore,
};
use crate::models::{Alarm, DeviceProfile, EntityView, Tenant};
use std::sync::Arc;

#[derive(Clone)]
pub struct UpgradeContext {
    pub tenant_source: Arc<dyn PagedSource<Tenant>>,
    pub entity_view_source: Arc<dyn PagedSource<EntityView>>,
    pub alarm_source: Arc<dyn PagedSource<Alarm>>,
    pub device_profile_source: Arc<dyn PagedSource<DeviceProfile>>,
    pub relations: Arc<dyn RelationStore>,
    pub rule_chains: Arc<dyn RuleChainStore>,
    pub templates: Arc<dyn RuleChainTemplates>,
    pub alarms: Arc<dyn AlarmStore>,
    pub device_profiles: Arc<dyn DeviceProfileStore>,
    pub customers: Arc<dyn CustomerLookup>,
    pub timeseries: Arc<dyn TimeseriesStore>,
    pub config: UpgradeConfig,
}

impl UpgradeContext {
    /// Wire every collaborator to one in-memory store
    pub fn in_memory(store: Arc<InMemoryStore>, config: UpgradeConfig) -> Self {
        Self {
            tenant_source: store.clone(),
            entity_view_source: store.clone(),
            alarm_source: store.clone(),
            device_profile_source: store.clone(),
            relations: store.clone(),
            rule_chains: store.clone(),
            templates: store.clone(),
            alarms: store.clone(),
            device_profiles: store.clone(),
            customers: store.clone(),
            timeseries: store,
            config,
        }
    }
}
