//! In-Memory Store
//!
//! A single-process implementation of every storage collaborator, backed by a
//! serializable [`StoreSnapshot`]. The CLI loads a snapshot from JSON, runs the
//! upgrade against it and writes it back; tests seed it directly.
//!
//! # Invariants enforced
//!
//! - Relation edges are unique per `(from, to, type, group)` within a tenant
//! - A rule node can only be saved into an existing chain of the same tenant,
//!   and saving it also records the chain's `Contains` edge
//!
//! # Fault injection
//!
//! [`InMemoryStore::poison`] marks an id so that any read or write touching it
//! fails with [`DatabaseError::Backend`]. Used to exercise failure isolation.

use crate::db::{
    AlarmStore, CustomerLookup, DatabaseError, DeviceProfileStore, PagedSource, RelationStore,
    RuleChainStore, RuleChainTemplates, TimeseriesStore,
};
use crate::models::{
    Alarm, CustomerId, DeviceProfile, EntityId, EntityOwner, EntityType, EntityView, Page,
    PageLink, RelationEdge, RelationTypeGroup, RuleChain, RuleChainId, RuleChainMetaData,
    RuleChainType, RuleNode, RuleNodeId, Tenant, TenantId, TsKvEntry, UpdateScope,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A relation edge together with the tenant that owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRelation {
    pub tenant_id: TenantId,
    #[serde(flatten)]
    pub edge: RelationEdge,
}

/// One telemetry sample (or latest value) of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsRecord {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub entry: TsKvEntry,
}

/// Complete, serializable store contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSnapshot {
    pub tenants: Vec<Tenant>,
    pub rule_chains: Vec<RuleChain>,
    pub rule_nodes: Vec<RuleNode>,
    pub relations: Vec<StoredRelation>,
    pub entity_views: Vec<EntityView>,
    pub alarms: Vec<Alarm>,
    pub device_profiles: Vec<DeviceProfile>,
    pub owners: Vec<EntityOwner>,
    pub timeseries: Vec<TsRecord>,
    pub latest: Vec<TsRecord>,
}

impl StoreSnapshot {
    fn chain(&self, tenant_id: &TenantId, id: &RuleChainId) -> Option<&RuleChain> {
        self.rule_chains
            .iter()
            .find(|chain| chain.id == *id && chain.tenant_id == *tenant_id)
    }

    fn node(&self, tenant_id: &TenantId, id: &RuleNodeId) -> Option<&RuleNode> {
        self.rule_nodes
            .iter()
            .find(|node| node.id == *id)
            .filter(|node| self.chain(tenant_id, &node.rule_chain_id).is_some())
    }

    fn nodes_of(&self, rule_chain_id: &RuleChainId) -> Vec<RuleNode> {
        self.rule_nodes
            .iter()
            .filter(|node| node.rule_chain_id == *rule_chain_id)
            .cloned()
            .collect()
    }

    fn root_chain(&self, tenant_id: &TenantId, chain_type: RuleChainType) -> Option<RuleChain> {
        self.rule_chains
            .iter()
            .find(|chain| {
                chain.tenant_id == *tenant_id && chain.root && chain.chain_type == chain_type
            })
            .cloned()
    }

    fn has_relation(&self, tenant_id: &TenantId, edge: &RelationEdge) -> bool {
        let key = edge.key();
        self.relations
            .iter()
            .any(|stored| stored.tenant_id == *tenant_id && stored.edge.key() == key)
    }

    fn insert_relation(&mut self, tenant_id: TenantId, edge: RelationEdge) -> bool {
        if self.has_relation(&tenant_id, &edge) {
            return false;
        }
        self.relations.push(StoredRelation { tenant_id, edge });
        true
    }

    fn remove_relation(&mut self, tenant_id: &TenantId, edge: &RelationEdge) -> bool {
        let key = edge.key();
        let before = self.relations.len();
        self.relations
            .retain(|stored| !(stored.tenant_id == *tenant_id && stored.edge.key() == key));
        before != self.relations.len()
    }

    fn upsert_node(&mut self, tenant_id: TenantId, node: RuleNode) -> Result<RuleNode, DatabaseError> {
        if self.chain(&tenant_id, &node.rule_chain_id).is_none() {
            return Err(DatabaseError::not_found("RuleChain", node.rule_chain_id));
        }
        match self.rule_nodes.iter_mut().find(|existing| existing.id == node.id) {
            Some(existing) => *existing = node.clone(),
            None => self.rule_nodes.push(node.clone()),
        }
        self.insert_relation(tenant_id, RelationEdge::contains(node.rule_chain_id, node.id));
        Ok(node)
    }

    fn meta_data(
        &self,
        tenant_id: &TenantId,
        rule_chain_id: &RuleChainId,
    ) -> Result<RuleChainMetaData, DatabaseError> {
        let chain = self
            .chain(tenant_id, rule_chain_id)
            .ok_or_else(|| DatabaseError::not_found("RuleChain", rule_chain_id))?;
        let nodes = self.nodes_of(rule_chain_id);
        let index: HashMap<Uuid, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id.uuid(), idx))
            .collect();

        let mut meta_data = RuleChainMetaData {
            rule_chain_id: *rule_chain_id,
            first_node_index: chain
                .first_rule_node_id
                .and_then(|first| index.get(&first.uuid()).copied()),
            nodes,
            connections: Vec::new(),
        };
        for stored in self.relations.iter().filter(|stored| {
            stored.tenant_id == *tenant_id
                && stored.edge.type_group == RelationTypeGroup::NodeLink
                && stored.edge.from.entity_type == EntityType::RuleNode
                && stored.edge.to.entity_type == EntityType::RuleNode
        }) {
            if let (Some(from), Some(to)) = (
                index.get(&stored.edge.from.id),
                index.get(&stored.edge.to.id),
            ) {
                meta_data.add_connection_info(*from, *to, &stored.edge.relation_type);
            }
        }
        Ok(meta_data)
    }

    fn seed_chain(
        &mut self,
        tenant_id: TenantId,
        name: &str,
        chain_type: RuleChainType,
    ) -> Result<(), DatabaseError> {
        let mut chain = RuleChain::new(tenant_id, name, chain_type);
        chain.root = true;
        let switch = RuleNode::new(chain.id, "rule.filter.MsgTypeSwitch", "Message Type Switch");
        let save = RuleNode::new(chain.id, "rule.telemetry.SaveTimeseries", "Save Timeseries");
        chain.first_rule_node_id = Some(switch.id);
        let link = RelationEdge::new(
            switch.id,
            save.id,
            "Post telemetry",
            RelationTypeGroup::NodeLink,
        );
        self.rule_chains.push(chain);
        self.upsert_node(tenant_id, switch)?;
        self.upsert_node(tenant_id, save)?;
        self.insert_relation(tenant_id, link);
        Ok(())
    }
}

/// Storage collaborators backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreSnapshot>,
    poisoned: RwLock<HashSet<Uuid>>,
    writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Load a JSON snapshot from disk
    pub async fn load(path: &Path) -> Result<Self, DatabaseError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| DatabaseError::snapshot_io(path, e))?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&raw)?;
        tracing::debug!(
            "Loaded snapshot from {} ({} tenants, {} relations)",
            path.display(),
            snapshot.tenants.len(),
            snapshot.relations.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to disk as pretty-printed JSON
    pub async fn save(&self, path: &Path) -> Result<(), DatabaseError> {
        let raw = serde_json::to_vec_pretty(&*self.state.read().await)?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| DatabaseError::snapshot_io(path, e))
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    /// Make every operation touching `id` fail
    pub async fn poison(&self, id: Uuid) {
        self.poisoned.write().await.insert(id);
    }

    /// Number of successful mutations since construction
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn check_fault(&self, id: &Uuid) -> Result<(), DatabaseError> {
        if self.poisoned.read().await.contains(id) {
            return Err(DatabaseError::backend(format!("injected fault for {id}")));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    //
    // SEEDING
    //

    pub async fn add_tenant(&self, tenant: Tenant) {
        self.state.write().await.tenants.push(tenant);
    }

    pub async fn add_rule_chain(&self, chain: RuleChain) {
        self.state.write().await.rule_chains.push(chain);
    }

    /// Add a node to its chain, recording the `Contains` edge
    pub async fn add_rule_node(
        &self,
        tenant_id: TenantId,
        node: RuleNode,
    ) -> Result<RuleNode, DatabaseError> {
        self.state.write().await.upsert_node(tenant_id, node)
    }

    pub async fn add_relation(&self, tenant_id: TenantId, edge: RelationEdge) -> bool {
        self.state.write().await.insert_relation(tenant_id, edge)
    }

    pub async fn add_entity_view(&self, view: EntityView) {
        self.state.write().await.entity_views.push(view);
    }

    pub async fn add_alarm(&self, alarm: Alarm) {
        self.state.write().await.alarms.push(alarm);
    }

    pub async fn add_device_profile(&self, profile: DeviceProfile) {
        self.state.write().await.device_profiles.push(profile);
    }

    pub async fn add_owner(&self, entity_id: EntityId, customer_id: CustomerId) {
        self.state.write().await.owners.push(EntityOwner {
            entity_id,
            customer_id,
        });
    }

    pub async fn add_timeseries(&self, entity_id: EntityId, entry: TsKvEntry) {
        self.state
            .write()
            .await
            .timeseries
            .push(TsRecord { entity_id, entry });
    }

    pub async fn add_latest(&self, entity_id: EntityId, entry: TsKvEntry) {
        self.state
            .write()
            .await
            .latest
            .push(TsRecord { entity_id, entry });
    }
}

#[async_trait]
impl PagedSource<Tenant> for InMemoryStore {
    async fn fetch(&self, scope: &UpdateScope, link: &PageLink) -> Result<Page<Tenant>, DatabaseError> {
        let state = self.state.read().await;
        let matching: Vec<Tenant> = state
            .tenants
            .iter()
            .filter(|tenant| scope.includes_tenant(&tenant.id))
            .cloned()
            .collect();
        Ok(Page::from_slice(&matching, link))
    }
}

#[async_trait]
impl PagedSource<EntityView> for InMemoryStore {
    async fn fetch(
        &self,
        scope: &UpdateScope,
        link: &PageLink,
    ) -> Result<Page<EntityView>, DatabaseError> {
        let state = self.state.read().await;
        let matching: Vec<EntityView> = state
            .entity_views
            .iter()
            .filter(|view| scope.includes_tenant(&view.tenant_id))
            .cloned()
            .collect();
        Ok(Page::from_slice(&matching, link))
    }
}

#[async_trait]
impl PagedSource<Alarm> for InMemoryStore {
    async fn fetch(&self, scope: &UpdateScope, link: &PageLink) -> Result<Page<Alarm>, DatabaseError> {
        let state = self.state.read().await;
        let matching: Vec<Alarm> = state
            .alarms
            .iter()
            .filter(|alarm| scope.includes_tenant(&alarm.tenant_id))
            .cloned()
            .collect();
        Ok(Page::from_slice(&matching, link))
    }
}

#[async_trait]
impl PagedSource<DeviceProfile> for InMemoryStore {
    async fn fetch(
        &self,
        scope: &UpdateScope,
        link: &PageLink,
    ) -> Result<Page<DeviceProfile>, DatabaseError> {
        let state = self.state.read().await;
        let matching: Vec<DeviceProfile> = state
            .device_profiles
            .iter()
            .filter(|profile| scope.includes_tenant(&profile.tenant_id))
            .cloned()
            .collect();
        Ok(Page::from_slice(&matching, link))
    }
}

#[async_trait]
impl RelationStore for InMemoryStore {
    async fn find_rule_node_to_rule_chain_relations(
        &self,
        tenant_id: &TenantId,
        chain_type: RuleChainType,
        limit: usize,
    ) -> Result<Vec<RelationEdge>, DatabaseError> {
        self.check_fault(&tenant_id.uuid()).await?;
        let state = self.state.read().await;
        let edges = state
            .relations
            .iter()
            .filter(|stored| {
                stored.tenant_id == *tenant_id
                    && stored.edge.type_group == RelationTypeGroup::NodeLink
                    && stored.edge.from.entity_type == EntityType::RuleNode
                    && stored.edge.to.entity_type == EntityType::RuleChain
            })
            .filter(|stored| {
                state
                    .node(tenant_id, &RuleNodeId(stored.edge.from.id))
                    .and_then(|node| state.chain(tenant_id, &node.rule_chain_id))
                    .is_some_and(|chain| chain.chain_type == chain_type)
            })
            .take(limit)
            .map(|stored| stored.edge.clone())
            .collect();
        Ok(edges)
    }

    async fn find_by_from(
        &self,
        tenant_id: &TenantId,
        from: &EntityId,
        type_group: RelationTypeGroup,
    ) -> Result<Vec<RelationEdge>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .relations
            .iter()
            .filter(|stored| {
                stored.tenant_id == *tenant_id
                    && stored.edge.from == *from
                    && stored.edge.type_group == type_group
            })
            .map(|stored| stored.edge.clone())
            .collect())
    }

    async fn find_by_to(
        &self,
        tenant_id: &TenantId,
        to: &EntityId,
        type_group: RelationTypeGroup,
    ) -> Result<Vec<RelationEdge>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .relations
            .iter()
            .filter(|stored| {
                stored.tenant_id == *tenant_id
                    && stored.edge.to == *to
                    && stored.edge.type_group == type_group
            })
            .map(|stored| stored.edge.clone())
            .collect())
    }

    async fn save_relation(
        &self,
        tenant_id: &TenantId,
        relation: &RelationEdge,
    ) -> Result<bool, DatabaseError> {
        self.check_fault(&relation.from.id).await?;
        self.check_fault(&relation.to.id).await?;
        let inserted = self
            .state
            .write()
            .await
            .insert_relation(*tenant_id, relation.clone());
        if inserted {
            self.record_write();
        }
        Ok(inserted)
    }

    async fn delete_relation(
        &self,
        tenant_id: &TenantId,
        relation: &RelationEdge,
    ) -> Result<bool, DatabaseError> {
        let removed = self.state.write().await.remove_relation(tenant_id, relation);
        if removed {
            self.record_write();
        }
        Ok(removed)
    }
}

#[async_trait]
impl RuleChainStore for InMemoryStore {
    async fn find_rule_chain_by_id(
        &self,
        tenant_id: &TenantId,
        id: &RuleChainId,
    ) -> Result<Option<RuleChain>, DatabaseError> {
        self.check_fault(&id.uuid()).await?;
        Ok(self.state.read().await.chain(tenant_id, id).cloned())
    }

    async fn find_rule_node_by_id(
        &self,
        tenant_id: &TenantId,
        id: &RuleNodeId,
    ) -> Result<Option<RuleNode>, DatabaseError> {
        self.check_fault(&id.uuid()).await?;
        Ok(self.state.read().await.node(tenant_id, id).cloned())
    }

    async fn find_rule_nodes_by_chain(
        &self,
        tenant_id: &TenantId,
        rule_chain_id: &RuleChainId,
    ) -> Result<Vec<RuleNode>, DatabaseError> {
        let state = self.state.read().await;
        if state.chain(tenant_id, rule_chain_id).is_none() {
            return Ok(Vec::new());
        }
        Ok(state.nodes_of(rule_chain_id))
    }

    async fn save_rule_node(
        &self,
        tenant_id: &TenantId,
        node: RuleNode,
    ) -> Result<RuleNode, DatabaseError> {
        self.check_fault(&node.rule_chain_id.uuid()).await?;
        let saved = self.state.write().await.upsert_node(*tenant_id, node)?;
        self.record_write();
        Ok(saved)
    }

    async fn get_root_tenant_rule_chain(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<RuleChain>, DatabaseError> {
        self.check_fault(&tenant_id.uuid()).await?;
        Ok(self
            .state
            .read()
            .await
            .root_chain(tenant_id, RuleChainType::Core))
    }

    async fn get_edge_template_root_rule_chain(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<RuleChain>, DatabaseError> {
        self.check_fault(&tenant_id.uuid()).await?;
        Ok(self
            .state
            .read()
            .await
            .root_chain(tenant_id, RuleChainType::Edge))
    }

    async fn load_rule_chain_meta_data(
        &self,
        tenant_id: &TenantId,
        rule_chain_id: &RuleChainId,
    ) -> Result<RuleChainMetaData, DatabaseError> {
        self.state.read().await.meta_data(tenant_id, rule_chain_id)
    }

    async fn save_rule_chain_meta_data(
        &self,
        tenant_id: &TenantId,
        meta_data: RuleChainMetaData,
    ) -> Result<RuleChainMetaData, DatabaseError> {
        let chain_id = meta_data.rule_chain_id;
        let mut state = self.state.write().await;
        if state.chain(tenant_id, &chain_id).is_none() {
            return Err(DatabaseError::not_found("RuleChain", chain_id));
        }
        let node_count = meta_data.nodes.len();
        let out_of_range = meta_data
            .connections
            .iter()
            .any(|conn| conn.from_index >= node_count || conn.to_index >= node_count)
            || meta_data.first_node_index.is_some_and(|idx| idx >= node_count);
        if out_of_range {
            return Err(DatabaseError::constraint_violation(format!(
                "metadata of rule chain {chain_id} references a node index out of range"
            )));
        }

        let mut node_ids = Vec::with_capacity(node_count);
        for mut node in meta_data.nodes {
            node.rule_chain_id = chain_id;
            node_ids.push(node.id);
            state.upsert_node(*tenant_id, node)?;
        }

        // Internal links are replaced wholesale; links leaving the chain stay.
        let members: HashSet<Uuid> = state
            .nodes_of(&chain_id)
            .iter()
            .map(|node| node.id.uuid())
            .collect();
        state.relations.retain(|stored| {
            !(stored.tenant_id == *tenant_id
                && stored.edge.type_group == RelationTypeGroup::NodeLink
                && members.contains(&stored.edge.from.id)
                && stored.edge.to.entity_type == EntityType::RuleNode
                && members.contains(&stored.edge.to.id))
        });
        for conn in &meta_data.connections {
            let edge = RelationEdge::new(
                node_ids[conn.from_index],
                node_ids[conn.to_index],
                conn.label.clone(),
                RelationTypeGroup::NodeLink,
            );
            state.insert_relation(*tenant_id, edge);
        }

        let first = meta_data.first_node_index.map(|idx| node_ids[idx]);
        if let Some(chain) = state
            .rule_chains
            .iter_mut()
            .find(|chain| chain.id == chain_id)
        {
            chain.first_rule_node_id = first;
        }
        self.record_write();
        state.meta_data(tenant_id, &chain_id)
    }
}

#[async_trait]
impl RuleChainTemplates for InMemoryStore {
    async fn create_default_rule_chains(&self, tenant_id: &TenantId) -> Result<(), DatabaseError> {
        self.check_fault(&tenant_id.uuid()).await?;
        self.state
            .write()
            .await
            .seed_chain(*tenant_id, "Root Rule Chain", RuleChainType::Core)?;
        self.record_write();
        Ok(())
    }

    async fn create_default_edge_rule_chains(
        &self,
        tenant_id: &TenantId,
    ) -> Result<(), DatabaseError> {
        self.check_fault(&tenant_id.uuid()).await?;
        self.state
            .write()
            .await
            .seed_chain(*tenant_id, "Edge Root Rule Chain", RuleChainType::Edge)?;
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl AlarmStore for InMemoryStore {
    async fn save_alarm(&self, _tenant_id: &TenantId, alarm: Alarm) -> Result<Alarm, DatabaseError> {
        self.check_fault(&alarm.id.uuid()).await?;
        let mut state = self.state.write().await;
        match state.alarms.iter_mut().find(|existing| existing.id == alarm.id) {
            Some(existing) => *existing = alarm.clone(),
            None => state.alarms.push(alarm.clone()),
        }
        self.record_write();
        Ok(alarm)
    }
}

#[async_trait]
impl DeviceProfileStore for InMemoryStore {
    async fn save_device_profile(
        &self,
        profile: DeviceProfile,
    ) -> Result<DeviceProfile, DatabaseError> {
        self.check_fault(&profile.id.uuid()).await?;
        let mut state = self.state.write().await;
        match state
            .device_profiles
            .iter_mut()
            .find(|existing| existing.id == profile.id)
        {
            Some(existing) => *existing = profile.clone(),
            None => state.device_profiles.push(profile.clone()),
        }
        self.record_write();
        Ok(profile)
    }
}

#[async_trait]
impl CustomerLookup for InMemoryStore {
    async fn fetch_entity_customer_id(
        &self,
        _tenant_id: &TenantId,
        entity_id: &EntityId,
    ) -> Result<Option<CustomerId>, DatabaseError> {
        self.check_fault(&entity_id.id).await?;
        Ok(self
            .state
            .read()
            .await
            .owners
            .iter()
            .find(|owner| owner.entity_id == *entity_id)
            .map(|owner| owner.customer_id))
    }
}

#[async_trait]
impl TimeseriesStore for InMemoryStore {
    async fn find_all_latest(&self, entity_id: &EntityId) -> Result<Vec<TsKvEntry>, DatabaseError> {
        self.check_fault(&entity_id.id).await?;
        Ok(self
            .state
            .read()
            .await
            .latest
            .iter()
            .filter(|record| record.entity_id == *entity_id)
            .map(|record| record.entry.clone())
            .collect())
    }

    async fn find_latest_in_range(
        &self,
        entity_id: &EntityId,
        key: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Option<TsKvEntry>, DatabaseError> {
        self.check_fault(&entity_id.id).await?;
        Ok(self
            .state
            .read()
            .await
            .timeseries
            .iter()
            .filter(|record| {
                record.entity_id == *entity_id
                    && record.entry.key == key
                    && record.entry.ts >= start_ts
                    && record.entry.ts <= end_ts
            })
            .max_by_key(|record| record.entry.ts)
            .map(|record| record.entry.clone()))
    }

    async fn save_latest(
        &self,
        entity_id: &EntityId,
        entries: Vec<TsKvEntry>,
    ) -> Result<(), DatabaseError> {
        self.check_fault(&entity_id.id).await?;
        let mut state = self.state.write().await;
        for entry in entries {
            match state
                .latest
                .iter_mut()
                .find(|record| record.entity_id == *entity_id && record.entry.key == entry.key)
            {
                Some(existing) => existing.entry = entry,
                None => state.latest.push(TsRecord {
                    entity_id: *entity_id,
                    entry,
                }),
            }
        }
        self.record_write();
        Ok(())
    }
}
