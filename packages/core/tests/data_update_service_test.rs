//! Data Update Service Tests
//!
//! End-to-end runs of each supported source version against an in-memory
//! store, plus the rejection path for unknown versions.

#[cfg(test)]
mod data_update_service_tests {
    use anyhow::Result;
    use rulegraph_core::db::{InMemoryStore, RuleChainStore, TimeseriesStore};
    use rulegraph_core::models::{
        Alarm, AlarmId, AlarmSeverity, CustomerId, DeviceProfile, DeviceProfileId, EntityId,
        EntityType, EntityView, EntityViewId, RuleChainType, Tenant, TsKvEntry,
        DEVICE_PROFILE_NODE_TYPE,
    };
    use rulegraph_core::services::{DataUpdateService, MigrationError, UpgradeContext};
    use rulegraph_core::UpgradeConfig;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn seeded() -> (Arc<InMemoryStore>, Tenant) {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        store.add_tenant(tenant.clone()).await;
        (store, tenant)
    }

    fn service(store: &Arc<InMemoryStore>) -> DataUpdateService {
        DataUpdateService::new(UpgradeContext::in_memory(store.clone(), UpgradeConfig::default()))
    }

    #[tokio::test]
    async fn test_unsupported_version_has_no_side_effects() -> Result<()> {
        let (store, _tenant) = seeded().await;
        let before = serde_json::to_value(store.snapshot().await)?;

        let err = service(&store).update_data("2.5.0").await.unwrap_err();

        assert!(matches!(err, MigrationError::UnsupportedVersion { ref version } if version == "2.5.0"));
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Unable to update data, unsupported fromVersion: 2.5.0"
        );
        assert_eq!(store.write_count(), 0);
        assert_eq!(serde_json::to_value(store.snapshot().await)?, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_1_4_0_creates_default_rule_chains() -> Result<()> {
        let (store, tenant) = seeded().await;

        let report = service(&store).update_data("1.4.0").await?;

        assert_eq!(report.to_version(), "2.0.0");
        assert_eq!(report.steps.len(), 1);
        assert!(store.get_root_tenant_rule_chain(&tenant.id).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_3_0_1_copies_entity_view_telemetry() -> Result<()> {
        let (store, tenant) = seeded().await;
        let device = EntityId::new(EntityType::Device, Uuid::new_v4());
        let view = EntityView {
            id: EntityViewId::random(),
            tenant_id: tenant.id,
            name: "Boiler".to_string(),
            entity_id: device,
            keys: None,
            start_time_ms: 0,
            end_time_ms: 0,
        };
        store.add_entity_view(view.clone()).await;
        let sample = TsKvEntry {
            key: "temperature".to_string(),
            ts: 1_700_000_000_000,
            value: json!(21.5),
        };
        store.add_latest(device, sample.clone()).await;
        store.add_timeseries(device, sample.clone()).await;

        service(&store).update_data("3.0.1").await?;

        assert_eq!(store.find_all_latest(&view.id.entity_id()).await?, vec![sample]);
        Ok(())
    }

    #[tokio::test]
    async fn test_3_1_1_inserts_device_profile_node() -> Result<()> {
        let (store, tenant) = seeded().await;
        service(&store).update_data("1.4.0").await?;

        service(&store).update_data("3.1.1").await?;

        let root = store
            .get_root_tenant_rule_chain(&tenant.id)
            .await?
            .expect("root chain");
        let meta_data = store.load_rule_chain_meta_data(&tenant.id, &root.id).await?;
        let first = meta_data.first_node_index.expect("first node");
        assert_eq!(meta_data.nodes[first].node_type, DEVICE_PROFILE_NODE_TYPE);
        Ok(())
    }

    #[tokio::test]
    async fn test_3_2_2_runs_all_steps_in_order() -> Result<()> {
        let (store, tenant) = seeded().await;
        let device = EntityId::new(EntityType::Device, Uuid::new_v4());
        let customer = CustomerId::random();
        store.add_owner(device, customer).await;

        let alarm = Alarm {
            id: AlarmId::random(),
            tenant_id: tenant.id,
            alarm_type: "Overheat".to_string(),
            severity: AlarmSeverity::Critical,
            originator: Some(device),
            customer_id: None,
        };
        let poisoned = Alarm {
            id: AlarmId::random(),
            ..alarm.clone()
        };
        store.add_alarm(alarm.clone()).await;
        store.add_alarm(poisoned.clone()).await;
        store.poison(poisoned.id.uuid()).await;

        let profile = DeviceProfile {
            id: DeviceProfileId::random(),
            tenant_id: tenant.id,
            name: "Thermostat".to_string(),
            profile_data: json!({
                "alarms": [{
                    "createRules": {"CRITICAL": {"condition": {"spec": {"type": "DURATION", "value": 30}}}},
                    "clearRule": null
                }]
            }),
        };
        store.add_device_profile(profile.clone()).await;

        let report = service(&store).update_data("3.2.2").await?;

        let names: Vec<&str> = report.steps.iter().map(|step| step.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Tenants edge rule chain updater",
                "Tenants alarms customer updater",
                "Device profile alarm conditions updater",
                "OAuth2 configuration notice",
            ]
        );
        assert_eq!(report.to_version(), "3.3.0");

        let edge_root = store.get_edge_template_root_rule_chain(&tenant.id).await?;
        assert_eq!(edge_root.map(|chain| chain.chain_type), Some(RuleChainType::Edge));

        let snapshot = store.snapshot().await;
        let saved = snapshot.alarms.iter().find(|a| a.id == alarm.id).expect("alarm");
        assert_eq!(saved.customer_id, Some(customer));
        let untouched = snapshot.alarms.iter().find(|a| a.id == poisoned.id).expect("alarm");
        assert_eq!(untouched.customer_id, None);

        let saved = snapshot
            .device_profiles
            .iter()
            .find(|p| p.id == profile.id)
            .expect("profile");
        assert_eq!(
            saved.profile_data["alarms"][0]["createRules"]["CRITICAL"]["condition"]["spec"]["predicate"],
            json!({"staticValue": 30, "dynamicValueKey": null, "resolveAsDynamic": false})
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_rerunning_a_version_is_idempotent() -> Result<()> {
        let (store, _tenant) = seeded().await;
        store.add_tenant(Tenant::new("Globex")).await;

        service(&store).update_data("3.2.2").await?;
        let after_first = serde_json::to_value(store.snapshot().await)?;
        let writes = store.write_count();

        service(&store).update_data("3.2.2").await?;

        assert_eq!(store.write_count(), writes);
        assert_eq!(serde_json::to_value(store.snapshot().await)?, after_first);
        Ok(())
    }
}
