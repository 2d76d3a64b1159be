use crate::db::DeviceProfileStore;
use crate::models::DeviceProfile;
use crate::services::bulk_updater::EntityUpdater;
use crate::services::condition_spec::patch_profile_data;
use crate::services::MigrationError;
use async_trait::async_trait;
use std::sync::Arc;

/// Rewrites scalar alarm thresholds of a device profile; saves only on change
pub struct DeviceProfileConditionsUpdater {
    profiles: Arc<dyn DeviceProfileStore>,
}

impl DeviceProfileConditionsUpdater {
    pub fn new(profiles: Arc<dyn DeviceProfileStore>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl EntityUpdater<DeviceProfile> for DeviceProfileConditionsUpdater {
    fn name(&self) -> &str {
        "Device profile alarm conditions updater"
    }

    async fn update_entity(&self, mut profile: DeviceProfile) -> Result<(), MigrationError> {
        if patch_profile_data(&mut profile.profile_data) {
            tracing::debug!("[{}] Patched alarm conditions of '{}'", profile.id, profile.name);
            self.profiles.save_device_profile(profile).await?;
        }
        Ok(())
    }
}
