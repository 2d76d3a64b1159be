//! Alarm customer propagation.
//!
//! Alarms raised before customers were tracked on the alarm itself inherit
//! the customer of their originator. One progress counter spans all tenants.

use crate::db::{AlarmStore, CustomerLookup, PagedSource};
use crate::models::{Alarm, Tenant, UpdateScope};
use crate::services::bulk_updater::{BulkUpdater, EntityUpdater, ProgressCounter};
use crate::services::MigrationError;
use async_trait::async_trait;
use std::sync::Arc;

const NAME: &str = "Tenants alarms customer updater";

pub struct AlarmCustomerUpdater {
    alarms: Arc<dyn PagedSource<Alarm>>,
    fixer: AlarmCustomerFixer,
    page_size: usize,
    progress: ProgressCounter,
}

impl AlarmCustomerUpdater {
    pub fn new(
        alarms: Arc<dyn PagedSource<Alarm>>,
        alarm_store: Arc<dyn AlarmStore>,
        customers: Arc<dyn CustomerLookup>,
        page_size: usize,
        report_every: u64,
    ) -> Self {
        Self {
            alarms,
            fixer: AlarmCustomerFixer {
                alarm_store,
                customers,
            },
            page_size,
            progress: ProgressCounter::new(NAME, report_every),
        }
    }

    /// Alarms visited so far across every tenant
    pub fn processed(&self) -> u64 {
        self.progress.processed()
    }
}

#[async_trait]
impl EntityUpdater<Tenant> for AlarmCustomerUpdater {
    fn name(&self) -> &str {
        NAME
    }

    fn force_report_total(&self) -> bool {
        true
    }

    async fn update_entity(&self, tenant: Tenant) -> Result<(), MigrationError> {
        BulkUpdater::new(NAME, self.page_size)
            .with_progress(self.progress.clone())
            .run(self.alarms.as_ref(), &UpdateScope::Tenant(tenant.id), &self.fixer)
            .await?;
        Ok(())
    }
}

struct AlarmCustomerFixer {
    alarm_store: Arc<dyn AlarmStore>,
    customers: Arc<dyn CustomerLookup>,
}

#[async_trait]
impl EntityUpdater<Alarm> for AlarmCustomerFixer {
    fn name(&self) -> &str {
        NAME
    }

    async fn update_entity(&self, mut alarm: Alarm) -> Result<(), MigrationError> {
        if alarm.customer_id.is_some() {
            return Ok(());
        }
        let Some(originator) = alarm.originator else {
            return Ok(());
        };
        let Some(customer_id) = self
            .customers
            .fetch_entity_customer_id(&alarm.tenant_id, &originator)
            .await?
        else {
            return Ok(());
        };

        alarm.customer_id = Some(customer_id);
        let tenant_id = alarm.tenant_id;
        self.alarm_store.save_alarm(&tenant_id, alarm).await?;
        Ok(())
    }
}
