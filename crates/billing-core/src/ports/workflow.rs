//! Workflow engine port (spec §6). Callers never block on workflow completion — both
//! `create_schedule` and `execute_ad_hoc` return once the operation is enqueued.

use async_trait::async_trait;
use billing_common::BillingResult;
use chrono::{DateTime, Utc};

pub struct ScheduleHandle {
    pub schedule_id: String,
}

#[async_trait]
pub trait WorkflowPort: Send + Sync {
    async fn create_schedule(&self, id: &str, cron: &str, paused: bool) -> BillingResult<ScheduleHandle>;
    async fn pause(&self, schedule_id: &str) -> BillingResult<()>;
    async fn unpause(&self, schedule_id: &str) -> BillingResult<()>;
    async fn delete_schedule(&self, schedule_id: &str) -> BillingResult<()>;

    /// Starts an ad-hoc workflow run with a fresh workflow id, bypassing any schedule.
    async fn execute_ad_hoc(
        &self,
        workflow_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> BillingResult<()>;
}
