//! Export file object-store port (spec §6): the data-plane upload the scheduled-export
//! orchestrator hands finished CSV/JSON exports to. Streaming/encoding itself is out of
//! scope for the billing core.

use async_trait::async_trait;
use billing_common::BillingResult;

#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    async fn upload_csv(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> BillingResult<String>;
}
