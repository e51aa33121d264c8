//! Webhook publisher port (spec §6). The publish call returns after enqueue; delivery
//! (and its retries) is the publisher's own concern, not the billing core's.

use crate::{EnvironmentId, TenantId, UserId};
use async_trait::async_trait;
use billing_common::BillingResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of event names the billing core emits (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventName {
    CustomerCreated,
    CustomerUpdated,
    CustomerDeleted,
    SubscriptionPhaseCreated,
    SubscriptionPhaseUpdated,
    SubscriptionPhaseDeleted,
    CreditNoteCreated,
    CreditNoteFinalized,
    CreditNoteVoided,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: uuid::Uuid,
    pub event_name: WebhookEventName,
    pub tenant_id: TenantId,
    pub environment_id: EnvironmentId,
    pub user_id: Option<UserId>,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait WebhookPublisherPort: Send + Sync {
    async fn publish(&self, event: WebhookEvent) -> BillingResult<()>;
}
