//! Repository port (spec §6): per-entity CRUD plus the transactional wrapper every
//! mutating workflow runs inside.
//!
//! Traits here are `dyn`-compatible (`async-trait`) because services hold repositories
//! behind `Arc<dyn ...>` so they can be swapped per-tenant or mocked in tests.

use crate::coupon::CouponApplication;
use crate::credit_note::CreditNote;
use crate::invoice::Invoice;
use crate::scheduled_export::ScheduledTask;
use crate::subscription::Subscription;
use crate::{CouponId, CreditNoteId, InvoiceId, ScheduledTaskId, SubscriptionId};
use async_trait::async_trait;
use billing_common::BillingResult;

/// Common list filter: soft-deleted rows are excluded unless a caller opts in (spec §9
/// "Soft-delete via status enum": list queries must filter unless asked not to).
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub include_deleted: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Per-entity repository port (spec §6). `E` is the entity type, `Id` its identifier.
#[async_trait]
pub trait Repository<E, Id>: Send + Sync {
    async fn get(&self, id: Id) -> BillingResult<E>;
    async fn create(&self, entity: &E) -> BillingResult<()>;
    async fn update(&self, entity: &E) -> BillingResult<()>;
    /// Soft-delete: sets `status = deleted` rather than removing the row.
    async fn delete(&self, id: Id) -> BillingResult<()>;
    async fn list(&self, filter: &ListFilter) -> BillingResult<Vec<E>>;
    async fn count(&self, filter: &ListFilter) -> BillingResult<i64>;
}

pub type InvoiceRepositoryPort = dyn Repository<Invoice, InvoiceId>;
pub type SubscriptionRepositoryPort = dyn Repository<Subscription, SubscriptionId>;
pub type CreditNoteRepositoryPort = dyn Repository<CreditNote, CreditNoteId>;

#[async_trait]
pub trait InvoiceNumbering: Send + Sync {
    async fn get_next_invoice_number(&self, config: &str) -> BillingResult<String>;
    async fn get_next_billing_sequence(&self, subscription_id: SubscriptionId) -> BillingResult<u64>;
}

#[async_trait]
pub trait CouponApplicationCounter: Send + Sync {
    async fn count_by_subscription_and_coupon(
        &self,
        subscription_id: SubscriptionId,
        coupon_id: CouponId,
    ) -> BillingResult<u32>;

    async fn create_application(&self, application: &CouponApplication) -> BillingResult<()>;
}

#[async_trait]
pub trait ScheduledTaskRepository: Repository<ScheduledTask, ScheduledTaskId> {
    async fn find_by_entity_type(&self, entity_type: &str) -> BillingResult<Vec<ScheduledTask>>;
}

/// A unit of work run inside [`TransactionPort::with_tx`]. Mirrors the source's
/// `WithTx(ctx, fn(ctx) → err) → err` shape: the closure reports only success/failure,
/// any values it produces are written through the repositories it closes over.
pub type UnitOfWork<'a> =
    Box<dyn FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = BillingResult<()>> + Send + 'a>> + Send + 'a>;

/// Transactional wrapper. Acquires a transaction, runs `f`, commits iff `f` succeeds,
/// otherwise rolls back. Nested `with_tx` calls reuse the outer transaction (spec §5).
#[async_trait]
pub trait TransactionPort: Send + Sync {
    async fn with_tx<'a>(&'a self, f: UnitOfWork<'a>) -> BillingResult<()>;
}
