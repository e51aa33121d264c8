//! Shared test infrastructure: request-context fixtures and in-memory fakes for the
//! repository, transaction, webhook, and workflow ports.

use async_trait::async_trait;
use billing_common::{BillingError, BillingResult, CustomerId, EnvironmentId, TenantId, UserId};
use billing_core::ports::repository::{CouponApplicationCounter, ListFilter, Repository, TransactionPort, UnitOfWork};
use billing_core::ports::webhook::{WebhookEvent, WebhookPublisherPort};
use billing_core::ports::workflow::{ScheduleHandle, WorkflowPort};
use billing_core::coupon::CouponApplication;
use billing_core::{CouponId, SubscriptionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// Test database connection string. Uses `TEST_DATABASE_URL` or falls back to a local
/// billing-specific database so `database`-feature tests do not collide with other
/// integration suites on the same machine.
pub fn test_database_url() -> String {
    std::env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/billing_core_test".to_string())
}

/// Tenant/environment/user/customer scaffolding shared by a test run.
pub struct TestFixture {
    pub tenant_id: TenantId,
    pub environment_id: EnvironmentId,
    pub user_id: UserId,
    pub customer_id: CustomerId,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            tenant_id: TenantId::new(),
            environment_id: EnvironmentId::new(),
            user_id: UserId::new(),
            customer_id: CustomerId::new(),
        }
    }

    pub fn request_context(&self) -> billing_common::RequestContext {
        billing_common::RequestContext::new(self.tenant_id, self.environment_id).with_user(self.user_id)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Database test context that handles setup and cleanup.
#[cfg(feature = "database")]
pub struct TestDatabase {
    pub pool: sqlx::PgPool,
    pub fixture: TestFixture,
}

#[cfg(feature = "database")]
impl TestDatabase {
    pub async fn new() -> Result<Self, sqlx::Error> {
        let pool = sqlx::PgPool::connect(&test_database_url()).await?;
        Ok(Self {
            pool,
            fixture: TestFixture::new(),
        })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Truncate the billing-core tables in dependency order.
    pub async fn cleanup(&self) -> Result<(), sqlx::Error> {
        sqlx::query("TRUNCATE TABLE credit_note_line_items CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE credit_notes CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE coupon_applications CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE coupons CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE invoice_line_items CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE invoices CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE subscription_line_items CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE subscriptions CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE scheduled_tasks CASCADE").execute(&self.pool).await?;
        sqlx::query("TRUNCATE TABLE wallets CASCADE").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory stand-in for a `Repository<E, Id>` backed by a real database in production.
/// Keyed by whatever `id_of` extracts from the entity, mirroring how `PgInvoiceRepository`
/// keys rows by their primary id.
pub struct FakeRepository<E, Id> {
    rows: Mutex<HashMap<Id, E>>,
    id_of: fn(&E) -> Id,
}

impl<E, Id> FakeRepository<E, Id>
where
    Id: Eq + Hash,
{
    pub fn new(id_of: fn(&E) -> Id) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            id_of,
        }
    }
}

#[async_trait]
impl<E, Id> Repository<E, Id> for FakeRepository<E, Id>
where
    E: Clone + Send + Sync,
    Id: Eq + Hash + Copy + Send + Sync,
{
    async fn get(&self, id: Id) -> BillingResult<E> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| BillingError::not_found("not_found", "no row with this id"))
    }

    async fn create(&self, entity: &E) -> BillingResult<()> {
        let id = (self.id_of)(entity);
        self.rows.lock().unwrap().insert(id, entity.clone());
        Ok(())
    }

    async fn update(&self, entity: &E) -> BillingResult<()> {
        let id = (self.id_of)(entity);
        self.rows.lock().unwrap().insert(id, entity.clone());
        Ok(())
    }

    async fn delete(&self, id: Id) -> BillingResult<()> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list(&self, _filter: &ListFilter) -> BillingResult<Vec<E>> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn count(&self, _filter: &ListFilter) -> BillingResult<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

/// In-memory `TransactionPort`: runs the unit of work inline, with no rollback semantics.
/// Good enough for exercising the commit path; failure-path rollback is covered by the
/// pure-function tests in `credit_note.rs` and `invoice.rs` directly.
pub struct FakeTransactionPort;

#[async_trait]
impl TransactionPort for FakeTransactionPort {
    async fn with_tx<'a>(&'a self, f: UnitOfWork<'a>) -> BillingResult<()> {
        f().await
    }
}

/// Records every event handed to it instead of delivering it anywhere.
#[derive(Default)]
pub struct FakeWebhookPublisher {
    pub events: Mutex<Vec<WebhookEvent>>,
}

#[async_trait]
impl WebhookPublisherPort for FakeWebhookPublisher {
    async fn publish(&self, event: WebhookEvent) -> BillingResult<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// In-memory `CouponApplicationCounter`: a fixed prior-application count plus a log of
/// every application it is asked to record.
pub struct FakeCouponCounter {
    pub prior_count: u32,
    pub applications: Mutex<Vec<CouponApplication>>,
}

impl FakeCouponCounter {
    pub fn with_prior_count(prior_count: u32) -> Self {
        Self {
            prior_count,
            applications: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CouponApplicationCounter for FakeCouponCounter {
    async fn count_by_subscription_and_coupon(
        &self,
        _subscription_id: SubscriptionId,
        _coupon_id: CouponId,
    ) -> BillingResult<u32> {
        Ok(self.prior_count)
    }

    async fn create_application(&self, application: &CouponApplication) -> BillingResult<()> {
        self.applications.lock().unwrap().push(application.clone());
        Ok(())
    }
}

/// In-memory `WorkflowPort`: schedule ids are just the task id with a suffix, and every
/// lifecycle call is a no-op that always succeeds.
#[derive(Default)]
pub struct FakeWorkflowPort {
    pub created: Mutex<Vec<(String, String)>>,
    pub paused: Mutex<Vec<String>>,
    pub unpaused: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub ad_hoc_runs: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
}

#[async_trait]
impl WorkflowPort for FakeWorkflowPort {
    async fn create_schedule(&self, id: &str, cron: &str, _paused: bool) -> BillingResult<ScheduleHandle> {
        self.created.lock().unwrap().push((id.to_string(), cron.to_string()));
        Ok(ScheduleHandle {
            schedule_id: format!("{id}-schedule"),
        })
    }

    async fn pause(&self, schedule_id: &str) -> BillingResult<()> {
        self.paused.lock().unwrap().push(schedule_id.to_string());
        Ok(())
    }

    async fn unpause(&self, schedule_id: &str) -> BillingResult<()> {
        self.unpaused.lock().unwrap().push(schedule_id.to_string());
        Ok(())
    }

    async fn delete_schedule(&self, schedule_id: &str) -> BillingResult<()> {
        self.deleted.lock().unwrap().push(schedule_id.to_string());
        Ok(())
    }

    async fn execute_ad_hoc(
        &self,
        workflow_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> BillingResult<()> {
        self.ad_hoc_runs
            .lock()
            .unwrap()
            .push((workflow_id.to_string(), window_start, window_end));
        Ok(())
    }
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}
