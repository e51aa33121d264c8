//! # billing-common
//!
//! Shared types and utilities for the billing core: error taxonomy, tenant/entity
//! identity newtypes, the request-scoped context, health check, and layered config.

pub mod error;
pub mod health;
pub mod identity;
pub mod types;

#[cfg(feature = "config")]
pub mod config;

pub use error::{BillingError, BillingResult};
pub use health::{health_check, HealthResponse};
pub use identity::{
    CouponApplicationId, CouponId, CreditNoteId, CustomerId, EnvironmentId, InvoiceId,
    InvoiceLineItemId, MeterId, PriceId, RequestContext, ScheduledTaskId, SubscriptionId,
    SubscriptionLineItemId, TenantId, UserId, WalletId,
};
pub use types::CollectionMethod;

#[cfg(feature = "config")]
pub use config::{load_app_config, load_config, AppConfig, BillingCoreConfig, DatabaseConfig, ObservabilityConfig};
