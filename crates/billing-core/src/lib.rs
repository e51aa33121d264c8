//! # billing-core
//!
//! The billing core of a usage-metered subscription platform: the subsystem that turns
//! plan/price definitions, subscription line items, recorded usage, and customer wallets
//! into finalized invoices with correct money movement.
//!
//! ## Components
//!
//! - [`money`] — exact decimal arithmetic and currency-aware rounding (C1).
//! - [`calendar`] — billing-cycle boundary math, calendar vs anniversary, DST-safe (C2).
//! - [`proration`] — credit/charge line-set for a mid-period subscription change (C3).
//! - [`coupon`] — coupon validation, cadence accounting, and application (C4).
//! - [`credit_note`] / [`wallet`] — refund and adjustment lifecycle, wallet top-ups (C5).
//! - [`subscription`] — line-item add/update/terminate, commitment validation (C6).
//! - [`invoice`] — the single writer of invoice money fields (C7).
//! - [`scheduled_export`] — interval→cron mapping, aligned backfill windows (C8).
//! - [`idempotency`] — deterministic hashing for at-most-once effects (C9).
//! - [`ports`] — the external interfaces this crate consumes: persistence, workflow
//!   scheduling, payment provider, webhook delivery, export object storage.
//! - [`service`] — explicit-dependency service facades composing the above per request.
//!
//! ## Architecture
//!
//! ```text
//! external caller -> service (C4/C5/C6/C8) -> repository reads
//!                  -> C1/C2/C3 pure computation
//!                  -> WithTx { repository writes, C7 recalculation }
//!                  -> post-commit webhook publish
//! ```
//!
//! Components never call each other directly; they are composed by the service layer,
//! which holds its dependencies as explicit constructor arguments rather than a shared
//! service-params bag (see `DESIGN.md`, REDESIGN FLAGS).

pub mod calendar;
pub mod coupon;
pub mod credit_note;
pub mod idempotency;
pub mod invoice;
pub mod money;
pub mod ports;
pub mod price;
pub mod proration;
pub mod repository;
pub mod scheduled_export;
pub mod service;
pub mod subscription;
pub mod wallet;

pub use billing_common::{
    CouponApplicationId, CouponId, CreditNoteId, CustomerId, EnvironmentId, InvoiceId,
    InvoiceLineItemId, MeterId, PriceId, ScheduledTaskId, SubscriptionId,
    SubscriptionLineItemId, TenantId, UserId, WalletId,
};
