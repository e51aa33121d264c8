//! Service facades: explicit-dependency orchestration wiring the pure components (C3,
//! C4, C5, C6) to the repository, wallet, and publisher ports.
//!
//! Per spec §9's REDESIGN FLAGS, each service takes its dependencies as constructor
//! arguments rather than a shared `ServiceParams` bag, and services never call each
//! other directly — shared logic (invoice recalculation, wallet top-ups) lives in
//! [`crate::invoice`] and [`crate::wallet`], which both services depend on independently.

use crate::coupon::{self, Coupon, CouponApplication, CouponValidationContext, CouponValidationError};
use crate::credit_note::{self, CreditNote, CreditNoteLineItem, CreditNoteStatus, CreditNoteType};
use crate::idempotency::idempotency_key;
use crate::invoice::{self, Invoice, Mutation};
use crate::money::Money;
use crate::ports::repository::{CouponApplicationCounter, Repository, TransactionPort, UnitOfWork};
use crate::ports::webhook::{WebhookEvent, WebhookEventName, WebhookPublisherPort};
use crate::wallet::WalletManager;
use crate::{CouponId, CreditNoteId, InvoiceId, InvoiceLineItemId, SubscriptionId};
use billing_common::{BillingError, BillingResult, RequestContext};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// Coupon engine (C4) wired to its repository-backed cadence counter. Validation and
/// discount math stay in [`crate::coupon`]; this service is purely the I/O shell around
/// it — counting prior applications, running the pipeline, and recording the result.
pub struct CouponService {
    applications: Arc<dyn CouponApplicationCounter>,
}

impl CouponService {
    pub fn new(applications: Arc<dyn CouponApplicationCounter>) -> Self {
        Self { applications }
    }

    /// Validates `coupon` against `invoice`'s subscription and, if valid, applies its
    /// discount: decrements `invoice.amount_due`, records one [`CouponApplication`] row
    /// (the canonical cadence counter — spec §6), and returns it.
    #[instrument(skip(self, coupon, invoice), fields(coupon_id = %coupon.id))]
    pub async fn apply_to_invoice(
        &self,
        coupon: &Coupon,
        invoice: &mut Invoice,
        subscription_id: Option<SubscriptionId>,
    ) -> Result<CouponApplication, CouponValidationError> {
        coupon.validate_shape()?;

        let prior_count = match subscription_id {
            Some(sub_id) => match self
                .applications
                .count_by_subscription_and_coupon(sub_id, coupon.id)
                .await
            {
                Ok(n) => Ok(n),
                Err(_) => Err(()),
            },
            None => Ok(0),
        };

        let ctx = CouponValidationContext {
            now: Utc::now(),
            subscription_currency: invoice.currency,
            prior_application_count: prior_count,
        };
        coupon::validate_coupon(coupon, &ctx)?;

        let discount = coupon.discount_amount(invoice.total).rounded();
        invoice.amount_due = invoice.amount_due.sub(&discount).max_zero();
        invoice.amount_remaining = invoice.amount_due.sub(&invoice.amount_paid).max_zero();

        let application = CouponApplication {
            id: crate::CouponApplicationId::new(),
            coupon_id: coupon.id,
            subscription_id,
            invoice_id: invoice.id,
            applied_amount: discount,
            applied_at: Utc::now(),
        };

        self.applications
            .create_application(&application)
            .await
            .map_err(|e| coupon::CouponValidationError {
                code: crate::coupon::CouponValidationErrorCode::DatabaseError,
                message: e.to_string(),
                details: serde_json::Value::Null,
            })?;

        Ok(application)
    }
}

/// Credit-note engine (C5) wired to repositories, the wallet, the transactional
/// boundary, and webhook publishing.
pub struct CreditNoteService {
    credit_notes: Arc<dyn Repository<CreditNote, CreditNoteId>>,
    invoices: Arc<dyn Repository<Invoice, InvoiceId>>,
    wallets: Arc<WalletManager>,
    tx: Arc<dyn TransactionPort>,
    publisher: Arc<dyn WebhookPublisherPort>,
}

impl CreditNoteService {
    pub fn new(
        credit_notes: Arc<dyn Repository<CreditNote, CreditNoteId>>,
        invoices: Arc<dyn Repository<Invoice, InvoiceId>>,
        wallets: Arc<WalletManager>,
        tx: Arc<dyn TransactionPort>,
        publisher: Arc<dyn WebhookPublisherPort>,
    ) -> Self {
        Self {
            credit_notes,
            invoices,
            wallets,
            tx,
            publisher,
        }
    }

    /// Creates a credit note. Idempotent on `idempotency_key` (supplied or derived from
    /// `(invoice_id, credit_note_number, reason, credit_note_type)` — spec §4.5, §4.9):
    /// `find_existing` is the caller-supplied lookup for "does a note with this key
    /// already exist", kept as a callback so this service does not need its own
    /// specialized repository query method.
    #[instrument(skip(self, invoice, requested, find_existing))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        invoice: &Invoice,
        requested: &[(InvoiceLineItemId, Money)],
        credit_note_number: String,
        reason: String,
        idempotency_override: Option<String>,
        find_existing: impl Fn(&str) -> BillingResult<Option<CreditNote>>,
    ) -> BillingResult<CreditNote> {
        if ctx.is_cancelled() {
            return Err(BillingError::internal("request cancelled"));
        }

        let credit_note_type = credit_note::derive_credit_note_type(invoice.payment_status)?;
        let total = credit_note::validate_line_items(invoice, requested, credit_note_type)?;

        let key = idempotency_override.unwrap_or_else(|| {
            idempotency_key(
                "credit_note",
                &credit_note::creation_idempotency_attributes(
                    invoice.id,
                    &credit_note_number,
                    &reason,
                    credit_note_type,
                ),
            )
        });

        if let Some(existing) = find_existing(&key)? {
            return Ok(existing);
        }

        let note = CreditNote {
            id: crate::CreditNoteId::new(),
            invoice_id: invoice.id,
            subscription_id: invoice.subscription_id,
            customer_id: invoice.customer_id,
            credit_note_number,
            credit_note_type,
            credit_note_status: CreditNoteStatus::Draft,
            total_amount: total,
            line_items: requested
                .iter()
                .map(|(id, amount)| CreditNoteLineItem {
                    invoice_line_item_id: *id,
                    amount: *amount,
                })
                .collect(),
            reason,
            idempotency_key: key,
        };

        self.credit_notes.create(&note).await?;
        Ok(note)
    }

    /// Transitions `draft -> finalized`: runs the invoice recalculation and (for
    /// refunds) the wallet top-up inside the same transaction, then publishes
    /// `credit_note.finalized` after commit (spec §4.5, §7).
    #[instrument(skip(self, note, invoice), fields(credit_note_id = %note.id))]
    pub async fn finalize(
        &self,
        ctx: &RequestContext,
        note: &mut CreditNote,
        invoice: &mut Invoice,
    ) -> BillingResult<()> {
        if ctx.is_cancelled() {
            return Err(BillingError::internal("request cancelled"));
        }

        let effect = credit_note::finalize(note)?;
        invoice::recalculate(invoice, &effect.invoice_mutation);

        let customer_id = invoice.customer_id;
        let currency = invoice.currency;
        let wallet_top_up = effect.wallet_top_up;
        let idempotency = note.id.to_string();

        let note_snapshot = note.clone();
        let invoice_snapshot = invoice.clone();
        let credit_notes = Arc::clone(&self.credit_notes);
        let invoices = Arc::clone(&self.invoices);
        let wallets = Arc::clone(&self.wallets);

        let unit: UnitOfWork<'_> = Box::new(move || {
            Box::pin(async move {
                if let Some(amount) = wallet_top_up {
                    wallets.top_up(customer_id, currency, amount, &idempotency)?;
                }
                credit_notes.update(&note_snapshot).await?;
                invoices.update(&invoice_snapshot).await?;
                Ok(())
            })
        });

        // Invoice recalculation failures after a finalized credit note stay logged, not
        // fatal: the credit note remains finalized because the wallet top-up (when one
        // applies) already happened inside this same transaction (spec §7 Recovery rules).
        if let Err(err) = self.tx.with_tx(unit).await {
            tracing::error!(error = %err, credit_note_id = %note.id, "credit note finalize transaction failed");
            return Err(err);
        }

        let event = WebhookEvent {
            id: uuid::Uuid::new_v4(),
            event_name: WebhookEventName::CreditNoteFinalized,
            tenant_id: ctx.tenant_id,
            environment_id: ctx.environment_id,
            user_id: ctx.user_id,
            timestamp: Utc::now(),
            payload: serde_json::json!({ "credit_note_id": note.id.to_string() }),
        };
        if let Err(err) = self.publisher.publish(event).await {
            // At-least-once delivery is the publisher's contract; a publish failure
            // after a successful commit is logged, never rolled back (spec §7).
            tracing::warn!(error = %err, credit_note_id = %note.id, "webhook publish failed after commit");
        }

        Ok(())
    }

    /// Voids a credit note: draft notes and finalized adjustments may be voided;
    /// finalized refunds cannot be (spec §4.5).
    #[instrument(skip(self, note, invoice), fields(credit_note_id = %note.id))]
    pub async fn void(
        &self,
        ctx: &RequestContext,
        note: &mut CreditNote,
        invoice: &mut Invoice,
    ) -> BillingResult<()> {
        if ctx.is_cancelled() {
            return Err(BillingError::internal("request cancelled"));
        }

        let reversal = credit_note::void(note)?;
        if let Some(mutation) = &reversal {
            invoice::recalculate(invoice, mutation);
        }

        self.credit_notes.update(note).await?;
        if reversal.is_some() {
            self.invoices.update(invoice).await?;
        }

        let event = WebhookEvent {
            id: uuid::Uuid::new_v4(),
            event_name: WebhookEventName::CreditNoteVoided,
            tenant_id: ctx.tenant_id,
            environment_id: ctx.environment_id,
            user_id: ctx.user_id,
            timestamp: Utc::now(),
            payload: serde_json::json!({ "credit_note_id": note.id.to_string() }),
        };
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(error = %err, credit_note_id = %note.id, "webhook publish failed after commit");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::{CouponCadence, CouponDiscount, CouponStatus};
    use crate::invoice::{InvoiceStatus, InvoiceType, PaymentStatus};
    use crate::money::Currency;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct FakeCounter {
        count: u32,
        applications: Mutex<Vec<CouponApplication>>,
    }

    #[async_trait]
    impl CouponApplicationCounter for FakeCounter {
        async fn count_by_subscription_and_coupon(
            &self,
            _subscription_id: SubscriptionId,
            _coupon_id: CouponId,
        ) -> BillingResult<u32> {
            Ok(self.count)
        }

        async fn create_application(&self, application: &CouponApplication) -> BillingResult<()> {
            self.applications.lock().unwrap().push(application.clone());
            Ok(())
        }
    }

    fn draft_invoice(total: rust_decimal::Decimal) -> Invoice {
        let mut invoice = Invoice::new_draft(
            crate::CustomerId::new(),
            Some(SubscriptionId::new()),
            Currency::USD,
            InvoiceType::Subscription,
            "INV-0001".to_string(),
            1,
        );
        invoice.total = Money::new(total, Currency::USD);
        invoice.amount_due = invoice.total;
        invoice.invoice_status = InvoiceStatus::Draft;
        invoice.payment_status = PaymentStatus::Pending;
        invoice
    }

    #[tokio::test]
    async fn test_apply_percent_coupon_reduces_amount_due() {
        let counter = Arc::new(FakeCounter {
            count: 0,
            applications: Mutex::new(Vec::new()),
        });
        let service = CouponService::new(counter.clone());
        let mut invoice = draft_invoice(dec!(100.00));
        let coupon = Coupon {
            id: CouponId::new(),
            status: CouponStatus::Published,
            currency: Some(Currency::USD),
            redeem_after: None,
            redeem_before: None,
            max_redemptions: None,
            total_redemptions: 0,
            cadence: CouponCadence::Once,
            duration_in_periods: None,
            discount: CouponDiscount::Percent { rate: dec!(10) },
        };

        let application = service
            .apply_to_invoice(&coupon, &mut invoice, invoice.subscription_id)
            .await
            .unwrap();

        assert_eq!(application.applied_amount.amount, dec!(10.00));
        assert_eq!(invoice.amount_due.amount, dec!(90.00));
        assert_eq!(counter.applications.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_once_cadence_rejects_second_application() {
        let counter = Arc::new(FakeCounter {
            count: 2,
            applications: Mutex::new(Vec::new()),
        });
        let service = CouponService::new(counter);
        let mut invoice = draft_invoice(dec!(100.00));
        let coupon = Coupon {
            id: CouponId::new(),
            status: CouponStatus::Published,
            currency: Some(Currency::USD),
            redeem_after: None,
            redeem_before: None,
            max_redemptions: None,
            total_redemptions: 0,
            cadence: CouponCadence::Once,
            duration_in_periods: None,
            discount: CouponDiscount::Percent { rate: dec!(10) },
        };

        let result = service
            .apply_to_invoice(&coupon, &mut invoice, invoice.subscription_id)
            .await;
        assert!(result.is_err());
    }
}
