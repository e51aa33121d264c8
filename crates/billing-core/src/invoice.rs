//! Invoice data model and the recalculator that is its only money-field writer (C7).

use crate::money::{Currency, Money};
use crate::{CustomerId, InvoiceId, InvoiceLineItemId, MeterId, PriceId, SubscriptionId, SubscriptionLineItemId};
use billing_common::CollectionMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Subscription,
    OneOff,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Finalized,
    Voided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    PartiallyRefunded,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: InvoiceLineItemId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub quantity: rust_decimal::Decimal,
    pub price_id: Option<PriceId>,
    pub subscription_line_item_id: Option<SubscriptionLineItemId>,
    pub display_name: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub meter_id: Option<MeterId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub subscription_id: Option<SubscriptionId>,
    pub customer_id: CustomerId,
    pub currency: Currency,
    pub invoice_type: InvoiceType,
    pub invoice_status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub collection_method: CollectionMethod,
    pub total: Money,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub amount_remaining: Money,
    pub adjustment_amount: Money,
    pub refunded_amount: Money,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub line_items: Vec<InvoiceLineItem>,
    pub metadata: HashMap<String, String>,
    pub billing_sequence: u64,
    pub invoice_number: String,
}

impl Invoice {
    pub fn new_draft(
        customer_id: CustomerId,
        subscription_id: Option<SubscriptionId>,
        currency: Currency,
        invoice_type: InvoiceType,
        invoice_number: String,
        billing_sequence: u64,
    ) -> Self {
        Self {
            id: InvoiceId::new(),
            subscription_id,
            customer_id,
            currency,
            invoice_type,
            invoice_status: InvoiceStatus::Draft,
            payment_status: PaymentStatus::Pending,
            collection_method: CollectionMethod::ChargeAutomatically,
            total: Money::zero(currency),
            amount_due: Money::zero(currency),
            amount_paid: Money::zero(currency),
            amount_remaining: Money::zero(currency),
            adjustment_amount: Money::zero(currency),
            refunded_amount: Money::zero(currency),
            period_start: None,
            period_end: None,
            due_date: None,
            line_items: Vec::new(),
            metadata: HashMap::new(),
            billing_sequence,
            invoice_number,
        }
    }

    pub fn add_line_item(&mut self, item: InvoiceLineItem) {
        self.total = self.total.add(&item.amount);
        self.line_items.push(item);
    }

    pub fn finalize(&mut self, due_date: Option<DateTime<Utc>>) {
        self.invoice_status = InvoiceStatus::Finalized;
        self.due_date = due_date;
        recalculate(self, &Mutation::LineItemsChanged);
    }
}

/// The mutation descriptor C7 is told about; it decides how to re-derive the invariants
/// rather than accepting pre-computed deltas from the caller.
pub enum Mutation {
    CreditNoteFinalized { kind: CreditMutationKind, amount: Money },
    CreditNoteVoided { kind: CreditMutationKind, amount: Money },
    PaymentPosted { amount: Money },
    LineItemsChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditMutationKind {
    Refund,
    Adjustment,
}

/// Re-derives every dependent invoice field from the invariants in spec §3. A no-op if
/// the invoice is not finalized (spec §4.7).
pub fn recalculate(invoice: &mut Invoice, mutation: &Mutation) {
    if invoice.invoice_status != InvoiceStatus::Finalized {
        return;
    }

    match mutation {
        Mutation::CreditNoteFinalized { kind, amount } => match kind {
            CreditMutationKind::Refund => {
                invoice.refunded_amount = invoice.refunded_amount.add(amount);
            }
            CreditMutationKind::Adjustment => {
                invoice.adjustment_amount = invoice.adjustment_amount.add(amount);
            }
        },
        Mutation::CreditNoteVoided { kind, amount } => match kind {
            CreditMutationKind::Refund => {
                invoice.refunded_amount = invoice.refunded_amount.sub(amount);
            }
            CreditMutationKind::Adjustment => {
                invoice.adjustment_amount = invoice.adjustment_amount.sub(amount);
            }
        },
        Mutation::PaymentPosted { amount } => {
            invoice.amount_paid = invoice.amount_paid.add(amount);
        }
        Mutation::LineItemsChanged => {}
    }

    invoice.amount_due = invoice.total.sub(&invoice.adjustment_amount);
    invoice.amount_remaining = invoice.amount_due.sub(&invoice.amount_paid).max_zero();

    invoice.payment_status = derive_payment_status(invoice);
}

fn derive_payment_status(invoice: &Invoice) -> PaymentStatus {
    if invoice.refunded_amount.amount == invoice.amount_paid.amount && invoice.amount_paid.amount > rust_decimal::Decimal::ZERO
    {
        return PaymentStatus::Refunded;
    }
    if invoice.refunded_amount.amount > rust_decimal::Decimal::ZERO
        && invoice.refunded_amount.amount < invoice.amount_paid.amount
    {
        return PaymentStatus::PartiallyRefunded;
    }
    if invoice.amount_remaining.is_zero() && invoice.amount_paid.amount > rust_decimal::Decimal::ZERO {
        return PaymentStatus::Succeeded;
    }
    // Adjustment reducing amount_due down to amount_paid also forces succeeded, even
    // when amount_paid is zero (e.g. a fully-adjusted unpaid invoice).
    if invoice.amount_remaining.is_zero() {
        return PaymentStatus::Succeeded;
    }
    invoice.payment_status
}
