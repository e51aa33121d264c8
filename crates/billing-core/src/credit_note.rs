//! Credit-note lifecycle (C5): type derivation, max-creditable amount, finalize/void.

use crate::invoice::{CreditMutationKind, Invoice, InvoiceLineItem, Mutation, PaymentStatus};
use crate::money::{Currency, Money};
use crate::{CreditNoteId, CustomerId, InvoiceId, InvoiceLineItemId, SubscriptionId};
use billing_common::{BillingError, BillingResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteType {
    Refund,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    Draft,
    Finalized,
    Voided,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNoteLineItem {
    pub invoice_line_item_id: InvoiceLineItemId,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNote {
    pub id: CreditNoteId,
    pub invoice_id: InvoiceId,
    pub subscription_id: Option<SubscriptionId>,
    pub customer_id: CustomerId,
    pub credit_note_number: String,
    pub credit_note_type: CreditNoteType,
    pub credit_note_status: CreditNoteStatus,
    pub total_amount: Money,
    pub line_items: Vec<CreditNoteLineItem>,
    pub reason: String,
    pub idempotency_key: String,
}

/// Derives `credit_note_type` from the parent invoice's payment status (spec §4.5 table).
/// `refunded` invoices have nothing left to credit and are rejected outright.
pub fn derive_credit_note_type(payment_status: PaymentStatus) -> BillingResult<CreditNoteType> {
    match payment_status {
        PaymentStatus::Succeeded | PaymentStatus::PartiallyRefunded => Ok(CreditNoteType::Refund),
        PaymentStatus::Failed | PaymentStatus::Pending | PaymentStatus::Processing => {
            Ok(CreditNoteType::Adjustment)
        }
        PaymentStatus::Refunded => Err(BillingError::invalid_operation(
            "nothing_to_credit",
            "invoice is already fully refunded",
        )),
    }
}

/// Max-creditable amount for a given invoice and derived type, clamped at zero.
pub fn max_creditable_amount(invoice: &Invoice, credit_note_type: CreditNoteType) -> Money {
    let raw = match credit_note_type {
        CreditNoteType::Refund => invoice.amount_paid.sub(&invoice.refunded_amount),
        CreditNoteType::Adjustment => invoice
            .total
            .sub(&invoice.adjustment_amount)
            .sub(&invoice.amount_paid),
    };
    raw.max_zero()
}

/// Validates requested line amounts against the invoice's actual line items and the
/// max-creditable ceiling (spec §4.5 "Line-item validation").
pub fn validate_line_items(
    invoice: &Invoice,
    requested: &[(InvoiceLineItemId, Money)],
    credit_note_type: CreditNoteType,
) -> BillingResult<Money> {
    let mut total = Money::zero(invoice.currency);
    for (line_item_id, amount) in requested {
        let line_item: &InvoiceLineItem = invoice
            .line_items
            .iter()
            .find(|li| &li.id == line_item_id)
            .ok_or_else(|| {
                BillingError::validation("unknown_line_item", "credit note references a line item not on the invoice")
            })?;

        if amount.amount > line_item.amount.amount {
            return Err(BillingError::validation(
                "amount_exceeds_line_item",
                "credited amount exceeds the invoice line item's amount",
            ));
        }
        total = total.add(amount);
    }

    let max_creditable = max_creditable_amount(invoice, credit_note_type);
    if total.amount > max_creditable.amount {
        return Err(BillingError::validation(
            "amount_exceeds_max_creditable",
            "sum of requested credit amounts exceeds the invoice's max-creditable amount",
        ));
    }

    Ok(total)
}

/// Canonical attributes hashed for idempotent credit-note creation (spec §4.5, §4.9).
pub fn creation_idempotency_attributes(
    invoice_id: InvoiceId,
    credit_note_number: &str,
    reason: &str,
    credit_note_type: CreditNoteType,
) -> serde_json::Value {
    serde_json::json!({
        "scope": "credit_note",
        "invoice_id": invoice_id.to_string(),
        "credit_note_number": credit_note_number,
        "reason": reason,
        "credit_note_type": credit_note_type,
    })
}

/// Result of finalizing a credit note: the invoice mutation C7 must apply, plus (for
/// refunds) the wallet top-up the caller must perform in the same transaction.
pub struct FinalizeEffect {
    pub invoice_mutation: Mutation,
    pub wallet_top_up: Option<Money>,
}

/// Transition `draft -> finalized`. Returns the effect the caller applies atomically:
/// C7 invoice recalculation, and (for refunds) a wallet top-up (spec §4.5).
pub fn finalize(note: &mut CreditNote) -> BillingResult<FinalizeEffect> {
    if note.credit_note_status != CreditNoteStatus::Draft {
        return Err(BillingError::invalid_operation(
            "credit_note_already_processed",
            "credit note is not in draft status",
        ));
    }

    note.credit_note_status = CreditNoteStatus::Finalized;

    let kind = match note.credit_note_type {
        CreditNoteType::Refund => CreditMutationKind::Refund,
        CreditNoteType::Adjustment => CreditMutationKind::Adjustment,
    };

    let wallet_top_up = match note.credit_note_type {
        CreditNoteType::Refund => Some(note.total_amount),
        CreditNoteType::Adjustment => None,
    };

    Ok(FinalizeEffect {
        invoice_mutation: Mutation::CreditNoteFinalized {
            kind,
            amount: note.total_amount,
        },
        wallet_top_up,
    })
}

/// Void a credit note. Draft notes and finalized adjustments may be voided; finalized
/// refunds cannot be (the money has already left). Returns the reversing invoice
/// mutation when one is needed.
pub fn void(note: &mut CreditNote) -> BillingResult<Option<Mutation>> {
    match (note.credit_note_status, note.credit_note_type) {
        (CreditNoteStatus::Voided, _) => Ok(None), // idempotent: already voided
        (CreditNoteStatus::Finalized, CreditNoteType::Refund) => Err(BillingError::invalid_operation(
            "cannot_void_finalized_refund",
            "a finalized refund credit note cannot be voided",
        )),
        (CreditNoteStatus::Draft, _) => {
            note.credit_note_status = CreditNoteStatus::Voided;
            Ok(None)
        }
        (CreditNoteStatus::Finalized, CreditNoteType::Adjustment) => {
            note.credit_note_status = CreditNoteStatus::Voided;
            Ok(Some(Mutation::CreditNoteVoided {
                kind: CreditMutationKind::Adjustment,
                amount: note.total_amount,
            }))
        }
    }
}

pub fn line_item_total(line_items: &[CreditNoteLineItem], currency: Currency) -> Money {
    line_items
        .iter()
        .fold(Money::zero(currency), |acc, item| acc.add(&item.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceType;
    use billing_common::CollectionMethod;
    use rust_decimal_macros::dec;

    fn invoice_with(total: Decimal, amount_paid: Decimal, payment_status: PaymentStatus) -> Invoice {
        let mut invoice = Invoice::new_draft(
            CustomerId::new(),
            None,
            Currency::USD,
            InvoiceType::Subscription,
            "INV-0001".to_string(),
            1,
        );
        invoice.collection_method = CollectionMethod::ChargeAutomatically;
        invoice.total = Money::new(total, Currency::USD);
        invoice.amount_due = invoice.total;
        invoice.amount_paid = Money::new(amount_paid, Currency::USD);
        invoice.amount_remaining = invoice.amount_due.sub(&invoice.amount_paid).max_zero();
        invoice.payment_status = payment_status;
        invoice.invoice_status = crate::invoice::InvoiceStatus::Finalized;
        invoice
    }

    #[test]
    fn test_derive_type_refund_for_succeeded() {
        assert_eq!(
            derive_credit_note_type(PaymentStatus::Succeeded).unwrap(),
            CreditNoteType::Refund
        );
    }

    #[test]
    fn test_derive_type_adjustment_for_pending() {
        assert_eq!(
            derive_credit_note_type(PaymentStatus::Pending).unwrap(),
            CreditNoteType::Adjustment
        );
    }

    #[test]
    fn test_derive_type_rejects_fully_refunded() {
        assert!(derive_credit_note_type(PaymentStatus::Refunded).is_err());
    }

    #[test]
    fn test_max_creditable_refund() {
        let invoice = invoice_with(dec!(100.00), dec!(100.00), PaymentStatus::Succeeded);
        assert_eq!(max_creditable_amount(&invoice, CreditNoteType::Refund).amount, dec!(100.00));
    }

    #[test]
    fn test_max_creditable_adjustment() {
        let invoice = invoice_with(dec!(100.00), dec!(0.00), PaymentStatus::Pending);
        assert_eq!(
            max_creditable_amount(&invoice, CreditNoteType::Adjustment).amount,
            dec!(100.00)
        );
    }

    #[test]
    fn test_finalize_refund_produces_wallet_top_up() {
        let mut note = CreditNote {
            id: CreditNoteId::new(),
            invoice_id: InvoiceId::new(),
            subscription_id: None,
            customer_id: CustomerId::new(),
            credit_note_number: "CN-0001".to_string(),
            credit_note_type: CreditNoteType::Refund,
            credit_note_status: CreditNoteStatus::Draft,
            total_amount: Money::new(dec!(30.00), Currency::USD),
            line_items: Vec::new(),
            reason: "customer request".to_string(),
            idempotency_key: "key-1".to_string(),
        };
        let effect = finalize(&mut note).unwrap();
        assert_eq!(note.credit_note_status, CreditNoteStatus::Finalized);
        assert!(effect.wallet_top_up.is_some());
    }

    #[test]
    fn test_void_finalized_refund_is_forbidden() {
        let mut note = CreditNote {
            id: CreditNoteId::new(),
            invoice_id: InvoiceId::new(),
            subscription_id: None,
            customer_id: CustomerId::new(),
            credit_note_number: "CN-0002".to_string(),
            credit_note_type: CreditNoteType::Refund,
            credit_note_status: CreditNoteStatus::Finalized,
            total_amount: Money::new(dec!(30.00), Currency::USD),
            line_items: Vec::new(),
            reason: "customer request".to_string(),
            idempotency_key: "key-2".to_string(),
        };
        assert!(void(&mut note).is_err());
    }

    #[test]
    fn test_void_finalized_adjustment_reverses() {
        let mut note = CreditNote {
            id: CreditNoteId::new(),
            invoice_id: InvoiceId::new(),
            subscription_id: None,
            customer_id: CustomerId::new(),
            credit_note_number: "CN-0003".to_string(),
            credit_note_type: CreditNoteType::Adjustment,
            credit_note_status: CreditNoteStatus::Finalized,
            total_amount: Money::new(dec!(40.00), Currency::USD),
            line_items: Vec::new(),
            reason: "billing error".to_string(),
            idempotency_key: "key-3".to_string(),
        };
        let mutation = void(&mut note).unwrap();
        assert_eq!(note.credit_note_status, CreditNoteStatus::Voided);
        assert!(matches!(mutation, Some(Mutation::CreditNoteVoided { .. })));
    }

    #[test]
    fn test_void_already_voided_is_idempotent() {
        let mut note = CreditNote {
            id: CreditNoteId::new(),
            invoice_id: InvoiceId::new(),
            subscription_id: None,
            customer_id: CustomerId::new(),
            credit_note_number: "CN-0004".to_string(),
            credit_note_type: CreditNoteType::Adjustment,
            credit_note_status: CreditNoteStatus::Voided,
            total_amount: Money::new(dec!(40.00), Currency::USD),
            line_items: Vec::new(),
            reason: "billing error".to_string(),
            idempotency_key: "key-4".to_string(),
        };
        assert!(void(&mut note).unwrap().is_none());
    }
}
