//! Subscription and line-item lifecycle (C6).

use crate::calendar::{BillingCycle, BillingPeriod};
use crate::money::Currency;
use crate::price::PriceId;
use crate::{CustomerId, MeterId, SubscriptionId, SubscriptionLineItemId};
use billing_common::{BillingError, BillingResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub customer_id: CustomerId,
    pub currency: Currency,
    pub billing_period: BillingPeriod,
    pub billing_period_count: u32,
    pub billing_cycle: BillingCycle,
    pub billing_anchor: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub commitment_amount: Option<Decimal>,
    pub overage_factor: Option<Decimal>,
}

impl Subscription {
    /// `commitment` set ⇒ `overage_factor > 1` (spec §3, Subscription invariant).
    pub fn validate_invariants(&self) -> BillingResult<()> {
        if self.current_period_start >= self.current_period_end {
            return Err(BillingError::validation(
                "invalid_period",
                "current_period_start must precede current_period_end",
            ));
        }
        if self.commitment_amount.is_some() {
            match self.overage_factor {
                Some(factor) if factor > Decimal::ONE => {}
                _ => {
                    return Err(BillingError::validation(
                        "invalid_commitment",
                        "a commitment requires overage_factor > 1",
                    ))
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemEntityType {
    Plan,
    Addon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Fixed,
    Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemStatus {
    Published,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentType {
    Amount,
    Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentSpec {
    pub commitment_type: CommitmentType,
    pub commitment_amount: Option<Decimal>,
    pub commitment_quantity: Option<Decimal>,
    pub commitment_overage_factor: Decimal,
    pub commitment_true_up_enabled: bool,
    pub commitment_windowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionLineItem {
    pub id: SubscriptionLineItemId,
    pub subscription_id: SubscriptionId,
    pub entity_type: LineItemEntityType,
    pub entity_id: String,
    pub price_id: PriceId,
    pub price_type: PriceType,
    pub quantity: Decimal,
    pub currency: Currency,
    pub billing_period: BillingPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: LineItemStatus,
    pub meter_id: Option<MeterId>,
    pub commitment: Option<CommitmentSpec>,
}

impl SubscriptionLineItem {
    pub fn is_active(&self) -> bool {
        self.end_date.is_none() && self.status == LineItemStatus::Published
    }

    /// Terminates this line item at `effective_from`, returning the new line item a
    /// pricing-affecting update must materialize starting at that instant (spec §4.6).
    pub fn terminate(&mut self, effective_from: DateTime<Utc>) -> BillingResult<()> {
        if self.end_date.is_some() {
            return Err(BillingError::invalid_operation(
                "already_terminated",
                "line item has already been terminated",
            ));
        }
        if effective_from < self.start_date {
            return Err(BillingError::validation(
                "end_before_start",
                "end_date cannot precede start_date",
            ));
        }
        self.end_date = Some(effective_from);
        Ok(())
    }

    /// Materializes the successor line item for a pricing-affecting update: same
    /// identity fields, new id, `start_date` equal to the predecessor's `end_date`, and
    /// (if supplied) a subscription-scoped price override.
    pub fn materialize_successor(&self, new_price_id: PriceId, new_quantity: Decimal) -> BillingResult<Self> {
        let start_date = self
            .end_date
            .ok_or_else(|| BillingError::invalid_operation("not_terminated", "predecessor must be terminated first"))?;
        Ok(Self {
            id: SubscriptionLineItemId::new(),
            subscription_id: self.subscription_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id.clone(),
            price_id: new_price_id,
            price_type: self.price_type,
            quantity: new_quantity,
            currency: self.currency,
            billing_period: self.billing_period,
            start_date,
            end_date: None,
            status: LineItemStatus::Published,
            meter_id: self.meter_id,
            commitment: self.commitment.clone(),
        })
    }
}

/// Validates the commitment rules from spec §4.6. `meter_has_bucket_size` tells the
/// validator whether the referenced meter declares a window (required for
/// `commitment_windowed`); it is a lookup result, not state stored on the line item.
pub fn validate_commitment(
    line_item: &SubscriptionLineItem,
    subscription_has_commitment: bool,
    meter_has_bucket_size: bool,
) -> BillingResult<()> {
    let Some(commitment) = &line_item.commitment else {
        return Ok(());
    };

    if line_item.price_type != PriceType::Usage {
        return Err(BillingError::validation(
            "commitment_requires_usage_price",
            "a commitment may only be set on a usage-priced line item",
        ));
    }

    let amount_set = commitment.commitment_amount.is_some();
    let quantity_set = commitment.commitment_quantity.is_some();
    if amount_set == quantity_set {
        return Err(BillingError::validation(
            "exactly_one_commitment_side",
            "exactly one of commitment_amount or commitment_quantity must be set",
        ));
    }

    if commitment.commitment_overage_factor <= Decimal::ONE {
        return Err(BillingError::validation(
            "invalid_overage_factor",
            "commitment_overage_factor must be greater than 1",
        ));
    }

    let side_matches_type = match commitment.commitment_type {
        CommitmentType::Amount => amount_set,
        CommitmentType::Quantity => quantity_set,
    };
    if !side_matches_type {
        return Err(BillingError::validation(
            "commitment_type_mismatch",
            "commitment_type does not agree with the side that is set",
        ));
    }

    if commitment.commitment_windowed && !meter_has_bucket_size {
        return Err(BillingError::validation(
            "windowed_commitment_requires_bucket_size",
            "a windowed commitment requires the meter to declare a bucket_size",
        ));
    }

    if subscription_has_commitment {
        return Err(BillingError::validation(
            "commitment_set_at_both_levels",
            "a subscription-level commitment and a line-item-level commitment are mutually exclusive",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_line_item() -> SubscriptionLineItem {
        SubscriptionLineItem {
            id: SubscriptionLineItemId::new(),
            subscription_id: SubscriptionId::new(),
            entity_type: LineItemEntityType::Plan,
            entity_id: "plan_1".to_string(),
            price_id: PriceId::new(),
            price_type: PriceType::Usage,
            quantity: Decimal::ONE,
            currency: Currency::USD,
            billing_period: BillingPeriod::Monthly,
            start_date: Utc::now() - Duration::days(10),
            end_date: None,
            status: LineItemStatus::Published,
            meter_id: Some(MeterId::new()),
            commitment: None,
        }
    }

    #[test]
    fn test_terminate_then_reterminate_fails() {
        let mut item = base_line_item();
        item.terminate(Utc::now()).unwrap();
        assert!(item.terminate(Utc::now()).is_err());
    }

    #[test]
    fn test_terminate_before_start_rejected() {
        let mut item = base_line_item();
        let result = item.terminate(item.start_date - Duration::days(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_materialize_successor_starts_at_predecessor_end() {
        let mut item = base_line_item();
        let effective_from = Utc::now();
        item.terminate(effective_from).unwrap();
        let successor = item.materialize_successor(PriceId::new(), Decimal::from(5)).unwrap();
        assert_eq!(successor.start_date, effective_from);
        assert!(successor.is_active());
    }

    #[test]
    fn test_commitment_requires_usage_price() {
        let mut item = base_line_item();
        item.price_type = PriceType::Fixed;
        item.commitment = Some(CommitmentSpec {
            commitment_type: CommitmentType::Amount,
            commitment_amount: Some(Decimal::from(100)),
            commitment_quantity: None,
            commitment_overage_factor: Decimal::from(2),
            commitment_true_up_enabled: false,
            commitment_windowed: false,
        });
        assert!(validate_commitment(&item, false, false).is_err());
    }

    #[test]
    fn test_commitment_both_sides_set_is_violation() {
        let mut item = base_line_item();
        item.commitment = Some(CommitmentSpec {
            commitment_type: CommitmentType::Amount,
            commitment_amount: Some(Decimal::from(100)),
            commitment_quantity: Some(Decimal::from(10)),
            commitment_overage_factor: Decimal::from(2),
            commitment_true_up_enabled: false,
            commitment_windowed: false,
        });
        assert!(validate_commitment(&item, false, false).is_err());
    }

    #[test]
    fn test_commitment_requires_overage_factor_above_one() {
        let mut item = base_line_item();
        item.commitment = Some(CommitmentSpec {
            commitment_type: CommitmentType::Amount,
            commitment_amount: Some(Decimal::from(100)),
            commitment_quantity: None,
            commitment_overage_factor: Decimal::ONE,
            commitment_true_up_enabled: false,
            commitment_windowed: false,
        });
        assert!(validate_commitment(&item, false, false).is_err());
    }

    #[test]
    fn test_windowed_commitment_requires_meter_bucket_size() {
        let mut item = base_line_item();
        item.commitment = Some(CommitmentSpec {
            commitment_type: CommitmentType::Quantity,
            commitment_amount: None,
            commitment_quantity: Some(Decimal::from(10)),
            commitment_overage_factor: Decimal::from(2),
            commitment_true_up_enabled: false,
            commitment_windowed: true,
        });
        assert!(validate_commitment(&item, false, false).is_err());
        assert!(validate_commitment(&item, false, true).is_ok());
    }

    #[test]
    fn test_subscription_and_line_item_commitment_mutually_exclusive() {
        let mut item = base_line_item();
        item.commitment = Some(CommitmentSpec {
            commitment_type: CommitmentType::Quantity,
            commitment_amount: None,
            commitment_quantity: Some(Decimal::from(10)),
            commitment_overage_factor: Decimal::from(2),
            commitment_true_up_enabled: false,
            commitment_windowed: false,
        });
        assert!(validate_commitment(&item, true, false).is_err());
    }

    #[test]
    fn test_subscription_commitment_requires_overage_factor() {
        let subscription = Subscription {
            id: SubscriptionId::new(),
            customer_id: CustomerId::new(),
            currency: Currency::USD,
            billing_period: BillingPeriod::Monthly,
            billing_period_count: 1,
            billing_cycle: BillingCycle::Anniversary,
            billing_anchor: Utc::now(),
            start_date: Utc::now(),
            current_period_start: Utc::now(),
            current_period_end: Utc::now() + Duration::days(30),
            status: SubscriptionStatus::Active,
            commitment_amount: Some(Decimal::from(1000)),
            overage_factor: None,
        };
        assert!(subscription.validate_invariants().is_err());
    }
}
