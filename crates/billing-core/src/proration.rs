//! Proration engine (C3): apportions the monetary effect of a mid-period subscription
//! change over the remaining time fraction of the billing period.

use crate::calendar::Period;
use crate::money::{Currency, Money};
use billing_common::{BillingError, BillingResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProrationAction {
    Upgrade,
    Downgrade,
    QuantityChange,
    AddItem,
    RemoveItem,
    Cancellation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProrationBehavior {
    CreateProrations,
    None,
    AlwaysInvoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProrationStrategy {
    DayBased,
    SecondBased,
}

#[derive(Debug, Clone)]
pub struct ProrationParams {
    pub action: ProrationAction,
    pub old_unit_amount: Option<Decimal>,
    pub new_unit_amount: Option<Decimal>,
    pub old_qty: Decimal,
    pub new_qty: Decimal,
    pub old_amount_paid: Money,
    pub proration_date: DateTime<Utc>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub proration_behavior: ProrationBehavior,
    pub strategy: ProrationStrategy,
    pub plan_pay_in_advance: bool,
    pub currency: Currency,
    pub customer_timezone: Tz,
    /// Usage-based prices never prorate the recurring component (spec §4.3 edge cases).
    pub is_usage_based: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProrationLineItem {
    pub description: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProrationResult {
    pub credit_items: Vec<ProrationLineItem>,
    pub charge_items: Vec<ProrationLineItem>,
    pub net_amount: Money,
    pub action: ProrationAction,
    pub proration_date: DateTime<Utc>,
    pub currency: Currency,
    pub is_preview: bool,
}

impl ProrationResult {
    fn zero(params: &ProrationParams) -> Self {
        Self {
            credit_items: Vec::new(),
            charge_items: Vec::new(),
            net_amount: Money::zero(params.currency),
            action: params.action,
            proration_date: params.proration_date,
            currency: params.currency,
            is_preview: true,
        }
    }

    fn from_items(
        credit_items: Vec<ProrationLineItem>,
        charge_items: Vec<ProrationLineItem>,
        params: &ProrationParams,
        is_preview: bool,
    ) -> Self {
        let mut net = Money::zero(params.currency);
        for item in credit_items.iter().chain(charge_items.iter()) {
            net = net.add(&item.amount);
        }
        Self {
            credit_items,
            charge_items,
            net_amount: net,
            action: params.action,
            proration_date: params.proration_date,
            currency: params.currency,
            is_preview,
        }
    }
}

/// Elapsed/remaining fraction of the current period as of `proration_date`.
///
/// Under `second_based` the two always sum to the full period; under `day_based` they are
/// whole-day counts in the customer's timezone and may lose up to one day of rounding —
/// the caller is expected to let that loss land on the charge side (spec §4.3 step 2),
/// which this module achieves by rounding each line item independently rather than
/// rounding a single combined net amount.
fn remaining_fraction(params: &ProrationParams) -> Decimal {
    match params.strategy {
        ProrationStrategy::DayBased => {
            let period = Period::new(params.current_period_start, params.current_period_end);
            let total = period.total_days(params.customer_timezone);
            let elapsed = period.elapsed_days(params.proration_date, params.customer_timezone);
            let remaining = total - elapsed;
            if total == 0 {
                Decimal::ZERO
            } else {
                Decimal::from(remaining) / Decimal::from(elapsed + remaining)
            }
        }
        ProrationStrategy::SecondBased => {
            let total = (params.current_period_end - params.current_period_start).num_seconds();
            let elapsed = (params.proration_date - params.current_period_start).num_seconds();
            let remaining = total - elapsed;
            if total == 0 {
                Decimal::ZERO
            } else {
                Decimal::from(remaining) / Decimal::from(total)
            }
        }
    }
}

/// Credit for the unused portion of what was already paid, clamped so a customer is
/// never credited more than they paid (spec §4.3 step 3).
fn pay_in_advance_credit(params: &ProrationParams, fraction: Decimal) -> Option<ProrationLineItem> {
    if !params.plan_pay_in_advance || params.old_amount_paid.is_zero() {
        return None;
    }
    let magnitude = (params.old_amount_paid.amount * fraction).min(params.old_amount_paid.amount);
    if magnitude.is_zero() {
        return None;
    }
    Some(ProrationLineItem {
        description: "unused time on previous price".to_string(),
        amount: Money::new(-magnitude, params.currency).rounded(),
    })
}

fn recurring_charge(params: &ProrationParams, qty: Decimal, fraction: Decimal) -> Option<ProrationLineItem> {
    if params.is_usage_based {
        return None;
    }
    let unit = params.new_unit_amount.unwrap_or(Decimal::ZERO);
    let amount = unit * qty * fraction;
    if amount.is_zero() {
        return None;
    }
    Some(ProrationLineItem {
        description: "remaining time on new price".to_string(),
        amount: Money::new(amount, params.currency).rounded(),
    })
}

/// Compute a [`ProrationResult`] for a mid-period subscription change.
pub fn prorate(params: ProrationParams) -> BillingResult<ProrationResult> {
    if params.proration_date < params.current_period_start
        || params.proration_date > params.current_period_end
    {
        return Err(BillingError::validation(
            "proration_date_out_of_range",
            "proration date must fall within the current billing period",
        ));
    }

    if matches!(params.proration_behavior, ProrationBehavior::None) {
        return Ok(ProrationResult::zero(&params));
    }

    let fraction = remaining_fraction(&params);
    let is_preview = !matches!(params.proration_behavior, ProrationBehavior::AlwaysInvoice);

    let (credit_items, charge_items) = match params.action {
        ProrationAction::Cancellation | ProrationAction::RemoveItem => {
            let credit = pay_in_advance_credit(&params, fraction);
            (credit.into_iter().collect(), Vec::new())
        }
        ProrationAction::AddItem => {
            let charge = recurring_charge(&params, params.new_qty, fraction);
            (Vec::new(), charge.into_iter().collect())
        }
        ProrationAction::QuantityChange => {
            // Same price both sides (spec §4.3 edge cases): credit the old quantity's
            // remaining time and charge the new quantity's remaining time at that price.
            let unit = params
                .old_unit_amount
                .or(params.new_unit_amount)
                .unwrap_or(Decimal::ZERO);
            let credit_amount = unit * params.old_qty * fraction;
            let charge_amount = unit * params.new_qty * fraction;
            let credit = if credit_amount.is_zero() {
                None
            } else {
                Some(ProrationLineItem {
                    description: "unused time at previous quantity".to_string(),
                    amount: Money::new(-credit_amount, params.currency).rounded(),
                })
            };
            let charge = if charge_amount.is_zero() {
                None
            } else {
                Some(ProrationLineItem {
                    description: "remaining time at new quantity".to_string(),
                    amount: Money::new(charge_amount, params.currency).rounded(),
                })
            };
            (credit.into_iter().collect(), charge.into_iter().collect())
        }
        ProrationAction::Upgrade | ProrationAction::Downgrade => {
            let credit = pay_in_advance_credit(&params, fraction);
            let charge = recurring_charge(&params, params.new_qty, fraction);
            (credit.into_iter().collect(), charge.into_iter().collect())
        }
    };

    Ok(ProrationResult::from_items(
        credit_items,
        charge_items,
        &params,
        is_preview,
    ))
}
