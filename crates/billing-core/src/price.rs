//! Price definitions and tier-walking calculation (part of C3/C6's pricing surface).
//!
//! A [`Price`] is eligible for a subscription iff its currency and billing-period tuple
//! match (spec §3). `billing_model` determines how a quantity maps to an amount; tiered
//! models additionally choose between `volume` (all units at the tier reached) and
//! `graduated` (each tier's slice priced independently) tier walking.

use crate::money::{Currency, Money};
use crate::calendar::BillingPeriod;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceEntityType {
    Plan,
    Addon,
    Subscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceCadence {
    Advance,
    Arrear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMode {
    Volume,
    Graduated,
}

/// A tier in graduated or volume pricing (spec §3, Price.tiers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier {
    /// Minimum units for this tier (inclusive).
    pub from_units: Decimal,
    /// Maximum units for this tier (exclusive, `None` = unlimited).
    pub to_units: Option<Decimal>,
    pub unit_amount: Decimal,
    pub flat_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BillingModel {
    FlatFee,
    Package {
        package_size: Decimal,
    },
    Tiered {
        tier_mode: TierMode,
        tiers: Vec<Tier>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub id: crate::PriceId,
    pub entity_type: PriceEntityType,
    pub entity_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub billing_period: BillingPeriod,
    pub billing_period_count: u32,
    pub billing_model: BillingModel,
    pub invoice_cadence: InvoiceCadence,
}

impl Price {
    /// A price is eligible for a subscription iff currency and billing-period tuple match
    /// (spec §3, Price).
    pub fn eligible_for(&self, currency: Currency, period: BillingPeriod, period_count: u32) -> bool {
        self.currency == currency
            && self.billing_period == period
            && self.billing_period_count == period_count
    }

    /// Total amount due for `quantity` units under this price's billing model.
    pub fn calculate(&self, quantity: Decimal) -> Money {
        let amount = match &self.billing_model {
            BillingModel::FlatFee => self.amount,
            BillingModel::Package { package_size } => {
                let packages = (quantity / package_size).ceil();
                packages * self.amount
            }
            BillingModel::Tiered { tier_mode, tiers } => match tier_mode {
                TierMode::Graduated => calculate_graduated(quantity, tiers),
                TierMode::Volume => calculate_volume(quantity, tiers),
            },
        };
        Money::new(amount, self.currency)
    }
}

/// Each tier's slice of `quantity` priced independently, with any flat entry fee added
/// once per tier actually entered.
fn calculate_graduated(quantity: Decimal, tiers: &[Tier]) -> Decimal {
    let mut total = Decimal::ZERO;
    let mut remaining = quantity;

    for tier in tiers {
        if remaining <= Decimal::ZERO {
            break;
        }

        let tier_size = tier
            .to_units
            .map(|to| to - tier.from_units)
            .unwrap_or(Decimal::MAX);

        let units_in_tier = remaining.min(tier_size);
        if units_in_tier > Decimal::ZERO {
            if let Some(flat) = tier.flat_amount {
                total += flat;
            }
            total += units_in_tier * tier.unit_amount;
        }
        remaining -= units_in_tier;
    }

    total
}

/// All units priced at the single tier the total quantity reaches.
fn calculate_volume(quantity: Decimal, tiers: &[Tier]) -> Decimal {
    let tier = tiers
        .iter()
        .find(|t| quantity >= t.from_units && t.to_units.map(|to| quantity < to).unwrap_or(true))
        .unwrap_or_else(|| tiers.last().expect("at least one tier required"));

    let flat = tier.flat_amount.unwrap_or(Decimal::ZERO);
    quantity * tier.unit_amount + flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PriceId;
    use rust_decimal_macros::dec;

    fn price_with(model: BillingModel) -> Price {
        Price {
            id: PriceId::new(),
            entity_type: PriceEntityType::Plan,
            entity_id: "plan_1".to_string(),
            amount: dec!(10.00),
            currency: Currency::USD,
            billing_period: BillingPeriod::Monthly,
            billing_period_count: 1,
            billing_model: model,
            invoice_cadence: InvoiceCadence::Arrear,
        }
    }

    #[test]
    fn test_flat_fee_ignores_quantity() {
        let price = price_with(BillingModel::FlatFee);
        assert_eq!(price.calculate(dec!(500)).amount, dec!(10.00));
    }

    #[test]
    fn test_package_rounds_up() {
        let mut price = price_with(BillingModel::Package {
            package_size: dec!(1000),
        });
        price.amount = dec!(1.00);
        // 2500 tokens = 3 packages rounded up.
        assert_eq!(price.calculate(dec!(2500)).amount, dec!(3.00));
    }

    #[test]
    fn test_graduated_tiered() {
        let price = price_with(BillingModel::Tiered {
            tier_mode: TierMode::Graduated,
            tiers: vec![
                Tier {
                    from_units: dec!(0),
                    to_units: Some(dec!(100)),
                    unit_amount: dec!(0.10),
                    flat_amount: None,
                },
                Tier {
                    from_units: dec!(100),
                    to_units: Some(dec!(1000)),
                    unit_amount: dec!(0.05),
                    flat_amount: None,
                },
                Tier {
                    from_units: dec!(1000),
                    to_units: None,
                    unit_amount: dec!(0.01),
                    flat_amount: None,
                },
            ],
        });
        // 150 calls: first 100 at $0.10, next 50 at $0.05.
        assert_eq!(price.calculate(dec!(150)).amount, dec!(12.50));
    }

    #[test]
    fn test_volume_tiered_prices_all_units_at_reached_tier() {
        let price = price_with(BillingModel::Tiered {
            tier_mode: TierMode::Volume,
            tiers: vec![
                Tier {
                    from_units: dec!(0),
                    to_units: Some(dec!(100)),
                    unit_amount: dec!(0.10),
                    flat_amount: None,
                },
                Tier {
                    from_units: dec!(100),
                    to_units: None,
                    unit_amount: dec!(0.05),
                    flat_amount: None,
                },
            ],
        });
        assert_eq!(price.calculate(dec!(150)).amount, dec!(7.50));
    }
}
