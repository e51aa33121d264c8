//! Exact decimal money (C1: Money & Decimal Primitives).
//!
//! All monetary amounts are exact decimals with explicit scale (spec §4.1). Intermediate
//! computation stays full precision; rounding only happens at a value's write boundary
//! (invoice totals, credit-note totals, wallet balances), via [`Money::rounded`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// ISO 4217-ish currency code with the minor-unit scale needed for rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    /// Yen has no minor unit.
    JPY,
}

impl Currency {
    /// Number of decimal places used when rounding amounts in this currency for
    /// persistence (spec §4.1: "rounded at their write-boundary").
    pub fn minor_unit_scale(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::USD => write!(f, "USD"),
            Currency::EUR => write!(f, "EUR"),
            Currency::GBP => write!(f, "GBP"),
            Currency::CAD => write!(f, "CAD"),
            Currency::AUD => write!(f, "AUD"),
            Currency::JPY => write!(f, "JPY"),
        }
    }
}

/// Arbitrary-precision signed decimal money value with a currency tag.
///
/// Mixing currencies across an operation is a contract violation and panics immediately
/// rather than silently coercing one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    fn assert_same_currency(&self, other: &Money) {
        assert_eq!(
            self.currency, other.currency,
            "currency mismatch: {} vs {}",
            self.currency, other.currency
        );
    }

    pub fn add(&self, other: &Money) -> Money {
        self.assert_same_currency(other);
        Money::new(self.amount + other.amount, self.currency)
    }

    pub fn sub(&self, other: &Money) -> Money {
        self.assert_same_currency(other);
        Money::new(self.amount - other.amount, self.currency)
    }

    pub fn mul_scalar(&self, factor: Decimal) -> Money {
        Money::new(self.amount * factor, self.currency)
    }

    pub fn negate(&self) -> Money {
        Money::new(-self.amount, self.currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// `Max(a, 0)` from spec §4.1.
    pub fn max_zero(&self) -> Money {
        if self.is_negative() {
            Money::zero(self.currency)
        } else {
            *self
        }
    }

    pub fn max(&self, other: &Money) -> Money {
        self.assert_same_currency(other);
        if self.amount >= other.amount {
            *self
        } else {
            *other
        }
    }

    pub fn min(&self, other: &Money) -> Money {
        self.assert_same_currency(other);
        if self.amount <= other.amount {
            *self
        } else {
            *other
        }
    }

    /// Round to the currency's minor-unit scale, half-away-from-zero (spec §4.1).
    pub fn rounded(&self) -> Money {
        Money::new(
            round_half_away_from_zero(self.amount, self.currency.minor_unit_scale()),
            self.currency,
        )
    }

    pub fn compare(&self, other: &Money) -> std::cmp::Ordering {
        self.assert_same_currency(other);
        self.amount.cmp(&other.amount)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money::add(&self, &rhs)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money::sub(&self, &rhs)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        self.negate()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.currency, self.rounded().amount)
    }
}

/// Half-away-from-zero rounding to `scale` decimal places.
///
/// `rust_decimal`'s default `round_dp` is banker's rounding (half-to-even); the spec
/// mandates half-away-from-zero, so this adds the sign-correct 0.5-at-`scale+1` nudge
/// before truncating, matching the classic "round half up" idiom for signed amounts.
pub fn round_half_away_from_zero(value: Decimal, scale: u32) -> Decimal {
    use rust_decimal::RoundingStrategy;
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}
