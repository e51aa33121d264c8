//! Coupon engine (C4): validation pipeline, cadence accounting, and application.

use crate::money::{Currency, Money};
use crate::{CouponApplicationId, CouponId, SubscriptionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponCadence {
    Once,
    Forever,
    Repeated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponDiscount {
    Percent { rate: Decimal },
    Fixed { amount: Decimal },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub status: CouponStatus,
    pub currency: Option<Currency>,
    pub redeem_after: Option<DateTime<Utc>>,
    pub redeem_before: Option<DateTime<Utc>>,
    pub max_redemptions: Option<u32>,
    pub total_redemptions: u32,
    pub cadence: CouponCadence,
    pub duration_in_periods: Option<u32>,
    pub discount: CouponDiscount,
}

impl Coupon {
    /// `cadence = repeated ⇒ duration_in_periods > 0` (spec §3, Coupon invariant).
    pub fn validate_shape(&self) -> Result<(), CouponValidationError> {
        if self.cadence == CouponCadence::Repeated {
            match self.duration_in_periods {
                Some(n) if n > 0 => Ok(()),
                _ => Err(CouponValidationError {
                    code: CouponValidationErrorCode::InvalidRepeatedCadence,
                    message: "repeated cadence requires duration_in_periods > 0".to_string(),
                    details: serde_json::json!({ "coupon_id": self.id.to_string() }),
                }),
            }
        } else {
            Ok(())
        }
    }

    pub fn discount_amount(&self, pre_discount_total: Money) -> Money {
        match &self.discount {
            CouponDiscount::Fixed { amount } => {
                Money::new(*amount, pre_discount_total.currency).min(&pre_discount_total)
            }
            CouponDiscount::Percent { rate } => {
                pre_discount_total.mul_scalar(*rate / Decimal::from(100))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponApplication {
    pub id: CouponApplicationId,
    pub coupon_id: CouponId,
    pub subscription_id: Option<SubscriptionId>,
    pub invoice_id: crate::InvoiceId,
    pub applied_amount: Money,
    pub applied_at: DateTime<Utc>,
}

/// Closed set of validation failure codes (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponValidationErrorCode {
    NotFound,
    NotPublished,
    NotActive,
    Expired,
    CurrencyMismatch,
    RedemptionLimitReached,
    OnceCadenceViolation,
    RepeatedCadenceLimitReached,
    InvalidCadence,
    InvalidRepeatedCadence,
    DatabaseError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponValidationError {
    pub code: CouponValidationErrorCode,
    pub message: String,
    pub details: serde_json::Value,
}

impl std::fmt::Display for CouponValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for CouponValidationError {}

fn violation(code: CouponValidationErrorCode, message: &str) -> CouponValidationError {
    CouponValidationError {
        code,
        message: message.to_string(),
        details: serde_json::Value::Null,
    }
}

/// Inputs gathered by the caller before running the validation pipeline — the prior
/// application count is supplied rather than queried here because counting is a
/// repository concern (spec §6, `CouponApplicationRepo.CountBySubscriptionAndCoupon`).
pub struct CouponValidationContext {
    pub now: DateTime<Utc>,
    pub subscription_currency: Currency,
    pub prior_application_count: Result<u32, ()>,
}

/// Runs the ordered, fail-fast validation pipeline from spec §4.4.
pub fn validate_coupon(
    coupon: &Coupon,
    ctx: &CouponValidationContext,
) -> Result<(), CouponValidationError> {
    if coupon.status != CouponStatus::Published {
        return Err(violation(
            CouponValidationErrorCode::NotPublished,
            "coupon is not published",
        ));
    }

    if let Some(after) = coupon.redeem_after {
        if ctx.now < after {
            return Err(violation(CouponValidationErrorCode::NotActive, "coupon not yet active"));
        }
    }
    if let Some(before) = coupon.redeem_before {
        if ctx.now > before {
            return Err(violation(CouponValidationErrorCode::Expired, "coupon has expired"));
        }
    }

    if let Some(currency) = coupon.currency {
        if currency != ctx.subscription_currency {
            return Err(violation(
                CouponValidationErrorCode::CurrencyMismatch,
                "coupon currency does not match subscription currency",
            ));
        }
    }

    if let Some(max) = coupon.max_redemptions {
        if coupon.total_redemptions >= max {
            return Err(violation(
                CouponValidationErrorCode::RedemptionLimitReached,
                "coupon has reached its global redemption cap",
            ));
        }
    }

    match coupon.cadence {
        CouponCadence::Once => match ctx.prior_application_count {
            // Per the spec's Open Question resolution: the violation is `count > 1`, i.e.
            // exactly one prior application is still tolerated when checking ahead of the
            // next one.
            Ok(count) if count > 1 => {
                return Err(violation(
                    CouponValidationErrorCode::OnceCadenceViolation,
                    "once-cadence coupon already applied to this subscription",
                ));
            }
            Ok(_) => {}
            Err(()) => {
                return Err(violation(
                    CouponValidationErrorCode::DatabaseError,
                    "could not count prior applications for once-cadence coupon",
                ));
            }
        },
        CouponCadence::Forever => {
            // Always valid once associated; continues to apply even past expiry checks
            // already performed above for already-associated subscriptions.
        }
        CouponCadence::Repeated => {
            let duration = coupon.duration_in_periods.ok_or_else(|| {
                violation(
                    CouponValidationErrorCode::InvalidRepeatedCadence,
                    "repeated cadence requires duration_in_periods",
                )
            })?;
            match ctx.prior_application_count {
                Ok(count) if count >= duration => {
                    return Err(violation(
                        CouponValidationErrorCode::RepeatedCadenceLimitReached,
                        "repeated-cadence coupon has exhausted its duration",
                    ));
                }
                Ok(_) => {}
                // Documented carve-out (spec §7): a database error counting repeated
                // cadence degrades to a warning and lets the application proceed, because
                // once/forever cadences already cover the dangerous cases.
                Err(()) => {}
            }
        }
    }

    Ok(())
}
