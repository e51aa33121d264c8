//! Temporal calendar math (C2): billing period boundaries, calendar vs anniversary
//! alignment, and timezone-aware day counting for proration.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// How a subscription's billing periods are aligned to the calendar (spec §3, Subscription).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    /// Periods start on the 1st of the month (or Jan 1 for yearly/quarterly), regardless
    /// of when the subscription itself started.
    Calendar,
    /// Periods are anchored to the subscription's start date ("bill on the 14th of every
    /// month" for a subscription that started on the 14th).
    Anniversary,
}

/// Billing interval granularity (spec §3, Price.billing_period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// A half-open `[start, end)` billing period in UTC, plus the customer timezone it was
/// computed against (needed to reproduce DST-affected day counts deterministically).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start < end, "period start must precede end");
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Total whole days spanned by this period, measured in `tz` to correctly account for
    /// DST transitions (spec §4.2: "day counts follow the customer's timezone").
    pub fn total_days(&self, tz: Tz) -> i64 {
        days_between(self.start, self.end, tz)
    }

    /// Days from `self.start` up to (but not including) `instant`, clamped to the period.
    pub fn elapsed_days(&self, instant: DateTime<Utc>, tz: Tz) -> i64 {
        let clamped = instant.clamp(self.start, self.end);
        days_between(self.start, clamped, tz)
    }
}

/// Day count between two instants as observed in local time `tz`. Using local calendar
/// dates (rather than a raw 86400s division) is what keeps this correct across a DST
/// transition, where a "day" is 23 or 25 real hours.
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>, tz: Tz) -> i64 {
    let from_local = from.with_timezone(&tz).date_naive();
    let to_local = to.with_timezone(&tz).date_naive();
    (to_local - from_local).num_days()
}

/// Advance `anchor` by one `period`, preserving anniversary day-of-month semantics
/// (clamping to the last valid day of the target month, e.g. Jan 31 + 1 month = Feb 28).
pub fn advance_period(anchor: DateTime<Utc>, period: BillingPeriod, tz: Tz) -> DateTime<Utc> {
    let local = anchor.with_timezone(&tz);
    let advanced_naive = match period {
        BillingPeriod::Weekly => local.date_naive() + Duration::days(7),
        BillingPeriod::Monthly => add_months(local.date_naive(), 1),
        BillingPeriod::Quarterly => add_months(local.date_naive(), 3),
        BillingPeriod::Yearly => add_months(local.date_naive(), 12),
    };
    let advanced_local = tz
        .from_local_datetime(&advanced_naive.and_time(local.time()))
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&advanced_naive.and_time(local.time())));
    advanced_local.with_timezone(&Utc)
}

fn add_months(date: chrono::NaiveDate, months: i32) -> chrono::NaiveDate {
    let total_month0 = date.month0() as i32 + months;
    let year = date.year() + total_month0.div_euclid(12);
    let month0 = total_month0.rem_euclid(12) as u32;
    let day = date.day();
    let last_day = last_day_of_month(year, month0 + 1);
    chrono::NaiveDate::from_ymd_opt(year, month0 + 1, day.min(last_day))
        .expect("clamped day is valid for its month")
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        chrono::NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        chrono::NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid next-month boundary");
    (next_month_first - Duration::days(1)).day()
}

/// Compute the period containing `at`, for a subscription whose billing periods are
/// anchored either to `cycle_anchor` (anniversary) or to the calendar epoch of `period`
/// (calendar).
pub fn period_containing(
    cycle_anchor: DateTime<Utc>,
    period: BillingPeriod,
    cycle: BillingCycle,
    tz: Tz,
    at: DateTime<Utc>,
) -> Period {
    let base_anchor = match cycle {
        BillingCycle::Anniversary => cycle_anchor,
        BillingCycle::Calendar => calendar_epoch_on_or_before(cycle_anchor, period, tz),
    };

    let mut start = base_anchor;
    loop {
        let end = advance_period(start, period, tz);
        if at < start {
            let prev_start = advance_period_backwards(start, period, tz);
            start = prev_start;
            continue;
        }
        if at < end {
            return Period::new(start, end);
        }
        start = end;
    }
}

fn advance_period_backwards(anchor: DateTime<Utc>, period: BillingPeriod, tz: Tz) -> DateTime<Utc> {
    let local = anchor.with_timezone(&tz);
    let back_naive = match period {
        BillingPeriod::Weekly => local.date_naive() - Duration::days(7),
        BillingPeriod::Monthly => add_months(local.date_naive(), -1),
        BillingPeriod::Quarterly => add_months(local.date_naive(), -3),
        BillingPeriod::Yearly => add_months(local.date_naive(), -12),
    };
    let back_local = tz
        .from_local_datetime(&back_naive.and_time(local.time()))
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&back_naive.and_time(local.time())));
    back_local.with_timezone(&Utc)
}

/// For calendar-aligned cycles, snap `near` back to the most recent period boundary
/// (1st of month/quarter/year in `tz`).
fn calendar_epoch_on_or_before(near: DateTime<Utc>, period: BillingPeriod, tz: Tz) -> DateTime<Utc> {
    let local = near.with_timezone(&tz);
    let snapped = match period {
        BillingPeriod::Weekly => {
            let iso_weekday = local.date_naive().weekday().num_days_from_monday();
            local.date_naive() - Duration::days(iso_weekday as i64)
        }
        BillingPeriod::Monthly => {
            chrono::NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap()
        }
        BillingPeriod::Quarterly => {
            let quarter_start_month = ((local.month() - 1) / 3) * 3 + 1;
            chrono::NaiveDate::from_ymd_opt(local.year(), quarter_start_month, 1).unwrap()
        }
        BillingPeriod::Yearly => chrono::NaiveDate::from_ymd_opt(local.year(), 1, 1).unwrap(),
    };
    tz.from_local_datetime(&snapped.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&snapped.and_hms_opt(0, 0, 0).unwrap()))
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_advance_monthly_clamps_end_of_month() {
        let jan31 = utc(2026, 1, 31);
        let advanced = advance_period(jan31, BillingPeriod::Monthly, chrono_tz::UTC);
        assert_eq!(advanced, utc(2026, 2, 28));
    }

    #[test]
    fn test_advance_yearly() {
        let start = utc(2026, 3, 15);
        let advanced = advance_period(start, BillingPeriod::Yearly, chrono_tz::UTC);
        assert_eq!(advanced, utc(2027, 3, 15));
    }

    #[test]
    fn test_period_containing_anniversary() {
        let anchor = utc(2026, 1, 15);
        let at = utc(2026, 2, 20);
        let period = period_containing(
            anchor,
            BillingPeriod::Monthly,
            BillingCycle::Anniversary,
            chrono_tz::UTC,
            at,
        );
        assert_eq!(period.start, utc(2026, 2, 15));
        assert_eq!(period.end, utc(2026, 3, 15));
    }

    #[test]
    fn test_period_containing_calendar() {
        let anchor = utc(2026, 1, 15);
        let at = utc(2026, 2, 20);
        let period = period_containing(
            anchor,
            BillingPeriod::Monthly,
            BillingCycle::Calendar,
            chrono_tz::UTC,
            at,
        );
        assert_eq!(period.start, utc(2026, 2, 1));
        assert_eq!(period.end, utc(2026, 3, 1));
    }

    #[test]
    fn test_total_days_matches_calendar_span() {
        let period = Period::new(utc(2026, 2, 1), utc(2026, 3, 1));
        assert_eq!(period.total_days(chrono_tz::UTC), 28);
    }

    #[test]
    fn test_elapsed_days_clamped_to_period() {
        let period = Period::new(utc(2026, 2, 1), utc(2026, 3, 1));
        assert_eq!(period.elapsed_days(utc(2026, 2, 15), chrono_tz::UTC), 14);
        assert_eq!(period.elapsed_days(utc(2026, 4, 1), chrono_tz::UTC), 28);
    }
}
