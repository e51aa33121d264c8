//! PostgreSQL implementations of the repository port (spec §6).
//!
//! Uses runtime-checked SQL (`sqlx::query` rather than `query!`) so the crate does not
//! require `DATABASE_URL` at compile time.

use crate::coupon::CouponApplication;
use crate::invoice::{Invoice, InvoiceLineItem, InvoiceStatus, InvoiceType, PaymentStatus};
use crate::money::{Currency, Money};
use crate::ports::repository::{CouponApplicationCounter, InvoiceNumbering, ListFilter, Repository};
use crate::{CouponId, CustomerId, InvoiceId, SubscriptionId};
use async_trait::async_trait;
use billing_common::{BillingError, BillingResult};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

/// PostgreSQL-backed invoice repository.
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_invoice(row: &sqlx::postgres::PgRow) -> BillingResult<Invoice> {
        let currency = parse_currency(&row.try_get::<String, _>("currency")?)?;

        Ok(Invoice {
            id: InvoiceId::from_uuid(row.try_get::<uuid::Uuid, _>("id")?),
            subscription_id: row
                .try_get::<Option<uuid::Uuid>, _>("subscription_id")?
                .map(SubscriptionId::from_uuid),
            customer_id: CustomerId::from_uuid(row.try_get::<uuid::Uuid, _>("customer_id")?),
            currency,
            invoice_type: parse_invoice_type(&row.try_get::<String, _>("invoice_type")?)?,
            invoice_status: parse_invoice_status(&row.try_get::<String, _>("invoice_status")?)?,
            payment_status: parse_payment_status(&row.try_get::<String, _>("payment_status")?)?,
            collection_method: billing_common::CollectionMethod::ChargeAutomatically,
            total: Money::new(row.try_get::<Decimal, _>("total")?, currency),
            amount_due: Money::new(row.try_get::<Decimal, _>("amount_due")?, currency),
            amount_paid: Money::new(row.try_get::<Decimal, _>("amount_paid")?, currency),
            amount_remaining: Money::new(row.try_get::<Decimal, _>("amount_remaining")?, currency),
            adjustment_amount: Money::new(row.try_get::<Decimal, _>("adjustment_amount")?, currency),
            refunded_amount: Money::new(row.try_get::<Decimal, _>("refunded_amount")?, currency),
            period_start: row.try_get("period_start")?,
            period_end: row.try_get("period_end")?,
            due_date: row.try_get("due_date")?,
            line_items: Vec::new(),
            metadata: HashMap::new(),
            billing_sequence: row.try_get::<i64, _>("billing_sequence")? as u64,
            invoice_number: row.try_get("invoice_number")?,
        })
    }
}

fn parse_invoice_type(s: &str) -> BillingResult<InvoiceType> {
    match s {
        "subscription" => Ok(InvoiceType::Subscription),
        "one_off" => Ok(InvoiceType::OneOff),
        "credit" => Ok(InvoiceType::Credit),
        other => Err(BillingError::database(format!("unknown invoice_type: {other}"))),
    }
}

fn parse_invoice_status(s: &str) -> BillingResult<InvoiceStatus> {
    match s {
        "draft" => Ok(InvoiceStatus::Draft),
        "finalized" => Ok(InvoiceStatus::Finalized),
        "voided" => Ok(InvoiceStatus::Voided),
        other => Err(BillingError::database(format!("unknown invoice_status: {other}"))),
    }
}

fn parse_payment_status(s: &str) -> BillingResult<PaymentStatus> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "processing" => Ok(PaymentStatus::Processing),
        "succeeded" => Ok(PaymentStatus::Succeeded),
        "failed" => Ok(PaymentStatus::Failed),
        "partially_refunded" => Ok(PaymentStatus::PartiallyRefunded),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(BillingError::database(format!("unknown payment_status: {other}"))),
    }
}

#[async_trait]
impl Repository<Invoice, InvoiceId> for PgInvoiceRepository {
    async fn get(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let row = sqlx::query(
            r#"
            SELECT id, subscription_id, customer_id, currency, invoice_type, invoice_status,
                   payment_status, total, amount_due, amount_paid, amount_remaining,
                   adjustment_amount, refunded_amount, period_start, period_end, due_date,
                   billing_sequence, invoice_number
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BillingError::database(e.to_string()))?
        .ok_or_else(|| BillingError::not_found("invoice_not_found", "invoice does not exist"))?;

        Self::row_to_invoice(&row)
    }

    async fn create(&self, invoice: &Invoice) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, subscription_id, customer_id, currency, invoice_type, invoice_status,
                payment_status, total, amount_due, amount_paid, amount_remaining,
                adjustment_amount, refunded_amount, period_start, period_end, due_date,
                billing_sequence, invoice_number
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.subscription_id.map(|s| *s.as_uuid()))
        .bind(invoice.customer_id.as_uuid())
        .bind(invoice.currency.to_string())
        .bind(format!("{:?}", invoice.invoice_type).to_lowercase())
        .bind(format!("{:?}", invoice.invoice_status).to_lowercase())
        .bind(format!("{:?}", invoice.payment_status).to_lowercase())
        .bind(invoice.total.amount)
        .bind(invoice.amount_due.amount)
        .bind(invoice.amount_paid.amount)
        .bind(invoice.amount_remaining.amount)
        .bind(invoice.adjustment_amount.amount)
        .bind(invoice.refunded_amount.amount)
        .bind(invoice.period_start)
        .bind(invoice.period_end)
        .bind(invoice.due_date)
        .bind(invoice.billing_sequence as i64)
        .bind(&invoice.invoice_number)
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::database(e.to_string()))?;

        Ok(())
    }

    async fn update(&self, invoice: &Invoice) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                invoice_status = $2, payment_status = $3, total = $4, amount_due = $5,
                amount_paid = $6, amount_remaining = $7, adjustment_amount = $8,
                refunded_amount = $9, due_date = $10
            WHERE id = $1
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(format!("{:?}", invoice.invoice_status).to_lowercase())
        .bind(format!("{:?}", invoice.payment_status).to_lowercase())
        .bind(invoice.total.amount)
        .bind(invoice.amount_due.amount)
        .bind(invoice.amount_paid.amount)
        .bind(invoice.amount_remaining.amount)
        .bind(invoice.adjustment_amount.amount)
        .bind(invoice.refunded_amount.amount)
        .bind(invoice.due_date)
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(BillingError::not_found("invoice_not_found", "invoice does not exist"));
        }
        Ok(())
    }

    async fn delete(&self, id: InvoiceId) -> BillingResult<()> {
        let result = sqlx::query("UPDATE invoices SET invoice_status = 'voided' WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| BillingError::database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(BillingError::not_found("invoice_not_found", "invoice does not exist"));
        }
        Ok(())
    }

    async fn list(&self, filter: &ListFilter) -> BillingResult<Vec<Invoice>> {
        let status_clause = if filter.include_deleted { "" } else { "WHERE invoice_status != 'voided'" };
        let query = format!(
            r#"
            SELECT id, subscription_id, customer_id, currency, invoice_type, invoice_status,
                   payment_status, total, amount_due, amount_paid, amount_remaining,
                   adjustment_amount, refunded_amount, period_start, period_end, due_date,
                   billing_sequence, invoice_number
            FROM invoices
            {status_clause}
            ORDER BY billing_sequence DESC
            LIMIT $1 OFFSET $2
            "#
        );

        let rows = sqlx::query(&query)
            .bind(filter.limit.unwrap_or(100))
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BillingError::database(e.to_string()))?;

        rows.iter().map(Self::row_to_invoice).collect()
    }

    async fn count(&self, filter: &ListFilter) -> BillingResult<i64> {
        let status_clause = if filter.include_deleted { "" } else { "WHERE invoice_status != 'voided'" };
        let query = format!("SELECT COUNT(*) as count FROM invoices {status_clause}");

        let row = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BillingError::database(e.to_string()))?;

        Ok(row.get("count"))
    }
}

#[async_trait]
impl InvoiceNumbering for PgInvoiceRepository {
    async fn get_next_invoice_number(&self, config: &str) -> BillingResult<String> {
        let row = sqlx::query("SELECT nextval($1) as seq")
            .bind(format!("invoice_number_seq_{config}"))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BillingError::database(e.to_string()))?;

        let seq: i64 = row.try_get("seq").map_err(|e| BillingError::database(e.to_string()))?;
        Ok(format!("INV-{:06}", seq))
    }

    async fn get_next_billing_sequence(&self, subscription_id: SubscriptionId) -> BillingResult<u64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(MAX(billing_sequence), 0) + 1 as next_sequence
            FROM invoices WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BillingError::database(e.to_string()))?;

        let next: i64 = row.try_get("next_sequence").map_err(|e| BillingError::database(e.to_string()))?;
        Ok(next as u64)
    }
}

/// PostgreSQL-backed coupon-application repository. `CountBySubscriptionAndCoupon` is the
/// canonical cadence counter (spec §6: "cadence counters are materialized by counting
/// `CouponApplication` rows rather than being denormalized").
pub struct PgCouponApplicationRepository {
    pool: PgPool,
}

impl PgCouponApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponApplicationCounter for PgCouponApplicationRepository {
    async fn count_by_subscription_and_coupon(
        &self,
        subscription_id: SubscriptionId,
        coupon_id: CouponId,
    ) -> BillingResult<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM coupon_applications
            WHERE subscription_id = $1 AND coupon_id = $2
            "#,
        )
        .bind(subscription_id.as_uuid())
        .bind(coupon_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BillingError::database(e.to_string()))?;

        let count: i64 = row.get("count");
        Ok(count as u32)
    }

    async fn create_application(&self, application: &CouponApplication) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupon_applications (id, coupon_id, subscription_id, invoice_id, applied_amount, applied_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(application.id.as_uuid())
        .bind(application.coupon_id.as_uuid())
        .bind(application.subscription_id.map(|s| *s.as_uuid()))
        .bind(application.invoice_id.as_uuid())
        .bind(application.applied_amount.amount)
        .bind(application.applied_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invoice_status_roundtrip() {
        assert_eq!(parse_invoice_status("finalized").unwrap(), InvoiceStatus::Finalized);
        assert!(parse_invoice_status("bogus").is_err());
    }

    #[test]
    fn test_parse_payment_status_roundtrip() {
        assert_eq!(parse_payment_status("partially_refunded").unwrap(), PaymentStatus::PartiallyRefunded);
    }
}
