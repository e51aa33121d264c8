//! Payment-provider port (spec §6): the subset of a provider integration the billing
//! core depends on to draft, finalize, and reconcile invoices out-of-band.

use crate::money::Money;
use async_trait::async_trait;
use billing_common::{BillingResult, CollectionMethod};
use secrecy::SecretString;
use std::collections::HashMap;

pub struct ProviderCustomer {
    pub provider_customer_id: String,
    pub email: Option<String>,
}

/// Credentials for a provider client, kept zeroizing/secret per the teacher's handling
/// of external-service credentials.
pub struct ProviderCredentials {
    pub api_key: SecretString,
}

#[async_trait]
pub trait PaymentProviderPort: Send + Sync {
    async fn create_draft_invoice(
        &self,
        provider_customer_id: &str,
        currency: &str,
        collection_method: CollectionMethod,
        metadata: &HashMap<String, String>,
    ) -> BillingResult<String>;

    async fn add_invoice_item(&self, provider_invoice_id: &str, description: &str, amount: Money) -> BillingResult<()>;

    async fn finalize_invoice(&self, provider_invoice_id: &str, auto_send: bool) -> BillingResult<()>;

    async fn send_invoice(&self, provider_invoice_id: &str) -> BillingResult<()>;

    async fn mark_paid_out_of_band(
        &self,
        provider_invoice_id: &str,
        amount: Money,
        metadata: &HashMap<String, String>,
    ) -> BillingResult<()>;

    async fn get_customer(&self, provider_customer_id: &str) -> BillingResult<ProviderCustomer>;
}
