//! Customer wallets: the refund-side destination for finalized credit notes (C5).
//!
//! A wallet is scoped to `(customer, currency)`. Top-ups are idempotent by key so a
//! credit note's finalize transaction can safely retry without double-crediting (spec
//! §4.5: "tops it up by `total_amount` with `idempotency_key = credit_note.id`").

use crate::money::{Currency, Money};
use crate::{CustomerId, WalletId};
use billing_common::{BillingError, BillingResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub customer_id: CustomerId,
    pub currency: Currency,
    /// Conversion rate between wallet credits and invoice currency; 1 unless the wallet
    /// denominates credits differently from the customer's invoicing currency.
    pub conversion_rate: Decimal,
    pub balance: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(customer_id: CustomerId, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::new(),
            customer_id,
            currency,
            conversion_rate: Decimal::ONE,
            balance: Decimal::ZERO,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance_money(&self) -> Money {
        Money::new(self.balance, self.currency)
    }

    pub fn has_sufficient_balance(&self, amount: &Money) -> bool {
        self.active && self.currency == amount.currency && self.balance >= amount.amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionType {
    TopUp,
    Consumption,
    Expiration,
    Adjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: uuid::Uuid,
    pub wallet_id: WalletId,
    pub transaction_type: CreditTransactionType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub idempotency_key: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// In-process wallet ledger. A production deployment backs this with the repository
/// port (spec §6); this manager is the in-memory shape the service layer wraps, and
/// mirrors the concurrency-safety expectations of a transactional backing store.
pub struct WalletManager {
    wallets: RwLock<HashMap<(CustomerId, Currency), Wallet>>,
    transactions: RwLock<Vec<CreditTransaction>>,
    applied_idempotency_keys: RwLock<HashSet<String>>,
}

impl WalletManager {
    pub fn new() -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            transactions: RwLock::new(Vec::new()),
            applied_idempotency_keys: RwLock::new(HashSet::new()),
        }
    }

    pub fn get_or_create_wallet(&self, customer_id: CustomerId, currency: Currency) -> Wallet {
        let mut wallets = self.wallets.write().unwrap();
        wallets
            .entry((customer_id, currency))
            .or_insert_with(|| Wallet::new(customer_id, currency))
            .clone()
    }

    pub fn get_wallet(&self, customer_id: CustomerId, currency: Currency) -> Option<Wallet> {
        self.wallets.read().unwrap().get(&(customer_id, currency)).cloned()
    }

    /// Tops up the wallet by `amount`, idempotent on `idempotency_key`: a retry with the
    /// same key returns the wallet unchanged rather than crediting twice.
    pub fn top_up(
        &self,
        customer_id: CustomerId,
        currency: Currency,
        amount: Money,
        idempotency_key: &str,
    ) -> BillingResult<Wallet> {
        if amount.is_negative() || amount.is_zero() {
            return Err(BillingError::validation("invalid_amount", "top-up amount must be positive"));
        }

        {
            let applied = self.applied_idempotency_keys.read().unwrap();
            if applied.contains(idempotency_key) {
                return Ok(self
                    .get_wallet(customer_id, currency)
                    .unwrap_or_else(|| Wallet::new(customer_id, currency)));
            }
        }

        let mut wallets = self.wallets.write().unwrap();
        let wallet = wallets
            .entry((customer_id, currency))
            .or_insert_with(|| Wallet::new(customer_id, currency));

        wallet.balance += amount.amount;
        wallet.updated_at = Utc::now();
        let snapshot = wallet.clone();

        self.transactions.write().unwrap().push(CreditTransaction {
            id: uuid::Uuid::new_v4(),
            wallet_id: snapshot.id,
            transaction_type: CreditTransactionType::TopUp,
            amount: amount.amount,
            balance_after: snapshot.balance,
            idempotency_key: Some(idempotency_key.to_string()),
            reference: None,
            created_at: Utc::now(),
        });
        self.applied_idempotency_keys
            .write()
            .unwrap()
            .insert(idempotency_key.to_string());

        Ok(snapshot)
    }

    pub fn consume(
        &self,
        customer_id: CustomerId,
        currency: Currency,
        amount: Money,
        reference: Option<&str>,
    ) -> BillingResult<Wallet> {
        let mut wallets = self.wallets.write().unwrap();
        let wallet = wallets
            .get_mut(&(customer_id, currency))
            .ok_or_else(|| BillingError::not_found("wallet_not_found", "no wallet for this customer and currency"))?;

        if !wallet.has_sufficient_balance(&amount) {
            return Err(BillingError::invalid_operation(
                "insufficient_balance",
                "wallet balance is insufficient for this consumption",
            ));
        }

        wallet.balance -= amount.amount;
        wallet.updated_at = Utc::now();
        let snapshot = wallet.clone();

        self.transactions.write().unwrap().push(CreditTransaction {
            id: uuid::Uuid::new_v4(),
            wallet_id: snapshot.id,
            transaction_type: CreditTransactionType::Consumption,
            amount: -amount.amount,
            balance_after: snapshot.balance,
            idempotency_key: None,
            reference: reference.map(str::to_string),
            created_at: Utc::now(),
        });

        Ok(snapshot)
    }
}

impl Default for WalletManager {
    fn default() -> Self {
        Self::new()
    }
}
