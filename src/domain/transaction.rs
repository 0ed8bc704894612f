use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents, Currency};

pub type TransactionId = Uuid;
/// Groups the ledger rows that make up one customer-initiated movement.
pub type TransferId = Uuid;

/// A single directional ledger entry. Both ends are always accounts:
/// external counterparties go through the bank's clearing account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Debited account
    pub from_account: AccountId,
    /// Credited account
    pub to_account: AccountId,
    pub amount_cents: Cents,
    pub currency: Currency,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub transfer_id: TransferId,
    /// Set when the movement is a loan installment
    pub loan_id: Option<i64>,
    /// Internal bookkeeping, hidden from customers
    pub bank_only: bool,
}

impl Transaction {
    pub fn new(
        from_account: AccountId,
        to_account: AccountId,
        amount_cents: Cents,
        currency: Currency,
        transfer_id: TransferId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account,
            to_account,
            amount_cents,
            currency,
            timestamp: Utc::now(),
            description: None,
            transfer_id,
            loan_id: None,
            bank_only: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_loan(mut self, loan_id: i64) -> Self {
        self.loan_id = Some(loan_id);
        self
    }

    pub fn bank_only(mut self) -> Self {
        self.bank_only = true;
        self
    }

    pub fn is_self_transfer(&self) -> bool {
        self.from_account == self.to_account
    }
}

/// A ledger entry as shown in an account's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub sender_name: String,
    pub receiver_name: String,
}
