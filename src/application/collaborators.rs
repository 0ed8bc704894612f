//! Interfaces to the systems account services depend on but do not own:
//! the customer directory, card issuance, notification delivery and the
//! lookup of the bank's own clearing accounts.
//!
//! The local adapters at the bottom let the CLI run against a single
//! SQLite file with nothing else wired in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BankConfig;
use crate::domain::{Account, AccountId, Currency, CustomerId, CustomerProfile};
use crate::storage::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Dinacard,
    AmericanExpress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Debit,
    Credit,
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Dinacard => "dinacard",
            CardBrand::AmericanExpress => "american_express",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CardType::Debit => "debit",
            CardType::Credit => "credit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRequest {
    pub account_id: AccountId,
    pub brand: CardBrand,
    pub card_type: CardType,
    pub authorized_person: Option<String>,
}

impl CardRequest {
    /// The card every new account gets when one is requested at opening.
    pub fn default_for(account_id: AccountId) -> Self {
        Self {
            account_id,
            brand: CardBrand::Visa,
            card_type: CardType::Credit,
            authorized_person: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub account_id: AccountId,
    pub brand: CardBrand,
    pub card_type: CardType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub email: String,
    pub subject: String,
    pub message: String,
    pub first_name: String,
    pub last_name: String,
    /// Delivery channel
    pub kind: String,
}

impl Notification {
    pub fn email_to(customer: &CustomerProfile, subject: &str, message: &str) -> Self {
        Self {
            email: customer.email.clone(),
            subject: subject.to_string(),
            message: message.to_string(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            kind: "email".to_string(),
        }
    }
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// `Ok(None)` when the directory has no such customer.
    async fn resolve_customer(&self, id: CustomerId) -> Result<Option<CustomerProfile>>;
}

#[async_trait]
pub trait CardIssuer: Send + Sync {
    async fn issue_card(&self, request: CardRequest) -> Result<Card>;
}

/// Best-effort, at-least-once delivery. Callers never wait on the outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<()>;
}

#[async_trait]
pub trait ClearingAccountResolver: Send + Sync {
    /// The bank's own account for `currency`, if one is set up.
    async fn resolve_clearing_account(&self, currency: Currency) -> Result<Option<Account>>;
}

/// Everything `BankService` delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub customers: Arc<dyn CustomerDirectory>,
    pub cards: Arc<dyn CardIssuer>,
    pub notifier: Arc<dyn Notifier>,
    pub clearing: Arc<dyn ClearingAccountResolver>,
}

impl Collaborators {
    /// Adapters backed by the local database and the log.
    pub fn local(repo: &Repository, config: &BankConfig) -> Self {
        Self {
            customers: Arc::new(repo.clone()),
            cards: Arc::new(LoggingCardIssuer),
            notifier: Arc::new(LoggingNotifier),
            clearing: Arc::new(ConfiguredClearingAccounts::new(
                repo.clone(),
                config.clearing_accounts.clone(),
            )),
        }
    }
}

// ========================
// Local adapters
// ========================

#[async_trait]
impl CustomerDirectory for Repository {
    async fn resolve_customer(&self, id: CustomerId) -> Result<Option<CustomerProfile>> {
        self.get_customer(id).await
    }
}

/// Resolves clearing accounts from the configured account numbers.
pub struct ConfiguredClearingAccounts {
    repo: Repository,
    numbers: BTreeMap<Currency, String>,
}

impl ConfiguredClearingAccounts {
    pub fn new(repo: Repository, numbers: BTreeMap<Currency, String>) -> Self {
        Self { repo, numbers }
    }
}

#[async_trait]
impl ClearingAccountResolver for ConfiguredClearingAccounts {
    async fn resolve_clearing_account(&self, currency: Currency) -> Result<Option<Account>> {
        match self.numbers.get(&currency) {
            Some(number) => self.repo.get_account_by_number(number).await,
            None => Ok(None),
        }
    }
}

/// Records card requests in the log instead of calling a card system.
pub struct LoggingCardIssuer;

#[async_trait]
impl CardIssuer for LoggingCardIssuer {
    async fn issue_card(&self, request: CardRequest) -> Result<Card> {
        tracing::info!(
            account_id = %request.account_id,
            brand = %request.brand,
            card_type = %request.card_type,
            "card requested"
        );
        Ok(Card {
            id: Uuid::new_v4(),
            account_id: request.account_id,
            brand: request.brand,
            card_type: request.card_type,
        })
    }
}

/// Records notifications in the log instead of delivering them.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        tracing::info!(
            email = %notification.email,
            subject = %notification.subject,
            kind = %notification.kind,
            "notification queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_card_request() {
        let account_id = Uuid::new_v4();
        let request = CardRequest::default_for(account_id);

        assert_eq!(request.account_id, account_id);
        assert_eq!(request.brand, CardBrand::Visa);
        assert_eq!(request.card_type, CardType::Credit);
        assert_eq!(request.authorized_person, None);
    }

    #[test]
    fn test_notification_addresses_customer() {
        let customer = CustomerProfile::new(9, "Ana", "Petrović", "ana@example.com");
        let notification = Notification::email_to(&customer, "Hello", "Body");

        assert_eq!(notification.email, "ana@example.com");
        assert_eq!(notification.first_name, "Ana");
        assert_eq!(notification.last_name, "Petrović");
        assert_eq!(notification.kind, "email");
    }

    #[tokio::test]
    async fn test_logging_adapters_succeed() {
        let card = LoggingCardIssuer
            .issue_card(CardRequest::default_for(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(card.brand, CardBrand::Visa);

        let customer = CustomerProfile::new(1, "A", "B", "a@b.c");
        LoggingNotifier
            .dispatch(Notification::email_to(&customer, "s", "m"))
            .await
            .unwrap();
    }
}
