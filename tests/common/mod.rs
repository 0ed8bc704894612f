// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bankbook::application::{
    BankService, Card, CardIssuer, CardRequest, Collaborators, ConfiguredClearingAccounts,
    CustomerDirectory, Notification, Notifier,
};
use bankbook::config::BankConfig;
use bankbook::domain::{
    Account, AccountSubtype, AccountType, CreateAccountRequest, Currency, CustomerId,
    CustomerProfile,
};
use bankbook::storage::Repository;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const BANK_ID: CustomerId = 1;
pub const ANA_ID: CustomerId = 7;
pub const MARKO_ID: CustomerId = 8;
pub const STAFF_ID: i64 = 42;
pub const CLEARING_NUMBER: &str = "111000100000000017";
pub const SEED: u64 = 20_240_301;

/// Helper to create a service over a temporary database with the local adapters
pub async fn test_service() -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = BankService::init(db_path.to_str().unwrap(), BankConfig::default()).await?;
    Ok((service, temp_dir))
}

/// In-memory customer directory, optionally slow.
#[derive(Default)]
pub struct InMemoryDirectory {
    customers: Mutex<HashMap<CustomerId, CustomerProfile>>,
    delay: Option<Duration>,
}

impl InMemoryDirectory {
    pub fn with_standard_customers() -> Self {
        let directory = Self::default();
        directory.insert(CustomerProfile::new(ANA_ID, "Ana", "Petrović", "ana@example.com"));
        directory.insert(CustomerProfile::new(
            MARKO_ID,
            "Marko",
            "Jovanović",
            "marko@example.com",
        ));
        directory
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, customer: CustomerProfile) {
        self.customers.lock().unwrap().insert(customer.id, customer);
    }

    pub fn remove(&self, id: CustomerId) {
        self.customers.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryDirectory {
    async fn resolve_customer(&self, id: CustomerId) -> Result<Option<CustomerProfile>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.customers.lock().unwrap().get(&id).cloned())
    }
}

/// Card issuer that records every request and can be told to fail.
#[derive(Default)]
pub struct RecordingCardIssuer {
    requests: Mutex<Vec<CardRequest>>,
    failing: bool,
}

impl RecordingCardIssuer {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<CardRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CardIssuer for RecordingCardIssuer {
    async fn issue_card(&self, request: CardRequest) -> Result<Card> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing {
            return Err(anyhow!("card system unavailable"));
        }
        Ok(Card {
            id: Uuid::new_v4(),
            account_id: request.account_id,
            brand: request.brand,
            card_type: request.card_type,
        })
    }
}

/// Notifier that forwards every notification to a channel.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        self.tx
            .send(notification)
            .map_err(|_| anyhow!("notification receiver dropped"))
    }
}

/// A service wired to recording fakes, with the bank's RSD clearing
/// account already in storage.
pub struct TestBank {
    pub service: BankService,
    pub directory: Arc<InMemoryDirectory>,
    pub cards: Arc<RecordingCardIssuer>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    pub clearing: Account,
    _temp: TempDir,
}

impl TestBank {
    pub async fn new() -> Result<Self> {
        Self::build(
            BankConfig::default(),
            InMemoryDirectory::with_standard_customers(),
            RecordingCardIssuer::default(),
        )
        .await
    }

    pub async fn build(
        config: BankConfig,
        directory: InMemoryDirectory,
        cards: RecordingCardIssuer,
    ) -> Result<Self> {
        let temp = TempDir::new()?;
        let db_path = temp.path().join("test.db");
        let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;
        Self::build_on(repo, config, directory, cards, temp).await
    }

    /// Build on an existing repository, e.g. to share storage between services.
    pub async fn build_on(
        repo: Repository,
        config: BankConfig,
        directory: InMemoryDirectory,
        cards: RecordingCardIssuer,
        temp: TempDir,
    ) -> Result<Self> {
        directory.insert(CustomerProfile::new(BANK_ID, "Banka", "Kliring", "bank@example.com"));
        let clearing = match repo.get_account_by_number(CLEARING_NUMBER).await? {
            Some(existing) => existing,
            None => {
                let account = clearing_account();
                repo.insert_account(&account).await?;
                account
            }
        };

        let config = config.with_clearing_account(Currency::Rsd, CLEARING_NUMBER);
        let directory = Arc::new(directory);
        let cards = Arc::new(cards);
        let (tx, notifications) = mpsc::unbounded_channel();
        let collaborators = Collaborators {
            customers: directory.clone(),
            cards: cards.clone(),
            notifier: Arc::new(ChannelNotifier { tx }),
            clearing: Arc::new(ConfiguredClearingAccounts::new(
                repo.clone(),
                config.clearing_accounts.clone(),
            )),
        };
        let service =
            BankService::new(repo, config, collaborators).with_rng(StdRng::seed_from_u64(SEED));

        Ok(Self {
            service,
            directory,
            cards,
            notifications,
            clearing,
            _temp: temp,
        })
    }

    /// Wait for the next welcome notification.
    pub async fn next_notification(&mut self) -> Result<Notification> {
        tokio::time::timeout(Duration::from_secs(2), self.notifications.recv())
            .await?
            .ok_or_else(|| anyhow!("notification channel closed"))
    }

    /// Open an RSD personal current account for `owner`.
    pub async fn open_personal(&self, owner: CustomerId) -> Result<Account> {
        Ok(self
            .service
            .create_account(personal_request(owner), Some(STAFF_ID))
            .await?)
    }
}

pub fn personal_request(owner: CustomerId) -> CreateAccountRequest {
    CreateAccountRequest::new(owner, AccountType::Current, AccountSubtype::Personal, Currency::Rsd)
}

pub fn business_request(owner: CustomerId) -> CreateAccountRequest {
    CreateAccountRequest::new(owner, AccountType::Current, AccountSubtype::Business, Currency::Rsd)
}

fn clearing_account() -> Account {
    let request =
        CreateAccountRequest::new(BANK_ID, AccountType::Current, AccountSubtype::Standard, Currency::Rsd);
    Account::open(&request, 0, 0).with_account_number(CLEARING_NUMBER)
}
