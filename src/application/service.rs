use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::BankConfig;
use crate::domain::{
    Account, AccountId, AccountSubtype, AccountType, AccountUpdate, BUSINESS_ACTIVITY_CODES,
    Cents, Company, CompanyDraft, CompanyId, CreateAccountRequest, CustomerId, CustomerProfile,
    EmployeeId, LimitsUpdate, Transaction, TransactionView, generate_account_number, is_bank_holder,
    merge_account_history, redact_bank_only,
};
use crate::storage::Repository;

use super::{AppError, CardRequest, Collaborators, Notification};

/// Account, company and history operations.
/// This is the primary interface for any client (CLI, API, ...).
pub struct BankService {
    repo: Repository,
    config: BankConfig,
    collaborators: Collaborators,
    rng: Mutex<StdRng>,
}

impl BankService {
    pub fn new(repo: Repository, config: BankConfig, collaborators: Collaborators) -> Self {
        Self {
            repo,
            config,
            collaborators,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the account number generator, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Initialize a new database at the given path, using local collaborators.
    pub async fn init(database_path: &str, config: BankConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        let collaborators = Collaborators::local(&repo, &config);
        Ok(Self::new(repo, config, collaborators))
    }

    /// Connect to an existing database, using local collaborators.
    pub async fn connect(database_path: &str, config: BankConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        let collaborators = Collaborators::local(&repo, &config);
        Ok(Self::new(repo, config, collaborators))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    // ========================
    // Account lifecycle
    // ========================

    /// Open an account for a customer on behalf of a staff member.
    ///
    /// Every check runs before the first write. Card issuance and the
    /// welcome notification happen after the account row is committed and
    /// never fail the call.
    pub async fn create_account(
        &self,
        request: CreateAccountRequest,
        staff: Option<EmployeeId>,
    ) -> Result<Account, AppError> {
        let employee_id = staff.ok_or_else(|| {
            AppError::Unauthorized("accounts can only be opened by staff".to_string())
        })?;
        let owner = self.resolve_customer(request.owner_id).await?;

        if !request
            .account_type
            .accepts(request.currency, self.config.local_currency)
        {
            return Err(AppError::InvalidCombination {
                account_type: request.account_type,
                currency: request.currency,
            });
        }
        for (field, amount) in request.supplied_amounts() {
            ensure_non_negative(field, amount)?;
        }

        let mut account = Account::open(&request, employee_id, Utc::now().timestamp());

        let mut created_company = None;
        if let Some(draft) = request.company_to_bind() {
            let (company, created) = self.bind_company(&owner, draft).await?;
            account.company_id = Some(company.id);
            if created {
                created_company = Some(company.id);
            }
        }

        let account = match self.persist_with_fresh_number(account).await {
            Ok(account) => account,
            Err(err) => {
                if let Some(company_id) = created_company {
                    self.discard_unbound_company(company_id).await;
                }
                return Err(err);
            }
        };
        tracing::info!(
            account_id = %account.id,
            account_number = %account.account_number,
            owner_id = account.owner_id,
            employee_id,
            "account created"
        );

        if request.create_card {
            self.issue_default_card(account.id).await;
        }
        self.spawn_welcome_notification(&owner);

        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    /// Get an account by its account number.
    pub async fn get_account_by_number(&self, number: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_number(number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(number.to_string()))
    }

    /// List every account.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts().await?)
    }

    /// List the accounts a customer holds.
    pub async fn list_accounts_by_owner(
        &self,
        owner_id: CustomerId,
    ) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts_by_owner(owner_id).await?)
    }

    // ========================
    // Account updates
    // ========================

    /// Staff update: limits and status. Absent fields stay as they are.
    pub async fn staff_update_account(
        &self,
        account_id: AccountId,
        update: AccountUpdate,
    ) -> Result<Account, AppError> {
        for (field, amount) in update.limits() {
            ensure_non_negative(field, amount)?;
        }
        let mut account = self.get_account(account_id).await?;

        account.apply_update(&update);
        self.repo.update_account_settings(&account).await?;

        tracing::info!(%account_id, status = %account.status, "account updated by staff");
        Ok(account)
    }

    /// Self-service update: limits only, and only on the caller's own account.
    pub async fn self_update_account(
        &self,
        owner_id: CustomerId,
        account_id: AccountId,
        update: LimitsUpdate,
    ) -> Result<Account, AppError> {
        let mut account = self.get_account(account_id).await?;
        if !account.is_owned_by(owner_id) {
            tracing::warn!(%account_id, customer_id = owner_id, "self-service update refused");
            return Err(AppError::Forbidden {
                customer_id: owner_id,
                account_id,
            });
        }
        for (field, amount) in AccountUpdate::from(update).limits() {
            ensure_non_negative(field, amount)?;
        }

        account.apply_limits(&update);
        self.repo.update_account_settings(&account).await?;

        tracing::info!(%account_id, customer_id = owner_id, "account limits updated");
        Ok(account)
    }

    // ========================
    // Companies
    // ========================

    /// Register a company. An owner, if given, must be a known customer.
    pub async fn create_company(
        &self,
        draft: CompanyDraft,
        owner_id: Option<CustomerId>,
    ) -> Result<Company, AppError> {
        draft.validate().map_err(AppError::InvalidRequest)?;
        if let Some(owner_id) = owner_id {
            self.resolve_customer(owner_id).await?;
        }

        let company = Company::from_draft(draft, owner_id);
        if !self.repo.insert_company(&company).await? {
            return Err(AppError::CompanyAlreadyExists(company.company_number));
        }

        tracing::info!(company_id = %company.id, company_number = %company.company_number, "company created");
        Ok(company)
    }

    /// Get a company by ID.
    pub async fn get_company(&self, id: CompanyId) -> Result<Company, AppError> {
        self.repo
            .get_company(id)
            .await?
            .ok_or_else(|| AppError::CompanyNotFound(id.to_string()))
    }

    /// Find a company by its registered number.
    pub async fn find_company_by_number(&self, number: &str) -> Result<Company, AppError> {
        self.repo
            .get_company_by_number(number)
            .await?
            .ok_or_else(|| AppError::CompanyNotFound(number.to_string()))
    }

    /// List all companies.
    pub async fn list_companies(&self) -> Result<Vec<Company>, AppError> {
        Ok(self.repo.list_companies().await?)
    }

    /// List companies owned by a customer.
    pub async fn list_companies_by_owner(
        &self,
        owner_id: CustomerId,
    ) -> Result<Vec<Company>, AppError> {
        Ok(self.repo.list_companies_by_owner(owner_id).await?)
    }

    /// List the accounts bound to a company.
    pub async fn list_accounts_by_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<Account>, AppError> {
        let company = self.get_company(company_id).await?;
        Ok(self.repo.list_accounts_by_company(company.id).await?)
    }

    /// The catalogue of business activity codes.
    pub fn list_business_activity_codes(&self) -> Vec<String> {
        BUSINESS_ACTIVITY_CODES
            .iter()
            .map(|code| code.to_string())
            .collect()
    }

    // ========================
    // Transaction history
    // ========================

    /// The account's history as its holder may see it.
    pub async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionView>, AppError> {
        let account = self.get_account(account_id).await?;
        self.history_for(&account).await
    }

    /// Same as `list_transactions_for_account`, addressed by account number.
    pub async fn list_transactions_for_account_number(
        &self,
        number: &str,
    ) -> Result<Vec<TransactionView>, AppError> {
        let account = self.get_account_by_number(number).await?;
        self.history_for(&account).await
    }

    async fn history_for(&self, account: &Account) -> Result<Vec<TransactionView>, AppError> {
        let sent = self.repo.list_transactions_from(account.id).await?;
        let received = self.repo.list_transactions_to(account.id).await?;
        let merged = merge_account_history(account.id, sent, received);

        let clearing = self.resolve_clearing_account().await?;
        let bank_holder = is_bank_holder(account, clearing.as_ref());
        let total = merged.len();
        let visible = redact_bank_only(merged, bank_holder);
        tracing::debug!(
            account_id = %account.id,
            bank_holder,
            total,
            hidden = total - visible.len(),
            "history assembled"
        );

        let mut owners: HashMap<AccountId, CustomerId> = HashMap::from([(account.id, account.owner_id)]);
        let mut names: HashMap<CustomerId, String> = HashMap::new();
        let mut views = Vec::with_capacity(visible.len());
        for transaction in visible {
            let sender_name = self
                .display_name_for(transaction.from_account, &mut owners, &mut names)
                .await?;
            let receiver_name = self
                .display_name_for(transaction.to_account, &mut owners, &mut names)
                .await?;
            views.push(TransactionView {
                transaction,
                sender_name,
                receiver_name,
            });
        }
        Ok(views)
    }

    async fn display_name_for(
        &self,
        account_id: AccountId,
        owners: &mut HashMap<AccountId, CustomerId>,
        names: &mut HashMap<CustomerId, String>,
    ) -> Result<String, AppError> {
        let owner_id = match owners.get(&account_id) {
            Some(owner_id) => *owner_id,
            None => {
                let account = self.get_account(account_id).await?;
                owners.insert(account_id, account.owner_id);
                account.owner_id
            }
        };
        if let Some(name) = names.get(&owner_id) {
            return Ok(name.clone());
        }

        let name = self.resolve_customer(owner_id).await?.display_name();
        names.insert(owner_id, name.clone());
        Ok(name)
    }

    // ========================
    // Local directory and ledger
    // ========================

    /// Add or refresh a customer in the local directory snapshot.
    pub async fn register_customer(&self, customer: CustomerProfile) -> Result<CustomerProfile, AppError> {
        if customer.first_name.trim().is_empty() || customer.last_name.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "customer name must not be empty".to_string(),
            ));
        }
        self.repo.save_customer(&customer).await?;
        tracing::info!(customer_id = customer.id, "customer registered");
        Ok(customer)
    }

    pub async fn list_customers(&self) -> Result<Vec<CustomerProfile>, AppError> {
        Ok(self.repo.list_customers().await?)
    }

    /// Load a ledger entry produced elsewhere. Both ends must be known accounts.
    pub async fn record_transaction(&self, transaction: Transaction) -> Result<Transaction, AppError> {
        if transaction.amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "transaction amount must be positive".to_string(),
            ));
        }
        self.get_account(transaction.from_account).await?;
        self.get_account(transaction.to_account).await?;

        self.repo.save_transaction(&transaction).await?;
        tracing::debug!(
            transaction_id = %transaction.id,
            bank_only = transaction.bank_only,
            "ledger entry recorded"
        );
        Ok(transaction)
    }

    // ========================
    // Collaborator calls
    // ========================

    /// Look a customer up, bounded by the lookup timeout. A slow or failing
    /// directory is an error here, not a warning.
    async fn resolve_customer(&self, id: CustomerId) -> Result<CustomerProfile, AppError> {
        let lookup = self.collaborators.customers.resolve_customer(id);
        match timeout(self.config.lookup_timeout(), lookup).await {
            Ok(Ok(Some(customer))) => Ok(customer),
            Ok(Ok(None)) => Err(AppError::CustomerNotFound(id)),
            Ok(Err(err)) => Err(AppError::CollaboratorUnavailable(format!(
                "customer directory failed for {}: {:#}",
                id, err
            ))),
            Err(_) => Err(AppError::CollaboratorUnavailable(format!(
                "customer directory timed out after {}ms for {}",
                self.config.lookup_timeout_ms, id
            ))),
        }
    }

    async fn resolve_clearing_account(&self) -> Result<Option<Account>, AppError> {
        let currency = self.config.local_currency;
        self.collaborators
            .clearing
            .resolve_clearing_account(currency)
            .await
            .map_err(|err| {
                AppError::CollaboratorUnavailable(format!(
                    "clearing account lookup failed for {}: {:#}",
                    currency, err
                ))
            })
    }

    /// Find or create the company and check that `owner` may bind to it.
    /// Only a new company needs the full draft. A lost insert race falls
    /// back to the existing record. The flag is true when this call
    /// created the company.
    async fn bind_company(
        &self,
        owner: &CustomerProfile,
        draft: &CompanyDraft,
    ) -> Result<(Company, bool), AppError> {
        if let Some(existing) = self.repo.get_company_by_number(&draft.company_number).await? {
            existing.check_binding(Some(owner.id))?;
            tracing::debug!(company_id = %existing.id, "binding to existing company");
            return Ok((existing, false));
        }

        draft.validate().map_err(AppError::InvalidRequest)?;
        let candidate = Company::from_draft(draft.clone(), Some(owner.id));
        let company = self.repo.insert_or_get_company(&candidate).await?;
        if company.id != candidate.id {
            tracing::debug!(
                company_id = %company.id,
                "company number taken concurrently, binding to stored record"
            );
            company.check_binding(Some(owner.id))?;
            return Ok((company, false));
        }

        tracing::info!(
            company_id = %company.id,
            company_number = %company.company_number,
            owner_id = owner.id,
            "company created for business account"
        );
        Ok((company, true))
    }

    /// Remove a company created for an account that was never stored.
    async fn discard_unbound_company(&self, company_id: CompanyId) {
        match self.repo.delete_company_if_unused(company_id).await {
            Ok(true) => tracing::debug!(%company_id, "discarded company of failed account"),
            Ok(false) => {}
            Err(err) => tracing::warn!(
                %company_id,
                error = %err,
                "could not discard company of failed account"
            ),
        }
    }

    /// Draw account numbers until one is free, up to the configured limit.
    async fn persist_with_fresh_number(&self, mut account: Account) -> Result<Account, AppError> {
        let attempts = self.config.account_number_attempts;
        for attempt in 1..=attempts {
            account.account_number = self
                .next_account_number(account.account_type, account.subtype)
                .await;
            if self.repo.insert_account(&account).await? {
                return Ok(account);
            }
            tracing::warn!(
                attempt,
                account_number = %account.account_number,
                "account number already taken"
            );
        }
        Err(AppError::AccountNumberExhausted(attempts))
    }

    async fn next_account_number(&self, account_type: AccountType, subtype: AccountSubtype) -> String {
        let mut rng = self.rng.lock().await;
        generate_account_number(&mut *rng, account_type, subtype)
    }

    async fn issue_default_card(&self, account_id: AccountId) {
        let request = CardRequest::default_for(account_id);
        let issue = self.collaborators.cards.issue_card(request);
        match timeout(self.config.side_effect_timeout(), issue).await {
            Ok(Ok(card)) => {
                tracing::info!(%account_id, card_id = %card.id, "card issued");
            }
            Ok(Err(err)) => {
                tracing::warn!(%account_id, error = %err, "card issuance failed");
            }
            Err(_) => {
                tracing::warn!(%account_id, "card issuance timed out");
            }
        }
    }

    fn spawn_welcome_notification(&self, owner: &CustomerProfile) {
        let template = &self.config.notification;
        let notification = Notification::email_to(owner, &template.subject, &template.message);
        let notifier = Arc::clone(&self.collaborators.notifier);
        let limit = self.config.side_effect_timeout();

        tokio::spawn(async move {
            let email = notification.email.clone();
            match timeout(limit, notifier.dispatch(notification)).await {
                Ok(Ok(())) => tracing::debug!(%email, "welcome notification dispatched"),
                Ok(Err(err)) => {
                    tracing::warn!(%email, error = %err, "welcome notification failed")
                }
                Err(_) => tracing::warn!(%email, "welcome notification timed out"),
            }
        });
    }
}

fn ensure_non_negative(field: &str, amount: Cents) -> Result<(), AppError> {
    if amount < 0 {
        return Err(AppError::InvalidAmount(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}
