use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountStatus, AccountSubtype, AccountType, Company, CompanyId, Currency,
    CustomerId, CustomerProfile, Transaction,
};

use super::{MIGRATION_001_ACCOUNTS, MIGRATION_002_TRANSACTIONS, MIGRATION_003_CUSTOMERS};

const ACCOUNT_COLUMNS: &str = "id, owner_id, company_id, account_type, subtype, currency, account_number, balance, reserved_balance, daily_limit, monthly_limit, daily_spent, monthly_spent, monthly_maintenance_fee, status, created_date, expiration_date, employee_id";

const COMPANY_COLUMNS: &str =
    "id, company_number, name, registration_number, tax_id, activity_code, address, owner_id";

const TRANSACTION_COLUMNS: &str = "id, from_account_id, to_account_id, amount_cents, currency, timestamp, description, transfer_id, loan_id, bank_only";

/// Repository for accounts, companies, the shared transaction ledger and
/// the local customer directory.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        for (name, sql) in [
            ("001", MIGRATION_001_ACCOUNTS),
            ("002", MIGRATION_002_TRANSACTIONS),
            ("003", MIGRATION_003_CUSTOMERS),
        ] {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run migration {}", name))?;
        }
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account. Returns `false` without writing anything when
    /// the account number is already taken.
    pub async fn insert_account(&self, account: &Account) -> Result<bool> {
        let query = format!(
            "INSERT INTO accounts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT(account_number) DO NOTHING",
            ACCOUNT_COLUMNS
        );
        let result = sqlx::query(&query)
            .bind(account.id.to_string())
            .bind(account.owner_id)
            .bind(account.company_id.map(|id| id.to_string()))
            .bind(account.account_type.as_str())
            .bind(account.subtype.as_str())
            .bind(account.currency.as_str())
            .bind(&account.account_number)
            .bind(account.balance)
            .bind(account.reserved_balance)
            .bind(account.daily_limit)
            .bind(account.monthly_limit)
            .bind(account.daily_spent)
            .bind(account.monthly_spent)
            .bind(account.monthly_maintenance_fee)
            .bind(account.status.as_str())
            .bind(account.created_date)
            .bind(account.expiration_date)
            .bind(account.employee_id)
            .execute(&self.pool)
            .await
            .context("Failed to save account")?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the fields the update operations may change.
    pub async fn update_account_settings(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET daily_limit = ?, monthly_limit = ?, status = ? WHERE id = ?",
        )
        .bind(account.daily_limit)
        .bind(account.monthly_limit)
        .bind(account.status.as_str())
        .bind(account.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update account")?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let query = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Get an account by its account number.
    pub async fn get_account_by_number(&self, account_number: &str) -> Result<Option<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE account_number = ?",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(account_number)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account by number")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List every account, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let query = format!(
            "SELECT {} FROM accounts ORDER BY created_date, rowid",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// List accounts held by a customer.
    pub async fn list_accounts_by_owner(&self, owner_id: CustomerId) -> Result<Vec<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE owner_id = ? ORDER BY created_date, rowid",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts by owner")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// List accounts bound to a company.
    pub async fn list_accounts_by_company(&self, company_id: CompanyId) -> Result<Vec<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE company_id = ? ORDER BY created_date, rowid",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(company_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts by company")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let company_id_str: Option<String> = row.get("company_id");
        let account_type_str: String = row.get("account_type");
        let subtype_str: String = row.get("subtype");
        let currency_str: String = row.get("currency");
        let status_str: String = row.get("status");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            owner_id: row.get("owner_id"),
            company_id: company_id_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid company ID")?,
            account_type: account_type_str
                .parse::<AccountType>()
                .map_err(anyhow::Error::msg)?,
            subtype: subtype_str
                .parse::<AccountSubtype>()
                .map_err(anyhow::Error::msg)?,
            currency: currency_str.parse::<Currency>().map_err(anyhow::Error::msg)?,
            account_number: row.get("account_number"),
            balance: row.get("balance"),
            reserved_balance: row.get("reserved_balance"),
            daily_limit: row.get("daily_limit"),
            monthly_limit: row.get("monthly_limit"),
            daily_spent: row.get("daily_spent"),
            monthly_spent: row.get("monthly_spent"),
            monthly_maintenance_fee: row.get("monthly_maintenance_fee"),
            status: status_str
                .parse::<AccountStatus>()
                .map_err(anyhow::Error::msg)?,
            created_date: row.get("created_date"),
            expiration_date: row.get("expiration_date"),
            employee_id: row.get("employee_id"),
        })
    }

    // ========================
    // Company operations
    // ========================

    /// Insert a new company. Returns `false` without writing anything when
    /// the company number is already registered.
    pub async fn insert_company(&self, company: &Company) -> Result<bool> {
        let query = format!(
            "INSERT INTO companies ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT(company_number) DO NOTHING",
            COMPANY_COLUMNS
        );
        let result = sqlx::query(&query)
            .bind(company.id.to_string())
            .bind(&company.company_number)
            .bind(&company.name)
            .bind(&company.registration_number)
            .bind(&company.tax_id)
            .bind(&company.activity_code)
            .bind(&company.address)
            .bind(company.owner_id)
            .execute(&self.pool)
            .await
            .context("Failed to save company")?;

        Ok(result.rows_affected() == 1)
    }

    /// Insert a company unless its number is taken, then return whichever
    /// record holds that number.
    pub async fn insert_or_get_company(&self, company: &Company) -> Result<Company> {
        self.insert_company(company).await?;
        self.get_company_by_number(&company.company_number)
            .await?
            .with_context(|| format!("Company {} missing after insert", company.company_number))
    }

    /// Delete a company no account is bound to. Returns false when it is
    /// still referenced or already gone.
    pub async fn delete_company_if_unused(&self, id: CompanyId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM companies WHERE id = ? AND NOT EXISTS (SELECT 1 FROM accounts WHERE company_id = ?)",
        )
        .bind(id.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to delete company")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a company by ID.
    pub async fn get_company(&self, id: CompanyId) -> Result<Option<Company>> {
        let query = format!("SELECT {} FROM companies WHERE id = ?", COMPANY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch company")?;

        row.as_ref().map(Self::row_to_company).transpose()
    }

    /// Get a company by its registered company number.
    pub async fn get_company_by_number(&self, company_number: &str) -> Result<Option<Company>> {
        let query = format!(
            "SELECT {} FROM companies WHERE company_number = ?",
            COMPANY_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(company_number)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch company by number")?;

        row.as_ref().map(Self::row_to_company).transpose()
    }

    /// List all companies by name.
    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        let query = format!("SELECT {} FROM companies ORDER BY name", COMPANY_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list companies")?;

        rows.iter().map(Self::row_to_company).collect()
    }

    /// List companies owned by a customer.
    pub async fn list_companies_by_owner(&self, owner_id: CustomerId) -> Result<Vec<Company>> {
        let query = format!(
            "SELECT {} FROM companies WHERE owner_id = ? ORDER BY name",
            COMPANY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list companies by owner")?;

        rows.iter().map(Self::row_to_company).collect()
    }

    fn row_to_company(row: &sqlx::sqlite::SqliteRow) -> Result<Company> {
        let id_str: String = row.get("id");

        Ok(Company {
            id: Uuid::parse_str(&id_str).context("Invalid company ID")?,
            company_number: row.get("company_number"),
            name: row.get("name"),
            registration_number: row.get("registration_number"),
            tax_id: row.get("tax_id"),
            activity_code: row.get("activity_code"),
            address: row.get("address"),
            owner_id: row.get("owner_id"),
        })
    }

    // ========================
    // Ledger operations
    // ========================

    /// Append a ledger entry. The ledger is written by the transfer
    /// subsystem; account services only read it.
    pub async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        let query = format!(
            "INSERT INTO transactions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TRANSACTION_COLUMNS
        );
        sqlx::query(&query)
            .bind(transaction.id.to_string())
            .bind(transaction.from_account.to_string())
            .bind(transaction.to_account.to_string())
            .bind(transaction.amount_cents)
            .bind(transaction.currency.as_str())
            .bind(transaction.timestamp.to_rfc3339())
            .bind(&transaction.description)
            .bind(transaction.transfer_id.to_string())
            .bind(transaction.loan_id)
            .bind(transaction.bank_only)
            .execute(&self.pool)
            .await
            .context("Failed to save transaction")?;
        Ok(())
    }

    /// Transactions debiting an account, in ledger order.
    pub async fn list_transactions_from(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {} FROM transactions WHERE from_account_id = ? ORDER BY timestamp, rowid",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(account_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list sent transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Transactions crediting an account, in ledger order.
    pub async fn list_transactions_to(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {} FROM transactions WHERE to_account_id = ? ORDER BY timestamp, rowid",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(account_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list received transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let from_str: String = row.get("from_account_id");
        let to_str: String = row.get("to_account_id");
        let currency_str: String = row.get("currency");
        let timestamp_str: String = row.get("timestamp");
        let transfer_str: String = row.get("transfer_id");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            from_account: Uuid::parse_str(&from_str).context("Invalid from_account ID")?,
            to_account: Uuid::parse_str(&to_str).context("Invalid to_account ID")?,
            amount_cents: row.get("amount_cents"),
            currency: currency_str.parse::<Currency>().map_err(anyhow::Error::msg)?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
            description: row.get("description"),
            transfer_id: Uuid::parse_str(&transfer_str).context("Invalid transfer ID")?,
            loan_id: row.get("loan_id"),
            bank_only: row.get::<i32, _>("bank_only") != 0,
        })
    }

    // ========================
    // Customer directory
    // ========================

    /// Insert or replace a customer in the local directory.
    pub async fn save_customer(&self, customer: &CustomerProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, first_name, last_name, email)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email
            "#,
        )
        .bind(customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .execute(&self.pool)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    /// Get a customer from the local directory.
    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<CustomerProfile>> {
        let row = sqlx::query("SELECT id, first_name, last_name, email FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch customer")?;

        Ok(row.map(|row| Self::row_to_customer(&row)))
    }

    /// List the local directory by id.
    pub async fn list_customers(&self) -> Result<Vec<CustomerProfile>> {
        let rows =
            sqlx::query("SELECT id, first_name, last_name, email FROM customers ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .context("Failed to list customers")?;

        Ok(rows.iter().map(Self::row_to_customer).collect())
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> CustomerProfile {
        CustomerProfile {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
        }
    }
}
