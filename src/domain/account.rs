use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, CompanyDraft, CompanyId, Currency, DEFAULT_RESERVED_BALANCE};

pub type AccountId = Uuid;
/// Customer identity as issued by the customer directory.
pub type CustomerId = i64;
/// Staff identity as issued by the employee directory.
pub type EmployeeId = i64;

/// Accounts expire four years (of 365 days) after they are opened.
pub const ACCOUNT_VALIDITY_SECS: i64 = 4 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Held in the bank's local currency
    Current,
    /// Held in any currency other than the local one
    ForeignCurrency,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Current => "current",
            AccountType::ForeignCurrency => "foreign_currency",
        }
    }

    /// Digit encoding the type in the account number.
    pub fn digit(&self) -> char {
        match self {
            AccountType::Current => '1',
            AccountType::ForeignCurrency => '2',
        }
    }

    /// Whether an account of this type may be held in `currency`
    /// when the bank's local currency is `local`.
    pub fn accepts(&self, currency: Currency, local: Currency) -> bool {
        match self {
            AccountType::Current => currency == local,
            AccountType::ForeignCurrency => currency != local,
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "current" => Ok(AccountType::Current),
            "foreign_currency" | "foreign" => Ok(AccountType::ForeignCurrency),
            other => Err(format!("unknown account type '{}'", other)),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountSubtype {
    Personal,
    Business,
    Savings,
    Pension,
    Youth,
    Student,
    Standard,
}

impl AccountSubtype {
    pub const ALL: [AccountSubtype; 7] = [
        AccountSubtype::Personal,
        AccountSubtype::Business,
        AccountSubtype::Savings,
        AccountSubtype::Pension,
        AccountSubtype::Youth,
        AccountSubtype::Student,
        AccountSubtype::Standard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountSubtype::Personal => "personal",
            AccountSubtype::Business => "business",
            AccountSubtype::Savings => "savings",
            AccountSubtype::Pension => "pension",
            AccountSubtype::Youth => "youth",
            AccountSubtype::Student => "student",
            AccountSubtype::Standard => "standard",
        }
    }

    /// Digit encoding the subtype in the account number (Personal = 1 .. Standard = 7).
    pub fn digit(&self) -> char {
        match self {
            AccountSubtype::Personal => '1',
            AccountSubtype::Business => '2',
            AccountSubtype::Savings => '3',
            AccountSubtype::Pension => '4',
            AccountSubtype::Youth => '5',
            AccountSubtype::Student => '6',
            AccountSubtype::Standard => '7',
        }
    }
}

impl FromStr for AccountSubtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        AccountSubtype::ALL
            .into_iter()
            .find(|st| st.as_str() == lower)
            .ok_or_else(|| format!("unknown account subtype '{}'", s))
    }
}

impl fmt::Display for AccountSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Blocked,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Blocked => "blocked",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "blocked" => Ok(AccountStatus::Blocked),
            other => Err(format!("unknown account status '{}'", other)),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: CustomerId,
    pub company_id: Option<CompanyId>,
    pub account_type: AccountType,
    pub subtype: AccountSubtype,
    pub currency: Currency,
    /// 18-digit number, assigned once before the account is persisted
    pub account_number: String,
    pub balance: Cents,
    pub reserved_balance: Cents,
    pub daily_limit: Cents,
    pub monthly_limit: Cents,
    pub daily_spent: Cents,
    pub monthly_spent: Cents,
    pub monthly_maintenance_fee: Cents,
    pub status: AccountStatus,
    /// Epoch seconds
    pub created_date: i64,
    /// Epoch seconds, always `created_date + ACCOUNT_VALIDITY_SECS`
    pub expiration_date: i64,
    pub employee_id: EmployeeId,
}

impl Account {
    /// Open a new account from a creation request.
    ///
    /// Money fields the caller supplied are kept (or zero); the reserved
    /// balance, spent counters, maintenance fee and validity window are
    /// always reset to their opening values. The account number is left
    /// empty and must be assigned before the account is saved.
    pub fn open(request: &CreateAccountRequest, employee_id: EmployeeId, created_date: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            company_id: None,
            account_type: request.account_type,
            subtype: request.subtype,
            currency: request.currency,
            account_number: String::new(),
            balance: request.balance.unwrap_or(0),
            reserved_balance: DEFAULT_RESERVED_BALANCE,
            daily_limit: request.daily_limit.unwrap_or(0),
            monthly_limit: request.monthly_limit.unwrap_or(0),
            daily_spent: 0,
            monthly_spent: 0,
            monthly_maintenance_fee: 0,
            status: request.status.unwrap_or_default(),
            created_date,
            expiration_date: created_date + ACCOUNT_VALIDITY_SECS,
            employee_id,
        }
    }

    pub fn with_account_number(mut self, account_number: impl Into<String>) -> Self {
        self.account_number = account_number.into();
        self
    }

    pub fn is_owned_by(&self, customer_id: CustomerId) -> bool {
        self.owner_id == customer_id
    }

    /// Apply a staff update. Fields left as `None` are untouched.
    pub fn apply_update(&mut self, update: &AccountUpdate) {
        if let Some(daily_limit) = update.daily_limit {
            self.daily_limit = daily_limit;
        }
        if let Some(monthly_limit) = update.monthly_limit {
            self.monthly_limit = monthly_limit;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }

    /// Apply a self-service update. Status can't be reached from here.
    pub fn apply_limits(&mut self, update: &LimitsUpdate) {
        self.apply_update(&AccountUpdate::from(*update));
    }
}

/// Input for opening an account.
#[derive(Debug, Clone)]
pub struct CreateAccountRequest {
    pub owner_id: CustomerId,
    pub currency: Currency,
    pub account_type: AccountType,
    pub subtype: AccountSubtype,
    pub balance: Option<Cents>,
    pub daily_limit: Option<Cents>,
    pub monthly_limit: Option<Cents>,
    pub status: Option<AccountStatus>,
    pub create_card: bool,
    /// Only read for business accounts
    pub company: Option<CompanyDraft>,
}

impl CreateAccountRequest {
    pub fn new(
        owner_id: CustomerId,
        account_type: AccountType,
        subtype: AccountSubtype,
        currency: Currency,
    ) -> Self {
        Self {
            owner_id,
            currency,
            account_type,
            subtype,
            balance: None,
            daily_limit: None,
            monthly_limit: None,
            status: None,
            create_card: false,
            company: None,
        }
    }

    pub fn with_balance(mut self, balance: Cents) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_limits(mut self, daily: Cents, monthly: Cents) -> Self {
        self.daily_limit = Some(daily);
        self.monthly_limit = Some(monthly);
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_card(mut self) -> Self {
        self.create_card = true;
        self
    }

    pub fn with_company(mut self, company: CompanyDraft) -> Self {
        self.company = Some(company);
        self
    }

    /// Company data that should be bound, if any.
    pub fn company_to_bind(&self) -> Option<&CompanyDraft> {
        match self.subtype {
            AccountSubtype::Business => self.company.as_ref(),
            _ => None,
        }
    }

    /// Money fields supplied by the caller, for sign checks.
    pub fn supplied_amounts(&self) -> impl Iterator<Item = (&'static str, Cents)> + '_ {
        [
            ("balance", self.balance),
            ("daily limit", self.daily_limit),
            ("monthly limit", self.monthly_limit),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

/// Staff-side sparse update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub daily_limit: Option<Cents>,
    pub monthly_limit: Option<Cents>,
    pub status: Option<AccountStatus>,
}

/// Self-service sparse update; limits only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitsUpdate {
    pub daily_limit: Option<Cents>,
    pub monthly_limit: Option<Cents>,
}

impl From<LimitsUpdate> for AccountUpdate {
    fn from(update: LimitsUpdate) -> Self {
        Self {
            daily_limit: update.daily_limit,
            monthly_limit: update.monthly_limit,
            status: None,
        }
    }
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.daily_limit.is_none() && self.monthly_limit.is_none() && self.status.is_none()
    }

    pub fn limits(&self) -> impl Iterator<Item = (&'static str, Cents)> + '_ {
        [
            ("daily limit", self.daily_limit),
            ("monthly limit", self.monthly_limit),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}
