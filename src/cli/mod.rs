use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::application::BankService;
use crate::config::BankConfig;
use crate::domain::{
    Account, AccountStatus, AccountSubtype, AccountType, AccountUpdate, Cents, CompanyDraft,
    CreateAccountRequest, Currency, CustomerProfile, LimitsUpdate, Transaction, TransactionView,
    format_cents, parse_amount,
};

/// Bankbook - bank account lifecycle and transaction history
#[derive(Parser)]
#[command(name = "bankbook")]
#[command(about = "Open and manage bank accounts and read their transaction history")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, global = true, default_value = "bankbook.db")]
    pub database: String,

    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Local customer directory
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Company management commands
    #[command(subcommand)]
    Company(CompanyCommands),

    /// List the business activity codes companies may register under
    ActivityCodes,

    /// Ledger entries
    #[command(subcommand)]
    Transaction(TransactionCommands),
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Add or update a customer
    Add {
        /// Customer ID as issued by the customer directory
        id: i64,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,
    },

    /// List known customers
    List,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Owning customer ID
        #[arg(long)]
        owner: i64,

        /// Employee opening the account
        #[arg(long)]
        staff: Option<i64>,

        /// Account type: current, foreign-currency
        #[arg(long = "type")]
        account_type: String,

        /// Subtype: personal, business, savings, pension, youth, student, standard
        #[arg(long)]
        subtype: String,

        /// Currency code (e.g., RSD, EUR)
        #[arg(long)]
        currency: String,

        /// Opening balance (e.g., "100.00")
        #[arg(long)]
        balance: Option<String>,

        #[arg(long)]
        daily_limit: Option<String>,

        #[arg(long)]
        monthly_limit: Option<String>,

        /// Initial status: active, inactive, blocked
        #[arg(long)]
        status: Option<String>,

        /// Request a card for the new account
        #[arg(long)]
        card: bool,

        /// Company number to bind (business accounts)
        #[arg(long)]
        company_number: Option<String>,

        /// Company name, used when the company is new
        #[arg(long)]
        company_name: Option<String>,

        #[arg(long)]
        registration_number: Option<String>,

        #[arg(long)]
        tax_id: Option<String>,

        #[arg(long)]
        activity_code: Option<String>,

        #[arg(long)]
        address: Option<String>,
    },

    /// Show account details
    Show {
        /// Account ID or account number
        account: String,
    },

    /// List accounts
    List {
        /// Only accounts held by this customer
        #[arg(long)]
        owner: Option<i64>,
    },

    /// Staff update of limits and status
    Update {
        /// Account ID or account number
        account: String,

        #[arg(long)]
        daily_limit: Option<String>,

        #[arg(long)]
        monthly_limit: Option<String>,

        #[arg(long)]
        status: Option<String>,
    },

    /// Customer update of their own limits
    Limits {
        /// Account ID or account number
        account: String,

        /// Customer making the change
        #[arg(long)]
        customer: i64,

        #[arg(long)]
        daily_limit: Option<String>,

        #[arg(long)]
        monthly_limit: Option<String>,
    },

    /// Show the account's transaction history
    History {
        /// Account ID or account number
        account: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
pub enum CompanyCommands {
    /// Register a company
    Create {
        /// Company number (must be unique)
        number: String,

        /// Company name
        name: String,

        /// Owning customer ID
        #[arg(long)]
        owner: Option<i64>,

        #[arg(long)]
        registration_number: Option<String>,

        #[arg(long)]
        tax_id: Option<String>,

        #[arg(long)]
        activity_code: Option<String>,

        #[arg(long)]
        address: Option<String>,
    },

    /// List companies
    List {
        /// Only companies owned by this customer
        #[arg(long)]
        owner: Option<i64>,
    },

    /// Show company details
    Show {
        /// Company number
        number: String,
    },

    /// List the accounts bound to a company
    Accounts {
        /// Company number
        number: String,
    },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a ledger entry between two accounts
    Record {
        /// Debited account (ID or number)
        #[arg(long)]
        from: String,

        /// Credited account (ID or number)
        #[arg(long)]
        to: String,

        /// Amount (e.g., "50.00")
        amount: String,

        #[arg(long)]
        description: Option<String>,

        /// Date of the entry (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,

        /// Loan the entry repays
        #[arg(long)]
        loan: Option<i64>,

        /// Hide the entry from everyone but the bank
        #[arg(long)]
        bank_only: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl Cli {
    fn load_config(&self) -> Result<BankConfig> {
        match &self.config {
            Some(path) => BankConfig::load_file(path)
                .with_context(|| format!("Failed to load config '{}'", path.display())),
            None => Ok(BankConfig::default()),
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;

        if matches!(self.command, Commands::Init) {
            BankService::init(&self.database, config).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = BankService::connect(&self.database, config).await?;
        match self.command {
            Commands::Init => {}
            Commands::Customer(cmd) => run_customer_command(&service, cmd).await?,
            Commands::Account(cmd) => run_account_command(&service, cmd).await?,
            Commands::Company(cmd) => run_company_command(&service, cmd).await?,
            Commands::ActivityCodes => {
                for code in service.list_business_activity_codes() {
                    println!("{}", code);
                }
            }
            Commands::Transaction(cmd) => run_transaction_command(&service, cmd).await?,
        }

        Ok(())
    }
}

async fn run_customer_command(service: &BankService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add {
            id,
            first_name,
            last_name,
            email,
        } => {
            let customer = service
                .register_customer(CustomerProfile::new(id, first_name, last_name, email))
                .await?;
            println!("Saved customer {}: {}", customer.id, customer.display_name());
        }

        CustomerCommands::List => {
            let customers = service.list_customers().await?;
            if customers.is_empty() {
                println!("No customers found.");
                return Ok(());
            }
            println!("{:<8} {:<30} {:<30}", "ID", "NAME", "EMAIL");
            println!("{}", "-".repeat(70));
            for customer in customers {
                println!(
                    "{:<8} {:<30} {:<30}",
                    customer.id,
                    truncate(&customer.display_name(), 30),
                    truncate(&customer.email, 30)
                );
            }
        }
    }
    Ok(())
}

async fn run_account_command(service: &BankService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            owner,
            staff,
            account_type,
            subtype,
            currency,
            balance,
            daily_limit,
            monthly_limit,
            status,
            card,
            company_number,
            company_name,
            registration_number,
            tax_id,
            activity_code,
            address,
        } => {
            let account_type: AccountType = account_type.parse().map_err(anyhow::Error::msg)?;
            let subtype: AccountSubtype = subtype.parse().map_err(anyhow::Error::msg)?;
            let currency: Currency = currency.parse().map_err(anyhow::Error::msg)?;

            let mut request = CreateAccountRequest::new(owner, account_type, subtype, currency);
            request.balance = parse_optional_amount(balance.as_deref(), "balance")?;
            request.daily_limit = parse_optional_amount(daily_limit.as_deref(), "daily limit")?;
            request.monthly_limit =
                parse_optional_amount(monthly_limit.as_deref(), "monthly limit")?;
            request.status = status
                .map(|s| s.parse::<AccountStatus>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            request.create_card = card;

            if let Some(number) = company_number {
                let name = company_name.unwrap_or_default();
                let mut draft = CompanyDraft::new(number, name);
                draft.registration_number = registration_number;
                draft.tax_id = tax_id;
                draft.activity_code = activity_code;
                draft.address = address;
                request.company = Some(draft);
            }

            let account = service.create_account(request, staff).await?;
            println!(
                "Opened account {} ({} {}, {})",
                account.account_number, account.account_type, account.subtype, account.currency
            );
            println!("  ID: {}", account.id);
        }

        AccountCommands::Show { account } => {
            let account = resolve_account(service, &account).await?;
            print_account(&account);
        }

        AccountCommands::List { owner } => {
            let accounts = match owner {
                Some(owner) => service.list_accounts_by_owner(owner).await?,
                None => service.list_accounts().await?,
            };
            print_account_table(&accounts);
        }

        AccountCommands::Update {
            account,
            daily_limit,
            monthly_limit,
            status,
        } => {
            let update = AccountUpdate {
                daily_limit: parse_optional_amount(daily_limit.as_deref(), "daily limit")?,
                monthly_limit: parse_optional_amount(monthly_limit.as_deref(), "monthly limit")?,
                status: status
                    .map(|s| s.parse::<AccountStatus>())
                    .transpose()
                    .map_err(anyhow::Error::msg)?,
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to update. Pass --daily-limit, --monthly-limit or --status");
            }

            let account = resolve_account(service, &account).await?;
            let updated = service.staff_update_account(account.id, update).await?;
            println!("Updated account {}", updated.account_number);
            print_account(&updated);
        }

        AccountCommands::Limits {
            account,
            customer,
            daily_limit,
            monthly_limit,
        } => {
            let update = LimitsUpdate {
                daily_limit: parse_optional_amount(daily_limit.as_deref(), "daily limit")?,
                monthly_limit: parse_optional_amount(monthly_limit.as_deref(), "monthly limit")?,
            };

            let account = resolve_account(service, &account).await?;
            let updated = service
                .self_update_account(customer, account.id, update)
                .await?;
            println!(
                "Limits for {}: daily {}, monthly {}",
                updated.account_number,
                format_cents(updated.daily_limit),
                format_cents(updated.monthly_limit)
            );
        }

        AccountCommands::History { account, format } => {
            let account = resolve_account(service, &account).await?;
            let history = service.list_transactions_for_account(account.id).await?;
            match format {
                OutputFormat::Table => print_history_table(&account, &history),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&history)?);
                }
                OutputFormat::Csv => write_history_csv(std::io::stdout().lock(), &history)?,
            }
        }
    }
    Ok(())
}

async fn run_company_command(service: &BankService, cmd: CompanyCommands) -> Result<()> {
    match cmd {
        CompanyCommands::Create {
            number,
            name,
            owner,
            registration_number,
            tax_id,
            activity_code,
            address,
        } => {
            let mut draft = CompanyDraft::new(number, name);
            draft.registration_number = registration_number;
            draft.tax_id = tax_id;
            draft.activity_code = activity_code;
            draft.address = address;

            let company = service.create_company(draft, owner).await?;
            println!("Created company: {} ({})", company.name, company.company_number);
        }

        CompanyCommands::List { owner } => {
            let companies = match owner {
                Some(owner) => service.list_companies_by_owner(owner).await?,
                None => service.list_companies().await?,
            };
            if companies.is_empty() {
                println!("No companies found.");
                return Ok(());
            }
            println!("{:<12} {:<30} {:<8}", "NUMBER", "NAME", "OWNER");
            println!("{}", "-".repeat(52));
            for company in companies {
                println!(
                    "{:<12} {:<30} {:<8}",
                    company.company_number,
                    truncate(&company.name, 30),
                    company
                        .owner_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }

        CompanyCommands::Show { number } => {
            let company = service.find_company_by_number(&number).await?;
            println!("Company: {}", company.name);
            println!("  ID:           {}", company.id);
            println!("  Number:       {}", company.company_number);
            if let Some(owner) = company.owner_id {
                println!("  Owner:        {}", owner);
            }
            if let Some(reg) = &company.registration_number {
                println!("  Registration: {}", reg);
            }
            if let Some(tax_id) = &company.tax_id {
                println!("  Tax ID:       {}", tax_id);
            }
            if let Some(code) = &company.activity_code {
                println!("  Activity:     {}", code);
            }
            if let Some(address) = &company.address {
                println!("  Address:      {}", address);
            }
        }

        CompanyCommands::Accounts { number } => {
            let company = service.find_company_by_number(&number).await?;
            let accounts = service.list_accounts_by_company(company.id).await?;
            print_account_table(&accounts);
        }
    }
    Ok(())
}

async fn run_transaction_command(service: &BankService, cmd: TransactionCommands) -> Result<()> {
    match cmd {
        TransactionCommands::Record {
            from,
            to,
            amount,
            description,
            date,
            loan,
            bank_only,
        } => {
            let from = resolve_account(service, &from).await?;
            let to = resolve_account(service, &to).await?;
            let amount_cents =
                parse_amount(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let timestamp = match date {
                Some(date_str) => parse_date(&date_str).with_context(|| {
                    format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)
                })?,
                None => Utc::now(),
            };

            let mut transaction =
                Transaction::new(from.id, to.id, amount_cents, from.currency, Uuid::new_v4())
                    .with_timestamp(timestamp);
            if let Some(description) = description {
                transaction = transaction.with_description(description);
            }
            if let Some(loan) = loan {
                transaction = transaction.with_loan(loan);
            }
            if bank_only {
                transaction = transaction.bank_only();
            }

            let transaction = service.record_transaction(transaction).await?;
            println!(
                "Recorded {} {} {} -> {} ({})",
                format_cents(transaction.amount_cents),
                transaction.currency,
                from.account_number,
                to.account_number,
                transaction.id
            );
        }
    }
    Ok(())
}

/// Accept either an account UUID or an account number.
async fn resolve_account(service: &BankService, reference: &str) -> Result<Account> {
    let account = match Uuid::parse_str(reference) {
        Ok(id) => service.get_account(id).await?,
        Err(_) => service.get_account_by_number(reference).await?,
    };
    Ok(account)
}

fn parse_optional_amount(input: Option<&str>, field: &str) -> Result<Option<Cents>> {
    input
        .map(|value| {
            parse_amount(value)
                .with_context(|| format!("Invalid {} '{}'. Use '50.00' or '50'", field, value))
        })
        .transpose()
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .context("Invalid time of day")?
        .and_utc();
    Ok(datetime)
}

fn print_account(account: &Account) {
    println!("Account: {}", account.account_number);
    println!("  ID:            {}", account.id);
    println!("  Owner:         {}", account.owner_id);
    println!("  Type:          {} / {}", account.account_type, account.subtype);
    println!("  Currency:      {}", account.currency);
    println!("  Status:        {}", account.status);
    println!("  Balance:       {}", format_cents(account.balance));
    println!("  Reserved:      {}", format_cents(account.reserved_balance));
    println!(
        "  Daily limit:   {} (spent {})",
        format_cents(account.daily_limit),
        format_cents(account.daily_spent)
    );
    println!(
        "  Monthly limit: {} (spent {})",
        format_cents(account.monthly_limit),
        format_cents(account.monthly_spent)
    );
    if let Some(company_id) = account.company_id {
        println!("  Company:       {}", company_id);
    }
    println!("  Opened by:     {}", account.employee_id);
    if let Some(created) = DateTime::from_timestamp(account.created_date, 0) {
        println!("  Created:       {}", created.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(expires) = DateTime::from_timestamp(account.expiration_date, 0) {
        println!("  Expires:       {}", expires.format("%Y-%m-%d"));
    }
}

fn print_account_table(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("No accounts found.");
        return;
    }
    println!(
        "{:<20} {:<8} {:<18} {:<10} {:<5} {:>14}",
        "NUMBER", "OWNER", "TYPE", "SUBTYPE", "CUR", "BALANCE"
    );
    println!("{}", "-".repeat(80));
    for account in accounts {
        println!(
            "{:<20} {:<8} {:<18} {:<10} {:<5} {:>14}",
            account.account_number,
            account.owner_id,
            account.account_type,
            account.subtype,
            account.currency,
            format_cents(account.balance)
        );
    }
}

fn print_history_table(account: &Account, history: &[TransactionView]) {
    if history.is_empty() {
        println!("No transactions for {}.", account.account_number);
        return;
    }
    println!(
        "{:<11} {:<22} {:<22} {:>14} {:<5} {:<20}",
        "DATE", "FROM", "TO", "AMOUNT", "CUR", "DESCRIPTION"
    );
    println!("{}", "-".repeat(98));
    for view in history {
        let tx = &view.transaction;
        let amount = if tx.from_account == account.id && !tx.is_self_transfer() {
            format!("-{}", format_cents(tx.amount_cents))
        } else {
            format_cents(tx.amount_cents)
        };
        println!(
            "{:<11} {:<22} {:<22} {:>14} {:<5} {:<20}",
            tx.timestamp.format("%Y-%m-%d"),
            truncate(&view.sender_name, 22),
            truncate(&view.receiver_name, 22),
            amount,
            tx.currency,
            truncate(tx.description.as_deref().unwrap_or(""), 20)
        );
    }
}

fn write_history_csv<W: std::io::Write>(writer: W, history: &[TransactionView]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "id",
        "timestamp",
        "from_account",
        "sender_name",
        "to_account",
        "receiver_name",
        "amount_cents",
        "currency",
        "description",
        "transfer_id",
        "loan_id",
    ])?;

    for view in history {
        let tx = &view.transaction;
        csv_writer.write_record([
            tx.id.to_string(),
            tx.timestamp.to_rfc3339(),
            tx.from_account.to_string(),
            view.sender_name.clone(),
            tx.to_account.to_string(),
            view.receiver_name.clone(),
            tx.amount_cents.to_string(),
            tx.currency.to_string(),
            tx.description.clone().unwrap_or_default(),
            tx.transfer_id.to_string(),
            tx.loan_id.map(|id| id.to_string()).unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_account_create() {
        let cli = Cli::try_parse_from([
            "bankbook",
            "account",
            "create",
            "--owner",
            "7",
            "--staff",
            "3",
            "--type",
            "current",
            "--subtype",
            "personal",
            "--currency",
            "RSD",
            "--card",
        ])
        .unwrap();

        match cli.command {
            Commands::Account(AccountCommands::Create {
                owner, staff, card, ..
            }) => {
                assert_eq!(owner, 7);
                assert_eq!(staff, Some(3));
                assert!(card);
            }
            _ => panic!("expected account create"),
        }
    }

    #[test]
    fn test_optional_amounts() {
        assert_eq!(parse_optional_amount(None, "balance").unwrap(), None);
        assert_eq!(
            parse_optional_amount(Some("12.50"), "balance").unwrap(),
            Some(1_250)
        );
        assert!(parse_optional_amount(Some("-1"), "balance").is_err());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-01").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(parse_date("03/01/2024").is_err());
    }

    #[test]
    fn test_history_csv_has_header_and_rows() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let tx = Transaction::new(from, to, 2_500, Currency::Rsd, Uuid::new_v4())
            .with_description("rent, march");
        let history = vec![TransactionView {
            transaction: tx,
            sender_name: "Ana Petrović".to_string(),
            receiver_name: "Marko Jovanović".to_string(),
        }];

        let mut out = Vec::new();
        write_history_csv(&mut out, &history).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,timestamp,from_account"));
        assert!(lines[1].contains("\"rent, march\""));
        assert!(lines[1].contains("Ana Petrović"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bank.toml");
        std::fs::write(&path, "local_currency = \"EUR\"\naccount_number_attempts = 3\n").unwrap();

        let cli = Cli::try_parse_from(["bankbook", "--config", path.to_str().unwrap(), "init"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.local_currency, Currency::Eur);
        assert_eq!(config.account_number_attempts, 3);

        std::fs::write(&path, "account_number_attempts = 0\n").unwrap();
        let err = cli.load_config().unwrap_err();
        assert!(format!("{err:#}").contains("account_number_attempts"));

        let cli = Cli::try_parse_from(["bankbook", "init"]).unwrap();
        assert_eq!(cli.load_config().unwrap(), BankConfig::default());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer name", 10), "a much ...");
    }
}
