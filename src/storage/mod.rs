mod repository;

pub use repository::*;

/// SQL migration for companies and accounts
pub const MIGRATION_001_ACCOUNTS: &str = include_str!("migrations/001_accounts.sql");

/// SQL migration for the shared transaction ledger
pub const MIGRATION_002_TRANSACTIONS: &str = include_str!("migrations/002_transactions.sql");

/// SQL migration for the local customer directory
pub const MIGRATION_003_CUSTOMERS: &str = include_str!("migrations/003_customers.sql");
