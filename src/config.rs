//! Runtime configuration.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Currency, is_well_formed};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Currency `current` accounts must be held in
    pub local_currency: Currency,
    /// Draws of a fresh account number before creation gives up
    pub account_number_attempts: u32,
    /// Upper bound on a customer directory lookup
    pub lookup_timeout_ms: u64,
    /// Upper bound on card issuance and notification dispatch
    pub side_effect_timeout_ms: u64,
    pub notification: NotificationTemplate,
    /// The bank's own account number per currency
    pub clearing_accounts: BTreeMap<Currency, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationTemplate {
    pub subject: String,
    pub message: String,
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        Self {
            subject: "Account successfully created".to_string(),
            message: "Your account has been successfully created".to_string(),
        }
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            local_currency: Currency::Rsd,
            account_number_attempts: 5,
            lookup_timeout_ms: 5_000,
            side_effect_timeout_ms: 5_000,
            notification: NotificationTemplate::default(),
            clearing_accounts: BTreeMap::new(),
        }
    }
}

impl BankConfig {
    /// Load and validate a TOML file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: BankConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_number_attempts == 0 {
            return Err(ConfigError::Validation(
                "account_number_attempts must be at least 1".to_string(),
            ));
        }
        if self.lookup_timeout_ms == 0 || self.side_effect_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        for (currency, number) in &self.clearing_accounts {
            if !is_well_formed(number) {
                return Err(ConfigError::Validation(format!(
                    "clearing account for {} is not a valid account number: {}",
                    currency, number
                )));
            }
        }
        Ok(())
    }

    pub fn with_local_currency(mut self, currency: Currency) -> Self {
        self.local_currency = currency;
        self
    }

    pub fn with_clearing_account(mut self, currency: Currency, number: impl Into<String>) -> Self {
        self.clearing_accounts.insert(currency, number.into());
        self
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_millis(self.side_effect_timeout_ms)
    }

    pub fn clearing_account_number(&self, currency: Currency) -> Option<&str> {
        self.clearing_accounts.get(&currency).map(String::as_str)
    }
}
