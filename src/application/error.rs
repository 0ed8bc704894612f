use thiserror::Error;

use crate::domain::{AccountId, AccountType, BindingError, Currency, CustomerId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid combination of account type {account_type} and currency {currency}")]
    InvalidCombination {
        account_type: AccountType,
        currency: Currency,
    },

    #[error("Customer {requested_by} is not the owner of company {company_number}")]
    OwnershipConflict {
        company_number: String,
        requested_by: CustomerId,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Company not found: {0}")]
    CompanyNotFound(String),

    #[error("Company already exists: {0}")]
    CompanyAlreadyExists(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Customer {customer_id} does not own account {account_id}")]
    Forbidden {
        customer_id: CustomerId,
        account_id: AccountId,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Could not find a free account number after {0} attempts")]
    AccountNumberExhausted(u32),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Errors caused by the request rather than by the bank's own systems.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AppError::AccountNumberExhausted(_)
                | AppError::CollaboratorUnavailable(_)
                | AppError::Database(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::AccountNotFound(_)
                | AppError::CompanyNotFound(_)
                | AppError::CustomerNotFound(_)
        )
    }
}

impl From<BindingError> for AppError {
    fn from(err: BindingError) -> Self {
        match err {
            BindingError::OwnerMissing => AppError::InvalidRequest("owner missing".to_string()),
            BindingError::OwnershipConflict {
                company_number,
                requested_by,
                ..
            } => AppError::OwnershipConflict {
                company_number,
                requested_by,
            },
        }
    }
}
