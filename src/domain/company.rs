use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CustomerId;

pub type CompanyId = Uuid;

/// Registered business activity codes (sector code and label).
pub const BUSINESS_ACTIVITY_CODES: &[&str] = &[
    "01.11 Growing of cereals and other crops",
    "10.71 Manufacture of bread and fresh pastry goods",
    "41.20 Construction of residential and non-residential buildings",
    "45.11 Sale of cars and light motor vehicles",
    "47.11 Retail sale in non-specialised stores",
    "49.41 Freight transport by road",
    "55.10 Hotels and similar accommodation",
    "56.10 Restaurants and mobile food service activities",
    "62.01 Computer programming activities",
    "62.02 Computer consultancy activities",
    "64.19 Other monetary intermediation",
    "68.20 Renting and operating of own or leased real estate",
    "69.20 Accounting, bookkeeping and auditing activities",
    "70.22 Business and other management consultancy activities",
    "85.59 Other education",
    "86.21 General medical practice activities",
];

/// Whether `code` is a known activity code. Matches either the bare
/// sector code ("62.01") or the full catalogue entry.
pub fn is_known_activity_code(code: &str) -> bool {
    let code = code.trim();
    BUSINESS_ACTIVITY_CODES
        .iter()
        .any(|entry| *entry == code || entry.split_once(' ').is_some_and(|(c, _)| c == code))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    /// Unique business key
    pub company_number: String,
    pub name: String,
    pub registration_number: Option<String>,
    pub tax_id: Option<String>,
    pub activity_code: Option<String>,
    pub address: Option<String>,
    /// Set at creation, never reassigned
    pub owner_id: Option<CustomerId>,
}

impl Company {
    pub fn from_draft(draft: CompanyDraft, owner_id: Option<CustomerId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_number: draft.company_number,
            name: draft.name,
            registration_number: draft.registration_number,
            tax_id: draft.tax_id,
            activity_code: draft.activity_code,
            address: draft.address,
            owner_id,
        }
    }

    /// Decide whether an account owned by `owner` may be bound to this
    /// company. The first owner wins; every later binding must match it.
    pub fn check_binding(&self, owner: Option<CustomerId>) -> Result<(), BindingError> {
        let owner = owner.ok_or(BindingError::OwnerMissing)?;
        match self.owner_id {
            Some(existing) if existing == owner => Ok(()),
            _ => Err(BindingError::OwnershipConflict {
                company_number: self.company_number.clone(),
                owner_id: self.owner_id,
                requested_by: owner,
            }),
        }
    }
}

/// Company data supplied by a caller, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub company_number: String,
    pub name: String,
    pub registration_number: Option<String>,
    pub tax_id: Option<String>,
    pub activity_code: Option<String>,
    pub address: Option<String>,
}

impl CompanyDraft {
    pub fn new(company_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            company_number: company_number.into(),
            name: name.into(),
            registration_number: None,
            tax_id: None,
            activity_code: None,
            address: None,
        }
    }

    pub fn with_registration_number(mut self, value: impl Into<String>) -> Self {
        self.registration_number = Some(value.into());
        self
    }

    pub fn with_tax_id(mut self, value: impl Into<String>) -> Self {
        self.tax_id = Some(value.into());
        self
    }

    pub fn with_activity_code(mut self, value: impl Into<String>) -> Self {
        self.activity_code = Some(value.into());
        self
    }

    pub fn with_address(mut self, value: impl Into<String>) -> Self {
        self.address = Some(value.into());
        self
    }

    /// Check the fields a company record cannot be stored without.
    pub fn validate(&self) -> Result<(), String> {
        if self.company_number.trim().is_empty() {
            return Err("company number is required".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("company name is required".to_string());
        }
        match &self.activity_code {
            Some(code) if !is_known_activity_code(code) => {
                Err(format!("unknown business activity code '{}'", code))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    OwnerMissing,
    OwnershipConflict {
        company_number: String,
        owner_id: Option<CustomerId>,
        requested_by: CustomerId,
    },
}

impl std::fmt::Display for BindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingError::OwnerMissing => write!(f, "owner missing"),
            BindingError::OwnershipConflict {
                company_number,
                requested_by,
                ..
            } => write!(
                f,
                "customer {} does not own company {}",
                requested_by, company_number
            ),
        }
    }
}

impl std::error::Error for BindingError {}
