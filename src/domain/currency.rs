use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Currencies the bank keeps accounts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Rsd,
    Eur,
    Usd,
    Chf,
    Gbp,
    Jpy,
    Cad,
    Aud,
}

impl Currency {
    pub const ALL: [Currency; 8] = [
        Currency::Rsd,
        Currency::Eur,
        Currency::Usd,
        Currency::Chf,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Cad,
        Currency::Aud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Rsd => "RSD",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Chf => "CHF",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| format!("unknown currency '{}'", s))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
