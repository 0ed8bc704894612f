use std::fmt;

/// Monetary amounts are integer cents. 100.00 RSD is 10_000.
pub type Cents = i64;

/// Reserved balance every new account starts with (100.00).
pub const DEFAULT_RESERVED_BALANCE: Cents = 10_000;

/// Render cents as a decimal string: 10000 -> "100.00", -5 -> "-0.05".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a non-negative decimal amount into cents.
/// "250" -> 25000, "12.5" -> 1250, ".75" -> 75. Extra decimals are truncated.
pub fn parse_amount(input: &str) -> Result<Cents, AmountError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (units, decimals) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };
    if units.is_empty() && decimals.is_empty() {
        return Err(AmountError::InvalidFormat);
    }
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(units) || !all_digits(decimals) {
        return Err(AmountError::InvalidFormat);
    }

    // Digits only from here, so a parse failure means the value is too large.
    let units: i64 = if units.is_empty() {
        0
    } else {
        units.parse().map_err(|_| AmountError::Overflow)?
    };
    let fraction = decimals
        .chars()
        .chain(std::iter::repeat('0'))
        .take(2)
        .filter_map(|c| c.to_digit(10))
        .fold(0_i64, |acc, digit| acc * 10 + i64::from(digit));

    units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or(AmountError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    InvalidFormat,
    Negative,
    Overflow,
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::InvalidFormat => write!(f, "invalid money format"),
            AmountError::Negative => write!(f, "amount must not be negative"),
            AmountError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for AmountError {}
