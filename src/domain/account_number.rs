use rand::Rng;

use super::{AccountSubtype, AccountType};

/// Bank identifier that opens every account number.
pub const BANK_PREFIX: &str = "111";
/// Branch/product code that follows the bank prefix.
pub const BRANCH_CODE: &str = "0001";
/// Count of random digits between the branch code and the type digits.
pub const RANDOM_DIGITS: usize = 9;
pub const ACCOUNT_NUMBER_LEN: usize = BANK_PREFIX.len() + BRANCH_CODE.len() + RANDOM_DIGITS + 2;

/// Build an account number: bank prefix, branch code, nine random digits,
/// then one digit for the account type and one for the subtype.
///
/// Uniqueness is not checked here. Callers retry on a storage conflict.
pub fn generate_account_number<R: Rng + ?Sized>(
    rng: &mut R,
    account_type: AccountType,
    subtype: AccountSubtype,
) -> String {
    let mut number = String::with_capacity(ACCOUNT_NUMBER_LEN);
    number.push_str(BANK_PREFIX);
    number.push_str(BRANCH_CODE);
    for _ in 0..RANDOM_DIGITS {
        let digit: u32 = rng.gen_range(0..10);
        number.push(char::from_digit(digit, 10).unwrap_or('0'));
    }
    number.push(account_type.digit());
    number.push(subtype.digit());
    number
}

/// Structural check on a stored or user-supplied account number.
pub fn is_well_formed(number: &str) -> bool {
    number.len() == ACCOUNT_NUMBER_LEN
        && number.bytes().all(|b| b.is_ascii_digit())
        && number.starts_with(BANK_PREFIX)
        && number[BANK_PREFIX.len()..].starts_with(BRANCH_CODE)
}
