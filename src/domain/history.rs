use std::collections::HashSet;

use super::{Account, AccountId, Transaction};

/// Combine the transactions an account sent and received into one history.
///
/// Sent entries come first, in the order given, followed by received
/// entries whose sender is some other account. A self-transfer is therefore
/// listed once, from the sent side. Any id already listed is skipped.
pub fn merge_account_history(
    account_id: AccountId,
    sent: Vec<Transaction>,
    received: Vec<Transaction>,
) -> Vec<Transaction> {
    let mut seen = HashSet::with_capacity(sent.len() + received.len());
    let received = received
        .into_iter()
        .filter(|tx| tx.from_account != account_id);

    sent.into_iter()
        .chain(received)
        .filter(|tx| seen.insert(tx.id))
        .collect()
}

/// Whether `account` is held by the bank itself, judged against the
/// clearing account for the local currency. With no clearing account
/// configured nobody is treated as the bank.
pub fn is_bank_holder(account: &Account, clearing: Option<&Account>) -> bool {
    clearing.is_some_and(|bank| bank.id == account.id || bank.owner_id == account.owner_id)
}

/// Drop bank-only entries unless the viewer is the bank.
pub fn redact_bank_only(transactions: Vec<Transaction>, bank_holder: bool) -> Vec<Transaction> {
    if bank_holder {
        return transactions;
    }
    transactions.into_iter().filter(|tx| !tx.bank_only).collect()
}
