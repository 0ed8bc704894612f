mod account;
mod account_number;
mod company;
mod currency;
mod customer;
mod history;
mod money;
mod transaction;

pub use account::*;
pub use account_number::*;
pub use company::*;
pub use currency::*;
pub use customer::*;
pub use history::*;
pub use money::*;
pub use transaction::*;
