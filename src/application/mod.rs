// Application layer - use cases and orchestration.
// The service owns the checks and sequencing; collaborators are the
// seams to systems outside this crate.

pub mod collaborators;
pub mod error;
pub mod service;

pub use collaborators::*;
pub use error::*;
pub use service::BankService;
