//! Test helpers for the Viex workspace.

pub mod fixtures;
pub mod ledger;

pub use fixtures::TestContext;
pub use ledger::{Fault, InMemoryLedger, LedgerCall};
