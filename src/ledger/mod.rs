//! Economic state: balances, supply, mint and burn-on-transfer.

pub mod store;

pub use store::{LedgerConfig, LedgerRecord, TokenLedger};
