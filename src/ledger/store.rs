//! Token ledger: balances, total supply, mint and transfer-with-burn.
//!
//! The ledger is the only component that mutates economic state. Both
//! mutations run under a single write lock so a balance and the total
//! supply can never be observed out of sync, and every mutation is appended
//! to the audit log before it becomes visible.

use crate::audit::event::AuditEvent;
use crate::audit::log::AuditLog;
use crate::core::{now, Error, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Ledger configuration.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Fraction of every transfer permanently burned, in [0, 1)
    pub burn_rate: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { burn_rate: 0.02 }
    }
}

/// Immutable record of one applied ledger mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LedgerRecord {
    /// Supply increased in favor of one account
    Mint {
        seq: u64,
        recipient: String,
        amount: f64,
        reason: String,
        total_supply_after: f64,
        at: Timestamp,
    },
    /// Balance moved between accounts, burn deducted from supply
    Transfer {
        seq: u64,
        from: String,
        to: String,
        amount: f64,
        burn: f64,
        transferred: f64,
        total_supply_after: f64,
        at: Timestamp,
    },
}

impl LedgerRecord {
    /// Mutation sequence number.
    pub fn seq(&self) -> u64 {
        match self {
            LedgerRecord::Mint { seq, .. } => *seq,
            LedgerRecord::Transfer { seq, .. } => *seq,
        }
    }
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, f64>,
    total_supply: f64,
    seq: u64,
}

/// Account balances plus the global supply counter.
pub struct TokenLedger {
    state: RwLock<LedgerState>,
    audit: Arc<dyn AuditLog>,
    burn_rate: f64,
}

impl TokenLedger {
    /// Create an empty ledger. Rejects burn rates outside [0, 1).
    pub fn new(config: LedgerConfig, audit: Arc<dyn AuditLog>) -> Result<Self> {
        if !(0.0..1.0).contains(&config.burn_rate) {
            return Err(Error::InvalidBurnRate(config.burn_rate));
        }
        Ok(Self {
            state: RwLock::new(LedgerState::default()),
            audit,
            burn_rate: config.burn_rate,
        })
    }

    /// Mint `amount` to `recipient`, increasing total supply.
    ///
    /// Rejects non-positive amounts with no state change. The mutation
    /// record is durably logged before the balances move.
    pub fn mint(&self, recipient: &str, amount: f64, reason: &str) -> Result<LedgerRecord> {
        if amount <= 0.0 {
            return Err(Error::NonPositiveAmount(amount));
        }

        let mut state = self.state.write().expect("ledger lock poisoned");
        let record = LedgerRecord::Mint {
            seq: state.seq,
            recipient: recipient.to_string(),
            amount,
            reason: reason.to_string(),
            total_supply_after: state.total_supply + amount,
            at: now(),
        };
        self.audit.append(AuditEvent::LedgerMutation {
            record: record.clone(),
        })?;

        state.total_supply += amount;
        *state.balances.entry(recipient.to_string()).or_insert(0.0) += amount;
        state.seq += 1;

        info!(recipient, amount, "minted");
        Ok(record)
    }

    /// Transfer `amount` from `from` to `to`, burning `amount * burn_rate`.
    ///
    /// The burn is computed before any mutation; debit, credit, and supply
    /// adjustment apply in one atomic section. Rejections (non-positive
    /// amount, insufficient balance) leave no partial state and are safe to
    /// retry.
    pub fn transfer(&self, from: &str, to: &str, amount: f64) -> Result<LedgerRecord> {
        if amount <= 0.0 {
            return Err(Error::NonPositiveAmount(amount));
        }

        let mut state = self.state.write().expect("ledger lock poisoned");
        let balance = state.balances.get(from).copied().unwrap_or(0.0);
        if balance < amount {
            return Err(Error::InsufficientBalance {
                address: from.to_string(),
                balance,
                requested: amount,
            });
        }

        let burn = amount * self.burn_rate;
        let transferred = amount - burn;

        let record = LedgerRecord::Transfer {
            seq: state.seq,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            burn,
            transferred,
            total_supply_after: state.total_supply - burn,
            at: now(),
        };
        self.audit.append(AuditEvent::LedgerMutation {
            record: record.clone(),
        })?;

        // Debit, credit, supply adjustment: one atomic section.
        *state.balances.entry(from.to_string()).or_insert(0.0) -= amount;
        *state.balances.entry(to.to_string()).or_insert(0.0) += transferred;
        state.total_supply -= burn;
        state.seq += 1;

        info!(from, to, amount, burn, "transferred");
        Ok(record)
    }

    /// Current balance of an address (0 for unknown addresses).
    pub fn balance(&self, address: &str) -> f64 {
        self.state
            .read()
            .expect("ledger lock poisoned")
            .balances
            .get(address)
            .copied()
            .unwrap_or(0.0)
    }

    /// Current total supply.
    pub fn total_supply(&self) -> f64 {
        self.state.read().expect("ledger lock poisoned").total_supply
    }

    /// Consistent snapshot of all balances.
    pub fn balances(&self) -> HashMap<String, f64> {
        self.state
            .read()
            .expect("ledger lock poisoned")
            .balances
            .clone()
    }
}
