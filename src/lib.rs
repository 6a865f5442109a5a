//! # Shadow Twin Consensus
//!
//! A small Byzantine-fault-tolerant consensus round gating Proof-of-Energy
//! settlement:
//! - **consensus**: a committee of twins (independent predictors) agrees on
//!   a proposed value under a `2f+1` quorum with phase timeouts
//! - **minting**: a three-factor gate (energy match, consensus, confidence)
//!   in front of any supply change
//! - **ledger**: atomic mint and burn-on-transfer over account balances
//! - **audit**: an append-only, log-then-act trail of every proposal, vote,
//!   decision, and mutation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shadow_twin::consensus::{Committee, CoordinatorConfig, PredictorTwin, RoundCoordinator, TwinClient};
//! use shadow_twin::audit::MemoryAuditLog;
//! use shadow_twin::core::TwinId;
//! use shadow_twin::predictor::FixedPredictor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let audit = Arc::new(MemoryAuditLog::new());
//!     let twins: Vec<Arc<dyn TwinClient>> = (0..3)
//!         .map(|i| {
//!             Arc::new(PredictorTwin::new(
//!                 TwinId::new(&format!("twin-{}", i)),
//!                 Arc::new(FixedPredictor::new(100.0, 0.97)),
//!                 5.0,
//!             )) as Arc<dyn TwinClient>
//!         })
//!         .collect();
//!
//!     let mut coordinator = RoundCoordinator::new(
//!         Committee::new(twins, 3),
//!         audit,
//!         CoordinatorConfig::default(),
//!     )
//!     .unwrap();
//!
//!     let report = coordinator
//!         .run_round(&TwinId::new("twin-0"), 100.0, 0.97)
//!         .await
//!         .unwrap();
//!     println!("round {} -> {:?}", report.round.round_id, report.outcome);
//! }
//! ```

pub mod audit;
pub mod consensus;
pub mod core;
pub mod engine;
pub mod ledger;
pub mod minting;
pub mod predictor;

pub use core::error::{Error, Result};
pub use engine::{SettlementEngine, SettlementMetrics, SettlementReport};
