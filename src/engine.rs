//! Settlement engine: one proposal driven end to end.
//!
//! Runs a consensus round, applies the three-factor mint gate to the
//! committed result, and mints on approval. The engine never mints from an
//! aborted round, and the validator re-checks quorum from the raw counts
//! rather than trusting the coordinator's commit flag.

use crate::audit::event::AuditEvent;
use crate::audit::log::AuditLog;
use crate::consensus::coordinator::{RoundCoordinator, RoundReport};
use crate::core::{Result, TwinId};
use crate::ledger::{LedgerRecord, TokenLedger};
use crate::minting::{MintDecision, MintInput, MintValidator};
use crate::predictor::Prediction;
use std::sync::Arc;
use tracing::info;

/// Running counters for the settlement pipeline.
#[derive(Clone, Debug, Default)]
pub struct SettlementMetrics {
    pub rounds_run: u64,
    pub rounds_committed: u64,
    pub rounds_aborted: u64,
    pub mints_approved: u64,
    pub mints_refused: u64,
    pub total_minted: f64,
}

/// Outcome of one settled proposal.
#[derive(Clone, Debug)]
pub struct SettlementReport {
    /// The consensus round's report
    pub round: RoundReport,
    /// The validator's ruling (None when the round aborted)
    pub decision: Option<MintDecision>,
    /// The applied mint, if any
    pub mint_record: Option<LedgerRecord>,
}

/// Drives proposals through consensus, validation, and minting.
pub struct SettlementEngine {
    coordinator: RoundCoordinator,
    validator: MintValidator,
    ledger: Arc<TokenLedger>,
    audit: Arc<dyn AuditLog>,
    metrics: SettlementMetrics,
}

impl SettlementEngine {
    /// Assemble the pipeline. All stages share one audit sink.
    pub fn new(
        coordinator: RoundCoordinator,
        validator: MintValidator,
        ledger: Arc<TokenLedger>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            coordinator,
            validator,
            ledger,
            audit,
            metrics: SettlementMetrics::default(),
        }
    }

    /// The underlying coordinator (status, cancellation, archive).
    pub fn coordinator(&self) -> &RoundCoordinator {
        &self.coordinator
    }

    /// Pipeline counters.
    pub fn metrics(&self) -> &SettlementMetrics {
        &self.metrics
    }

    /// Settle one proposal.
    ///
    /// `prediction` is the leader's estimate; `observed_value` is the
    /// independently measured outcome the mint gate compares against;
    /// `recipient` receives the mint when all three factors pass.
    pub async fn settle(
        &mut self,
        leader_id: &TwinId,
        prediction: Prediction,
        observed_value: f64,
        recipient: &str,
    ) -> Result<SettlementReport> {
        let report = self
            .coordinator
            .run_round(leader_id, prediction.value, prediction.confidence)
            .await?;
        self.metrics.rounds_run += 1;

        if !report.committed() {
            self.metrics.rounds_aborted += 1;
            return Ok(SettlementReport {
                round: report,
                decision: None,
                mint_record: None,
            });
        }
        self.metrics.rounds_committed += 1;

        let committed_value = report
            .quorum
            .committed_value
            .unwrap_or(report.proposal.proposed_value);
        let input = MintInput {
            round_id: report.round.round_id.clone(),
            committed_value,
            observed_value,
            accepted_votes: report.quorum.accepted_votes,
            required_votes: report.quorum.required_votes,
            confidence: report.proposal.proposed_confidence,
        };
        let decision = self.validator.evaluate(&input);

        // Log the ruling before acting on it.
        self.audit.append(AuditEvent::MintDecided {
            decision: decision.clone(),
        })?;
        info!(
            round = %decision.round_id,
            should_mint = decision.should_mint,
            amount = decision.amount,
            reason = %decision.reason,
            "mint decided"
        );

        let mint_record = if decision.should_mint && decision.amount > 0.0 {
            self.metrics.mints_approved += 1;
            self.metrics.total_minted += decision.amount;
            Some(
                self.ledger
                    .mint(recipient, decision.amount, &decision.reason)?,
            )
        } else {
            if !decision.should_mint {
                self.metrics.mints_refused += 1;
            }
            None
        };

        Ok(SettlementReport {
            round: report,
            decision: Some(decision),
            mint_record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::memory::MemoryAuditLog;
    use crate::consensus::coordinator::CoordinatorConfig;
    use crate::consensus::twin::{Committee, PredictorTwin, TwinClient};
    use crate::core::TwinId;
    use crate::ledger::LedgerConfig;
    use crate::minting::{MintConfig, MintFactor};
    use crate::predictor::FixedPredictor;

    fn engine(observations: &[f64], baseline: f64) -> (SettlementEngine, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let clients: Vec<Arc<dyn TwinClient>> = observations
            .iter()
            .enumerate()
            .map(|(i, &obs)| {
                Arc::new(PredictorTwin::new(
                    TwinId::new(&format!("twin-{}", i)),
                    Arc::new(FixedPredictor::new(obs, 0.9)),
                    5.0,
                )) as Arc<dyn TwinClient>
            })
            .collect();
        let coordinator = RoundCoordinator::new(
            Committee::new(clients, 3),
            audit.clone(),
            CoordinatorConfig::default(),
        )
        .unwrap();
        let validator = MintValidator::new(MintConfig {
            baseline,
            conversion_rate: 1.0,
            ..Default::default()
        });
        let ledger =
            Arc::new(TokenLedger::new(LedgerConfig::default(), audit.clone()).unwrap());
        (
            SettlementEngine::new(coordinator, validator, ledger.clone(), audit.clone()),
            audit,
        )
    }

    #[tokio::test]
    async fn test_full_mint_path() {
        let (mut engine, audit) = engine(&[100.5, 99.0, 101.0], 120.0);
        let prediction = Prediction {
            value: 100.0,
            confidence: 0.97,
        };

        let report = engine
            .settle(&TwinId::new("twin-0"), prediction, 99.0, "plant-7")
            .await
            .unwrap();

        assert!(report.round.committed());
        let decision = report.decision.unwrap();
        assert!(decision.should_mint);
        assert_eq!(decision.reason, "3-factor validation passed");
        assert!(report.mint_record.is_some());
        assert!((engine.metrics().total_minted - 21.0).abs() < 1e-9);
        assert!(audit.verify());
    }

    #[tokio::test]
    async fn test_low_confidence_refuses_mint() {
        let (mut engine, _) = engine(&[100.5, 99.0, 101.0], 120.0);
        let prediction = Prediction {
            value: 100.0,
            confidence: 0.80,
        };

        let report = engine
            .settle(&TwinId::new("twin-0"), prediction, 99.0, "plant-7")
            .await
            .unwrap();

        let decision = report.decision.unwrap();
        assert!(!decision.should_mint);
        assert_eq!(decision.failed_factor, Some(MintFactor::Confidence));
        assert!(report.mint_record.is_none());
        assert_eq!(engine.metrics().mints_refused, 1);
    }

    #[tokio::test]
    async fn test_aborted_round_never_reaches_validator() {
        // One outlier in a 3-twin committee: no quorum, no decision.
        let (mut engine, audit) = engine(&[100.5, 99.0, 150.0], 120.0);
        let prediction = Prediction {
            value: 100.0,
            confidence: 0.97,
        };

        let report = engine
            .settle(&TwinId::new("twin-0"), prediction, 99.0, "plant-7")
            .await
            .unwrap();

        assert!(!report.round.committed());
        assert!(report.decision.is_none());
        assert!(report.mint_record.is_none());
        assert!(!audit
            .events()
            .iter()
            .any(|e| e.label() == "mint_decided"));
    }
}
