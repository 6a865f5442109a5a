//! Three-factor mint validation.
//!
//! A committed round does not mint by itself: the validator independently
//! re-checks energy match, consensus, and confidence before any supply
//! change. Failing a factor is a normal outcome reported via `reason`, not
//! an error.

use crate::core::{now, RoundId, Timestamp};
use serde::{Deserialize, Serialize};

/// The three independently-failable factors, in their fixed check order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintFactor {
    /// Committed value within relative tolerance of the observed value
    EnergyMatch,
    /// Raw vote counts reach the required quorum
    Consensus,
    /// Leader confidence above threshold
    Confidence,
}

/// Mint validator configuration.
#[derive(Clone, Debug)]
pub struct MintConfig {
    /// Relative tolerance between committed and observed value
    pub energy_tolerance: f64,
    /// Confidence must exceed this (strict)
    pub min_confidence: f64,
    /// Baseline consumption the observed value is credited against
    pub baseline: f64,
    /// Tokens minted per unit of energy saved
    pub conversion_rate: f64,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            energy_tolerance: 0.05,
            min_confidence: 0.95,
            baseline: 0.0,
            conversion_rate: 1.0,
        }
    }
}

/// Everything the validator needs about a committed round.
///
/// Carries the raw vote counts so the validator never trusts a
/// caller-asserted "it committed" without re-checking quorum itself.
#[derive(Clone, Debug)]
pub struct MintInput {
    /// Round that committed
    pub round_id: RoundId,
    /// The committed (leader-proposed) value
    pub committed_value: f64,
    /// Independently observed value
    pub observed_value: f64,
    /// Raw ACCEPT count from the round
    pub accepted_votes: usize,
    /// Quorum requirement (2f+1) for the committee
    pub required_votes: usize,
    /// Leader confidence for the proposal
    pub confidence: f64,
}

/// The validator's ruling. Created once per committed round; immutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MintDecision {
    /// Round the decision is for
    pub round_id: RoundId,
    /// Whether to mint
    pub should_mint: bool,
    /// Amount to mint (0 when refused)
    pub amount: f64,
    /// "3-factor validation passed" or the first failing factor
    pub reason: String,
    /// First failing factor, if any
    pub failed_factor: Option<MintFactor>,
    /// When the decision was made
    pub evaluated_at: Timestamp,
}

/// Pure three-factor gate in front of the ledger.
#[derive(Clone, Debug, Default)]
pub struct MintValidator {
    config: MintConfig,
}

impl MintValidator {
    /// Create a validator.
    pub fn new(config: MintConfig) -> Self {
        Self { config }
    }

    /// Whether committed and observed values agree within tolerance.
    /// Fails closed when the observed value is zero.
    fn energy_match(&self, committed: f64, observed: f64) -> bool {
        if observed == 0.0 {
            return false;
        }
        (committed - observed).abs() / observed.abs() < self.config.energy_tolerance
    }

    /// Apply the gate. Factors are checked in the fixed order
    /// energy -> consensus -> confidence; the first failure sets the reason.
    pub fn evaluate(&self, input: &MintInput) -> MintDecision {
        let failed = if !self.energy_match(input.committed_value, input.observed_value) {
            Some((
                MintFactor::EnergyMatch,
                format!(
                    "energy match failed: committed {} vs observed {} exceeds {:.0}% tolerance",
                    input.committed_value,
                    input.observed_value,
                    self.config.energy_tolerance * 100.0
                ),
            ))
        } else if input.accepted_votes < input.required_votes {
            Some((
                MintFactor::Consensus,
                format!(
                    "consensus not reached: {} of {} required votes",
                    input.accepted_votes, input.required_votes
                ),
            ))
        } else if input.confidence <= self.config.min_confidence {
            Some((
                MintFactor::Confidence,
                format!(
                    "confidence below threshold: {} <= {}",
                    input.confidence, self.config.min_confidence
                ),
            ))
        } else {
            None
        };

        match failed {
            Some((factor, reason)) => MintDecision {
                round_id: input.round_id.clone(),
                should_mint: false,
                amount: 0.0,
                reason,
                failed_factor: Some(factor),
                evaluated_at: now(),
            },
            None => MintDecision {
                round_id: input.round_id.clone(),
                should_mint: true,
                amount: (self.config.baseline - input.observed_value).max(0.0)
                    * self.config.conversion_rate,
                reason: "3-factor validation passed".to_string(),
                failed_factor: None,
                evaluated_at: now(),
            },
        }
    }
}
