//! Pure quorum evaluation for one consensus round.
//!
//! Deterministic and side-effect-free, so the decision rule can be tested
//! independently of how (and when) votes were collected.

use crate::consensus::round::Vote;
use crate::core::RoundId;
use serde::{Deserialize, Serialize};

/// Byzantine fault bound for a committee of `n` twins.
///
/// Standard BFT gives `f = floor((n-1)/3)`. Committees here are small and
/// fixed (3-15 twins), and every committee is assumed to tolerate at least
/// one faulty twin, so the bound is floored at 1: a 3-twin committee has
/// f=1 and must vote unanimously to commit.
pub fn fault_bound(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    ((n - 1) / 3).max(1)
}

/// ACCEPT votes required for quorum: `2f+1`, capped at committee size.
///
/// The cap only matters for committees too small to seat `2f+1` distinct
/// twins (n < 3): those degenerate to requiring every member.
pub fn required_accepts(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (2 * fault_bound(n) + 1).min(n)
}

/// Outcome of a quorum evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuorumOutcome {
    /// 2f+1 ACCEPTs counted
    Accepted,
    /// Quorum became impossible before the deadline
    Rejected,
    /// Deadline elapsed without quorum
    TimedOut,
}

impl std::fmt::Display for QuorumOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuorumOutcome::Accepted => write!(f, "ACCEPTED"),
            QuorumOutcome::Rejected => write!(f, "REJECTED"),
            QuorumOutcome::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Result of evaluating a round's vote set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuorumResult {
    /// Round being closed
    pub round_id: RoundId,
    /// ACCEPT votes counted
    pub accepted_votes: usize,
    /// Votes counted in total (ACCEPT + REJECT)
    pub total_votes: usize,
    /// ACCEPT votes that were required (2f+1)
    pub required_votes: usize,
    /// Evaluation outcome
    pub outcome: QuorumOutcome,
    /// The leader's proposed value, adopted verbatim on ACCEPTED
    pub committed_value: Option<f64>,
}

/// Evaluate a vote set against the `2f+1` quorum rule.
///
/// `committee_size` is the committee size at round start; `proposed_value`
/// is the leader's value, committed as-is on success (never averaged).
/// `deadline_elapsed` distinguishes TIMED_OUT from REJECTED when quorum was
/// not reached. Order of `votes` is irrelevant; the decision is a pure
/// count.
pub fn evaluate(
    round_id: &RoundId,
    votes: &[Vote],
    committee_size: usize,
    proposed_value: f64,
    deadline_elapsed: bool,
) -> QuorumResult {
    let required = required_accepts(committee_size);
    let accepted = votes.iter().filter(|v| v.accept).count();

    let (outcome, committed_value) = if accepted >= required && required > 0 {
        (QuorumOutcome::Accepted, Some(proposed_value))
    } else if deadline_elapsed {
        (QuorumOutcome::TimedOut, None)
    } else {
        (QuorumOutcome::Rejected, None)
    };

    QuorumResult {
        round_id: round_id.clone(),
        accepted_votes: accepted,
        total_votes: votes.len(),
        required_votes: required,
        outcome,
        committed_value,
    }
}
