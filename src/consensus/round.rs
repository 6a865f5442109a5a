//! Round data model: proposals, votes, phases, and the vote tally.

use crate::consensus::quorum::required_accepts;
use crate::consensus::twin::TwinFaultKind;
use crate::core::{now, RoundId, Timestamp, TwinId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Phase of a consensus round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// No round in flight
    Idle,
    /// Proposal recorded, broadcast pending
    Proposed,
    /// Collecting votes
    Voting,
    /// Terminal: quorum reached
    Committed,
    /// Terminal: rejected, timed out, or cancelled
    Aborted,
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundPhase::Idle => write!(f, "IDLE"),
            RoundPhase::Proposed => write!(f, "PROPOSED"),
            RoundPhase::Voting => write!(f, "VOTING"),
            RoundPhase::Committed => write!(f, "COMMITTED"),
            RoundPhase::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// How a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    /// Quorum of ACCEPTs reached
    Committed,
    /// Quorum became mathematically impossible before the deadline
    Rejected,
    /// Deadline elapsed without quorum
    TimedOut,
    /// Operator abort while PROPOSED or VOTING
    Cancelled,
}

/// One active or archived consensus round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round {
    /// Round ID
    pub round_id: RoundId,
    /// Leader twin for this round
    pub leader_id: TwinId,
    /// When the round started
    pub started_at: Timestamp,
    /// Current phase
    pub phase: RoundPhase,
    /// Voting phase deadline
    pub deadline: Timestamp,
}

/// The leader's proposal. Immutable once created; exactly one per round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    /// Round ID
    pub round_id: RoundId,
    /// Proposing leader
    pub leader_id: TwinId,
    /// Proposed scalar value
    pub proposed_value: f64,
    /// Leader's confidence in the value (0-1)
    pub proposed_confidence: f64,
    /// Creation timestamp
    pub created_at: Timestamp,
}

impl Proposal {
    /// Create a proposal for a round.
    pub fn new(round_id: RoundId, leader_id: TwinId, value: f64, confidence: f64) -> Self {
        Self {
            round_id,
            leader_id,
            proposed_value: value,
            proposed_confidence: confidence,
            created_at: now(),
        }
    }
}

/// A single twin's vote. Immutable; at most one per (round, twin).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vote {
    /// Round being voted on
    pub round_id: RoundId,
    /// Voting twin
    pub twin_id: TwinId,
    /// ACCEPT (true) or REJECT (false)
    pub accept: bool,
    /// The twin's own observed value
    pub observed_value: f64,
    /// When the vote was cast
    pub cast_at: Timestamp,
}

/// What the coordinator did with an incoming vote or twin response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDisposition {
    /// Counted toward the tally
    Counted,
    /// Second vote from the same twin, discarded
    Duplicate,
    /// Arrived after the phase deadline, not counted
    Late,
    /// Vote for a round this coordinator does not know
    UnknownRound,
    /// Vote after the round reached a terminal phase
    ClosedRound,
    /// Twin fault treated as a non-vote
    Fault(TwinFaultKind),
}

impl VoteDisposition {
    /// Whether the disposition is a protocol violation (as opposed to a
    /// counted vote or a liveness fault).
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            VoteDisposition::Duplicate | VoteDisposition::UnknownRound | VoteDisposition::ClosedRound
        )
    }
}

/// Vote tally for one round.
///
/// Enforces the one-vote-per-twin rule and answers the two questions the
/// coordinator short-circuits on: is quorum already reached, and has quorum
/// become impossible.
#[derive(Clone, Debug)]
pub struct VoteTally {
    round_id: RoundId,
    committee_size: usize,
    queried: usize,
    votes: Vec<Vote>,
    voted: HashSet<TwinId>,
    faults: usize,
}

impl VoteTally {
    /// Create a tally. `committee_size` fixes the fault bound; `queried` is
    /// the number of reachable twins actually asked this round.
    pub fn new(round_id: RoundId, committee_size: usize, queried: usize) -> Self {
        Self {
            round_id,
            committee_size,
            queried,
            votes: Vec::new(),
            voted: HashSet::new(),
            faults: 0,
        }
    }

    /// ACCEPT votes required for quorum (2f+1).
    pub fn required(&self) -> usize {
        required_accepts(self.committee_size)
    }

    /// Record a vote. Returns `Duplicate` (and discards the vote) if the
    /// twin already voted in this round.
    pub fn record_vote(&mut self, vote: Vote) -> VoteDisposition {
        if self.voted.contains(&vote.twin_id) {
            return VoteDisposition::Duplicate;
        }
        self.voted.insert(vote.twin_id.clone());
        self.votes.push(vote);
        VoteDisposition::Counted
    }

    /// Record a twin fault (timeout/unreachable/malformed) as a non-vote.
    pub fn record_fault(&mut self) {
        self.faults += 1;
    }

    /// Whether the twin already voted in this round.
    pub fn has_voted(&self, twin_id: &TwinId) -> bool {
        self.voted.contains(twin_id)
    }

    /// Count of ACCEPT votes so far.
    pub fn accepted(&self) -> usize {
        self.votes.iter().filter(|v| v.accept).count()
    }

    /// Count of votes recorded (ACCEPT + REJECT).
    pub fn total_votes(&self) -> usize {
        self.votes.len()
    }

    /// Twins that responded in any way (vote or fault).
    pub fn responses(&self) -> usize {
        self.votes.len() + self.faults
    }

    /// Queried twins that have not responded yet.
    pub fn outstanding(&self) -> usize {
        self.queried.saturating_sub(self.responses())
    }

    /// Whether 2f+1 ACCEPTs have been counted.
    pub fn quorum_reached(&self) -> bool {
        self.accepted() >= self.required()
    }

    /// Whether reaching 2f+1 ACCEPTs is mathematically impossible even if
    /// every outstanding twin accepts.
    pub fn commit_impossible(&self) -> bool {
        self.accepted() + self.outstanding() < self.required()
    }

    /// Votes recorded so far, in arrival order.
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    /// Round this tally belongs to.
    pub fn round_id(&self) -> &RoundId {
        &self.round_id
    }

    /// Committee size fixed at round start.
    pub fn committee_size(&self) -> usize {
        self.committee_size
    }
}

/// Snapshot of an in-flight round for observability.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundStatus {
    /// Round ID
    pub round_id: RoundId,
    /// Current phase
    pub phase: RoundPhase,
    /// Votes counted so far
    pub votes_so_far: usize,
    /// ACCEPT votes so far
    pub accepted_so_far: usize,
    /// Voting phase deadline
    pub deadline: Timestamp,
}

impl RoundStatus {
    /// Time until the phase deadline, zero if already past.
    pub fn deadline_remaining(&self) -> chrono::Duration {
        (self.deadline - now()).max(chrono::Duration::zero())
    }
}

/// Shared, non-blocking view of the coordinator's current round status.
///
/// Safe to read concurrently with an in-flight VOTING phase; reads never
/// wait on vote collection.
#[derive(Clone, Default)]
pub struct RoundStatusHandle {
    inner: Arc<RwLock<Option<RoundStatus>>>,
}

impl RoundStatusHandle {
    /// Create an empty handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current round status, if any round is in flight.
    pub fn get(&self) -> Option<RoundStatus> {
        self.inner.read().expect("status lock poisoned").clone()
    }

    pub(crate) fn set(&self, status: RoundStatus) {
        *self.inner.write().expect("status lock poisoned") = Some(status);
    }

    pub(crate) fn clear(&self) {
        *self.inner.write().expect("status lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(round: &RoundId, twin: &str, accept: bool) -> Vote {
        Vote {
            round_id: round.clone(),
            twin_id: TwinId::new(twin),
            accept,
            observed_value: 100.0,
            cast_at: now(),
        }
    }

    #[test]
    fn test_tally_counts_accepts() {
        let rid = RoundId::generate();
        let mut tally = VoteTally::new(rid.clone(), 3, 3);
        assert_eq!(tally.required(), 3);

        tally.record_vote(vote(&rid, "a", true));
        tally.record_vote(vote(&rid, "b", false));
        assert_eq!(tally.accepted(), 1);
        assert_eq!(tally.total_votes(), 2);
        assert!(!tally.quorum_reached());
    }

    #[test]
    fn test_tally_discards_duplicate() {
        let rid = RoundId::generate();
        let mut tally = VoteTally::new(rid.clone(), 3, 3);

        assert_eq!(tally.record_vote(vote(&rid, "a", true)), VoteDisposition::Counted);
        // Re-vote flips to REJECT; must be discarded, first vote stands.
        assert_eq!(
            tally.record_vote(vote(&rid, "a", false)),
            VoteDisposition::Duplicate
        );
        assert_eq!(tally.total_votes(), 1);
        assert_eq!(tally.accepted(), 1);
    }

    #[test]
    fn test_commit_impossible_after_enough_rejects() {
        let rid = RoundId::generate();
        // n=4: f=1, required=3.
        let mut tally = VoteTally::new(rid.clone(), 4, 4);
        assert_eq!(tally.required(), 3);

        tally.record_vote(vote(&rid, "a", false));
        tally.record_vote(vote(&rid, "b", false));
        // accepted=0, outstanding=2 -> 0+2 < 3: impossible.
        assert!(tally.commit_impossible());
        assert!(!tally.quorum_reached());
    }

    #[test]
    fn test_faults_reduce_outstanding() {
        let rid = RoundId::generate();
        let mut tally = VoteTally::new(rid, 3, 3);
        tally.record_fault();
        // accepted=0, outstanding=2, required=3: impossible already.
        assert!(tally.commit_impossible());
    }

    #[test]
    fn test_quorum_reached_short_circuit_point() {
        let rid = RoundId::generate();
        let mut tally = VoteTally::new(rid.clone(), 3, 3);
        tally.record_vote(vote(&rid, "a", true));
        tally.record_vote(vote(&rid, "b", true));
        assert!(!tally.quorum_reached());
        tally.record_vote(vote(&rid, "c", true));
        assert!(tally.quorum_reached());
    }

    #[test]
    fn test_disposition_violation_classes() {
        assert!(VoteDisposition::Duplicate.is_violation());
        assert!(VoteDisposition::UnknownRound.is_violation());
        assert!(VoteDisposition::ClosedRound.is_violation());
        assert!(!VoteDisposition::Counted.is_violation());
        assert!(!VoteDisposition::Late.is_violation());
        assert!(!VoteDisposition::Fault(TwinFaultKind::Timeout).is_violation());
    }

    #[test]
    fn test_status_handle_snapshot() {
        let handle = RoundStatusHandle::new();
        assert!(handle.get().is_none());

        let rid = RoundId::generate();
        handle.set(RoundStatus {
            round_id: rid.clone(),
            phase: RoundPhase::Voting,
            votes_so_far: 2,
            accepted_so_far: 1,
            deadline: now() + chrono::Duration::seconds(5),
        });

        let status = handle.get().unwrap();
        assert_eq!(status.round_id, rid);
        assert_eq!(status.phase, RoundPhase::Voting);
        assert!(status.deadline_remaining() > chrono::Duration::zero());

        handle.clear();
        assert!(handle.get().is_none());
    }
}
