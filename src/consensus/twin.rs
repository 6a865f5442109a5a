//! Twin clients and committee membership.
//!
//! A twin wraps one independent predictor. During VOTING the coordinator
//! asks every reachable twin to evaluate the leader's proposal against its
//! own observation.

use crate::core::{Result, RoundId, TwinId};
use crate::predictor::Predictor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Fault class for a failed vote request, serializable for audit records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwinFaultKind {
    /// No response within the per-twin budget
    Timeout,
    /// Twin known or found to be unreachable
    Unreachable,
    /// Response arrived but could not be interpreted
    Malformed,
}

/// A failed vote request. All variants are treated as a non-vote.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TwinFault {
    #[error("twin timed out")]
    Timeout,

    #[error("twin unreachable")]
    Unreachable,

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl TwinFault {
    /// Fault class for logging.
    pub fn kind(&self) -> TwinFaultKind {
        match self {
            TwinFault::Timeout => TwinFaultKind::Timeout,
            TwinFault::Unreachable => TwinFaultKind::Unreachable,
            TwinFault::MalformedResponse(_) => TwinFaultKind::Malformed,
        }
    }

    /// Whether the fault counts toward the twin's liveness strikes.
    pub fn is_liveness(&self) -> bool {
        matches!(self, TwinFault::Timeout | TwinFault::Unreachable)
    }
}

/// A twin's answer to a vote request.
#[derive(Clone, Copy, Debug)]
pub struct TwinBallot {
    /// ACCEPT (true) or REJECT (false)
    pub accept: bool,
    /// The twin's own observed value
    pub observed_value: f64,
}

/// Client interface to one twin.
///
/// Transport failures surface as [`TwinFault`]; the coordinator additionally
/// enforces a per-call budget, so implementations need not self-limit.
#[async_trait]
pub trait TwinClient: Send + Sync {
    /// This twin's identity.
    fn id(&self) -> TwinId;

    /// Ask the twin to evaluate a proposal. `budget` is the response budget
    /// the coordinator grants this call.
    async fn request_vote(
        &self,
        round_id: &RoundId,
        proposed_value: f64,
        budget: Duration,
    ) -> std::result::Result<TwinBallot, TwinFault>;
}

/// Local twin wrapping a predictor.
///
/// Votes ACCEPT iff `|proposed - observed| < epsilon`, where epsilon is the
/// committee's agreement tolerance.
pub struct PredictorTwin {
    id: TwinId,
    predictor: Arc<dyn Predictor>,
    epsilon: f64,
}

impl PredictorTwin {
    /// Create a twin over a predictor with the committee tolerance.
    pub fn new(id: TwinId, predictor: Arc<dyn Predictor>, epsilon: f64) -> Self {
        Self {
            id,
            predictor,
            epsilon,
        }
    }
}

#[async_trait]
impl TwinClient for PredictorTwin {
    fn id(&self) -> TwinId {
        self.id.clone()
    }

    async fn request_vote(
        &self,
        _round_id: &RoundId,
        proposed_value: f64,
        _budget: Duration,
    ) -> std::result::Result<TwinBallot, TwinFault> {
        let estimate = self
            .predictor
            .predict()
            .map_err(|e| TwinFault::MalformedResponse(e.to_string()))?;

        Ok(TwinBallot {
            accept: (proposed_value - estimate.value).abs() < self.epsilon,
            observed_value: estimate.value,
        })
    }
}

/// Liveness record for one committee seat.
#[derive(Clone, Debug)]
pub struct TwinRecord {
    /// Twin identity
    pub id: TwinId,
    /// Reachable for fan-out
    pub reachable: bool,
    /// Consecutive liveness faults across rounds
    pub consecutive_faults: u32,
}

struct Seat {
    client: Arc<dyn TwinClient>,
    record: TwinRecord,
}

/// A fixed consensus committee.
///
/// Membership is set at formation and persists across rounds. The fault
/// bound f is derived from the full committee size; marking a twin
/// unreachable only shrinks the fan-out, never the quorum requirement.
pub struct Committee {
    seats: Vec<Seat>,
    unreachable_after: u32,
}

impl Committee {
    /// Form a committee. `unreachable_after` is the consecutive-fault count
    /// at which a twin stops being queried.
    pub fn new(clients: Vec<Arc<dyn TwinClient>>, unreachable_after: u32) -> Self {
        let seats = clients
            .into_iter()
            .map(|client| {
                let id = client.id();
                Seat {
                    client,
                    record: TwinRecord {
                        id,
                        reachable: true,
                        consecutive_faults: 0,
                    },
                }
            })
            .collect();
        Self {
            seats,
            unreachable_after: unreachable_after.max(1),
        }
    }

    /// Committee size (fixes the fault bound).
    pub fn size(&self) -> usize {
        self.seats.len()
    }

    /// Whether the twin is a committee member.
    pub fn contains(&self, id: &TwinId) -> bool {
        self.seats.iter().any(|s| s.record.id == *id)
    }

    /// Clients currently reachable for fan-out.
    pub fn reachable_clients(&self) -> Vec<Arc<dyn TwinClient>> {
        self.seats
            .iter()
            .filter(|s| s.record.reachable)
            .map(|s| Arc::clone(&s.client))
            .collect()
    }

    /// Liveness records for observability.
    pub fn records(&self) -> Vec<TwinRecord> {
        self.seats.iter().map(|s| s.record.clone()).collect()
    }

    /// Record a liveness fault; marks the twin unreachable at the threshold.
    pub fn record_fault(&mut self, id: &TwinId) {
        let threshold = self.unreachable_after;
        if let Some(seat) = self.seats.iter_mut().find(|s| s.record.id == *id) {
            seat.record.consecutive_faults += 1;
            if seat.record.consecutive_faults >= threshold {
                seat.record.reachable = false;
            }
        }
    }

    /// Record a successful response; resets the fault streak.
    pub fn record_success(&mut self, id: &TwinId) {
        if let Some(seat) = self.seats.iter_mut().find(|s| s.record.id == *id) {
            seat.record.consecutive_faults = 0;
            seat.record.reachable = true;
        }
    }
}
