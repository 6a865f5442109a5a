//! Round coordinator: drives one consensus round through
//! PROPOSED -> VOTING -> COMMITTED/ABORTED.
//!
//! One round is in flight at a time per committee. Twins are queried
//! concurrently during VOTING with a per-twin response budget and an
//! aggregate phase deadline. Every transition is logged to the audit trail
//! before it takes effect (log-then-act); an audit append failure fails the
//! round closed.

use crate::audit::event::AuditEvent;
use crate::audit::log::AuditLog;
use crate::consensus::quorum::{self, QuorumOutcome, QuorumResult};
use crate::consensus::round::{
    Proposal, Round, RoundOutcome, RoundPhase, RoundStatus, RoundStatusHandle, Vote,
    VoteDisposition, VoteTally,
};
use crate::consensus::twin::{Committee, TwinFault};
use crate::core::{now, Error, Result, RoundId, TwinId};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Hard ceiling on the voting phase
    pub phase_timeout: Duration,
    /// Response budget granted to each twin individually
    pub twin_response_budget: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(5),
            twin_response_budget: Duration::from_secs(2),
        }
    }
}

/// Handle for cancelling an in-flight round from outside the coordinator.
///
/// Cancellation is honored only while the round is PROPOSED or VOTING;
/// terminal rounds are unaffected.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<RoundId>>>,
}

impl CancelHandle {
    /// Request cancellation of the given round.
    pub fn cancel(&self, round_id: &RoundId) {
        self.tx.send_replace(Some(round_id.clone()));
    }
}

/// Everything a closed round hands off: the archived round, its proposal,
/// the full vote set, and the quorum evaluation.
#[derive(Clone, Debug)]
pub struct RoundReport {
    /// The round in its terminal phase
    pub round: Round,
    /// The leader's proposal
    pub proposal: Proposal,
    /// How the round ended
    pub outcome: RoundOutcome,
    /// Quorum evaluation over the counted votes
    pub quorum: QuorumResult,
    /// Counted votes, in arrival order
    pub votes: Vec<Vote>,
}

impl RoundReport {
    /// Whether the round committed.
    pub fn committed(&self) -> bool {
        self.outcome == RoundOutcome::Committed
    }
}

/// Drives consensus rounds for one committee.
pub struct RoundCoordinator {
    committee: Committee,
    audit: Arc<dyn AuditLog>,
    config: CoordinatorConfig,
    status: RoundStatusHandle,
    cancel_tx: Arc<watch::Sender<Option<RoundId>>>,
    cancel_rx: watch::Receiver<Option<RoundId>>,
    active: Option<RoundId>,
    archive: Vec<RoundReport>,
}

impl RoundCoordinator {
    /// Create a coordinator over a non-empty committee.
    pub fn new(
        committee: Committee,
        audit: Arc<dyn AuditLog>,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        if committee.size() == 0 {
            return Err(Error::EmptyCommittee);
        }
        let (cancel_tx, cancel_rx) = watch::channel(None);
        Ok(Self {
            committee,
            audit,
            config,
            status: RoundStatusHandle::new(),
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
            active: None,
            archive: Vec::new(),
        })
    }

    /// Non-blocking view of the current round status.
    pub fn status_handle(&self) -> RoundStatusHandle {
        self.status.clone()
    }

    /// Handle for cancelling an in-flight round.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Committee membership and liveness records.
    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    /// Closed rounds, oldest first.
    pub fn archive(&self) -> &[RoundReport] {
        &self.archive
    }

    /// Status snapshot of a specific round (the active one or an archived
    /// one). Never blocks on an in-flight VOTING phase.
    pub fn round_status(&self, round_id: &RoundId) -> Option<RoundStatus> {
        if let Some(status) = self.status.get() {
            if status.round_id == *round_id {
                return Some(status);
            }
        }
        self.archive
            .iter()
            .find(|r| r.round.round_id == *round_id)
            .map(|r| RoundStatus {
                round_id: r.round.round_id.clone(),
                phase: r.round.phase,
                votes_so_far: r.votes.len(),
                accepted_so_far: r.quorum.accepted_votes,
                deadline: r.round.deadline,
            })
    }

    /// Handle a vote arriving outside an active voting phase.
    ///
    /// Such votes are protocol violations: they are logged with their
    /// disposition and discarded, never treated as fatal.
    pub fn submit_vote(&mut self, vote: Vote) -> Result<VoteDisposition> {
        let disposition = if self
            .archive
            .iter()
            .any(|r| r.round.round_id == vote.round_id)
        {
            VoteDisposition::ClosedRound
        } else {
            VoteDisposition::UnknownRound
        };

        warn!(
            round = %vote.round_id,
            twin = %vote.twin_id,
            ?disposition,
            "discarding out-of-round vote"
        );
        self.audit.append(AuditEvent::VoteLogged {
            round_id: vote.round_id.clone(),
            twin_id: vote.twin_id.clone(),
            disposition,
            vote: Some(vote),
        })?;
        Ok(disposition)
    }

    /// Run one full round: propose, broadcast, collect votes, close.
    ///
    /// Commits the instant `2f+1` ACCEPTs are counted; aborts early only
    /// when quorum has become mathematically impossible; otherwise waits
    /// out the phase deadline. Returns the closed round's report.
    pub async fn run_round(
        &mut self,
        leader_id: &TwinId,
        proposed_value: f64,
        proposed_confidence: f64,
    ) -> Result<RoundReport> {
        if let Some(active) = &self.active {
            return Err(Error::RoundInProgress(active.clone()));
        }
        if !self.committee.contains(leader_id) {
            return Err(Error::UnknownTwin(leader_id.clone()));
        }

        let round_id = RoundId::generate();
        let deadline =
            now() + chrono::Duration::milliseconds(self.config.phase_timeout.as_millis() as i64);
        let proposal = Proposal::new(
            round_id.clone(),
            leader_id.clone(),
            proposed_value,
            proposed_confidence,
        );

        // IDLE -> PROPOSED (log-then-act).
        self.audit.append(AuditEvent::ProposalLogged {
            proposal: proposal.clone(),
        })?;
        self.active = Some(round_id.clone());
        let mut round = Round {
            round_id: round_id.clone(),
            leader_id: leader_id.clone(),
            started_at: proposal.created_at,
            phase: RoundPhase::Proposed,
            deadline,
        };
        self.status.set(RoundStatus {
            round_id: round_id.clone(),
            phase: RoundPhase::Proposed,
            votes_so_far: 0,
            accepted_so_far: 0,
            deadline,
        });
        info!(round = %round_id, leader = %leader_id, value = proposed_value, "round proposed");

        // PROPOSED -> VOTING: fan out to every reachable twin.
        round.phase = RoundPhase::Voting;
        let committee_size = self.committee.size();
        let queried = self.committee.reachable_clients();
        let mut tally = VoteTally::new(round_id.clone(), committee_size, queried.len());
        self.status.set(RoundStatus {
            round_id: round_id.clone(),
            phase: RoundPhase::Voting,
            votes_so_far: 0,
            accepted_so_far: 0,
            deadline,
        });

        let budget = self.config.twin_response_budget;
        let mut pending: FuturesUnordered<_> = queried
            .into_iter()
            .map(|client| {
                let rid = round_id.clone();
                async move {
                    let id = client.id();
                    match tokio::time::timeout(
                        budget,
                        client.request_vote(&rid, proposed_value, budget),
                    )
                    .await
                    {
                        Ok(res) => (id, res),
                        Err(_) => (id, Err(TwinFault::Timeout)),
                    }
                }
            })
            .collect();

        // Disjoint field borrows for the select loop.
        let committee = &mut self.committee;
        let cancel_rx = &mut self.cancel_rx;
        let audit = Arc::clone(&self.audit);
        let status = self.status.clone();

        cancel_rx.mark_unchanged();
        let sleep = tokio::time::sleep(self.config.phase_timeout);
        tokio::pin!(sleep);

        let mut deadline_elapsed = false;
        let mut cancelled = false;
        let mut fatal: Option<Error> = None;

        loop {
            if tally.quorum_reached() || tally.commit_impossible() {
                break;
            }
            tokio::select! {
                response = pending.next() => {
                    let (twin_id, res) = match response {
                        Some(r) => r,
                        // Every queried twin responded; the checks above
                        // decide on the next iteration.
                        None => continue,
                    };
                    match res {
                        Ok(ballot) => {
                            committee.record_success(&twin_id);
                            let vote = Vote {
                                round_id: round_id.clone(),
                                twin_id: twin_id.clone(),
                                accept: ballot.accept,
                                observed_value: ballot.observed_value,
                                cast_at: now(),
                            };
                            let disposition = if tally.has_voted(&twin_id) {
                                warn!(round = %round_id, twin = %twin_id, "duplicate vote discarded");
                                VoteDisposition::Duplicate
                            } else {
                                VoteDisposition::Counted
                            };
                            if let Err(e) = audit.append(AuditEvent::VoteLogged {
                                round_id: round_id.clone(),
                                twin_id: twin_id.clone(),
                                disposition,
                                vote: Some(vote.clone()),
                            }) {
                                fatal = Some(e);
                                break;
                            }
                            if disposition == VoteDisposition::Counted {
                                tally.record_vote(vote);
                            }
                            debug!(
                                round = %round_id,
                                twin = %twin_id,
                                accepted = tally.accepted(),
                                required = tally.required(),
                                "vote counted"
                            );
                        }
                        Err(fault) => {
                            if fault.is_liveness() {
                                committee.record_fault(&twin_id);
                            }
                            warn!(round = %round_id, twin = %twin_id, %fault, "twin fault, counting as non-vote");
                            if let Err(e) = audit.append(AuditEvent::VoteLogged {
                                round_id: round_id.clone(),
                                twin_id: twin_id.clone(),
                                disposition: VoteDisposition::Fault(fault.kind()),
                                vote: None,
                            }) {
                                fatal = Some(e);
                                break;
                            }
                            tally.record_fault();
                        }
                    }
                    status.set(RoundStatus {
                        round_id: round_id.clone(),
                        phase: RoundPhase::Voting,
                        votes_so_far: tally.total_votes(),
                        accepted_so_far: tally.accepted(),
                        deadline,
                    });
                }
                _ = &mut sleep => {
                    deadline_elapsed = true;
                    break;
                }
                changed = cancel_rx.changed() => {
                    if changed.is_ok()
                        && cancel_rx.borrow_and_update().as_ref() == Some(&round_id)
                    {
                        cancelled = true;
                        break;
                    }
                }
            }
        }

        // Responses already in flight when the round was decided are logged
        // but never counted.
        while let Some(Some((twin_id, res))) = pending.next().now_or_never() {
            if fatal.is_some() {
                break;
            }
            if let Ok(ballot) = res {
                let vote = Vote {
                    round_id: round_id.clone(),
                    twin_id: twin_id.clone(),
                    accept: ballot.accept,
                    observed_value: ballot.observed_value,
                    cast_at: now(),
                };
                debug!(round = %round_id, twin = %twin_id, "late response, not counted");
                if let Err(e) = audit.append(AuditEvent::VoteLogged {
                    round_id: round_id.clone(),
                    twin_id,
                    disposition: VoteDisposition::Late,
                    vote: Some(vote),
                }) {
                    fatal = Some(e);
                }
            }
        }
        drop(pending);

        if let Some(e) = fatal {
            // Fail closed: the trail is broken, the round cannot close
            // normally.
            self.active = None;
            self.status.clear();
            return Err(e);
        }

        // VOTING -> COMMITTED/ABORTED.
        let quorum_result = quorum::evaluate(
            &round_id,
            tally.votes(),
            committee_size,
            proposed_value,
            deadline_elapsed,
        );
        let outcome = if cancelled {
            RoundOutcome::Cancelled
        } else {
            match quorum_result.outcome {
                QuorumOutcome::Accepted => RoundOutcome::Committed,
                QuorumOutcome::Rejected => RoundOutcome::Rejected,
                QuorumOutcome::TimedOut => RoundOutcome::TimedOut,
            }
        };

        if let Err(e) = self.audit.append(AuditEvent::RoundClosed {
            round_id: round_id.clone(),
            outcome,
            quorum: quorum_result.clone(),
        }) {
            self.active = None;
            self.status.clear();
            return Err(e);
        }

        round.phase = if outcome == RoundOutcome::Committed {
            RoundPhase::Committed
        } else {
            RoundPhase::Aborted
        };
        info!(
            round = %round_id,
            ?outcome,
            accepted = quorum_result.accepted_votes,
            required = quorum_result.required_votes,
            "round closed"
        );

        let report = RoundReport {
            round,
            proposal,
            outcome,
            quorum: quorum_result,
            votes: tally.votes().to_vec(),
        };

        // Terminal -> IDLE: archive and become ready for the next round.
        self.archive.push(report.clone());
        self.active = None;
        self.status.clear();

        Ok(report)
    }
}
