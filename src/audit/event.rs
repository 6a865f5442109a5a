//! Audit event union.
//!
//! Every proposal, vote, round close, mint decision, and ledger mutation is
//! recorded as one of these variants, so a crashed round leaves a
//! reconstructable trail.

use crate::consensus::quorum::QuorumResult;
use crate::consensus::round::{Proposal, RoundOutcome, Vote, VoteDisposition};
use crate::core::{RoundId, TwinId};
use crate::ledger::LedgerRecord;
use crate::minting::MintDecision;
use serde::{Deserialize, Serialize};

/// A single audit record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuditEvent {
    /// A proposal was recorded (IDLE -> PROPOSED)
    ProposalLogged { proposal: Proposal },
    /// A vote or twin response was handled, with its disposition
    VoteLogged {
        round_id: RoundId,
        twin_id: TwinId,
        disposition: VoteDisposition,
        vote: Option<Vote>,
    },
    /// A round reached a terminal phase
    RoundClosed {
        round_id: RoundId,
        outcome: RoundOutcome,
        quorum: QuorumResult,
    },
    /// The mint validator ruled on a committed round
    MintDecided { decision: MintDecision },
    /// The ledger applied (or was about to apply) a mutation
    LedgerMutation { record: LedgerRecord },
}

impl AuditEvent {
    /// Short label for logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            AuditEvent::ProposalLogged { .. } => "proposal_logged",
            AuditEvent::VoteLogged { .. } => "vote_logged",
            AuditEvent::RoundClosed { .. } => "round_closed",
            AuditEvent::MintDecided { .. } => "mint_decided",
            AuditEvent::LedgerMutation { .. } => "ledger_mutation",
        }
    }

    /// The round this event belongs to, if any.
    pub fn round_id(&self) -> Option<&RoundId> {
        match self {
            AuditEvent::ProposalLogged { proposal } => Some(&proposal.round_id),
            AuditEvent::VoteLogged { round_id, .. } => Some(round_id),
            AuditEvent::RoundClosed { round_id, .. } => Some(round_id),
            AuditEvent::MintDecided { decision } => Some(&decision.round_id),
            AuditEvent::LedgerMutation { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::now;

    #[test]
    fn test_labels() {
        let rid = RoundId::generate();
        let event = AuditEvent::VoteLogged {
            round_id: rid.clone(),
            twin_id: TwinId::new("a"),
            disposition: VoteDisposition::Counted,
            vote: None,
        };
        assert_eq!(event.label(), "vote_logged");
        assert_eq!(event.round_id(), Some(&rid));
    }

    #[test]
    fn test_event_json_roundtrip() {
        let proposal = Proposal {
            round_id: RoundId::generate(),
            leader_id: TwinId::new("leader"),
            proposed_value: 100.0,
            proposed_confidence: 0.97,
            created_at: now(),
        };
        let event = AuditEvent::ProposalLogged { proposal };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.label(), "proposal_logged");
    }
}
