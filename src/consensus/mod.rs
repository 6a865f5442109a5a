//! Shadow Twin Consensus: single-round, single-value BFT agreement.

pub mod coordinator;
pub mod quorum;
pub mod round;
pub mod twin;

pub use coordinator::{CancelHandle, CoordinatorConfig, RoundCoordinator, RoundReport};
pub use quorum::{fault_bound, required_accepts, QuorumOutcome, QuorumResult};
pub use round::{
    Proposal, Round, RoundOutcome, RoundPhase, RoundStatus, RoundStatusHandle, Vote,
    VoteDisposition, VoteTally,
};
pub use twin::{Committee, PredictorTwin, TwinBallot, TwinClient, TwinFault, TwinFaultKind, TwinRecord};
