//! In-memory audit log with a tamper-evident hash chain.
//!
//! Reference and test implementation: ordered, reconstructable, and
//! verifiable. Each sealed entry hashes its sequence number, the previous
//! entry's hash, and the JSON body.

use crate::audit::event::AuditEvent;
use crate::audit::log::AuditLog;
use crate::core::{Error, Result, RoundId};
use sha3::{Digest, Sha3_256};
use std::sync::RwLock;

/// Hex digest of 32 zero bytes, used as the chain genesis.
fn genesis_hash() -> String {
    hex::encode([0u8; 32])
}

/// One appended event plus its chain position.
#[derive(Clone, Debug)]
pub struct SealedEvent {
    /// Position in the log, starting at 0
    pub seq: u64,
    /// The recorded event
    pub event: AuditEvent,
    /// SHA3-256 over (seq, prev_hash, body), hex encoded
    pub hash: String,
    /// Hash of the previous entry (genesis hash for seq 0)
    pub prev_hash: String,
}

/// Append-only in-memory audit log.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<SealedEvent>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn seal(seq: u64, prev_hash: &str, body: &[u8]) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(seq.to_le_bytes());
        hasher.update(prev_hash.as_bytes());
        hasher.update(body);
        hex::encode(hasher.finalize())
    }

    /// Number of entries recorded.
    pub fn len(&self) -> usize {
        self.entries.read().expect("audit lock poisoned").len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all recorded events, in append order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.entries
            .read()
            .expect("audit lock poisoned")
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }

    /// Snapshot of sealed entries, in append order.
    pub fn sealed(&self) -> Vec<SealedEvent> {
        self.entries.read().expect("audit lock poisoned").clone()
    }

    /// Events belonging to one round, in append order.
    pub fn events_for_round(&self, round_id: &RoundId) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.round_id() == Some(round_id))
            .collect()
    }

    /// Walk the chain and verify every hash link.
    pub fn verify(&self) -> bool {
        let entries = self.entries.read().expect("audit lock poisoned");
        let mut prev = genesis_hash();
        for (i, entry) in entries.iter().enumerate() {
            if entry.seq != i as u64 || entry.prev_hash != prev {
                return false;
            }
            let body = match serde_json::to_vec(&entry.event) {
                Ok(b) => b,
                Err(_) => return false,
            };
            if Self::seal(entry.seq, &entry.prev_hash, &body) != entry.hash {
                return false;
            }
            prev = entry.hash.clone();
        }
        true
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, event: AuditEvent) -> Result<()> {
        let body =
            serde_json::to_vec(&event).map_err(|e| Error::AuditAppend(e.to_string()))?;

        let mut entries = self.entries.write().expect("audit lock poisoned");
        let seq = entries.len() as u64;
        let prev_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(genesis_hash);
        let hash = Self::seal(seq, &prev_hash, &body);

        entries.push(SealedEvent {
            seq,
            event,
            hash,
            prev_hash,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::round::{Proposal, VoteDisposition};
    use crate::core::{now, TwinId};

    fn proposal_event(rid: &RoundId) -> AuditEvent {
        AuditEvent::ProposalLogged {
            proposal: Proposal {
                round_id: rid.clone(),
                leader_id: TwinId::new("leader"),
                proposed_value: 100.0,
                proposed_confidence: 0.97,
                created_at: now(),
            },
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let log = MemoryAuditLog::new();
        let r1 = RoundId::generate();
        let r2 = RoundId::generate();

        log.append(proposal_event(&r1)).unwrap();
        log.append(proposal_event(&r2)).unwrap();

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].round_id(), Some(&r1));
        assert_eq!(events[1].round_id(), Some(&r2));
    }

    #[test]
    fn test_chain_verifies() {
        let log = MemoryAuditLog::new();
        let rid = RoundId::generate();
        log.append(proposal_event(&rid)).unwrap();
        log.append(AuditEvent::VoteLogged {
            round_id: rid.clone(),
            twin_id: TwinId::new("a"),
            disposition: VoteDisposition::Counted,
            vote: None,
        })
        .unwrap();

        assert!(log.verify());
        let sealed = log.sealed();
        assert_eq!(sealed[1].prev_hash, sealed[0].hash);
    }

    #[test]
    fn test_events_for_round_filters() {
        let log = MemoryAuditLog::new();
        let r1 = RoundId::generate();
        let r2 = RoundId::generate();
        log.append(proposal_event(&r1)).unwrap();
        log.append(proposal_event(&r2)).unwrap();
        log.append(proposal_event(&r1)).unwrap();

        assert_eq!(log.events_for_round(&r1).len(), 2);
        assert_eq!(log.events_for_round(&r2).len(), 1);
    }

    #[test]
    fn test_empty_log_verifies() {
        let log = MemoryAuditLog::new();
        assert!(log.is_empty());
        assert!(log.verify());
    }
}
