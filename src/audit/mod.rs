//! Append-only audit trail for rounds, mint decisions, and ledger mutations.

pub mod event;
pub mod jsonl;
pub mod log;
pub mod memory;

pub use event::AuditEvent;
pub use jsonl::JsonlAuditLog;
pub use log::AuditLog;
pub use memory::{MemoryAuditLog, SealedEvent};
