//! AuditLog trait definition.

use crate::audit::event::AuditEvent;
use crate::core::Result;

/// Append-only audit sink.
///
/// The coordinator and ledger follow log-then-act: an event must be durably
/// appended before the transition it describes takes effect. Implementations
/// must therefore make `append` durable before returning, and surface any
/// failure as [`crate::core::Error::AuditAppend`] so callers can fail the
/// round closed rather than act without a trail.
pub trait AuditLog: Send + Sync {
    /// Durably append one event.
    fn append(&self, event: AuditEvent) -> Result<()>;
}
