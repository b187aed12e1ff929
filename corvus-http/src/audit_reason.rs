//! Thread-local audit-reason propagation.
//!
//! `set_audit_reason` writes a per-thread slot; the next REST call issued
//! from the same thread consumes it into an `X-Audit-Log-Reason` header and
//! clears the slot, so two threads issuing concurrent requests never see
//! each other's reason. Grounded on the teacher's `request::AuditLogReason`
//! trait, generalized from a per-builder `.reason("...")` call to an
//! ambient slot.

use crate::error::{Error, ErrorType};
use std::cell::RefCell;

thread_local! {
    static AUDIT_REASON: RefCell<Option<String>> = const { RefCell::new(None) };
}

pub const AUDIT_REASON_MAX_LEN: usize = 512;

/// Set the reason to attach to the next REST call issued from this thread.
///
/// # Errors
///
/// Returns an error if `reason` exceeds [`AUDIT_REASON_MAX_LEN`] UTF-16 code
/// units.
pub fn set_audit_reason(reason: impl Into<String>) -> Result<(), Error> {
    let reason = reason.into();

    if reason.encode_utf16().count() > AUDIT_REASON_MAX_LEN {
        return Err(Error::new(ErrorType::BuildingRequest));
    }

    AUDIT_REASON.with(|slot| *slot.borrow_mut() = Some(reason));

    Ok(())
}

/// Take and clear this thread's pending audit reason, if any.
pub(crate) fn take_audit_reason() -> Option<String> {
    AUDIT_REASON.with(|slot| slot.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_take_clears_the_slot() {
        set_audit_reason("testing").unwrap();
        assert_eq!(take_audit_reason().as_deref(), Some("testing"));
        assert_eq!(take_audit_reason(), None);
    }

    #[test]
    fn reason_over_limit_is_rejected() {
        let reason = "x".repeat(AUDIT_REASON_MAX_LEN + 1);
        assert!(set_audit_reason(reason).is_err());
    }
}
