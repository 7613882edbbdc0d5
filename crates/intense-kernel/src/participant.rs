//! Participants: observers attached to AEther nodes.
//!
//! Every mutation of an AEther node is announced to the participants attached
//! at that node and at each of its ancestors. A participant sees the change
//! relative to where it is attached: `path` is `None` for its own node and the
//! suffix down to the changed node otherwise.
//!
//! Pure participants receive every change as an op through
//! [`Participant::apply_notify`]; the assign and clear forms are converted
//! before delivery.

use crate::context::Context;
use crate::dimension::CompoundDimension;
use crate::op::ContextOp;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Failure reported by a participant callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("participant failed: {message}")]
pub struct ParticipantError {
    pub message: String,
}

impl ParticipantError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type NotifyResult = std::result::Result<(), ParticipantError>;

/// Opaque token identifying who caused a change, passed through unchanged.
#[derive(Clone)]
pub struct Origin(Arc<dyn Any + Send + Sync>);

impl Origin {
    pub fn new(value: impl Any + Send + Sync) -> Self {
        Self(Arc::new(value))
    }

    /// Whether both tokens are the same allocation.
    pub fn same(&self, other: &Origin) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({:p})", Arc::as_ptr(&self.0))
    }
}

pub trait Participant: Send + Sync {
    fn apply_notify(
        &self,
        origin: Option<&Origin>,
        op: &ContextOp,
        path: Option<&CompoundDimension>,
    ) -> NotifyResult;

    fn assign_notify(
        &self,
        _origin: Option<&Origin>,
        _context: &Context,
        _path: Option<&CompoundDimension>,
    ) -> NotifyResult {
        Ok(())
    }

    fn clear_notify(&self, _origin: Option<&Origin>, _path: Option<&CompoundDimension>) -> NotifyResult {
        Ok(())
    }

    /// Called once when the participant is forcibly removed.
    fn kick_notify(&self, _origin: Option<&Origin>) -> NotifyResult {
        Ok(())
    }

    /// Pure participants get assign and clear events as ops.
    fn is_pure(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_identity_is_allocation() {
        let a = Origin::new("editor");
        let b = a.clone();
        let c = Origin::new("editor");
        assert!(a.same(&b));
        assert!(!a.same(&c));
        assert_eq!(a.downcast_ref::<&str>(), Some(&"editor"));
        assert!(a.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn error_message() {
        let err = ParticipantError::new("socket closed");
        assert_eq!(err.to_string(), "participant failed: socket closed");
    }
}
