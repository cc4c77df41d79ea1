//! 调度核心：与 I/O 无关的请求决策（解析、校验、构造请求）。
//!
//! # Dispatch Core
//!
//! Pure decision functions shared by the async and blocking clients. Nothing
//! here performs I/O: the drivers in [`crate::client`] resolve a descriptor,
//! hand its schema to [`plan_request`], wait on the rate limiter, then execute
//! the returned [`HttpRequest`](crate::transport::HttpRequest).
//!
//! Per call the drivers walk the [`CallState`] machine:
//!
//! ```text
//! Resolving -> SchemaReady -> Validated -> RateAdmitted -> InFlight -> Shaped
//!     \____________\_____________\_____________\_____________\--> Failed
//! ```

mod plan;
mod query;

pub use plan::{
    check_login, check_options, login_request, logout_request, modeldef_request,
    offline_predicates, plan_request, validate_predicates, RequestPlan,
};
pub use query::{Query, ResponseMode};

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Resolving,
    SchemaReady,
    Validated,
    RateAdmitted,
    InFlight,
    Shaped,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Shaped | CallState::Failed)
    }

    pub fn can_transition(self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Failed) => true,
            (Resolving, SchemaReady)
            | (SchemaReady, Validated)
            | (Validated, RateAdmitted)
            | (RateAdmitted, InFlight)
            | (InFlight, Shaped) => true,
            // A rate violation sends the call back to the limiter once.
            (InFlight, RateAdmitted) => true,
            _ => false,
        }
    }
}

/// Tracks one logical call through [`CallState`].
#[derive(Debug)]
pub struct CallTracker {
    key: String,
    state: CallState,
}

impl CallTracker {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: CallState::Resolving,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn advance(&mut self, next: CallState) {
        debug_assert!(
            self.state.can_transition(next),
            "illegal call transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(class = %self.key, from = ?self.state, to = ?next, "call state");
        self.state = next;
    }

    /// Mark the call failed and hand the error back.
    pub fn fail(&mut self, err: crate::Error) -> crate::Error {
        if !self.state.is_terminal() {
            self.advance(CallState::Failed);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut call = CallTracker::new("basicspacedata.gp");
        for next in [
            CallState::SchemaReady,
            CallState::Validated,
            CallState::RateAdmitted,
            CallState::InFlight,
            CallState::Shaped,
        ] {
            call.advance(next);
        }
        assert!(call.state().is_terminal());
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!CallState::Shaped.can_transition(CallState::Failed));
        assert!(!CallState::Failed.can_transition(CallState::Resolving));
        assert!(CallState::Validated.can_transition(CallState::Failed));
        assert!(!CallState::Resolving.can_transition(CallState::InFlight));
    }

    #[test]
    fn fail_from_any_live_state() {
        let mut call = CallTracker::new("x.y");
        call.advance(CallState::SchemaReady);
        let err = call.fail(crate::Error::InvalidOptions("x".into()));
        assert!(matches!(err, crate::Error::InvalidOptions(_)));
        assert_eq!(call.state(), CallState::Failed);
    }
}
