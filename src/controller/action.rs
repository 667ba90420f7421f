//! # Step Outcomes
//!
//! The vocabulary every reconciliation step uses to report its outcome and how
//! the pass should continue.

use crate::controller::error::Error;

/// What the sequencer should do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Proceed to the next step
    #[default]
    Continue,
    /// End the pass and run it again after a short delay. Any error is dropped:
    /// the cause is a stale cache and the next pass is expected to succeed.
    Requeue,
    /// End the pass and ask to be run again soon, reporting any error
    Stop,
}

/// Outcome of a single step. The default value means the step fully succeeded.
#[derive(Debug, Default)]
pub struct StepResult {
    pub action: Action,
    pub error: Option<Error>,
}

impl StepResult {
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn requeue() -> Self {
        Self {
            action: Action::Requeue,
            error: None,
        }
    }

    #[must_use]
    pub fn stop() -> Self {
        Self {
            action: Action::Stop,
            error: None,
        }
    }

    #[must_use]
    pub fn fail(action: Action, error: Error) -> Self {
        Self {
            action,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.action == Action::Continue && self.error.is_none()
    }
}
