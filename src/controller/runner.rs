//! # Runner
//!
//! Executes an ordered list of steps strictly in sequence.
//!
//! - `Continue`: proceed, even if the step reported an error
//! - `Stop`: return at once, asking to run again soon, with the last recorded error
//! - `Requeue`: return at once, asking to run again after a short delay, with no error
//!
//! The last error reported by any step is kept until the end, so a pass whose
//! steps all said `Continue` still surfaces a best-effort failure.

use crate::controller::error::Error;
use crate::controller::step::Reconcile;
use crate::controller::store::ObjectStore;
use crate::controller::action::Action;
use std::time::Duration;
use tracing::{debug, warn};

/// When the pass should run again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Nothing special requested; wait for the next external trigger
    Idle,
    /// Run again as soon as possible
    Soon,
    /// Run again after the given delay
    After(Duration),
}

/// Outcome of a whole pass
#[derive(Debug)]
pub struct RunOutcome {
    pub schedule: Schedule,
    pub error: Option<Error>,
}

/// Sequencer for reconciliation steps
#[derive(Debug, Clone, Copy)]
pub struct Runner {
    requeue_delay: Duration,
}

impl Runner {
    #[must_use]
    pub fn new(requeue_delay: Duration) -> Self {
        Self { requeue_delay }
    }

    pub async fn run<R: Reconcile>(&self, steps: &[R], store: &dyn ObjectStore) -> RunOutcome {
        let mut last_error: Option<Error> = None;

        for (index, step) in steps.iter().enumerate() {
            let result = step.reconcile(store).await;

            if let Some(error) = result.error {
                warn!(step = index, description = %step.describe(), error = %error, "Step reported an error");
                last_error = Some(error);
            }

            match result.action {
                Action::Continue => {}
                Action::Stop => {
                    debug!(step = index, description = %step.describe(), "Step stopped the pass");
                    return RunOutcome {
                        schedule: Schedule::Soon,
                        error: last_error,
                    };
                }
                Action::Requeue => {
                    debug!(step = index, description = %step.describe(), "Step requeued the pass");
                    return RunOutcome {
                        schedule: Schedule::After(self.requeue_delay),
                        error: None,
                    };
                }
            }
        }

        RunOutcome {
            schedule: Schedule::Idle,
            error: last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::action::StepResult;
    use crate::controller::store::{MockObjectStore, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Step returning a fixed outcome and counting its invocations
    struct Scripted {
        action: Action,
        error: Option<&'static str>,
        calls: Arc<AtomicU32>,
    }

    impl Scripted {
        fn new(action: Action, error: Option<&'static str>) -> Self {
            Self {
                action,
                error,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl Reconcile for Scripted {
        async fn reconcile(&self, _store: &dyn ObjectStore) -> StepResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StepResult {
                action: self.action,
                error: self
                    .error
                    .map(|message| Error::Store(StoreError::Request(message.to_string()))),
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn runner() -> Runner {
        Runner::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_all_continue_is_idle() {
        let store = MockObjectStore::new();
        let steps = vec![
            Scripted::new(Action::Continue, None),
            Scripted::new(Action::Continue, None),
        ];
        let outcome = runner().run(&steps, &store).await;
        assert_eq!(outcome.schedule, Schedule::Idle);
        assert!(outcome.error.is_none());
        assert!(steps.iter().all(|s| s.calls.load(Ordering::SeqCst) == 1));
    }

    #[tokio::test]
    async fn test_stop_short_circuits_with_its_error() {
        let store = MockObjectStore::new();
        let steps = vec![
            Scripted::new(Action::Continue, None),
            Scripted::new(Action::Stop, Some("step two failed")),
            Scripted::new(Action::Continue, None),
        ];
        let outcome = runner().run(&steps, &store).await;
        assert_eq!(outcome.schedule, Schedule::Soon);
        assert_eq!(
            outcome.error.unwrap().to_string(),
            "request failed: step two failed"
        );
        assert_eq!(steps[2].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_requeue_suppresses_error() {
        let store = MockObjectStore::new();
        let steps = vec![
            Scripted::new(Action::Continue, Some("earlier")),
            Scripted::new(Action::Requeue, Some("stale cache")),
            Scripted::new(Action::Continue, None),
        ];
        let outcome = runner().run(&steps, &store).await;
        assert_eq!(outcome.schedule, Schedule::After(Duration::from_secs(5)));
        assert!(outcome.error.is_none());
        assert_eq!(steps[2].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_continue_error_surfaces_at_end() {
        let store = MockObjectStore::new();
        let steps = vec![
            Scripted::new(Action::Continue, Some("optional resource failed")),
            Scripted::new(Action::Continue, None),
        ];
        let outcome = runner().run(&steps, &store).await;
        assert_eq!(outcome.schedule, Schedule::Idle);
        assert!(outcome
            .error
            .unwrap()
            .to_string()
            .contains("optional resource failed"));
        assert_eq!(steps[1].calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_error_wins() {
        let store = MockObjectStore::new();
        let steps = vec![
            Scripted::new(Action::Continue, Some("first")),
            Scripted::new(Action::Continue, Some("second")),
            Scripted::new(Action::Stop, None),
        ];
        let outcome = runner().run(&steps, &store).await;
        assert_eq!(outcome.schedule, Schedule::Soon);
        assert!(outcome.error.unwrap().to_string().contains("second"));
    }

    #[tokio::test]
    async fn test_empty_list_is_idle() {
        let store = MockObjectStore::new();
        let steps: Vec<Scripted> = Vec::new();
        let outcome = runner().run(&steps, &store).await;
        assert_eq!(outcome.schedule, Schedule::Idle);
        assert!(outcome.error.is_none());
    }
}
