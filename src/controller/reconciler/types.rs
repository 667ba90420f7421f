//! # Reconciler Types
//!
//! Shared context and error types of the controller loops.

use crate::config::OperatorConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::error::Error;
use crate::controller::retry::RetryPolicy;
use crate::controller::runner::Runner;
use crate::controller::store::{ObjectKey, ObjectStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ReconcilerError {
    #[error("reconciliation of {kind} {key} failed: {source}")]
    Pass {
        kind: String,
        key: ObjectKey,
        #[source]
        source: Error,
    },

    #[error("credential expiry check of {key} failed: {source}")]
    Expiry {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Context shared by every pass of every controller loop
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<OperatorConfig>,
    pub runner: Runner,
    pub status_retry: RetryPolicy,
    // Backoff state per resource (identified by kind/namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl Context {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, config: Arc<OperatorConfig>) -> Self {
        Self {
            runner: Runner::new(config.requeue_delay),
            status_retry: RetryPolicy::default(),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            store,
            config,
        }
    }

    /// Forget the error history of a resource after a clean pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}
