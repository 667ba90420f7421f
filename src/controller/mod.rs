//! # Controller
//!
//! Reconciliation machinery: the object store seam, the reconciliation steps,
//! the sequencer that runs them and the per-kind control loops built on top.

pub mod action;
pub mod backoff;
pub mod conditions;
pub mod credentials;
pub mod deleter;
pub mod error;
pub mod finalizer;
pub mod namespace;
pub mod reconciler;
pub mod retry;
pub mod runner;
pub mod status;
pub mod step;
pub mod store;
pub mod updater;
