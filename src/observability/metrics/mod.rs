//! # Metrics Module
//!
//! Prometheus metrics for monitoring the operator, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and encoding
//! - `controller_metrics` - Reconciliations, requeues and status writes
//! - `credential_metrics` - Credential issuance and expiry

pub mod controller_metrics;
pub mod credential_metrics;
pub mod registry;

pub use controller_metrics::*;
pub use credential_metrics::*;
pub use registry::*;
