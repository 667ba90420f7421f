//! # Node Agent Operator
//!
//! A Kubernetes operator that runs node-level agents as `DaemonSet`s and keeps
//! them converged toward their specifications.
//!
//! ## Overview
//!
//! Two specification kinds are watched:
//!
//! 1. **`NodeAgent`** - a namespaced agent with its service account, cluster
//!    RBAC, configuration, headless service and an optional short-lived bearer
//!    token secret that is rotated before it expires
//! 2. **`NodeScanner`** - a cluster-scoped scanner installed into a namespace
//!    the operator creates and removes
//!
//! Every pass runs an ordered list of idempotent steps, gates deletion behind a
//! cleanup marker and reports `Reconciled` and `Available` conditions.
//!
//! ## Features
//!
//! - **Server-side apply**: every desired object is applied in full under one field manager
//! - **Owner references**: namespaced objects are garbage collected with their owner
//! - **Credential rotation**: expiring tokens are deleted and reissued
//! - **Prometheus metrics**: exposed with the health probes on one HTTP port

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
pub mod template;
