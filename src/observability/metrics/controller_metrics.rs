//! # Controller Metrics
//!
//! Metrics for controller operations: reconciliations, requeues and status writes.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec};
use std::sync::LazyLock;

// Controller reconciliation metrics
static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "node_agent_operator_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "node_agent_operator_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "node_agent_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

// Requeue metrics
static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "node_agent_operator_requeues_total",
            "Total number of reconciliation requeues",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

// Status metrics
static STATUS_UPDATES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "node_agent_operator_status_updates_total",
        "Total number of status writes",
    )
    .expect("Failed to create STATUS_UPDATES_TOTAL metric - this should never happen")
});

static STATUS_UPDATES_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "node_agent_operator_status_updates_skipped_total",
        "Total number of status writes skipped because conditions were unchanged",
    )
    .expect("Failed to create STATUS_UPDATES_SKIPPED_TOTAL metric - this should never happen")
});

/// Register controller metrics with the registry
pub(crate) fn register_controller_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_UPDATES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_UPDATES_SKIPPED_TOTAL.clone()))?;
    Ok(())
}

// Public functions for controller metrics

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_status_updates() {
    STATUS_UPDATES_TOTAL.inc();
}

pub fn increment_status_updates_skipped() {
    STATUS_UPDATES_SKIPPED_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.with_label_values(&["NodeAgent"]).get();
        increment_reconciliations("NodeAgent");
        let after = RECONCILIATIONS_TOTAL.with_label_values(&["NodeAgent"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_reconciliation_errors() {
        let before = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["NodeScanner"])
            .get();
        increment_reconciliation_errors("NodeScanner");
        let after = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["NodeScanner"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        observe_reconciliation_duration("NodeAgent", 1.5);
        let count = RECONCILIATION_DURATION
            .with_label_values(&["NodeAgent"])
            .get_sample_count();
        assert!(count >= 1);
    }

    #[test]
    fn test_increment_requeues_total() {
        let before = REQUEUES_TOTAL.with_label_values(&["test-reason"]).get();
        increment_requeues_total("test-reason");
        let after = REQUEUES_TOTAL.with_label_values(&["test-reason"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_status_update_counters() {
        let written = STATUS_UPDATES_TOTAL.get();
        let skipped = STATUS_UPDATES_SKIPPED_TOTAL.get();
        increment_status_updates();
        increment_status_updates_skipped();
        assert!(STATUS_UPDATES_TOTAL.get() > written);
        assert!(STATUS_UPDATES_SKIPPED_TOTAL.get() > skipped);
    }
}
