//! # Credential Metrics
//!
//! Metrics for the credential issuer and the expiry watcher.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec};
use std::sync::LazyLock;

static CREDENTIAL_ROTATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "node_agent_operator_credential_rotations_total",
        "Total number of credentials issued or reissued",
    )
    .expect("Failed to create CREDENTIAL_ROTATIONS_TOTAL metric - this should never happen")
});

static CREDENTIAL_DELETIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "node_agent_operator_credential_deletions_total",
            "Total number of credential secrets deleted by the expiry watcher",
        ),
        &["reason"],
    )
    .expect("Failed to create CREDENTIAL_DELETIONS_TOTAL metric - this should never happen")
});

/// Register credential metrics with the registry
pub(crate) fn register_credential_metrics() -> Result<()> {
    REGISTRY.register(Box::new(CREDENTIAL_ROTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_DELETIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_credential_rotations() {
    CREDENTIAL_ROTATIONS_TOTAL.inc();
}

pub fn increment_credential_deletions(reason: &str) {
    CREDENTIAL_DELETIONS_TOTAL.with_label_values(&[reason]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_credential_rotations() {
        let before = CREDENTIAL_ROTATIONS_TOTAL.get();
        increment_credential_rotations();
        assert!(CREDENTIAL_ROTATIONS_TOTAL.get() > before);
    }

    #[test]
    fn test_increment_credential_deletions() {
        let before = CREDENTIAL_DELETIONS_TOTAL
            .with_label_values(&["expiring"])
            .get();
        increment_credential_deletions("expiring");
        let after = CREDENTIAL_DELETIONS_TOTAL
            .with_label_values(&["expiring"])
            .get();
        assert_eq!(after, before + 1u64);
    }
}
