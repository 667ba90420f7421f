//! # Credential Expiry
//!
//! Companion loop for credential secrets. A secret is deleted once it is
//! within two refresh intervals of its recorded expiration, which makes the
//! issuer recreate it on its next pass. Secrets without a readable expiration
//! are not trusted and are deleted at once.
//!
//! Otherwise the secret is re-checked exactly when it becomes due.

use crate::constants::ANNOTATION_TOKEN_EXPIRATION;
use crate::controller::store::{api_resource, ObjectKey, ObjectStore, StoreError};
use crate::observability;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// What to do with an observed credential secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDecision {
    Delete(DeleteReason),
    RecheckIn(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    MissingExpiration,
    InvalidExpiration,
    Expiring,
}

impl DeleteReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeleteReason::MissingExpiration => "missing-expiration",
            DeleteReason::InvalidExpiration => "invalid-expiration",
            DeleteReason::Expiring => "expiring",
        }
    }
}

/// Parse the recorded expiration of a credential
pub fn expiration(annotations: Option<&BTreeMap<String, String>>) -> Result<DateTime<Utc>, DeleteReason> {
    let raw = annotations
        .and_then(|annotations| annotations.get(ANNOTATION_TOKEN_EXPIRATION))
        .ok_or(DeleteReason::MissingExpiration)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| DeleteReason::InvalidExpiration)
}

/// Decide on a secret observed at `now`. The trigger is `expiry - 2 * refresh_interval`.
#[must_use]
pub fn decide(
    annotations: Option<&BTreeMap<String, String>>,
    now: DateTime<Utc>,
    refresh_interval: Duration,
) -> ExpiryDecision {
    let expires_at = match expiration(annotations) {
        Ok(expires_at) => expires_at,
        Err(reason) => return ExpiryDecision::Delete(reason),
    };

    let lead = chrono::Duration::from_std(refresh_interval.saturating_mul(2))
        .unwrap_or(chrono::Duration::MAX);
    let trigger = expires_at
        .checked_sub_signed(lead)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    match (trigger - now).to_std() {
        Ok(remaining) if !remaining.is_zero() => ExpiryDecision::RecheckIn(remaining),
        _ => ExpiryDecision::Delete(DeleteReason::Expiring),
    }
}

/// Apply the expiry decision to one observed secret
pub async fn reconcile_secret(
    store: &dyn ObjectStore,
    key: &ObjectKey,
    annotations: Option<&BTreeMap<String, String>>,
    now: DateTime<Utc>,
    refresh_interval: Duration,
) -> Result<ExpiryDecision, StoreError> {
    let decision = decide(annotations, now, refresh_interval);
    if let ExpiryDecision::Delete(reason) = decision {
        match store.delete(&api_resource::<Secret>(), key).await {
            Ok(()) => {
                observability::metrics::increment_credential_deletions(reason.as_str());
                info!(secret = %key, reason = reason.as_str(), "Deleted credential secret");
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(decision)
}
