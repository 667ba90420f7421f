//! # Polling
//!
//! Bounded waits for objects created asynchronously by other subsystems.

use crate::controller::store::{ObjectKey, ObjectStore, StoreError};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Poll for an object every `interval` until it exists or `timeout` elapses.
///
/// Returns `Ok(None)` on timeout. Errors other than not-found end the wait.
pub async fn poll_for_object(
    store: &dyn ObjectStore,
    resource: &ApiResource,
    key: &ObjectKey,
    interval: Duration,
    timeout: Duration,
) -> Result<Option<DynamicObject>, StoreError> {
    let deadline = Instant::now() + timeout;
    loop {
        match store.get(resource, key).await {
            Ok(object) => return Ok(Some(object)),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        if Instant::now() + interval > deadline {
            debug!(kind = %resource.kind, object = %key, "gave up waiting");
            return Ok(None);
        }
        tokio::time::sleep(interval).await;
    }
}
