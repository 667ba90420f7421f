//! # Finalizer
//!
//! Two-phase lifecycle gate. A cleanup marker is added to every live
//! specification instance and removed only once cleanup has run, so the API
//! server cannot physically delete the instance before its explicitly managed
//! resources are gone.
//!
//! Adding or removing the marker always ends the pass (`Stop`): the write is
//! itself a change that triggers a new pass, and continuing on the old copy
//! would act on a stale generation.

use crate::controller::action::{Action, StepResult};
use crate::controller::error::Error;
use crate::controller::store::{ObjectId, ObjectKey, ObjectStore, StoreError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::discovery::ApiResource;
use tracing::{debug, info};

/// Marker transition chosen for an observed `(has_marker, is_deleting)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    AddMarker,
    RemoveMarker,
    Steady,
}

/// Decide the marker transition. Exactly one transition applies to each state.
#[must_use]
pub fn decide(has_marker: bool, is_deleting: bool) -> GateTransition {
    match (has_marker, is_deleting) {
        (true, true) => GateTransition::RemoveMarker,
        (false, false) => GateTransition::AddMarker,
        _ => GateTransition::Steady,
    }
}

#[must_use]
pub fn has_marker(meta: &ObjectMeta, marker: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == marker))
}

#[must_use]
pub fn is_deleting(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some()
}

/// Step gating deletion of a specification instance
#[derive(Debug, Clone)]
pub struct Finalizer {
    pub resource: ApiResource,
    pub key: ObjectKey,
    pub marker: String,
}

impl Finalizer {
    #[must_use]
    pub fn new(resource: ApiResource, key: ObjectKey, marker: impl Into<String>) -> Self {
        Self {
            resource,
            key,
            marker: marker.into(),
        }
    }

    fn id(&self) -> ObjectId {
        ObjectId::new(self.resource.kind.clone(), self.key.clone())
    }

    pub async fn reconcile(&self, store: &dyn ObjectStore) -> StepResult {
        // Never decide on the caller's copy; it may predate the deletion request
        let mut current = match store.get(&self.resource, &self.key).await {
            Ok(current) => current,
            Err(StoreError::NotFound(_)) => {
                debug!(object = %self.id(), "already removed");
                return StepResult::ok();
            }
            Err(source) => {
                return StepResult::fail(
                    Action::Requeue,
                    Error::Refresh {
                        object: self.id(),
                        source,
                    },
                )
            }
        };

        let transition = decide(
            has_marker(&current.metadata, &self.marker),
            is_deleting(&current.metadata),
        );

        match transition {
            GateTransition::Steady => return StepResult::ok(),
            GateTransition::AddMarker => {
                current
                    .metadata
                    .finalizers
                    .get_or_insert_with(Vec::new)
                    .push(self.marker.clone());
            }
            GateTransition::RemoveMarker => {
                if let Some(finalizers) = current.metadata.finalizers.as_mut() {
                    finalizers.retain(|f| f != &self.marker);
                }
            }
        }

        match store.replace(&self.resource, &current).await {
            Ok(_) => {
                info!(object = %self.id(), transition = ?transition, "Updated cleanup marker");
                StepResult::stop()
            }
            Err(source) => StepResult::fail(
                Action::Stop,
                Error::Persist {
                    object: self.id(),
                    source,
                },
            ),
        }
    }
}
