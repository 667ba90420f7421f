//! # Namespace Provisioning
//!
//! Ensures a namespace exists. Unlike the updater this never rewrites an
//! existing namespace: it may have been created by someone else.

use crate::controller::action::{Action, StepResult};
use crate::controller::error::Error;
use crate::controller::store::{ManagedObject, ObjectStore, StoreError};
use tracing::{debug, info};

/// Step creating a namespace when it is absent
#[derive(Debug, Clone)]
pub struct EnsureNamespace {
    pub namespace: ManagedObject,
}

impl EnsureNamespace {
    #[must_use]
    pub fn new(namespace: ManagedObject) -> Self {
        Self { namespace }
    }

    pub async fn reconcile(&self, store: &dyn ObjectStore) -> StepResult {
        let id = self.namespace.id();
        match store.get(&self.namespace.resource, &id.key).await {
            Ok(_) => {
                debug!(object = %id, "namespace present");
                return StepResult::ok();
            }
            Err(StoreError::NotFound(_)) => {}
            Err(source) => {
                return StepResult::fail(Action::Stop, Error::Refresh { object: id, source })
            }
        }

        match store
            .create(&self.namespace.resource, &self.namespace.object)
            .await
        {
            Ok(_) => {
                info!(object = %id, "Created namespace");
                StepResult::ok()
            }
            Err(StoreError::AlreadyExists(_)) => StepResult::ok(),
            Err(source) => StepResult::fail(Action::Stop, Error::Apply { object: id, source }),
        }
    }
}
