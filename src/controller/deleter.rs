//! # Deleter
//!
//! Deletes a managed object. An object that is already gone counts as deleted.

use crate::controller::action::{Action, StepResult};
use crate::controller::error::Error;
use crate::controller::store::{ManagedObject, ObjectStore, StoreError};
use tracing::debug;

/// Step deleting one object
#[derive(Debug, Clone)]
pub struct Deleter {
    /// Only identity and type metadata are needed
    pub object: ManagedObject,
    pub on_error: Action,
}

impl Deleter {
    #[must_use]
    pub fn new(object: ManagedObject) -> Self {
        Self {
            object,
            on_error: Action::Continue,
        }
    }

    #[must_use]
    pub fn on_error(mut self, action: Action) -> Self {
        self.on_error = action;
        self
    }

    pub async fn reconcile(&self, store: &dyn ObjectStore) -> StepResult {
        let id = self.object.id();
        match store.delete(&self.object.resource, &id.key).await {
            Ok(()) => {
                debug!(object = %id, "deleted");
                StepResult::ok()
            }
            Err(StoreError::NotFound(_)) => {
                debug!(object = %id, "already absent");
                StepResult::ok()
            }
            Err(source) => StepResult::fail(self.on_error, Error::Delete { object: id, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::MockObjectStore;
    use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn binding() -> ManagedObject {
        ManagedObject::from_typed(&ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some("node-agent-observability-telemetry".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_delete_existing_object() {
        let mut store = MockObjectStore::new();
        store
            .expect_delete()
            .withf(|resource, key| {
                resource.kind == "ClusterRoleBinding"
                    && key.namespace.is_none()
                    && key.name == "node-agent-observability-telemetry"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        assert!(Deleter::new(binding()).reconcile(&store).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_absent_object_succeeds() {
        let mut store = MockObjectStore::new();
        store
            .expect_delete()
            .returning(|_, _| Err(StoreError::NotFound("gone".to_string())));

        let result = Deleter::new(binding()).on_error(Action::Stop).reconcile(&store).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_delete_failure_uses_configured_action() {
        let mut store = MockObjectStore::new();
        store
            .expect_delete()
            .returning(|_, _| Err(StoreError::Request("forbidden".to_string())));

        let result = Deleter::new(binding()).on_error(Action::Stop).reconcile(&store).await;
        assert_eq!(result.action, Action::Stop);
        let message = result.error.unwrap().to_string();
        assert!(message.contains("ClusterRoleBinding node-agent-observability-telemetry"));
        assert!(message.contains("forbidden"));
    }
}
