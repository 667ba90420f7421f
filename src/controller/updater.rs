//! # Updater
//!
//! Applies the desired state of a managed object with server-side apply and
//! stamps the owner reference that lets the API server cascade deletion.
//!
//! Outcomes:
//! - owner reference required but unavailable: `Stop` with error
//! - apply conflict or already-exists: `Requeue`, error dropped (stale watch cache)
//! - any other apply failure: the configured `on_error` action with a wrapped error

use crate::constants::FIELD_MANAGER;
use crate::controller::action::{Action, StepResult};
use crate::controller::error::Error;
use crate::controller::store::{ManagedObject, ObjectStore, Owner, StoreError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::{debug, info};

/// Step applying one desired object
#[derive(Debug, Clone)]
pub struct Updater {
    pub owner: Owner,
    pub object: ManagedObject,
    /// Action reported when the apply fails. Defaults to `Continue` so that
    /// non-essential resources do not block the rest of the pass.
    pub on_error: Action,
}

impl Updater {
    #[must_use]
    pub fn new(owner: Owner, object: ManagedObject) -> Self {
        Self {
            owner,
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
        let mut desired = self.object.object.clone();

        if self
            .owner
            .shares_scope(desired.metadata.namespace.as_deref())
        {
            match &self.owner.reference {
                Some(reference) => set_owner_reference(&mut desired.metadata, reference),
                None => {
                    return StepResult::fail(
                        Action::Stop,
                        Error::OwnerReference {
                            owner: self.owner.id.clone(),
                            object: id,
                        },
                    )
                }
            }
        }

        match store
            .apply(&self.object.resource, &desired, FIELD_MANAGER, true)
            .await
        {
            Ok(_) => {
                debug!(object = %id, "applied");
                StepResult::ok()
            }
            Err(StoreError::Conflict(reason) | StoreError::AlreadyExists(reason)) => {
                info!(
                    object = %id,
                    reason = %reason,
                    "Apply raced with another writer, requeueing"
                );
                StepResult::requeue()
            }
            Err(source) => StepResult::fail(self.on_error, Error::Apply { object: id, source }),
        }
    }
}

/// Set `reference` as the controller owner, replacing any previous reference to the same owner
fn set_owner_reference(meta: &mut ObjectMeta, reference: &OwnerReference) {
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    references.retain(|existing| existing.uid != reference.uid);
    references.push(reference.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::{MockObjectStore, ObjectId, ObjectKey};
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::api::rbac::v1::ClusterRole;

    fn owner(namespace: Option<&str>, with_uid: bool) -> Owner {
        let key = ObjectKey {
            namespace: namespace.map(str::to_string),
            name: "telemetry".to_string(),
        };
        Owner {
            id: ObjectId::new("NodeAgent", key),
            reference: with_uid.then(|| OwnerReference {
                api_version: "agents.nodeagent.dev/v1alpha1".to_string(),
                kind: "NodeAgent".to_string(),
                name: "telemetry".to_string(),
                uid: "uid-1".to_string(),
                controller: Some(true),
                block_owner_deletion: Some(true),
            }),
        }
    }

    fn config_map(namespace: &str) -> ManagedObject {
        ManagedObject::from_typed(&ConfigMap {
            metadata: ObjectMeta {
                name: Some("telemetry-config".to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn cluster_role() -> ManagedObject {
        ManagedObject::from_typed(&ClusterRole {
            metadata: ObjectMeta {
                name: Some("node-agent-observability-telemetry".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_apply_sets_owner_reference_in_same_namespace() {
        let mut store = MockObjectStore::new();
        store
            .expect_apply()
            .withf(|_, object, manager, force| {
                *force
                    && manager == FIELD_MANAGER
                    && object
                        .metadata
                        .owner_references
                        .as_ref()
                        .is_some_and(|refs| refs.len() == 1 && refs[0].uid == "uid-1")
            })
            .times(1)
            .returning(|_, object, _, _| Ok(object.clone()));

        let updater = Updater::new(owner(Some("observability"), true), config_map("observability"));
        let result = updater.reconcile(&store).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_apply_skips_owner_reference_across_scopes() {
        let mut store = MockObjectStore::new();
        store
            .expect_apply()
            .withf(|_, object, _, _| object.metadata.owner_references.is_none())
            .times(1)
            .returning(|_, object, _, _| Ok(object.clone()));

        // Namespaced owner without uid: no reference needed for a cluster-scoped object
        let updater = Updater::new(owner(Some("observability"), false), cluster_role());
        assert!(updater.reconcile(&store).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_owner_reference_stops() {
        let mut store = MockObjectStore::new();
        store.expect_apply().times(0);

        let updater = Updater::new(owner(None, false), config_map("observability"));
        let result = updater.reconcile(&store).await;
        assert_eq!(result.action, Action::Stop);
        assert!(matches!(result.error, Some(Error::OwnerReference { .. })));
    }

    #[tokio::test]
    async fn test_conflict_requeues_without_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_apply()
            .returning(|_, _, _, _| Err(StoreError::Conflict("field manager conflict".to_string())));

        let updater =
            Updater::new(owner(Some("observability"), true), config_map("observability"))
                .on_error(Action::Stop);
        let result = updater.reconcile(&store).await;
        assert_eq!(result.action, Action::Requeue);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_already_exists_requeues_without_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_apply()
            .returning(|_, _, _, _| Err(StoreError::AlreadyExists("created concurrently".to_string())));

        let updater = Updater::new(owner(Some("observability"), true), config_map("observability"));
        let result = updater.reconcile(&store).await;
        assert_eq!(result.action, Action::Requeue);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_other_failure_uses_configured_action() {
        let mut store = MockObjectStore::new();
        store
            .expect_apply()
            .returning(|_, _, _, _| Err(StoreError::Request("invalid object".to_string())));

        let default_updater =
            Updater::new(owner(Some("observability"), true), config_map("observability"));
        let result = default_updater.reconcile(&store).await;
        assert_eq!(result.action, Action::Continue);
        let message = result.error.unwrap().to_string();
        assert!(message.contains("ConfigMap observability/telemetry-config"));
        assert!(message.contains("invalid object"));

        let strict = default_updater.clone().on_error(Action::Stop);
        assert_eq!(strict.reconcile(&store).await.action, Action::Stop);
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let mut store = MockObjectStore::new();
        store
            .expect_apply()
            .times(2)
            .returning(|_, object, _, _| Ok(object.clone()));

        let updater = Updater::new(owner(Some("observability"), true), config_map("observability"));
        assert!(updater.reconcile(&store).await.is_ok());
        assert!(updater.reconcile(&store).await.is_ok());
        assert!(updater.object.object.metadata.owner_references.is_none());
    }

    #[test]
    fn test_set_owner_reference_replaces_same_owner() {
        let reference = owner(Some("observability"), true).reference.unwrap();
        let mut meta = ObjectMeta::default();
        set_owner_reference(&mut meta, &reference);
        set_owner_reference(&mut meta, &reference);
        assert_eq!(meta.owner_references.unwrap().len(), 1);
    }
}
