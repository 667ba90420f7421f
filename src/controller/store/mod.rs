//! # Object Store
//!
//! The seam between reconciliation logic and the Kubernetes API.
//!
//! Every step talks to the cluster through [`ObjectStore`], which works on
//! type-erased [`DynamicObject`]s addressed by an [`ApiResource`] and an
//! [`ObjectKey`]. Typed resources produced by the templates are converted with
//! [`ManagedObject::from_typed`], which also resolves their type metadata.
//!
//! [`KubeStore`] is the production implementation. Tests use the
//! `mockall`-generated `MockObjectStore` or an in-memory store.

mod kube_store;

pub use kube_store::KubeStore;

use crate::controller::error::Error;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::Resource;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error as ThisError;

#[cfg(test)]
use mockall::automock;

/// Errors returned by the object store, classified by how callers react to them
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    /// Optimistic-concurrency or field-ownership conflict
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 404 => {
                StoreError::NotFound(response.message.clone())
            }
            kube::Error::Api(response)
                if response.code == 409 && response.reason == "AlreadyExists" =>
            {
                StoreError::AlreadyExists(response.message.clone())
            }
            kube::Error::Api(response) if response.code == 409 => {
                StoreError::Conflict(response.message.clone())
            }
            _ => StoreError::Request(error.to_string()),
        }
    }
}

/// Namespace and name of an object. `namespace` is `None` for cluster-scoped objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn of(meta: &ObjectMeta) -> Self {
        Self {
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Kind plus key; used to name objects in errors and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectId {
    pub kind: String,
    pub key: ObjectKey,
}

impl ObjectId {
    pub fn new(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self {
            kind: kind.into(),
            key,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

/// Label selection for list calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    /// Restrict to a namespace; `None` lists across all namespaces
    pub namespace: Option<String>,
    /// Label selector expression, e.g. `app.kubernetes.io/managed-by=node-agent-operator`
    pub labels: Option<String>,
}

/// Parameters of a bearer token request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    pub audiences: Vec<String>,
    pub ttl: Duration,
}

/// Abstract object client used by every reconciliation step
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single object
    async fn get(&self, resource: &ApiResource, key: &ObjectKey)
        -> Result<DynamicObject, StoreError>;

    /// List objects matching a selector
    async fn list(
        &self,
        resource: &ApiResource,
        selector: &Selector,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Create an object; fails with `AlreadyExists` if it is present
    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace an object. The object's resourceVersion is the concurrency token.
    async fn replace(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace the status subresource, honouring the resourceVersion like `replace`
    async fn replace_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Delete an object
    async fn delete(&self, resource: &ApiResource, key: &ObjectKey) -> Result<(), StoreError>;

    /// Server-side apply the full desired state under `field_manager`
    async fn apply(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
        field_manager: &str,
        force: bool,
    ) -> Result<DynamicObject, StoreError>;

    /// Request a bearer token for a service account
    async fn request_token(
        &self,
        account: &ObjectKey,
        params: &TokenParams,
    ) -> Result<String, StoreError>;
}

/// A desired object together with its type metadata
#[derive(Debug, Clone)]
pub struct ManagedObject {
    pub resource: ApiResource,
    pub object: DynamicObject,
}

impl ManagedObject {
    /// Erase a typed resource into a dynamic object, resolving its group/version/kind
    pub fn from_typed<K>(typed: &K) -> Result<Self, Error>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let resource = ApiResource::erase::<K>(&());
        let object = serde_json::to_value(typed)
            .and_then(serde_json::from_value::<DynamicObject>)
            .map_err(|source| Error::Encode {
                object: ObjectId::new(resource.kind.clone(), ObjectKey::of(typed.meta())),
                source,
            })?;
        Ok(Self { resource, object })
    }

    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::of(&self.object.metadata)
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.resource.kind.clone(), self.key())
    }
}

/// Owner of managed objects, resolved from a typed specification instance
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: ObjectId,
    /// Controller owner reference; `None` when the owner has no name or uid yet
    pub reference: Option<OwnerReference>,
}

impl Owner {
    pub fn of<K>(owner: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self {
            id: ObjectId::new(K::kind(&()).to_string(), ObjectKey::of(owner.meta())),
            reference: owner.controller_owner_ref(&()),
        }
    }

    /// Whether an object in `namespace` can be garbage collected through this owner.
    /// Cluster-scoped owners can own anything; namespaced owners only objects in
    /// their own namespace.
    #[must_use]
    pub fn shares_scope(&self, namespace: Option<&str>) -> bool {
        match self.id.key.namespace.as_deref() {
            None => true,
            Some(owner_namespace) => namespace == Some(owner_namespace),
        }
    }
}

/// Type metadata for a typed resource
#[must_use]
pub fn api_resource<K>() -> ApiResource
where
    K: Resource<DynamicType = ()>,
{
    ApiResource::erase::<K>(&())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{NodeAgent, NodeAgentSpec, NodeScanner, NodeScannerSpec};
    use k8s_openapi::api::core::v1::ConfigMap;

    fn agent() -> NodeAgent {
        let mut agent = NodeAgent::new("telemetry", NodeAgentSpec {
            image: None,
            port: None,
            config: Default::default(),
            node_selector: None,
            credentials: Default::default(),
        });
        agent.metadata.namespace = Some("observability".to_string());
        agent.metadata.uid = Some("uid-1".to_string());
        agent
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::namespaced("ns", "a").to_string(), "ns/a");
        assert_eq!(ObjectKey::cluster("a").to_string(), "a");
    }

    #[test]
    fn test_from_typed_keeps_type_metadata() {
        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some("agent-config".to_string()),
                namespace: Some("observability".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let managed = ManagedObject::from_typed(&config_map).unwrap();
        assert_eq!(managed.resource.kind, "ConfigMap");
        assert_eq!(managed.resource.plural, "configmaps");
        assert_eq!(managed.id().to_string(), "ConfigMap observability/agent-config");
        let types = managed.object.types.unwrap();
        assert_eq!(types.api_version, "v1");
        assert_eq!(types.kind, "ConfigMap");
    }

    #[test]
    fn test_namespaced_owner_scope() {
        let owner = Owner::of(&agent());
        assert!(owner.reference.is_some());
        assert!(owner.shares_scope(Some("observability")));
        assert!(!owner.shares_scope(Some("other")));
        assert!(!owner.shares_scope(None));
    }

    #[test]
    fn test_cluster_owner_scope() {
        let mut scanner = NodeScanner::new("cis", NodeScannerSpec {
            namespace: "node-scanner".to_string(),
            image: None,
            config: Default::default(),
            node_selector: None,
        });
        scanner.metadata.uid = Some("uid-2".to_string());
        let owner = Owner::of(&scanner);
        assert!(owner.shares_scope(Some("node-scanner")));
        assert!(owner.shares_scope(None));
    }

    #[test]
    fn test_owner_without_uid_has_no_reference() {
        let mut agent = agent();
        agent.metadata.uid = None;
        assert!(Owner::of(&agent).reference.is_none());
    }

    #[test]
    fn test_store_error_classification() {
        assert!(StoreError::Conflict("x".to_string()).is_conflict());
        assert!(!StoreError::AlreadyExists("x".to_string()).is_conflict());
    }
}
