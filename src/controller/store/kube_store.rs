//! # Kubernetes Object Store
//!
//! [`ObjectStore`] backed by the Kubernetes API server via `kube::Client`.

use super::{ObjectKey, ObjectStore, Selector, StoreError, TokenParams};
use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;

/// Object store talking to the API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }

    fn object_api(&self, resource: &ApiResource, object: &DynamicObject) -> Api<DynamicObject> {
        self.api(resource, object.metadata.namespace.as_deref())
    }
}

fn object_name(object: &DynamicObject) -> Result<&str, StoreError> {
    object
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| StoreError::Request("object has no name".to_string()))
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        resource: &ApiResource,
        key: &ObjectKey,
    ) -> Result<DynamicObject, StoreError> {
        Ok(self
            .api(resource, key.namespace.as_deref())
            .get(&key.name)
            .await?)
    }

    async fn list(
        &self,
        resource: &ApiResource,
        selector: &Selector,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let mut params = ListParams::default();
        if let Some(labels) = &selector.labels {
            params = params.labels(labels);
        }
        let list = self
            .api(resource, selector.namespace.as_deref())
            .list(&params)
            .await?;
        Ok(list.items)
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        Ok(self
            .object_api(resource, object)
            .create(&PostParams::default(), object)
            .await?)
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = object_name(object)?;
        Ok(self
            .object_api(resource, object)
            .replace(name, &PostParams::default(), object)
            .await?)
    }

    async fn replace_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = object_name(object)?;
        let body = serde_json::to_vec(object)
            .map_err(|e| StoreError::Request(format!("failed to encode status: {e}")))?;
        Ok(self
            .object_api(resource, object)
            .replace_status(name, &PostParams::default(), body)
            .await?)
    }

    async fn delete(&self, resource: &ApiResource, key: &ObjectKey) -> Result<(), StoreError> {
        self.api(resource, key.namespace.as_deref())
            .delete(&key.name, &DeleteParams::background())
            .await?;
        Ok(())
    }

    async fn apply(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
        field_manager: &str,
        force: bool,
    ) -> Result<DynamicObject, StoreError> {
        let name = object_name(object)?;
        let mut params = PatchParams::apply(field_manager);
        if force {
            params = params.force();
        }
        Ok(self
            .object_api(resource, object)
            .patch(name, &params, &Patch::Apply(object))
            .await?)
    }

    async fn request_token(
        &self,
        account: &ObjectKey,
        params: &TokenParams,
    ) -> Result<String, StoreError> {
        let namespace = account.namespace.as_deref().ok_or_else(|| {
            StoreError::Request(format!("service account {account} has no namespace"))
        })?;
        let accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);

        let request = TokenRequest {
            spec: TokenRequestSpec {
                audiences: params.audiences.clone(),
                expiration_seconds: Some(i64::try_from(params.ttl.as_secs()).unwrap_or(i64::MAX)),
                ..Default::default()
            },
            ..Default::default()
        };

        let response = accounts
            .create_token_request(&account.name, &PostParams::default(), &request)
            .await?;

        response
            .status
            .map(|status| status.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| StoreError::Request(format!("token request for {account} returned no token")))
    }
}
