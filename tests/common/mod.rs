//! In-memory object store for integration tests
//!
//! Enforces the parts of API server behaviour the operator relies on:
//! resourceVersion conflicts on replace, finalizer-gated deletion, owner
//! reference garbage collection and the status subresource split.

#![allow(dead_code, reason = "Not every test binary uses every helper")]

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::Resource;
use node_agent_operator::controller::store::{
    api_resource, ManagedObject, ObjectKey, ObjectStore, Selector, StoreError, TokenParams,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

type Slot = (String, ObjectKey);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Slot, DynamicObject>,
    next_version: u64,
    calls: BTreeMap<&'static str, usize>,
    failing_applies: BTreeSet<String>,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn count(&mut self, operation: &'static str) {
        *self.calls.entry(operation).or_default() += 1;
    }

    /// Physically remove an object and everything it owns
    fn remove(&mut self, slot: &Slot) {
        let Some(removed) = self.objects.remove(slot) else {
            return;
        };
        let Some(uid) = removed.metadata.uid else {
            return;
        };
        let dependents: Vec<Slot> = self
            .objects
            .iter()
            .filter(|(_, object)| {
                object
                    .metadata
                    .owner_references
                    .as_ref()
                    .is_some_and(|refs| refs.iter().any(|r| r.uid == uid))
            })
            .map(|(slot, _)| slot.clone())
            .collect();
        for dependent in dependents {
            self.remove(&dependent);
        }
    }
}

fn slot(resource: &ApiResource, key: &ObjectKey) -> Slot {
    (resource.kind.clone(), key.clone())
}

fn not_found(resource: &ApiResource, key: &ObjectKey) -> StoreError {
    StoreError::NotFound(format!("{} {key} not found", resource.kind))
}

fn labels_match(object: &DynamicObject, expression: &str) -> bool {
    let labels = object.metadata.labels.clone().unwrap_or_default();
    expression.split(',').all(|pair| match pair.split_once('=') {
        Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
        None => labels.contains_key(pair),
    })
}

/// Object store holding everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls made to `operation` so far
    pub fn calls(&self, operation: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(operation).copied().unwrap_or(0)
    }

    /// Make every apply of `kind` fail with a request error
    pub fn fail_applies_of(&self, kind: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_applies
            .insert(kind.to_string());
    }

    pub fn contains<K: Resource<DynamicType = ()>>(&self, key: &ObjectKey) -> bool {
        let state = self.state.lock().unwrap();
        state.objects.contains_key(&slot(&api_resource::<K>(), key))
    }

    /// Fetch a stored object as its typed form
    pub fn typed<K>(&self, key: &ObjectKey) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let state = self.state.lock().unwrap();
        let object = state.objects.get(&slot(&api_resource::<K>(), key))?;
        serde_json::to_value(object)
            .and_then(serde_json::from_value)
            .ok()
    }

    /// Store a typed object as if a user had created it
    pub async fn insert<K>(&self, typed: &K) -> DynamicObject
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let managed = ManagedObject::from_typed(typed).unwrap();
        self.create(&managed.resource, &managed.object).await.unwrap()
    }

    /// Overwrite the status of a stored object, as its own controller would
    pub fn set_status<K: Resource<DynamicType = ()>>(&self, key: &ObjectKey, status: Value) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let object = state
            .objects
            .get_mut(&slot(&api_resource::<K>(), key))
            .unwrap();
        object.data["status"] = status;
        object.metadata.resource_version = Some(version);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, resource: &ApiResource, key: &ObjectKey) -> Result<DynamicObject, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.count("get");
        state
            .objects
            .get(&slot(resource, key))
            .cloned()
            .ok_or_else(|| not_found(resource, key))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        selector: &Selector,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.count("list");
        Ok(state
            .objects
            .iter()
            .filter(|((kind, key), object)| {
                kind == &resource.kind
                    && (selector.namespace.is_none() || key.namespace == selector.namespace)
                    && selector
                        .labels
                        .as_deref()
                        .is_none_or(|expression| labels_match(object, expression))
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.count("create");
        let key = ObjectKey::of(&object.metadata);
        let slot = slot(resource, &key);
        if state.objects.contains_key(&slot) {
            return Err(StoreError::AlreadyExists(format!("{} {key}", resource.kind)));
        }

        let mut created = object.clone();
        created.metadata.uid = Some(format!("uid-{}-{}", resource.kind.to_lowercase(), key.name));
        created.metadata.generation.get_or_insert(1);
        created.metadata.resource_version = Some(state.bump());
        state.objects.insert(slot, created.clone());
        Ok(created)
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.count("replace");
        let key = ObjectKey::of(&object.metadata);
        let slot = slot(resource, &key);
        let stored = state
            .objects
            .get(&slot)
            .cloned()
            .ok_or_else(|| not_found(resource, &key))?;
        if stored.metadata.resource_version != object.metadata.resource_version {
            return Err(StoreError::Conflict(format!("{} {key} was modified", resource.kind)));
        }

        let mut replaced = object.clone();
        // Status only changes through the status subresource
        match stored.data.get("status") {
            Some(status) => replaced.data["status"] = status.clone(),
            None => {
                if let Some(data) = replaced.data.as_object_mut() {
                    data.remove("status");
                }
            }
        }
        replaced.metadata.uid = stored.metadata.uid;
        replaced.metadata.generation = stored.metadata.generation;
        replaced.metadata.deletion_timestamp = stored.metadata.deletion_timestamp;
        replaced.metadata.resource_version = Some(state.bump());

        let released = replaced.metadata.deletion_timestamp.is_some()
            && replaced.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        state.objects.insert(slot.clone(), replaced.clone());
        if released {
            state.remove(&slot);
        }
        Ok(replaced)
    }

    async fn replace_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.count("replace_status");
        let key = ObjectKey::of(&object.metadata);
        let slot = slot(resource, &key);
        let version = state.bump();
        let stored = state
            .objects
            .get_mut(&slot)
            .ok_or_else(|| not_found(resource, &key))?;
        if stored.metadata.resource_version != object.metadata.resource_version {
            return Err(StoreError::Conflict(format!("{} {key} was modified", resource.kind)));
        }

        stored.data["status"] = object.data.get("status").cloned().unwrap_or(Value::Null);
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn delete(&self, resource: &ApiResource, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.count("delete");
        let slot = slot(resource, key);
        let version = state.bump();
        let stored = state
            .objects
            .get_mut(&slot)
            .ok_or_else(|| not_found(resource, key))?;

        if stored.metadata.finalizers.as_ref().is_some_and(|f| !f.is_empty()) {
            if stored.metadata.deletion_timestamp.is_none() {
                let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
                stored.metadata.deletion_timestamp =
                    Some(serde_json::from_value(Value::String(now)).unwrap());
                stored.metadata.resource_version = Some(version);
            }
            return Ok(());
        }

        state.remove(&slot);
        Ok(())
    }

    async fn apply(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
        _field_manager: &str,
        force: bool,
    ) -> Result<DynamicObject, StoreError> {
        assert!(force, "apply is always forced");
        let mut state = self.state.lock().unwrap();
        state.count("apply");
        if state.failing_applies.contains(&resource.kind) {
            return Err(StoreError::Request(format!("{} apply rejected", resource.kind)));
        }

        let key = ObjectKey::of(&object.metadata);
        let slot = slot(resource, &key);
        let version = state.bump();
        let mut applied = match state.objects.get(&slot) {
            Some(stored) => {
                let mut applied = object.clone();
                if let Some(status) = stored.data.get("status") {
                    applied.data["status"] = status.clone();
                }
                applied.metadata.uid = stored.metadata.uid.clone();
                applied.metadata.generation = stored.metadata.generation;
                applied.metadata.finalizers = stored.metadata.finalizers.clone();
                applied
            }
            None => {
                let mut applied = object.clone();
                applied.metadata.uid =
                    Some(format!("uid-{}-{}", resource.kind.to_lowercase(), key.name));
                applied.metadata.generation.get_or_insert(1);
                applied
            }
        };
        applied.metadata.resource_version = Some(version);
        state.objects.insert(slot, applied.clone());
        Ok(applied)
    }

    async fn request_token(
        &self,
        account: &ObjectKey,
        params: &TokenParams,
    ) -> Result<String, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.count("request_token");
        let resource = ApiResource::erase::<k8s_openapi::api::core::v1::ServiceAccount>(&());
        if !state.objects.contains_key(&slot(&resource, account)) {
            return Err(not_found(&resource, account));
        }
        Ok(format!(
            "token-{}-{}-{}",
            account.name,
            params.ttl.as_secs(),
            state.calls.get("request_token").copied().unwrap_or(0)
        ))
    }
}
