//! In-memory cluster store for tests
//!
//! Mimics the API server behaviour the reconciler depends on: resourceVersion
//! bumps on every write, stale writes rejected with `Conflict`, and a MyApp
//! carrying a deletion timestamp disappears once its last finalizer is gone.
//! Every successful write is logged so tests can assert on write counts and
//! ordering. Single faults can be injected per operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::ErrorResponse;
use kube::{Resource, ResourceExt};

use super::store::{AppStore, ObjectKey, ObjectStore};
use crate::crd::MyApp;
use crate::error::{Error, Result};

/// Fault to return from the next matching operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Conflict,
    Transient,
    /// Only meaningful for gets: report the object as absent
    Hidden,
    /// Fail the write with `NotFound`, as if the object was just deleted
    Gone,
}

#[derive(Default)]
pub struct State {
    apps: BTreeMap<ObjectKey, MyApp>,
    deployments: BTreeMap<ObjectKey, Deployment>,
    services: BTreeMap<ObjectKey, Service>,
    version: u64,
    writes: Vec<String>,
    faults: HashMap<String, Fault>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn take_fault(&mut self, op: &str, kind: &str, name: &str) -> Result<()> {
        match self.faults.remove(op) {
            None => Ok(()),
            Some(Fault::Conflict) => Err(Error::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
            }),
            Some(Fault::Hidden) => Ok(()),
            Some(Fault::Gone) => Err(Error::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
                namespace: String::new(),
            }),
            Some(Fault::Transient) => Err(Error::KubeError(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("injected transient failure for {}", op),
                reason: "ServiceUnavailable".to_string(),
                code: 503,
            }))),
        }
    }
}

/// Object kinds the in-memory store can hold
pub trait Stored: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    fn table(state: &mut State) -> &mut BTreeMap<ObjectKey, Self>;
}

impl Stored for Deployment {
    fn table(state: &mut State) -> &mut BTreeMap<ObjectKey, Self> {
        &mut state.deployments
    }
}

impl Stored for Service {
    fn table(state: &mut State) -> &mut BTreeMap<ObjectKey, Self> {
        &mut state.services
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Seed a MyApp as if a user had applied it
    pub fn insert_app(&self, mut app: MyApp) -> MyApp {
        let mut state = self.lock();
        let key = ObjectKey::for_app(&app);
        app.metadata.namespace = Some(key.namespace.clone());
        app.metadata.uid.get_or_insert_with(|| format!("uid-{}", key.name));
        app.metadata.generation = Some(1);
        app.metadata.resource_version = Some(state.next_version());
        state.apps.insert(key, app.clone());
        app
    }

    /// Apply a user edit to a stored MyApp
    pub fn edit_app(&self, key: &ObjectKey, edit: impl FnOnce(&mut MyApp)) {
        let mut state = self.lock();
        let version = state.next_version();
        if let Some(app) = state.apps.get_mut(key) {
            edit(app);
            app.metadata.generation = Some(app.metadata.generation.unwrap_or(0) + 1);
            app.metadata.resource_version = Some(version);
        }
    }

    /// Request deletion the way the API server does: stamp the object, or
    /// remove it outright when no finalizer holds it
    pub fn request_deletion(&self, key: &ObjectKey) {
        let mut state = self.lock();
        let version = state.next_version();
        let remove = match state.apps.get_mut(key) {
            Some(app) if app.finalizers().is_empty() => true,
            Some(app) => {
                app.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
                app.metadata.resource_version = Some(version);
                false
            }
            None => false,
        };
        if remove {
            state.apps.remove(key);
        }
    }

    /// Overwrite a managed object behind the controller's back
    pub fn put<K: Stored>(&self, object: K) {
        let mut state = self.lock();
        let key = ObjectKey::new(object.namespace().unwrap_or_default(), object.name_any());
        let mut object = object;
        object.meta_mut().resource_version = Some(state.next_version());
        K::table(&mut state).insert(key, object);
    }

    pub fn app(&self, key: &ObjectKey) -> Option<MyApp> {
        self.lock().apps.get(key).cloned()
    }

    pub fn deployment(&self, key: &ObjectKey) -> Option<Deployment> {
        self.lock().deployments.get(key).cloned()
    }

    pub fn service(&self, key: &ObjectKey) -> Option<Service> {
        self.lock().services.get(key).cloned()
    }

    /// Successful writes in the order they happened
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Make the next call of `op` (e.g. "delete Service") fail
    pub fn fail_next(&self, op: &str, fault: Fault) {
        self.lock().faults.insert(op.to_string(), fault);
    }
}

#[async_trait]
impl<K: Stored> ObjectStore<K> for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let mut state = self.lock();
        let op = format!("get {}", K::kind(&()));
        if state.faults.get(&op) == Some(&Fault::Hidden) {
            state.faults.remove(&op);
            return Ok(None);
        }
        state.take_fault(&op, &K::kind(&()), name)?;
        Ok(K::table(&mut state)
            .get(&ObjectKey::new(namespace, name))
            .cloned())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K> {
        let mut state = self.lock();
        let kind = K::kind(&()).to_string();
        let name = object.name_any();
        state.take_fault(&format!("create {}", kind), &kind, &name)?;

        let key = ObjectKey::new(namespace, &name);
        if K::table(&mut state).contains_key(&key) {
            return Err(Error::AlreadyExists { kind, name });
        }

        let mut created = object.clone();
        created.meta_mut().namespace = Some(namespace.to_string());
        created.meta_mut().uid = Some(format!("uid-{}-{}", kind.to_lowercase(), name));
        created.meta_mut().resource_version = Some(state.next_version());
        K::table(&mut state).insert(key.clone(), created.clone());
        state.writes.push(format!("create {} {}", kind, key));
        Ok(created)
    }

    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K> {
        let mut state = self.lock();
        let kind = K::kind(&()).to_string();
        state.take_fault(&format!("replace {}", kind), &kind, name)?;

        let key = ObjectKey::new(namespace, name);
        let current = K::table(&mut state).get(&key).cloned().ok_or_else(|| Error::NotFound {
            kind: kind.clone(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        })?;
        if current.meta().resource_version != object.meta().resource_version {
            return Err(Error::Conflict {
                kind,
                name: name.to_string(),
            });
        }

        let mut replaced = object.clone();
        replaced.meta_mut().resource_version = Some(state.next_version());
        K::table(&mut state).insert(key.clone(), replaced.clone());
        state.writes.push(format!("replace {} {}", kind, key));
        Ok(replaced)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool> {
        let mut state = self.lock();
        let kind = K::kind(&()).to_string();
        state.take_fault(&format!("delete {}", kind), &kind, name)?;

        let key = ObjectKey::new(namespace, name);
        let existed = K::table(&mut state).remove(&key).is_some();
        if existed {
            state.writes.push(format!("delete {} {}", kind, key));
        }
        Ok(existed)
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<MyApp>> {
        let mut state = self.lock();
        state.take_fault("get MyApp", "MyApp", &key.name)?;
        Ok(state.apps.get(key).cloned())
    }

    async fn update_app(&self, app: &MyApp) -> Result<MyApp> {
        let mut state = self.lock();
        let key = ObjectKey::for_app(app);
        state.take_fault("update MyApp", "MyApp", &key.name)?;

        let current = checked_current(&state, &key, app)?;
        let mut updated = current;
        updated.metadata.finalizers = app.metadata.finalizers.clone();
        updated.metadata.labels = app.metadata.labels.clone();
        updated.metadata.annotations = app.metadata.annotations.clone();
        updated.metadata.resource_version = Some(state.next_version());
        state.writes.push(format!("update MyApp {}", key));

        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            state.apps.remove(&key);
        } else {
            state.apps.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_app_status(&self, app: &MyApp) -> Result<MyApp> {
        let mut state = self.lock();
        let key = ObjectKey::for_app(app);
        state.take_fault("update_status MyApp", "MyApp", &key.name)?;

        let mut updated = checked_current(&state, &key, app)?;
        updated.status = app.status.clone();
        updated.metadata.resource_version = Some(state.next_version());
        state.writes.push(format!("update_status MyApp {}", key));
        state.apps.insert(key, updated.clone());
        Ok(updated)
    }
}

fn checked_current(state: &State, key: &ObjectKey, app: &MyApp) -> Result<MyApp> {
    let current = state.apps.get(key).cloned().ok_or_else(|| Error::NotFound {
        kind: "MyApp".to_string(),
        name: key.name.clone(),
        namespace: key.namespace.clone(),
    })?;
    if current.metadata.resource_version != app.metadata.resource_version {
        return Err(Error::Conflict {
            kind: "MyApp".to_string(),
            name: key.name.clone(),
        });
    }
    Ok(current)
}
