//! Cluster store abstraction
//!
//! The reconciler only talks to the cluster through these traits so tests can
//! swap in an in-memory store. [`KubeStore`] is the production implementation
//! backed by `kube::Api`.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::crd::MyApp;
use crate::error::{Error, Result};

/// Namespace/name pair identifying a MyApp
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn for_app(app: &MyApp) -> Self {
        Self::new(
            app.namespace().unwrap_or_else(|| "default".to_string()),
            app.name_any(),
        )
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Verbs on the MyApp resource itself
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Fetch a MyApp, `None` when it does not exist
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<MyApp>>;

    /// Write metadata (finalizers) back; rejected with `Conflict` when stale
    async fn update_app(&self, app: &MyApp) -> Result<MyApp>;

    /// Write the status subresource; rejected with `Conflict` when stale
    async fn update_app_status(&self, app: &MyApp) -> Result<MyApp>;
}

/// Verbs on an object kind the controller manages
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// Create an object; `AlreadyExists` when the name is taken
    async fn create(&self, namespace: &str, object: &K) -> Result<K>;

    /// Replace an object; `Conflict` when its resourceVersion is stale
    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K>;

    /// Delete an object, returning `false` when it was already gone
    async fn delete(&self, namespace: &str, name: &str) -> Result<bool>;
}

/// Everything the reconciler needs from the cluster
pub trait ClusterStore: AppStore + ObjectStore<Deployment> + ObjectStore<Service> {}

impl<T> ClusterStore for T where T: AppStore + ObjectStore<Deployment> + ObjectStore<Service> {}

/// Store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

/// Map an API error onto the controller's taxonomy
fn classify<K>(namespace: &str, name: &str, err: kube::Error) -> Error
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&()).to_string();
    match err {
        kube::Error::Api(ref resp) if resp.code == 404 => Error::NotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        kube::Error::Api(ref resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            Error::AlreadyExists {
                kind,
                name: name.to_string(),
            }
        }
        kube::Error::Api(ref resp) if resp.code == 409 => Error::Conflict {
            kind,
            name: name.to_string(),
        },
        other => Error::KubeError(other),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + fmt::Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify::<K>(namespace, name, e))
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let name = object.name_any();
        api.create(&self.post_params(), object)
            .await
            .map_err(|e| classify::<K>(namespace, &name, e))
    }

    async fn replace(&self, namespace: &str, name: &str, object: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &self.post_params(), object)
            .await
            .map_err(|e| classify::<K>(namespace, name, e))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!("{} {}/{} already deleted", K::kind(&()), namespace, name);
                Ok(false)
            }
            Err(e) => Err(classify::<K>(namespace, name, e)),
        }
    }
}

#[async_trait]
impl AppStore for KubeStore {
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<MyApp>> {
        ObjectStore::<MyApp>::get(self, &key.namespace, &key.name).await
    }

    async fn update_app(&self, app: &MyApp) -> Result<MyApp> {
        let key = ObjectKey::for_app(app);
        ObjectStore::<MyApp>::replace(self, &key.namespace, &key.name, app).await
    }

    async fn update_app_status(&self, app: &MyApp) -> Result<MyApp> {
        let key = ObjectKey::for_app(app);
        let api: Api<MyApp> = Api::namespaced(self.client.clone(), &key.namespace);

        // resourceVersion in a merge patch is checked as a precondition
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": app.resource_version() },
            "status": app.status,
        });

        api.patch_status(
            &key.name,
            &self.patch_params(),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| classify::<MyApp>(&key.namespace, &key.name, e))
    }
}
