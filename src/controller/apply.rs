//! Create-or-converge logic for managed objects
//!
//! [`ensure`] is written once and parameterised over [`ManagedKind`], which
//! supplies the identity, desired state and drift check for one object kind.

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use super::conditions::{self, reasons, AVAILABLE};
use super::reconciler::Outcome;
use super::resources;
use super::store::{AppStore, ObjectStore};
use crate::crd::{ConditionStatus, MyApp};
use crate::error::{Error, Result};

/// Capabilities the applier needs from a managed object kind
pub trait ManagedKind {
    type Object: Clone + Send + Sync + 'static;

    /// Kind name used in logs, errors and condition reasons
    const KIND: &'static str;

    /// Deterministic name of the object for a MyApp
    fn name(app: &MyApp) -> String;

    fn build_desired(app: &MyApp) -> Result<Self::Object>;

    /// Copy of `existing` with the controller-owned fields brought in line
    /// with `app`, or `None` when nothing has drifted
    fn diff(app: &MyApp, existing: &Self::Object) -> Option<Self::Object>;
}

/// The Deployment running the MyApp's pods
pub struct Workload;

impl ManagedKind for Workload {
    type Object = Deployment;
    const KIND: &'static str = "Deployment";

    fn name(app: &MyApp) -> String {
        resources::workload_name(app)
    }

    fn build_desired(app: &MyApp) -> Result<Deployment> {
        resources::build_deployment(app)
    }

    fn diff(app: &MyApp, existing: &Deployment) -> Option<Deployment> {
        let replicas_match = resources::deployment_replicas(existing) == Some(app.spec.size);
        let image_match = resources::deployment_image(existing)
            .map_or(true, |image| image == app.spec.image);
        if replicas_match && image_match {
            return None;
        }

        let mut patched = existing.clone();
        let spec = patched.spec.get_or_insert_with(Default::default);
        spec.replicas = Some(app.spec.size);
        if let Some(container) = spec
            .template
            .spec
            .as_mut()
            .and_then(|pod| pod.containers.first_mut())
        {
            container.image = Some(app.spec.image.clone());
        }
        Some(patched)
    }
}

/// The NodePort Service exposing the workload. Created once, never re-diffed.
pub struct Exposure;

impl ManagedKind for Exposure {
    type Object = Service;
    const KIND: &'static str = "Service";

    fn name(app: &MyApp) -> String {
        resources::exposure_name(app)
    }

    fn build_desired(app: &MyApp) -> Result<Service> {
        resources::build_service(app)
    }

    fn diff(_app: &MyApp, _existing: &Service) -> Option<Service> {
        None
    }
}

/// What [`ensure`] did to the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Unchanged,
    Updated,
    /// A concurrent writer got there first; retry against the fresh version
    Conflicted,
    /// Deleted between read and write; the next pass recreates it
    Vanished,
}

impl Applied {
    /// Scheduling directive this result imposes on the current pass, if any
    pub fn requeue(self, created_delay: Duration) -> Option<Outcome> {
        match self {
            Applied::Created => Some(Outcome::RequeueAfter(created_delay)),
            Applied::Updated | Applied::Conflicted | Applied::Vanished => {
                Some(Outcome::RequeueImmediate)
            }
            Applied::Unchanged => None,
        }
    }
}

/// Make sure the `K` object for `app` exists and its owned fields match
pub async fn ensure<K, S>(store: &S, app: &MyApp) -> Result<Applied>
where
    K: ManagedKind,
    S: ObjectStore<K::Object> + AppStore + ?Sized,
{
    let namespace = app.namespace().unwrap_or_else(|| "default".to_string());
    let name = K::name(app);

    let existing = ObjectStore::<K::Object>::get(store, &namespace, &name)
        .await
        .map_err(|e| e.context(K::KIND, &name))?;

    let Some(current) = existing else {
        return create::<K, S>(store, app, &namespace, &name).await;
    };

    let Some(patched) = K::diff(app, &current) else {
        debug!(kind = K::KIND, %namespace, %name, "managed object up to date");
        return Ok(Applied::Unchanged);
    };

    info!(
        kind = K::KIND,
        %namespace,
        %name,
        replicas = app.spec.size,
        "Updating drifted managed object"
    );
    match ObjectStore::<K::Object>::replace(store, &namespace, &name, &patched).await {
        Ok(_) => Ok(Applied::Updated),
        Err(Error::NotFound { .. }) => {
            info!(kind = K::KIND, %namespace, %name, "Object deleted before update, recreating next pass");
            Ok(Applied::Vanished)
        }
        Err(e) if e.is_conflict() => {
            warn!(kind = K::KIND, %namespace, %name, "Update conflicted, re-fetching");
            ObjectStore::<K::Object>::get(store, &namespace, &name)
                .await
                .map_err(|e| e.context(K::KIND, &name))?;

            let message = format!(
                "Failed to update {} {} for MyApp {}: {}",
                K::KIND,
                name,
                app.name_any(),
                e
            );
            conditions::apply_condition(
                store,
                app,
                AVAILABLE,
                ConditionStatus::False,
                reasons::DEGRADED,
                &message,
            )
            .await?;
            Ok(Applied::Conflicted)
        }
        Err(e) => Err(e.context(K::KIND, &name)),
    }
}

async fn create<K, S>(store: &S, app: &MyApp, namespace: &str, name: &str) -> Result<Applied>
where
    K: ManagedKind,
    S: ObjectStore<K::Object> + AppStore + ?Sized,
{
    let desired = match K::build_desired(app) {
        Ok(desired) => desired,
        Err(e) => {
            let reason = format!("FailedToDefine{}", K::KIND);
            record_failure(store, app, &reason, &e).await?;
            return Err(e.context(K::KIND, name));
        }
    };

    info!(kind = K::KIND, %namespace, %name, "Creating managed object");
    match ObjectStore::<K::Object>::create(store, namespace, &desired).await {
        Ok(_) => Ok(Applied::Created),
        Err(Error::AlreadyExists { .. }) => {
            warn!(kind = K::KIND, %namespace, %name, "Object appeared concurrently");
            Ok(Applied::Conflicted)
        }
        Err(e) => {
            let reason = format!("FailedToCreate{}", K::KIND);
            record_failure(store, app, &reason, &e).await?;
            Err(e.context(K::KIND, name))
        }
    }
}

/// Delete the `K` object for `app`; absence counts as success
pub async fn remove<K, S>(store: &S, app: &MyApp) -> Result<()>
where
    K: ManagedKind,
    S: ObjectStore<K::Object> + ?Sized,
{
    let namespace = app.namespace().unwrap_or_else(|| "default".to_string());
    let name = K::name(app);

    let deleted = ObjectStore::<K::Object>::delete(store, &namespace, &name)
        .await
        .map_err(|e| e.context(K::KIND, &name))?;
    if deleted {
        info!(kind = K::KIND, %namespace, %name, "Deleted managed object");
    } else {
        debug!(kind = K::KIND, %namespace, %name, "Managed object already gone");
    }
    Ok(())
}

/// Surface a failure on the Available condition before the error propagates
async fn record_failure<S>(store: &S, app: &MyApp, reason: &str, err: &Error) -> Result<()>
where
    S: AppStore + ?Sized,
{
    conditions::apply_condition(
        store,
        app,
        AVAILABLE,
        ConditionStatus::False,
        reason,
        &format!(
            "Failed to create resources for MyApp {}: {}",
            app.name_any(),
            err.status_message()
        ),
    )
    .await
    .map(|_| ())
}
