use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{self, Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::{ConditionStatus, MyApp};
use crate::error::{Error, Result};

use super::apply::{self, Exposure, Workload};
use super::conditions::{self, reasons, AVAILABLE};
use super::finalizers::{self, MYAPP_FINALIZER};
use super::metrics;
use super::resources;
use super::store::{ClusterStore, KubeStore, ObjectKey};

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "myapp-operator";

/// Scheduling directive returned by one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Converged; wait for the next change
    Done,
    /// Check again after the given delay
    RequeueAfter(Duration),
    /// Check again right away against fresh state
    RequeueImmediate,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Done => "done",
            Outcome::RequeueAfter(_) => "requeue_after",
            Outcome::RequeueImmediate => "requeue_immediate",
        }
    }
}

impl From<Outcome> for Action {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Action::await_change(),
            Outcome::RequeueAfter(delay) => Action::requeue(delay),
            Outcome::RequeueImmediate => Action::requeue(Duration::ZERO),
        }
    }
}

/// Engine settings
#[derive(Clone, Debug)]
pub struct ReconcilerSettings {
    /// Finalizer marker guarding cleanup
    pub finalizer: String,
    /// Delay before re-checking an object that was just created
    pub requeue_after: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            finalizer: MYAPP_FINALIZER.to_string(),
            requeue_after: Duration::from_secs(60),
        }
    }
}

/// Drives one MyApp towards its desired state per invocation
///
/// Holds no per-object state, so passes for different keys can run
/// concurrently and a pass may start right after the previous one returns.
pub struct Reconciler<S: ?Sized> {
    store: Arc<S>,
    settings: ReconcilerSettings,
}

impl<S> Reconciler<S>
where
    S: ClusterStore + ?Sized,
{
    pub fn new(store: Arc<S>, settings: ReconcilerSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Run one reconciliation pass for `key`
    #[instrument(skip(self, key), fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome> {
        let store = &*self.store;

        let Some(mut app) = store.get_app(key).await? else {
            info!("MyApp {} has been deleted", key);
            return Ok(Outcome::Done);
        };

        if app.conditions().is_empty() {
            conditions::apply_condition(
                store,
                &app,
                AVAILABLE,
                ConditionStatus::Unknown,
                reasons::INITIALIZING,
                "Starting reconciliation",
            )
            .await?;

            // status writes bump resourceVersion; continue from the stored copy
            app = match store.get_app(key).await? {
                Some(app) => app,
                None => return Ok(Outcome::Done),
            };
        }

        if !app.is_terminating() {
            app = finalizers::add(store, &app, &self.settings.finalizer).await?;
        }

        if app.is_terminating() {
            return finalizers::finalize(store, key, app, &self.settings.finalizer).await;
        }

        if let Err(msg) = app.spec.validate() {
            warn!("Validation failed for {}: {}", key, msg);
            conditions::apply_condition(
                store,
                &app,
                AVAILABLE,
                ConditionStatus::False,
                reasons::INVALID_SPEC,
                &msg,
            )
            .await?;
            return Err(Error::ValidationError(msg));
        }

        let delay = self.settings.requeue_after;

        let workload = apply::ensure::<Workload, S>(store, &app).await?;
        debug!(result = ?workload, "Deployment ensured");
        if let Some(outcome) = workload.requeue(delay) {
            return Ok(outcome);
        }

        let exposure = apply::ensure::<Exposure, S>(store, &app).await?;
        debug!(result = ?exposure, "Service ensured");
        if let Some(outcome) = exposure.requeue(delay) {
            return Ok(outcome);
        }

        let was_available = conditions::is_condition_true(app.conditions(), AVAILABLE);
        conditions::apply_condition(
            store,
            &app,
            AVAILABLE,
            ConditionStatus::True,
            reasons::RECONCILED,
            &format!(
                "Deployment {} with {} replicas and Service {} are up to date",
                resources::workload_name(&app),
                app.spec.size,
                resources::exposure_name(&app)
            ),
        )
        .await?;
        if !was_available {
            info!("MyApp {} is available", key);
        }

        Ok(Outcome::Done)
    }
}

/// Shared state for the controller
pub struct ControllerState {
    pub reconciler: Reconciler<KubeStore>,
    /// Requeue delay after a retriable error
    pub retry_backoff: Duration,
    /// Requeue delay after any other error
    pub failure_backoff: Duration,
}

/// Main entry point to start the controller
pub async fn run_controller(
    client: Client,
    namespace: Option<String>,
    state: Arc<ControllerState>,
) -> Result<()> {
    let (apps, deployments, services): (Api<MyApp>, Api<Deployment>, Api<Service>) =
        match namespace.as_deref() {
            Some(ns) => (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
            ),
            None => (
                Api::all(client.clone()),
                Api::all(client.clone()),
                Api::all(client.clone()),
            ),
        };

    info!("Starting MyApp controller");

    // Verify CRD exists
    match apps.list(&ListParams::default().limit(1)).await {
        Ok(_) => info!("MyApp CRD is available"),
        Err(e) => {
            error!("MyApp CRD not found. Please install the CRD first: {:?}", e);
            return Err(Error::ConfigError("MyApp CRD not installed".to_string()));
        }
    }

    Controller::new(apps, Config::default())
        // Watch owned resources for changes
        .owns(deployments, Config::default())
        .owns(services, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled: {}", obj),
                // logged by error_policy
                Err(controller::Error::ReconcilerFailed(..)) => {}
                Err(e) => warn!("Controller error: {}", e),
            }
        })
        .await;

    Ok(())
}

/// The runtime-facing reconciliation function
///
/// Called whenever a MyApp or one of its owned objects changes, or a requeue
/// timer fires.
async fn reconcile(obj: Arc<MyApp>, ctx: Arc<ControllerState>) -> Result<Action> {
    let key = ObjectKey::for_app(&obj);
    let result = ctx.reconciler.reconcile(&key).await;
    metrics::record_outcome(&key, result.as_ref().map(Outcome::label).unwrap_or("error"));
    result.map(Action::from)
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(app: Arc<MyApp>, error: &Error, ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {}", app.name_any(), error);

    let retry_duration = if error.is_retriable() {
        ctx.retry_backoff
    } else {
        ctx.failure_backoff
    };

    Action::requeue(retry_duration)
}
