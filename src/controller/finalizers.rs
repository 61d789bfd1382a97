//! Finalizer lifecycle for MyApp
//!
//! A MyApp moves through three states:
//!
//! - **Active**: no deletion timestamp
//! - **Terminating**: deletion requested, finalizer still present
//! - **Finalized**: finalizer removed, the API server may drop the object
//!
//! Terminating → Finalized only happens after the managed Deployment and
//! Service are confirmed gone. Each step is safe to repeat, so a pass that
//! fails half way is simply retried.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::{debug, info};

use super::apply::{self, Exposure, Workload};
use super::conditions::{self, reasons, UNAVAILABLE};
use super::reconciler::Outcome;
use super::store::{AppStore, ClusterStore, ObjectKey, ObjectStore};
use crate::crd::{ConditionStatus, MyApp};
use crate::error::Result;

/// Finalizer marker placed on every MyApp the controller manages
pub const MYAPP_FINALIZER: &str = "echoh.wonderscloud.com/finalizer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Terminating,
    Finalized,
}

impl LifecycleState {
    pub fn of(app: &MyApp, finalizer: &str) -> Self {
        match (app.is_terminating(), app.has_finalizer(finalizer)) {
            (false, _) => LifecycleState::Active,
            (true, true) => LifecycleState::Terminating,
            (true, false) => LifecycleState::Finalized,
        }
    }
}

/// Add the finalizer marker and persist it
pub async fn add<S>(store: &S, app: &MyApp, finalizer: &str) -> Result<MyApp>
where
    S: AppStore + ?Sized,
{
    if app.has_finalizer(finalizer) {
        return Ok(app.clone());
    }
    info!(name = %app.name_any(), finalizer, "Adding finalizer");
    let mut updated = app.clone();
    updated.finalizers_mut().push(finalizer.to_string());
    store.update_app(&updated).await
}

/// Remove the finalizer marker and persist it
pub async fn remove<S>(store: &S, app: &MyApp, finalizer: &str) -> Result<MyApp>
where
    S: AppStore + ?Sized,
{
    info!(name = %app.name_any(), finalizer, "Removing finalizer");
    let mut updated = app.clone();
    updated.finalizers_mut().retain(|f| f != finalizer);
    store.update_app(&updated).await
}

/// Drive a terminating MyApp to Finalized
///
/// Any error leaves the finalizer in place for the next pass.
pub async fn finalize<S>(store: &S, key: &ObjectKey, app: MyApp, finalizer: &str) -> Result<Outcome>
where
    S: ClusterStore + ?Sized,
{
    if LifecycleState::of(&app, finalizer) != LifecycleState::Terminating {
        debug!(%key, "No finalizer present, nothing to clean up");
        return Ok(Outcome::Done);
    }

    info!(%key, "Performing finalizer operations before deletion");
    let app = conditions::apply_condition(
        store,
        &app,
        UNAVAILABLE,
        ConditionStatus::False,
        reasons::MARKED_FOR_DELETION,
        &format!("Performing finalizer operations for MyApp {}", key.name),
    )
    .await?;

    cleanup(store, &app).await?;

    let Some(app) = store.get_app(key).await? else {
        debug!(%key, "MyApp disappeared during cleanup");
        return Ok(Outcome::Done);
    };

    let app = conditions::apply_condition(
        store,
        &app,
        UNAVAILABLE,
        ConditionStatus::True,
        reasons::CLEANUP_COMPLETE,
        &format!("Finalizer operations for MyApp {} completed", key.name),
    )
    .await?;

    remove(store, &app, finalizer).await?;
    info!(%key, "Cleanup complete");
    Ok(Outcome::Done)
}

/// Delete both managed objects; absence is not an error
async fn cleanup<S>(store: &S, app: &MyApp) -> Result<()>
where
    S: ObjectStore<Deployment> + ObjectStore<Service> + ?Sized,
{
    apply::remove::<Workload, S>(store, app).await?;
    apply::remove::<Exposure, S>(store, app).await?;
    Ok(())
}
