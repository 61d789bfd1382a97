//! Controller module for MyApp reconciliation
//!
//! This module contains the reconciliation engine, the convergence logic for
//! the managed Deployment and Service, the finalizer lifecycle and the status
//! condition bookkeeping.

mod apply;
pub mod conditions;
mod finalizers;
#[cfg(test)]
mod memory_store;
pub mod metrics;
mod reconciler;
pub mod resources;
mod store;

pub use apply::{Applied, Exposure, ManagedKind, Workload};
pub use finalizers::{LifecycleState, MYAPP_FINALIZER};
pub use reconciler::{
    run_controller, ControllerState, Outcome, Reconciler, ReconcilerSettings, FIELD_MANAGER,
};
pub use store::{AppStore, ClusterStore, KubeStore, ObjectKey, ObjectStore};
