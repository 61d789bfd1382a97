//! Custom Resource Definitions for the MyApp operator
//!
//! This module defines the Kubernetes CRD reconciled by the controller.

mod my_app;
#[cfg(test)]
mod tests;
mod types;

pub use my_app::{MyApp, MyAppSpec, MyAppStatus};
pub use types::*;
