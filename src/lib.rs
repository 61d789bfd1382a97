//! MyApp operator
//!
//! Reconciles `MyApp` custom resources into a Deployment and a NodePort
//! Service, with finalizer-guarded cleanup and status conditions.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod rest_api;
