//! HTTP surface of the operator
//!
//! Serves Prometheus metrics and a liveness probe.

mod server;

pub use server::{router, run_server};
