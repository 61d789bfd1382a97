//! Operator configuration
//!
//! Every option can be given as a flag or through the environment, so the
//! same binary runs unchanged from a shell or a Deployment manifest.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::controller::ReconcilerSettings;

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "myapp-operator")]
#[command(about = "Reconciles MyApp resources into a Deployment and a NodePort Service", long_about = None)]
#[command(version)]
pub struct OperatorConfig {
    /// Namespace to watch (all namespaces when omitted)
    #[arg(short, long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds to wait before re-checking a freshly created object
    #[arg(long, env = "MYAPP_REQUEUE_AFTER_SECS", default_value_t = 60)]
    pub requeue_after_secs: u64,

    /// Seconds to wait after a retriable error
    #[arg(long, env = "MYAPP_RETRY_BACKOFF_SECS", default_value_t = 15)]
    pub retry_backoff_secs: u64,

    /// Seconds to wait after a non-retriable error
    #[arg(long, env = "MYAPP_FAILURE_BACKOFF_SECS", default_value_t = 60)]
    pub failure_backoff_secs: u64,

    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Listen address for /metrics and /health
    #[arg(long, env = "MYAPP_METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: SocketAddr,
}

impl OperatorConfig {
    pub fn settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            requeue_after: Duration::from_secs(self.requeue_after_secs),
            ..ReconcilerSettings::default()
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }
}

/// Initialize the global tracing subscriber
///
/// Filtering follows `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
    }
}
