//! MyApp Custom Resource Definition
//!
//! A MyApp describes a containerised workload (image, replica count) and
//! the NodePort Service exposing it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{AppPort, Condition};

/// The MyApp CRD represents a workload managed by the operator.
///
/// # Example
///
/// ```yaml
/// apiVersion: apps.echoh.io/v1alpha1
/// kind: MyApp
/// metadata:
///   name: demo
///   namespace: default
/// spec:
///   size: 2
///   image: "nginx:1.25"
///   ports:
///     - port: 80
///       targetPort: 8080
///       nodePort: 30080
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "apps.echoh.io",
    version = "v1alpha1",
    kind = "MyApp",
    namespaced,
    status = "MyAppStatus",
    shortname = "myapp",
    printcolumn = r#"{"name":"Size","type":"integer","jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MyAppSpec {
    /// Desired number of replicas
    pub size: i32,

    /// Container image to run (e.g., "nginx:1.25")
    pub image: String,

    /// Port mappings. Only the last declared entry is applied.
    #[serde(default)]
    pub ports: Vec<AppPort>,
}

impl MyAppSpec {
    /// Validate the spec before any managed object is touched
    pub fn validate(&self) -> Result<(), String> {
        if self.size < 0 {
            return Err("size must be >= 0".to_string());
        }
        if self.image.trim().is_empty() {
            return Err("image must not be empty".to_string());
        }
        if self.ports.is_empty() {
            return Err("ports must declare at least one port".to_string());
        }
        for (i, p) in self.ports.iter().enumerate() {
            if !(1..=65535).contains(&p.port) {
                return Err(format!("ports[{}].port must be between 1 and 65535", i));
            }
            if !(1..=65535).contains(&p.target_port) {
                return Err(format!(
                    "ports[{}].targetPort must be between 1 and 65535",
                    i
                ));
            }
            if let Some(node_port) = p.node_port {
                if !(30000..=32767).contains(&node_port) {
                    return Err(format!(
                        "ports[{}].nodePort must be between 30000 and 32767",
                        i
                    ));
                }
            }
        }
        Ok(())
    }

    /// The port mapping applied to managed objects (last declared wins)
    pub fn effective_port(&self) -> Option<&AppPort> {
        self.ports.last()
    }
}

/// Status subresource for MyApp
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MyAppStatus {
    /// Conditions following Kubernetes conventions, at most one per type
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl MyAppStatus {
    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

impl MyApp {
    /// Conditions currently recorded on the resource
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Whether deletion has been requested
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the given finalizer marker is present
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer))
    }
}
