//! Kubernetes resource builders for MyApp
//!
//! Pure mapping from a MyApp to the Deployment and Service the controller
//! manages on its behalf. Nothing here talks to the cluster, so the output
//! for a given MyApp is always the same.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};

use crate::crd::MyApp;
use crate::error::{Error, Result};

/// Suffix appended to the MyApp name to form the Service name
pub const EXPOSURE_SUFFIX: &str = "-svc";

/// Name of the managed Deployment
pub fn workload_name(app: &MyApp) -> String {
    app.name_any()
}

/// Name of the managed Service
pub fn exposure_name(app: &MyApp) -> String {
    format!("{}{}", app.name_any(), EXPOSURE_SUFFIX)
}

/// Get the standard labels for a MyApp's resources
pub fn standard_labels(app: &MyApp) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), "myapp".to_string());
    labels.insert("app.kubernetes.io/instance".to_string(), app.name_any());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "myapp-operator".to_string(),
    );
    labels.insert("app".to_string(), app.name_any());
    labels
}

/// Create an OwnerReference for garbage collection
///
/// Fails when the MyApp has no uid yet, since a reference without one would
/// never be honoured by the garbage collector.
pub fn owner_reference(app: &MyApp) -> Result<OwnerReference> {
    let uid = app.metadata.uid.clone().ok_or_else(|| {
        Error::InvariantViolation(format!(
            "cannot set owner reference: MyApp {} has no uid",
            app.name_any()
        ))
    })?;

    Ok(OwnerReference {
        api_version: MyApp::api_version(&()).to_string(),
        kind: MyApp::kind(&()).to_string(),
        name: app.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

// ============================================================================
// Deployment
// ============================================================================

/// Build the desired Deployment for a MyApp
pub fn build_deployment(app: &MyApp) -> Result<Deployment> {
    let labels = standard_labels(app);
    let name = workload_name(app);

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: app.namespace(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner_reference(app)?]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(app.spec.size),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![build_container(app)],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

fn build_container(app: &MyApp) -> Container {
    let ports = app.spec.effective_port().map(|p| {
        vec![ContainerPort {
            container_port: p.target_port,
            ..Default::default()
        }]
    });

    Container {
        name: format!("{}-container", app.name_any()),
        image: Some(app.spec.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports,
        ..Default::default()
    }
}

/// Replica count currently declared on a Deployment
pub fn deployment_replicas(deployment: &Deployment) -> Option<i32> {
    deployment.spec.as_ref().and_then(|s| s.replicas)
}

/// Image of the first container of a Deployment
pub fn deployment_image(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.containers.first())
        .and_then(|c| c.image.as_deref())
}

// ============================================================================
// Service
// ============================================================================

/// Build the desired NodePort Service for a MyApp
pub fn build_service(app: &MyApp) -> Result<Service> {
    let port = app.spec.effective_port().ok_or_else(|| {
        Error::InvariantViolation(format!(
            "MyApp {} declares no ports to expose",
            app.name_any()
        ))
    })?;

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(exposure_name(app)),
            namespace: app.namespace(),
            labels: Some(standard_labels(app)),
            owner_references: Some(vec![owner_reference(app)?]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            selector: Some(standard_labels(app)),
            ports: Some(vec![ServicePort {
                port: port.port,
                node_port: port.node_port,
                target_port: Some(IntOrString::Int(port.target_port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    })
}
