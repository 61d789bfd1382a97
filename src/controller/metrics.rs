//! Prometheus metrics for the MyApp operator

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use super::store::ObjectKey;

/// Labels for the reconciliation counter
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    pub namespace: String,
    pub name: String,
    pub outcome: String,
}

/// Counter of reconciliation passes per MyApp and outcome
pub static RECONCILIATIONS: Lazy<Family<ReconcileLabels, Counter>> = Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();
    registry.register(
        "myapp_reconciliations",
        "Reconciliation passes by outcome",
        RECONCILIATIONS.clone(),
    );
    registry
});

/// Count one reconciliation pass
pub fn record_outcome(key: &ObjectKey, outcome: &str) {
    let labels = ReconcileLabels {
        namespace: key.namespace.clone(),
        name: key.name.clone(),
        outcome: outcome.to_string(),
    };
    RECONCILIATIONS.get_or_create(&labels).inc();
}
