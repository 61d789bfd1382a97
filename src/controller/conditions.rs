//! Status condition bookkeeping for MyApp
//!
//! Conditions are keyed by type and treated as an immutable list:
//! [`set_condition`] returns a new list rather than editing in place, so the
//! transition-time rules can be tested without a cluster.

use chrono::{DateTime, SecondsFormat, Utc};
use kube::ResourceExt;
use tracing::debug;

use super::store::AppStore;
use crate::crd::{Condition, ConditionStatus, MyApp, MyAppStatus};
use crate::error::Result;

pub const AVAILABLE: &str = "Available";
pub const UNAVAILABLE: &str = "Unavailable";

pub mod reasons {
    pub const INITIALIZING: &str = "Initializing";
    pub const RECONCILED: &str = "Reconciled";
    pub const INVALID_SPEC: &str = "InvalidSpec";
    pub const DEGRADED: &str = "Degraded";
    pub const MARKED_FOR_DELETION: &str = "MarkedForDeletion";
    pub const CLEANUP_COMPLETE: &str = "CleanupComplete";
}

/// Return `conditions` with the entry for `type_` set to the given values.
///
/// An existing entry with identical status, reason and message is left
/// untouched, transition time included. Any difference replaces the entry in
/// its current position with `now` as the transition time. New types are
/// appended.
pub fn set_condition(
    conditions: &[Condition],
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Vec<Condition> {
    let updated = Condition {
        type_: type_.to_string(),
        status,
        last_transition_time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        reason: reason.to_string(),
        message: message.to_string(),
    };

    match conditions.iter().position(|c| c.type_ == type_) {
        Some(pos) if conditions[pos].matches(status, reason, message) => conditions.to_vec(),
        Some(pos) => {
            let mut next = conditions.to_vec();
            next[pos] = updated;
            next
        }
        None => {
            let mut next = conditions.to_vec();
            next.push(updated);
            next
        }
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

/// Set a condition on `app` and persist it through the status subresource.
///
/// Returns the stored copy so later writes carry the fresh resourceVersion.
/// When the condition is already current nothing is written and `app` is
/// returned as is.
pub async fn apply_condition<S>(
    store: &S,
    app: &MyApp,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> Result<MyApp>
where
    S: AppStore + ?Sized,
{
    let current = app.conditions();
    let next = set_condition(current, type_, status, reason, message, Utc::now());
    if next.as_slice() == current {
        debug!(name = %app.name_any(), condition = type_, "condition unchanged, skipping status write");
        return Ok(app.clone());
    }

    let mut updated = app.clone();
    updated.status = Some(MyAppStatus { conditions: next });
    store.update_app_status(&updated).await
}
