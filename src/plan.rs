//! Schema-driven planning.
//!
//! [`plan_resource`] compares a resource's prior state with the configuration
//! the host proposes and decides between create, in-place update, replace and
//! delete. Attributes marked `force_new` turn any change into a replace; the
//! host then runs delete followed by create, so reconcilers never see an
//! in-place change to such an attribute.

use serde_json::{Map, Value};

use crate::schema::{Attribute, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan the transition from `prior` to `proposed`.
///
/// - `prior` of `None` plans a create.
/// - `proposed` of `null` plans a delete.
/// - Absent optional attributes take their schema default.
/// - Optional+computed attributes left unset keep their prior value.
/// - Computed-only attributes are carried over from `prior`, and dropped when
///   the plan replaces the resource.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|v| !v.is_null());

    if proposed.is_null() {
        return plan_delete(prior);
    }

    let prior_obj = prior.and_then(Value::as_object);
    let proposed_obj = proposed.as_object();
    let prior_get = |name: &str| prior_obj.and_then(|o| o.get(name)).filter(|v| !v.is_null());
    let proposed_get =
        |name: &str| proposed_obj.and_then(|o| o.get(name)).filter(|v| !v.is_null());

    let mut planned = Map::new();
    for (name, attr) in &schema.attributes {
        if let Some(value) = planned_value(attr, prior_get(name), proposed_get(name)) {
            planned.insert(name.clone(), value);
        }
    }

    let requires_replace = prior.is_some()
        && schema.attributes.iter().any(|(name, attr)| {
            attr.force_new && prior_get(name) != planned.get(name).filter(|v| !v.is_null())
        });

    if requires_replace {
        for (name, attr) in &schema.attributes {
            let declared = attr.flags.is_configurable() && proposed_get(name).is_some();
            if attr.flags.computed && !declared {
                planned.remove(name);
            }
        }
    }

    let mut changes = Vec::new();
    for name in schema.attributes.keys() {
        match (prior_get(name), planned.get(name)) {
            (None, Some(after)) => changes.push(AttributeChange::added(name, after.clone())),
            (Some(before), None) => changes.push(AttributeChange::removed(name, before.clone())),
            (Some(before), Some(after)) if before != after => {
                changes.push(AttributeChange::modified(name, before.clone(), after.clone()))
            }
            _ => {}
        }
    }

    let planned = Value::Object(planned);
    if changes.is_empty() {
        PlanResult::no_change(planned)
    } else {
        PlanResult::with_changes(planned, changes, requires_replace)
    }
}

fn planned_value(attr: &Attribute, prior: Option<&Value>, proposed: Option<&Value>) -> Option<Value> {
    if !attr.flags.is_configurable() {
        return prior.cloned();
    }
    if let Some(value) = proposed {
        return Some(value.clone());
    }
    if attr.flags.computed {
        if let Some(value) = prior {
            return Some(value.clone());
        }
    }
    attr.default.clone()
}

fn plan_delete(prior: Option<&Value>) -> PlanResult {
    let changes: Vec<_> = prior
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k, v.clone()))
                .collect()
        })
        .unwrap_or_default();

    if changes.is_empty() {
        PlanResult::no_change(Value::Null)
    } else {
        PlanResult::with_changes(Value::Null, changes, false)
    }
}
