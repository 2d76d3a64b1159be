//! Alarm Condition Spec Migration
//!
//! Device profiles carry alarm rules whose condition `spec` used to hold a
//! bare scalar threshold:
//!
//! ```json
//! {"type": "DURATION", "value": 5}
//! {"type": "REPEATING", "count": 3}
//! ```
//!
//! The scalar is moved into an evaluatable `predicate` wrapper so the
//! threshold can later be resolved from an attribute at evaluation time:
//!
//! ```json
//! {"type": "DURATION", "predicate": {"staticValue": 5, "dynamicValueKey": null, "resolveAsDynamic": false}}
//! ```
//!
//! Both functions are idempotent: a spec that already has no scalar field is
//! left untouched and reported as unchanged.

use crate::models::AlarmSeverity;
use serde_json::{json, Value};

const SPEC_TYPE_DURATION: &str = "DURATION";
const SPEC_TYPE_REPEATING: &str = "REPEATING";

/// Upgrade a single condition spec in place, returning whether it changed
pub fn patch_condition_spec(spec: &mut Value) -> bool {
    let Some(fields) = spec.as_object_mut() else {
        return false;
    };
    let scalar_field = match fields.get("type").and_then(Value::as_str) {
        Some(SPEC_TYPE_DURATION) => "value",
        Some(SPEC_TYPE_REPEATING) => "count",
        _ => return false,
    };
    let Some(scalar) = fields.remove(scalar_field) else {
        return false;
    };
    let predicate = json!({
        "staticValue": scalar,
        "dynamicValueKey": null,
        "resolveAsDynamic": false
    });
    fields.insert("predicate".to_string(), predicate);
    true
}

/// Upgrade every condition spec inside a device profile document
///
/// Visits `alarms[*].createRules.<SEVERITY>.condition.spec` in severity order
/// and `alarms[*].clearRule.condition.spec`. Missing or null levels are skipped.
pub fn patch_profile_data(profile_data: &mut Value) -> bool {
    let Some(alarms) = profile_data.get_mut("alarms").and_then(Value::as_array_mut) else {
        return false;
    };

    let mut updated = false;
    for alarm in alarms.iter_mut().filter_map(Value::as_object_mut) {
        if let Some(create_rules) = alarm.get_mut("createRules").and_then(Value::as_object_mut) {
            for severity in AlarmSeverity::ALL {
                if let Some(rule) = create_rules.get_mut(severity.as_str()) {
                    updated |= patch_rule(rule);
                }
            }
        }
        if let Some(clear_rule) = alarm.get_mut("clearRule") {
            updated |= patch_rule(clear_rule);
        }
    }
    updated
}

fn patch_rule(rule: &mut Value) -> bool {
    rule.as_object_mut()
        .and_then(|rule| rule.get_mut("condition"))
        .and_then(Value::as_object_mut)
        .and_then(|condition| condition.get_mut("spec"))
        .is_some_and(patch_condition_spec)
}
