//! Coercion Engine: repairs near-valid structured output against a schema.
//!
//! Repairs are limited to trimming, clamping and type conversion:
//! - `too_big` array → truncated to the maximum, prefix and order kept
//! - `too_big` / `too_small` number → clamped to the bound
//! - `invalid_type` number given a numeric string → parsed
//! - boilerplate in a string field that opts in → trailing segment cut
//!
//! Anything else (short arrays, missing fields, bad enum values) is left
//! unresolved. Values are never invented.

use serde::Serialize;
use serde_json::{Number, Value};
use tracing::debug;

use crate::pipeline::schema::{
    find_boilerplate, IssueCode, PathSegment, Schema, ValidationIssue, ValueKind,
};

/// Upper bound on validate → repair rounds.
pub const MAX_REPAIR_PASSES: usize = 3;

/// Outcome of [`coerce`].
///
/// `data` is `Some` whenever `issues` is empty. `coerced == false` with
/// `Some` data means the input was already valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionResult {
    pub data: Option<Value>,
    pub coerced: bool,
    pub issues: Vec<ValidationIssue>,
}

impl CoercionResult {
    fn valid(data: Value, coerced: bool) -> Self {
        Self {
            data: Some(data),
            coerced,
            issues: Vec::new(),
        }
    }

    fn unresolved(issues: Vec<ValidationIssue>) -> Self {
        Self {
            data: None,
            coerced: false,
            issues,
        }
    }
}

pub fn coerce(raw: &Value, schema: &Schema) -> CoercionResult {
    let mut issues = schema.validate(raw);
    if issues.is_empty() {
        return CoercionResult::valid(raw.clone(), false);
    }

    let mut current = raw.clone();
    let mut applied = 0usize;

    for pass in 1..=MAX_REPAIR_PASSES {
        let mut fixed = 0usize;
        for issue in &issues {
            if let Some(next) = repair(&current, issue) {
                current = next;
                fixed += 1;
            }
        }

        if fixed == 0 {
            break;
        }
        applied += fixed;
        issues = schema.validate(&current);
        debug!(pass, fixed, remaining = issues.len(), "Coercion pass applied");

        if issues.is_empty() {
            break;
        }
    }

    if applied > 0 && issues.is_empty() {
        CoercionResult::valid(current, true)
    } else {
        CoercionResult::unresolved(issues)
    }
}

/// Applies the single fix for `issue`, returning the rebuilt tree, or `None`
/// when the issue is not fixable or its path no longer exists.
fn repair(value: &Value, issue: &ValidationIssue) -> Option<Value> {
    match &issue.code {
        IssueCode::TooBig {
            origin: ValueKind::Array,
            maximum,
        } => {
            let keep = *maximum as usize;
            patch_at(value, &issue.path, |node| match node {
                Value::Array(items) if items.len() > keep => {
                    Some(Value::Array(items[..keep].to_vec()))
                }
                _ => None,
            })
        }
        IssueCode::TooBig {
            origin: ValueKind::Number,
            maximum,
        } => patch_at(value, &issue.path, |node| {
            node.as_f64()
                .filter(|n| n > maximum)
                .map(|_| number_value(*maximum))
        }),
        IssueCode::TooSmall {
            origin: ValueKind::Number,
            minimum,
        } => patch_at(value, &issue.path, |node| {
            node.as_f64()
                .filter(|n| n < minimum)
                .map(|_| number_value(*minimum))
        }),
        IssueCode::InvalidType {
            expected: ValueKind::Number,
            received: ValueKind::String,
        } => patch_at(value, &issue.path, |node| {
            node.as_str()
                .and_then(|text| text.trim().parse::<f64>().ok())
                .filter(|n| n.is_finite())
                .map(number_value)
        }),
        IssueCode::Boilerplate { .. } => patch_at(value, &issue.path, |node| {
            let text = node.as_str()?;
            let (idx, _) = find_boilerplate(text)?;
            Some(Value::String(text[..idx].trim_end().to_string()))
        }),
        _ => None,
    }
}

/// Rebuilds `value` with the node at `path` replaced by `f(node)`.
/// Siblings are carried over unchanged.
fn patch_at(
    value: &Value,
    path: &[PathSegment],
    f: impl FnOnce(&Value) -> Option<Value>,
) -> Option<Value> {
    let Some((head, rest)) = path.split_first() else {
        return f(value);
    };

    match head {
        PathSegment::Key(key) => {
            let map = value.as_object()?;
            let replaced = patch_at(map.get(key)?, rest, f)?;
            let mut rebuilt = map.clone();
            rebuilt.insert(key.clone(), replaced);
            Some(Value::Object(rebuilt))
        }
        PathSegment::Index(index) => {
            let items = value.as_array()?;
            let replaced = patch_at(items.get(*index)?, rest, f)?;
            let mut rebuilt = items.to_vec();
            rebuilt[*index] = replaced;
            Some(Value::Array(rebuilt))
        }
    }
}

/// Whole numbers become JSON integers so integer fields still deserialize.
fn number_value(n: f64) -> Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items_schema() -> Schema {
        Schema::object().field("items", Schema::array(Schema::string()).max_len(3))
    }

    fn confidence_schema() -> Schema {
        Schema::object().field("confidence", Schema::number().range(0.0, 1.0))
    }

    #[test]
    fn test_truncates_array_keeping_prefix() {
        let raw = json!({"items": ["a", "b", "c", "d", "e"]});
        let result = coerce(&raw, &items_schema());
        assert!(result.coerced);
        assert!(result.issues.is_empty());
        assert_eq!(result.data, Some(json!({"items": ["a", "b", "c"]})));
    }

    #[test]
    fn test_clamps_number_above_max_exactly() {
        let result = coerce(&json!({"confidence": 1.2}), &confidence_schema());
        assert!(result.coerced);
        assert_eq!(result.data, Some(json!({"confidence": 1})));
    }

    #[test]
    fn test_clamps_number_below_min_exactly() {
        let result = coerce(&json!({"confidence": -0.25}), &confidence_schema());
        assert_eq!(result.data, Some(json!({"confidence": 0})));
    }

    #[test]
    fn test_clamp_to_fractional_bound() {
        let schema = Schema::object().field("score", Schema::number().range(0.5, 4.5));
        let result = coerce(&json!({"score": 9}), &schema);
        assert_eq!(result.data, Some(json!({"score": 4.5})));
    }

    #[test]
    fn test_valid_input_is_not_coerced() {
        let raw = json!({"items": ["a"]});
        let result = coerce(&raw, &items_schema());
        assert!(!result.coerced);
        assert_eq!(result.data, Some(raw));
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let first = coerce(&json!({"items": ["a", "b", "c", "d"]}), &items_schema());
        let again = coerce(first.data.as_ref().unwrap(), &items_schema());
        assert!(!again.coerced);
        assert_eq!(again.data, first.data);
    }

    #[test]
    fn test_too_small_array_is_never_invented() {
        let schema = Schema::object().field("items", Schema::array(Schema::string()).min_len(4));
        let result = coerce(&json!({"items": ["a"]}), &schema);
        assert_eq!(result.data, None);
        assert!(!result.coerced);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].path_strings(), vec!["items"]);
    }

    #[test]
    fn test_missing_required_field_is_unresolved() {
        let result = coerce(&json!({}), &confidence_schema());
        assert_eq!(result.data, None);
        assert_eq!(result.issues[0].code, IssueCode::Required);
    }

    #[test]
    fn test_numeric_string_is_parsed() {
        let result = coerce(&json!({"confidence": " 0.75 "}), &confidence_schema());
        assert!(result.coerced);
        assert_eq!(result.data, Some(json!({"confidence": 0.75})));
    }

    #[test]
    fn test_numeric_string_out_of_range_is_parsed_then_clamped() {
        let result = coerce(&json!({"confidence": "3"}), &confidence_schema());
        assert!(result.coerced);
        assert_eq!(result.data, Some(json!({"confidence": 1})));
    }

    #[test]
    fn test_non_numeric_string_is_unresolved() {
        let result = coerce(&json!({"confidence": "high"}), &confidence_schema());
        assert_eq!(result.data, None);
        assert!(matches!(
            result.issues[0].code,
            IssueCode::InvalidType {
                expected: ValueKind::Number,
                ..
            }
        ));
    }

    #[test]
    fn test_boilerplate_is_stripped() {
        let schema = Schema::object().field("summary", Schema::string().strip_boilerplate());
        let raw = json!({"summary": "Own the payments platform.\n\nNote: generated for review."});
        let result = coerce(&raw, &schema);
        assert!(result.coerced);
        assert_eq!(
            result.data,
            Some(json!({"summary": "Own the payments platform."}))
        );
    }

    #[test]
    fn test_partial_fix_still_fails_without_data() {
        let schema = Schema::object()
            .field("items", Schema::array(Schema::string()).max_len(2))
            .field("title", Schema::string());
        let result = coerce(&json!({"items": ["a", "b", "c"]}), &schema);
        assert_eq!(result.data, None);
        assert!(!result.coerced);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].path_display(), "title");
    }

    #[test]
    fn test_nested_elements_are_repaired() {
        let schema = Schema::object().field(
            "stages",
            Schema::array(
                Schema::object()
                    .field("minutes", Schema::number().range(15.0, 240.0))
                    .field("questions", Schema::array(Schema::string()).max_len(1)),
            ),
        );
        let raw = json!({"stages": [
            {"minutes": 5, "questions": ["q1"]},
            {"minutes": "90", "questions": ["q1", "q2"]}
        ]});
        let result = coerce(&raw, &schema);
        assert!(result.coerced);
        assert_eq!(
            result.data,
            Some(json!({"stages": [
                {"minutes": 15, "questions": ["q1"]},
                {"minutes": 90, "questions": ["q1"]}
            ]}))
        );
    }

    #[test]
    fn test_truncation_drops_issues_in_removed_elements() {
        let schema = Schema::object().field(
            "scores",
            Schema::array(Schema::number().max(1.0)).max_len(2),
        );
        let result = coerce(&json!({"scores": [0.2, 0.4, 7.0]}), &schema);
        assert_eq!(result.data, Some(json!({"scores": [0.2, 0.4]})));
    }

    #[test]
    fn test_siblings_are_preserved() {
        let schema = Schema::object()
            .field("confidence", Schema::number().max(1.0))
            .optional("extra", Schema::string());
        let raw = json!({"confidence": 2, "extra": "keep", "unknown": [1, 2]});
        let result = coerce(&raw, &schema);
        assert_eq!(
            result.data,
            Some(json!({"confidence": 1, "extra": "keep", "unknown": [1, 2]}))
        );
    }

    #[test]
    fn test_input_is_not_mutated() {
        let raw = json!({"items": ["a", "b", "c", "d"]});
        let snapshot = raw.clone();
        let _ = coerce(&raw, &items_schema());
        assert_eq!(raw, snapshot);
    }
}
