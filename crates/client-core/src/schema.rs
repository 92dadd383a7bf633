use std::collections::HashMap;

use serde_json::Value;

use crate::error::ApiError;

/// Runtime kind tag of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Any JSON number.
    Number,
    /// A JSON string.
    String,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl JsonKind {
    /// Kind tag of `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// Declarative schema for validating untyped JSON response bodies.
///
/// Schemas are pure values with no side effects; they are typically built
/// once as long-lived constants and reused across many validations.
///
/// Objects validated against [`Schema::Shape`] are open: keys not named in
/// the shape are permitted. A key named in the shape is required unless its
/// schema is wrapped in [`Schema::Optional`]; when the key is present its
/// value must fully match the base schema either way.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Matches any value.
    Any,
    /// Matches exactly one JSON kind; no widening between kinds.
    Kind(JsonKind),
    /// Marks a [`Schema::Shape`] key as optional. Outside a shape's
    /// presence check it validates like its base schema.
    Optional(Box<Schema>),
    /// Matches when any branch matches.
    Union(Vec<Schema>),
    /// Matches when every branch matches.
    Intersection(Vec<Schema>),
    /// An object whose values all match one schema; keys are unconstrained.
    ObjectOf(Box<Schema>),
    /// An array whose elements all match one schema.
    ArrayOf(Box<Schema>),
    /// An object with a fixed set of keys, open to extras.
    Shape(HashMap<String, Schema>),
    /// A typed key/value map. JSON object keys are always strings, so any
    /// declared key kind other than [`JsonKind::String`] never matches.
    MapOf {
        /// Declared key kind.
        key: JsonKind,
        /// Schema every contained value must match.
        value: Box<Schema>,
    },
}

impl Schema {
    /// Shorthand for `Optional(base)`.
    pub fn optional(base: Schema) -> Self {
        Self::Optional(Box::new(base))
    }

    /// Shorthand for `Union(branches)`.
    pub fn union(branches: impl IntoIterator<Item = Schema>) -> Self {
        Self::Union(branches.into_iter().collect())
    }

    /// Shorthand for `Intersection(branches)`.
    pub fn intersection(branches: impl IntoIterator<Item = Schema>) -> Self {
        Self::Intersection(branches.into_iter().collect())
    }

    /// Shorthand for `ObjectOf(values)`.
    pub fn object_of(values: Schema) -> Self {
        Self::ObjectOf(Box::new(values))
    }

    /// Shorthand for `ArrayOf(elements)`.
    pub fn array_of(elements: Schema) -> Self {
        Self::ArrayOf(Box::new(elements))
    }

    /// Shorthand for `Shape(entries)`.
    pub fn shape<K: Into<String>>(entries: impl IntoIterator<Item = (K, Schema)>) -> Self {
        Self::Shape(
            entries
                .into_iter()
                .map(|(key, schema)| (key.into(), schema))
                .collect(),
        )
    }

    /// Shorthand for `MapOf { key, value }`.
    pub fn map_of(key: JsonKind, value: Schema) -> Self {
        Self::MapOf {
            key,
            value: Box::new(value),
        }
    }
}

/// Check `value` against `schema`.
///
/// Validation is pure: deterministic on its inputs and never mutating
/// either of them. Recursion depth tracks JSON nesting depth.
pub fn is_valid(value: &Value, schema: &Schema) -> bool {
    match schema {
        Schema::Any => true,
        Schema::Kind(kind) => JsonKind::of(value) == *kind,
        Schema::Shape(fields) => {
            let Value::Object(map) = value else {
                return false;
            };
            fields.iter().all(|(key, field_schema)| match map.get(key) {
                // Absent keys are fine only when declared optional.
                None => matches!(field_schema, Schema::Optional(_)),
                Some(field_value) => is_valid(field_value, field_schema),
            })
        }
        Schema::Optional(base) => is_valid(value, base),
        Schema::Union(branches) => branches.iter().any(|branch| is_valid(value, branch)),
        Schema::Intersection(branches) => branches.iter().all(|branch| is_valid(value, branch)),
        Schema::ObjectOf(value_schema) => {
            let Value::Object(map) = value else {
                return false;
            };
            map.values().all(|entry| is_valid(entry, value_schema))
        }
        Schema::ArrayOf(element_schema) => {
            let Value::Array(items) = value else {
                return false;
            };
            items.iter().all(|item| is_valid(item, element_schema))
        }
        Schema::MapOf { key, value: value_schema } => {
            if *key != JsonKind::String {
                return false;
            }
            let Value::Object(map) = value else {
                return false;
            };
            map.values().all(|entry| is_valid(entry, value_schema))
        }
    }
}

/// Validate `value` against `schema`, failing with [`ApiError::InvalidResponse`].
///
/// Values are never coerced or defaulted to satisfy a schema.
pub fn ensure_valid(value: &Value, schema: &Schema) -> Result<(), ApiError> {
    if is_valid(value, schema) {
        Ok(())
    } else {
        Err(ApiError::InvalidResponse)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wildcard_accepts_every_kind() {
        for value in [json!(null), json!(true), json!(1.5), json!("x"), json!([]), json!({})] {
            assert!(is_valid(&value, &Schema::Any));
        }
    }

    #[test]
    fn kinds_match_exactly_without_widening() {
        assert!(is_valid(&json!(7), &Schema::Kind(JsonKind::Number)));
        assert!(is_valid(&json!(7.25), &Schema::Kind(JsonKind::Number)));
        assert!(!is_valid(&json!(true), &Schema::Kind(JsonKind::Number)));
        assert!(!is_valid(&json!("7"), &Schema::Kind(JsonKind::Number)));
        assert!(!is_valid(&json!(null), &Schema::Kind(JsonKind::Bool)));
    }

    #[test]
    fn shape_requires_keys_unless_optional() {
        let required = Schema::shape([("a", Schema::Kind(JsonKind::Number))]);
        let optional = Schema::shape([("a", Schema::optional(Schema::Kind(JsonKind::Number)))]);

        assert!(!is_valid(&json!({}), &required));
        assert!(is_valid(&json!({}), &optional));
        assert!(is_valid(&json!({"a": 3}), &required));
    }

    #[test]
    fn present_optional_values_must_fully_match() {
        let schema = Schema::shape([("a", Schema::optional(Schema::Kind(JsonKind::Number)))]);
        assert!(is_valid(&json!({"a": 2}), &schema));
        assert!(!is_valid(&json!({"a": "two"}), &schema));
    }

    #[test]
    fn shapes_are_open_to_extra_keys() {
        let schema = Schema::shape([("a", Schema::Kind(JsonKind::Number))]);
        assert!(is_valid(&json!({"a": 1, "b": "anything"}), &schema));
    }

    #[test]
    fn shapes_reject_non_objects() {
        let schema = Schema::shape([("a", Schema::Kind(JsonKind::Number))]);
        assert!(!is_valid(&json!([1, 2]), &schema));
        assert!(!is_valid(&json!("a"), &schema));
    }

    #[test]
    fn optional_outside_a_shape_delegates_to_its_base() {
        let base = Schema::Kind(JsonKind::String);
        let wrapped = Schema::optional(Schema::Kind(JsonKind::String));
        for value in [json!("x"), json!(5), json!(null)] {
            assert_eq!(is_valid(&value, &wrapped), is_valid(&value, &base));
        }
    }

    #[test]
    fn union_matches_any_branch() {
        let schema = Schema::union([
            Schema::Kind(JsonKind::Number),
            Schema::Kind(JsonKind::Bool),
        ]);
        assert!(is_valid(&json!(true), &schema));
        assert!(is_valid(&json!(2), &schema));
        assert!(!is_valid(&json!("no"), &schema));
    }

    #[test]
    fn intersection_requires_every_branch() {
        let with_any = Schema::intersection([Schema::Kind(JsonKind::Number), Schema::Any]);
        assert!(is_valid(&json!(5), &with_any));

        let failing = Schema::intersection([
            Schema::Kind(JsonKind::Number),
            Schema::Kind(JsonKind::String),
        ]);
        assert!(!is_valid(&json!(5), &failing));
    }

    #[test]
    fn object_of_checks_every_value() {
        let schema = Schema::object_of(Schema::Kind(JsonKind::Number));
        assert!(is_valid(&json!({"k1": 1, "k2": 2}), &schema));
        assert!(!is_valid(&json!({"k1": 1, "k2": "2"}), &schema));
        assert!(!is_valid(&json!([1, 2]), &schema));
    }

    #[test]
    fn array_of_checks_every_element() {
        let schema = Schema::array_of(Schema::Kind(JsonKind::Number));
        assert!(is_valid(&json!([1, 2, 3]), &schema));
        assert!(!is_valid(&json!([1, 2, "x"]), &schema));
        assert!(is_valid(&json!([]), &schema));
        assert!(!is_valid(&json!({"0": 1}), &schema));
    }

    #[test]
    fn map_of_requires_string_keys() {
        let valid = Schema::map_of(JsonKind::String, Schema::Kind(JsonKind::Bool));
        assert!(is_valid(&json!({"a": true, "b": false}), &valid));
        assert!(!is_valid(&json!({"a": 1}), &valid));

        // JSON cannot have non-string keys, so this fails closed.
        let invalid = Schema::map_of(JsonKind::Number, Schema::Kind(JsonKind::Bool));
        assert!(!is_valid(&json!({"1": true}), &invalid));
    }

    #[test]
    fn nested_schemas_recurse() {
        let schema = Schema::shape([(
            "rooms",
            Schema::array_of(Schema::shape([
                ("room_id", Schema::Kind(JsonKind::String)),
                ("unread", Schema::optional(Schema::Kind(JsonKind::Number))),
            ])),
        )]);

        let body = json!({
            "rooms": [
                {"room_id": "!a:example.org", "unread": 3},
                {"room_id": "!b:example.org"},
            ],
        });
        assert!(is_valid(&body, &schema));

        let bad = json!({"rooms": [{"unread": 3}]});
        assert!(!is_valid(&bad, &schema));
    }

    #[test]
    fn ensure_valid_maps_mismatch_to_invalid_response() {
        let schema = Schema::Kind(JsonKind::String);
        assert_eq!(ensure_valid(&json!("ok"), &schema), Ok(()));
        assert_eq!(
            ensure_valid(&json!(1), &schema),
            Err(ApiError::InvalidResponse)
        );
    }

    #[test]
    fn validation_is_deterministic_for_repeated_calls() {
        let schema = Schema::union([
            Schema::object_of(Schema::Kind(JsonKind::Number)),
            Schema::array_of(Schema::Any),
        ]);
        let value = json!({"a": 1, "b": 2});
        let first = is_valid(&value, &schema);
        assert_eq!(first, is_valid(&value, &schema));
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }
}
