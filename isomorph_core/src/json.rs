//! Introspection of `serde_json::Value` documents.
//!
//! Arrays are sequences; objects are sequences of key/value entries in key
//! order, so paths look like `JsonObject[0].value[2]`.

use crate::introspect::{Introspect, MapEntry, MemberDescriptor};
use crate::value::{Primitive, Reading, ToValue, Value};
use serde_json::{Map, Value as Json};
use std::any::Any;

/// A JSON array as a comparable sequence.
#[derive(Debug, Clone)]
pub struct JsonArray(pub Vec<Json>);

/// A JSON object as a comparable sequence of entries.
#[derive(Debug, Clone)]
pub struct JsonObject(pub Map<String, Json>);

impl Introspect for JsonArray {
    fn type_name(&self) -> &'static str {
        "JsonArray"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        Vec::new()
    }

    fn is_sequence(&self) -> bool {
        true
    }

    fn elements(&self) -> Option<Vec<Reading<'_>>> {
        Some(self.0.iter().map(ToValue::reading).collect())
    }
}

impl Introspect for JsonObject {
    fn type_name(&self) -> &'static str {
        "JsonObject"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        Vec::new()
    }

    fn is_sequence(&self) -> bool {
        true
    }

    fn elements(&self) -> Option<Vec<Reading<'_>>> {
        let mut entries: Vec<(&String, &Json)> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Some(
            entries
                .into_iter()
                .map(|(key, value)| {
                    Reading::Value(Value::object(MapEntry {
                        key: key.clone(),
                        value: value.clone(),
                    }))
                })
                .collect(),
        )
    }
}

impl ToValue for Json {
    fn to_value(&self) -> Value {
        match self {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Primitive(Primitive::Bool(*b)),
            Json::Number(n) => {
                let primitive = if let Some(i) = n.as_i64() {
                    Primitive::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Primitive::U64(u)
                } else {
                    Primitive::F64(n.as_f64().unwrap_or(f64::NAN))
                };
                Value::Primitive(primitive)
            }
            Json::String(s) => Value::Primitive(Primitive::Str(s.clone())),
            Json::Array(items) => Value::object(JsonArray(items.clone())),
            Json::Object(map) => Value::object(JsonObject(map.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::Validator;
    use crate::report::MismatchKind;
    use serde_json::json;

    #[test]
    fn test_equal_documents() {
        let a = json!({"name": "ann", "tags": [1, 2, {"deep": null}]});
        let b = json!({"tags": [1, 2, {"deep": null}], "name": "ann"});
        assert!(Validator::default().validate(&a.to_value(), &b.to_value()).is_ok());
    }

    #[test]
    fn test_array_length_drift() {
        let a = json!({"tags": [1, 2, 3]});
        let b = json!({"tags": [1, 2, 3, 4]});
        let err = Validator::default().validate(&a.to_value(), &b.to_value()).unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.kind, MismatchKind::LengthMismatch);
        assert_eq!(report.path, "JsonObject[0].value");
    }

    #[test]
    fn test_integer_against_float_is_type_mismatch() {
        let err = Validator::default()
            .validate(&json!([1]).to_value(), &json!([1.0]).to_value())
            .unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.kind, MismatchKind::TypeMismatch);
        assert_eq!(report.path, "JsonArray[0]");
        assert_eq!(report.expected_text, "i64");
        assert_eq!(report.actual_text, "f64");
    }
}
