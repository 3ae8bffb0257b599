//! Schema derivation from untyped JSON.
//!
//! Objects have no type name of their own, so each one is named after its
//! position: the root object takes the root name and a nested object appends
//! its key (`Root` → `RootSchool`). Array elements share the array's name,
//! so objects in one array merge into a single declaration.

use serde_json::Value;
use tracing::debug;

use crate::error::SchemaError;
use crate::reflect::{Collector, ReflectOptions};
use crate::schema::{go_field_ident, go_type_ident, Field, PrimitiveKind, Reflection, Schema};

/// Derive the schema of a JSON document.
pub fn reflect_json(
    value: &Value,
    root_name: &str,
    options: &ReflectOptions,
) -> Result<Reflection, SchemaError> {
    let mut collector = Collector::new(options.max_depth);
    let root = visit(&mut collector, value, &go_type_ident(root_name))?;
    let reflection = collector.table.finish(root)?;
    debug!(
        root = %reflection.root.go_type(),
        declarations = reflection.declarations.len(),
        "reflected json"
    );
    Ok(reflection)
}

fn visit(collector: &mut Collector, value: &Value, name: &str) -> Result<Schema, SchemaError> {
    let schema = match value {
        Value::Null => Schema::UNKNOWN,
        Value::Bool(_) => Schema::Primitive(PrimitiveKind::Bool),
        Value::Number(n) if n.is_i64() => Schema::Primitive(PrimitiveKind::Int64),
        Value::Number(n) if n.is_u64() => Schema::Primitive(PrimitiveKind::Uint64),
        Value::Number(_) => Schema::Primitive(PrimitiveKind::Float64),
        Value::String(_) => Schema::Primitive(PrimitiveKind::String),
        Value::Array(items) => {
            collector.descend()?;
            let mut elem = Schema::UNKNOWN;
            for item in items {
                elem = elem.unify(visit(collector, item, name)?);
            }
            collector.ascend();
            Schema::Slice(Box::new(elem))
        }
        Value::Object(map) => {
            collector.descend()?;
            let mut fields = Vec::with_capacity(map.len());
            for (key, item) in map {
                let child = format!("{name}{}", go_field_ident(key));
                fields.push(Field::new(key.as_str(), visit(collector, item, &child)?));
            }
            collector.ascend();
            collector.table.record(name, fields.clone());
            Schema::Struct {
                name: name.to_owned(),
                fields,
            }
        }
    };
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn names(r: &Reflection) -> Vec<&str> {
        r.declarations.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn objects_are_named_by_path() {
        let data = json!({
            "Name": "Ann",
            "School": { "Name": "North", "Address": { "City": "X" } }
        });
        let r = reflect_json(&data, "Root", &ReflectOptions::default()).unwrap();
        assert_eq!(r.root.go_type(), "Root");
        assert_eq!(names(&r), vec!["RootSchoolAddress", "RootSchool", "Root"]);
    }

    #[test]
    fn array_objects_merge_into_one_declaration() {
        let data = json!({ "items": [ { "a": 1 }, { "a": null, "b": "x" } ] });
        let r = reflect_json(&data, "Root", &ReflectOptions::default()).unwrap();
        assert_eq!(names(&r), vec!["RootItems", "Root"]);
        let fields: Vec<_> = r.declarations[0]
            .go_fields()
            .into_iter()
            .map(|f| (f.ident, f.go_type, f.tag))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("A".to_owned(), "int64".to_owned(), Some("a".to_owned())),
                ("B".to_owned(), "string".to_owned(), Some("b".to_owned())),
            ]
        );
    }

    #[test]
    fn mixed_numbers_fall_back_to_interface() {
        let data = json!([1, 2.5]);
        let r = reflect_json(&data, "Root", &ReflectOptions::default()).unwrap();
        assert_eq!(r.root.go_type(), "[]interface{}");
    }

    #[test]
    fn root_name_is_sanitized() {
        let r = reflect_json(&json!({}), "my-page", &ReflectOptions::default()).unwrap();
        assert_eq!(r.root.go_type(), "mypage");
    }
}
