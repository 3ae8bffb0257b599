//! Reflection over realistic data models.

use std::collections::HashMap;

use kiln_schema::{reflect, reflect_json, ReflectOptions, Schema, SchemaError};
use rstest::rstest;
use serde::Serialize;

#[derive(Serialize)]
struct Address {
    city: String,
    zip: u32,
}

#[derive(Serialize)]
struct School {
    name: String,
    address: Address,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Person {
    name: String,
    age: u8,
    primary: School,
    secondary: School,
    tags: Vec<String>,
    scores: HashMap<String, f64>,
}

fn person() -> Person {
    let school = |n: &str| School {
        name: n.into(),
        address: Address {
            city: "Springfield".into(),
            zip: 12345,
        },
    };
    Person {
        name: "Ann".into(),
        age: 9,
        primary: school("North"),
        secondary: school("South"),
        tags: vec!["a".into()],
        scores: HashMap::from([("math".into(), 9.5)]),
    }
}

#[test]
fn repeated_nested_type_is_declared_once() {
    let r = reflect(&person(), &ReflectOptions::default()).expect("reflect");
    let names: Vec<_> = r.declarations.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Address", "School", "Person"]);
    assert_eq!(r.root.go_type(), "Person");
}

#[test]
fn root_declaration_lists_fields_in_order() {
    let r = reflect(&person(), &ReflectOptions::default()).expect("reflect");
    let root = r.root_declaration().expect("root is a struct");
    assert_eq!(root.go_ident(), "Person");
    let lines: Vec<(String, String)> = root
        .go_fields()
        .into_iter()
        .map(|f| (f.ident, f.go_type))
        .collect();
    let expected = [
        ("Name", "string"),
        ("Age", "uint8"),
        ("Primary", "School"),
        ("Secondary", "School"),
        ("Tags", "[]string"),
        ("Scores", "map[string]float64"),
    ];
    assert_eq!(
        lines,
        expected.map(|(i, t)| (i.to_owned(), t.to_owned())).to_vec()
    );
    assert!(root.go_fields().iter().all(|f| f.tag.as_deref() == Some(f.ident.as_str())));
}

#[test]
fn dash_key_round_trips_through_its_tag() {
    let value = serde_json::json!({ "-": 1, "a": 2 });
    let r = reflect_json(&value, "Root", &ReflectOptions::default()).expect("reflect");
    let tags: Vec<_> = r.declarations[0].go_fields().into_iter().map(|f| f.tag).collect();
    assert_eq!(tags, vec![Some("-,".to_owned()), Some("a".to_owned())]);
}

#[derive(Serialize)]
struct Node {
    value: i32,
    next: Option<Box<Node>>,
}

#[test]
fn option_hides_recursion_until_observed() {
    let leaf = Node { value: 1, next: None };
    let r = reflect(&leaf, &ReflectOptions::default()).expect("leaf");
    assert_eq!(r.declarations.len(), 1);

    let chain = Node {
        value: 1,
        next: Some(Box::new(Node { value: 2, next: None })),
    };
    let err = reflect(&chain, &ReflectOptions::default()).expect_err("direct recursion");
    assert!(
        matches!(err, SchemaError::SelfReferential { ref name } if name == "Node"),
        "got: {err}"
    );
}

#[derive(Serialize)]
struct Tree {
    label: &'static str,
    children: Vec<Tree>,
}

#[test]
fn recursion_through_vec_is_accepted() {
    let tree = Tree {
        label: "root",
        children: vec![Tree { label: "leaf", children: vec![] }],
    };
    let r = reflect(&tree, &ReflectOptions::default()).expect("tree");
    assert_eq!(r.declarations.len(), 1);
    let children = &r.declarations[0].go_fields()[1];
    assert_eq!(children.ident, "Children");
    assert_eq!(children.go_type, "[]Tree");
}

#[rstest]
#[case(serde_json::json!(true), "bool")]
#[case(serde_json::json!(-3), "int64")]
#[case(serde_json::json!(u64::MAX), "uint64")]
#[case(serde_json::json!(1.5), "float64")]
#[case(serde_json::json!(null), "interface{}")]
#[case(serde_json::json!(["a", "b"]), "[]string")]
#[case(serde_json::json!([[1], [2, 3]]), "[][]int64")]
fn json_scalars_and_arrays(#[case] value: serde_json::Value, #[case] expected: &str) {
    let r = reflect_json(&value, "Root", &ReflectOptions::default()).expect("reflect");
    assert_eq!(r.root.go_type(), expected);
    assert!(r.declarations.is_empty());
}

#[test]
fn json_and_serde_agree_on_field_layout() {
    let value = serde_json::to_value(person()).expect("to_value");
    let r = reflect_json(&value, "Root", &ReflectOptions::default()).expect("reflect");
    let root = r.root_declaration().expect("object root");
    assert_eq!(root.name, "Root");
    assert_eq!(root.go_field_names().len(), 6);
    assert!(matches!(r.root, Schema::Struct { .. }));
}
