//! Type schema model and the Go spelling of its declarations.
//!
//! A [`Schema`] describes the shape of one value. Struct schemas are also
//! recorded by name in a table while a value is walked; identical names are
//! merged field by field. Once the walk is done, the table is flattened into
//! [`Declaration`]s in dependency order (see [`Reflection`]).

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// PrimitiveKind
// ---------------------------------------------------------------------------

/// Scalar kinds, named after the Go type they decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    /// Integers wider than 64 bits.
    Number,
    /// Nothing observed yet (`null`, empty container). Unifies with anything.
    Unknown,
    /// Conflicting shapes observed. Absorbs everything.
    Any,
}

impl PrimitiveKind {
    pub fn go_name(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int8 => "int8",
            PrimitiveKind::Int16 => "int16",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::Uint8 => "uint8",
            PrimitiveKind::Uint16 => "uint16",
            PrimitiveKind::Uint32 => "uint32",
            PrimitiveKind::Uint64 => "uint64",
            PrimitiveKind::Float32 => "float32",
            PrimitiveKind::Float64 => "float64",
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "json.Number",
            PrimitiveKind::Unknown | PrimitiveKind::Any => "interface{}",
        }
    }

    fn is_integer(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Int8
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
                | PrimitiveKind::Uint8
                | PrimitiveKind::Uint16
                | PrimitiveKind::Uint32
                | PrimitiveKind::Uint64
        )
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Primitive(PrimitiveKind),
    Struct { name: String, fields: Vec<Field> },
    Slice(Box<Schema>),
    Array(usize, Box<Schema>),
    Map(Box<Schema>, Box<Schema>),
}

/// A struct member: its serialized key and its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub schema: Schema,
}

impl Field {
    pub fn new(key: impl Into<String>, schema: Schema) -> Self {
        Field {
            key: key.into(),
            schema,
        }
    }
}

impl Schema {
    pub const UNKNOWN: Schema = Schema::Primitive(PrimitiveKind::Unknown);
    pub const ANY: Schema = Schema::Primitive(PrimitiveKind::Any);

    /// Go type expression for this schema (`[]School`, `map[string][2]int32`).
    pub fn go_type(&self) -> String {
        match self {
            Schema::Primitive(kind) => kind.go_name().to_owned(),
            Schema::Struct { name, .. } => go_type_ident(name),
            Schema::Slice(elem) => format!("[]{}", elem.go_type()),
            Schema::Array(len, elem) => format!("[{len}]{}", elem.go_type()),
            Schema::Map(key, value) => format!("map[{}]{}", key.go_type(), value.go_type()),
        }
    }

    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Schema::Struct { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Merge two observations of the same position.
    ///
    /// `Unknown` yields to the other side, equal shapes merge recursively,
    /// and anything irreconcilable collapses to `Any`.
    pub fn unify(self, other: Schema) -> Schema {
        use PrimitiveKind::{Any, Unknown};
        match (self, other) {
            (Schema::Primitive(Unknown), other) | (other, Schema::Primitive(Unknown)) => other,
            (Schema::Primitive(Any), _) | (_, Schema::Primitive(Any)) => Schema::ANY,
            (Schema::Primitive(a), Schema::Primitive(b)) if a == b => Schema::Primitive(a),
            (
                Schema::Struct { name: a, fields: fa },
                Schema::Struct { name: b, fields: fb },
            ) if a == b => Schema::Struct {
                name: a,
                fields: merge_fields(fa, fb),
            },
            (Schema::Slice(a), Schema::Slice(b)) => Schema::Slice(Box::new(a.unify(*b))),
            (Schema::Array(n, a), Schema::Array(m, b)) if n == m => {
                Schema::Array(n, Box::new(a.unify(*b)))
            }
            (Schema::Array(_, a) | Schema::Slice(a), Schema::Array(_, b) | Schema::Slice(b)) => {
                Schema::Slice(Box::new(a.unify(*b)))
            }
            (Schema::Map(ka, va), Schema::Map(kb, vb)) => {
                Schema::Map(Box::new(ka.unify(*kb)), Box::new(va.unify(*vb)))
            }
            _ => Schema::ANY,
        }
    }

    /// Check that this schema can be a Go map key once JSON-encoded.
    pub(crate) fn into_map_key(self) -> Result<Schema, SchemaError> {
        match self {
            Schema::Primitive(PrimitiveKind::Unknown) => {
                Ok(Schema::Primitive(PrimitiveKind::String))
            }
            Schema::Primitive(kind) if kind == PrimitiveKind::String || kind.is_integer() => {
                Ok(Schema::Primitive(kind))
            }
            other => Err(SchemaError::UnsupportedMapKey {
                kind: other.go_type(),
            }),
        }
    }
}

fn merge_fields(mut left: Vec<Field>, right: Vec<Field>) -> Vec<Field> {
    for field in right {
        match left.iter_mut().find(|f| f.key == field.key) {
            Some(existing) => {
                let current = std::mem::replace(&mut existing.schema, Schema::UNKNOWN);
                existing.schema = current.unify(field.schema);
            }
            None => left.push(field),
        }
    }
    left
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One Go `type X struct { ... }` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Declaration {
    /// Go field identifiers, parallel to `fields`.
    ///
    /// Keys are turned into exported identifiers (`first_name` → `FirstName`);
    /// collisions get a numeric suffix.
    pub fn go_field_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .map(|field| {
                let base = go_field_ident(&field.key);
                let mut ident = base.clone();
                let mut n = 2;
                while !seen.insert(ident.clone()) {
                    ident = format!("{base}{n}");
                    n += 1;
                }
                ident
            })
            .collect()
    }

    /// Go identifier of the declared type.
    pub fn go_ident(&self) -> String {
        go_type_ident(&self.name)
    }

    /// Fields as they are spelled in the Go declaration.
    pub fn go_fields(&self) -> Vec<GoField> {
        self.go_field_names()
            .into_iter()
            .zip(&self.fields)
            .map(|(ident, field)| GoField {
                ident,
                go_type: field.schema.go_type(),
                tag: go_json_tag(&field.key),
            })
            .collect()
    }
}

/// One line of a Go struct declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoField {
    pub ident: String,
    pub go_type: String,
    /// Value of the `json:"..."` tag; `None` when the key cannot be spelled
    /// inside one.
    pub tag: Option<String>,
}

/// Result of reflecting one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub root: Schema,
    /// Struct declarations, each after every struct it references.
    pub declarations: Vec<Declaration>,
}

impl Reflection {
    /// Declaration of the root value, when the root is a struct.
    pub fn root_declaration(&self) -> Option<&Declaration> {
        let name = self.root.struct_name()?;
        self.declarations.iter().find(|d| d.name == name)
    }
}

// ---------------------------------------------------------------------------
// Struct table
// ---------------------------------------------------------------------------

/// Struct definitions seen during one walk, merged by name.
#[derive(Debug, Default)]
pub(crate) struct StructTable {
    defs: HashMap<String, Vec<Field>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl StructTable {
    pub(crate) fn record(&mut self, name: &str, fields: Vec<Field>) {
        match self.defs.remove(name) {
            Some(existing) => {
                debug!(name, "merging repeated struct");
                self.defs.insert(name.to_owned(), merge_fields(existing, fields));
            }
            None => {
                self.defs.insert(name.to_owned(), fields);
            }
        }
    }

    /// Order declarations dependency-first, starting from `root`.
    pub(crate) fn finish(self, root: Schema) -> Result<Reflection, SchemaError> {
        let mut walk = Walk {
            table: &self,
            marks: HashMap::new(),
            stack: Vec::new(),
            out: Vec::new(),
        };
        walk.visit(&root, false)?;
        let declarations = walk.out;
        Ok(Reflection { root, declarations })
    }
}

struct Walk<'t> {
    table: &'t StructTable,
    marks: HashMap<String, Mark>,
    /// Structs being visited, each with whether it was entered through a
    /// slice or map.
    stack: Vec<(String, bool)>,
    out: Vec<Declaration>,
}

impl Walk<'_> {
    fn visit(&mut self, schema: &Schema, indirect: bool) -> Result<(), SchemaError> {
        match schema {
            Schema::Primitive(_) => Ok(()),
            Schema::Slice(elem) => self.visit(elem, true),
            Schema::Map(key, value) => {
                self.visit(key, true)?;
                self.visit(value, true)
            }
            Schema::Array(_, elem) => self.visit(elem, indirect),
            Schema::Struct { name, fields } => self.visit_struct(name, fields, indirect),
        }
    }

    fn visit_struct(
        &mut self,
        name: &str,
        fields: &[Field],
        indirect: bool,
    ) -> Result<(), SchemaError> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.stack.iter().position(|(n, _)| n == name).unwrap_or(0);
                let broken = indirect || self.stack[start + 1..].iter().any(|(_, ind)| *ind);
                if broken {
                    return Ok(());
                }
                return Err(SchemaError::SelfReferential {
                    name: name.to_owned(),
                });
            }
            None => {}
        }

        let table = self.table;
        let fields = table.defs.get(name).map(Vec::as_slice).unwrap_or(fields);
        self.marks.insert(name.to_owned(), Mark::Visiting);
        self.stack.push((name.to_owned(), indirect));
        for field in fields {
            self.visit(&field.schema, false)?;
        }
        self.stack.pop();
        self.marks.insert(name.to_owned(), Mark::Done);
        self.out.push(Declaration {
            name: name.to_owned(),
            fields: fields.to_vec(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Exported Go identifier for a serialized key (`first_name` → `FirstName`).
pub fn go_field_ident(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = true;
    for c in key.chars() {
        if c.is_alphanumeric() {
            if upper_next {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    match out.chars().next() {
        Some(c) if c.is_uppercase() => out,
        _ => format!("X{out}"),
    }
}

/// Go type identifier for a struct name; non-identifier characters dropped.
pub fn go_type_ident(name: &str) -> String {
    let ident: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    match ident.chars().next() {
        Some(c) if !c.is_ascii_digit() => ident,
        _ => format!("T{ident}"),
    }
}

/// `json` struct tag value that maps a Go field to `key`.
///
/// A bare `-` tells encoding/json to skip the field, so the key `-` is
/// spelled `-,`.
pub fn go_json_tag(key: &str) -> Option<String> {
    if key == "-" {
        return Some("-,".to_owned());
    }
    let safe = !key.is_empty() && !key.contains(['"', '`', ',', '\\']);
    safe.then(|| key.to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
