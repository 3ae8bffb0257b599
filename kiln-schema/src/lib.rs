//! Derives Go type declarations from Rust values so they can be decoded,
//! fully typed, inside a generated program.
//!
//! Two entry points:
//! - [`reflect`] walks any `Serialize` value; struct names come from serde.
//! - [`reflect_json`] walks a `serde_json::Value`; objects are named by path.

pub mod error;
pub mod json;
pub mod reflect;
pub mod schema;

pub use error::SchemaError;
pub use json::reflect_json;
pub use reflect::{reflect, ReflectOptions, DEFAULT_MAX_DEPTH};
pub use schema::{
    go_field_ident, go_json_tag, go_type_ident, Declaration, Field, GoField, PrimitiveKind,
    Reflection, Schema,
};
