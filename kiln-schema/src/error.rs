//! Error types for kiln-schema.

use std::fmt::Display;

use thiserror::Error;

/// All errors that can arise while deriving a type schema from a value.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Nesting went deeper than the configured limit; usually a cyclic value.
    #[error("value nesting exceeds {max_depth} levels (cyclic value?)")]
    DepthExceeded { max_depth: usize },

    /// A struct contains itself without a slice or map in between.
    #[error("struct `{name}` contains itself directly; wrap the recursive field in a sequence or map")]
    SelfReferential { name: String },

    /// Map keys must be strings or integers to survive the JSON round trip.
    #[error("unsupported map key type `{kind}`; keys must be strings or integers")]
    UnsupportedMapKey { kind: String },

    /// Error raised by the value's own `Serialize` impl.
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for SchemaError {
    fn custom<T: Display>(msg: T) -> Self {
        SchemaError::Custom(msg.to_string())
    }
}
