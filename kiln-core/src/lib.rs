//! Kiln core library: template loading, directive parsing, code generation.
//!
//! - [`types`]: [`Template`], [`Segment`], [`Directive`]
//! - [`splitter`]: line → segments
//! - [`parser`]: segments → directives, with cross-line raw-code state
//! - [`codegen`]: directives → Go program body
//! - [`imports`]: [`ImportSet`]
//! - [`error`]: [`ParseError`]

pub mod codegen;
pub mod error;
pub mod imports;
pub mod parser;
pub mod splitter;
pub mod types;

pub use codegen::{go_string_literal, Generator, Op};
pub use error::ParseError;
pub use imports::ImportSet;
pub use parser::{parse, ParseOptions, Parser, Whitespace};
pub use splitter::Splitter;
pub use types::{Directive, Segment, Template};
