//! # kiln-renderer
//!
//! Turns a compiled template plus an input value into rendered text by
//! generating a Go program, running it, and cleaning up after it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kiln_renderer::{Renderer, RenderOptions};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Page {
//!     #[serde(rename = "Name")]
//!     name: String,
//! }
//!
//! fn greet() -> Result<String, kiln_renderer::RenderError> {
//!     let renderer = Renderer::new(RenderOptions::default())?;
//!     let template = renderer.parse_str("greet.html", "<p>{=Name}</p>")?;
//!     renderer.render(&template, &Page { name: "Ann".into() })
//! }
//! ```

pub mod engine;
pub mod error;
pub mod program;
pub mod toolchain;

pub use engine::{CompiledTemplate, RenderOptions, Renderer, DEFAULT_JSON_ROOT};
pub use error::RenderError;
pub use program::{ProgramTemplate, BASELINE_IMPORTS};
pub use toolchain::{Execution, GoToolchain, Toolchain};
