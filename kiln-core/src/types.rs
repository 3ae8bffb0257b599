//! Domain types for kiln templates.
//!
//! A [`Template`] is loaded once and never mutated. [`Segment`]s borrow from
//! a single template line and do not outlive that line's processing.
//! [`Directive`] is the classified, owned form handed to the code generator.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ParseError};

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Template source: where it came from plus its raw lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    path: PathBuf,
    lines: Vec<String>,
}

impl Template {
    /// Read a template from disk.
    ///
    /// Returns [`ParseError::TemplateNotFound`] if `path` does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ParseError::TemplateNotFound {
                path: path.to_path_buf(),
            });
        }
        let source = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(Self::from_source(path, &source))
    }

    /// Build a template from in-memory text. `path` is only used for naming.
    pub fn from_source(path: impl Into<PathBuf>, source: &str) -> Self {
        Template {
            path: path.into(),
            lines: source.lines().map(str::to_owned).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Base name without extension (`views/index.html` → `index`).
    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("template")
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One piece of a template line: literal text or a bracketed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// A `{...}` span; `start` is its byte offset within the line.
    Expression { raw: &'a str, start: usize },
}

impl<'a> Segment<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Segment::Text(text) => text,
            Segment::Expression { raw, .. } => raw,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Segment::Expression { .. })
    }
}

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

/// Classified form of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `{i a,b}`: packages required by raw code.
    Import(Vec<String>),
    /// `{= expr}`: interpolate the formatted value of `expr`.
    Read(String),
    /// Raw statement introducing a binding (`x := 1`, `var y int`).
    Define(String),
    /// `if`/`for`/`switch` header opening a block.
    Open(String),
    /// `else` / `else if cond`: closes the current block and opens another.
    Else(String),
    /// `end`: closes the innermost block.
    End,
    /// Any other raw statement, passed through untouched.
    RawCode(String),
    /// Text emitted verbatim.
    Literal(String),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Import(names) => write!(f, "import {}", names.join(",")),
            Directive::Read(expr) => write!(f, "read {expr}"),
            Directive::Define(stmt) => write!(f, "define {stmt}"),
            Directive::Open(header) => write!(f, "open {header}"),
            Directive::Else(header) => write!(f, "else {header}"),
            Directive::End => write!(f, "end"),
            Directive::RawCode(stmt) => write!(f, "raw {stmt}"),
            Directive::Literal(text) => write!(f, "literal {text:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_name_strips_extension() {
        let tpl = Template::from_source("views/index.html", "<p></p>");
        assert_eq!(tpl.name(), "index");
    }

    #[test]
    fn template_name_falls_back() {
        let tpl = Template::from_source("", "x");
        assert_eq!(tpl.name(), "template");
    }

    #[test]
    fn from_source_splits_lines() {
        let tpl = Template::from_source("a.html", "one\r\ntwo\nthree");
        assert_eq!(tpl.lines(), &["one", "two", "three"]);
    }

    #[test]
    fn segment_text_and_kind() {
        let seg = Segment::Expression { raw: "{=x}", start: 4 };
        assert_eq!(seg.text(), "{=x}");
        assert!(seg.is_expression());
        assert!(!Segment::Text("hi").is_expression());
    }

    #[test]
    fn directive_display() {
        assert_eq!(
            Directive::Import(vec!["fmt".into(), "strings".into()]).to_string(),
            "import fmt,strings"
        );
        assert_eq!(Directive::End.to_string(), "end");
    }
}
