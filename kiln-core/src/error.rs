//! Error types for kiln-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or parsing a template.
///
/// Parse-time variants carry the 1-based line number and the offending raw
/// line so callers can point at the exact spot in the template.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The template path does not exist.
    #[error("template not found at {path}")]
    TemplateNotFound { path: PathBuf },

    /// Underlying I/O failure while reading the template.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bracketed expression matched none of the recognised directive forms.
    #[error("malformed directive: {message} (line {line_no}: {line})")]
    MalformedDirective {
        message: String,
        line_no: usize,
        line: String,
    },

    /// The directive matcher reported overlapping or inverted spans.
    #[error("inconsistent directive match at {start}..{end} (line {line_no}: {line})")]
    AmbiguousMatch {
        start: usize,
        end: usize,
        line_no: usize,
        line: String,
    },

    /// `else`/`end` without an open block, or a block never closed.
    #[error("unbalanced block: {message} (line {line_no}: {line})")]
    UnbalancedBlock {
        message: String,
        line_no: usize,
        line: String,
    },

    /// A `{%` raw-code region was still open at end of input.
    #[error("raw code region opened at line {line_no} is never closed: {line}")]
    UnterminatedRawBlock { line_no: usize, line: String },

    /// The directive pattern failed to compile.
    #[error("directive pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl ParseError {
    /// The offending template line, when the error is tied to one.
    pub fn line(&self) -> Option<&str> {
        match self {
            ParseError::MalformedDirective { line, .. }
            | ParseError::AmbiguousMatch { line, .. }
            | ParseError::UnbalancedBlock { line, .. }
            | ParseError::UnterminatedRawBlock { line, .. } => Some(line),
            _ => None,
        }
    }

    /// 1-based line number of the offending line, when known.
    pub fn line_no(&self) -> Option<usize> {
        match self {
            ParseError::MalformedDirective { line_no, .. }
            | ParseError::AmbiguousMatch { line_no, .. }
            | ParseError::UnbalancedBlock { line_no, .. }
            | ParseError::UnterminatedRawBlock { line_no, .. } => Some(*line_no),
            _ => None,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ParseError {
    ParseError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_directive_message_names_line() {
        let err = ParseError::MalformedDirective {
            message: "unknown directive `{@bad}`".to_string(),
            line_no: 3,
            line: "<p>{@bad}</p>".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"), "got: {msg}");
        assert!(msg.contains("<p>{@bad}</p>"), "got: {msg}");
        assert_eq!(err.line(), Some("<p>{@bad}</p>"));
        assert_eq!(err.line_no(), Some(3));
    }

    #[test]
    fn not_found_has_no_line() {
        let err = ParseError::TemplateNotFound {
            path: PathBuf::from("/nope.html"),
        };
        assert!(err.line().is_none());
        assert!(err.to_string().contains("/nope.html"));
    }
}
