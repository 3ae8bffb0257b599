//! Directive splitter: partitions one template line into text and
//! expression segments.

use regex::Regex;

use crate::error::ParseError;
use crate::types::Segment;

/// Shortest bracketed span: `{i fmt}`, `{= x}`, `{% if a %}`.
pub const DIRECTIVE_PATTERN: &str = r"\{.*?\}";

/// Splits lines on [`DIRECTIVE_PATTERN`] matches.
#[derive(Debug, Clone)]
pub struct Splitter {
    pattern: Regex,
}

impl Splitter {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Splitter {
            pattern: Regex::new(DIRECTIVE_PATTERN)?,
        })
    }

    /// Split `line` into alternating text and expression segments.
    ///
    /// With no match the whole line is one [`Segment::Text`]. Otherwise the
    /// result always starts and ends with a text segment, and every pair of
    /// expressions has the (possibly empty) text between them.
    ///
    /// `line_no` is only used for error reporting.
    pub fn split<'a>(&self, line_no: usize, line: &'a str) -> Result<Vec<Segment<'a>>, ParseError> {
        let mut segments = Vec::new();
        let mut prev_end = 0;
        for m in self.pattern.find_iter(line) {
            if m.start() < prev_end || m.end() < m.start() {
                return Err(ParseError::AmbiguousMatch {
                    start: m.start(),
                    end: m.end(),
                    line_no,
                    line: line.to_owned(),
                });
            }
            segments.push(Segment::Text(&line[prev_end..m.start()]));
            segments.push(Segment::Expression {
                raw: m.as_str(),
                start: m.start(),
            });
            prev_end = m.end();
        }
        segments.push(Segment::Text(&line[prev_end..]));
        Ok(segments)
    }
}
