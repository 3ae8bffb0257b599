//! Directive classifier and line-by-line translator.
//!
//! # Directive syntax
//!
//! | Form            | Meaning                                              |
//! |-----------------|------------------------------------------------------|
//! | `{i a,b}`       | import Go packages `a` and `b`                       |
//! | `{= expr}`      | write the `%v` formatting of `expr`                  |
//! | `{% stmt %}`    | raw Go; `if`/`for`/`switch` open, `else` reopens, `end` closes |
//! | other `{...}`   | [`ParseError::MalformedDirective`]                   |
//! | plain text      | written verbatim                                     |
//!
//! A raw region may span lines: a segment starting with `{%` opens it and the
//! first segment ending with `%}` closes it. Inside the region, segments of
//! the same line are joined back together and translated as one statement.

use tracing::debug;

use crate::codegen::Generator;
use crate::error::ParseError;
use crate::splitter::Splitter;
use crate::types::{Directive, Segment, Template};

const RAW_OPEN: &str = "{%";
const RAW_CLOSE: &str = "%}";
const IMPORT_PREFIX: &str = "{i";
const READ_PREFIX: &str = "{=";
const BLOCK_KEYWORDS: &[&str] = &["if", "for", "switch", "select"];
const END_KEYWORD: &str = "end";
const ELSE_KEYWORD: &str = "else";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How literal whitespace is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Whitespace {
    /// Trim every line, skip blank lines, no line separators.
    #[default]
    Compact,
    /// Keep lines as written, including empty text segments, and end each
    /// line outside a raw region with `\n`.
    Verbatim,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub whitespace: Whitespace,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Parser {
    splitter: Splitter,
    options: ParseOptions,
}

impl Parser {
    pub fn new(options: ParseOptions) -> Result<Self, ParseError> {
        Ok(Parser {
            splitter: Splitter::new()?,
            options,
        })
    }

    /// Translate `template` into a [`Generator`] body.
    ///
    /// Any parse error aborts the whole template.
    pub fn parse(&self, template: &Template) -> Result<Generator, ParseError> {
        let mut scan = Scan::new(self.options.whitespace);
        for (idx, raw_line) in template.lines().iter().enumerate() {
            let line_no = idx + 1;
            let line = match self.options.whitespace {
                Whitespace::Compact => {
                    let trimmed = raw_line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    trimmed
                }
                Whitespace::Verbatim => raw_line.as_str(),
            };
            let segments = self.splitter.split(line_no, line)?;
            scan.line(line_no, line, &segments)?;
        }
        scan.finish()
    }
}

/// Parse with default options.
pub fn parse(template: &Template) -> Result<Generator, ParseError> {
    Parser::new(ParseOptions::default())?.parse(template)
}

// ---------------------------------------------------------------------------
// Scan state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawState {
    Idle,
    /// Inside `{% ... %}`; holds the line where the region opened.
    InRawBlock { opened_at: usize },
}

struct Scan {
    whitespace: Whitespace,
    state: RawState,
    /// Raw code gathered from the current line while a region is open.
    pending: String,
    /// Line numbers and text of currently open blocks, innermost last.
    blocks: Vec<(usize, String)>,
    /// Text of the line that opened the current raw region.
    raw_opened_line: String,
    generator: Generator,
}

impl Scan {
    fn new(whitespace: Whitespace) -> Self {
        Scan {
            whitespace,
            state: RawState::Idle,
            pending: String::new(),
            blocks: Vec::new(),
            raw_opened_line: String::new(),
            generator: Generator::new(),
        }
    }

    fn line(
        &mut self,
        line_no: usize,
        line: &str,
        segments: &[Segment<'_>],
    ) -> Result<(), ParseError> {
        for segment in segments {
            match self.state {
                RawState::Idle => {
                    let text = segment.text();
                    if let Some(rest) = text.trim_start().strip_prefix(RAW_OPEN) {
                        self.state = RawState::InRawBlock { opened_at: line_no };
                        self.raw_opened_line = line.to_owned();
                        self.raw(line_no, line, rest)?;
                    } else if let Some(directive) = self.classify(line_no, line, segment)? {
                        self.apply(line_no, line, directive)?;
                    }
                }
                RawState::InRawBlock { .. } => self.raw(line_no, line, segment.text())?,
            }
        }

        if matches!(self.state, RawState::InRawBlock { .. }) {
            self.flush(line_no, line)?;
        } else if self.whitespace == Whitespace::Verbatim {
            self.generator.apply(Directive::Literal("\n".to_owned()));
        }
        Ok(())
    }

    /// Feed raw-region text; closes the region on a trailing `%}`.
    fn raw(&mut self, line_no: usize, line: &str, text: &str) -> Result<(), ParseError> {
        match text.trim_end().strip_suffix(RAW_CLOSE) {
            Some(code) => {
                self.pending.push_str(code);
                self.flush(line_no, line)?;
                self.state = RawState::Idle;
            }
            None => self.pending.push_str(text),
        }
        Ok(())
    }

    fn flush(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let code = std::mem::take(&mut self.pending);
        if let Some(directive) = translate_raw(&code) {
            self.apply(line_no, line, directive)?;
        }
        Ok(())
    }

    /// Classify a segment outside any raw region.
    fn classify(
        &self,
        line_no: usize,
        line: &str,
        segment: &Segment<'_>,
    ) -> Result<Option<Directive>, ParseError> {
        let text = segment.text();
        if !segment.is_expression() {
            if text.is_empty() && self.whitespace == Whitespace::Compact {
                return Ok(None);
            }
            return Ok(Some(Directive::Literal(text.to_owned())));
        }

        let expr = text.trim();
        let inner = expr.strip_suffix('}').unwrap_or(expr);
        let malformed = |message: String| ParseError::MalformedDirective {
            message,
            line_no,
            line: line.to_owned(),
        };

        if let Some(rest) = inner.strip_prefix(IMPORT_PREFIX) {
            if rest.starts_with(char::is_whitespace) {
                let names: Vec<String> = rest
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned)
                    .collect();
                if names.is_empty() {
                    return Err(malformed(format!("import directive `{expr}` names no package")));
                }
                if let Some(bad) = names.iter().find(|n| !is_import_path(n)) {
                    return Err(malformed(format!("import `{bad}` is not a bare package path")));
                }
                return Ok(Some(Directive::Import(names)));
            }
        }
        if let Some(rest) = inner.strip_prefix(READ_PREFIX) {
            let rest = rest.trim();
            if rest.is_empty() {
                return Err(malformed(format!("interpolation `{expr}` has no expression")));
            }
            return Ok(Some(Directive::Read(rest.to_owned())));
        }
        Err(malformed(format!("unrecognised directive `{expr}`")))
    }

    fn apply(
        &mut self,
        line_no: usize,
        line: &str,
        directive: Directive,
    ) -> Result<(), ParseError> {
        let unbalanced = |message: &str| ParseError::UnbalancedBlock {
            message: message.to_owned(),
            line_no,
            line: line.to_owned(),
        };
        match &directive {
            Directive::Open(_) => self.blocks.push((line_no, line.to_owned())),
            Directive::Else(_) if self.blocks.is_empty() => {
                return Err(unbalanced("`else` without an open block"));
            }
            Directive::End if self.blocks.pop().is_none() => {
                return Err(unbalanced("`end` without an open block"));
            }
            _ => {}
        }
        debug!(line_no, %directive, "directive");
        self.generator.apply(directive);
        Ok(())
    }

    fn finish(self) -> Result<Generator, ParseError> {
        if let RawState::InRawBlock { opened_at } = self.state {
            return Err(ParseError::UnterminatedRawBlock {
                line_no: opened_at,
                line: self.raw_opened_line,
            });
        }
        if let Some((line_no, line)) = self.blocks.last() {
            return Err(ParseError::UnbalancedBlock {
                message: format!("{} block(s) never closed with `end`", self.blocks.len()),
                line_no: *line_no,
                line: line.clone(),
            });
        }
        Ok(self.generator)
    }
}

// ---------------------------------------------------------------------------
// Raw code translation
// ---------------------------------------------------------------------------

/// Translate one raw statement. Blank code yields nothing.
fn translate_raw(code: &str) -> Option<Directive> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    if code == END_KEYWORD {
        return Some(Directive::End);
    }
    if starts_with_keyword(code, ELSE_KEYWORD) {
        return Some(Directive::Else(block_header(code)));
    }
    if BLOCK_KEYWORDS.iter().any(|kw| starts_with_keyword(code, kw)) {
        return Some(Directive::Open(block_header(code)));
    }
    if starts_with_keyword(code, "var")
        || starts_with_keyword(code, "const")
        || code.contains(":=")
    {
        return Some(Directive::Define(code.to_owned()));
    }
    Some(Directive::RawCode(code.to_owned()))
}

/// `true` if `code` is `keyword` alone or followed by whitespace / `(` / `{`.
fn starts_with_keyword(code: &str, keyword: &str) -> bool {
    code.strip_prefix(keyword).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '(' || c == '{')
    })
}

/// A package path, optionally quoted. Aliases are not supported.
fn is_import_path(name: &str) -> bool {
    let bare = name.strip_prefix('"').and_then(|n| n.strip_suffix('"')).unwrap_or(name);
    !bare.is_empty() && !bare.contains(|c: char| c.is_whitespace() || c == '"' || c == '`')
}

/// Drop a trailing `{` the author may have written out of habit.
fn block_header(code: &str) -> String {
    code.strip_suffix('{').unwrap_or(code).trim_end().to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Op;

    fn body(source: &str) -> Vec<Op> {
        let tpl = Template::from_source("t.html", source);
        parse(&tpl).expect("parse").body().to_vec()
    }

    fn verbatim(source: &str) -> Vec<Op> {
        let tpl = Template::from_source("t.html", source);
        Parser::new(ParseOptions { whitespace: Whitespace::Verbatim })
            .unwrap()
            .parse(&tpl)
            .expect("parse")
            .body()
            .to_vec()
    }

    #[test]
    fn plain_lines_become_literals() {
        assert_eq!(
            body("  <html>\n\n  <body>  "),
            vec![Op::Literal("<html>".into()), Op::Literal("<body>".into())]
        );
    }

    #[test]
    fn read_directive_interpolates() {
        assert_eq!(
            body("<p>{=Name}</p>"),
            vec![
                Op::Literal("<p>".into()),
                Op::Interpolate("Name".into()),
                Op::Literal("</p>".into()),
            ]
        );
    }

    #[test]
    fn import_feeds_import_set() {
        let tpl = Template::from_source("t.html", "{i strings, net/http}<a>");
        let generator = parse(&tpl).unwrap();
        assert_eq!(generator.imports().list(), &["net/http", "strings"]);
        assert_eq!(generator.body(), &[Op::Literal("<a>".into())]);
    }

    #[test]
    fn control_block_on_one_line() {
        assert_eq!(
            body("{i fmt}{% for i, v := range Items %}{=v}{% end %}"),
            vec![
                Op::Open("for i, v := range Items".into()),
                Op::Interpolate("v".into()),
                Op::Close,
            ]
        );
    }

    #[test]
    fn if_else_chain() {
        let ops = body("{% if A %}\nyes\n{% else if B %}\nmaybe\n{% else %}\nno\n{% end %}");
        assert_eq!(
            ops,
            vec![
                Op::Open("if A".into()),
                Op::Literal("yes".into()),
                Op::Reopen("else if B".into()),
                Op::Literal("maybe".into()),
                Op::Reopen("else".into()),
                Op::Literal("no".into()),
                Op::Close,
            ]
        );
    }

    #[test]
    fn multi_line_raw_region() {
        let ops = body("{%\ntotal := 0\nfor _, n := range Nums\ntotal += n\nend\n%}\n{=total}");
        assert_eq!(
            ops,
            vec![
                Op::Statement("total := 0".into()),
                Op::Open("for _, n := range Nums".into()),
                Op::Statement("total += n".into()),
                Op::Close,
                Op::Interpolate("total".into()),
            ]
        );
    }

    #[test]
    fn raw_segments_on_one_line_are_rejoined() {
        assert_eq!(
            body("{% m := map[string]int{} %}"),
            vec![Op::Statement("m := map[string]int{}".into())]
        );
    }

    #[test]
    fn trailing_brace_in_header_is_dropped() {
        assert_eq!(
            body("{% if ok { %}x{% end %}"),
            vec![Op::Open("if ok".into()), Op::Literal("x".into()), Op::Close]
        );
    }

    #[test]
    fn keyword_prefix_is_not_a_block() {
        assert_eq!(
            body("{% iffy := 1 %}"),
            vec![Op::Statement("iffy := 1".into())]
        );
    }

    #[test]
    fn malformed_directive_reports_line() {
        let tpl = Template::from_source("t.html", "<ok>\n<p>{@bad}</p>");
        let err = parse(&tpl).unwrap_err();
        assert!(matches!(err, ParseError::MalformedDirective { line_no: 2, .. }), "got: {err}");
        assert_eq!(err.line(), Some("<p>{@bad}</p>"));
    }

    #[test]
    fn import_needs_separator() {
        let tpl = Template::from_source("t.html", "{iffy}");
        assert!(matches!(parse(&tpl), Err(ParseError::MalformedDirective { .. })));
    }

    #[test]
    fn aliased_import_is_malformed() {
        let tpl = Template::from_source("t.html", "<p>\n{i str \"strings\"}");
        let err = parse(&tpl).unwrap_err();
        assert!(matches!(err, ParseError::MalformedDirective { line_no: 2, .. }), "got: {err}");
        assert_eq!(err.line(), Some("{i str \"strings\"}"));
    }

    #[test]
    fn quoted_import_is_accepted() {
        let tpl = Template::from_source("t.html", "{i \"net/url\", fmt}");
        assert_eq!(parse(&tpl).unwrap().imports().list(), &["fmt", "net/url"]);
    }

    #[test]
    fn empty_read_is_malformed() {
        let tpl = Template::from_source("t.html", "{= }");
        assert!(matches!(parse(&tpl), Err(ParseError::MalformedDirective { .. })));
    }

    #[test]
    fn stray_open_brace_is_literal() {
        assert_eq!(body("a { b"), vec![Op::Literal("a { b".into())]);
    }

    #[test]
    fn end_without_open_is_unbalanced() {
        let tpl = Template::from_source("t.html", "x\n{% end %}");
        let err = parse(&tpl).unwrap_err();
        assert!(matches!(err, ParseError::UnbalancedBlock { line_no: 2, .. }), "got: {err}");
    }

    #[test]
    fn else_without_open_is_unbalanced() {
        let tpl = Template::from_source("t.html", "{% else %}");
        assert!(matches!(parse(&tpl), Err(ParseError::UnbalancedBlock { .. })));
    }

    #[test]
    fn unclosed_block_points_at_opener() {
        let tpl = Template::from_source("t.html", "{% if A %}\n<b>");
        let err = parse(&tpl).unwrap_err();
        assert!(matches!(err, ParseError::UnbalancedBlock { line_no: 1, .. }), "got: {err}");
    }

    #[test]
    fn unterminated_raw_region() {
        let tpl = Template::from_source("t.html", "<a>\n{%\nx := 1");
        let err = parse(&tpl).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedRawBlock { line_no: 2, .. }), "got: {err}");
    }

    #[test]
    fn verbatim_keeps_whitespace_and_newlines() {
        assert_eq!(
            verbatim("  <p>{=x}</p>\n{% if a %}y{% end %}"),
            vec![
                Op::Literal("  <p>".into()),
                Op::Interpolate("x".into()),
                Op::Literal("</p>".into()),
                Op::Literal("\n".into()),
                Op::Literal("".into()),
                Op::Open("if a".into()),
                Op::Literal("y".into()),
                Op::Close,
                Op::Literal("".into()),
                Op::Literal("\n".into()),
            ]
        );
    }
}
