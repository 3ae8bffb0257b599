//! Code generator: accumulates translated directives into a Go program body.
//!
//! The body is an append-only list of [`Op`]s. It is turned into Go source by
//! [`Generator::emit_go`]. Statements are emitted against a `strings.Builder`
//! named [`BUILDER_IDENT`], which the harness declares.

use std::fmt::Write as _;

use crate::imports::ImportSet;
use crate::types::Directive;

/// Name of the output accumulator inside the generated `main`.
pub const BUILDER_IDENT: &str = "builder";

/// One operation of the intermediate program body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Write a literal string.
    Literal(String),
    /// Write the `%v` formatting of a Go expression.
    Interpolate(String),
    /// `header {`
    Open(String),
    /// `} header {`
    Reopen(String),
    /// `}`
    Close,
    /// A raw statement, inserted unmodified.
    Statement(String),
}

/// Generator state: the body plus the packages raw code asked for.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    body: Vec<Op>,
    imports: ImportSet,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the operation for `directive`. Imports go to the import set.
    pub fn apply(&mut self, directive: Directive) {
        let op = match directive {
            Directive::Import(names) => {
                self.imports.add_all(names);
                return;
            }
            Directive::Literal(text) => Op::Literal(text),
            Directive::Read(expr) => Op::Interpolate(expr),
            Directive::Open(header) => Op::Open(header),
            Directive::Else(header) => Op::Reopen(header),
            Directive::End => Op::Close,
            Directive::Define(stmt) | Directive::RawCode(stmt) => Op::Statement(stmt),
        };
        self.body.push(op);
    }

    pub fn body(&self) -> &[Op] {
        &self.body
    }

    pub fn imports(&self) -> &ImportSet {
        &self.imports
    }

    /// Write the body as Go statements, one per line.
    pub fn emit_go(&self, out: &mut String) {
        for op in &self.body {
            match op {
                Op::Literal(text) => {
                    let _ = writeln!(
                        out,
                        "{BUILDER_IDENT}.WriteString({})",
                        go_string_literal(text)
                    );
                }
                Op::Interpolate(expr) => {
                    let _ = writeln!(
                        out,
                        "{BUILDER_IDENT}.WriteString(fmt.Sprintf(\"%v\", {expr}))"
                    );
                }
                Op::Open(header) => {
                    let _ = writeln!(out, "{header} {{");
                    for ident in loop_bindings(header) {
                        let _ = writeln!(out, "_ = {ident}");
                    }
                }
                Op::Reopen(header) => {
                    let _ = writeln!(out, "}} {header} {{");
                }
                Op::Close => out.push_str("}\n"),
                Op::Statement(stmt) => {
                    out.push_str(stmt);
                    out.push('\n');
                }
            }
        }
    }
}

/// Variables declared by a `for ... := range` header.
///
/// Go rejects unused loop variables, and templates often bind an index they
/// never print.
fn loop_bindings(header: &str) -> Vec<&str> {
    let Some(rest) = header.strip_prefix("for") else {
        return Vec::new();
    };
    if !rest.starts_with(char::is_whitespace) || rest.contains(';') {
        return Vec::new();
    }
    let Some((lhs, _)) = rest.split_once(":=") else {
        return Vec::new();
    };
    lhs.split(',')
        .map(str::trim)
        .filter(|ident| *ident != "_" && is_go_ident(ident))
        .collect()
}

fn is_go_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Quote `s` as an interpreted Go string literal.
///
/// Non-ASCII characters pass through as UTF-8, which Go source accepts.
pub fn go_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_quoting_escapes_specials() {
        assert_eq!(go_string_literal("a\"b"), r#""a\"b""#);
        assert_eq!(go_string_literal("back`tick"), "\"back`tick\"");
        assert_eq!(go_string_literal("x\\y\n"), r#""x\\y\n""#);
        assert_eq!(go_string_literal("\u{1}"), r#""\x01""#);
        assert_eq!(go_string_literal("小学"), "\"小学\"");
    }

    #[test]
    fn imports_do_not_reach_body() {
        let mut generator = Generator::new();
        generator.apply(Directive::Import(vec!["fmt".into(), "os".into()]));
        assert!(generator.body().is_empty());
        assert_eq!(generator.imports().list(), &["fmt", "os"]);
    }

    #[test]
    fn range_variables_are_marked_used() {
        assert_eq!(loop_bindings("for i, v := range Items"), vec!["i", "v"]);
        assert_eq!(loop_bindings("for _, v := range Items"), vec!["v"]);
        assert!(loop_bindings("for i := 0; i < 3; i++").is_empty());
        assert!(loop_bindings("for n > 0").is_empty());
        assert!(loop_bindings("if x := f(); x").is_empty());

        let mut generator = Generator::new();
        generator.apply(Directive::Open("for i, v := range Items".into()));
        generator.apply(Directive::End);
        let mut out = String::new();
        generator.emit_go(&mut out);
        assert_eq!(out, "for i, v := range Items {\n_ = i\n_ = v\n}\n");
    }

    #[test]
    fn emit_go_renders_each_op() {
        let mut generator = Generator::new();
        generator.apply(Directive::Open("if a > 1".into()));
        generator.apply(Directive::Literal("<b>".into()));
        generator.apply(Directive::Else("else".into()));
        generator.apply(Directive::Read("a".into()));
        generator.apply(Directive::End);
        generator.apply(Directive::Define("x := 2".into()));

        let mut out = String::new();
        generator.emit_go(&mut out);
        assert_eq!(
            out,
            "if a > 1 {\n\
             builder.WriteString(\"<b>\")\n\
             } else {\n\
             builder.WriteString(fmt.Sprintf(\"%v\", a))\n\
             }\n\
             x := 2\n"
        );
    }
}
