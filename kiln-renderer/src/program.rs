//! Assembly of the complete Go program.
//!
//! The layout lives in `templates/program.go.tera`, embedded at compile time:
//!
//! ```text
//! package main
//! import ( baseline + template imports )
//! type ... struct { ... }           // from the reflected input
//! const payload = "<json>"
//! func main() {
//!     decode payload into `data`, bind root fields as locals
//!     var builder strings.Builder
//!     <template body>
//!     fmt.Print(builder.String())
//! }
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::Value;
use tera::Tera;

use kiln_core::{codegen::BUILDER_IDENT, go_string_literal, Generator};
use kiln_schema::{Declaration, GoField, Reflection};

use crate::error::RenderError;

/// Packages the program itself needs, whatever the template imports.
pub const BASELINE_IMPORTS: &[&str] = &["encoding/json", "fmt", "os", "strings"];

/// Variable holding the decoded input inside `main`.
pub const DATA_IDENT: &str = "data";

/// Exit code of the generated program when the payload fails to decode.
pub const DECODE_FAILURE_EXIT: i32 = 2;

const PROGRAM: &str = "program.go.tera";

const TPLS: &[(&str, &str)] = &[(PROGRAM, include_str!("templates/program.go.tera"))];

/// Baseline imports merged with the template's, sorted and deduplicated.
pub fn merged_imports(generator: &Generator) -> Vec<String> {
    let mut all: BTreeSet<String> = BASELINE_IMPORTS.iter().map(|s| (*s).to_owned()).collect();
    all.extend(generator.imports().list().iter().cloned());
    all.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything the program template reads.
#[derive(Debug, Serialize)]
struct ProgramContext<'a> {
    imports: Vec<String>,
    declarations: Vec<DeclarationContext>,
    payload: &'a str,
    data: &'static str,
    root_type: String,
    decode_failure_exit: i32,
    bindings: Vec<String>,
    builder: &'static str,
    body: String,
}

#[derive(Debug, Serialize)]
struct DeclarationContext {
    ident: String,
    fields: Vec<GoField>,
}

impl From<&Declaration> for DeclarationContext {
    fn from(decl: &Declaration) -> Self {
        DeclarationContext {
            ident: decl.go_ident(),
            fields: decl.go_fields(),
        }
    }
}

impl<'a> ProgramContext<'a> {
    fn new(generator: &Generator, reflection: &Reflection, payload: &'a str) -> Self {
        let bindings = reflection
            .root_declaration()
            .map(Declaration::go_field_names)
            .unwrap_or_default();
        // Body lines are not indented: raw statements may hold multi-line
        // string literals.
        let mut body = String::new();
        generator.emit_go(&mut body);
        ProgramContext {
            imports: merged_imports(generator),
            declarations: reflection.declarations.iter().map(Into::into).collect(),
            payload,
            data: DATA_IDENT,
            root_type: reflection.root.go_type(),
            decode_failure_exit: DECODE_FAILURE_EXIT,
            bindings,
            builder: BUILDER_IDENT,
            body,
        }
    }

    fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

// ---------------------------------------------------------------------------
// ProgramTemplate
// ---------------------------------------------------------------------------

/// The embedded program layout. Create once and reuse.
pub struct ProgramTemplate {
    tera: Tera,
}

impl ProgramTemplate {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.register_filter("go_string", go_string_filter);
        tera.add_raw_templates(TPLS.iter().copied())?;
        Ok(ProgramTemplate { tera })
    }

    /// Build the Go source for one render.
    ///
    /// `payload` must be the JSON encoding of the value `reflection` was
    /// derived from.
    pub fn render(
        &self,
        generator: &Generator,
        reflection: &Reflection,
        payload: &str,
    ) -> Result<String, RenderError> {
        let ctx = ProgramContext::new(generator, reflection, payload).to_tera_context()?;
        Ok(self.tera.render(PROGRAM, &ctx)?)
    }
}

/// `{{ s | go_string }}`: `s` as an interpreted Go string literal.
fn go_string_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg(format!("go_string expects a string, got {value}")))?;
    Ok(Value::String(go_string_literal(text)))
}

#[cfg(test)]
mod tests {
    use kiln_core::{parse, Template};
    use kiln_schema::{reflect_json, ReflectOptions};
    use serde_json::json;

    use super::*;

    fn program(source: &str, data: Value) -> String {
        let generator = parse(&Template::from_source("t.html", source)).unwrap();
        let reflection = reflect_json(&data, "Root", &ReflectOptions::default()).unwrap();
        ProgramTemplate::new()
            .unwrap()
            .render(&generator, &reflection, &data.to_string())
            .unwrap()
    }

    #[test]
    fn template_imports_merge_with_baseline() {
        let generator = parse(&Template::from_source("t.html", "{i fmt, strconv}")).unwrap();
        assert_eq!(
            merged_imports(&generator),
            vec!["encoding/json", "fmt", "os", "strconv", "strings"]
        );
    }

    #[test]
    fn header_lists_every_import() {
        let go = program("{i net/url}x", json!("x"));
        assert!(
            go.starts_with(
                "package main\n\nimport (\n\t\"encoding/json\"\n\t\"fmt\"\n\t\"net/url\"\n\
                 \t\"os\"\n\t\"strings\"\n)\n\nconst payload = "
            ),
            "{go}"
        );
    }

    #[test]
    fn root_fields_become_locals() {
        let go = program("<p>{=Name}</p>", json!({ "Name": "Ann" }));
        assert!(go.contains("type Root struct {\n\tName string `json:\"Name\"`\n}\n\n"), "{go}");
        assert!(go.contains("\tvar data Root\n"), "{go}");
        assert!(go.contains("\t\tos.Exit(2)\n\t}\n\tName := data.Name\n\t_ = Name\n"), "{go}");
        assert!(go.contains("builder.WriteString(fmt.Sprintf(\"%v\", Name))"), "{go}");
        assert!(go.trim_end().ends_with("\tfmt.Print(builder.String())\n}"), "{go}");
    }

    #[test]
    fn declarations_come_dependencies_first() {
        let go = program("x", json!({ "School": { "City": "Oslo" }, "Odd": { "a,b": 1 } }));
        let school = go.find("type RootSchool struct").expect("school declared");
        let root = go.find("type Root struct").expect("root declared");
        assert!(school < root, "{go}");
        assert!(go.contains("type RootOdd struct {\n\tAB int64\n}\n\n"), "{go}");
        assert!(go.contains("\tSchool RootSchool `json:\"School\"`\n"), "{go}");
    }

    #[test]
    fn dash_key_is_tagged_so_it_decodes() {
        let go = program("x", json!({ "-": true }));
        assert!(go.contains("\tX bool `json:\"-,\"`\n"), "{go}");
    }

    #[test]
    fn payload_is_an_escaped_literal() {
        let go = program("x", json!({ "q": "a`b\"c" }));
        assert!(go.contains(r#"const payload = "{\"q\":\"a`b\\\"c\"}""#), "{go}");
    }

    #[test]
    fn non_struct_root_has_no_bindings() {
        let go = program("{% for _, v := range data %}{=v}{% end %}", json!(["a", "b"]));
        assert!(go.contains("\tvar data []string\n"), "{go}");
        assert!(!go.contains("type "), "{go}");
        assert!(!go.contains(":= data."), "{go}");
    }

    #[test]
    fn go_string_filter_rejects_non_strings() {
        let err = go_string_filter(&json!(3), &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("go_string"), "{err}");
    }
}
