//! Render engine: [`RenderOptions`], [`CompiledTemplate`] and [`Renderer`].
//!
//! A render call owns everything it creates: the schema, the program text
//! and the temporary program file. The file is a [`NamedTempFile`], so it is
//! removed on every exit path unless [`RenderOptions::keep_artifact_on_failure`]
//! asks to keep it after a failed run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use kiln_core::{Generator, Op, ParseOptions, Parser, Template};
use kiln_schema::{reflect, reflect_json, ReflectOptions, Reflection};

use crate::error::{artifact_err, RenderError};
use crate::program::ProgramTemplate;
use crate::toolchain::{GoToolchain, Toolchain};

/// Root type name used when reflecting untyped JSON.
pub const DEFAULT_JSON_ROOT: &str = "Root";

// A trailing `_<word>` before `.go` can be read as a GOOS/GOARCH build
// constraint; this fixed suffix keeps the random part away from the end.
const ARTIFACT_SUFFIX: &str = "_render.go";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Where program files are written. `None` uses the system temp dir.
    pub artifact_dir: Option<PathBuf>,
    /// Toolchain binary.
    pub go_program: String,
    /// Arguments placed before the program path.
    pub go_args: Vec<String>,
    pub timeout: Option<Duration>,
    /// Keep the program file when the run fails and report its path.
    pub keep_artifact_on_failure: bool,
    pub parse: ParseOptions,
    pub reflect: ReflectOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            artifact_dir: None,
            go_program: "go".to_owned(),
            go_args: vec!["run".to_owned()],
            timeout: None,
            keep_artifact_on_failure: false,
            parse: ParseOptions::default(),
            reflect: ReflectOptions::default(),
        }
    }
}

impl RenderOptions {
    pub fn toolchain(&self) -> GoToolchain {
        GoToolchain::new(self.go_program.clone())
            .with_args(self.go_args.iter().cloned())
            .with_timeout(self.timeout)
    }
}

// ---------------------------------------------------------------------------
// CompiledTemplate
// ---------------------------------------------------------------------------

/// A parsed template, ready to be rendered any number of times.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    name: String,
    generator: Generator,
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &[Op] {
        self.generator.body()
    }

    pub fn imports(&self) -> &[String] {
        self.generator.imports().list()
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Compiles templates and renders them. Create once and reuse.
pub struct Renderer {
    options: RenderOptions,
    toolchain: Box<dyn Toolchain>,
    program: ProgramTemplate,
}

impl Renderer {
    /// Renderer running programs with the toolchain described by `options`.
    pub fn new(options: RenderOptions) -> Result<Self, RenderError> {
        let toolchain = options.toolchain();
        Renderer::with_toolchain(options, toolchain)
    }

    /// Renderer running programs with a caller-supplied toolchain.
    pub fn with_toolchain(
        options: RenderOptions,
        toolchain: impl Toolchain + 'static,
    ) -> Result<Self, RenderError> {
        Ok(Renderer {
            options,
            toolchain: Box::new(toolchain),
            program: ProgramTemplate::new()?,
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Load and parse a template file.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<CompiledTemplate, RenderError> {
        let template = Template::load(path.as_ref())?;
        self.compile(&template)
    }

    /// Parse template text; `path` is used for naming and diagnostics.
    pub fn parse_str(
        &self,
        path: impl Into<PathBuf>,
        source: &str,
    ) -> Result<CompiledTemplate, RenderError> {
        let template = Template::from_source(path, source);
        self.compile(&template)
    }

    fn compile(&self, template: &Template) -> Result<CompiledTemplate, RenderError> {
        let generator = Parser::new(self.options.parse.clone())?.parse(template)?;
        debug!(
            template = %template.path().display(),
            ops = generator.body().len(),
            imports = generator.imports().len(),
            "compiled template"
        );
        Ok(CompiledTemplate {
            name: template.name().to_owned(),
            generator,
        })
    }

    /// Render with a typed value. Struct names come from the value's types.
    pub fn render<T>(&self, template: &CompiledTemplate, value: &T) -> Result<String, RenderError>
    where
        T: ?Sized + Serialize,
    {
        let program = self.program(template, value)?;
        self.execute(template.name(), &program)
    }

    /// Render with untyped JSON. Objects are named from `root_name` down.
    pub fn render_json(
        &self,
        template: &CompiledTemplate,
        value: &Value,
        root_name: &str,
    ) -> Result<String, RenderError> {
        let program = self.program_json(template, value, root_name)?;
        self.execute(template.name(), &program)
    }

    /// The Go program [`Renderer::render`] would run, without running it.
    pub fn program<T>(&self, template: &CompiledTemplate, value: &T) -> Result<String, RenderError>
    where
        T: ?Sized + Serialize,
    {
        let reflection = reflect(value, &self.options.reflect)?;
        let payload = serde_json::to_string(value)?;
        self.assemble(template, &reflection, &payload)
    }

    /// The Go program [`Renderer::render_json`] would run.
    pub fn program_json(
        &self,
        template: &CompiledTemplate,
        value: &Value,
        root_name: &str,
    ) -> Result<String, RenderError> {
        let reflection = reflect_json(value, root_name, &self.options.reflect)?;
        let payload = serde_json::to_string(value)?;
        self.assemble(template, &reflection, &payload)
    }

    fn assemble(
        &self,
        template: &CompiledTemplate,
        reflection: &Reflection,
        payload: &str,
    ) -> Result<String, RenderError> {
        let program = self.program.render(&template.generator, reflection, payload)?;
        debug!(
            template = template.name(),
            declarations = reflection.declarations.len(),
            bytes = program.len(),
            "assembled program"
        );
        Ok(program)
    }

    fn execute(&self, name: &str, program: &str) -> Result<String, RenderError> {
        let mut artifact = self.create_artifact(name)?;
        let path = artifact.path().to_path_buf();
        artifact
            .write_all(program.as_bytes())
            .and_then(|()| artifact.flush())
            .map_err(|e| artifact_err(&path, e))?;
        info!(path = %path.display(), bytes = program.len(), "wrote program artifact");

        let execution = match self.toolchain.run(&path) {
            Ok(execution) => execution,
            Err(err) => {
                discard(artifact);
                return Err(err);
            }
        };

        if execution.success() {
            discard(artifact);
            return Ok(execution.combined());
        }

        let kept = if self.options.keep_artifact_on_failure {
            match artifact.keep() {
                Ok((_, kept)) => {
                    info!(path = %kept.display(), "kept failed program artifact");
                    Some(kept)
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not keep program artifact");
                    None
                }
            }
        } else {
            discard(artifact);
            None
        };

        Err(RenderError::ExecutionFailure {
            status: execution.status,
            output: execution.combined(),
            artifact: kept,
        })
    }

    fn create_artifact(&self, name: &str) -> Result<NamedTempFile, RenderError> {
        let prefix = format!("{}_{}_", sanitize(name), Utc::now().timestamp_millis());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(ARTIFACT_SUFFIX);
        match &self.options.artifact_dir {
            Some(dir) => builder.tempfile_in(dir).map_err(|e| artifact_err(dir, e)),
            None => builder
                .tempfile()
                .map_err(|e| artifact_err(std::env::temp_dir(), e)),
        }
    }
}

fn discard(artifact: NamedTempFile) {
    let path = artifact.path().to_path_buf();
    if let Err(err) = artifact.close() {
        warn!(path = %path.display(), error = %err, "failed to remove program artifact");
    }
}

/// File-name-safe form of a template name. Go ignores files starting with
/// `_` or `.`, so those are replaced too.
fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with('_') {
        out.insert_str(0, "kiln");
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
