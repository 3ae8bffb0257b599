pub mod check;
pub mod emit;
pub mod render;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;

use kiln_core::{ParseOptions, Whitespace};
use kiln_renderer::DEFAULT_JSON_ROOT;

/// Template and data arguments shared by `render` and `emit`.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Template file.
    pub template: PathBuf,

    /// Input data as JSON (`.json`) or YAML (`.yaml`, `.yml`). Defaults to `{}`.
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Go type name for the top-level data object.
    #[arg(long, default_value = DEFAULT_JSON_ROOT)]
    pub root: String,

    /// Keep template whitespace and line breaks.
    #[arg(long)]
    pub verbatim: bool,
}

impl SourceArgs {
    pub fn load_data(&self) -> Result<Value> {
        match &self.data {
            Some(path) => load_data(path),
            None => Ok(Value::Object(Default::default())),
        }
    }
}

pub fn parse_options(verbatim: bool) -> ParseOptions {
    let whitespace = if verbatim {
        Whitespace::Verbatim
    } else {
        Whitespace::Compact
    };
    ParseOptions { whitespace }
}

fn load_data(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON in {}", path.display())),
        Some("yaml" | "yml") => serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid YAML in {}", path.display())),
        _ => bail!(
            "unsupported data file {}; expected .json, .yaml or .yml",
            path.display()
        ),
    }
}
