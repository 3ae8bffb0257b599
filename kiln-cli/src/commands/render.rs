//! `kiln render <template>`: render a template with a data file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use kiln_renderer::{RenderOptions, Renderer};

use super::{parse_options, SourceArgs};

/// Arguments for `kiln render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Write the output here instead of stdout.
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Go toolchain binary.
    #[arg(long, env = "KILN_GO", default_value = "go")]
    pub go: String,

    /// Kill the toolchain after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Keep the generated program when the run fails.
    #[arg(long)]
    pub keep_failed: bool,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let renderer = Renderer::new(RenderOptions {
            go_program: self.go.clone(),
            timeout: self.timeout.map(Duration::from_secs),
            keep_artifact_on_failure: self.keep_failed,
            parse: parse_options(self.source.verbatim),
            ..RenderOptions::default()
        })?;

        let template = renderer
            .parse_file(&self.source.template)
            .with_context(|| format!("failed to parse {}", self.source.template.display()))?;
        let data = self.source.load_data()?;
        let output = renderer
            .render_json(&template, &data, &self.source.root)
            .with_context(|| format!("failed to render {}", self.source.template.display()))?;

        match &self.out {
            Some(path) => {
                std::fs::write(path, &output)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), bytes = output.len(), "wrote rendered output");
            }
            None => print!("{output}"),
        }
        Ok(())
    }
}
