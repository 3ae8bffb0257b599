//! `kiln emit <template>`: print the generated Go program.

use anyhow::{Context, Result};
use clap::Args;

use kiln_renderer::{RenderOptions, Renderer};

use super::{parse_options, SourceArgs};

/// Arguments for `kiln emit`.
#[derive(Args, Debug)]
pub struct EmitArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

impl EmitArgs {
    pub fn run(self) -> Result<()> {
        let renderer = Renderer::new(RenderOptions {
            parse: parse_options(self.source.verbatim),
            ..RenderOptions::default()
        })?;
        let template = renderer
            .parse_file(&self.source.template)
            .with_context(|| format!("failed to parse {}", self.source.template.display()))?;
        let data = self.source.load_data()?;
        let program = renderer
            .program_json(&template, &data, &self.source.root)
            .context("failed to build program")?;
        print!("{program}");
        Ok(())
    }
}
