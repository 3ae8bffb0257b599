//! `kiln check <template>`: parse only.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;

use kiln_renderer::{RenderOptions, Renderer};

use super::parse_options;

/// Arguments for `kiln check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Template file.
    pub template: PathBuf,

    /// Check with verbatim whitespace handling.
    #[arg(long)]
    pub verbatim: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let renderer = Renderer::new(RenderOptions {
            parse: parse_options(self.verbatim),
            ..RenderOptions::default()
        })?;

        match renderer.parse_file(&self.template) {
            Ok(template) => {
                println!(
                    "{} {}: {} ops, {} imports",
                    "ok".green().bold(),
                    self.template.display(),
                    template.ops().len(),
                    template.imports().len()
                );
                for name in template.imports() {
                    println!("  import {name}");
                }
                Ok(())
            }
            Err(err) => {
                eprintln!("{} {}", "error".red().bold(), self.template.display());
                Err(anyhow!(err))
            }
        }
    }
}
