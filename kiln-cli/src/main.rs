//! Kiln: compile templates into Go programs and run them.
//!
//! # Usage
//!
//! ```text
//! kiln render <template> [--data FILE] [--out FILE] [--root NAME] [--verbatim]
//!                        [--go PATH] [--timeout SECS] [--keep-failed]
//! kiln emit <template> [--data FILE] [--root NAME] [--verbatim]
//! kiln check <template> [--verbatim]
//! ```
//!
//! Logging goes to stderr; `RUST_LOG` overrides `-v`/`-vv`.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{check::CheckArgs, emit::EmitArgs, render::RenderArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Compile templates into Go programs and run them",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template with a data file.
    Render(RenderArgs),

    /// Print the Go program a render would run.
    Emit(EmitArgs),

    /// Parse a template and report problems without running anything.
    Check(CheckArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Render(args) => args.run(),
        Commands::Emit(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
