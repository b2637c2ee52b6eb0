//! Graft CLI
//!
//! Applies the injections of a scenario file (a program snapshot plus
//! injection requests) and prints the injected declarations together with
//! the diagnostics the engine reported.

mod commands;
mod config;
mod output;
mod scenario;

use clap::{Parser, Subcommand};
use config::{GraftToml, OutputFormat};
use output::{resolve_color_choice, StyledOutput};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Compile-time declaration injection", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./graft.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every request of a scenario as one batch
    Inject {
        /// Scenario file (JSON)
        scenario: PathBuf,
    },

    /// Print the program of a scenario
    Print {
        /// Scenario file (JSON)
        scenario: PathBuf,
    },
}

fn init_logging(level: log::LevelFilter) {
    // RUST_LOG refines the configured level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = match GraftToml::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));
            out.stderr_error(&format!("error: {:#}\n", e));
            std::process::exit(2);
        }
    };
    init_logging(config.log.level);

    let color = cli.color.as_deref().or(config.output.color.as_deref());
    let mut out = StyledOutput::new(resolve_color_choice(color));
    let format = cli.format.unwrap_or(config.output.format);

    let result = match cli.command {
        Commands::Inject { scenario } => {
            commands::inject::execute(&scenario, config.inject, format, &mut out)
        }
        Commands::Print { scenario } => {
            commands::print::execute(&scenario, format, &mut out).map(|()| true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            out.stderr_error(&format!("error: {:#}\n", e));
            std::process::exit(2);
        }
    }
}
