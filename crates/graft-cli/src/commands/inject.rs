//! `graft inject`: apply a scenario's injections and report the result.

use crate::config::OutputFormat;
use crate::output::StyledOutput;
use crate::scenario::{self, BatchReport, Outcome, Scenario};
use graft_engine::{DisplayDecl, InjectConfig};
use std::path::Path;

/// Run the scenario; returns whether the batch succeeded
pub fn execute(
    path: &Path,
    config: InjectConfig,
    format: OutputFormat,
    out: &mut StyledOutput,
) -> anyhow::Result<bool> {
    let scenario = Scenario::load(path)?;
    let report = scenario::run(scenario, config);
    match format {
        OutputFormat::Json => {
            out.plain(&serde_json::to_string_pretty(&report)?);
            out.newline();
        }
        OutputFormat::Pretty => print_report(&report, out),
    }
    out.flush();
    Ok(report.ok)
}

fn print_report(report: &BatchReport, out: &mut StyledOutput) {
    for (i, outcome) in report.outcomes.iter().enumerate() {
        out.bold(&format!("request {}: ", i));
        match outcome {
            Outcome::Applied { decls } => {
                out.success("applied");
                out.plain(&format!(" ({} declaration(s))", decls.len()));
                out.newline();
                for &decl in decls {
                    out.plain(&DisplayDecl::new(&report.program, decl).to_string());
                }
            }
            Outcome::Failed { error } => {
                out.error("failed");
                out.plain(&format!(": {}", error));
                out.newline();
            }
            Outcome::Pending => {
                out.warning("pending");
                out.newline();
            }
            Outcome::Skipped => {
                out.info("skipped");
                out.newline();
            }
        }
    }

    if !report.diagnostics.is_empty() {
        out.newline();
        for diag in &report.diagnostics {
            out.diagnostic(diag);
        }
    }

    out.newline();
    if report.ok {
        out.success("ok");
    } else {
        out.error("batch failed");
    }
    out.newline();
}
