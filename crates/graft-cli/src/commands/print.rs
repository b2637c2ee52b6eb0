//! `graft print`: pretty-print the program of a scenario.

use crate::config::OutputFormat;
use crate::output::StyledOutput;
use crate::scenario::Scenario;
use graft_engine::Printer;
use std::path::Path;

pub fn execute(path: &Path, format: OutputFormat, out: &mut StyledOutput) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;
    match format {
        OutputFormat::Json => {
            out.plain(&serde_json::to_string_pretty(&scenario.program)?);
            out.newline();
        }
        OutputFormat::Pretty => {
            out.plain(&Printer::print_program(&scenario.program));
            if !scenario.requests.is_empty() {
                out.info(&format!("{} pending request(s)", scenario.requests.len()));
                out.newline();
            }
        }
    }
    out.flush();
    Ok(())
}
