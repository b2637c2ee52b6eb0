//! Scenario files: a program snapshot plus the injections to apply to it.
//!
//! ```json
//! {
//!   "program": { ... },
//!   "requests": [ { "point": { "line": 3, "column": 1 }, "target": 4, "expr": { ... } } ]
//! }
//! ```

use anyhow::Context;
use graft_engine::{
    DeclId, Diagnostic, Expr, InjectConfig, InjectionRequest, Program, RequestState, Session,
    SourceLoc,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One requested injection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Point of injection
    #[serde(default)]
    pub point: SourceLoc,
    /// The context injected into
    pub target: DeclId,
    /// The reflection or fragment operand
    pub expr: Expr,
}

/// A scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// The program before injection
    pub program: Program,
    /// Injections, applied in order
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
}

impl Scenario {
    /// Read a scenario from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    /// Parse scenario JSON
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = serde_json::from_str(text)?;
        scenario.program.validate()?;
        for (i, request) in scenario.requests.iter().enumerate() {
            if !scenario.program.contains(request.target) {
                anyhow::bail!("request {} targets unknown declaration {}", i, request.target);
            }
            scenario
                .program
                .validate_expr(&format!("request {}", i), &request.expr)?;
        }
        Ok(scenario)
    }
}

/// Outcome of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Injected these declarations
    Applied { decls: Vec<DeclId> },
    /// Rejected
    Failed { error: String },
    /// The operand is still dependent
    Pending,
    /// Not attempted because an earlier request failed fatally
    Skipped,
}

/// Result of running a scenario
#[derive(Debug, Serialize)]
pub struct BatchReport {
    /// Whether every attempted request was applied
    pub ok: bool,
    /// Per-request outcomes, in request order
    pub outcomes: Vec<Outcome>,
    /// Everything the engine reported
    pub diagnostics: Vec<Diagnostic>,
    /// The program after injection
    #[serde(skip)]
    pub program: Program,
}

/// Apply every request of `scenario` in order
pub fn run(scenario: Scenario, config: InjectConfig) -> BatchReport {
    let mut session = Session::with_config(scenario.program, config);
    let mut outcomes = Vec::with_capacity(scenario.requests.len());
    let mut ok = true;
    let mut stopped = false;

    for spec in scenario.requests {
        if stopped {
            outcomes.push(Outcome::Skipped);
            continue;
        }
        let mut request = InjectionRequest::new(spec.point, spec.target, spec.expr);
        session.drive_request(&mut request);
        let outcome = match request.state {
            RequestState::Pending(_) => Outcome::Pending,
            RequestState::Applied(decls) => Outcome::Applied { decls },
            RequestState::Failed(e) => {
                ok = false;
                stopped = e.is_fatal();
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        debug!("request at {}: {:?}", spec.point, outcome);
        outcomes.push(outcome);
    }

    // Warnings promoted to errors fail the batch too
    if session.error_count() > 0 {
        ok = false;
    }

    BatchReport {
        ok,
        outcomes,
        diagnostics: session.take_diagnostics(),
        program: session.into_program(),
    }
}
