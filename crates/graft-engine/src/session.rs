//! Semantic session
//!
//! Holds the program being compiled together with the state an injection
//! runs under: the current declaration context, the evaluation-context
//! stack, the active synthesis points, collected diagnostics and the
//! external services (evaluator, validator, top-level consumer).
//!
//! Every piece of scoped state is acquired through a closure-taking
//! `with_*` method and restored when the closure returns, including when it
//! returns early with an error.

use crate::ast::{DeclId, Expr, Program, SourceLoc};
use crate::config::InjectConfig;
use crate::error::{Diagnostic, ErrorCode, EvalError, InjectError, Severity};
use crate::eval::{ConstEvaluator, Interpreter};
use crate::validate::{BasicValidator, CollectingConsumer, DeclConsumer, DeclValidator};
use crate::value::TypedValue;
use log::{debug, warn};

/// Kind of expression evaluation context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalContextKind {
    /// Ordinary code
    PotentiallyEvaluated,
    /// Code that must be a constant expression
    ConstantEvaluated,
}

/// Compilation state shared by the capture builder, fragment packager and
/// injection driver
pub struct Session {
    /// The declaration universe
    pub program: Program,
    config: InjectConfig,
    current: DeclId,
    eval_contexts: Vec<EvalContextKind>,
    synthesis: Vec<SourceLoc>,
    diagnostics: Vec<Diagnostic>,
    evaluator: Box<dyn ConstEvaluator>,
    validator: Box<dyn DeclValidator>,
    consumer: Box<dyn DeclConsumer>,
}

impl Session {
    /// A session with the default configuration and reference services
    pub fn new(program: Program) -> Self {
        Self::with_config(program, InjectConfig::default())
    }

    /// A session with the reference services
    pub fn with_config(program: Program, config: InjectConfig) -> Self {
        let evaluator = Interpreter::new(config.max_eval_depth);
        Self {
            program,
            config,
            current: DeclId::TRANSLATION_UNIT,
            eval_contexts: vec![EvalContextKind::PotentiallyEvaluated],
            synthesis: Vec::new(),
            diagnostics: Vec::new(),
            evaluator: Box::new(evaluator),
            validator: Box::new(BasicValidator),
            consumer: Box::new(CollectingConsumer::new()),
        }
    }

    /// Replace the constant evaluator
    pub fn with_evaluator(mut self, evaluator: Box<dyn ConstEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Replace the declaration validator
    pub fn with_validator(mut self, validator: Box<dyn DeclValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the top-level declaration consumer
    pub fn with_consumer(mut self, consumer: Box<dyn DeclConsumer>) -> Self {
        self.consumer = consumer;
        self
    }

    /// The configuration
    pub fn config(&self) -> &InjectConfig {
        &self.config
    }

    /// Consume the session, returning the program
    pub fn into_program(self) -> Program {
        self.program
    }

    // ========================================================================
    // Declaration context
    // ========================================================================

    /// The context new declarations are added to
    pub fn current_context(&self) -> DeclId {
        self.current
    }

    /// Switch the current context, returning the previous one
    pub fn set_current_context(&mut self, dc: DeclId) -> DeclId {
        std::mem::replace(&mut self.current, dc)
    }

    /// Run `f` with `dc` as the current context
    pub fn with_context<R>(&mut self, dc: DeclId, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.set_current_context(dc);
        let result = f(self);
        self.current = saved;
        result
    }

    // ========================================================================
    // Evaluation contexts
    // ========================================================================

    /// The innermost evaluation context
    pub fn eval_context(&self) -> EvalContextKind {
        self.eval_contexts
            .last()
            .copied()
            .unwrap_or(EvalContextKind::PotentiallyEvaluated)
    }

    pub(crate) fn push_eval_context(&mut self, kind: EvalContextKind) {
        self.eval_contexts.push(kind);
    }

    pub(crate) fn pop_eval_context(&mut self) {
        if self.eval_contexts.len() > 1 {
            self.eval_contexts.pop();
        }
    }

    /// Run `f` inside an evaluation context of `kind`
    pub fn with_eval_context<R>(&mut self, kind: EvalContextKind, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_eval_context(kind);
        let result = f(self);
        self.pop_eval_context();
        result
    }

    // ========================================================================
    // Code synthesis
    // ========================================================================

    /// Run `f` while synthesizing code for the injection at `poi`
    pub fn with_synthesis<R>(&mut self, poi: SourceLoc, f: impl FnOnce(&mut Self) -> R) -> R {
        debug!("begin synthesis at {}", poi);
        self.synthesis.push(poi);
        let result = f(self);
        self.synthesis.pop();
        debug!("end synthesis at {}", poi);
        result
    }

    /// Whether code is being synthesized
    pub fn is_synthesizing(&self) -> bool {
        !self.synthesis.is_empty()
    }

    /// The innermost point of injection
    pub fn synthesis_point(&self) -> Option<SourceLoc> {
        self.synthesis.last().copied()
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Report an error
    pub fn report(&mut self, error: &InjectError, loc: SourceLoc) {
        debug!("{} at {}", error, loc);
        self.diagnostics.push(Diagnostic::from_error(error, loc));
    }

    /// Report an evaluation failure with the evaluator's explanation as a note
    pub(crate) fn report_eval_failure(&mut self, error: InjectError, cause: &EvalError, loc: SourceLoc) {
        self.report(&error, loc);
        self.diagnostics
            .push(Diagnostic::note(error.code(), cause.to_string(), loc));
    }

    /// Report a warning (an error when warnings are treated as errors)
    pub fn warn(&mut self, code: ErrorCode, message: impl Into<String>, loc: SourceLoc) {
        let mut diag = Diagnostic::warning(code, message, loc);
        warn!("{}", diag.message);
        if self.config.warnings_as_errors {
            diag.severity = Severity::Error;
        }
        self.diagnostics.push(diag);
    }

    /// Everything reported so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take the reported diagnostics
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Number of errors reported so far
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    // ========================================================================
    // Services
    // ========================================================================

    /// Evaluate a constant expression
    pub fn evaluate(&mut self, expr: &Expr) -> Result<TypedValue, EvalError> {
        self.evaluator.evaluate(&self.program, expr)
    }

    pub(crate) fn validator(&self) -> &dyn DeclValidator {
        self.validator.as_ref()
    }

    pub(crate) fn notify_top_level(&mut self, decl: DeclId) {
        self.consumer.handle_top_level_decl(&self.program, decl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_restored_after_early_return() {
        let mut program = Program::new();
        let ns = program.add_namespace(DeclId::TRANSLATION_UNIT, "n");
        let mut session = Session::new(program);

        let result: Result<(), InjectError> = session.with_context(ns, |s| {
            assert_eq!(s.current_context(), ns);
            Err(InjectError::NoValidContext)
        });
        assert!(result.is_err());
        assert_eq!(session.current_context(), DeclId::TRANSLATION_UNIT);
    }

    #[test]
    fn test_eval_context_nesting() {
        let mut session = Session::new(Program::new());
        assert_eq!(session.eval_context(), EvalContextKind::PotentiallyEvaluated);
        session.with_eval_context(EvalContextKind::ConstantEvaluated, |s| {
            assert_eq!(s.eval_context(), EvalContextKind::ConstantEvaluated);
        });
        assert_eq!(session.eval_context(), EvalContextKind::PotentiallyEvaluated);
    }

    #[test]
    fn test_synthesis_scope() {
        let mut session = Session::new(Program::new());
        let poi = SourceLoc::new(10, 2);
        session.with_synthesis(poi, |s| {
            assert!(s.is_synthesizing());
            assert_eq!(s.synthesis_point(), Some(poi));
        });
        assert!(!session.is_synthesizing());
    }

    #[test]
    fn test_warnings_as_errors() {
        let config = InjectConfig {
            warnings_as_errors: true,
            ..InjectConfig::default()
        };
        let mut session = Session::with_config(Program::new(), config);
        session.warn(ErrorCode::CAPTURE_FALLBACK, "reused", SourceLoc::default());
        assert_eq!(session.error_count(), 1);
    }
}
