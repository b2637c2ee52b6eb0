//! Graft Injection Engine
//!
//! Compile-time source injection for a reflection-enabled front end:
//! - **Capture**: collects the locals a fragment refers to (`capture` module)
//! - **Fragments**: packages a fragment and its captured values into a
//!   constant-evaluable expression (`fragment` module)
//! - **Injection**: clones declarations into a destination context, applies
//!   modification traits and expands metaclasses (`inject` module)
//! - **Printing**: renders the resulting program (`pretty` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use graft_engine::{DeclId, Program, Session, TypeContext};
//!
//! let mut program = Program::new();
//! let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
//! let x = program.add_field(s, "x", TypeContext::INT, None);
//! let target = program.add_class(DeclId::TRANSLATION_UNIT, "T");
//!
//! let mut session = Session::new(program);
//! session.set_current_context(target);
//! let reflection = session.program.build_reflection(x);
//! let group = session.act_on_injection_decl(Default::default(), reflection);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Declarations, expressions, types and scopes
pub mod ast;

/// Capture collection and placeholders
pub mod capture;

/// Engine configuration
pub mod config;

/// Error types and diagnostics
pub mod error;

/// Constant evaluation
pub mod eval;

/// Fragment declarations and fragment expressions
pub mod fragment;

/// Declaration cloning, modification traits, the injection driver and
/// metaclass expansion
pub mod inject;

/// Identifier interning
pub mod interner;

/// Human-readable printing
pub mod pretty;

/// Reflection carrier types
pub mod reflection;

/// Compilation session
pub mod session;

/// Declaration validation and top-level consumers
pub mod validate;

/// Constant values
pub mod value;

// ============================================================================
// Re-exports
// ============================================================================

pub use ast::{
    Access, DeclId, DeclKind, Expr, Program, ScopeKind, ScopeTree, SourceLoc, Stmt, TypeContext,
    TypeId,
};
pub use capture::Capture;
pub use config::{FallbackPolicy, InjectConfig};
pub use error::{Diagnostic, ErrorCode, EvalError, InjectError, Severity, SnapshotError};
pub use eval::{ConstEvaluator, Interpreter};
pub use inject::{
    describe_injection_target, InjectionContext, InjectionInfo, InjectionRequest, Injector,
    Modifications, RemapTable, RequestState,
};
pub use pretty::{DisplayDecl, Printer};
pub use session::{EvalContextKind, Session};
pub use validate::{BasicValidator, CollectingConsumer, DeclConsumer, DeclValidator};
pub use value::{ConstValue, TypedValue};
