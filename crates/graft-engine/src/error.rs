//! Error types for evaluation and injection
//!
//! Provides structured error types plus the `Diagnostic` record the session
//! collects for the caller.

use crate::ast::{DeclId, SourceLoc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised by the constant evaluator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// A placeholder's opaque initializer was reached
    #[error("Opaque value cannot be evaluated")]
    Opaque,

    /// The expression depends on template parameters
    #[error("Expression is value-dependent")]
    Dependent,

    /// A referenced declaration has no constant value
    #[error("'{name}' is not usable in a constant expression")]
    NotConstant {
        /// Declaration name
        name: String,
    },

    /// Operand kinds do not fit the operation
    #[error("Invalid operand for '{op}'")]
    InvalidOperand {
        /// The operation
        op: String,
    },

    /// Integer division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Nested evaluation went too deep
    #[error("Constant evaluation exceeded maximum depth {max}")]
    DepthExceeded {
        /// Configured limit
        max: u32,
    },
}

/// Inconsistencies found in a deserialized program
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    /// The first declaration must be the translation unit
    #[error("Program does not start with the translation unit")]
    MissingTranslationUnit,

    /// An id that names no declaration of the program
    #[error("{site} refers to unknown declaration {decl}")]
    UnknownDecl {
        /// Where the id was found
        site: String,
        /// The dangling id
        decl: DeclId,
    },
}

/// Errors raised while injecting
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InjectError {
    /// Payload kind does not match the kind of the target context
    #[error("Cannot inject {} into {}", injection_kind_name(*kind), target_kind_name(*target))]
    InvalidInjection {
        /// Payload kind (0 statement, 1 class, 2 namespace)
        kind: u8,
        /// Target kind (0 function, 1 class, 2 namespace, 3 translation unit)
        target: u8,
    },

    /// The current context is not a place an injection can happen
    #[error("Injection outside of any function, class or namespace")]
    NoValidContext,

    /// The operand of an injection is not a reflection
    #[error("Expression is not a reflection")]
    NotAReflection,

    /// The reflection does not designate a declaration
    #[error("Reflection does not designate a declaration")]
    ReflectionNotADecl,

    /// The fragment has no content
    #[error("Fragment has no content")]
    EmptyFragment,

    /// An injected declaration refers to an instance member of its old owner
    /// that the destination does not have
    #[error("Injected code captures non-static {} '{name}'", member_kind_name(*member))]
    NonStaticCapture {
        /// Member name
        name: String,
        /// 0 member function, 1 data member
        member: u8,
    },

    /// A static member of the old owner was not found in the destination and
    /// the configuration forbids reusing it
    #[error("'{name}' is not declared in the injection target")]
    UnresolvedReference {
        /// Declaration name
        name: String,
    },

    /// Several destination members share the referenced name
    #[error("Reference to '{name}' requires overload resolution ({candidates} candidates)")]
    AmbiguousLookup {
        /// Declaration name
        name: String,
        /// Number of candidates found
        candidates: usize,
    },

    /// The declaration kind cannot be cloned
    #[error("Cannot inject a {kind}")]
    UnsupportedDecl {
        /// Kind description
        kind: &'static str,
    },

    /// Fragments do not nest by injection
    #[error("Cannot inject a fragment declaration")]
    NestedFragment,

    /// A template parameter was mapped to something that is not a class
    #[error("Invalid substitution for template parameter '{name}'")]
    InvalidTemplateSubstitution {
        /// Parameter name
        name: String,
    },

    /// Access was changed on a non-member
    #[error("Cannot modify the access of a non-member")]
    AccessOnNonMember,

    /// `constexpr` was requested for a destructor
    #[error("Destructor cannot be made constexpr")]
    ConstexprDestructor,

    /// `virtual` (or `constexpr`) requested on a declaration that cannot carry it
    #[error("Only member functions can be made virtual")]
    VirtualNonFunction,

    /// `pure` requested without `virtual`
    #[error("Pure specifier requires a virtual member function")]
    PureWithoutVirtual,

    /// `pure` requested on a member function with a body
    #[error("Cannot make a defined member function pure virtual")]
    PureOnDefined,

    /// `pure` requested on a defaulted member function
    #[error("Cannot make a defaulted member function pure virtual")]
    PureOnDefaulted,

    /// `pure` requested on a deleted member function
    #[error("Cannot make a deleted member function pure virtual")]
    PureOnDeleted,

    /// Storage kinds other than `static` cannot be requested
    #[error("Unsupported storage modification '{0}'")]
    UnsupportedStorage(&'static str),

    /// The `default` access cannot be requested
    #[error("Unsupported access modification 'default'")]
    UnsupportedAccess,

    /// The declaration validator refused a modified declaration
    #[error("{message}")]
    ValidationFailed {
        /// Validator message
        message: String,
    },

    /// A metaclass inherits from something that is not a metaclass
    #[error("Metaclass '{name}' inherits from a regular class")]
    MetaclassBaseNotMetaclass {
        /// Name of the offending base
        name: String,
    },

    /// A metaclass body does not start with its prototype parameter
    #[error("Metaclass '{name}' has no prototype parameter")]
    MissingPrototype {
        /// Metaclass name
        name: String,
    },

    /// Some members of an injection failed; each was reported separately
    #[error("{failed} injected declaration(s) are invalid")]
    InjectionFailed {
        /// Number of failed members
        failed: usize,
    },

    /// Constant evaluation failed
    #[error(transparent)]
    Eval(#[from] EvalError),
}

fn injection_kind_name(kind: u8) -> &'static str {
    match kind {
        0 => "statements",
        1 => "class members",
        _ => "namespace members",
    }
}

fn member_kind_name(member: u8) -> &'static str {
    if member == 0 {
        "member function"
    } else {
        "data member"
    }
}

fn target_kind_name(target: u8) -> &'static str {
    match target {
        0 => "a function",
        1 => "a class",
        2 => "a namespace",
        _ => "the translation unit",
    }
}

impl InjectError {
    /// The diagnostic class used to select message text: 0/1/2 for a
    /// statement/class/namespace injection of the wrong kind, 3 for an
    /// injection outside any valid context
    pub fn diagnostic_class(&self) -> Option<u8> {
        match self {
            InjectError::InvalidInjection { kind, .. } => Some(*kind),
            InjectError::NoValidContext => Some(3),
            _ => None,
        }
    }

    /// Errors the engine cannot recover from. An ambiguous lookup would need
    /// overload resolution, which is not implemented.
    pub fn is_fatal(&self) -> bool {
        matches!(self, InjectError::AmbiguousLookup { .. })
    }

    /// Stable error code
    pub fn code(&self) -> ErrorCode {
        use InjectError::*;
        ErrorCode(match self {
            InvalidInjection { .. } => "G1001",
            NoValidContext => "G1002",
            NotAReflection => "G1003",
            ReflectionNotADecl => "G1004",
            EmptyFragment => "G1005",
            NonStaticCapture { .. } => "G2001",
            UnresolvedReference { .. } => "G2002",
            AmbiguousLookup { .. } => "G2003",
            UnsupportedDecl { .. } => "G2004",
            NestedFragment => "G2005",
            InvalidTemplateSubstitution { .. } => "G2006",
            AccessOnNonMember => "G3001",
            ConstexprDestructor => "G3002",
            VirtualNonFunction => "G3003",
            PureWithoutVirtual => "G3004",
            PureOnDefined => "G3005",
            PureOnDefaulted => "G3006",
            PureOnDeleted => "G3007",
            UnsupportedStorage(_) => "G3008",
            UnsupportedAccess => "G3009",
            ValidationFailed { .. } => "G3010",
            MetaclassBaseNotMetaclass { .. } => "G4001",
            MissingPrototype { .. } => "G4002",
            InjectionFailed { .. } => "G5001",
            Eval(_) => "G6001",
        })
    }
}

/// Error code for a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    /// Code used for capture fallback warnings
    pub const CAPTURE_FALLBACK: ErrorCode = ErrorCode("G2101");

    /// The code as a string
    pub fn as_str(&self) -> &str {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error
    Error,
    /// Warning
    Warning,
    /// Note attached to a preceding diagnostic
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A reported problem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Message text
    pub message: String,
    /// Where it was reported
    pub loc: SourceLoc,
    /// Diagnostic class for kind mismatches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<u8>,
}

impl Diagnostic {
    /// An error diagnostic for `error`
    pub fn from_error(error: &InjectError, loc: SourceLoc) -> Self {
        Self {
            severity: Severity::Error,
            code: error.code(),
            message: error.to_string(),
            loc,
            class: error.diagnostic_class(),
        }
    }

    /// A warning
    pub fn warning(code: ErrorCode, message: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            loc,
            class: None,
        }
    }

    /// A note
    pub fn note(code: ErrorCode, message: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            severity: Severity::Note,
            code,
            message: message.into(),
            loc,
            class: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}: {}", self.severity, self.code, self.loc, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_classes() {
        let e = InjectError::InvalidInjection { kind: 1, target: 2 };
        assert_eq!(e.diagnostic_class(), Some(1));
        assert_eq!(e.to_string(), "Cannot inject class members into a namespace");
        assert_eq!(InjectError::NoValidContext.diagnostic_class(), Some(3));
        assert_eq!(InjectError::PureWithoutVirtual.diagnostic_class(), None);
    }

    #[test]
    fn test_only_ambiguous_lookup_is_fatal() {
        let ambiguous = InjectError::AmbiguousLookup {
            name: "f".into(),
            candidates: 2,
        };
        assert!(ambiguous.is_fatal());
        assert!(!InjectError::NestedFragment.is_fatal());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::from_error(&InjectError::ConstexprDestructor, SourceLoc::new(3, 7));
        assert_eq!(d.to_string(), "error[G3002] 3:7: Destructor cannot be made constexpr");
    }
}
