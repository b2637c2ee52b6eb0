//! Expressions and statements
//!
//! Every expression carries its type, so `Expr::ty` never needs to consult
//! the program.

use super::decl::DeclId;
use super::types::{TypeContext, TypeId};
use crate::inject::mods::Modifications;
use crate::value::ConstValue;
use serde::{Deserialize, Serialize};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOp {
    /// Whether the operator yields `bool`
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::And | BinaryOp::Or
        )
    }

    /// Source spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// How an object construction was spelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructStyle {
    /// `T(x)`: single-argument functional cast
    FunctionalCast,
    /// `T(x, y, ...)` / `T()`: temporary object
    TemporaryObject,
}

/// An expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal
    IntLit(i64),
    /// Boolean literal
    BoolLit(bool),
    /// String literal
    StrLit(String),
    /// Reference to a declaration (an lvalue for variables and fields)
    DeclRef {
        /// Referenced declaration
        decl: DeclId,
        /// Type of the reference
        ty: TypeId,
    },
    /// Lvalue-to-value conversion
    ValueRead(Box<Expr>),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Member access `base.field`
    Member {
        /// Object expression
        base: Box<Expr>,
        /// Accessed field
        field: DeclId,
        /// Type of the field
        ty: TypeId,
    },
    /// Function call
    Call {
        /// Called expression
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
        /// Result type
        ty: TypeId,
    },
    /// `reflexpr(decl)`
    Reflect {
        /// Reflected declaration
        decl: DeclId,
        /// Carrier type of the reflection
        ty: TypeId,
    },
    /// A reflection with requested modifications attached
    Modify {
        /// The reflection being modified
        operand: Box<Expr>,
        /// Requested edits
        mods: Modifications,
        /// Carrier type holding the `mods` field
        ty: TypeId,
    },
    /// Object construction through a constructor
    Construct {
        /// Constructed type
        ty: TypeId,
        /// Selected constructor
        ctor: DeclId,
        /// Constructor arguments
        args: Vec<Expr>,
        /// Spelling
        style: ConstructStyle,
    },
    /// A fragment expression: the fragment plus its captured values
    Fragment {
        /// The fragment declaration
        fragment: DeclId,
        /// Captured value reads, in capture order
        captures: Vec<Expr>,
        /// Construction of the fragment object
        init: Box<Expr>,
        /// The synthesized fragment type
        ty: TypeId,
    },
    /// A constant computed earlier; `source` is kept for printing only and is
    /// never evaluated
    Constant {
        /// The value
        value: ConstValue,
        /// Type of the value
        ty: TypeId,
        /// The expression the constant replaced
        source: Box<Expr>,
    },
    /// An opaque value that cannot be evaluated
    Opaque(TypeId),
}

impl Expr {
    /// The type of the expression
    pub fn ty(&self) -> TypeId {
        match self {
            Expr::IntLit(_) => TypeContext::INT,
            Expr::BoolLit(_) => TypeContext::BOOL,
            Expr::StrLit(_) => TypeContext::STR,
            Expr::ValueRead(inner) => inner.ty(),
            Expr::Binary { op, lhs, .. } => {
                if op.is_comparison() {
                    TypeContext::BOOL
                } else {
                    lhs.ty()
                }
            }
            Expr::DeclRef { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::Reflect { ty, .. }
            | Expr::Modify { ty, .. }
            | Expr::Construct { ty, .. }
            | Expr::Fragment { ty, .. }
            | Expr::Constant { ty, .. } => *ty,
            Expr::Opaque(ty) => *ty,
        }
    }

    /// Whether the expression designates an object rather than a value
    pub fn is_glvalue(&self) -> bool {
        matches!(self, Expr::DeclRef { .. } | Expr::Member { .. })
    }

    /// Wrap in a value read unless it already is a value
    pub fn into_value(self) -> Expr {
        if self.is_glvalue() {
            Expr::ValueRead(Box::new(self))
        } else {
            self
        }
    }

    /// Whether the type or value depends on template parameters
    pub fn is_dependent(&self, types: &TypeContext) -> bool {
        if types.is_dependent(self.ty()) {
            return true;
        }
        match self {
            Expr::ValueRead(inner) => inner.is_dependent(types),
            Expr::Binary { lhs, rhs, .. } => lhs.is_dependent(types) || rhs.is_dependent(types),
            Expr::Member { base, .. } => base.is_dependent(types),
            Expr::Call { callee, args, .. } => {
                callee.is_dependent(types) || args.iter().any(|a| a.is_dependent(types))
            }
            Expr::Modify { operand, .. } => operand.is_dependent(types),
            Expr::Construct { args, .. } => args.iter().any(|a| a.is_dependent(types)),
            _ => false,
        }
    }

    /// The declaration named by a (possibly value-read) reference
    pub fn referenced_decl(&self) -> Option<DeclId> {
        match self {
            Expr::DeclRef { decl, .. } => Some(*decl),
            Expr::ValueRead(inner) => inner.referenced_decl(),
            _ => None,
        }
    }

    /// Build a binary expression
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// A statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Declaration statement
    Decl(DeclId),
    /// Expression statement
    Expr(Expr),
    /// `return`
    Return(Option<Expr>),
    /// Compound statement
    Block(Vec<Stmt>),
    /// `if`
    If {
        /// Condition
        cond: Expr,
        /// Then branch
        then_branch: Box<Stmt>,
        /// Else branch
        else_branch: Option<Box<Stmt>>,
    },
    /// Injection statement: `-> expr;`
    Inject(Expr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_read_only_wraps_glvalues() {
        let r = Expr::DeclRef {
            decl: DeclId::new(3),
            ty: TypeContext::INT,
        };
        assert!(matches!(r.clone().into_value(), Expr::ValueRead(_)));
        assert_eq!(Expr::IntLit(1).into_value(), Expr::IntLit(1));
        assert_eq!(r.into_value().referenced_decl(), Some(DeclId::new(3)));
    }

    #[test]
    fn test_dependence() {
        let mut types = TypeContext::new();
        let t = types.template_param_type(DeclId::new(9));
        let dep = Expr::DeclRef {
            decl: DeclId::new(9),
            ty: t,
        };
        let sum = Expr::binary(BinaryOp::Add, Expr::IntLit(1), Expr::IntLit(2));

        assert!(dep.is_dependent(&types));
        assert!(!sum.is_dependent(&types));
        assert!(Expr::Opaque(TypeContext::DEPENDENT).is_dependent(&types));
        assert_eq!(
            Expr::binary(BinaryOp::Lt, Expr::IntLit(1), Expr::IntLit(2)).ty(),
            TypeContext::BOOL
        );
    }
}
