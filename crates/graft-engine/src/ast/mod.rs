//! Declarations, expressions, types and scopes

mod check;
pub mod decl;
pub mod expr;
pub mod scope;
pub mod types;

pub use decl::{
    Access, ClassData, CtorInit, Decl, DeclFlags, DeclId, DeclKind, FieldData, FragmentData,
    FunctionData, InitTarget, InjectionDeclData, MetaclassData, MethodData, Program, SourceLoc,
    VarData,
};
pub use expr::{BinaryOp, ConstructStyle, Expr, Stmt};
pub use scope::{Scope, ScopeId, ScopeKind, ScopeTree};
pub use types::{PrimitiveType, Type, TypeContext, TypeId};
