//! Fragment captures and placeholders
//!
//! When a fragment starts, every initialized local variable or parameter in
//! scope (up to the enclosing function) is captured by value. Inside the
//! fragment each capture is represented by a placeholder of the same name:
//!
//! ```text
//! static constexpr <dependent> v = <opaque>;
//! ```
//!
//! Placeholders are replaced by the captured values when the fragment is
//! injected.

use crate::ast::{Decl, DeclId, DeclKind, Expr, Program, ScopeId, ScopeTree, TypeContext, TypeId, VarData};
use crate::interner::Name;
use log::trace;

/// A captured local value
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// The captured variable
    pub var: DeclId,
    /// Its name
    pub name: Name,
    /// Its type
    pub ty: TypeId,
    /// A value read of the variable
    pub expr: Expr,
}

/// Whether `decl` is a local variable or parameter with an initializer.
///
/// Requiring an initializer keeps a variable from capturing itself when its
/// own initializer is a fragment.
fn is_capturable(program: &Program, decl: DeclId) -> bool {
    match &program.decl(decl).kind {
        DeclKind::Var(v) => v.is_local && v.init.is_some(),
        DeclKind::Param(v) => v.init.is_some(),
        _ => false,
    }
}

fn captures_in_scope(program: &Program, scopes: &ScopeTree, scope: ScopeId, vars: &mut Vec<DeclId>) {
    vars.extend(
        scopes
            .get(scope)
            .decls
            .iter()
            .copied()
            .filter(|&d| is_capturable(program, d)),
    );
}

/// Collect the variables to capture, innermost scope first.
///
/// Walks outward from `scope` until reaching the scope of `function`, which
/// is searched too; the walk never leaves the function.
pub fn find_captures(
    program: &Program,
    scopes: &ScopeTree,
    scope: ScopeId,
    function: Option<DeclId>,
) -> Vec<DeclId> {
    let mut vars = Vec::new();
    let mut cur = Some(scope);
    while let Some(s) = cur {
        if function.is_some() && scopes.get(s).entity == function {
            break;
        }
        captures_in_scope(program, scopes, s, &mut vars);
        cur = scopes.parent(s);
    }
    if let Some(s) = cur {
        captures_in_scope(program, scopes, s, &mut vars);
    }
    vars
}

/// A value read of each variable, so evaluation stores values rather than
/// references
pub fn reference_captures(program: &Program, vars: &[DeclId]) -> Vec<Capture> {
    vars.iter()
        .filter_map(|&var| {
            let d = program.decl(var);
            let name = d.name?;
            let ty = d.value_type()?;
            Some(Capture {
                var,
                name,
                ty,
                expr: Expr::ValueRead(Box::new(Expr::DeclRef { decl: var, ty })),
            })
        })
        .collect()
}

/// The variable read by a capture expression
pub fn variable_from_capture(expr: &Expr) -> Option<DeclId> {
    match expr {
        Expr::ValueRead(inner) => match inner.as_ref() {
            Expr::DeclRef { decl, .. } => Some(*decl),
            _ => None,
        },
        _ => None,
    }
}

/// Create one placeholder per capture inside `fragment`, in capture order
pub fn create_placeholders(program: &mut Program, fragment: DeclId, captures: &[Capture]) -> Vec<DeclId> {
    captures
        .iter()
        .map(|capture| {
            let loc = program.decl(capture.var).loc;
            let mut data = VarData::new(
                TypeContext::DEPENDENT,
                Some(Expr::Opaque(TypeContext::DEPENDENT)),
            );
            data.is_static = true;
            data.is_constexpr = true;

            let mut decl = Decl::new(Some(capture.name), DeclKind::Var(data), Some(fragment));
            decl.loc = loc;
            decl.flags.implicit = true;
            decl.flags.referenced = true;
            decl.flags.used = true;
            decl.flags.placeholder = true;

            let id = program.alloc(decl);
            program.add_member(fragment, id);
            trace!("placeholder {} for capture of {}", id, capture.var);
            id
        })
        .collect()
}

/// The placeholders of a fragment, in capture order
pub fn placeholders(program: &Program, fragment: DeclId) -> Vec<DeclId> {
    program
        .decl(fragment)
        .members
        .iter()
        .copied()
        .filter(|&m| program.decl(m).flags.placeholder)
        .collect()
}
