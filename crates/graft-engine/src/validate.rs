//! Declaration validation and top-level consumers
//!
//! The injection engine does not type-check declarations itself. When a
//! modification changes what a declaration is (constexpr, pure virtual), it
//! asks a `DeclValidator` to re-check it. Namespace-scope declarations it
//! produces are handed to a `DeclConsumer`.

use crate::ast::{DeclId, DeclKind, Program, Stmt, Type, TypeContext, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

/// Re-checks declarations after a modification
pub trait DeclValidator {
    /// A variable that became constexpr
    fn check_variable(&self, program: &Program, var: DeclId) -> Result<(), String>;

    /// A function that became constexpr
    fn check_constexpr_function(&self, program: &Program, function: DeclId) -> Result<(), String>;

    /// A member function that became pure virtual
    fn check_pure_method(&self, program: &Program, method: DeclId) -> Result<(), String>;
}

/// Receives namespace-scope declarations produced by an injection
pub trait DeclConsumer {
    /// Handle one top-level declaration
    fn handle_top_level_decl(&mut self, program: &Program, decl: DeclId);
}

/// Literal-type and body-shape checks
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicValidator;

impl BasicValidator {
    fn is_literal_type(program: &Program, ty: TypeId) -> bool {
        let ty = program.types.canonical(ty);
        match program.types.get(ty) {
            Some(Type::Primitive(_)) | Some(Type::Dependent) | Some(Type::TemplateParam(_)) => true,
            Some(Type::Record(class)) => program
                .fields(*class)
                .iter()
                .filter_map(|&f| program.decl(f).value_type())
                .all(|f| Self::is_literal_type(program, f)),
            _ => false,
        }
    }

    fn check_constexpr_stmt(stmt: &Stmt) -> Result<(), String> {
        match stmt {
            Stmt::Inject(_) => Err("injection statement in constexpr function".to_string()),
            Stmt::Block(stmts) => stmts.iter().try_for_each(Self::check_constexpr_stmt),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                Self::check_constexpr_stmt(then_branch)?;
                match else_branch {
                    Some(e) => Self::check_constexpr_stmt(e),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

impl DeclValidator for BasicValidator {
    fn check_variable(&self, program: &Program, var: DeclId) -> Result<(), String> {
        let name = program.name_of(var);
        let DeclKind::Var(data) = &program.decl(var).kind else {
            return Err(format!("'{}' is not a variable", name));
        };
        if !data.is_constexpr {
            return Ok(());
        }
        if !Self::is_literal_type(program, data.ty) {
            return Err(format!(
                "constexpr variable '{}' must have a literal type, not '{}'",
                name,
                program.type_name(data.ty)
            ));
        }
        if data.init.is_none() {
            return Err(format!("constexpr variable '{}' must be initialized", name));
        }
        Ok(())
    }

    fn check_constexpr_function(&self, program: &Program, function: DeclId) -> Result<(), String> {
        let decl = program.decl(function);
        let name = program.name_of(function);
        if let Some(m) = decl.kind.method() {
            if m.is_virtual {
                return Err(format!("virtual function '{}' cannot be constexpr", name));
            }
        }
        let Some(f) = decl.kind.function() else {
            return Err(format!("'{}' is not a function", name));
        };
        for &p in &f.params {
            if let Some(ty) = program.decl(p).value_type() {
                if !Self::is_literal_type(program, ty) {
                    return Err(format!(
                        "constexpr function '{}' has non-literal parameter type '{}'",
                        name,
                        program.type_name(ty)
                    ));
                }
            }
        }
        if f.ret != TypeContext::VOID && !Self::is_literal_type(program, f.ret) {
            return Err(format!(
                "constexpr function '{}' has non-literal return type '{}'",
                name,
                program.type_name(f.ret)
            ));
        }
        match &f.body {
            Some(body) => body.iter().try_for_each(Self::check_constexpr_stmt),
            None => Ok(()),
        }
    }

    fn check_pure_method(&self, program: &Program, method: DeclId) -> Result<(), String> {
        match program.decl(method).kind.method() {
            Some(m) if m.is_virtual => Ok(()),
            Some(_) => Err(format!(
                "'{}' is not virtual and cannot be declared pure",
                program.name_of(method)
            )),
            None => Err(format!("'{}' is not a member function", program.name_of(method))),
        }
    }
}

/// Records every handed-off declaration.
///
/// Clones share the same list, so a caller can keep one handle and give the
/// other to the session.
#[derive(Debug, Clone, Default)]
pub struct CollectingConsumer {
    decls: Rc<RefCell<Vec<DeclId>>>,
}

impl CollectingConsumer {
    /// An empty consumer
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarations received so far
    pub fn decls(&self) -> Vec<DeclId> {
        self.decls.borrow().clone()
    }
}

impl DeclConsumer for CollectingConsumer {
    fn handle_top_level_decl(&mut self, _program: &Program, decl: DeclId) {
        self.decls.borrow_mut().push(decl);
    }
}
