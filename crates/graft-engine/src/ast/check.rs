//! Consistency check for programs read from a snapshot
//!
//! The arena indexes declarations directly, so every id a deserialized
//! program carries is checked once before the engine walks it.

use super::decl::{Decl, DeclId, DeclKind, FunctionData, InitTarget, Program};
use super::expr::{Expr, Stmt};
use super::types::Type;
use crate::error::SnapshotError;
use crate::value::ConstValue;

/// Declaration ids reachable from one site
#[derive(Default)]
struct Refs(Vec<DeclId>);

impl Refs {
    fn decl(&mut self, decl: &Decl) {
        self.0.extend(decl.owner);
        self.0.extend(&decl.members);
        match &decl.kind {
            DeclKind::TranslationUnit | DeclKind::Namespace | DeclKind::TemplateTypeParam => {}
            DeclKind::Class(class) => self.0.extend(class.reflectee),
            DeclKind::Field(field) => self.opt_expr(field.init.as_ref()),
            DeclKind::Var(var) | DeclKind::Param(var) => self.opt_expr(var.init.as_ref()),
            DeclKind::Function(func) => self.function(func),
            DeclKind::Method(m) | DeclKind::Destructor(m) => self.function(&m.func),
            DeclKind::Constructor(m, inits) => {
                self.function(&m.func);
                for init in inits {
                    if let InitTarget::Field(field) = init.target {
                        self.0.push(field);
                    }
                    for arg in &init.args {
                        self.expr(arg);
                    }
                }
            }
            DeclKind::Fragment(fragment) => self.0.extend(fragment.content),
            DeclKind::StmtBlock(stmts) => self.stmts(stmts),
            DeclKind::Metaclass(meta) => self.0.push(meta.definition),
            DeclKind::Injection(injection) => self.expr(&injection.operand),
        }
    }

    fn function(&mut self, func: &FunctionData) {
        self.0.extend(&func.params);
        if let Some(body) = &func.body {
            self.stmts(body);
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.0.push(*decl),
            Stmt::Expr(expr) | Stmt::Inject(expr) => self.expr(expr),
            Stmt::Return(expr) => self.opt_expr(expr.as_ref()),
            Stmt::Block(stmts) => self.stmts(stmts),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch);
                }
            }
        }
    }

    fn opt_expr(&mut self, expr: Option<&Expr>) {
        if let Some(expr) = expr {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::IntLit(_) | Expr::BoolLit(_) | Expr::StrLit(_) | Expr::Opaque(_) => {}
            Expr::DeclRef { decl, .. } | Expr::Reflect { decl, .. } => self.0.push(*decl),
            Expr::ValueRead(inner) => self.expr(inner),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Member { base, field, .. } => {
                self.expr(base);
                self.0.push(*field);
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Modify { operand, .. } => self.expr(operand),
            Expr::Construct { ctor, args, .. } => {
                self.0.push(*ctor);
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Fragment {
                fragment,
                captures,
                init,
                ..
            } => {
                self.0.push(*fragment);
                for capture in captures {
                    self.expr(capture);
                }
                self.expr(init);
            }
            Expr::Constant { value, source, .. } => {
                self.value(value);
                self.expr(source);
            }
        }
    }

    fn value(&mut self, value: &ConstValue) {
        match value {
            ConstValue::Reflection(decl) => self.0.push(*decl),
            ConstValue::Struct { bases, fields } => {
                for v in bases.iter().chain(fields) {
                    self.value(v);
                }
            }
            _ => {}
        }
    }
}

impl Program {
    /// Check that every declaration id stored in the program, its types
    /// included, names one of its declarations
    pub fn validate(&self) -> Result<(), SnapshotError> {
        match self.iter().next() {
            Some((_, decl)) if matches!(decl.kind, DeclKind::TranslationUnit) => {}
            _ => return Err(SnapshotError::MissingTranslationUnit),
        }

        for (id, decl) in self.iter() {
            let mut refs = Refs::default();
            refs.decl(decl);
            self.check_refs(&refs, || format!("declaration {}", id))?;
        }

        for (id, ty) in self.types.iter() {
            let decl = match ty {
                Type::Record(decl) | Type::TemplateParam(decl) => *decl,
                _ => continue,
            };
            if !self.contains(decl) {
                return Err(SnapshotError::UnknownDecl {
                    site: format!("type {}", id.as_u32()),
                    decl,
                });
            }
        }
        Ok(())
    }

    /// Check an expression supplied alongside the program
    pub fn validate_expr(&self, site: &str, expr: &Expr) -> Result<(), SnapshotError> {
        let mut refs = Refs::default();
        refs.expr(expr);
        self.check_refs(&refs, || site.to_string())
    }

    fn check_refs(&self, refs: &Refs, site: impl Fn() -> String) -> Result<(), SnapshotError> {
        match refs.0.iter().find(|&&d| !self.contains(d)) {
            Some(&decl) => Err(SnapshotError::UnknownDecl { site: site(), decl }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{TypeContext, VarData};

    #[test]
    fn test_built_program_is_consistent() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let a = program.add_field(s, "a", TypeContext::INT, None);
        let get = program.add_method(s, "get", TypeContext::INT, &[("k", TypeContext::INT)]);
        let read = program.decl_ref(a).into_value();
        program.set_body(get, vec![Stmt::Return(Some(read))]);
        assert_eq!(program.validate(), Ok(()));
    }

    #[test]
    fn test_dangling_member_is_reported() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        program.decl_mut(s).members.push(DeclId::new(999));
        assert_eq!(
            program.validate(),
            Err(SnapshotError::UnknownDecl {
                site: format!("declaration {}", s),
                decl: DeclId::new(999),
            })
        );
    }

    #[test]
    fn test_dangling_reference_in_initializer_is_reported() {
        let mut program = Program::new();
        let init = Expr::DeclRef {
            decl: DeclId::new(40),
            ty: TypeContext::INT,
        };
        program.add_var(DeclId::TRANSLATION_UNIT, "v", VarData::new(TypeContext::INT, Some(init)));
        assert!(matches!(
            program.validate(),
            Err(SnapshotError::UnknownDecl { decl, .. }) if decl == DeclId::new(40)
        ));
    }

    #[test]
    fn test_dangling_record_type_is_reported() {
        let mut program = Program::new();
        program.types.record_type(DeclId::new(7));
        assert!(program.validate().is_err());
    }

    #[test]
    fn test_request_expression_is_checked() {
        let program = Program::new();
        let expr = Expr::Reflect {
            decl: DeclId::new(3),
            ty: TypeContext::VOID,
        };
        let err = program.validate_expr("request 0", &expr).unwrap_err();
        assert_eq!(err.to_string(), "request 0 refers to unknown declaration #3");
    }
}
