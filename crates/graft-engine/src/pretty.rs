//! Pretty-printing for programs
//!
//! Renders declarations, statements and expressions in a C++-like surface
//! syntax for dumps and the CLI. Constants print their value, followed by the
//! expression they replaced as a comment.

use crate::ast::{
    Access, CtorInit, DeclId, DeclKind, Expr, InitTarget, Program, Stmt, TypeId,
};
use std::fmt::{self, Write};

const INDENT: &str = "  ";

/// Printer over a program
pub struct Printer<'p> {
    program: &'p Program,
    out: String,
    depth: usize,
}

impl<'p> Printer<'p> {
    /// Create a printer
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            out: String::new(),
            depth: 0,
        }
    }

    /// Print the whole translation unit
    pub fn print_program(program: &Program) -> String {
        Printer::new(program).decl(DeclId::TRANSLATION_UNIT)
    }

    /// Print one declaration and everything it owns
    pub fn decl(mut self, id: DeclId) -> String {
        // Writing into a String never fails
        let _ = self.write_decl(id);
        self.out
    }

    /// Print one expression
    pub fn expr(mut self, expr: &Expr) -> String {
        let _ = self.write_expr(expr);
        self.out
    }

    /// Print one type
    pub fn ty(&self, ty: TypeId) -> String {
        self.program.type_name(ty)
    }

    fn indent(&mut self) -> fmt::Result {
        for _ in 0..self.depth {
            self.out.write_str(INDENT)?;
        }
        Ok(())
    }

    fn name(&self, id: DeclId) -> String {
        let name = self.program.name_of(id);
        if name.is_empty() {
            format!("<anonymous {}>", id)
        } else {
            name.to_string()
        }
    }

    fn write_prefix(&mut self, id: DeclId) -> fmt::Result {
        let decl = self.program.decl(id);
        for attr in &decl.attrs {
            write!(self.out, "[[{}]] ", self.program.interner.resolve(*attr))?;
        }
        if decl.access != Access::None {
            write!(self.out, "{} ", decl.access)?;
        }
        Ok(())
    }

    fn write_members(&mut self, id: DeclId) -> fmt::Result {
        self.depth += 1;
        let members = self.program.decl(id).members.clone();
        for member in members {
            self.write_decl(member)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn write_decl(&mut self, id: DeclId) -> fmt::Result {
        let program = self.program;
        let decl = program.decl(id);

        if let DeclKind::TranslationUnit = decl.kind {
            for &member in &decl.members {
                self.write_decl(member)?;
            }
            return Ok(());
        }

        self.indent()?;
        self.write_prefix(id)?;
        match &decl.kind {
            DeclKind::TranslationUnit => {}
            DeclKind::Namespace => {
                writeln!(self.out, "namespace {} {{", self.name(id))?;
                self.write_members(id)?;
                self.indent()?;
                writeln!(self.out, "}}")?;
            }
            DeclKind::Class(c) => {
                write!(self.out, "class {}", self.name(id))?;
                if !c.bases.is_empty() {
                    let bases: Vec<String> = c.bases.iter().map(|&b| self.ty(b)).collect();
                    write!(self.out, " : {}", bases.join(", "))?;
                }
                writeln!(self.out, " {{")?;
                self.write_members(id)?;
                self.indent()?;
                writeln!(self.out, "}};")?;
            }
            DeclKind::Field(f) => {
                if f.is_mutable {
                    self.out.write_str("mutable ")?;
                }
                write!(self.out, "{} {}", self.ty(f.ty), self.name(id))?;
                if let Some(init) = &f.init {
                    self.out.write_str(" = ")?;
                    self.write_expr(init)?;
                }
                writeln!(self.out, ";")?;
            }
            DeclKind::Var(v) | DeclKind::Param(v) => {
                if v.is_static {
                    self.out.write_str("static ")?;
                }
                if v.is_constexpr {
                    self.out.write_str("constexpr ")?;
                }
                write!(self.out, "{} {}", self.ty(v.ty), self.name(id))?;
                if let Some(init) = &v.init {
                    self.out.write_str(" = ")?;
                    self.write_expr(init)?;
                }
                writeln!(self.out, ";")?;
            }
            DeclKind::Function(_)
            | DeclKind::Method(_)
            | DeclKind::Constructor(..)
            | DeclKind::Destructor(_) => self.write_function(id)?,
            DeclKind::TemplateTypeParam => {
                writeln!(self.out, "typename {};", self.name(id))?;
            }
            DeclKind::Fragment(f) => {
                writeln!(self.out, "fragment {} {{", id)?;
                self.depth += 1;
                match f.content {
                    Some(content) => self.write_decl(content)?,
                    None => {
                        self.indent()?;
                        writeln!(self.out, "<empty>")?;
                    }
                }
                self.depth -= 1;
                self.indent()?;
                writeln!(self.out, "}}")?;
            }
            DeclKind::StmtBlock(stmts) => {
                writeln!(self.out, "{{")?;
                self.write_block_body(stmts)?;
                self.indent()?;
                writeln!(self.out, "}}")?;
            }
            DeclKind::Metaclass(m) => {
                writeln!(self.out, "metaclass {} {{", self.name(id))?;
                self.depth += 1;
                let members = program.decl(m.definition).members.clone();
                for member in members {
                    self.write_decl(member)?;
                }
                self.depth -= 1;
                self.indent()?;
                writeln!(self.out, "}};")?;
            }
            DeclKind::Injection(data) => {
                self.out.write_str("consteval -> ")?;
                self.write_expr(&data.operand)?;
                writeln!(self.out, ";")?;
            }
        }
        Ok(())
    }

    fn write_function(&mut self, id: DeclId) -> fmt::Result {
        let program = self.program;
        let kind = &program.decl(id).kind;
        let Some(func) = kind.function() else {
            return Ok(());
        };

        if let Some(m) = kind.method() {
            if m.is_static {
                self.out.write_str("static ")?;
            }
            if m.is_virtual {
                self.out.write_str("virtual ")?;
            }
            if m.is_explicit {
                self.out.write_str("explicit ")?;
            }
        }
        if func.is_constexpr {
            self.out.write_str("constexpr ")?;
        }
        match kind {
            DeclKind::Constructor(..) => {
                let class = program.owner(id).map(|c| self.name(c)).unwrap_or_default();
                write!(self.out, "{}(", class)?;
            }
            DeclKind::Destructor(_) => write!(self.out, "{}(", self.name(id))?,
            _ => write!(self.out, "{} {}(", self.ty(func.ret), self.name(id))?,
        }
        let params: Vec<String> = func
            .params
            .iter()
            .map(|&p| {
                let ty = program.decl(p).value_type().map(|t| self.ty(t)).unwrap_or_default();
                format!("{} {}", ty, self.name(p))
            })
            .collect();
        write!(self.out, "{})", params.join(", "))?;

        if let DeclKind::Constructor(_, inits) = kind {
            self.write_ctor_inits(inits)?;
        }
        if let Some(m) = kind.method() {
            if m.is_pure {
                self.out.write_str(" = 0")?;
            } else if m.is_defaulted {
                self.out.write_str(" = default")?;
            } else if m.is_deleted {
                self.out.write_str(" = delete")?;
            }
        }

        match &func.body {
            Some(body) => {
                writeln!(self.out, " {{")?;
                self.write_block_body(body)?;
                self.indent()?;
                writeln!(self.out, "}}")
            }
            None => writeln!(self.out, ";"),
        }
    }

    fn write_ctor_inits(&mut self, inits: &[CtorInit]) -> fmt::Result {
        for (i, init) in inits.iter().enumerate() {
            self.out.write_str(if i == 0 { " : " } else { ", " })?;
            match init.target {
                InitTarget::Base(ty) => self.out.write_str(&self.ty(ty))?,
                InitTarget::Field(field) => self.out.write_str(&self.name(field))?,
            }
            self.out.write_char('(')?;
            self.write_args(&init.args)?;
            self.out.write_char(')')?;
        }
        Ok(())
    }

    fn write_block_body(&mut self, stmts: &[Stmt]) -> fmt::Result {
        self.depth += 1;
        for stmt in stmts {
            self.write_stmt(stmt)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn write_stmt(&mut self, stmt: &Stmt) -> fmt::Result {
        match stmt {
            // Declarations indent themselves
            Stmt::Decl(id) => self.write_decl(*id),
            Stmt::Expr(e) => {
                self.indent()?;
                self.write_expr(e)?;
                writeln!(self.out, ";")
            }
            Stmt::Return(value) => {
                self.indent()?;
                self.out.write_str("return")?;
                if let Some(e) = value {
                    self.out.write_char(' ')?;
                    self.write_expr(e)?;
                }
                writeln!(self.out, ";")
            }
            Stmt::Block(stmts) => {
                self.indent()?;
                writeln!(self.out, "{{")?;
                self.write_block_body(stmts)?;
                self.indent()?;
                writeln!(self.out, "}}")
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.indent()?;
                self.out.write_str("if (")?;
                self.write_expr(cond)?;
                writeln!(self.out, ")")?;
                self.write_nested(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.indent()?;
                    writeln!(self.out, "else")?;
                    self.write_nested(else_branch)?;
                }
                Ok(())
            }
            Stmt::Inject(e) => {
                self.indent()?;
                self.out.write_str("-> ")?;
                self.write_expr(e)?;
                writeln!(self.out, ";")
            }
        }
    }

    fn write_nested(&mut self, stmt: &Stmt) -> fmt::Result {
        if matches!(stmt, Stmt::Block(_)) {
            return self.write_stmt(stmt);
        }
        self.depth += 1;
        self.write_stmt(stmt)?;
        self.depth -= 1;
        Ok(())
    }

    fn write_args(&mut self, args: &[Expr]) -> fmt::Result {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            self.write_expr(arg)?;
        }
        Ok(())
    }

    fn write_expr(&mut self, expr: &Expr) -> fmt::Result {
        match expr {
            Expr::IntLit(v) => write!(self.out, "{}", v),
            Expr::BoolLit(b) => write!(self.out, "{}", b),
            Expr::StrLit(s) => write!(self.out, "{:?}", s),
            Expr::DeclRef { decl, .. } => self.out.write_str(&self.name(*decl)),
            Expr::ValueRead(inner) => self.write_expr(inner),
            Expr::Binary { op, lhs, rhs } => {
                self.out.write_char('(')?;
                self.write_expr(lhs)?;
                write!(self.out, " {} ", op.as_str())?;
                self.write_expr(rhs)?;
                self.out.write_char(')')
            }
            Expr::Member { base, field, .. } => {
                self.write_expr(base)?;
                write!(self.out, ".{}", self.name(*field))
            }
            Expr::Call { callee, args, .. } => {
                self.write_expr(callee)?;
                self.out.write_char('(')?;
                self.write_args(args)?;
                self.out.write_char(')')
            }
            Expr::Reflect { decl, .. } => write!(self.out, "reflexpr({})", self.name(*decl)),
            Expr::Modify { operand, mods, .. } => {
                self.write_expr(operand)?;
                write!(self.out, " /* mods: {:?} */", mods)
            }
            Expr::Construct { ty, args, .. } => {
                self.out.write_str(&self.ty(*ty))?;
                self.out.write_char('(')?;
                self.write_args(args)?;
                self.out.write_char(')')
            }
            Expr::Fragment {
                fragment, captures, ..
            } => {
                write!(self.out, "fragment {}", fragment)?;
                if !captures.is_empty() {
                    self.out.write_str(" [")?;
                    self.write_args(captures)?;
                    self.out.write_char(']')?;
                }
                Ok(())
            }
            Expr::Constant { value, source, .. } => {
                write!(self.out, "{} /* ", value)?;
                self.write_expr(source)?;
                self.out.write_str(" */")
            }
            Expr::Opaque(ty) => write!(self.out, "<opaque {}>", self.ty(*ty)),
        }
    }
}

/// `Display` adapter for a declaration
pub struct DisplayDecl<'p> {
    program: &'p Program,
    id: DeclId,
}

impl<'p> DisplayDecl<'p> {
    /// Wrap a declaration for display
    pub fn new(program: &'p Program, id: DeclId) -> Self {
        Self { program, id }
    }
}

impl fmt::Display for DisplayDecl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::new(self.program).decl(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, TypeContext, VarData};
    use crate::value::ConstValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_class_with_members() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        program.add_field(s, "a", TypeContext::INT, Some(Expr::IntLit(1)));
        let get = program.add_method(s, "get", TypeContext::INT, &[("k", TypeContext::INT)]);
        program.set_body(get, vec![Stmt::Return(Some(Expr::IntLit(0)))]);

        assert_eq!(
            Printer::print_program(&program),
            "class S {\n  public int a = 1;\n  public int get(int k) {\n    return 0;\n  }\n};\n"
        );
    }

    #[test]
    fn test_namespace_and_static_var() {
        let mut program = Program::new();
        let ns = program.add_namespace(DeclId::TRANSLATION_UNIT, "n");
        let mut data = VarData::new(TypeContext::BOOL, Some(Expr::BoolLit(true)));
        data.is_static = true;
        program.add_var(ns, "flag", data);

        assert_eq!(
            DisplayDecl::new(&program, ns).to_string(),
            "namespace n {\n  static bool flag = true;\n}\n"
        );
    }

    #[test]
    fn test_constant_prints_value_and_source() {
        let mut program = Program::new();
        let x = program.add_var(
            DeclId::TRANSLATION_UNIT,
            "x",
            VarData::new(TypeContext::INT, None),
        );
        let source = program.decl_ref(x).into_value();
        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::Constant {
                value: ConstValue::Int(6),
                ty: TypeContext::INT,
                source: Box::new(source),
            },
            Expr::IntLit(1),
        );

        assert_eq!(Printer::new(&program).expr(&expr), "(6 /* x */ + 1)");
    }

    #[test]
    fn test_pure_virtual_method() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let f = program.add_method(s, "f", TypeContext::VOID, &[]);
        if let Some(m) = program.decl_mut(f).kind.method_mut() {
            m.is_virtual = true;
            m.is_pure = true;
        }
        assert_eq!(
            Printer::new(&program).decl(f),
            "public virtual void f() = 0;\n"
        );
    }
}
