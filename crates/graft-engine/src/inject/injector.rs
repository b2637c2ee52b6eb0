//! Declaration cloner
//!
//! Clones a subtree of declarations into a new context. Every declaration
//! reference met while cloning is resolved by one policy:
//!
//! 1. already cloned in this injection: use the clone
//! 2. declared inside the source subtree: clone it now
//! 3. declared by the source's own owner: look the name up in the destination
//! 4. anything else: keep the reference
//!
//! Step 3 always prefers the destination's member over the original, even
//! when the original would also be a valid referent.

use crate::ast::{
    Access, CtorInit, Decl, DeclId, DeclKind, Expr, FunctionData, InitTarget, MethodData, Program,
    Stmt, Type, TypeId, VarData,
};
use crate::config::FallbackPolicy;
use crate::error::{ErrorCode, InjectError};
use crate::session::{EvalContextKind, Session};
use crate::value::{ConstValue, TypedValue};
use log::{debug, trace};
use rustc_hash::FxHashMap;

/// Original declaration to clone, per injection
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    map: FxHashMap<DeclId, DeclId>,
}

impl RemapTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` is replaced by `to`.
    ///
    /// Returns false, leaving the table unchanged, when `from` is already
    /// mapped.
    pub fn insert(&mut self, from: DeclId, to: DeclId) -> bool {
        if self.map.contains_key(&from) {
            return false;
        }
        trace!("remap {} -> {}", from, to);
        self.map.insert(from, to);
        true
    }

    /// The replacement of `from`
    pub fn get(&self, from: DeclId) -> Option<DeclId> {
        self.map.get(&from).copied()
    }

    /// Whether `from` has a replacement
    pub fn contains(&self, from: DeclId) -> bool {
        self.map.contains_key(&from)
    }

    /// Number of mappings
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All mappings, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (DeclId, DeclId)> + '_ {
        self.map.iter().map(|(k, v)| (*k, *v))
    }
}

/// State of one injection
#[derive(Debug, Clone)]
pub struct InjectionContext {
    /// The context whose descendants are cloned; `None` when only the
    /// injected declaration itself is local
    pub source: Option<DeclId>,
    /// The context receiving the clones
    pub dest: DeclId,
    /// Clones made so far
    pub remap: RemapTable,
    /// Captured values replacing references to placeholders
    pub placeholders: FxHashMap<DeclId, TypedValue>,
}

impl InjectionContext {
    /// A fresh injection from `source` into `dest`
    pub fn new(source: Option<DeclId>, dest: DeclId) -> Self {
        Self {
            source,
            dest,
            remap: RemapTable::new(),
            placeholders: FxHashMap::default(),
        }
    }

    /// Replace references to `from` with references to `to`
    pub fn add_substitution(&mut self, from: DeclId, to: DeclId) -> bool {
        self.remap.insert(from, to)
    }

    /// Register the captured values of a fragment.
    ///
    /// Placeholders, the fields of the fragment class and the captured values
    /// correspond by position.
    pub fn add_replacements(
        &mut self,
        program: &Program,
        fragment: DeclId,
        class: DeclId,
        captures: &[ConstValue],
    ) {
        let placeholders = crate::capture::placeholders(program, fragment);
        let fields = program.fields(class);
        for ((placeholder, field), value) in placeholders.iter().zip(&fields).zip(captures) {
            let ty = program
                .decl(*field)
                .value_type()
                .unwrap_or(crate::ast::TypeContext::DEPENDENT);
            self.placeholders
                .insert(*placeholder, TypedValue::new(ty, value.clone()));
        }
    }
}

/// How a declaration reference is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Already cloned (or substituted)
    Remapped(DeclId),
    /// Part of the cloned subtree; clone it
    Local,
    /// Declared next to the source; look it up in the destination
    Sibling,
    /// Outside the injection; reuse it
    External,
}

/// Whether `decl` is inside `source` without crossing a fragment
fn is_local(program: &Program, decl: DeclId, source: DeclId) -> bool {
    let mut cur = program.owner(decl);
    while let Some(dc) = cur {
        if dc == source {
            return true;
        }
        if matches!(program.decl(dc).kind, DeclKind::Fragment(_)) {
            return false;
        }
        cur = program.owner(dc);
    }
    false
}

/// Decide how a reference to `decl` is resolved
pub fn classify(program: &Program, cx: &InjectionContext, decl: DeclId) -> Resolution {
    if let Some(clone) = cx.remap.get(decl) {
        return Resolution::Remapped(clone);
    }
    if matches!(program.decl(decl).kind, DeclKind::Fragment(_)) {
        return Resolution::External;
    }
    if let Some(source) = cx.source {
        if is_local(program, decl, source) {
            return Resolution::Local;
        }
        let parent = program.owner(source);
        if parent.is_some() && program.owner(decl) == parent {
            return Resolution::Sibling;
        }
    }
    Resolution::External
}

/// Clones declarations, types, expressions and statements for one injection
pub struct Injector<'s> {
    session: &'s mut Session,
}

impl<'s> Injector<'s> {
    /// An injector working on `session`
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    fn program(&self) -> &Program {
        &self.session.program
    }

    fn program_mut(&mut self) -> &mut Program {
        &mut self.session.program
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Resolve a declaration reference
    pub fn resolve_decl(&mut self, cx: &mut InjectionContext, decl: DeclId) -> Result<DeclId, InjectError> {
        match classify(self.program(), cx, decl) {
            Resolution::Remapped(clone) => Ok(clone),
            Resolution::Local => self.inject_decl(cx, decl),
            Resolution::Sibling => self.lookup_in_dest(cx, decl),
            Resolution::External => Ok(decl),
        }
    }

    /// Find the destination's member named like `decl`
    fn lookup_in_dest(&mut self, cx: &InjectionContext, decl: DeclId) -> Result<DeclId, InjectError> {
        let program = self.program();
        let d = program.decl(decl);
        let Some(name) = d.name else {
            return Ok(decl);
        };
        let name_str = program.interner.resolve(name).to_string();
        let found = program.lookup(cx.dest, name);
        debug!(
            "sibling reference to '{}' resolved by lookup in {}: {} candidate(s)",
            name_str,
            cx.dest,
            found.len()
        );

        match found.as_slice() {
            [] => {}
            [single] => return Ok(*single),
            _ => {
                return Err(InjectError::AmbiguousLookup {
                    name: name_str,
                    candidates: found.len(),
                })
            }
        }

        if d.is_instance_member() {
            let member = if matches!(d.kind, DeclKind::Field(_)) { 1 } else { 0 };
            return Err(InjectError::NonStaticCapture {
                name: name_str,
                member,
            });
        }

        let is_static_member = d.owner.is_some_and(|o| program.decl(o).is_record())
            && matches!(d.kind, DeclKind::Var(_) | DeclKind::Method(_));
        if !is_static_member {
            return Ok(decl);
        }

        let loc = d.loc;
        match self.session.config().static_capture_fallback {
            FallbackPolicy::Reuse => {
                self.session.warn(
                    ErrorCode::CAPTURE_FALLBACK,
                    format!(
                        "'{}' is not declared in the injection target; keeping the reference to the original static member",
                        name_str
                    ),
                    loc,
                );
                Ok(decl)
            }
            FallbackPolicy::Reject => Err(InjectError::UnresolvedReference { name: name_str }),
        }
    }

    /// Clone `decl` into the destination, once per injection.
    ///
    /// Failures inside the clone (its type, initializer, body or members) are
    /// reported and leave the clone marked invalid; only declarations that
    /// cannot be cloned at all, and fatal errors, are returned as errors.
    pub fn inject_decl(&mut self, cx: &mut InjectionContext, decl: DeclId) -> Result<DeclId, InjectError> {
        if let Some(clone) = cx.remap.get(decl) {
            return Ok(clone);
        }
        let original = self.program().decl(decl).clone();
        match &original.kind {
            DeclKind::TranslationUnit | DeclKind::Metaclass(_) => {
                return Err(InjectError::UnsupportedDecl {
                    kind: original.kind.describe(),
                })
            }
            DeclKind::Fragment(_) => return Err(InjectError::NestedFragment),
            _ => {}
        }

        // A member of a nested context that has not been cloned yet comes
        // along with its owner
        if let (Some(source), Some(owner)) = (cx.source, original.owner) {
            if owner != source && !cx.remap.contains(owner) && is_local(self.program(), owner, source) {
                self.inject_decl(cx, owner)?;
                if let Some(clone) = cx.remap.get(decl) {
                    return Ok(clone);
                }
            }
        }

        let owner = original
            .owner
            .map(|o| cx.remap.get(o).unwrap_or_else(|| self.session.current_context()));
        let attached = self.program().is_attached(decl);
        let owner_is_record = owner.is_some_and(|o| self.program().decl(o).is_record());

        let mut clone = Decl::new(original.name, original.kind.clone(), owner);
        clone.members = Vec::new();
        clone.access = match (owner_is_record, original.access) {
            (false, _) => Access::None,
            (true, Access::None) => Access::Public,
            (true, access) => access,
        };
        clone.flags = original.flags;
        clone.flags.placeholder = false;
        clone.attrs = original.attrs.clone();
        clone.loc = original.loc;

        let id = self.program_mut().alloc(clone);
        cx.remap.insert(decl, id);
        if let (true, Some(owner)) = (attached, owner) {
            self.program_mut().add_member(owner, id);
        }
        debug!(
            "cloned {} '{}' {} -> {}",
            original.kind.describe(),
            self.program().name_of(decl),
            decl,
            id
        );

        match self.transform_kind(cx, &original.kind) {
            Ok(kind) => self.program_mut().decl_mut(id).kind = kind,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.session.report(&e, original.loc);
                self.program_mut().decl_mut(id).flags.invalid = true;
            }
        }

        for member in original.members {
            match self.inject_decl(cx, member) {
                Ok(clone) => {
                    if self.program().decl(clone).flags.invalid {
                        self.program_mut().decl_mut(id).flags.invalid = true;
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let loc = self.program().decl(member).loc;
                    self.session.report(&e, loc);
                    self.program_mut().decl_mut(id).flags.invalid = true;
                }
            }
        }

        Ok(id)
    }

    fn transform_kind(&mut self, cx: &mut InjectionContext, kind: &DeclKind) -> Result<DeclKind, InjectError> {
        Ok(match kind {
            DeclKind::Class(c) => {
                let mut c = c.clone();
                c.bases = c
                    .bases
                    .iter()
                    .map(|&b| self.transform_type(cx, b))
                    .collect::<Result<_, _>>()?;
                DeclKind::Class(c)
            }
            DeclKind::Field(f) => {
                let mut f = f.clone();
                f.ty = self.transform_type(cx, f.ty)?;
                f.init = self.transform_opt_expr(cx, f.init.as_ref())?;
                DeclKind::Field(f)
            }
            DeclKind::Var(v) => DeclKind::Var(self.transform_var(cx, v)?),
            DeclKind::Param(v) => DeclKind::Param(self.transform_var(cx, v)?),
            DeclKind::Function(f) => DeclKind::Function(self.transform_function(cx, f)?),
            DeclKind::Method(m) => DeclKind::Method(self.transform_method(cx, m)?),
            DeclKind::Destructor(m) => DeclKind::Destructor(self.transform_method(cx, m)?),
            DeclKind::Constructor(m, inits) => {
                let m = self.transform_method(cx, m)?;
                let inits = inits
                    .iter()
                    .map(|init| self.transform_ctor_init(cx, init))
                    .collect::<Result<_, _>>()?;
                DeclKind::Constructor(m, inits)
            }
            DeclKind::StmtBlock(stmts) => DeclKind::StmtBlock(self.inject_statements(cx, stmts)?),
            DeclKind::Injection(data) => {
                let mut data = data.clone();
                data.operand = self.transform_expr(cx, &data.operand)?;
                DeclKind::Injection(data)
            }
            other => other.clone(),
        })
    }

    fn transform_var(&mut self, cx: &mut InjectionContext, v: &VarData) -> Result<VarData, InjectError> {
        let mut v = v.clone();
        v.ty = self.transform_type(cx, v.ty)?;
        v.init = self.transform_opt_expr(cx, v.init.as_ref())?;
        Ok(v)
    }

    fn transform_function(&mut self, cx: &mut InjectionContext, f: &FunctionData) -> Result<FunctionData, InjectError> {
        let mut out = f.clone();
        out.params = f
            .params
            .iter()
            .map(|&p| self.inject_decl(cx, p))
            .collect::<Result<_, _>>()?;
        out.ret = self.transform_type(cx, f.ret)?;
        out.body = match &f.body {
            Some(body) => Some(self.inject_statements(cx, body)?),
            None => None,
        };
        Ok(out)
    }

    fn transform_method(&mut self, cx: &mut InjectionContext, m: &MethodData) -> Result<MethodData, InjectError> {
        let mut out = m.clone();
        out.func = self.transform_function(cx, &m.func)?;
        Ok(out)
    }

    fn transform_ctor_init(&mut self, cx: &mut InjectionContext, init: &CtorInit) -> Result<CtorInit, InjectError> {
        let target = match &init.target {
            InitTarget::Base(ty) => InitTarget::Base(self.transform_type(cx, *ty)?),
            InitTarget::Field(f) => InitTarget::Field(self.resolve_decl(cx, *f)?),
        };
        let args = init
            .args
            .iter()
            .map(|a| self.transform_expr(cx, a))
            .collect::<Result<_, _>>()?;
        Ok(CtorInit { target, args })
    }

    /// Clone a field as a static variable, or a member function as a static
    /// member function, owned by the current context. Other declarations are
    /// cloned unchanged. The original is never modified.
    pub fn rewrite_as_static_member(
        &mut self,
        cx: &mut InjectionContext,
        decl: DeclId,
    ) -> Result<DeclId, InjectError> {
        let original = self.program().decl(decl).clone();
        match &original.kind {
            DeclKind::Field(field) => {
                let owner = self.session.current_context();
                let ty = self.transform_type(cx, field.ty)?;
                let mut data = VarData::new(ty, None);
                data.is_static = true;

                let mut var = Decl::new(original.name, DeclKind::Var(data), Some(owner));
                var.access = if self.program().decl(owner).is_record() {
                    original.access
                } else {
                    Access::None
                };
                var.attrs = original.attrs.clone();
                var.loc = original.loc;
                let id = self.program_mut().alloc(var);
                cx.remap.insert(decl, id);
                self.program_mut().add_member(owner, id);
                debug!("rewrote field {} as static variable {}", decl, id);

                if let Some(init) = &field.init {
                    let init = self
                        .session
                        .with_eval_context(EvalContextKind::ConstantEvaluated, |s| {
                            s.with_context(owner, |s| Injector::new(s).transform_expr(cx, init))
                        });
                    match init {
                        Ok(init) => {
                            if let DeclKind::Var(v) = &mut self.program_mut().decl_mut(id).kind {
                                v.init = Some(init);
                            }
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            self.session.report(&e, original.loc);
                            self.program_mut().decl_mut(id).flags.invalid = true;
                        }
                    }
                }
                Ok(id)
            }
            DeclKind::Method(_) => {
                let id = self.inject_decl(cx, decl)?;
                if let DeclKind::Method(m) = &mut self.program_mut().decl_mut(id).kind {
                    m.is_static = true;
                }
                Ok(id)
            }
            _ => self.inject_decl(cx, decl),
        }
    }

    /// Copy the attributes of `from` onto `to`, skipping ones already present
    pub fn transform_attributes(&mut self, from: DeclId, to: DeclId) {
        let attrs = self.program().decl(from).attrs.clone();
        let target = &mut self.program_mut().decl_mut(to).attrs;
        for attr in attrs {
            if !target.contains(&attr) {
                target.push(attr);
            }
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Transform a type. Reflected types are replaced by their canonical
    /// type, so no clone refers to a reflected name.
    pub fn transform_type(&mut self, cx: &mut InjectionContext, ty: TypeId) -> Result<TypeId, InjectError> {
        let Some(t) = self.program().types.get(ty).cloned() else {
            return Ok(ty);
        };
        match t {
            Type::Reflected { underlying, .. } => self.transform_type(cx, underlying),
            Type::Record(class) => {
                let class = self.resolve_decl(cx, class)?;
                Ok(self.program_mut().types.record_type(class))
            }
            Type::TemplateParam(param) => match cx.remap.get(param) {
                Some(arg) if self.program().decl(arg).is_record() => {
                    Ok(self.program_mut().types.record_type(arg))
                }
                Some(_) => Err(InjectError::InvalidTemplateSubstitution {
                    name: self.program().name_of(param).to_string(),
                }),
                None => Ok(ty),
            },
            Type::Function { params, ret } => {
                let params = params
                    .iter()
                    .map(|&p| self.transform_type(cx, p))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret = self.transform_type(cx, ret)?;
                Ok(self.program_mut().types.function_type(params, ret))
            }
            Type::Primitive(_) | Type::Dependent => Ok(ty),
        }
    }

    // ========================================================================
    // Expressions and statements
    // ========================================================================

    fn transform_opt_expr(&mut self, cx: &mut InjectionContext, expr: Option<&Expr>) -> Result<Option<Expr>, InjectError> {
        expr.map(|e| self.transform_expr(cx, e)).transpose()
    }

    fn transform_exprs(&mut self, cx: &mut InjectionContext, exprs: &[Expr]) -> Result<Vec<Expr>, InjectError> {
        exprs.iter().map(|e| self.transform_expr(cx, e)).collect()
    }

    /// Transform an expression. References to registered placeholders become
    /// constants holding the captured value.
    pub fn transform_expr(&mut self, cx: &mut InjectionContext, expr: &Expr) -> Result<Expr, InjectError> {
        Ok(match expr {
            Expr::IntLit(_) | Expr::BoolLit(_) | Expr::StrLit(_) | Expr::Constant { .. } => expr.clone(),
            Expr::Opaque(ty) => Expr::Opaque(self.transform_type(cx, *ty)?),
            Expr::DeclRef { decl, ty } => {
                if let Some(captured) = cx.placeholders.get(decl) {
                    return Ok(Expr::Constant {
                        value: captured.value.clone(),
                        ty: captured.ty,
                        source: Box::new(expr.clone()),
                    });
                }
                Expr::DeclRef {
                    decl: self.resolve_decl(cx, *decl)?,
                    ty: self.transform_type(cx, *ty)?,
                }
            }
            Expr::ValueRead(inner) => match self.transform_expr(cx, inner)? {
                constant @ Expr::Constant { .. } => constant,
                inner => Expr::ValueRead(Box::new(inner)),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(self.transform_expr(cx, lhs)?),
                rhs: Box::new(self.transform_expr(cx, rhs)?),
            },
            Expr::Member { base, field, ty } => Expr::Member {
                base: Box::new(self.transform_expr(cx, base)?),
                field: self.resolve_decl(cx, *field)?,
                ty: self.transform_type(cx, *ty)?,
            },
            Expr::Call { callee, args, ty } => Expr::Call {
                callee: Box::new(self.transform_expr(cx, callee)?),
                args: self.transform_exprs(cx, args)?,
                ty: self.transform_type(cx, *ty)?,
            },
            Expr::Reflect { decl, .. } => {
                let decl = self.resolve_decl(cx, *decl)?;
                self.program_mut().build_reflection(decl)
            }
            Expr::Modify { operand, mods, .. } => {
                let operand = self.transform_expr(cx, operand)?;
                self.program_mut().build_modify(operand, *mods)
            }
            Expr::Construct { ty, ctor, args, style } => Expr::Construct {
                ty: self.transform_type(cx, *ty)?,
                ctor: self.resolve_decl(cx, *ctor)?,
                args: self.transform_exprs(cx, args)?,
                style: *style,
            },
            // The fragment and its class stay where they are; only the
            // captured reads move
            Expr::Fragment {
                fragment,
                captures,
                init,
                ty,
            } => {
                let captures = self.transform_exprs(cx, captures)?;
                let init = match init.as_ref() {
                    Expr::Construct { ty, ctor, style, .. } => Expr::Construct {
                        ty: *ty,
                        ctor: *ctor,
                        args: captures.clone(),
                        style: *style,
                    },
                    other => other.clone(),
                };
                Expr::Fragment {
                    fragment: *fragment,
                    captures,
                    init: Box::new(init),
                    ty: *ty,
                }
            }
        })
    }

    /// Transform a statement
    pub fn transform_stmt(&mut self, cx: &mut InjectionContext, stmt: &Stmt) -> Result<Stmt, InjectError> {
        Ok(match stmt {
            Stmt::Decl(d) => Stmt::Decl(self.inject_decl(cx, *d)?),
            Stmt::Expr(e) => Stmt::Expr(self.transform_expr(cx, e)?),
            Stmt::Return(e) => Stmt::Return(self.transform_opt_expr(cx, e.as_ref())?),
            Stmt::Block(stmts) => Stmt::Block(self.inject_statements(cx, stmts)?),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => Stmt::If {
                cond: self.transform_expr(cx, cond)?,
                then_branch: Box::new(self.transform_stmt(cx, then_branch)?),
                else_branch: match else_branch {
                    Some(e) => Some(Box::new(self.transform_stmt(cx, e)?)),
                    None => None,
                },
            },
            Stmt::Inject(e) => Stmt::Inject(self.transform_expr(cx, e)?),
        })
    }

    /// Transform a statement list; declarations in it are cloned
    pub fn inject_statements(&mut self, cx: &mut InjectionContext, stmts: &[Stmt]) -> Result<Vec<Stmt>, InjectError> {
        stmts.iter().map(|s| self.transform_stmt(cx, s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, TypeContext};
    use crate::error::Severity;
    use pretty_assertions::assert_eq;

    /// `struct S { int a; static int s; int get() { return a; } };` plus an
    /// empty `struct T { int a; };`
    fn two_classes() -> (Session, DeclId, DeclId, DeclId, DeclId) {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let a = program.add_field(s, "a", TypeContext::INT, None);
        let get = program.add_method(s, "get", TypeContext::INT, &[]);
        let read_a = program.decl_ref(a).into_value();
        program.set_body(get, vec![Stmt::Return(Some(read_a))]);
        let t = program.add_class(DeclId::TRANSLATION_UNIT, "T");
        program.add_field(t, "a", TypeContext::INT, None);
        (Session::new(program), s, a, get, t)
    }

    fn returned_decl(program: &Program, function: DeclId) -> Option<DeclId> {
        match program.decl(function).kind.function()?.body.as_ref()?.first()? {
            Stmt::Return(Some(e)) => e.referenced_decl(),
            _ => None,
        }
    }

    #[test]
    fn test_remap_table_refuses_second_mapping() {
        let mut table = RemapTable::new();
        assert!(table.insert(DeclId::new(1), DeclId::new(2)));
        assert!(!table.insert(DeclId::new(1), DeclId::new(3)));
        assert_eq!(table.get(DeclId::new(1)), Some(DeclId::new(2)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_classification() {
        let (session, s, a, get, t) = two_classes();
        let program = &session.program;
        let cx = InjectionContext::new(Some(get), t);
        assert_eq!(classify(program, &cx, a), Resolution::Sibling);
        assert_eq!(classify(program, &cx, s), Resolution::External);
        assert_eq!(classify(program, &cx, t), Resolution::External);

        let mut cx = InjectionContext::new(Some(s), t);
        cx.add_substitution(s, t);
        assert_eq!(classify(program, &cx, a), Resolution::Local);
        assert_eq!(classify(program, &cx, s), Resolution::Remapped(t));
    }

    #[test]
    fn test_sibling_reference_is_looked_up_in_destination() {
        let (mut session, s, _, get, t) = two_classes();
        let t_a = session.program.lookup_str(t, "a")[0];
        let mut cx = InjectionContext::new(Some(get), t);
        cx.add_substitution(s, t);

        let clone = session
            .with_context(t, |s| Injector::new(s).inject_decl(&mut cx, get))
            .unwrap();
        assert_eq!(session.program.owner(clone), Some(t));
        assert_eq!(returned_decl(&session.program, clone), Some(t_a));
        assert!(session.program.decl(t).members.contains(&clone));
    }

    #[test]
    fn test_missing_instance_member_is_a_capture_error() {
        let (mut session, s, _, get, _) = two_classes();
        let u = session.program.add_class(DeclId::TRANSLATION_UNIT, "U");
        let mut cx = InjectionContext::new(Some(get), u);
        cx.add_substitution(s, u);

        let clone = session
            .with_context(u, |s| Injector::new(s).inject_decl(&mut cx, get))
            .unwrap();
        assert!(session.program.decl(clone).flags.invalid);
        assert_eq!(session.diagnostics()[0].code.as_str(), "G2001");
    }

    #[test]
    fn test_missing_static_member_is_reused_with_warning() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let mut data = VarData::new(TypeContext::INT, Some(Expr::IntLit(5)));
        data.is_static = true;
        let count = program.add_var(s, "count", data);
        let get = program.add_method(s, "get", TypeContext::INT, &[]);
        let read = program.decl_ref(count).into_value();
        program.set_body(get, vec![Stmt::Return(Some(read))]);
        let u = program.add_class(DeclId::TRANSLATION_UNIT, "U");
        let mut session = Session::new(program);

        let mut cx = InjectionContext::new(Some(get), u);
        cx.add_substitution(s, u);
        let clone = session
            .with_context(u, |s| Injector::new(s).inject_decl(&mut cx, get))
            .unwrap();
        assert!(!session.program.decl(clone).flags.invalid);
        assert_eq!(returned_decl(&session.program, clone), Some(count));
        assert_eq!(session.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_ambiguous_lookup_is_fatal() {
        let (mut session, s, _, get, t) = two_classes();
        session.program.add_method(t, "a", TypeContext::INT, &[]);
        let mut cx = InjectionContext::new(Some(get), t);
        cx.add_substitution(s, t);

        let result = session.with_context(t, |s| Injector::new(s).inject_decl(&mut cx, get));
        assert!(matches!(result, Err(InjectError::AmbiguousLookup { candidates: 2, .. })));
    }

    #[test]
    fn test_each_source_declaration_cloned_once() {
        let (mut session, s, a, get, _) = two_classes();
        let ns = session.program.add_namespace(DeclId::TRANSLATION_UNIT, "n");
        let mut cx = InjectionContext::new(Some(s), ns);

        let (first, second, field) = session.with_context(ns, |sess| {
            let mut injector = Injector::new(sess);
            let first = injector.inject_decl(&mut cx, s).unwrap();
            let second = injector.inject_decl(&mut cx, s).unwrap();
            let field = injector.resolve_decl(&mut cx, a).unwrap();
            (first, second, field)
        });
        assert_eq!(first, second);
        assert_eq!(session.program.owner(field), Some(first));
        let get_clone = cx.remap.get(get).unwrap();
        assert_eq!(returned_decl(&session.program, get_clone), Some(field));
        assert_eq!(session.program.decl(first).members.len(), 2);
    }

    #[test]
    fn test_placeholder_reference_becomes_constant() {
        let mut program = Program::new();
        let holder = program.add_class(DeclId::TRANSLATION_UNIT, "H");
        let placeholder = program.add_var(holder, "n", VarData::new(TypeContext::DEPENDENT, None));
        let session = &mut Session::new(program);
        let mut cx = InjectionContext::new(None, DeclId::TRANSLATION_UNIT);
        cx.placeholders
            .insert(placeholder, TypedValue::new(TypeContext::INT, ConstValue::Int(42)));

        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::ValueRead(Box::new(Expr::DeclRef {
                decl: placeholder,
                ty: TypeContext::DEPENDENT,
            })),
            Expr::IntLit(1),
        );
        let out = Injector::new(session).transform_expr(&mut cx, &expr).unwrap();
        let Expr::Binary { lhs, .. } = &out else {
            panic!("expected binary expression");
        };
        assert!(matches!(
            lhs.as_ref(),
            Expr::Constant {
                value: ConstValue::Int(42),
                ..
            }
        ));
        assert_eq!(session.evaluate(&out).unwrap().value, ConstValue::Int(43));
    }

    #[test]
    fn test_reflected_types_are_canonicalized() {
        let mut program = Program::new();
        let name = program.interner.intern("r");
        let reflected = program.types.reflected_type(name, TypeContext::INT);
        let v = program.add_var(DeclId::TRANSLATION_UNIT, "v", VarData::new(reflected, None));
        let ns = program.add_namespace(DeclId::TRANSLATION_UNIT, "n");
        let mut session = Session::new(program);
        let mut cx = InjectionContext::new(None, ns);
        cx.add_substitution(DeclId::TRANSLATION_UNIT, ns);

        let clone = Injector::new(&mut session).inject_decl(&mut cx, v).unwrap();
        assert_eq!(session.program.decl(clone).value_type(), Some(TypeContext::INT));
        assert_eq!(session.program.owner(clone), Some(ns));
    }

    #[test]
    fn test_template_parameter_substitution() {
        let mut program = Program::new();
        let (_, def, proto) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "m");
        let proto_ty = program.types.template_param_type(proto);
        let f = program.add_field(def, "self_ref", proto_ty, None);
        let target = program.add_class(DeclId::TRANSLATION_UNIT, "X");
        let mut session = Session::new(program);

        let mut cx = InjectionContext::new(Some(def), target);
        cx.add_substitution(def, target);
        cx.add_substitution(proto, target);
        let clone = Injector::new(&mut session).inject_decl(&mut cx, f).unwrap();
        let expected = session.program.types.record_type(target);
        assert_eq!(session.program.decl(clone).value_type(), Some(expected));

        let mut bad = InjectionContext::new(Some(def), target);
        bad.add_substitution(def, target);
        bad.add_substitution(proto, DeclId::TRANSLATION_UNIT);
        let clone = Injector::new(&mut session).inject_decl(&mut bad, f).unwrap();
        assert!(session.program.decl(clone).flags.invalid);
    }

    #[test]
    fn test_static_rewrite_of_field() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let f = program.add_field(s, "limit", TypeContext::INT, Some(Expr::IntLit(8)));
        let t = program.add_class(DeclId::TRANSLATION_UNIT, "T");
        let mut session = Session::new(program);
        let mut cx = InjectionContext::new(None, t);
        cx.add_substitution(s, t);

        let var = session
            .with_context(t, |s| Injector::new(s).rewrite_as_static_member(&mut cx, f))
            .unwrap();
        let d = session.program.decl(var);
        let DeclKind::Var(data) = &d.kind else {
            panic!("expected a variable");
        };
        assert!(data.is_static);
        assert_eq!(data.init, Some(Expr::IntLit(8)));
        assert_eq!(d.owner, Some(t));
        assert_eq!(cx.remap.get(f), Some(var));
        // The original is untouched
        assert!(matches!(session.program.decl(f).kind, DeclKind::Field(_)));
    }

    #[test]
    fn test_fragments_are_not_cloned() {
        let mut program = Program::new();
        let fragment = program.alloc(Decl::new(
            None,
            DeclKind::Fragment(Default::default()),
            Some(DeclId::TRANSLATION_UNIT),
        ));
        let mut session = Session::new(program);
        let mut cx = InjectionContext::new(Some(DeclId::TRANSLATION_UNIT), DeclId::TRANSLATION_UNIT);
        let mut injector = Injector::new(&mut session);
        assert_eq!(injector.resolve_decl(&mut cx, fragment), Ok(fragment));
        assert_eq!(injector.inject_decl(&mut cx, fragment), Err(InjectError::NestedFragment));
    }
}
