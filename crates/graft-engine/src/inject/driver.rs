//! Injection driver
//!
//! Evaluates reflections, checks that the payload fits the current context
//! and routes fragments and plain declarations to the cloner.
//!
//! | payload                | valid target           | mismatch class |
//! |------------------------|------------------------|----------------|
//! | statement fragment     | function body          | 0              |
//! | class fragment         | class body             | 1              |
//! | namespace fragment     | namespace or file      | 2              |
//! | existing declaration   | kind of its old owner  | same table     |
//!
//! An injection outside all of these contexts has class 3.

use super::injector::{InjectionContext, Injector};
use super::mods::find_modifications;
use super::mods::StorageMod;
use crate::ast::{
    Decl, DeclId, DeclKind, Expr, InjectionDeclData, Program, SourceLoc, Stmt, TypeId,
};
use crate::error::InjectError;
use crate::session::Session;
use crate::value::{ConstValue, TypedValue};
use log::{debug, info};

/// The kind of an injection target: 0 function, 1 class, 2 namespace,
/// 3 translation unit. `None` for contexts nothing can be injected into.
pub fn describe_injection_target(program: &Program, dc: DeclId) -> Option<u8> {
    let d = program.decl(dc);
    if d.is_function_or_method() {
        Some(0)
    } else if d.is_record() {
        Some(1)
    } else {
        match d.kind {
            DeclKind::Namespace => Some(2),
            DeclKind::TranslationUnit => Some(3),
            _ => None,
        }
    }
}

/// Payload kind of an injection (0 statements, 1 class members, 2
/// namespace members), judged by the context the payload comes from
fn payload_kind(program: &Program, context: DeclId) -> Option<u8> {
    let d = program.decl(context);
    if d.is_function_or_method() || matches!(d.kind, DeclKind::StmtBlock(_)) {
        Some(0)
    } else if d.is_record() {
        Some(1)
    } else if d.is_file_context() {
        Some(2)
    } else {
        None
    }
}

/// Whether a context of target kind `target` accepts payload `kind`
fn accepts(kind: u8, target: u8) -> bool {
    match kind {
        0 => target == 0,
        1 => target == 1,
        _ => target >= 2,
    }
}

/// An evaluated injection operand
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionInfo {
    /// Type of the reflection (a fragment type or a reflection carrier)
    pub reflection_ty: TypeId,
    /// Value of the reflection
    pub reflection_value: ConstValue,
}

impl InjectionInfo {
    /// Package an evaluated reflection
    pub fn new(reflection_ty: TypeId, reflection_value: ConstValue) -> Self {
        Self {
            reflection_ty,
            reflection_value,
        }
    }
}

impl From<TypedValue> for InjectionInfo {
    fn from(value: TypedValue) -> Self {
        Self::new(value.ty, value.value)
    }
}

/// Lifecycle of a possibly dependent injection
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    /// Waiting for its operand to become non-dependent
    Pending(Expr),
    /// Applied, producing these declarations
    Applied(Vec<DeclId>),
    /// Rejected
    Failed(InjectError),
}

/// An injection to perform at `point` inside `target`
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionRequest {
    /// Point of injection
    pub point: SourceLoc,
    /// The context injected into
    pub target: DeclId,
    /// Where the request is in its lifecycle
    pub state: RequestState,
}

impl InjectionRequest {
    /// A pending request
    pub fn new(point: SourceLoc, target: DeclId, expr: Expr) -> Self {
        Self {
            point,
            target,
            state: RequestState::Pending(expr),
        }
    }

    /// Replace the operand of a pending request, typically once template
    /// arguments are known. Returns false if the request was already driven.
    pub fn substitute(&mut self, expr: Expr) -> bool {
        match &mut self.state {
            RequestState::Pending(operand) => {
                *operand = expr;
                true
            }
            _ => false,
        }
    }

    /// Whether the request still waits
    pub fn is_pending(&self) -> bool {
        matches!(self.state, RequestState::Pending(_))
    }
}

impl Session {
    fn kind_check(&self, kind: u8) -> Result<(), InjectError> {
        let target = describe_injection_target(&self.program, self.current_context())
            .ok_or(InjectError::NoValidContext)?;
        if accepts(kind, target) {
            Ok(())
        } else {
            Err(InjectError::InvalidInjection { kind, target })
        }
    }

    /// Report an injection failure. Member failures were reported one by one
    /// and are not repeated.
    pub(crate) fn report_injection_error(&mut self, error: &InjectError, loc: SourceLoc) {
        match error {
            InjectError::InjectionFailed { .. } => {}
            InjectError::Eval(cause) => self.report_eval_failure(InjectError::NotAReflection, cause, loc),
            _ => self.report(error, loc),
        }
    }

    /// Inject the content of a fragment into the current context.
    ///
    /// `content` is the fragment's content; the placeholders of the fragment
    /// are replaced by the captured fields of `value`.
    pub fn inject_fragment(
        &mut self,
        poi: SourceLoc,
        ty: TypeId,
        value: &ConstValue,
        content: DeclId,
    ) -> Result<Vec<DeclId>, InjectError> {
        let fragment = self
            .program
            .owner(content)
            .filter(|&f| matches!(self.program.decl(f).kind, DeclKind::Fragment(_)))
            .ok_or(InjectError::ReflectionNotADecl)?;
        let kind = payload_kind(&self.program, content).ok_or(InjectError::UnsupportedDecl {
            kind: self.program.decl(content).kind.describe(),
        })?;
        self.kind_check(kind)?;

        let current = self.current_context();
        let class = self
            .program
            .class_of_type(ty)
            .ok_or(InjectError::NotAReflection)?;
        let mut cx = InjectionContext::new(Some(content), current);
        cx.add_substitution(content, current);
        cx.add_replacements(&self.program, fragment, class, value.fields());
        debug!(
            "injecting fragment {} into {} at {} with {} captured value(s)",
            fragment,
            current,
            poi,
            cx.placeholders.len()
        );

        if kind == 0 {
            return self.inject_statement_content(&mut cx, content, current);
        }

        let members = self.program.decl(content).members.clone();
        let mut injected = Vec::with_capacity(members.len());
        let mut failed = 0;
        for member in members {
            match Injector::new(self).inject_decl(&mut cx, member) {
                Ok(clone) => {
                    if self.program.decl(clone).flags.invalid {
                        failed += 1;
                    }
                    injected.push(clone);
                    if kind == 2 {
                        self.notify_top_level(clone);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let loc = self.program.decl(member).loc;
                    self.report(&e, loc);
                    failed += 1;
                }
            }
        }
        self.finish_injection(current, injected, failed)
    }

    /// Statement fragments append their cloned statements to the body of the
    /// current function
    fn inject_statement_content(
        &mut self,
        cx: &mut InjectionContext,
        content: DeclId,
        function: DeclId,
    ) -> Result<Vec<DeclId>, InjectError> {
        let stmts = match &self.program.decl(content).kind {
            DeclKind::StmtBlock(stmts) => stmts.clone(),
            _ => Vec::new(),
        };
        let stmts = match Injector::new(self).inject_statements(cx, &stmts) {
            Ok(stmts) => stmts,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.program.decl_mut(function).flags.invalid = true;
                return Err(e);
            }
        };
        let injected: Vec<DeclId> = stmts
            .iter()
            .filter_map(|s| match s {
                Stmt::Decl(d) => Some(*d),
                _ => None,
            })
            .collect();
        let failed = injected
            .iter()
            .filter(|&&d| self.program.decl(d).flags.invalid)
            .count();
        if let Some(f) = self.program.decl_mut(function).kind.function_mut() {
            f.body.get_or_insert_with(Vec::new).extend(stmts);
        }
        self.finish_injection(function, injected, failed)
    }

    fn finish_injection(
        &mut self,
        injectee: DeclId,
        injected: Vec<DeclId>,
        failed: usize,
    ) -> Result<Vec<DeclId>, InjectError> {
        if failed > 0 {
            self.program.decl_mut(injectee).flags.invalid = true;
            return Err(InjectError::InjectionFailed { failed });
        }
        Ok(injected)
    }

    /// Clone an existing declaration into the current context, applying the
    /// modifications carried by the reflection
    pub fn copy_declaration(
        &mut self,
        poi: SourceLoc,
        ty: TypeId,
        value: &ConstValue,
        injection: DeclId,
    ) -> Result<Vec<DeclId>, InjectError> {
        let owner = self.program.owner(injection).ok_or(InjectError::UnsupportedDecl {
            kind: self.program.decl(injection).kind.describe(),
        })?;
        let kind = payload_kind(&self.program, owner).ok_or(InjectError::NoValidContext)?;
        self.kind_check(kind)?;
        let current = self.current_context();

        let mods = find_modifications(&self.program, value, ty).unwrap_or_default();
        if let Err(e) = mods.validate() {
            self.program.decl_mut(current).flags.invalid = true;
            return Err(e);
        }

        let source = self.program.decl(injection).is_context().then_some(injection);
        let mut cx = InjectionContext::new(source, current);
        cx.add_substitution(owner, current);
        debug!("copying {} into {} at {}", injection, current, poi);

        let rewrite = self.program.decl(injection).is_class_member() && mods.storage == StorageMod::Static;
        let mut injector = Injector::new(self);
        let clone = if rewrite {
            injector.rewrite_as_static_member(&mut cx, injection)?
        } else {
            injector.inject_decl(&mut cx, injection)?
        };
        if self.program.decl(clone).flags.invalid {
            return self.finish_injection(current, vec![clone], 1);
        }

        if let Err(e) = self.apply_modifications(clone, &mods) {
            self.program.decl_mut(current).flags.invalid = true;
            return Err(e);
        }

        if self.program.decl(current).is_file_context() {
            self.notify_top_level(clone);
        }
        Ok(vec![clone])
    }

    /// Apply one evaluated injection in the current context
    pub fn apply_injection(&mut self, poi: SourceLoc, info: &InjectionInfo) -> Result<Vec<DeclId>, InjectError> {
        let ty = info.reflection_ty;
        let injection = self
            .program
            .reflectee_of_type(ty)
            .or_else(|| info.reflection_value.reflectee())
            .filter(|&d| self.program.contains(d))
            .ok_or(InjectError::ReflectionNotADecl)?;

        self.with_synthesis(poi, |s| {
            if s.program.is_fragment_type(ty) {
                s.inject_fragment(poi, ty, &info.reflection_value, injection)
            } else {
                s.copy_declaration(poi, ty, &info.reflection_value, injection)
            }
        })
    }

    /// Apply a batch of injections at one point of injection.
    ///
    /// Every injection is attempted even when an earlier one failed; the
    /// result is true only if all of them succeeded. A fatal error stops the
    /// batch.
    pub fn apply_source_code_modifications(&mut self, poi: SourceLoc, injections: &[InjectionInfo]) -> bool {
        let mut ok = true;
        for info in injections {
            match self.apply_injection(poi, info) {
                Ok(decls) => debug!("injected {} declaration(s)", decls.len()),
                Err(e) => {
                    self.report_injection_error(&e, poi);
                    ok = false;
                    if e.is_fatal() {
                        break;
                    }
                }
            }
        }
        info!(
            "applied {} injection(s) at {}: {}",
            injections.len(),
            poi,
            if ok { "ok" } else { "failed" }
        );
        ok
    }

    /// Inject statements into the current function
    pub fn inject_block_statements(&mut self, poi: SourceLoc, info: &InjectionInfo) -> Result<Vec<DeclId>, InjectError> {
        self.kind_check(0)?;
        self.apply_injection(poi, info)
    }

    /// Inject members into the current class
    pub fn inject_class_members(&mut self, poi: SourceLoc, info: &InjectionInfo) -> Result<Vec<DeclId>, InjectError> {
        self.kind_check(1)?;
        self.apply_injection(poi, info)
    }

    /// Inject members into the current namespace or translation unit
    pub fn inject_namespace_members(&mut self, poi: SourceLoc, info: &InjectionInfo) -> Result<Vec<DeclId>, InjectError> {
        self.kind_check(2)?;
        self.apply_injection(poi, info)
    }

    /// Build an injection statement. The operand must be a reflection
    /// unless it is dependent.
    pub fn build_injection_stmt(&self, loc: SourceLoc, expr: Expr) -> Result<Stmt, InjectError> {
        if !expr.is_dependent(&self.program.types) && !self.program.is_reflection_type(expr.ty()) {
            debug!("rejected injection statement at {}", loc);
            return Err(InjectError::NotAReflection);
        }
        Ok(Stmt::Inject(expr.into_value()))
    }

    /// An injection declaration in the current context.
    ///
    /// A dependent operand yields a deferred injection declaration; any other
    /// operand is evaluated and injected immediately. Errors are reported
    /// before being returned.
    pub fn act_on_injection_decl(&mut self, loc: SourceLoc, expr: Expr) -> Result<Vec<DeclId>, InjectError> {
        if expr.is_dependent(&self.program.types) {
            let mut decl = Decl::new(
                None,
                DeclKind::Injection(InjectionDeclData { operand: expr }),
                Some(self.current_context()),
            );
            decl.loc = loc;
            let id = self.program.alloc(decl);
            self.program.add_member(self.current_context(), id);
            debug!("deferred injection {} at {}", id, loc);
            return Ok(vec![id]);
        }

        let result = self.inject_expr(loc, expr);
        if let Err(e) = &result {
            self.report_injection_error(e, loc);
        }
        result
    }

    fn inject_expr(&mut self, loc: SourceLoc, expr: Expr) -> Result<Vec<DeclId>, InjectError> {
        let expr = expr.into_value();
        if !self.program.is_reflection_type(expr.ty()) {
            return Err(InjectError::NotAReflection);
        }
        let value = self.evaluate(&expr)?;
        self.apply_injection(loc, &InjectionInfo::from(value))
    }

    /// Advance a request: a dependent operand keeps it pending, anything else
    /// is injected into the request's target. Returns whether the request
    /// left the pending state.
    pub fn drive_request(&mut self, request: &mut InjectionRequest) -> bool {
        let RequestState::Pending(expr) = &request.state else {
            return false;
        };
        if expr.is_dependent(&self.program.types) {
            return false;
        }
        let expr = expr.clone();
        let (point, target) = (request.point, request.target);
        let result = self.with_context(target, |s| s.inject_expr(point, expr));
        request.state = match result {
            Ok(decls) => RequestState::Applied(decls),
            Err(e) => {
                self.report_injection_error(&e, point);
                RequestState::Failed(e)
            }
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ScopeTree, TypeContext, VarData};
    use crate::inject::mods::{AccessMod, Modifications};
    use crate::validate::CollectingConsumer;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_target_descriptions() {
        let mut program = Program::new();
        let ns = program.add_namespace(DeclId::TRANSLATION_UNIT, "n");
        let s = program.add_class(ns, "S");
        let f = program.add_method(s, "f", TypeContext::VOID, &[]);
        assert_eq!(describe_injection_target(&program, f), Some(0));
        assert_eq!(describe_injection_target(&program, s), Some(1));
        assert_eq!(describe_injection_target(&program, ns), Some(2));
        assert_eq!(describe_injection_target(&program, DeclId::TRANSLATION_UNIT), Some(3));
        let (meta, _, _) = program.add_metaclass(ns, "m");
        assert_eq!(describe_injection_target(&program, meta), None);
    }

    #[test]
    fn test_copy_method_with_access_change() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let f = program.add_method(s, "f", TypeContext::INT, &[]);
        program.set_body(f, vec![Stmt::Return(Some(Expr::IntLit(1)))]);
        let t = program.add_class(DeclId::TRANSLATION_UNIT, "T");
        let reflection = program.build_reflection(f);
        let mods = Modifications {
            access: AccessMod::Private,
            ..Modifications::default()
        };
        let expr = program.build_modify(reflection, mods);
        let mut session = Session::new(program);

        session.set_current_context(t);
        let decls = session.act_on_injection_decl(SourceLoc::new(4, 1), expr).unwrap();
        assert_eq!(decls.len(), 1);
        let clone = session.program.decl(decls[0]);
        assert_eq!(clone.owner, Some(t));
        assert_eq!(clone.access, crate::ast::Access::Private);
        assert_eq!(session.program.decl(f).access, crate::ast::Access::Public);
    }

    #[test]
    fn test_dependent_operand_is_deferred() {
        let mut program = Program::new();
        let (_, def, proto) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "m");
        let dependent = Expr::DeclRef {
            decl: proto,
            ty: TypeContext::DEPENDENT,
        };
        let mut session = Session::new(program);
        session.set_current_context(def);
        let decls = session.act_on_injection_decl(SourceLoc::default(), dependent).unwrap();
        assert!(matches!(
            session.program.decl(decls[0]).kind,
            DeclKind::Injection(_)
        ));
        assert!(session.program.decl(def).members.contains(&decls[0]));
    }

    #[test]
    fn test_injection_stmt_requires_reflection() {
        let mut program = Program::new();
        let v = program.add_var(
            DeclId::TRANSLATION_UNIT,
            "v",
            VarData::new(TypeContext::INT, Some(Expr::IntLit(1))),
        );
        let reflection = program.build_reflection(v);
        let session = Session::new(program);

        assert_eq!(
            session.build_injection_stmt(SourceLoc::default(), Expr::IntLit(3)),
            Err(InjectError::NotAReflection)
        );
        let stmt = session.build_injection_stmt(SourceLoc::default(), reflection).unwrap();
        assert!(matches!(stmt, Stmt::Inject(Expr::Reflect { .. })));
    }

    #[test]
    fn test_statement_fragment_appends_to_function() {
        let mut program = Program::new();
        let target = program.add_function(DeclId::TRANSLATION_UNIT, "target", TypeContext::INT, &[]);
        let meta = program.add_function(DeclId::TRANSLATION_UNIT, "meta", TypeContext::VOID, &[]);
        let n = program.add_var(meta, "n", VarData::local(TypeContext::INT, Some(Expr::IntLit(6))));
        let mut session = Session::new(program);
        let mut scopes = ScopeTree::new();
        scopes.push(crate::ast::ScopeKind::Function, Some(meta));
        scopes.declare(n);
        session.set_current_context(meta);

        let captures = session.act_on_fragment_capture(&scopes);
        let fragment = session.act_on_start_fragment(Some(&mut scopes), SourceLoc::default(), &captures);
        let block = session.add_statement_block(fragment);
        let placeholder = crate::capture::placeholders(&session.program, fragment)[0];
        let read = Expr::ValueRead(Box::new(Expr::DeclRef {
            decl: placeholder,
            ty: TypeContext::DEPENDENT,
        }));
        let local = session.program.add_var(block, "m", VarData::local(TypeContext::INT, Some(read)));
        if let DeclKind::StmtBlock(stmts) = &mut session.program.decl_mut(block).kind {
            stmts.push(Stmt::Decl(local));
        }
        session.act_on_finish_fragment(Some(&mut scopes), fragment, block);
        let expr = session
            .build_fragment_expr(SourceLoc::default(), &captures, fragment)
            .unwrap();
        let value = session.evaluate(&expr).unwrap();

        session.set_current_context(target);
        let decls = session
            .apply_injection(SourceLoc::new(9, 1), &InjectionInfo::from(value))
            .unwrap();
        assert_eq!(decls.len(), 1);
        let cloned = session.program.decl(decls[0]);
        assert_eq!(cloned.owner, Some(target));
        let DeclKind::Var(data) = &cloned.kind else {
            panic!("expected a variable");
        };
        assert!(matches!(
            data.init,
            Some(Expr::Constant {
                value: ConstValue::Int(6),
                ..
            })
        ));
        let body = session.program.decl(target).kind.function().and_then(|f| f.body.clone());
        assert_eq!(body, Some(vec![Stmt::Decl(decls[0])]));
    }

    /// `S { int a; }`, an empty class `T`, a namespace `n`, a namespace-scope
    /// `g` and a function `f`
    fn entry_point_program() -> (Program, [DeclId; 6]) {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let a = program.add_field(s, "a", TypeContext::INT, None);
        let t = program.add_class(DeclId::TRANSLATION_UNIT, "T");
        let n = program.add_namespace(DeclId::TRANSLATION_UNIT, "n");
        let g = program.add_var(
            DeclId::TRANSLATION_UNIT,
            "g",
            VarData::new(TypeContext::INT, Some(Expr::IntLit(2))),
        );
        let f = program.add_function(DeclId::TRANSLATION_UNIT, "f", TypeContext::VOID, &[]);
        (program, [a, t, n, g, f, s])
    }

    fn operand(session: &mut Session, expr: &Expr) -> InjectionInfo {
        InjectionInfo::from(session.evaluate(expr).unwrap())
    }

    #[test]
    fn test_block_statements_need_a_function() {
        let (program, [_, t, _, _, f, _]) = entry_point_program();
        let mut session = Session::new(program);
        let fragment = session.act_on_start_fragment(None, SourceLoc::default(), &[]);
        let block = session.add_statement_block(fragment);
        let local = session
            .program
            .add_var(block, "x", VarData::local(TypeContext::INT, Some(Expr::IntLit(5))));
        if let DeclKind::StmtBlock(stmts) = &mut session.program.decl_mut(block).kind {
            stmts.push(Stmt::Decl(local));
        }
        session.act_on_finish_fragment(None, fragment, block);
        let expr = session
            .build_fragment_expr(SourceLoc::default(), &[], fragment)
            .unwrap();
        let info = operand(&mut session, &expr);

        session.set_current_context(t);
        let err = session.inject_block_statements(SourceLoc::default(), &info).unwrap_err();
        assert_eq!(err, InjectError::InvalidInjection { kind: 0, target: 1 });
        assert_eq!(err.diagnostic_class(), Some(0));
        assert!(session.program.decl(t).members.is_empty());

        session.set_current_context(f);
        let decls = session.inject_block_statements(SourceLoc::default(), &info).unwrap();
        assert_eq!(decls.len(), 1);
        assert_eq!(session.program.owner(decls[0]), Some(f));
    }

    #[test]
    fn test_class_members_need_a_class() {
        let (mut program, [a, t, _, _, f, _]) = entry_point_program();
        let reflection = program.build_reflection(a);
        let mut session = Session::new(program);
        let info = operand(&mut session, &reflection);

        session.set_current_context(f);
        let err = session.inject_class_members(SourceLoc::default(), &info).unwrap_err();
        assert_eq!(err, InjectError::InvalidInjection { kind: 1, target: 0 });
        assert_eq!(err.diagnostic_class(), Some(1));

        session.set_current_context(t);
        let decls = session.inject_class_members(SourceLoc::default(), &info).unwrap();
        assert_eq!(session.program.owner(decls[0]), Some(t));
        assert!(session.program.decl(t).members.contains(&decls[0]));
    }

    #[test]
    fn test_namespace_members_need_a_file_context() {
        let (mut program, [_, _, n, g, _, s]) = entry_point_program();
        let reflection = program.build_reflection(g);
        let consumer = CollectingConsumer::new();
        let mut session = Session::new(program).with_consumer(Box::new(consumer.clone()));
        let info = operand(&mut session, &reflection);

        session.set_current_context(s);
        let err = session.inject_namespace_members(SourceLoc::default(), &info).unwrap_err();
        assert_eq!(err, InjectError::InvalidInjection { kind: 2, target: 1 });
        assert_eq!(err.diagnostic_class(), Some(2));
        assert!(consumer.decls().is_empty());

        session.set_current_context(n);
        let decls = session.inject_namespace_members(SourceLoc::default(), &info).unwrap();
        assert_eq!(session.program.owner(decls[0]), Some(n));
        assert_eq!(consumer.decls(), decls);
    }

    #[test]
    fn test_rejected_modifications_invalidate_the_injectee() {
        let (mut program, [a, t, _, _, _, _]) = entry_point_program();
        let reflection = program.build_reflection(a);
        let mods = Modifications {
            make_pure: true,
            ..Modifications::default()
        };
        let expr = program.build_modify(reflection, mods);
        let mut session = Session::new(program);
        let info = operand(&mut session, &expr);
        let decls_before = session.program.len();

        session.set_current_context(t);
        let err = session.apply_injection(SourceLoc::default(), &info).unwrap_err();
        assert_eq!(err, InjectError::PureWithoutVirtual);
        assert!(session.program.decl(t).flags.invalid);
        assert_eq!(session.program.len(), decls_before);
    }

    #[test]
    fn test_request_lifecycle() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let a = program.add_field(s, "a", TypeContext::INT, None);
        let t = program.add_class(DeclId::TRANSLATION_UNIT, "T");
        let reflection = program.build_reflection(a);
        let mut session = Session::new(program);

        let mut request = InjectionRequest::new(
            SourceLoc::new(2, 2),
            t,
            Expr::Opaque(TypeContext::DEPENDENT),
        );
        assert!(!session.drive_request(&mut request));
        assert!(request.is_pending());

        assert!(request.substitute(reflection.clone()));
        assert!(session.drive_request(&mut request));
        let RequestState::Applied(decls) = &request.state else {
            panic!("expected the request to apply");
        };
        assert_eq!(session.program.owner(decls[0]), Some(t));
        assert!(!request.substitute(reflection));
        assert_eq!(session.current_context(), DeclId::TRANSLATION_UNIT);
    }
}
