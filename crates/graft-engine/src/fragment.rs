//! Fragment declarations and fragment expressions
//!
//! A fragment expression has a synthesized class type, roughly:
//!
//! ```text
//! class __fragment : public typename(reflexpr(<content>)) {
//!   public:
//!     T __captured_n;
//!     constexpr explicit __fragment(T __parm_n)
//!       : typename(reflexpr(<content>))(), __captured_n(__parm_n) {}
//! };
//! ```
//!
//! Evaluating the construction yields the fragment value: the reflection of
//! the content as base subobject, followed by the captured values.

use crate::ast::{
    Access, ClassData, ConstructStyle, CtorInit, Decl, DeclId, DeclKind, Expr, FieldData,
    FragmentData, FunctionData, InitTarget, MethodData, ScopeKind, ScopeTree, SourceLoc,
    TypeContext, VarData,
};
use crate::capture::{self, Capture};
use crate::error::InjectError;
use crate::session::Session;
use log::debug;

impl Session {
    /// Capture the initialized locals visible from the current scope of
    /// `scopes`, up to the enclosing function of the current context
    pub fn act_on_fragment_capture(&self, scopes: &ScopeTree) -> Vec<Capture> {
        let function = self.program.enclosing_function(self.current_context());
        let vars = capture::find_captures(&self.program, scopes, scopes.current(), function);
        capture::reference_captures(&self.program, &vars)
    }

    /// Create a fragment in the current context together with its
    /// placeholders. With a scope tree, the fragment is entered as the
    /// current scope and context.
    pub fn act_on_start_fragment(
        &mut self,
        scopes: Option<&mut ScopeTree>,
        loc: SourceLoc,
        captures: &[Capture],
    ) -> DeclId {
        let mut decl = Decl::new(
            None,
            DeclKind::Fragment(FragmentData::default()),
            Some(self.current_context()),
        );
        decl.loc = loc;
        let fragment = self.program.alloc(decl);
        capture::create_placeholders(&mut self.program, fragment, captures);

        if let Some(scopes) = scopes {
            scopes.push(ScopeKind::Fragment, Some(fragment));
            for p in capture::placeholders(&self.program, fragment) {
                scopes.declare(p);
            }
            self.set_current_context(fragment);
        }
        debug!("started fragment {} with {} capture(s)", fragment, captures.len());
        fragment
    }

    /// Bind `content` to the fragment, leaving the fragment scope when one
    /// was entered
    pub fn act_on_finish_fragment(
        &mut self,
        scopes: Option<&mut ScopeTree>,
        fragment: DeclId,
        content: DeclId,
    ) -> DeclId {
        if let DeclKind::Fragment(f) = &mut self.program.decl_mut(fragment).kind {
            f.content = Some(content);
        }
        if let Some(scopes) = scopes {
            scopes.pop();
            if let Some(owner) = self.program.owner(fragment) {
                self.set_current_context(owner);
            }
        }
        fragment
    }

    /// Create the statement block of a statement fragment and bind it as the
    /// fragment's content
    pub fn add_statement_block(&mut self, fragment: DeclId) -> DeclId {
        let block = self.program.alloc(Decl::new(
            None,
            DeclKind::StmtBlock(Vec::new()),
            Some(fragment),
        ));
        if let DeclKind::Fragment(FragmentData { content }) = &mut self.program.decl_mut(fragment).kind {
            content.get_or_insert(block);
        }
        block
    }

    /// Build the expression that evaluates to the fragment value
    pub fn build_fragment_expr(
        &mut self,
        loc: SourceLoc,
        captures: &[Capture],
        fragment: DeclId,
    ) -> Result<Expr, InjectError> {
        let content = match &self.program.decl(fragment).kind {
            DeclKind::Fragment(FragmentData { content: Some(c) }) => *c,
            _ => return Err(InjectError::EmptyFragment),
        };
        let current = self.current_context();
        let program = &mut self.program;

        let base_ty = program.reflection_type(content);
        let mut class_decl = Decl::new(
            None,
            DeclKind::Class(ClassData {
                bases: vec![base_ty],
                is_fragment: true,
                reflectee: None,
            }),
            Some(current),
        );
        class_decl.loc = loc;
        class_decl.flags.implicit = true;
        let class = program.alloc(class_decl);
        let class_ty = program.types.record_type(class);

        // Storage for the captured values
        let mut fields = Vec::with_capacity(captures.len());
        for capture in captures {
            let name = format!("__captured_{}", program.interner.resolve(capture.name));
            let field = program.add_decl(
                class,
                Some(&name),
                DeclKind::Field(FieldData {
                    ty: capture.ty,
                    init: None,
                    is_mutable: false,
                }),
            );
            let d = program.decl_mut(field);
            d.access = Access::Public;
            d.flags.implicit = true;
            d.loc = loc;
            fields.push(field);
        }

        // constexpr explicit constructor taking one parameter per capture
        let mut method = MethodData::new(FunctionData {
            ret: TypeContext::VOID,
            params: Vec::new(),
            body: Some(Vec::new()),
            is_constexpr: true,
        });
        method.is_explicit = true;
        let ctor = program.add_decl(class, None, DeclKind::Constructor(method, Vec::new()));
        program.decl_mut(ctor).access = Access::Public;
        program.decl_mut(ctor).loc = loc;

        let mut params = Vec::with_capacity(captures.len());
        for capture in captures {
            let name = format!("__parm_{}", program.interner.resolve(capture.name));
            let name = program.interner.intern(&name);
            let mut parm = Decl::new(
                Some(name),
                DeclKind::Param(VarData::new(capture.ty, None)),
                Some(ctor),
            );
            parm.flags.implicit = true;
            parm.loc = loc;
            params.push(program.alloc(parm));
        }

        let mut inits = Vec::with_capacity(fields.len() + 1);
        inits.push(CtorInit {
            target: InitTarget::Base(base_ty),
            args: Vec::new(),
        });
        for (&field, (&parm, capture)) in fields.iter().zip(params.iter().zip(captures)) {
            inits.push(CtorInit {
                target: InitTarget::Field(field),
                args: vec![Expr::DeclRef {
                    decl: parm,
                    ty: capture.ty,
                }],
            });
        }
        if let DeclKind::Constructor(m, ctor_inits) = &mut program.decl_mut(ctor).kind {
            m.func.params = params;
            *ctor_inits = inits;
        }

        let capture_exprs: Vec<Expr> = captures.iter().map(|c| c.expr.clone()).collect();
        let style = if captures.len() == 1 {
            ConstructStyle::FunctionalCast
        } else {
            ConstructStyle::TemporaryObject
        };
        let init = Expr::Construct {
            ty: class_ty,
            ctor,
            args: capture_exprs.clone(),
            style,
        };

        Ok(Expr::Fragment {
            fragment,
            captures: capture_exprs,
            init: Box::new(init),
            ty: class_ty,
        })
    }
}
