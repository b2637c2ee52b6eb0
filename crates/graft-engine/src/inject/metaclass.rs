//! Metaclass expansion
//!
//! A metaclass body is a class whose first member is the `prototype`
//! parameter. Expanding it into a final class injects every other member of
//! the body, base metaclasses first, replacing references to the body with
//! the final class and references to the prototype with the prototype
//! argument.

use super::injector::{InjectionContext, Injector};
use crate::ast::{DeclId, DeclKind};
use crate::error::InjectError;
use crate::session::Session;
use log::debug;

impl Session {
    /// Expand `meta` into `final_class`. Injected fields are appended to
    /// `fields`.
    ///
    /// Members that fail to inject are reported and leave `final_class`
    /// invalid; the expansion then ends with `InjectionFailed`.
    pub fn apply_metaclass(
        &mut self,
        meta: DeclId,
        proto_arg: DeclId,
        final_class: DeclId,
        fields: &mut Vec<DeclId>,
    ) -> Result<(), InjectError> {
        let mut cx = InjectionContext::new(None, final_class);
        let failed = self.expand_metaclass(&mut cx, meta, proto_arg, final_class, fields)?;
        if failed > 0 {
            self.program.decl_mut(final_class).flags.invalid = true;
            return Err(InjectError::InjectionFailed { failed });
        }
        Ok(())
    }

    fn expand_metaclass(
        &mut self,
        cx: &mut InjectionContext,
        meta: DeclId,
        proto_arg: DeclId,
        final_class: DeclId,
        fields: &mut Vec<DeclId>,
    ) -> Result<usize, InjectError> {
        let def = match &self.program.decl(meta).kind {
            DeclKind::Metaclass(m) => m.definition,
            _ => {
                return Err(InjectError::MetaclassBaseNotMetaclass {
                    name: self.program.name_of(meta).to_string(),
                })
            }
        };

        // Bases are expanded completely before the derived body, so derived
        // members can refer to what the bases injected
        let mut failed = 0;
        let bases = self
            .program
            .class_data(def)
            .map(|c| c.bases.clone())
            .unwrap_or_default();
        for base in bases {
            let base_meta = self
                .program
                .class_of_type(base)
                .filter(|&c| self.program.is_metaclass_definition(c))
                .and_then(|c| self.program.owner(c))
                .ok_or_else(|| InjectError::MetaclassBaseNotMetaclass {
                    name: self.program.type_name(base),
                })?;
            failed += self.expand_metaclass(cx, base_meta, proto_arg, final_class, fields)?;
        }

        let members = self.program.decl(def).members.clone();
        let proto = members
            .first()
            .copied()
            .filter(|&p| matches!(self.program.decl(p).kind, DeclKind::TemplateTypeParam))
            .ok_or_else(|| InjectError::MissingPrototype {
                name: self.program.name_of(meta).to_string(),
            })?;

        let loc = self.program.decl(final_class).loc;
        debug!(
            "expanding metaclass '{}' into {}",
            self.program.name_of(meta),
            final_class
        );
        self.with_synthesis(loc, |s| {
            s.with_context(final_class, |s| {
                cx.source = Some(def);
                cx.dest = final_class;
                cx.add_substitution(def, final_class);
                cx.add_substitution(proto, proto_arg);

                Injector::new(s).transform_attributes(def, final_class);

                for member in members.into_iter().filter(|&m| m != proto) {
                    match Injector::new(s).inject_decl(cx, member) {
                        Ok(clone) => {
                            let decl = s.program.decl(clone);
                            if decl.flags.invalid {
                                failed += 1;
                            }
                            if matches!(decl.kind, DeclKind::Field(_)) {
                                fields.push(clone);
                            }
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            let member_loc = s.program.decl(member).loc;
                            s.report(&e, member_loc);
                            failed += 1;
                        }
                    }
                }
                Ok(failed)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Program, Stmt, TypeContext};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prototype_is_not_injected() {
        let mut program = Program::new();
        let (meta, def, _) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "plain");
        program.add_field(def, "x", TypeContext::INT, None);
        let proto_arg = program.add_class(DeclId::TRANSLATION_UNIT, "P");
        let target = program.add_class(DeclId::TRANSLATION_UNIT, "C");
        let mut session = Session::new(program);

        let mut fields = Vec::new();
        session
            .apply_metaclass(meta, proto_arg, target, &mut fields)
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(session.program.decl(target).members, fields);
        assert_eq!(session.program.name_of(fields[0]), "x");
    }

    #[test]
    fn test_references_to_body_become_final_class() {
        let mut program = Program::new();
        let (meta, def, _) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "m");
        let x = program.add_field(def, "x", TypeContext::INT, None);
        let get = program.add_method(def, "get", TypeContext::INT, &[]);
        let read = program.decl_ref(x).into_value();
        program.set_body(get, vec![Stmt::Return(Some(read))]);
        let attr = program.interner.intern("final");
        program.decl_mut(def).attrs.push(attr);
        let proto_arg = program.add_class(DeclId::TRANSLATION_UNIT, "P");
        let target = program.add_class(DeclId::TRANSLATION_UNIT, "C");
        let mut session = Session::new(program);

        let mut fields = Vec::new();
        session
            .apply_metaclass(meta, proto_arg, target, &mut fields)
            .unwrap();
        let members = session.program.decl(target).members.clone();
        let body = session.program.decl(members[1]).kind.function().and_then(|f| f.body.clone());
        let Some(Stmt::Return(Some(e))) = body.as_ref().and_then(|b| b.first()) else {
            panic!("expected a return statement");
        };
        assert_eq!(e.referenced_decl(), Some(members[0]));
        assert_eq!(session.program.decl(target).attrs, vec![attr]);
    }

    #[test]
    fn test_regular_base_is_rejected() {
        let mut program = Program::new();
        let (meta, def, _) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "m");
        let plain = program.add_class(DeclId::TRANSLATION_UNIT, "Plain");
        let plain_ty = program.types.record_type(plain);
        if let DeclKind::Class(c) = &mut program.decl_mut(def).kind {
            c.bases.push(plain_ty);
        }
        let target = program.add_class(DeclId::TRANSLATION_UNIT, "C");
        let mut session = Session::new(program);

        let result = session.apply_metaclass(meta, target, target, &mut Vec::new());
        assert_eq!(
            result,
            Err(InjectError::MetaclassBaseNotMetaclass {
                name: "Plain".to_string()
            })
        );
    }

    #[test]
    fn test_missing_prototype() {
        let mut program = Program::new();
        let (meta, def, proto) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "m");
        program.decl_mut(def).members.retain(|&m| m != proto);
        program.add_field(def, "x", TypeContext::INT, Some(Expr::IntLit(1)));
        let target = program.add_class(DeclId::TRANSLATION_UNIT, "C");
        let mut session = Session::new(program);

        let result = session.apply_metaclass(meta, target, target, &mut Vec::new());
        assert_eq!(result, Err(InjectError::MissingPrototype { name: "m".to_string() }));
    }
}
