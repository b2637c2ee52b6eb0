//! Reflection carrier types
//!
//! A reflection of a declaration has an implicit class type whose
//! `reflectee` names the declaration. Fragment types and modified
//! reflections derive from such a class, so the reflected declaration is
//! always found by walking the first-base chain.

use crate::ast::{ClassData, Decl, DeclId, DeclKind, Expr, FieldData, Program, TypeId};
use crate::inject::mods::Modifications;

/// Name of the synthesized class describing modification traits
pub const MODIFICATIONS_CLASS: &str = "__modification_traits";

/// Name of the field holding the modification traits
pub const MODS_FIELD: &str = "mods";

impl Program {
    /// The carrier type of `reflexpr(decl)`
    pub fn reflection_type(&mut self, decl: DeclId) -> TypeId {
        let existing = self.iter().find_map(|(id, d)| match &d.kind {
            DeclKind::Class(c) if d.flags.implicit && c.reflectee == Some(decl) => Some(id),
            _ => None,
        });
        let class = match existing {
            Some(class) => class,
            None => {
                let mut d = Decl::new(
                    None,
                    DeclKind::Class(ClassData {
                        reflectee: Some(decl),
                        ..ClassData::default()
                    }),
                    Some(DeclId::TRANSLATION_UNIT),
                );
                d.flags.implicit = true;
                self.alloc(d)
            }
        };
        self.types.record_type(class)
    }

    /// The declaration reflected by a value of type `ty`
    pub fn reflectee_of_type(&self, ty: TypeId) -> Option<DeclId> {
        let class = self.class_of_type(ty)?;
        let data = self.class_data(class)?;
        match data.reflectee {
            Some(decl) => Some(decl),
            None => data.bases.first().and_then(|&b| self.reflectee_of_type(b)),
        }
    }

    /// Whether values of `ty` are reflections
    pub fn is_reflection_type(&self, ty: TypeId) -> bool {
        self.reflectee_of_type(ty).is_some()
    }

    /// Whether `ty` is the type of a fragment expression
    pub fn is_fragment_type(&self, ty: TypeId) -> bool {
        self.class_of_type(ty)
            .and_then(|c| self.class_data(c))
            .is_some_and(|c| c.is_fragment)
    }

    /// `reflexpr(decl)`
    pub fn build_reflection(&mut self, decl: DeclId) -> Expr {
        let ty = self.reflection_type(decl);
        Expr::Reflect { decl, ty }
    }

    /// The class describing modification traits; its field order is fixed
    pub fn modifications_type(&mut self) -> TypeId {
        let existing = self.iter().find_map(|(id, d)| {
            let is_mods = d.flags.implicit
                && d.is_record()
                && d.owner == Some(DeclId::TRANSLATION_UNIT)
                && d.name.is_some_and(|n| self.interner.resolve(n) == MODIFICATIONS_CLASS);
            is_mods.then_some(id)
        });
        if let Some(class) = existing {
            return self.types.record_type(class);
        }

        let name = self.interner.intern(MODIFICATIONS_CLASS);
        let mut d = Decl::new(
            Some(name),
            DeclKind::Class(ClassData::default()),
            Some(DeclId::TRANSLATION_UNIT),
        );
        d.flags.implicit = true;
        let class = self.alloc(d);
        for (field, ty) in Modifications::FIELDS {
            let f = self.add_field(class, field, ty, None);
            self.decl_mut(f).flags.implicit = true;
        }
        self.types.record_type(class)
    }

    /// A reflection carrying requested modifications: a class deriving from
    /// the operand's type with one `mods` field
    pub fn build_modify(&mut self, operand: Expr, mods: Modifications) -> Expr {
        let mods_ty = self.modifications_type();
        let mut d = Decl::new(
            None,
            DeclKind::Class(ClassData {
                bases: vec![operand.ty()],
                ..ClassData::default()
            }),
            Some(DeclId::TRANSLATION_UNIT),
        );
        d.flags.implicit = true;
        let class = self.alloc(d);
        let field = self.add_decl(
            class,
            Some(MODS_FIELD),
            DeclKind::Field(FieldData {
                ty: mods_ty,
                init: None,
                is_mutable: false,
            }),
        );
        self.decl_mut(field).flags.implicit = true;
        let ty = self.types.record_type(class);
        Expr::Modify {
            operand: Box::new(operand),
            mods,
            ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeContext;

    #[test]
    fn test_reflection_type_is_memoized() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let a = program.reflection_type(s);
        let b = program.reflection_type(s);
        assert_eq!(a, b);
        assert_eq!(program.reflectee_of_type(a), Some(s));
        assert!(!program.is_fragment_type(a));
    }

    #[test]
    fn test_modified_reflection_keeps_reflectee() {
        let mut program = Program::new();
        let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
        let f = program.add_method(s, "f", TypeContext::VOID, &[]);
        let r = program.build_reflection(f);
        let m = program.build_modify(r, Modifications::default());

        assert_eq!(program.reflectee_of_type(m.ty()), Some(f));
        assert!(program.is_reflection_type(m.ty()));
        assert!(!program.is_reflection_type(TypeContext::INT));
    }

    #[test]
    fn test_modifications_type_is_shared() {
        let mut program = Program::new();
        let a = program.modifications_type();
        let b = program.modifications_type();
        assert_eq!(a, b);
        let class = program.class_of_type(a).unwrap();
        assert_eq!(program.fields(class).len(), Modifications::FIELDS.len());
    }
}
