use graft_engine::ast::{FragmentData, Stmt};
use graft_engine::{DeclId, DeclKind, InjectError, Program, Session, TypeContext};
use pretty_assertions::assert_eq;

/// `meta` inherits from `base`
fn derive_metaclass(program: &mut Program, meta_def: DeclId, base_def: DeclId) {
    let base_ty = program.types.record_type(base_def);
    if let DeclKind::Class(c) = &mut program.decl_mut(meta_def).kind {
        c.bases.push(base_ty);
    }
}

fn returned_decl(program: &Program, function: DeclId) -> Option<DeclId> {
    let body = program.decl(function).kind.function()?.body.as_ref()?;
    match body.first()? {
        Stmt::Return(Some(e)) => e.referenced_decl(),
        _ => None,
    }
}

#[test]
fn test_base_members_come_first() {
    let mut program = Program::new();
    let (_, base_def, _) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "base");
    let b = program.add_field(base_def, "b", TypeContext::INT, None);
    let (derived, derived_def, _) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "derived");
    derive_metaclass(&mut program, derived_def, base_def);
    let get = program.add_method(derived_def, "get", TypeContext::INT, &[]);
    let read = program.decl_ref(b).into_value();
    program.set_body(get, vec![Stmt::Return(Some(read))]);
    program.add_field(derived_def, "d", TypeContext::BOOL, None);

    let proto_arg = program.add_class(DeclId::TRANSLATION_UNIT, "Proto");
    let target = program.add_class(DeclId::TRANSLATION_UNIT, "Final");
    let mut session = Session::new(program);

    let mut fields = Vec::new();
    session
        .apply_metaclass(derived, proto_arg, target, &mut fields)
        .unwrap();

    let program = &session.program;
    let members = program.decl(target).members.clone();
    let names: Vec<&str> = members.iter().map(|&m| program.name_of(m)).collect();
    assert_eq!(names, vec!["b", "get", "d"]);
    assert_eq!(fields, vec![members[0], members[2]]);
    assert_eq!(returned_decl(program, members[1]), Some(members[0]));
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_prototype_references_become_argument() {
    let mut program = Program::new();
    let (meta, def, proto) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "boxed");
    let proto_ty = program.types.template_param_type(proto);
    program.add_field(def, "inner", proto_ty, None);
    let proto_arg = program.add_class(DeclId::TRANSLATION_UNIT, "Payload");
    let target = program.add_class(DeclId::TRANSLATION_UNIT, "Box");
    let mut session = Session::new(program);

    let mut fields = Vec::new();
    session
        .apply_metaclass(meta, proto_arg, target, &mut fields)
        .unwrap();

    let ty = session.program.decl(fields[0]).value_type().unwrap();
    assert_eq!(session.program.class_of_type(ty), Some(proto_arg));
}

#[test]
fn test_failed_member_invalidates_final_class() {
    let mut program = Program::new();
    let (meta, def, _) = program.add_metaclass(DeclId::TRANSLATION_UNIT, "broken");
    program.add_field(def, "kept", TypeContext::INT, None);
    program.add_decl(def, None, DeclKind::Fragment(FragmentData::default()));
    let proto_arg = program.add_class(DeclId::TRANSLATION_UNIT, "Proto");
    let target = program.add_class(DeclId::TRANSLATION_UNIT, "Final");
    let mut session = Session::new(program);

    let mut fields = Vec::new();
    let result = session.apply_metaclass(meta, proto_arg, target, &mut fields);
    assert_eq!(result, Err(InjectError::InjectionFailed { failed: 1 }));
    assert!(session.program.decl(target).flags.invalid);
    assert_eq!(fields.len(), 1);
    assert_eq!(
        session.diagnostics()[0].code,
        InjectError::NestedFragment.code()
    );
}
