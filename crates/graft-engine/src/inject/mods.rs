//! Modification traits
//!
//! A reflection may carry a `mods` record asking for post-hoc edits of the
//! declaration it is injected as: access, storage, constexpr, virtual and
//! pure. The record is found by name on the carrier class or, failing that,
//! on its first base, recursively.

use crate::ast::{Access, DeclId, DeclKind, Program, TypeContext, TypeId};
use crate::error::InjectError;
use crate::reflection::MODS_FIELD;
use crate::session::Session;
use crate::value::ConstValue;
use log::debug;
use serde::{Deserialize, Serialize};

/// Requested access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMod {
    /// Leave access unchanged
    #[default]
    None,
    /// `public`
    Public,
    /// `private`
    Private,
    /// `protected`
    Protected,
    /// The default access of the context (not supported)
    Default,
}

impl AccessMod {
    fn from_int(v: i64) -> Self {
        match v {
            1 => AccessMod::Public,
            2 => AccessMod::Private,
            3 => AccessMod::Protected,
            4 => AccessMod::Default,
            _ => AccessMod::None,
        }
    }

    fn to_int(self) -> i64 {
        match self {
            AccessMod::None => 0,
            AccessMod::Public => 1,
            AccessMod::Private => 2,
            AccessMod::Protected => 3,
            AccessMod::Default => 4,
        }
    }
}

/// Requested storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMod {
    /// Leave storage unchanged
    #[default]
    None,
    /// Make a member static
    Static,
    /// Automatic storage (not supported)
    Automatic,
    /// Thread-local storage (not supported)
    ThreadLocal,
}

impl StorageMod {
    fn from_int(v: i64) -> Self {
        match v {
            1 => StorageMod::Static,
            2 => StorageMod::Automatic,
            3 => StorageMod::ThreadLocal,
            _ => StorageMod::None,
        }
    }

    fn to_int(self) -> i64 {
        match self {
            StorageMod::None => 0,
            StorageMod::Static => 1,
            StorageMod::Automatic => 2,
            StorageMod::ThreadLocal => 3,
        }
    }
}

/// The modification trait record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifications {
    /// New access
    pub access: AccessMod,
    /// New storage
    pub storage: StorageMod,
    /// Make the declaration constexpr
    pub make_constexpr: bool,
    /// Make the member function virtual
    pub make_virtual: bool,
    /// Make the virtual member function pure
    pub make_pure: bool,
}

impl Modifications {
    /// Field names and types of the record's class, in layout order.
    /// `linkage` is part of the layout but never acted on.
    pub const FIELDS: [(&'static str, TypeId); 6] = [
        ("linkage", TypeContext::INT),
        ("access", TypeContext::INT),
        ("storage", TypeContext::INT),
        ("make_constexpr", TypeContext::BOOL),
        ("make_virtual", TypeContext::BOOL),
        ("make_pure", TypeContext::BOOL),
    ];

    /// Whether nothing is requested
    pub fn is_empty(&self) -> bool {
        *self == Modifications::default()
    }

    /// The record as a constant, laid out as `FIELDS`
    pub fn to_value(&self) -> ConstValue {
        ConstValue::aggregate(
            vec![],
            vec![
                ConstValue::Int(0),
                ConstValue::Int(self.access.to_int()),
                ConstValue::Int(self.storage.to_int()),
                ConstValue::Bool(self.make_constexpr),
                ConstValue::Bool(self.make_virtual),
                ConstValue::Bool(self.make_pure),
            ],
        )
    }

    /// Decode a record value of the class `class` by field name
    pub fn from_value(program: &Program, class: DeclId, value: &ConstValue) -> Self {
        let mut mods = Modifications::default();
        for (index, field) in program.fields(class).into_iter().enumerate() {
            let Some(v) = value.field(index) else {
                continue;
            };
            match program.name_of(field) {
                "access" => mods.access = AccessMod::from_int(v.as_int().unwrap_or(0)),
                "storage" => mods.storage = StorageMod::from_int(v.as_int().unwrap_or(0)),
                "make_constexpr" => mods.make_constexpr = v.as_bool().unwrap_or(false),
                "make_virtual" => mods.make_virtual = v.as_bool().unwrap_or(false),
                "make_pure" => mods.make_pure = v.as_bool().unwrap_or(false),
                _ => {}
            }
        }
        mods
    }

    /// Reject records that can never be applied
    pub fn validate(&self) -> Result<(), InjectError> {
        match self.storage {
            StorageMod::Automatic => return Err(InjectError::UnsupportedStorage("automatic")),
            StorageMod::ThreadLocal => return Err(InjectError::UnsupportedStorage("thread_local")),
            _ => {}
        }
        if self.access == AccessMod::Default {
            return Err(InjectError::UnsupportedAccess);
        }
        if self.make_pure && !self.make_virtual {
            return Err(InjectError::PureWithoutVirtual);
        }
        Ok(())
    }
}

/// Find the `mods` record of a reflection value of type `ty`.
///
/// Searches the carrier class, then its first base (with the first base
/// subobject of the value), recursively.
pub fn find_modifications(program: &Program, value: &ConstValue, ty: TypeId) -> Option<Modifications> {
    let class = program.class_of_type(ty)?;
    let fields = program.fields(class);
    if let Some(index) = fields.iter().position(|&f| program.name_of(f) == MODS_FIELD) {
        let field_ty = program.decl(fields[index]).value_type()?;
        let mods_class = program.class_of_type(field_ty)?;
        let record = value.field(index)?;
        return Some(Modifications::from_value(program, mods_class, record));
    }
    let base_ty = *program.class_data(class)?.bases.first()?;
    find_modifications(program, value.base(0)?, base_ty)
}

/// Check that every requested trait applies to `decl`, in the fixed order
/// access, constexpr, virtual, pure. Nothing is modified.
pub fn check_modifications(program: &Program, decl: DeclId, mods: &Modifications) -> Result<(), InjectError> {
    mods.validate()?;
    let d = program.decl(decl);

    if mods.access != AccessMod::None {
        let owner_is_record = d.owner.is_some_and(|o| program.decl(o).is_record());
        if !owner_is_record {
            return Err(InjectError::AccessOnNonMember);
        }
    }

    if mods.make_constexpr {
        match &d.kind {
            DeclKind::Var(_) => {}
            DeclKind::Destructor(_) => return Err(InjectError::ConstexprDestructor),
            kind if kind.function().is_some() => {}
            _ => return Err(InjectError::VirtualNonFunction),
        }
    }

    if mods.make_virtual {
        let method = match &d.kind {
            DeclKind::Method(m) | DeclKind::Destructor(m) => m,
            _ => return Err(InjectError::VirtualNonFunction),
        };
        if mods.make_pure {
            if method.is_defaulted {
                return Err(InjectError::PureOnDefaulted);
            }
            if method.is_deleted {
                return Err(InjectError::PureOnDeleted);
            }
            if method.is_defined() {
                return Err(InjectError::PureOnDefined);
            }
        }
    }

    Ok(())
}

impl Session {
    /// Apply a modification record to an injected declaration.
    ///
    /// Every trait is checked before any is applied, so a failing record
    /// leaves the declaration untouched apart from the invalid flag.
    pub fn apply_modifications(&mut self, decl: DeclId, mods: &Modifications) -> Result<(), InjectError> {
        if let Err(e) = check_modifications(&self.program, decl, mods) {
            self.program.decl_mut(decl).flags.invalid = true;
            return Err(e);
        }
        if mods.is_empty() {
            return Ok(());
        }
        debug!("applying {:?} to {}", mods, decl);

        let access = match mods.access {
            AccessMod::Public => Some(Access::Public),
            AccessMod::Private => Some(Access::Private),
            AccessMod::Protected => Some(Access::Protected),
            AccessMod::None | AccessMod::Default => None,
        };
        if let Some(access) = access {
            self.program.decl_mut(decl).access = access;
        }

        if mods.make_constexpr {
            let is_var = match &mut self.program.decl_mut(decl).kind {
                DeclKind::Var(v) => {
                    v.is_constexpr = true;
                    true
                }
                kind => {
                    if let Some(f) = kind.function_mut() {
                        f.is_constexpr = true;
                    }
                    false
                }
            };
            let checked = if is_var {
                self.validator().check_variable(&self.program, decl)
            } else {
                self.validator().check_constexpr_function(&self.program, decl)
            };
            self.validation_result(decl, checked)?;
        }

        if mods.make_virtual {
            if let Some(m) = self.program.decl_mut(decl).kind.method_mut() {
                m.is_virtual = true;
                m.is_pure = mods.make_pure;
            }
            if mods.make_pure {
                let checked = self.validator().check_pure_method(&self.program, decl);
                self.validation_result(decl, checked)?;
            }
        }

        Ok(())
    }

    fn validation_result(&mut self, decl: DeclId, checked: Result<(), String>) -> Result<(), InjectError> {
        checked.map_err(|message| {
            self.program.decl_mut(decl).flags.invalid = true;
            InjectError::ValidationFailed { message }
        })
    }
}
