//! Declaration arena
//!
//! Every declaration lives in one `Program` and is addressed by a `DeclId`.
//! Owners, members, parameters and the declarations named by expressions are
//! all stored as ids, so the owner/member back-references never form
//! ownership cycles.

use super::expr::{Expr, Stmt};
use super::types::{Type, TypeContext, TypeId};
use crate::interner::{Interner, Name};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a declaration in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub(crate) u32);

impl DeclId {
    /// The translation unit is always the first declaration
    pub const TRANSLATION_UNIT: DeclId = DeclId(0);

    /// Create a new DeclId from a raw value
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value of this DeclId
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source location (line/column, 1-based; 0 means unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLoc {
    /// Line number
    pub line: u32,
    /// Column number
    pub column: u32,
}

impl SourceLoc {
    /// Create a location
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Member access of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Access {
    /// Not a class member
    #[default]
    None,
    /// `public`
    Public,
    /// `private`
    Private,
    /// `protected`
    Protected,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::None => write!(f, "none"),
            Access::Public => write!(f, "public"),
            Access::Private => write!(f, "private"),
            Access::Protected => write!(f, "protected"),
        }
    }
}

/// Bookkeeping flags shared by every declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclFlags {
    /// Synthesized by the engine rather than written
    pub implicit: bool,
    /// Semantic errors were found in the declaration
    pub invalid: bool,
    /// Odr-used
    pub used: bool,
    /// Referenced at least once
    pub referenced: bool,
    /// Stand-in for a captured value inside a fragment
    pub placeholder: bool,
}

/// Variables and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarData {
    /// Declared type
    pub ty: TypeId,
    /// Initializer (default argument for parameters)
    pub init: Option<Expr>,
    /// Static storage
    #[serde(default)]
    pub is_static: bool,
    /// `constexpr`
    #[serde(default)]
    pub is_constexpr: bool,
    /// Declared in a function body
    #[serde(default)]
    pub is_local: bool,
}

impl VarData {
    /// A non-local variable
    pub fn new(ty: TypeId, init: Option<Expr>) -> Self {
        Self {
            ty,
            init,
            is_static: false,
            is_constexpr: false,
            is_local: false,
        }
    }

    /// A variable declared in a function body
    pub fn local(ty: TypeId, init: Option<Expr>) -> Self {
        Self {
            is_local: true,
            ..Self::new(ty, init)
        }
    }
}

/// Non-static data members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    /// Declared type
    pub ty: TypeId,
    /// In-class initializer
    pub init: Option<Expr>,
    /// `mutable`
    #[serde(default)]
    pub is_mutable: bool,
}

/// Free functions, and the function part of every member function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionData {
    /// Return type
    pub ret: TypeId,
    /// Parameters, owned by the function but not listed among its members
    pub params: Vec<DeclId>,
    /// Definition; `None` for a declaration without a body
    pub body: Option<Vec<Stmt>>,
    /// `constexpr`
    #[serde(default)]
    pub is_constexpr: bool,
}

impl FunctionData {
    /// A function declaration without a body
    pub fn new(ret: TypeId, params: Vec<DeclId>) -> Self {
        Self {
            ret,
            params,
            body: None,
            is_constexpr: false,
        }
    }
}

/// Member functions, constructors and destructors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodData {
    /// Signature and body
    pub func: FunctionData,
    /// Static member function
    #[serde(default)]
    pub is_static: bool,
    /// `virtual` as written
    #[serde(default)]
    pub is_virtual: bool,
    /// `= 0`
    #[serde(default)]
    pub is_pure: bool,
    /// `= default`
    #[serde(default)]
    pub is_defaulted: bool,
    /// `= delete`
    #[serde(default)]
    pub is_deleted: bool,
    /// `explicit` (constructors)
    #[serde(default)]
    pub is_explicit: bool,
}

impl MethodData {
    /// A plain instance member function
    pub fn new(func: FunctionData) -> Self {
        Self {
            func,
            is_static: false,
            is_virtual: false,
            is_pure: false,
            is_defaulted: false,
            is_deleted: false,
            is_explicit: false,
        }
    }

    /// Whether the member function has a body
    pub fn is_defined(&self) -> bool {
        self.func.body.is_some()
    }
}

/// Subobject initialized by a constructor initializer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitTarget {
    /// Base class subobject
    Base(TypeId),
    /// Data member
    Field(DeclId),
}

/// A constructor's mem-initializer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtorInit {
    /// What is initialized
    pub target: InitTarget,
    /// Initializer arguments
    pub args: Vec<Expr>,
}

/// Classes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassData {
    /// Base class types, in base-specifier order
    pub bases: Vec<TypeId>,
    /// The class is the type of a fragment expression
    pub is_fragment: bool,
    /// The class is the carrier type of a reflection of this declaration
    pub reflectee: Option<DeclId>,
}

/// Fragments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentData {
    /// The fragment's content (a class, namespace or statement block)
    pub content: Option<DeclId>,
}

/// Metaclasses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaclassData {
    /// The class holding the metaclass body; its first member is the
    /// prototype parameter
    pub definition: DeclId,
}

/// A deferred injection declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionDeclData {
    /// The still-dependent reflection operand
    pub operand: Expr,
}

/// The closed set of declaration kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclKind {
    /// The translation unit
    TranslationUnit,
    /// A namespace
    Namespace,
    /// A class
    Class(ClassData),
    /// A non-static data member
    Field(FieldData),
    /// A variable (local, namespace-scope, or static member)
    Var(VarData),
    /// A function parameter
    Param(VarData),
    /// A free function
    Function(FunctionData),
    /// A member function
    Method(MethodData),
    /// A constructor
    Constructor(MethodData, Vec<CtorInit>),
    /// A destructor
    Destructor(MethodData),
    /// A template type parameter
    TemplateTypeParam,
    /// A fragment
    Fragment(FragmentData),
    /// The content of a statement fragment
    StmtBlock(Vec<Stmt>),
    /// A metaclass
    Metaclass(MetaclassData),
    /// A deferred injection
    Injection(InjectionDeclData),
}

impl DeclKind {
    /// Short name of the kind for messages
    pub fn describe(&self) -> &'static str {
        match self {
            DeclKind::TranslationUnit => "translation unit",
            DeclKind::Namespace => "namespace",
            DeclKind::Class(_) => "class",
            DeclKind::Field(_) => "field",
            DeclKind::Var(_) => "variable",
            DeclKind::Param(_) => "parameter",
            DeclKind::Function(_) => "function",
            DeclKind::Method(_) => "member function",
            DeclKind::Constructor(..) => "constructor",
            DeclKind::Destructor(_) => "destructor",
            DeclKind::TemplateTypeParam => "template type parameter",
            DeclKind::Fragment(_) => "fragment",
            DeclKind::StmtBlock(_) => "statement block",
            DeclKind::Metaclass(_) => "metaclass",
            DeclKind::Injection(_) => "injection",
        }
    }

    /// Function data of any function-like kind
    pub fn function(&self) -> Option<&FunctionData> {
        match self {
            DeclKind::Function(f) => Some(f),
            DeclKind::Method(m) | DeclKind::Constructor(m, _) | DeclKind::Destructor(m) => {
                Some(&m.func)
            }
            _ => None,
        }
    }

    /// Mutable function data of any function-like kind
    pub fn function_mut(&mut self) -> Option<&mut FunctionData> {
        match self {
            DeclKind::Function(f) => Some(f),
            DeclKind::Method(m) | DeclKind::Constructor(m, _) | DeclKind::Destructor(m) => {
                Some(&mut m.func)
            }
            _ => None,
        }
    }

    /// Member function data of methods, constructors and destructors
    pub fn method(&self) -> Option<&MethodData> {
        match self {
            DeclKind::Method(m) | DeclKind::Constructor(m, _) | DeclKind::Destructor(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable member function data
    pub fn method_mut(&mut self) -> Option<&mut MethodData> {
        match self {
            DeclKind::Method(m) | DeclKind::Constructor(m, _) | DeclKind::Destructor(m) => Some(m),
            _ => None,
        }
    }
}

/// A declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    /// Identifier; `None` for anonymous declarations
    pub name: Option<Name>,
    /// Kind-specific data
    pub kind: DeclKind,
    /// Owning context (`None` only for the translation unit)
    pub owner: Option<DeclId>,
    /// Member declarations, in declaration order
    #[serde(default)]
    pub members: Vec<DeclId>,
    /// Member access
    #[serde(default)]
    pub access: Access,
    /// Bookkeeping flags
    #[serde(default)]
    pub flags: DeclFlags,
    /// Attributes as written
    #[serde(default)]
    pub attrs: Vec<Name>,
    /// Location
    #[serde(default)]
    pub loc: SourceLoc,
}

impl Decl {
    /// A declaration with default flags and no members
    pub fn new(name: Option<Name>, kind: DeclKind, owner: Option<DeclId>) -> Self {
        Self {
            name,
            kind,
            owner,
            members: Vec::new(),
            access: Access::None,
            flags: DeclFlags::default(),
            attrs: Vec::new(),
            loc: SourceLoc::default(),
        }
    }

    /// Type of a value declaration
    pub fn value_type(&self) -> Option<TypeId> {
        match &self.kind {
            DeclKind::Var(v) | DeclKind::Param(v) => Some(v.ty),
            DeclKind::Field(f) => Some(f.ty),
            _ => None,
        }
    }

    /// Whether the declaration can own other declarations
    pub fn is_context(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::TranslationUnit
                | DeclKind::Namespace
                | DeclKind::Class(_)
                | DeclKind::Function(_)
                | DeclKind::Method(_)
                | DeclKind::Constructor(..)
                | DeclKind::Destructor(_)
                | DeclKind::Fragment(_)
                | DeclKind::StmtBlock(_)
                | DeclKind::Metaclass(_)
        )
    }

    /// Functions and member functions of every flavour
    pub fn is_function_or_method(&self) -> bool {
        self.kind.function().is_some()
    }

    /// Classes
    pub fn is_record(&self) -> bool {
        matches!(self.kind, DeclKind::Class(_))
    }

    /// Namespaces and the translation unit
    pub fn is_file_context(&self) -> bool {
        matches!(self.kind, DeclKind::Namespace | DeclKind::TranslationUnit)
    }

    /// Fields and member functions (the declarations a storage change applies to)
    pub fn is_class_member(&self) -> bool {
        matches!(self.kind, DeclKind::Field(_) | DeclKind::Method(_))
    }

    /// Instance (non-static) members
    pub fn is_instance_member(&self) -> bool {
        match &self.kind {
            DeclKind::Field(_) => true,
            DeclKind::Method(m) => !m.is_static,
            _ => false,
        }
    }
}

/// The declaration universe of one compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    decls: Vec<Decl>,
    /// Interned types
    pub types: TypeContext,
    /// Interned identifiers
    pub interner: Interner,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// An empty program holding only the translation unit
    pub fn new() -> Self {
        Self {
            decls: vec![Decl::new(None, DeclKind::TranslationUnit, None)],
            types: TypeContext::new(),
            interner: Interner::new(),
        }
    }

    /// Number of declarations in the arena
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Whether the arena holds only the translation unit
    pub fn is_empty(&self) -> bool {
        self.decls.len() <= 1
    }

    /// Whether `id` names a declaration of this program
    pub fn contains(&self, id: DeclId) -> bool {
        (id.0 as usize) < self.decls.len()
    }

    /// Get a declaration.
    ///
    /// Ids are only minted by this arena, so an out-of-range id is a bug in
    /// the caller.
    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    /// Get a declaration mutably
    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    /// Iterate all declarations with their ids
    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Decl)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId(i as u32), d))
    }

    /// Allocate a declaration without listing it among its owner's members
    pub fn alloc(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    /// Append `member` to the member list of `owner`
    pub fn add_member(&mut self, owner: DeclId, member: DeclId) {
        self.decl_mut(owner).members.push(member);
    }

    /// Allocate a declaration and add it to its owner
    pub fn add_decl(&mut self, owner: DeclId, name: Option<&str>, kind: DeclKind) -> DeclId {
        let name = name.map(|n| self.interner.intern(n));
        let access = if self.decl(owner).is_record() {
            Access::Public
        } else {
            Access::None
        };
        let mut decl = Decl::new(name, kind, Some(owner));
        decl.access = access;
        let id = self.alloc(decl);
        self.add_member(owner, id);
        id
    }

    /// Whether `member` is listed among the members of its owner
    pub fn is_attached(&self, member: DeclId) -> bool {
        self.decl(member)
            .owner
            .is_some_and(|owner| self.decl(owner).members.contains(&member))
    }

    /// The name of a declaration as a string (empty for anonymous ones)
    pub fn name_of(&self, id: DeclId) -> &str {
        self.decl(id)
            .name
            .map(|n| self.interner.resolve(n))
            .unwrap_or("")
    }

    /// The owning context
    pub fn owner(&self, id: DeclId) -> Option<DeclId> {
        self.decl(id).owner
    }

    /// Whether `ancestor` appears on the owner chain of `id` (excluding `id`
    /// itself)
    pub fn is_within(&self, id: DeclId, ancestor: DeclId) -> bool {
        let mut cur = self.owner(id);
        while let Some(dc) = cur {
            if dc == ancestor {
                return true;
            }
            cur = self.owner(dc);
        }
        false
    }

    /// The nearest function-like declaration enclosing `id`, including `id`
    pub fn enclosing_function(&self, id: DeclId) -> Option<DeclId> {
        let mut cur = Some(id);
        while let Some(dc) = cur {
            if self.decl(dc).is_function_or_method() {
                return Some(dc);
            }
            cur = self.owner(dc);
        }
        None
    }

    /// Declarations named `name` declared directly in `context`.
    ///
    /// Function contexts also search their parameters. Invalid and
    /// placeholder declarations are not found.
    pub fn lookup(&self, context: DeclId, name: Name) -> Vec<DeclId> {
        let ctx = self.decl(context);
        let params = ctx
            .kind
            .function()
            .map(|f| f.params.as_slice())
            .unwrap_or(&[]);
        params
            .iter()
            .chain(ctx.members.iter())
            .copied()
            .filter(|&m| {
                let d = self.decl(m);
                d.name == Some(name) && !d.flags.invalid && !d.flags.placeholder
            })
            .collect()
    }

    /// Look up by string, without interning it
    pub fn lookup_str(&self, context: DeclId, name: &str) -> Vec<DeclId> {
        match self.interner.get(name) {
            Some(name) => self.lookup(context, name),
            None => Vec::new(),
        }
    }

    /// The fields of a class, in declaration order
    pub fn fields(&self, class: DeclId) -> Vec<DeclId> {
        self.decl(class)
            .members
            .iter()
            .copied()
            .filter(|&m| matches!(self.decl(m).kind, DeclKind::Field(_)))
            .collect()
    }

    /// Class data of a class declaration
    pub fn class_data(&self, id: DeclId) -> Option<&ClassData> {
        match &self.decl(id).kind {
            DeclKind::Class(c) => Some(c),
            _ => None,
        }
    }

    /// The type a reference to `id` has
    pub fn decl_type(&mut self, id: DeclId) -> TypeId {
        let decl = self.decl(id);
        if let Some(ty) = decl.value_type() {
            return ty;
        }
        match &decl.kind {
            DeclKind::Class(_) => self.types.record_type(id),
            DeclKind::TemplateTypeParam => self.types.template_param_type(id),
            kind => match kind.function() {
                Some(f) => {
                    let ret = f.ret;
                    let params: Vec<TypeId> = f
                        .params
                        .iter()
                        .filter_map(|&p| self.decl(p).value_type())
                        .collect();
                    self.types.function_type(params, ret)
                }
                None => TypeContext::VOID,
            },
        }
    }

    /// Whether a class is the definition of a metaclass
    pub fn is_metaclass_definition(&self, class: DeclId) -> bool {
        self.owner(class).is_some_and(|owner| {
            matches!(&self.decl(owner).kind, DeclKind::Metaclass(m) if m.definition == class)
        })
    }

    /// The class behind a record type
    pub fn class_of_type(&self, ty: TypeId) -> Option<DeclId> {
        self.types.as_record(ty)
    }

    /// Human-readable spelling of a type
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.types.get(ty) {
            Some(Type::Primitive(p)) => p.to_string(),
            Some(Type::Dependent) => "<dependent>".to_string(),
            Some(Type::Record(class)) | Some(Type::TemplateParam(class)) => {
                let name = self.name_of(*class);
                if name.is_empty() {
                    format!("<anonymous {}>", class)
                } else {
                    name.to_string()
                }
            }
            Some(Type::Reflected { reflection, .. }) => {
                format!("typename({})", self.interner.resolve(*reflection))
            }
            Some(Type::Function { params, ret }) => {
                let params: Vec<String> = params.iter().map(|p| self.type_name(*p)).collect();
                format!("{}({})", self.type_name(*ret), params.join(", "))
            }
            None => format!("<invalid {}>", ty),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

impl Program {
    /// Add a namespace
    pub fn add_namespace(&mut self, owner: DeclId, name: &str) -> DeclId {
        self.add_decl(owner, Some(name), DeclKind::Namespace)
    }

    /// Add a class
    pub fn add_class(&mut self, owner: DeclId, name: &str) -> DeclId {
        self.add_decl(owner, Some(name), DeclKind::Class(ClassData::default()))
    }

    /// Add a data member
    pub fn add_field(&mut self, class: DeclId, name: &str, ty: TypeId, init: Option<Expr>) -> DeclId {
        self.add_decl(
            class,
            Some(name),
            DeclKind::Field(FieldData {
                ty,
                init,
                is_mutable: false,
            }),
        )
    }

    /// Add a variable
    pub fn add_var(&mut self, owner: DeclId, name: &str, data: VarData) -> DeclId {
        self.add_decl(owner, Some(name), DeclKind::Var(data))
    }

    /// Allocate parameters owned by `function`
    fn alloc_params(&mut self, function: DeclId, params: &[(&str, TypeId)]) -> Vec<DeclId> {
        params
            .iter()
            .map(|(name, ty)| {
                let name = self.interner.intern(name);
                self.alloc(Decl::new(
                    Some(name),
                    DeclKind::Param(VarData::new(*ty, None)),
                    Some(function),
                ))
            })
            .collect()
    }

    /// Add a free function without a body
    pub fn add_function(
        &mut self,
        owner: DeclId,
        name: &str,
        ret: TypeId,
        params: &[(&str, TypeId)],
    ) -> DeclId {
        let id = self.add_decl(owner, Some(name), DeclKind::Function(FunctionData::new(ret, vec![])));
        let params = self.alloc_params(id, params);
        if let Some(f) = self.decl_mut(id).kind.function_mut() {
            f.params = params;
        }
        id
    }

    /// Add an instance member function without a body
    pub fn add_method(
        &mut self,
        class: DeclId,
        name: &str,
        ret: TypeId,
        params: &[(&str, TypeId)],
    ) -> DeclId {
        let id = self.add_decl(
            class,
            Some(name),
            DeclKind::Method(MethodData::new(FunctionData::new(ret, vec![]))),
        );
        let params = self.alloc_params(id, params);
        if let Some(f) = self.decl_mut(id).kind.function_mut() {
            f.params = params;
        }
        id
    }

    /// Add a destructor without a body
    pub fn add_destructor(&mut self, class: DeclId) -> DeclId {
        let name = format!("~{}", self.name_of(class));
        self.add_decl(
            class,
            Some(&name),
            DeclKind::Destructor(MethodData::new(FunctionData::new(TypeContext::VOID, vec![]))),
        )
    }

    /// Add a metaclass; returns `(metaclass, definition, prototype)`
    pub fn add_metaclass(&mut self, owner: DeclId, name: &str) -> (DeclId, DeclId, DeclId) {
        let meta = self.add_decl(
            owner,
            Some(name),
            DeclKind::Metaclass(MetaclassData {
                definition: DeclId::TRANSLATION_UNIT,
            }),
        );
        let def = self.add_class(meta, name);
        let proto = self.add_decl(def, Some("prototype"), DeclKind::TemplateTypeParam);
        self.decl_mut(proto).flags.implicit = true;
        self.decl_mut(meta).kind = DeclKind::Metaclass(MetaclassData { definition: def });
        (meta, def, proto)
    }

    /// Set the body of any function-like declaration
    pub fn set_body(&mut self, function: DeclId, body: Vec<Stmt>) {
        if let Some(f) = self.decl_mut(function).kind.function_mut() {
            f.body = Some(body);
        }
    }

    /// Parameters of a function-like declaration
    pub fn params(&self, function: DeclId) -> &[DeclId] {
        self.decl(function)
            .kind
            .function()
            .map(|f| f.params.as_slice())
            .unwrap_or(&[])
    }

    /// A reference to a declaration, typed by the declaration
    pub fn decl_ref(&mut self, id: DeclId) -> Expr {
        let ty = self.decl_type(id);
        Expr::DeclRef { decl: id, ty }
    }
}
