//! Type representation and interning
//!
//! Identical types share one `TypeId`, so the cloner can compare and remap
//! types by identity.

use super::decl::DeclId;
use crate::interner::Name;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a type in the type context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Create a new TypeId from a raw value
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value of this TypeId
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// `int` (64-bit signed)
    Int,
    /// `string`
    Str,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Void => write!(f, "void"),
            PrimitiveType::Bool => write!(f, "bool"),
            PrimitiveType::Int => write!(f, "int"),
            PrimitiveType::Str => write!(f, "string"),
        }
    }
}

/// A type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Primitive type
    Primitive(PrimitiveType),
    /// A type that is not known until template arguments or captured values are
    Dependent,
    /// The type of a class declaration
    Record(DeclId),
    /// A template type parameter
    TemplateParam(DeclId),
    /// A type spelled through a reflection (`typename(r)`), sugar over `underlying`
    Reflected {
        /// Name of the reflection the type was spelled with
        reflection: Name,
        /// The reflected type
        underlying: TypeId,
    },
    /// Function signature
    Function {
        /// Parameter types
        params: Vec<TypeId>,
        /// Return type
        ret: TypeId,
    },
}

/// Type context that manages all types in a program
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Type>", into = "Vec<Type>")]
pub struct TypeContext {
    /// Storage for all types, indexed by TypeId
    types: Vec<Type>,
    /// Reverse mapping from Type to TypeId for interning
    type_to_id: FxHashMap<Type, TypeId>,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    /// Well-known id of `void`
    pub const VOID: TypeId = TypeId(0);
    /// Well-known id of `bool`
    pub const BOOL: TypeId = TypeId(1);
    /// Well-known id of `int`
    pub const INT: TypeId = TypeId(2);
    /// Well-known id of `string`
    pub const STR: TypeId = TypeId(3);
    /// Well-known id of the dependent type
    pub const DEPENDENT: TypeId = TypeId(4);

    /// Create a new context with the well-known types pre-interned
    pub fn new() -> Self {
        let mut ctx = TypeContext {
            types: Vec::new(),
            type_to_id: FxHashMap::default(),
        };

        // Order must match the well-known ids above
        ctx.intern(Type::Primitive(PrimitiveType::Void));
        ctx.intern(Type::Primitive(PrimitiveType::Bool));
        ctx.intern(Type::Primitive(PrimitiveType::Int));
        ctx.intern(Type::Primitive(PrimitiveType::Str));
        ctx.intern(Type::Dependent);

        ctx
    }

    /// Intern a type, returning its TypeId
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.type_to_id.get(&ty) {
            return id;
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.type_to_id.insert(ty, id);
        id
    }

    /// Get a type by its TypeId
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.0 as usize)
    }

    /// Look up a type's ID without interning
    pub fn lookup(&self, ty: &Type) -> Option<TypeId> {
        self.type_to_id.get(ty).copied()
    }

    /// The type of a class declaration
    pub fn record_type(&mut self, class: DeclId) -> TypeId {
        self.intern(Type::Record(class))
    }

    /// The type named by a template type parameter
    pub fn template_param_type(&mut self, param: DeclId) -> TypeId {
        self.intern(Type::TemplateParam(param))
    }

    /// A type spelled through a reflection
    pub fn reflected_type(&mut self, reflection: Name, underlying: TypeId) -> TypeId {
        self.intern(Type::Reflected {
            reflection,
            underlying,
        })
    }

    /// A function signature type
    pub fn function_type(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(Type::Function { params, ret })
    }

    /// The class declaration behind a record type, if any
    pub fn as_record(&self, id: TypeId) -> Option<DeclId> {
        match self.get(self.canonical(id)) {
            Some(Type::Record(class)) => Some(*class),
            _ => None,
        }
    }

    /// Check whether the type is spelled through a reflection
    pub fn is_reflected(&self, id: TypeId) -> bool {
        matches!(self.get(id), Some(Type::Reflected { .. }))
    }

    /// Strip reflection sugar, returning the underlying type
    pub fn canonical(&self, mut id: TypeId) -> TypeId {
        while let Some(Type::Reflected { underlying, .. }) = self.get(id) {
            id = *underlying;
        }
        id
    }

    /// Check whether the type depends on template parameters
    pub fn is_dependent(&self, id: TypeId) -> bool {
        match self.get(id) {
            Some(Type::Dependent) | Some(Type::TemplateParam(_)) => true,
            Some(Type::Reflected { underlying, .. }) => self.is_dependent(*underlying),
            Some(Type::Function { params, ret }) => {
                self.is_dependent(*ret) || params.iter().any(|p| self.is_dependent(*p))
            }
            _ => false,
        }
    }

    /// Iterate all interned types with their ids
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32), ty))
    }

    /// Number of interned types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no types are interned
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl From<Vec<Type>> for TypeContext {
    fn from(types: Vec<Type>) -> Self {
        let mut type_to_id = FxHashMap::default();
        for (idx, ty) in types.iter().enumerate() {
            type_to_id.entry(ty.clone()).or_insert(TypeId(idx as u32));
        }
        TypeContext { types, type_to_id }
    }
}

impl From<TypeContext> for Vec<Type> {
    fn from(ctx: TypeContext) -> Self {
        ctx.types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;

    #[test]
    fn test_well_known_ids() {
        let ctx = TypeContext::new();
        assert_eq!(ctx.get(TypeContext::INT), Some(&Type::Primitive(PrimitiveType::Int)));
        assert_eq!(ctx.get(TypeContext::DEPENDENT), Some(&Type::Dependent));
    }

    #[test]
    fn test_interning_deduplicates() {
        let mut ctx = TypeContext::new();
        let a = ctx.record_type(DeclId::new(7));
        let b = ctx.record_type(DeclId::new(7));
        let c = ctx.record_type(DeclId::new(8));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_canonical_strips_nested_reflection() {
        let mut interner = Interner::new();
        let r = interner.intern("r");
        let mut ctx = TypeContext::new();
        let inner = ctx.reflected_type(r, TypeContext::INT);
        let outer = ctx.reflected_type(r, inner);

        assert!(ctx.is_reflected(outer));
        assert_eq!(ctx.canonical(outer), TypeContext::INT);
    }

    #[test]
    fn test_dependence_propagates_through_signatures() {
        let mut ctx = TypeContext::new();
        let t = ctx.template_param_type(DeclId::new(3));
        let f = ctx.function_type(vec![TypeContext::INT, t], TypeContext::VOID);
        let g = ctx.function_type(vec![TypeContext::INT], TypeContext::BOOL);

        assert!(ctx.is_dependent(f));
        assert!(!ctx.is_dependent(g));
    }
}
