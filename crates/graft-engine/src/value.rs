//! Compile-time constant values
//!
//! A fragment value is a `Struct` whose single base is the reflection of the
//! fragment content and whose fields are the captured values, in capture order.

use crate::ast::decl::DeclId;
use crate::ast::types::TypeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A constant produced by the evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstValue {
    /// Absence of a value (`void` results, uninitialized slots)
    Void,
    /// Boolean constant
    Bool(bool),
    /// Integer constant
    Int(i64),
    /// String constant
    Str(String),
    /// Reflection of a declaration
    Reflection(DeclId),
    /// Aggregate with base subobjects followed by fields
    Struct {
        /// Base subobjects, in base-specifier order
        bases: Vec<ConstValue>,
        /// Fields, in declaration order
        fields: Vec<ConstValue>,
    },
}

impl ConstValue {
    /// Build an aggregate value
    pub fn aggregate(bases: Vec<ConstValue>, fields: Vec<ConstValue>) -> Self {
        ConstValue::Struct { bases, fields }
    }

    /// Number of fields of an aggregate (0 for scalars)
    pub fn num_fields(&self) -> usize {
        match self {
            ConstValue::Struct { fields, .. } => fields.len(),
            _ => 0,
        }
    }

    /// Get the field at `index` of an aggregate
    pub fn field(&self, index: usize) -> Option<&ConstValue> {
        match self {
            ConstValue::Struct { fields, .. } => fields.get(index),
            _ => None,
        }
    }

    /// All fields of an aggregate
    pub fn fields(&self) -> &[ConstValue] {
        match self {
            ConstValue::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Get the base subobject at `index` of an aggregate
    pub fn base(&self, index: usize) -> Option<&ConstValue> {
        match self {
            ConstValue::Struct { bases, .. } => bases.get(index),
            _ => None,
        }
    }

    /// Integer view; booleans convert to 0/1
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Boolean view; integers are true when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(b) => Some(*b),
            ConstValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// The reflected declaration, looking through base subobjects
    pub fn reflectee(&self) -> Option<DeclId> {
        match self {
            ConstValue::Reflection(decl) => Some(*decl),
            ConstValue::Struct { bases, .. } => bases.iter().find_map(ConstValue::reflectee),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Void => write!(f, "void"),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Str(s) => write!(f, "{:?}", s),
            ConstValue::Reflection(decl) => write!(f, "reflexpr(#{})", decl.as_u32()),
            ConstValue::Struct { bases, fields } => {
                write!(f, "{{")?;
                let parts: Vec<String> = bases
                    .iter()
                    .chain(fields.iter())
                    .map(|v| v.to_string())
                    .collect();
                write!(f, "{}}}", parts.join(", "))
            }
        }
    }
}

/// A constant together with its type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue {
    /// Type of the value
    pub ty: TypeId,
    /// The value
    pub value: ConstValue,
}

impl TypedValue {
    /// Pair a value with its type
    pub fn new(ty: TypeId, value: ConstValue) -> Self {
        Self { ty, value }
    }
}
