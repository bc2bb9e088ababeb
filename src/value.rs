//! Boundary value model
//!
//! Only primitives, strings, and opaque object handles cross the interop
//! surface; structured types never do. `Unit` doubles as the null object
//! reference for `Obj` fields.

use crate::runtime::ObjectId;

/// A value crossing the native/managed boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Obj(ObjectId),
}

/// Kind tag for fields, parameters, and returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    Obj,
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Unit => ValueKind::Unit,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Obj(_) => ValueKind::Obj,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Obj(id) => Some(*id),
            _ => None,
        }
    }

    /// Default value for a freshly constructed field of the given kind
    pub(crate) fn default_for(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Unit => Self::Unit,
            ValueKind::Bool => Self::Bool(false),
            ValueKind::Int => Self::Int(0),
            ValueKind::Float => Self::Float(0.0),
            ValueKind::Str => Self::Str(String::new()),
            // Object fields start out as the null reference
            ValueKind::Obj => Self::Unit,
        }
    }

    /// Kind check for stores; `Unit` is the null reference and may be
    /// assigned to any `Obj` slot
    #[inline]
    pub(crate) fn assignable_to(&self, kind: ValueKind) -> bool {
        self.kind() == kind || (kind == ValueKind::Obj && matches!(self, Self::Unit))
    }
}

impl ValueKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Obj => "object",
        }
    }
}

impl core::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}
