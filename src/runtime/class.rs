//! Class registry - managed-side symbol space
//!
//! Classes are defined once at runtime construction and are read-only
//! afterward, so lookups after registration never contend. Method bodies
//! are host closures standing in for managed code; they receive the
//! runtime so they can touch fields the way managed code would.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use super::heap::ObjectId;
use super::ManagedRuntime;
use crate::error::{InteropError, Result, SymbolKind};
use crate::value::{Value, ValueKind};

/// Opaque reference to a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassRef(pub(crate) u32);

/// Opaque reference to a method of a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub(crate) class: ClassRef,
    pub(crate) index: u16,
}

/// Opaque reference to a field of a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub(crate) class: ClassRef,
    pub(crate) index: u16,
    pub(crate) kind: ValueKind,
}

impl FieldRef {
    /// Declared kind of the field
    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

/// Method signature: parameter kinds and return kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<ValueKind>,
    ret: ValueKind,
}

impl Signature {
    pub fn new(params: Vec<ValueKind>, ret: ValueKind) -> Self {
        Self { params, ret }
    }

    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    pub fn ret(&self) -> ValueKind {
        self.ret
    }

    /// Check call arguments against the declared parameter kinds
    pub(crate) fn check_args(&self, args: &[Value]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(InteropError::ArityMismatch {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        for (arg, &param) in args.iter().zip(&self.params) {
            if !arg.assignable_to(param) {
                return Err(InteropError::TypeMismatch {
                    expected: param,
                    got: arg.kind(),
                });
            }
        }
        Ok(())
    }
}

/// Body of an instance method
pub type InstanceBody = Arc<dyn Fn(&ManagedRuntime, ObjectId, &[Value]) -> Result<Value> + Send + Sync>;

/// Body of a static method
pub type StaticBody = Arc<dyn Fn(&ManagedRuntime, &[Value]) -> Result<Value> + Send + Sync>;

pub(crate) enum MethodBody {
    Instance(InstanceBody),
    Static(StaticBody),
}

impl std::fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodBody::Instance(_) => f.write_str("MethodBody::Instance(..)"),
            MethodBody::Static(_) => f.write_str("MethodBody::Static(..)"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct MethodDef {
    pub(crate) name: String,
    pub(crate) signature: Signature,
    pub(crate) body: MethodBody,
}

#[derive(Debug)]
pub(crate) struct FieldDef {
    pub(crate) name: String,
    pub(crate) kind: ValueKind,
}

/// Definition of a managed class: named fields plus instance and static
/// methods, built with a fluent builder
#[derive(Debug)]
pub struct ClassDef {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, kind: ValueKind) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn instance_method(
        mut self,
        name: &str,
        signature: Signature,
        body: impl Fn(&ManagedRuntime, ObjectId, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(MethodDef {
            name: name.to_string(),
            signature,
            body: MethodBody::Instance(Arc::new(body)),
        });
        self
    }

    pub fn static_method(
        mut self,
        name: &str,
        signature: Signature,
        body: impl Fn(&ManagedRuntime, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(MethodDef {
            name: name.to_string(),
            signature,
            body: MethodBody::Static(Arc::new(body)),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registry of all defined classes with a name index
#[derive(Debug)]
pub(crate) struct ClassRegistry {
    classes: RwLock<Vec<Arc<ClassDef>>>,
    by_name: DashMap<String, ClassRef>,
}

impl ClassRegistry {
    pub(crate) fn new() -> Self {
        Self {
            classes: RwLock::new(Vec::new()),
            by_name: DashMap::new(),
        }
    }

    pub(crate) fn define(&self, def: ClassDef) -> ClassRef {
        let mut classes = self.classes.write();
        let class = ClassRef(classes.len() as u32);
        self.by_name.insert(def.name.clone(), class);
        classes.push(Arc::new(def));
        class
    }

    pub(crate) fn find(&self, name: &str) -> Option<ClassRef> {
        self.by_name.get(name).map(|r| *r)
    }

    pub(crate) fn get(&self, class: ClassRef) -> Result<Arc<ClassDef>> {
        self.classes
            .read()
            .get(class.0 as usize)
            .cloned()
            .ok_or_else(|| InteropError::SymbolNotFound {
                kind: SymbolKind::Class,
                name: format!("class#{}", class.0),
            })
    }

    /// Resolve a method by name and exact signature
    pub(crate) fn method(
        &self,
        class: ClassRef,
        name: &str,
        signature: &Signature,
    ) -> Result<MethodRef> {
        let def = self.get(class)?;
        def.methods
            .iter()
            .position(|m| m.name == name && &m.signature == signature)
            .map(|index| MethodRef {
                class,
                index: index as u16,
            })
            .ok_or_else(|| InteropError::SymbolNotFound {
                kind: SymbolKind::Method,
                name: format!("{}.{}", def.name, name),
            })
    }

    /// Resolve a field by name, checking the declared kind
    pub(crate) fn field(&self, class: ClassRef, name: &str, kind: ValueKind) -> Result<FieldRef> {
        let def = self.get(class)?;
        def.fields
            .iter()
            .position(|f| f.name == name && f.kind == kind)
            .map(|index| FieldRef {
                class,
                index: index as u16,
                kind,
            })
            .ok_or_else(|| InteropError::SymbolNotFound {
                kind: SymbolKind::Field,
                name: format!("{}.{}", def.name, name),
            })
    }

    /// Resolve a field by name alone (for method bodies acting as
    /// managed code, which know their own layout)
    pub(crate) fn field_by_name(&self, class: ClassRef, name: &str) -> Result<FieldRef> {
        let def = self.get(class)?;
        def.fields
            .iter()
            .position(|f| f.name == name)
            .map(|index| FieldRef {
                class,
                index: index as u16,
                kind: def.fields[index].kind,
            })
            .ok_or_else(|| InteropError::SymbolNotFound {
                kind: SymbolKind::Field,
                name: format!("{}.{}", def.name, name),
            })
    }
}
