//! Abstract managed runtime - the host side of the boundary
//!
//! Design: a deliberately small object model with everything the binding
//! layer's contract needs and nothing more:
//! - `class.rs` - class registry: definitions, opaque symbol refs
//! - `heap.rs` - object heap: generational slots, pin counts, mark-sweep
//!
//! `ManagedRuntime` ties the two together and owns dispatch. Method
//! bodies run synchronously on the calling thread; the runtime adds no
//! locking around an individual object during a call, matching the
//! contract that concurrent calls on one object are governed by the
//! managed side.

mod class;
mod heap;


pub use class::{ClassDef, ClassRef, FieldRef, InstanceBody, MethodRef, Signature, StaticBody};
pub use heap::{HeapStats, ObjectId};

use class::{ClassRegistry, MethodBody};
use heap::ObjectHeap;

use crate::error::{InteropError, Result, SymbolKind};
use crate::value::{Value, ValueKind};

/// The managed runtime instance: class space plus object heap
#[derive(Debug)]
pub struct ManagedRuntime {
    registry: ClassRegistry,
    heap: ObjectHeap,
}

impl ManagedRuntime {
    pub fn new() -> Self {
        Self {
            registry: ClassRegistry::new(),
            heap: ObjectHeap::new(),
        }
    }

    /// Register a class; classes are immutable once defined
    pub fn define_class(&self, def: ClassDef) -> ClassRef {
        self.registry.define(def)
    }

    pub(crate) fn find_class(&self, name: &str) -> Option<ClassRef> {
        self.registry.find(name)
    }

    pub(crate) fn resolve_method(
        &self,
        class: ClassRef,
        name: &str,
        signature: &Signature,
    ) -> Result<MethodRef> {
        self.registry.method(class, name, signature)
    }

    pub(crate) fn resolve_field(
        &self,
        class: ClassRef,
        name: &str,
        kind: ValueKind,
    ) -> Result<FieldRef> {
        self.registry.field(class, name, kind)
    }

    /// Construct an instance with default-initialized fields
    pub(crate) fn instantiate(&self, class: ClassRef) -> Result<ObjectId> {
        let def = self.registry.get(class)?;
        let fields = def
            .fields
            .iter()
            .map(|f| Value::default_for(f.kind))
            .collect();
        Ok(self.heap.allocate(class, fields))
    }

    pub(crate) fn invoke_instance(
        &self,
        method: MethodRef,
        target: ObjectId,
        args: &[Value],
    ) -> Result<Value> {
        let def = self.registry.get(method.class)?;
        let m = def
            .methods
            .get(method.index as usize)
            .ok_or_else(|| InteropError::SymbolNotFound {
                kind: SymbolKind::Method,
                name: format!("{}#{}", def.name, method.index),
            })?;

        // The method ref must belong to the object's class
        if self.heap.class_of(target)? != method.class {
            return Err(InteropError::InvalidHandle {
                reason: "method does not belong to the object's class",
            });
        }

        m.signature.check_args(args)?;
        let out = match &m.body {
            MethodBody::Instance(f) => f(self, target, args)?,
            MethodBody::Static(_) => {
                return Err(InteropError::SymbolNotFound {
                    kind: SymbolKind::Method,
                    name: format!("{}.{}", def.name, m.name),
                })
            }
        };

        if !out.assignable_to(m.signature.ret()) {
            return Err(InteropError::TypeMismatch {
                expected: m.signature.ret(),
                got: out.kind(),
            });
        }
        Ok(out)
    }

    pub(crate) fn invoke_static(
        &self,
        class: ClassRef,
        method: MethodRef,
        args: &[Value],
    ) -> Result<Value> {
        let def = self.registry.get(class)?;
        let m = def
            .methods
            .get(method.index as usize)
            .filter(|_| method.class == class)
            .ok_or_else(|| InteropError::SymbolNotFound {
                kind: SymbolKind::StaticMethod,
                name: format!("{}#{}", def.name, method.index),
            })?;

        m.signature.check_args(args)?;
        let out = match &m.body {
            MethodBody::Static(f) => f(self, args)?,
            MethodBody::Instance(_) => {
                return Err(InteropError::SymbolNotFound {
                    kind: SymbolKind::StaticMethod,
                    name: format!("{}.{}", def.name, m.name),
                })
            }
        };

        if !out.assignable_to(m.signature.ret()) {
            return Err(InteropError::TypeMismatch {
                expected: m.signature.ret(),
                got: out.kind(),
            });
        }
        Ok(out)
    }

    pub(crate) fn get_field(&self, object: ObjectId, field: FieldRef) -> Result<Value> {
        if self.heap.class_of(object)? != field.class {
            return Err(InteropError::InvalidHandle {
                reason: "field does not belong to the object's class",
            });
        }
        self.heap.get_field(object, field.index)
    }

    pub(crate) fn set_field(&self, object: ObjectId, field: FieldRef, value: Value) -> Result<()> {
        if self.heap.class_of(object)? != field.class {
            return Err(InteropError::InvalidHandle {
                reason: "field does not belong to the object's class",
            });
        }
        if !value.assignable_to(field.kind) {
            return Err(InteropError::TypeMismatch {
                expected: field.kind,
                got: value.kind(),
            });
        }
        self.heap.set_field(object, field.index, value)
    }

    // ------------------------------------------------------------------
    // Accessors for method bodies acting as managed code
    // ------------------------------------------------------------------

    /// Read a field of an object by name
    pub fn field_value(&self, object: ObjectId, name: &str) -> Result<Value> {
        let class = self.heap.class_of(object)?;
        let field = self.registry.field_by_name(class, name)?;
        self.heap.get_field(object, field.index)
    }

    /// Write a field of an object by name
    pub fn set_field_value(&self, object: ObjectId, name: &str, value: Value) -> Result<()> {
        let class = self.heap.class_of(object)?;
        let field = self.registry.field_by_name(class, name)?;
        self.set_field(object, field, value)
    }

    // ------------------------------------------------------------------
    // Heap surface
    // ------------------------------------------------------------------

    pub(crate) fn pin(&self, object: ObjectId) -> Result<()> {
        self.heap.pin(object)
    }

    pub(crate) fn unpin(&self, object: ObjectId) -> Result<()> {
        self.heap.unpin(object)
    }

    /// Run a collection; pinned objects and everything they reference
    /// survive, the rest is reclaimed
    pub fn collect(&self) -> usize {
        self.heap.collect()
    }

    /// Whether the object id still refers to a live object
    pub fn contains(&self, object: ObjectId) -> bool {
        self.heap.contains(object)
    }

    pub fn live_objects(&self) -> usize {
        self.heap.live_objects()
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}

impl Default for ManagedRuntime {
    fn default() -> Self {
        Self::new()
    }
}
