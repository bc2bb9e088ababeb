//! HandleManager - the native side's one mediator for the boundary
//!
//! Owns what the original pattern kept in ambient globals: the symbol
//! caches and the attachment registry are explicit fields here, so
//! independent managers (and tests) coexist. Symbol lookups resolve once
//! and cache process-wide; handle operations enforce the attachment
//! discipline before touching the runtime.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::attachment::{AttachmentRegistry, ThreadAttachment};
use super::handle::{CallScope, DurableHandle, HandleRef, TransientHandle};
use crate::error::{InteropError, Result, SymbolKind};
use crate::logging;
use crate::runtime::{ClassRef, FieldRef, ManagedRuntime, MethodRef, Signature};
use crate::value::{Value, ValueKind};

#[derive(Debug)]
pub struct HandleManager {
    runtime: Arc<ManagedRuntime>,
    attachments: AttachmentRegistry,
    class_cache: DashMap<String, ClassRef>,
    method_cache: DashMap<(ClassRef, String, Signature), MethodRef>,
    field_cache: DashMap<(ClassRef, String, ValueKind), FieldRef>,
}

impl HandleManager {
    pub fn new(runtime: Arc<ManagedRuntime>) -> Self {
        Self {
            runtime,
            attachments: AttachmentRegistry::new(),
            class_cache: DashMap::new(),
            method_cache: DashMap::new(),
            field_cache: DashMap::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<ManagedRuntime> {
        &self.runtime
    }

    // ------------------------------------------------------------------
    // Thread attachment
    // ------------------------------------------------------------------

    /// Register the current thread. Must be the first interop action a
    /// native-spawned thread performs.
    pub fn attach(&self) -> Result<ThreadAttachment> {
        self.attachments.attach()
    }

    /// Deregister. Must be the thread's last interop action.
    pub fn detach(&self, attachment: ThreadAttachment) {
        attachment.detach();
    }

    pub fn is_attached(&self) -> bool {
        self.attachments.is_attached()
    }

    /// Run `f` bracketed by attach/detach: attach is the first action,
    /// detach the guaranteed last one
    pub fn with_attached<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let attachment = self.attach()?;
        let out = f();
        self.detach(attachment);
        Ok(out)
    }

    /// Model of the host runtime dispatching into a native entry point.
    /// Transient handles minted from the scope die when `f` returns.
    /// Host-dispatched threads count as attached for the duration of
    /// the call; a thread that was already attached stays attached.
    pub fn enter_native_call<R>(&self, f: impl FnOnce(&CallScope) -> R) -> R {
        let host_attached = if self.attachments.is_attached() {
            None
        } else {
            self.attachments.attach().ok()
        };

        let scope = CallScope::open();
        let out = f(&scope);
        drop(scope);

        if let Some(attachment) = host_attached {
            attachment.detach();
        }
        out
    }

    // ------------------------------------------------------------------
    // Handle lifetime
    // ------------------------------------------------------------------

    /// Construct a managed object; the returned handle lives only in
    /// the given call scope
    pub fn new_instance(&self, scope: &CallScope, class: ClassRef) -> Result<TransientHandle> {
        self.attachments.ensure_attached()?;
        let object = self.runtime.instantiate(class)?;
        Ok(scope.transient(object))
    }

    /// Promote a transient handle into a durable one, pinning the
    /// object. Must run on the transient's thread, inside its call.
    pub fn promote(&self, transient: &TransientHandle) -> Result<DurableHandle> {
        self.attachments.ensure_attached()?;
        let object = transient.resolve()?;
        self.runtime.pin(object)?;
        debug!(event = "handle_promote", object = ?object, "Transient handle promoted");
        Ok(DurableHandle::new(object, Arc::clone(&self.runtime)))
    }

    /// Release a durable handle, unpinning the object. Single-shot: a
    /// second release is `DoubleRelease`.
    pub fn release(&self, durable: &DurableHandle) -> Result<()> {
        self.attachments.ensure_attached()?;
        durable.release_now()
    }

    // ------------------------------------------------------------------
    // Symbol resolution (cached process-wide)
    // ------------------------------------------------------------------

    pub fn lookup_class(&self, name: &str) -> Result<ClassRef> {
        if let Some(cached) = self.class_cache.get(name) {
            return Ok(*cached);
        }
        let class = self.runtime.find_class(name).ok_or_else(|| {
            logging::log_symbol_miss("class", name);
            InteropError::SymbolNotFound {
                kind: SymbolKind::Class,
                name: name.to_string(),
            }
        })?;
        self.class_cache.insert(name.to_string(), class);
        Ok(class)
    }

    pub fn lookup_method(
        &self,
        class: ClassRef,
        name: &str,
        signature: &Signature,
    ) -> Result<MethodRef> {
        let key = (class, name.to_string(), signature.clone());
        if let Some(cached) = self.method_cache.get(&key) {
            return Ok(*cached);
        }
        let method = self.runtime.resolve_method(class, name, signature).map_err(|e| {
            logging::log_symbol_miss("method", name);
            e
        })?;
        self.method_cache.insert(key, method);
        Ok(method)
    }

    pub fn lookup_field(&self, class: ClassRef, name: &str, kind: ValueKind) -> Result<FieldRef> {
        let key = (class, name.to_string(), kind);
        if let Some(cached) = self.field_cache.get(&key) {
            return Ok(*cached);
        }
        let field = self.runtime.resolve_field(class, name, kind).map_err(|e| {
            logging::log_symbol_miss("field", name);
            e
        })?;
        self.field_cache.insert(key, field);
        Ok(field)
    }

    // ------------------------------------------------------------------
    // Managed calls and field access (attached threads only)
    // ------------------------------------------------------------------

    /// Invoke an instance method synchronously; blocks until the managed
    /// call returns
    pub fn call_instance_method(
        &self,
        handle: &impl HandleRef,
        method: MethodRef,
        args: &[Value],
    ) -> Result<Value> {
        self.attachments.ensure_attached()?;
        let target = handle.resolve()?;
        logging::log_call("instance", args.len());
        self.runtime.invoke_instance(method, target, args)
    }

    /// Invoke a static method synchronously
    pub fn call_static_method(
        &self,
        class: ClassRef,
        method: MethodRef,
        args: &[Value],
    ) -> Result<Value> {
        self.attachments.ensure_attached()?;
        logging::log_call("static", args.len());
        self.runtime.invoke_static(class, method, args)
    }

    pub fn get_field(&self, handle: &impl HandleRef, field: FieldRef) -> Result<Value> {
        self.attachments.ensure_attached()?;
        let object = handle.resolve()?;
        self.runtime.get_field(object, field)
    }

    pub fn set_field(&self, handle: &impl HandleRef, field: FieldRef, value: Value) -> Result<()> {
        self.attachments.ensure_attached()?;
        let object = handle.resolve()?;
        self.runtime.set_field(object, field, value)
    }
}
