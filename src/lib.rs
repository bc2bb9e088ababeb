//! Tether - native/managed-runtime interop layer
//!
//! Safe lifetime and thread-affinity management of foreign object
//! handles across native-thread boundaries:
//! - Transient handles are valid only inside the call (and on the
//!   thread) that produced them; keeping one longer requires promotion.
//! - Durable handles pin the object and work from any attached thread
//!   until their single release.
//! - Native threads register with the runtime (attach) before touching
//!   any handle and deregister (detach) as their last interop action.
//! - Symbols resolve once, at module load where possible, and are
//!   cached process-wide.

pub mod binding;
pub mod error;
pub mod logging;
pub mod runtime;

mod value;

// Core API
pub use binding::{
    global_binding, module_load, CallScope, DurableHandle, HandleManager, HandleRef,
    RuntimeBinding, ThreadAttachment, TransientHandle, BINDING_VERSION_1, LOAD_FAILED,
};
pub use error::{InteropError, Result, SymbolKind};
pub use runtime::{
    ClassDef, ClassRef, FieldRef, HeapStats, ManagedRuntime, MethodRef, ObjectId, Signature,
};
pub use value::{Value, ValueKind};

/// Initialize crate-wide infrastructure (logging)
pub fn init() {
    logging::init();
}
