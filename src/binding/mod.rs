//! Binding layer - native-side discipline for the boundary
//!
//! Architecture:
//! - `handle.rs` - transient and durable handle types, call scopes
//! - `attachment.rs` - per-thread attach/detach state machine
//! - `manager.rs` - `HandleManager`: promotion, release, symbol caches,
//!   synchronous managed calls
//! - `load.rs` - module load hook and the process-wide binding

mod attachment;
mod handle;
mod load;
mod manager;

#[cfg(test)]
mod tests;

pub use attachment::ThreadAttachment;
pub use handle::{CallScope, DurableHandle, HandleRef, TransientHandle};
pub use load::{global_binding, module_load, RuntimeBinding, BINDING_VERSION_1, LOAD_FAILED};
pub use manager::HandleManager;
