//! Handle types - transient (call-scoped) and durable (pinned) references
//!
//! A `TransientHandle` is what a native entry point receives: valid only
//! inside the call that produced it and only on that thread. Storing one
//! past the call is the classic use-after-scope bug; here it degrades
//! into a typed `InvalidHandle` error instead of a dangling pointer.
//! A `DurableHandle` is the promoted form: the object is pinned in the
//! heap and the handle works from any attached thread until its single
//! release.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::trace;

use crate::error::{InteropError, Result};
use crate::runtime::{ManagedRuntime, ObjectId};

/// Anything that can be resolved to a live managed object
pub trait HandleRef {
    /// Validate the handle and yield the object id, or the precise
    /// reason it is no longer usable
    fn resolve(&self) -> Result<ObjectId>;
}

pub(crate) struct ScopeCore {
    active: AtomicBool,
}

/// Dynamic extent of one native call. Transient handles minted from a
/// scope die with it.
pub struct CallScope {
    core: Arc<ScopeCore>,
    thread: ThreadId,
}

impl CallScope {
    pub(crate) fn open() -> Self {
        Self {
            core: Arc::new(ScopeCore {
                active: AtomicBool::new(true),
            }),
            thread: thread::current().id(),
        }
    }

    /// Mint a transient handle bound to this scope and thread
    pub(crate) fn transient(&self, object: ObjectId) -> TransientHandle {
        TransientHandle {
            object,
            thread: self.thread,
            scope: Arc::downgrade(&self.core),
        }
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        self.core.active.store(false, Ordering::Release);
    }
}

/// Reference valid only within the originating call, on the originating
/// thread. Movable (so misuse can be detected rather than prevented),
/// never silently valid outside its extent.
pub struct TransientHandle {
    object: ObjectId,
    thread: ThreadId,
    scope: Weak<ScopeCore>,
}

impl TransientHandle {
    /// Whether the handle is still usable here and now
    pub fn is_valid(&self) -> bool {
        HandleRef::resolve(self).is_ok()
    }
}

impl HandleRef for TransientHandle {
    fn resolve(&self) -> Result<ObjectId> {
        let core = self.scope.upgrade().ok_or(InteropError::InvalidHandle {
            reason: "originating native call has returned",
        })?;
        if !core.active.load(Ordering::Acquire) {
            return Err(InteropError::InvalidHandle {
                reason: "originating native call has returned",
            });
        }
        if thread::current().id() != self.thread {
            return Err(InteropError::InvalidHandle {
                reason: "transient handle crossed to another thread without promotion",
            });
        }
        Ok(self.object)
    }
}

/// Cross-thread reference to a pinned object. Owns the pin: explicit
/// release is single-shot, and dropping an unreleased handle performs
/// the same single-shot unpin so the object can never stay pinned by
/// accident.
#[derive(Debug)]
pub struct DurableHandle {
    object: ObjectId,
    runtime: Arc<ManagedRuntime>,
    released: AtomicBool,
}

impl DurableHandle {
    pub(crate) fn new(object: ObjectId, runtime: Arc<ManagedRuntime>) -> Self {
        Self {
            object,
            runtime,
            released: AtomicBool::new(false),
        }
    }

    /// Single-shot release: unpins on the first call, `DoubleRelease`
    /// on any later one
    pub(crate) fn release_now(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(InteropError::DoubleRelease);
        }
        self.runtime.unpin(self.object)?;
        trace!(event = "handle_release", object = ?self.object);
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl HandleRef for DurableHandle {
    fn resolve(&self) -> Result<ObjectId> {
        if self.released.load(Ordering::Acquire) {
            return Err(InteropError::UseAfterRelease);
        }
        Ok(self.object)
    }
}

impl Drop for DurableHandle {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            let _ = self.runtime.unpin(self.object);
            trace!(event = "handle_release", object = ?self.object, dropped = true);
        }
    }
}
