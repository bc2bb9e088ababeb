//! Thread attachment - the registration handshake with the runtime
//!
//! Per-thread state machine: `Detached -> (attach) -> Attached ->
//! (detach) -> Detached`. No partial states. The guard is `!Send`, so an
//! attachment can never leak to another thread, and it detaches on drop,
//! making detach the guaranteed last interop action even on panic.

use dashmap::DashMap;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;
use tracing::{debug, error};

use crate::error::{InteropError, Result};

type AttachedMap = Arc<DashMap<ThreadId, Instant>>;

/// Per-manager registry of attached threads
#[derive(Debug)]
pub(crate) struct AttachmentRegistry {
    attached: AttachedMap,
}

impl AttachmentRegistry {
    pub(crate) fn new() -> Self {
        Self {
            attached: Arc::new(DashMap::new()),
        }
    }

    pub(crate) fn attach(&self) -> Result<ThreadAttachment> {
        use dashmap::mapref::entry::Entry;

        let thread = thread::current().id();
        match self.attached.entry(thread) {
            Entry::Occupied(_) => {
                error!(
                    event = "attach_violation",
                    thread = ?thread,
                    "attach called on an already-attached thread"
                );
                Err(InteropError::AlreadyAttached)
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                debug!(event = "thread_attach", thread = ?thread, "Thread attached to runtime");
                Ok(ThreadAttachment {
                    registry: Arc::clone(&self.attached),
                    thread,
                    active: Cell::new(true),
                    _not_send: PhantomData,
                })
            }
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached.contains_key(&thread::current().id())
    }

    /// Precondition for every handle operation
    pub(crate) fn ensure_attached(&self) -> Result<()> {
        let thread = thread::current().id();
        if self.attached.contains_key(&thread) {
            Ok(())
        } else {
            error!(
                event = "detached_access",
                thread = ?thread,
                "handle operation from a detached thread"
            );
            Err(InteropError::NotAttached)
        }
    }
}

/// Live registration of the current thread with the runtime. `!Send`:
/// the attachment belongs to the thread that performed it.
#[derive(Debug)]
pub struct ThreadAttachment {
    registry: AttachedMap,
    thread: ThreadId,
    active: Cell<bool>,
    _not_send: PhantomData<*const ()>,
}

impl ThreadAttachment {
    /// Deregister. Consumes the guard: there is no attached state left
    /// to misuse afterward.
    pub fn detach(self) {
        self.deactivate();
    }

    fn deactivate(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some((_, since)) = self.registry.remove(&self.thread) {
            debug!(
                event = "thread_detach",
                thread = ?self.thread,
                duration_us = since.elapsed().as_micros() as u64,
                "Thread detached from runtime"
            );
        }
    }
}

impl Drop for ThreadAttachment {
    fn drop(&mut self) {
        self.deactivate();
    }
}
