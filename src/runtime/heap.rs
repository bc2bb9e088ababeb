//! Object heap - generational slots with pin counts
//!
//! Design: slot vector with a free list. Every slot carries a generation
//! counter bumped on free, so a stale `ObjectId` can never silently
//! alias a recycled object. Collection is an explicit mark-sweep from
//! the pinned set: pinned objects are the roots, object-valued fields
//! are the edges, everything unmarked is reclaimed.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

use super::class::ClassRef;
use crate::error::{InteropError, Result};
use crate::value::Value;

/// Stable identity of a heap object: slot index plus generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

#[derive(Debug)]
struct LiveObject {
    class: ClassRef,
    fields: Vec<Value>,
    pins: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<LiveObject>,
}

#[derive(Debug)]
struct HeapInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// The managed object space
#[derive(Debug)]
pub(crate) struct ObjectHeap {
    inner: Mutex<HeapInner>,
    live: AtomicUsize,
    collections_run: AtomicUsize,
    objects_collected: AtomicUsize,
}

impl ObjectHeap {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HeapInner {
                slots: Vec::with_capacity(64),
                free: Vec::new(),
            }),
            live: AtomicUsize::new(0),
            collections_run: AtomicUsize::new(0),
            objects_collected: AtomicUsize::new(0),
        }
    }

    pub(crate) fn allocate(&self, class: ClassRef, fields: Vec<Value>) -> ObjectId {
        let mut inner = self.inner.lock();
        let object = LiveObject {
            class,
            fields,
            pins: 0,
        };

        let id = match inner.free.pop() {
            Some(slot) => {
                let s = &mut inner.slots[slot as usize];
                s.data = Some(object);
                ObjectId {
                    slot,
                    generation: s.generation,
                }
            }
            None => {
                let slot = inner.slots.len() as u32;
                inner.slots.push(Slot {
                    generation: 0,
                    data: Some(object),
                });
                ObjectId {
                    slot,
                    generation: 0,
                }
            }
        };

        self.live.fetch_add(1, Ordering::Relaxed);
        trace!(event = "object_new", object = ?id, "Object allocated");
        id
    }

    fn live_mut<'a>(inner: &'a mut HeapInner, id: ObjectId) -> Result<&'a mut LiveObject> {
        let slot = inner
            .slots
            .get_mut(id.slot as usize)
            .ok_or(InteropError::NoSuchObject)?;
        if slot.generation != id.generation {
            return Err(InteropError::NoSuchObject);
        }
        slot.data.as_mut().ok_or(InteropError::NoSuchObject)
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        let mut inner = self.inner.lock();
        Self::live_mut(&mut inner, id).is_ok()
    }

    pub(crate) fn class_of(&self, id: ObjectId) -> Result<ClassRef> {
        let mut inner = self.inner.lock();
        Ok(Self::live_mut(&mut inner, id)?.class)
    }

    /// Pin the object against collection; counted, so nested promotion
    /// of the same object is well defined
    pub(crate) fn pin(&self, id: ObjectId) -> Result<()> {
        let mut inner = self.inner.lock();
        let object = Self::live_mut(&mut inner, id)?;
        object.pins += 1;
        trace!(event = "object_pin", object = ?id, pins = object.pins);
        Ok(())
    }

    pub(crate) fn unpin(&self, id: ObjectId) -> Result<()> {
        let mut inner = self.inner.lock();
        let object = Self::live_mut(&mut inner, id)?;
        debug_assert!(object.pins > 0, "unpin without matching pin");
        object.pins = object.pins.saturating_sub(1);
        trace!(event = "object_unpin", object = ?id, pins = object.pins);
        Ok(())
    }

    pub(crate) fn get_field(&self, id: ObjectId, index: u16) -> Result<Value> {
        let mut inner = self.inner.lock();
        let object = Self::live_mut(&mut inner, id)?;
        object
            .fields
            .get(index as usize)
            .cloned()
            .ok_or(InteropError::NoSuchObject)
    }

    pub(crate) fn set_field(&self, id: ObjectId, index: u16, value: Value) -> Result<()> {
        let mut inner = self.inner.lock();
        let object = Self::live_mut(&mut inner, id)?;
        let slot = object
            .fields
            .get_mut(index as usize)
            .ok_or(InteropError::NoSuchObject)?;
        *slot = value;
        Ok(())
    }

    /// Mark from the pinned roots, sweep everything unmarked. Returns
    /// the number of objects reclaimed.
    pub(crate) fn collect(&self) -> usize {
        let mut inner = self.inner.lock();

        let mut marked = vec![false; inner.slots.len()];
        let mut stack: Vec<usize> = inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.data.as_ref().map_or(false, |o| o.pins > 0))
            .map(|(i, _)| i)
            .collect();

        while let Some(i) = stack.pop() {
            if marked[i] {
                continue;
            }
            marked[i] = true;
            if let Some(object) = &inner.slots[i].data {
                for value in &object.fields {
                    if let Value::Obj(id) = value {
                        let j = id.slot as usize;
                        if j < inner.slots.len()
                            && inner.slots[j].generation == id.generation
                            && inner.slots[j].data.is_some()
                            && !marked[j]
                        {
                            stack.push(j);
                        }
                    }
                }
            }
        }

        let HeapInner { slots, free } = &mut *inner;
        let mut collected = 0;
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.data.is_some() && !marked[i] {
                slot.data = None;
                slot.generation = slot.generation.wrapping_add(1);
                free.push(i as u32);
                collected += 1;
            }
        }
        drop(inner);

        self.live.fetch_sub(collected, Ordering::Relaxed);
        self.collections_run.fetch_add(1, Ordering::Relaxed);
        self.objects_collected.fetch_add(collected, Ordering::Relaxed);
        crate::logging::log_collect(collected, self.live.load(Ordering::Relaxed));
        collected
    }

    pub(crate) fn live_objects(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    pub(crate) fn stats(&self) -> HeapStats {
        HeapStats {
            live_objects: self.live.load(Ordering::Relaxed),
            collections_run: self.collections_run.load(Ordering::Relaxed),
            objects_collected: self.objects_collected.load(Ordering::Relaxed),
        }
    }
}

/// Heap statistics for monitoring and tests
#[derive(Debug, Clone, Copy)]
pub struct HeapStats {
    pub live_objects: usize,
    pub collections_run: usize,
    pub objects_collected: usize,
}
