//! Persistent handles.
//!
//! A persistent handle keeps a reference to a script object beyond the
//! handle scope it was created in. Strong handles are GC roots. Weak handles
//! do not keep their target alive; when the collector finds the target
//! unreachable it clears the handle and runs the handle's weak callback once,
//! after the sweep.

use std::fmt;

use crate::heap::ObjectHandle;
use crate::isolate::Isolate;

/// Callback run when the target of a weak handle is collected.
pub type WeakCallback = Box<dyn FnOnce(&mut Isolate)>;

/// A handle that outlives handle scopes.
///
/// Persistents are plain indices; [`Isolate::reset`] releases them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Persistent {
    index: u32,
    generation: u32,
}

struct HandleSlot {
    generation: u32,
    in_use: bool,
    target: Option<ObjectHandle>,
    weak: bool,
    callback: Option<WeakCallback>,
}

impl fmt::Debug for HandleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSlot")
            .field("generation", &self.generation)
            .field("in_use", &self.in_use)
            .field("target", &self.target)
            .field("weak", &self.weak)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    slots: Vec<HandleSlot>,
    free_list: Vec<u32>,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn create(&mut self, target: ObjectHandle) -> Persistent {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.in_use = true;
            slot.target = Some(target);
            slot.weak = false;
            slot.callback = None;
            Persistent {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HandleSlot {
                generation: 0,
                in_use: true,
                target: Some(target),
                weak: false,
                callback: None,
            });
            Persistent {
                index,
                generation: 0,
            }
        }
    }

    fn slot(&self, handle: Persistent) -> Option<&HandleSlot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.in_use && slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: Persistent) -> Option<&mut HandleSlot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.in_use && slot.generation == handle.generation)
    }

    pub(crate) fn get(&self, handle: Persistent) -> Option<ObjectHandle> {
        self.slot(handle).and_then(|slot| slot.target)
    }

    pub(crate) fn is_weak(&self, handle: Persistent) -> bool {
        self.slot(handle).is_some_and(|slot| slot.weak)
    }

    pub(crate) fn set_weak(&mut self, handle: Persistent, callback: Option<WeakCallback>) -> bool {
        match self.slot_mut(handle) {
            Some(slot) if slot.target.is_some() => {
                slot.weak = true;
                slot.callback = callback;
                true
            }
            _ => false,
        }
    }

    /// Release a handle; a pending weak callback is dropped without running.
    pub(crate) fn reset(&mut self, handle: Persistent) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.in_use = false;
        slot.target = None;
        slot.weak = false;
        slot.callback = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Targets of strong handles (GC roots).
    pub(crate) fn strong_targets(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.in_use && !slot.weak)
            .filter_map(|slot| slot.target)
    }

    /// Clear weak handles whose target is dead and collect their callbacks.
    pub(crate) fn clear_dead_weak(
        &mut self,
        mut is_live: impl FnMut(ObjectHandle) -> bool,
    ) -> Vec<WeakCallback> {
        let mut callbacks = Vec::new();
        let weak_slots = self.slots.iter_mut().filter(|s| s.in_use && s.weak);
        for slot in weak_slots {
            if let Some(target) = slot.target
                && !is_live(target)
            {
                slot.target = None;
                if let Some(callback) = slot.callback.take() {
                    callbacks.push(callback);
                }
            }
        }
        callbacks
    }
}
