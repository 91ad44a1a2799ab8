//! Generational arena for script objects.

use rustc_hash::FxHashMap;

use crate::native_fn::NativeFn;
use crate::property::Property;
use crate::template::TemplateId;

/// A native address stored in a proxy object.
pub type RawPtr = *mut ();

/// Handle to a heap-allocated script object.
///
/// This is a copyable reference to an object in the [`ObjectHeap`]. The
/// generation prevents a handle from resolving to a different object after
/// its slot has been reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into ObjectHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectHandle {
    /// Create a new object handle.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Contents of an object's internal (script-invisible) field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InternalField {
    /// Nothing stored.
    #[default]
    Empty,
    /// A native address.
    Address(RawPtr),
    /// A small integer tag.
    Tag(u32),
}

/// What kind of object a heap slot holds.
#[derive(Debug)]
pub(crate) enum ObjectKind {
    /// Plain object.
    Ordinary,
    /// Callable object.
    Function(FunctionData),
}

/// Call and construct behavior of a function object.
#[derive(Debug)]
pub(crate) struct FunctionData {
    pub(crate) name: String,
    pub(crate) callback: Option<NativeFn>,
    pub(crate) template: Option<TemplateId>,
}

/// A script object as stored in the heap.
#[derive(Debug)]
pub(crate) struct HeapObject {
    pub(crate) kind: ObjectKind,
    pub(crate) prototype: Option<ObjectHandle>,
    pub(crate) properties: FxHashMap<String, Property>,
    pub(crate) internal_fields: Vec<InternalField>,
    pub(crate) marked: bool,
}

impl HeapObject {
    pub(crate) fn ordinary(prototype: Option<ObjectHandle>, internal_field_count: usize) -> Self {
        Self {
            kind: ObjectKind::Ordinary,
            prototype,
            properties: FxHashMap::default(),
            internal_fields: vec![InternalField::Empty; internal_field_count],
            marked: false,
        }
    }

    pub(crate) fn function(data: FunctionData) -> Self {
        Self {
            kind: ObjectKind::Function(data),
            prototype: None,
            properties: FxHashMap::default(),
            internal_fields: Vec::new(),
            marked: false,
        }
    }

    pub(crate) fn as_function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(data) => Some(data),
            ObjectKind::Ordinary => None,
        }
    }
}

/// Heap storage for script objects with generational indices.
///
/// When an object is swept its slot is reused but the generation is
/// incremented, so stale handles resolve to `None`.
#[derive(Debug, Default)]
pub(crate) struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    live: usize,
}

#[derive(Debug)]
struct HeapSlot {
    generation: u32,
    object: Option<HeapObject>,
}

impl ObjectHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate a new object on the heap.
    pub(crate) fn allocate(&mut self, object: HeapObject) -> ObjectHandle {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                object: Some(object),
            });
            ObjectHandle::new(index, 0)
        }
    }

    /// Get an object, or `None` if the handle is stale.
    pub(crate) fn get(&self, handle: ObjectHandle) -> Option<&HeapObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Get a mutable object, or `None` if the handle is stale.
    pub(crate) fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Check whether a handle refers to a live object.
    pub(crate) fn contains(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live objects.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Mark an object; returns `true` if it was not marked before.
    pub(crate) fn mark(&mut self, handle: ObjectHandle) -> bool {
        match self.get_mut(handle) {
            Some(object) if !object.marked => {
                object.marked = true;
                true
            }
            _ => false,
        }
    }

    /// Check whether a live object is marked.
    pub(crate) fn is_marked(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_some_and(|object| object.marked)
    }

    /// Free every unmarked object and clear the marks of the survivors.
    ///
    /// Returns the number of objects freed.
    pub(crate) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(object) = slot.object.as_mut() else {
                continue;
            };
            if object.marked {
                object.marked = false;
            } else {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_get() {
        let mut heap = ObjectHeap::new();
        let handle = heap.allocate(HeapObject::ordinary(None, 2));

        let object = heap.get(handle).unwrap();
        assert_eq!(object.internal_fields.len(), 2);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn sweep_frees_unmarked() {
        let mut heap = ObjectHeap::new();
        let kept = heap.allocate(HeapObject::ordinary(None, 0));
        let dropped = heap.allocate(HeapObject::ordinary(None, 0));

        assert!(heap.mark(kept));
        assert!(!heap.mark(kept));
        assert_eq!(heap.sweep(), 1);

        assert!(heap.contains(kept));
        assert!(!heap.contains(dropped));
        assert!(!heap.is_marked(kept));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn stale_handle_after_reuse() {
        let mut heap = ObjectHeap::new();
        let first = heap.allocate(HeapObject::ordinary(None, 0));
        heap.sweep();

        let second = heap.allocate(HeapObject::ordinary(None, 1));
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
        assert!(heap.get(first).is_none());
        assert!(heap.get(second).is_some());
    }
}
