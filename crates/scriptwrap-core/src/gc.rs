//! Mark and sweep collection.
//!
//! Roots are the global object, objects rooted by open handle scopes, strong
//! persistents, and the functions and prototypes of instantiated templates.
//! Marking follows prototypes and object-valued data properties. Weak
//! persistents whose target is unmarked are cleared before the sweep; their
//! callbacks run after it, once the heap is consistent again.

use tracing::debug;

use crate::heap::ObjectHandle;
use crate::isolate::Isolate;
use crate::property::Property;
use crate::value::Value;

/// Counters reported by a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects found reachable.
    pub marked: usize,
    /// Objects freed.
    pub collected: usize,
    /// Weak callbacks run.
    pub finalized: usize,
}

impl Isolate {
    /// Run a full collection.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn collect_garbage(&mut self) -> GcStats {
        let mut worklist: Vec<ObjectHandle> = vec![self.global];
        worklist.extend(self.locals.iter().copied());
        worklist.extend(self.handles.strong_targets());
        for template in &self.templates {
            worklist.extend(template.function);
            worklist.extend(template.prototype);
        }

        let mut marked = 0;
        while let Some(handle) = worklist.pop() {
            if !self.heap.mark(handle) {
                continue;
            }
            marked += 1;
            if let Some(object) = self.heap.get(handle) {
                worklist.extend(object.prototype);
                for property in object.properties.values() {
                    if let Property::Data {
                        value: Value::Object(child),
                        ..
                    } = property
                    {
                        worklist.push(*child);
                    }
                }
            }
        }

        let heap = &self.heap;
        let callbacks = self.handles.clear_dead_weak(|id| heap.is_marked(id));
        let collected = self.heap.sweep();
        self.allocations_since_gc = 0;

        let finalized = callbacks.len();
        for callback in callbacks {
            callback(self);
        }

        debug!(marked, collected, finalized, "garbage collection finished");
        GcStats {
            marked,
            collected,
            finalized,
        }
    }
}
