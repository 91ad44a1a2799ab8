//! Function templates.
//!
//! A template describes a class of script objects: the call handler of the
//! constructor function, the number of internal fields of its instances, the
//! properties of the instances' prototype, and the properties of the
//! constructor function itself. Templates chain through [`inherit`], which
//! links the instance prototype to the parent template's prototype.
//!
//! Templates stay live after instantiation: properties added later, or a
//! parent set later, are mirrored onto the already instantiated objects.
//!
//! [`inherit`]: crate::Isolate::inherit

use rustc_hash::FxHashMap;

use crate::heap::ObjectHandle;
use crate::native_fn::NativeFn;
use crate::property::TemplateProperty;

/// Index of a function template within its isolate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateId(pub(crate) u32);

impl TemplateId {
    /// Index of this template in the isolate's template table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
pub(crate) struct FunctionTemplate {
    pub(crate) class_name: Option<String>,
    pub(crate) callback: Option<NativeFn>,
    pub(crate) parent: Option<TemplateId>,
    pub(crate) internal_field_count: usize,
    pub(crate) prototype_properties: FxHashMap<String, TemplateProperty>,
    pub(crate) static_properties: FxHashMap<String, TemplateProperty>,
    /// Instantiated constructor function, created on first use.
    pub(crate) function: Option<ObjectHandle>,
    /// Prototype shared by the template's instances.
    pub(crate) prototype: Option<ObjectHandle>,
}

impl FunctionTemplate {
    pub(crate) fn new(callback: Option<NativeFn>) -> Self {
        Self {
            callback,
            ..Self::default()
        }
    }

    pub(crate) fn display_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or("anonymous")
    }
}
