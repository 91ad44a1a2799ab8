//! Object and template properties.

use bitflags::bitflags;

use crate::native_fn::NativeFn;
use crate::value::Value;

bitflags! {
    /// Attributes controlling how a property may be used from script.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttribute: u8 {
        /// Assignments are rejected.
        const READ_ONLY = 1 << 0;
        /// The property is skipped by enumeration.
        const DONT_ENUM = 1 << 1;
        /// The property cannot be deleted.
        const DONT_DELETE = 1 << 2;
    }
}

/// A property stored on a live object.
#[derive(Debug, Clone)]
pub enum Property {
    /// Plain value.
    Data {
        value: Value,
        attributes: PropertyAttribute,
    },
    /// Native getter and optional setter, called with the receiver as `this`.
    Accessor {
        getter: NativeFn,
        setter: Option<NativeFn>,
        attributes: PropertyAttribute,
    },
}

impl Property {
    /// A data property with the given attributes.
    pub fn data(value: Value, attributes: PropertyAttribute) -> Self {
        Property::Data { value, attributes }
    }

    /// The property's attributes.
    pub fn attributes(&self) -> PropertyAttribute {
        match self {
            Property::Data { attributes, .. } | Property::Accessor { attributes, .. } => {
                *attributes
            }
        }
    }

    /// Whether script assignments to this property are rejected.
    pub fn is_read_only(&self) -> bool {
        match self {
            Property::Data { attributes, .. } => attributes.contains(PropertyAttribute::READ_ONLY),
            Property::Accessor { setter, .. } => setter.is_none(),
        }
    }
}

/// A property declared on a template, materialized when the template is
/// instantiated.
#[derive(Debug, Clone)]
pub enum TemplateProperty {
    /// Plain value.
    Value {
        value: Value,
        attributes: PropertyAttribute,
    },
    /// Native function, instantiated as a function object.
    Function {
        callback: NativeFn,
        attributes: PropertyAttribute,
    },
    /// Native getter and optional setter.
    Accessor {
        getter: NativeFn,
        setter: Option<NativeFn>,
        attributes: PropertyAttribute,
    },
}
