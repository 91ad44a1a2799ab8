//! The closed set of things a class can bind.

use scriptwrap_core::{Isolate, NativeFn, PropertyAttribute, TemplateId, TemplateProperty, Value};
use tracing::trace;

/// A named member of a bound class.
///
/// [`ClassBuilder`](crate::ClassBuilder) builds these from the shape of what
/// it is given; [`ClassBuilder::bind`](crate::ClassBuilder::bind) accepts
/// them directly.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Function on the instance prototype, called with a proxy as `this`.
    Method(NativeFn),
    /// Function on the constructor function.
    Function(NativeFn),
    /// Native field exposed as an instance property.
    DataMember {
        getter: NativeFn,
        setter: Option<NativeFn>,
    },
    /// Getter and optional setter exposed as an instance property.
    Accessor {
        getter: NativeFn,
        setter: Option<NativeFn>,
    },
    /// Read-only value on the constructor function.
    Constant(Value),
}

/// The templates a class binds into.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassTemplates {
    /// Instance side: methods and properties go on its prototype.
    pub(crate) native: TemplateId,
    /// Class side: functions and constants go on the constructor function.
    pub(crate) script: TemplateId,
}

impl Binding {
    fn kind(&self) -> &'static str {
        match self {
            Binding::Method(_) => "method",
            Binding::Function(_) => "function",
            Binding::DataMember { .. } => "data member",
            Binding::Accessor { .. } => "accessor",
            Binding::Constant(_) => "constant",
        }
    }

    pub(crate) fn install(self, isolate: &mut Isolate, templates: ClassTemplates, name: &str) {
        trace!(name, kind = self.kind(), "binding");
        match self {
            Binding::Method(callback) => isolate.set_prototype_property(
                templates.native,
                name,
                TemplateProperty::Function {
                    callback,
                    attributes: PropertyAttribute::empty(),
                },
            ),
            Binding::Function(callback) => isolate.set_static_property(
                templates.script,
                name,
                TemplateProperty::Function {
                    callback,
                    attributes: PropertyAttribute::empty(),
                },
            ),
            Binding::DataMember { getter, setter } | Binding::Accessor { getter, setter } => {
                let mut attributes = PropertyAttribute::DONT_DELETE;
                if setter.is_none() {
                    attributes |= PropertyAttribute::READ_ONLY;
                }
                isolate.set_prototype_property(
                    templates.native,
                    name,
                    TemplateProperty::Accessor {
                        getter,
                        setter,
                        attributes,
                    },
                );
            }
            Binding::Constant(value) => isolate.set_static_property(
                templates.script,
                name,
                TemplateProperty::Value {
                    value,
                    attributes: PropertyAttribute::READ_ONLY | PropertyAttribute::DONT_DELETE,
                },
            ),
        }
    }
}
