//! Expose native Rust types to an embedded script object model.
//!
//! A class is declared once per isolate with a [`ClassBuilder`]; its objects
//! are then handed to script either by script code calling the class
//! constructor, or by the embedder through the functions in [`objects`].
//! Script values unwrap back into native pointers, adjusted through the
//! declared base classes.
//!
//! ```ignore
//! use scriptwrap::prelude::*;
//!
//! #[repr(C)]
//! struct Animal {
//!     name: String,
//! }
//!
//! #[repr(C)]
//! struct Dog {
//!     animal: Animal,
//!     tricks: i32,
//! }
//!
//! impl NativeClass for Animal {
//!     const NAME: &'static str = "Animal";
//! }
//!
//! impl NativeClass for Dog {
//!     const NAME: &'static str = "Dog";
//! }
//!
//! inherits!(Dog => Animal, animal);
//!
//! let mut isolate = Isolate::new();
//! ClassBuilder::<Animal>::new(&mut isolate)?.member("name", field!(Animal, name));
//! let dog = ClassBuilder::<Dog>::new(&mut isolate)?
//!     .inherit::<Animal>()?
//!     .constructor(|name: String| Dog { animal: Animal { name }, tricks: 0 })
//!     .js_function();
//! isolate.set_global("Dog", Value::Object(dog))?;
//! ```

mod binding;
mod callable;
mod class_builder;
mod fields;
pub mod objects;

pub use binding::Binding;
pub use callable::{IntoConstructor, IntoFunction, IntoMethod, IntoMethodMut, NativeConstructor};
pub use class_builder::ClassBuilder;
pub use fields::Field;
pub use objects::ObjectRef;

pub use scriptwrap_core::{
    CallContext, ConfigError, ConversionError, Exception, FromScript, GcStats, Isolate,
    IsolateConfig, NativeCallable, NativeError, NativeFn, ObjectHandle, Persistent,
    RegistrationError, ScriptWrapError, ToScript, Value,
};
pub use scriptwrap_registry::{
    DescriptorDirectory, Inherits, NativeClass, TypeDescriptor, TypeIdentity, inherits,
};

/// Re-exports for declaring classes.
pub mod prelude {
    pub use crate::objects::{
        ObjectRef, destroy_object, destroy_objects, find_object, import_external,
        reference_external, unwrap_object,
    };
    pub use crate::{Binding, ClassBuilder, Field, field};
    pub use scriptwrap_core::{
        CallContext, Exception, FromScript, Isolate, NativeError, ToScript, Value,
    };
    pub use scriptwrap_registry::{Inherits, NativeClass, inherits};
}
