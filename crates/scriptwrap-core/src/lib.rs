//! Host object model for scriptwrap.
//!
//! This crate provides the script-side world native classes are bound into:
//!
//! - [`Isolate`]: the heap of script objects, function templates, handle
//!   scopes, persistent handles and embedder data slots
//! - [`Value`]: script values, with objects referenced by [`ObjectHandle`]
//! - [`NativeFn`] and [`CallContext`]: native callbacks and their calling
//!   convention
//! - [`FromScript`] and [`ToScript`]: marshaling between Rust and script
//!   values
//! - Error types for every phase, converted into a script [`Exception`] at
//!   the call boundary

mod config;
mod convert;
mod error;
mod gc;
mod handles;
mod heap;
mod isolate;
mod native_fn;
mod property;
mod template;
mod value;

pub use config::{DEFAULT_DATA_SLOTS, DEFAULT_DIRECTORY_SLOT, IsolateConfig};
pub use convert::{FromScript, ToScript};
pub use error::{
    ConfigError, ConversionError, Exception, NativeError, RegistrationError, ScriptWrapError,
};
pub use gc::GcStats;
pub use handles::{Persistent, WeakCallback};
pub use heap::{InternalField, ObjectHandle, RawPtr};
pub use isolate::{DisposeHook, Isolate};
pub use native_fn::{CallContext, NativeCallable, NativeFn};
pub use property::{Property, PropertyAttribute, TemplateProperty};
pub use template::TemplateId;
pub use value::Value;
