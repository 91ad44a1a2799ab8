//! Per-isolate class registry for scriptwrap.
//!
//! This crate tracks which native types an isolate knows about, how they
//! relate, and which native objects are currently exposed to script:
//!
//! - [`TypeIdentity`]: process-wide integer identity of a native type
//! - [`CastTable`]: direct bases with address adjustments, and derivatives
//! - [`ObjectRegistry`]: native address to proxy handle, per exact type
//! - [`TypeDescriptor`]: everything above for one type, plus its templates,
//!   constructor trampoline and the wrap/unwrap/destroy operations
//! - [`DescriptorDirectory`]: the isolate's descriptors, indexed by identity
//!
//! Native types opt in through [`NativeClass`], and declare their bases
//! through [`Inherits`] (usually with the [`inherits!`] macro).

mod cast_table;
mod descriptor;
mod directory;
mod inherits;
mod object_registry;
mod type_identity;

pub use cast_table::{BaseLink, CastFn, CastTable, Hierarchy};
pub use descriptor::{
    ADDRESS_FIELD, Constructor, DestroyFn, IDENTITY_FIELD, INTERNAL_FIELD_COUNT, TypeDescriptor,
};
pub use directory::DescriptorDirectory;
pub use inherits::{Inherits, NativeClass, upcast_erased};
pub use object_registry::{ObjectEntry, ObjectRegistry, Ownership};
pub use type_identity::TypeIdentity;
