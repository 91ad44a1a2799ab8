//! Native class traits.

use scriptwrap_core::RawPtr;

/// A Rust type that can be exposed to script.
pub trait NativeClass: 'static {
    /// Class name used for the constructor function and in errors.
    const NAME: &'static str;
}

/// Declares that `Self` contains a `B` sub-object.
///
/// # Safety
///
/// `upcast` must return a pointer to the `B` embedded in the object `ptr`
/// points to, for every valid `ptr`.
///
/// Object lookups by address through a base type only succeed when the base
/// lives at offset zero; use `#[repr(C)]` with the base as the first field
/// when that matters.
pub unsafe trait Inherits<B: NativeClass>: NativeClass {
    /// Adjust a pointer to `Self` to its `B` sub-object.
    fn upcast(ptr: *mut Self) -> *mut B;
}

/// Implement [`Inherits`] for a base stored in a named field.
///
/// ```ignore
/// #[repr(C)]
/// struct Dog {
///     animal: Animal,
///     breed: String,
/// }
///
/// inherits!(Dog => Animal, animal);
/// ```
#[macro_export]
macro_rules! inherits {
    ($derived:ty => $base:ty, $field:ident) => {
        unsafe impl $crate::Inherits<$base> for $derived {
            fn upcast(ptr: *mut Self) -> *mut $base {
                unsafe { ::core::ptr::addr_of_mut!((*ptr).$field) }
            }
        }
    };
}

/// Type-erased form of [`Inherits::upcast`], stored in cast tables.
pub fn upcast_erased<T, B>(ptr: RawPtr) -> RawPtr
where
    T: Inherits<B>,
    B: NativeClass,
{
    T::upcast(ptr.cast::<T>()).cast()
}

/// Free an object allocated with `Box::new`, given its erased address.
pub(crate) fn destroy_boxed<T>(ptr: RawPtr) {
    drop(unsafe { Box::from_raw(ptr.cast::<T>()) });
}
