//! Typed object operations.
//!
//! Thin typed wrappers over the [`TypeDescriptor`] object operations. The
//! class must have been declared in the isolate (through
//! [`ClassBuilder::new`](crate::ClassBuilder::new) or
//! [`DescriptorDirectory::instance`]) before objects of it are wrapped.

use std::fmt;
use std::ptr::NonNull;

use scriptwrap_core::{
    ConversionError, FromScript, Isolate, ObjectHandle, RawPtr, RegistrationError, Value,
};
use scriptwrap_registry::{DescriptorDirectory, NativeClass, TypeDescriptor, TypeIdentity};

/// Expose an object the caller keeps ownership of.
///
/// The proxy stays alive until the object is destroyed with
/// [`destroy_object`] or [`destroy_objects`], neither of which frees it.
///
/// # Safety
///
/// `object` must stay valid until it is destroyed from the isolate, or the
/// isolate is dropped.
pub unsafe fn reference_external<T: NativeClass>(
    isolate: &mut Isolate,
    object: NonNull<T>,
) -> Result<ObjectHandle, RegistrationError> {
    let identity = DescriptorDirectory::instance::<T>(isolate)?;
    let ptr: RawPtr = object.as_ptr().cast();
    // SAFETY: the caller keeps `object` alive; `identity` names `T`.
    unsafe { TypeDescriptor::wrap_external_object(isolate, identity, ptr) }
}

/// Expose an object and hand its ownership to the isolate.
///
/// The object is dropped when its proxy is collected, when it is destroyed,
/// or when the isolate is dropped. On failure it is dropped before
/// returning.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn import_external<T: NativeClass>(
    isolate: &mut Isolate,
    object: Box<T>,
) -> Result<ObjectHandle, RegistrationError> {
    let identity = DescriptorDirectory::instance::<T>(isolate)?;
    let ptr: RawPtr = Box::into_raw(object).cast();
    // SAFETY: `ptr` is a `Box<T>` and `identity` names `T`.
    let wrapped = unsafe { TypeDescriptor::wrap_object(isolate, identity, ptr) };
    if wrapped.is_err() {
        // SAFETY: the isolate did not take the box.
        drop(unsafe { Box::from_raw(ptr.cast::<T>()) });
    }
    wrapped
}

/// The native object behind a script value, as a `T`.
///
/// Proxies of classes deriving from `T` unwrap to their `T` part, as do
/// script objects inheriting from such a proxy.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn unwrap_object<T: NativeClass>(isolate: &Isolate, value: &Value) -> Option<NonNull<T>> {
    let ptr = TypeDescriptor::unwrap_object(isolate, TypeIdentity::of::<T>(), value)?;
    NonNull::new(ptr.cast::<T>())
}

/// The proxy of an exposed object.
///
/// Objects exposed as a class deriving from `T` are found through their
/// `T` address when `T` is their first base.
pub fn find_object<T: NativeClass>(
    isolate: &mut Isolate,
    object: *const T,
) -> Option<ObjectHandle> {
    let ptr: RawPtr = object.cast_mut().cast();
    let proxy = TypeDescriptor::find_object(isolate, TypeIdentity::of::<T>(), ptr)?;
    Some(isolate.local(proxy))
}

/// Stop exposing an object, dropping it if the isolate owns it.
///
/// The proxy no longer unwraps afterwards.
pub fn destroy_object<T: NativeClass>(
    isolate: &mut Isolate,
    object: *mut T,
) -> Result<(), RegistrationError> {
    TypeDescriptor::destroy_object(isolate, TypeIdentity::of::<T>(), object.cast())
}

/// Stop exposing every object of `T`, dropping the owned ones.
///
/// Returns the number of objects released.
pub fn destroy_objects<T: NativeClass>(isolate: &mut Isolate) -> usize {
    TypeDescriptor::destroy_objects(isolate, TypeIdentity::of::<T>())
}

/// A native object received from script as a callback argument.
///
/// Converting fails unless the value unwraps to a `T`.
pub struct ObjectRef<T: NativeClass>(NonNull<T>);

impl<T: NativeClass> ObjectRef<T> {
    /// The object's address.
    pub fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }

    /// Borrow the object.
    ///
    /// # Safety
    ///
    /// The object must not have been destroyed, and must not be borrowed
    /// mutably elsewhere.
    pub unsafe fn as_ref(&self) -> &T {
        unsafe { self.0.as_ref() }
    }

    /// Borrow the object mutably.
    ///
    /// # Safety
    ///
    /// The object must not have been destroyed, and must not be borrowed
    /// elsewhere.
    pub unsafe fn as_mut(&mut self) -> &mut T {
        unsafe { self.0.as_mut() }
    }
}

impl<T: NativeClass> Clone for ObjectRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: NativeClass> Copy for ObjectRef<T> {}

impl<T: NativeClass> fmt::Debug for ObjectRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef")
            .field(&T::NAME)
            .field(&self.0)
            .finish()
    }
}

impl<T: NativeClass> FromScript for ObjectRef<T> {
    fn from_script(isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        unwrap_object::<T>(isolate, value)
            .map(ObjectRef)
            .ok_or(ConversionError::NotWrapped { class: T::NAME })
    }
}
