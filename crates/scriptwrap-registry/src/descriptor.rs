//! Type descriptors and the object wrapping operations built on them.
//!
//! A [`TypeDescriptor`] exists once per native type per isolate. It owns the
//! type's cast table and object registry, an optional constructor trampoline,
//! and two function templates:
//!
//! - the *native* template, from which every proxy of the type is
//!   instantiated; its instances carry two internal fields, the native
//!   address and the identity of the wrapping descriptor
//! - the *script* template, the constructor function exposed to script; its
//!   call handler runs the trampoline and returns the wrapped result
//!
//! The native template inherits from the script template, and the script
//! template inherits from the first base's native template, so members bound
//! along that chain are visible on every proxy.
//!
//! The wrapping operations are associated functions taking the isolate: the
//! descriptor lives in the isolate's [`DescriptorDirectory`], and no borrow of
//! it is held while native constructors or destructors run.

use std::fmt;
use std::rc::Rc;

use scriptwrap_core::{
    CallContext, InternalField, Isolate, NativeError, NativeFn, ObjectHandle, RawPtr,
    RegistrationError, TemplateId, Value,
};
use tracing::{trace, warn};

use crate::cast_table::CastTable;
use crate::directory::DescriptorDirectory;
use crate::object_registry::{ObjectEntry, ObjectRegistry, Ownership};
use crate::type_identity::TypeIdentity;

/// Number of internal fields of every proxy.
pub const INTERNAL_FIELD_COUNT: usize = 2;
/// Internal field holding the native address.
pub const ADDRESS_FIELD: usize = 0;
/// Internal field holding the identity of the wrapping descriptor.
pub const IDENTITY_FIELD: usize = 1;

/// Builds a native object from script call arguments.
pub type Constructor = Rc<dyn Fn(&mut CallContext<'_>) -> Result<RawPtr, NativeError>>;

/// Frees an owned native object.
pub type DestroyFn = fn(RawPtr);

/// Per-isolate runtime information about one native type.
pub struct TypeDescriptor {
    identity: TypeIdentity,
    class: &'static str,
    cast_table: CastTable,
    objects: ObjectRegistry,
    constructor: Option<Constructor>,
    destroy: DestroyFn,
    native_template: TemplateId,
    script_template: TemplateId,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("identity", &self.identity)
            .field("class", &self.class)
            .field("cast_table", &self.cast_table)
            .field("objects", &self.objects.len())
            .field("has_constructor", &self.constructor.is_some())
            .field("native_template", &self.native_template)
            .field("script_template", &self.script_template)
            .finish()
    }
}

impl TypeDescriptor {
    pub(crate) fn new(
        isolate: &mut Isolate,
        identity: TypeIdentity,
        class: &'static str,
        destroy: DestroyFn,
    ) -> Self {
        let native_template = isolate.new_function_template(None);
        isolate.set_class_name(native_template, class);
        isolate.set_internal_field_count(native_template, INTERNAL_FIELD_COUNT);

        let script_template = isolate.new_function_template(Some(construct_trampoline(identity)));
        isolate.set_class_name(script_template, class);
        isolate.inherit(native_template, script_template);

        Self {
            identity,
            class,
            cast_table: CastTable::new(identity, class),
            objects: ObjectRegistry::new(class),
            constructor: None,
            destroy,
            native_template,
            script_template,
        }
    }

    /// The type's identity.
    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// The type's class name.
    pub fn class_name(&self) -> &'static str {
        self.class
    }

    /// Bases and derivatives of the type.
    pub fn cast_table(&self) -> &CastTable {
        &self.cast_table
    }

    pub(crate) fn cast_table_mut(&mut self) -> &mut CastTable {
        &mut self.cast_table
    }

    /// Objects wrapped as this exact type.
    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    /// Template every proxy of the type is instantiated from.
    pub fn native_template(&self) -> TemplateId {
        self.native_template
    }

    /// Template of the constructor function exposed to script.
    pub fn script_template(&self) -> TemplateId {
        self.script_template
    }

    /// Whether script may construct the type.
    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Install the constructor trampoline, replacing any previous one.
    ///
    /// # Safety
    ///
    /// Every pointer `constructor` returns must come from
    /// `Box::<T>::into_raw`, for the `T` this descriptor was created for. The
    /// trampoline hands it to [`wrap_object`](Self::wrap_object).
    pub unsafe fn set_constructor(&mut self, constructor: Constructor) -> Option<Constructor> {
        self.constructor.replace(constructor)
    }

    // ========================================================================
    // Wrapping
    // ========================================================================

    /// Wrap an object the embedder keeps ownership of.
    ///
    /// The proxy is held strongly until the object is destroyed through
    /// [`destroy_object`](Self::destroy_object) or
    /// [`destroy_objects`](Self::destroy_objects), which never free it.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live instance of the `T` that `identity` names,
    /// and stay valid until the object is destroyed or the isolate is
    /// dropped.
    pub unsafe fn wrap_external_object(
        isolate: &mut Isolate,
        identity: TypeIdentity,
        ptr: RawPtr,
    ) -> Result<ObjectHandle, RegistrationError> {
        Self::wrap(isolate, identity, ptr, Ownership::External)
    }

    /// Wrap an object and take ownership of it.
    ///
    /// The object is freed when the proxy is collected, or when it is
    /// destroyed explicitly.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::<T>::into_raw` for the `T` that `identity`
    /// names. On success the isolate owns the box.
    ///
    /// ```compile_fail
    /// # use scriptwrap_core::Isolate;
    /// # use scriptwrap_registry::{DescriptorDirectory, NativeClass, TypeDescriptor};
    /// struct Meter(u32);
    ///
    /// impl NativeClass for Meter {
    ///     const NAME: &'static str = "Meter";
    /// }
    ///
    /// let mut isolate = Isolate::new();
    /// let identity = DescriptorDirectory::instance::<Meter>(&mut isolate).unwrap();
    /// let mut meter = Meter(0);
    /// let ptr: *mut () = (&raw mut meter).cast();
    /// TypeDescriptor::wrap_object(&mut isolate, identity, ptr).unwrap();
    /// ```
    pub unsafe fn wrap_object(
        isolate: &mut Isolate,
        identity: TypeIdentity,
        ptr: RawPtr,
    ) -> Result<ObjectHandle, RegistrationError> {
        Self::wrap(isolate, identity, ptr, Ownership::Owned)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn wrap(
        isolate: &mut Isolate,
        identity: TypeIdentity,
        ptr: RawPtr,
        ownership: Ownership,
    ) -> Result<ObjectHandle, RegistrationError> {
        let directory = DescriptorDirectory::of(isolate)?;
        let (template, class) = {
            let directory = directory.borrow();
            let descriptor = directory.require(identity)?;
            if descriptor.objects.contains(ptr) {
                return Err(RegistrationError::DuplicateObject {
                    class: descriptor.class.to_string(),
                    address: ptr as usize,
                });
            }
            (descriptor.native_template, descriptor.class)
        };

        let proxy = isolate.new_instance(template);
        let tag = InternalField::Tag(identity.as_u32());
        isolate.set_internal_field(proxy, ADDRESS_FIELD, InternalField::Address(ptr));
        isolate.set_internal_field(proxy, IDENTITY_FIELD, tag);

        let handle = isolate.persistent(proxy);
        if ownership == Ownership::Owned {
            let finalizer = move |isolate: &mut Isolate| finalize(isolate, identity, ptr);
            isolate.set_weak(handle, Some(Box::new(finalizer)));
        }

        directory
            .borrow_mut()
            .require_mut(identity)?
            .objects
            .add(ptr, ObjectEntry { handle, ownership })?;
        trace!(class, address = ptr as usize, ?ownership, "object wrapped");
        Ok(proxy)
    }

    /// The native address behind a script value, adjusted to `identity`.
    ///
    /// Objects that are not proxies themselves are searched through their
    /// prototype chain, so script objects inheriting from a proxy unwrap to
    /// it. Returns `None` when no proxy of a compatible type is found.
    ///
    /// # Panics
    ///
    /// Panics if the directory is mutably borrowed, which only happens when
    /// called from inside a directory update.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn unwrap_object(
        isolate: &Isolate,
        identity: TypeIdentity,
        value: &Value,
    ) -> Option<RawPtr> {
        let directory = DescriptorDirectory::existing(isolate)?;
        let directory = directory.borrow();

        let mut current = value.as_object();
        while let Some(object) = current {
            if isolate.internal_field_count(object) == INTERNAL_FIELD_COUNT
                && let InternalField::Address(ptr) = isolate.internal_field(object, ADDRESS_FIELD)
                && let InternalField::Tag(tag) = isolate.internal_field(object, IDENTITY_FIELD)
                && let Some(table) = directory
                    .descriptor(TypeIdentity::from_raw(tag))
                    .map(TypeDescriptor::cast_table)
                && let Some(found) = table.cast(ptr, identity, &*directory)
            {
                return Some(found);
            }
            current = isolate.prototype_of(object);
        }
        None
    }

    /// The proxy of a wrapped object, searching derived types' registries
    /// when the address is not registered as `identity` itself.
    ///
    /// # Panics
    ///
    /// Panics if the directory is mutably borrowed.
    pub fn find_object(
        isolate: &Isolate,
        identity: TypeIdentity,
        ptr: RawPtr,
    ) -> Option<ObjectHandle> {
        let directory = DescriptorDirectory::existing(isolate)?;
        let directory = directory.borrow();
        let descriptor = directory.descriptor(identity)?;
        let handle = descriptor
            .objects
            .find(ptr, descriptor.cast_table.derivatives(), &*directory)?;
        isolate.persistent_get(handle)
    }

    /// Unregister one object, freeing it if it is owned.
    ///
    /// The proxy stops unwrapping to the object.
    pub fn destroy_object(
        isolate: &mut Isolate,
        identity: TypeIdentity,
        ptr: RawPtr,
    ) -> Result<(), RegistrationError> {
        let directory = DescriptorDirectory::of(isolate)?;
        let (entry, destroy) = {
            let mut directory = directory.borrow_mut();
            let descriptor = directory.require_mut(identity)?;
            (descriptor.objects.remove(ptr)?, descriptor.destroy)
        };
        release(isolate, ptr, entry, destroy);
        trace!(
            identity = identity.as_u32(),
            address = ptr as usize,
            "object destroyed"
        );
        Ok(())
    }

    /// Unregister every object of the type, freeing the owned ones.
    ///
    /// Returns the number of objects unregistered.
    pub fn destroy_objects(isolate: &mut Isolate, identity: TypeIdentity) -> usize {
        let Some(directory) = DescriptorDirectory::existing(isolate) else {
            return 0;
        };
        let drained = {
            let mut directory = directory.borrow_mut();
            match directory.descriptor_mut(identity) {
                Some(descriptor) => {
                    let destroy = descriptor.destroy;
                    descriptor
                        .objects
                        .remove_all()
                        .into_iter()
                        .map(|(ptr, entry)| (ptr, entry, destroy))
                        .collect()
                }
                None => Vec::new(),
            }
        };
        let count = drained.len();
        for (ptr, entry, destroy) in drained {
            release(isolate, ptr, entry, destroy);
        }
        count
    }

    pub(crate) fn drain_objects(&mut self) -> Vec<(RawPtr, ObjectEntry, DestroyFn)> {
        let destroy = self.destroy;
        self.objects
            .remove_all()
            .into_iter()
            .map(|(ptr, entry)| (ptr, entry, destroy))
            .collect()
    }
}

/// Drop the proxy handle of an unregistered object and free the object if
/// it is owned.
pub(crate) fn release(isolate: &mut Isolate, ptr: RawPtr, entry: ObjectEntry, destroy: DestroyFn) {
    if let Some(proxy) = isolate.persistent_get(entry.handle) {
        isolate.set_internal_field(proxy, ADDRESS_FIELD, InternalField::Empty);
        isolate.set_internal_field(proxy, IDENTITY_FIELD, InternalField::Empty);
    }
    isolate.reset(entry.handle);
    if entry.ownership == Ownership::Owned {
        destroy(ptr);
    }
}

fn finalize(isolate: &mut Isolate, identity: TypeIdentity, ptr: RawPtr) {
    if let Err(err) = TypeDescriptor::destroy_object(isolate, identity, ptr) {
        warn!(error = %err, "weak finalizer could not destroy object");
    }
}

fn construct_trampoline(identity: TypeIdentity) -> NativeFn {
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let (constructor, destroy, class) = {
            let directory = DescriptorDirectory::existing(ctx.isolate_ref())
                .ok_or_else(|| NativeError::other("class registry is not available"))?;
            let directory = directory.borrow();
            let descriptor = directory.require(identity)?;
            (
                descriptor.constructor.clone(),
                descriptor.destroy,
                descriptor.class,
            )
        };
        let Some(constructor) = constructor else {
            return Err(NativeError::ConstructionNotAllowed {
                class: class.to_string(),
            });
        };

        let ptr = constructor(ctx)?;
        // SAFETY: `set_constructor` requires constructors to return boxes of
        // the descriptor's type.
        let wrapped = unsafe { TypeDescriptor::wrap_object(ctx.isolate(), identity, ptr) };
        match wrapped {
            Ok(proxy) => {
                ctx.set_return_value(Value::Object(proxy));
                Ok(())
            }
            Err(err) => {
                destroy(ptr);
                Err(err.into())
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use scriptwrap_core::Exception;

    use super::*;
    use crate::inherits::NativeClass;

    thread_local! {
        static DROPS: Cell<usize> = const { Cell::new(0) };
    }

    struct Counter {
        value: i64,
    }

    impl Drop for Counter {
        fn drop(&mut self) {
            DROPS.with(|drops| drops.set(drops.get() + 1));
        }
    }

    impl NativeClass for Counter {
        const NAME: &'static str = "Counter";
    }

    struct Sealed(u8);

    impl NativeClass for Sealed {
        const NAME: &'static str = "Sealed";
    }

    fn drops() -> usize {
        DROPS.with(Cell::get)
    }

    fn boxed(value: i64) -> RawPtr {
        Box::into_raw(Box::new(Counter { value })).cast()
    }

    fn counter_identity(isolate: &mut Isolate) -> TypeIdentity {
        DescriptorDirectory::instance::<Counter>(isolate).unwrap()
    }

    fn construct_one(_ctx: &mut CallContext<'_>) -> Result<RawPtr, NativeError> {
        Ok(boxed(1))
    }

    fn construct_from_arg(ctx: &mut CallContext<'_>) -> Result<RawPtr, NativeError> {
        let value: i64 = ctx.arg(0)?;
        Ok(boxed(value))
    }

    fn wrap_external(
        isolate: &mut Isolate,
        identity: TypeIdentity,
        counter: &mut Counter,
    ) -> ObjectHandle {
        let ptr: RawPtr = (counter as *mut Counter).cast();
        unsafe { TypeDescriptor::wrap_external_object(isolate, identity, ptr) }.unwrap()
    }

    fn wrap_owned(isolate: &mut Isolate, identity: TypeIdentity, ptr: RawPtr) -> ObjectHandle {
        unsafe { TypeDescriptor::wrap_object(isolate, identity, ptr) }.unwrap()
    }

    #[test]
    fn wrap_and_unwrap_round_trip() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let mut counter = Counter { value: 5 };
        let ptr: RawPtr = (&raw mut counter).cast();

        let proxy = wrap_external(&mut isolate, identity, &mut counter);
        let value = Value::Object(proxy);
        let unwrapped = TypeDescriptor::unwrap_object(&isolate, identity, &value);
        assert_eq!(unwrapped, Some(ptr));
        let found = TypeDescriptor::find_object(&isolate, identity, ptr);
        assert_eq!(found, Some(proxy));

        TypeDescriptor::destroy_object(&mut isolate, identity, ptr).unwrap();
        assert_eq!(counter.value, 5);
    }

    #[test]
    fn duplicate_wrap_is_rejected() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let mut counter = Counter { value: 1 };
        let ptr: RawPtr = (&raw mut counter).cast();

        wrap_external(&mut isolate, identity, &mut counter);
        let objects_before = isolate.heap_object_count();
        let result = unsafe { TypeDescriptor::wrap_external_object(&mut isolate, identity, ptr) };
        let err = result.unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateObject { .. }));
        assert_eq!(isolate.heap_object_count(), objects_before);

        TypeDescriptor::destroy_object(&mut isolate, identity, ptr).unwrap();
    }

    #[test]
    fn unwrap_misses_resolve_to_none() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let plain = Value::Object(isolate.new_object());

        let number = Value::Int(3);
        let found = TypeDescriptor::unwrap_object(&isolate, identity, &number);
        assert_eq!(found, None);
        let found = TypeDescriptor::unwrap_object(&isolate, identity, &plain);
        assert_eq!(found, None);
    }

    #[test]
    fn unwrap_for_unrelated_type_fails() {
        let mut isolate = Isolate::new();
        let counter = counter_identity(&mut isolate);
        let sealed = DescriptorDirectory::instance::<Sealed>(&mut isolate).unwrap();
        let mut object = Counter { value: 0 };

        let proxy = Value::Object(wrap_external(&mut isolate, counter, &mut object));
        let found = TypeDescriptor::unwrap_object(&isolate, sealed, &proxy);
        assert_eq!(found, None);
        TypeDescriptor::destroy_objects(&mut isolate, counter);
    }

    #[test]
    fn unwrap_walks_prototype_chain() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let mut counter = Counter { value: 2 };
        let ptr: RawPtr = (&raw mut counter).cast();

        let proxy = wrap_external(&mut isolate, identity, &mut counter);
        let child = isolate.new_object();
        isolate.set_prototype(child, Some(proxy));
        let child = Value::Object(child);
        let found = TypeDescriptor::unwrap_object(&isolate, identity, &child);
        assert_eq!(found, Some(ptr));
        TypeDescriptor::destroy_objects(&mut isolate, identity);
    }

    #[test]
    #[should_panic(expected = "already mutably borrowed")]
    fn unwrap_during_directory_update_panics() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let mut counter = Counter { value: 6 };
        let proxy = Value::Object(wrap_external(&mut isolate, identity, &mut counter));

        let directory = DescriptorDirectory::existing(&isolate).unwrap();
        let _update = directory.borrow_mut();
        TypeDescriptor::unwrap_object(&isolate, identity, &proxy);
    }

    #[test]
    #[should_panic(expected = "already mutably borrowed")]
    fn find_during_directory_update_panics() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let mut counter = Counter { value: 6 };
        let ptr: RawPtr = (&raw mut counter).cast();
        wrap_external(&mut isolate, identity, &mut counter);

        let directory = DescriptorDirectory::existing(&isolate).unwrap();
        let _update = directory.borrow_mut();
        TypeDescriptor::find_object(&isolate, identity, ptr);
    }

    #[test]
    fn destroyed_proxy_no_longer_unwraps() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let before = drops();
        let ptr = boxed(9);

        let proxy = Value::Object(wrap_owned(&mut isolate, identity, ptr));
        TypeDescriptor::destroy_object(&mut isolate, identity, ptr).unwrap();

        assert_eq!(drops(), before + 1);
        assert_eq!(TypeDescriptor::find_object(&isolate, identity, ptr), None);
        let found = TypeDescriptor::unwrap_object(&isolate, identity, &proxy);
        assert_eq!(found, None);
        let err = TypeDescriptor::destroy_object(&mut isolate, identity, ptr).unwrap_err();
        assert!(matches!(err, RegistrationError::ObjectNotFound { .. }));
    }

    #[test]
    fn collected_proxy_frees_owned_object() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let before = drops();

        let ptr = isolate.scope(|isolate| {
            let ptr = boxed(4);
            wrap_owned(isolate, identity, ptr);
            ptr
        });
        let stats = isolate.collect_garbage();

        assert_eq!(stats.finalized, 1);
        assert_eq!(drops(), before + 1);
        assert_eq!(TypeDescriptor::find_object(&isolate, identity, ptr), None);
    }

    #[test]
    fn external_proxy_is_pinned() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let mut counter = Counter { value: 8 };
        let ptr: RawPtr = (&raw mut counter).cast();

        let proxy = isolate.scope(|isolate| wrap_external(isolate, identity, &mut counter));
        isolate.collect_garbage();

        assert!(isolate.is_alive(proxy));
        let found = TypeDescriptor::find_object(&isolate, identity, ptr);
        assert_eq!(found, Some(proxy));
        assert_eq!(TypeDescriptor::destroy_objects(&mut isolate, identity), 1);
        assert_eq!(counter.value, 8);
    }

    #[test]
    fn destroy_objects_without_directory_is_empty() {
        let mut isolate = Isolate::new();
        let identity = TypeIdentity::of::<Counter>();
        assert_eq!(TypeDescriptor::destroy_objects(&mut isolate, identity), 0);
        assert!(DescriptorDirectory::existing(&isolate).is_none());
    }

    #[test]
    fn construction_without_constructor_throws() {
        let mut isolate = Isolate::new();
        let identity = DescriptorDirectory::instance::<Sealed>(&mut isolate).unwrap();
        let directory = DescriptorDirectory::of(&mut isolate).unwrap();
        let template = directory
            .borrow()
            .require(identity)
            .unwrap()
            .script_template();
        let function = Value::Object(isolate.get_function(template));

        let err = isolate.construct(&function, &[]).unwrap_err();
        assert_eq!(err, Exception::new("Sealed: create is not allowed"));
    }

    #[test]
    fn constructor_trampoline_wraps_result() {
        let mut isolate = Isolate::new();
        let identity = counter_identity(&mut isolate);
        let directory = DescriptorDirectory::of(&mut isolate).unwrap();
        let first: Constructor = Rc::new(construct_one);
        let second: Constructor = Rc::new(construct_from_arg);
        let template = {
            let mut directory = directory.borrow_mut();
            let descriptor = directory.require_mut(identity).unwrap();
            let previous = unsafe {
                descriptor.set_constructor(first);
                descriptor.set_constructor(second)
            };
            assert!(previous.is_some());
            descriptor.script_template()
        };
        let function = Value::Object(isolate.get_function(template));

        let object = isolate.construct(&function, &[Value::Int(12)]).unwrap();
        let ptr = TypeDescriptor::unwrap_object(&isolate, identity, &object).unwrap();
        assert_eq!(unsafe { (*ptr.cast::<Counter>()).value }, 12);
        TypeDescriptor::destroy_object(&mut isolate, identity, ptr).unwrap();
    }
}
