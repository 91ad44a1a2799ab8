//! The per-isolate descriptor directory.
//!
//! The directory is created the first time a type is registered with an
//! isolate and stored in the isolate data slot named by
//! [`IsolateConfig::directory_slot`](scriptwrap_core::IsolateConfig). It is
//! torn down with the isolate: every object still registered is unregistered
//! and owned objects are freed.
//!
//! Descriptors are indexed by [`TypeIdentity`]. Identities are process-wide,
//! so the directory is sparse when an isolate registers only some types.

use std::cell::RefCell;
use std::rc::Rc;

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use scriptwrap_core::{Isolate, RegistrationError};
use tracing::{debug, warn};

use crate::cast_table::{CastFn, CastTable, Hierarchy};
use crate::descriptor::{TypeDescriptor, release};
use crate::inherits::{Inherits, NativeClass, destroy_boxed, upcast_erased};
use crate::object_registry::ObjectRegistry;
use crate::type_identity::TypeIdentity;

/// Type descriptors of one isolate.
#[derive(Debug, Default)]
pub struct DescriptorDirectory {
    descriptors: Vec<Option<TypeDescriptor>>,
    /// Edges point from derived to base.
    inheritance: DiGraphMap<u32, ()>,
}

impl DescriptorDirectory {
    /// The isolate's directory, created on first use.
    ///
    /// Fails with [`RegistrationError::DirectoryUnavailable`] when the
    /// configured data slot already holds other embedder data; that data is
    /// left in place.
    pub fn of(isolate: &mut Isolate) -> Result<Rc<RefCell<Self>>, RegistrationError> {
        if let Some(directory) = Self::existing(isolate) {
            return Ok(directory);
        }

        let slot = isolate.config().directory_slot;
        if isolate.data(slot).is_some() {
            warn!(slot, "directory slot holds foreign isolate data");
            return Err(RegistrationError::DirectoryUnavailable { slot });
        }
        let directory = Rc::new(RefCell::new(Self::default()));
        if let Err(err) = isolate.set_data(slot, directory.clone()) {
            warn!(error = %err, "descriptor directory could not be stored");
            return Err(RegistrationError::DirectoryUnavailable { slot });
        }
        isolate.on_dispose(Self::teardown);
        debug!(slot, "descriptor directory created");
        Ok(directory)
    }

    /// The isolate's directory, if any type was registered.
    pub fn existing(isolate: &Isolate) -> Option<Rc<RefCell<Self>>> {
        isolate
            .data(isolate.config().directory_slot)?
            .downcast::<RefCell<Self>>()
            .ok()
    }

    /// The identity of `T`, creating its descriptor in this isolate if
    /// needed.
    ///
    /// Zero-sized types are rejected with
    /// [`RegistrationError::ZeroSizedClass`]: every boxed instance of one has
    /// the same address, so only one of them could ever be registered.
    pub fn instance<T: NativeClass>(
        isolate: &mut Isolate,
    ) -> Result<TypeIdentity, RegistrationError> {
        if size_of::<T>() == 0 {
            return Err(RegistrationError::ZeroSizedClass {
                class: T::NAME.to_string(),
            });
        }

        let identity = TypeIdentity::of::<T>();
        let directory = Self::of(isolate)?;
        if directory.borrow().descriptor(identity).is_some() {
            return Ok(identity);
        }

        let descriptor = TypeDescriptor::new(isolate, identity, T::NAME, destroy_boxed::<T>);
        let mut directory = directory.borrow_mut();
        if directory.descriptors.len() <= identity.index() {
            directory
                .descriptors
                .resize_with(identity.index() + 1, || None);
        }
        directory.descriptors[identity.index()] = Some(descriptor);
        directory.inheritance.add_node(identity.as_u32());
        debug!(
            class = T::NAME,
            identity = identity.as_u32(),
            "type descriptor created"
        );
        Ok(identity)
    }

    /// Declare `B` a direct base of `T`.
    ///
    /// Links both cast tables. The first base declared also chains `T`'s
    /// constructor template to `B`'s proxies, so `B`'s members are visible
    /// on `T`'s proxies; later bases only take part in casts.
    pub fn inherit<T, B>(isolate: &mut Isolate) -> Result<(), RegistrationError>
    where
        T: Inherits<B>,
        B: NativeClass,
    {
        let derived = Self::instance::<T>(isolate)?;
        let base = Self::instance::<B>(isolate)?;
        let directory = Self::of(isolate)?;
        let (script_template, base_template) = {
            let mut directory = directory.borrow_mut();
            directory.link(derived, base, upcast_erased::<T, B>)?;
            (
                directory.require(derived)?.script_template(),
                directory.require(base)?.native_template(),
            )
        };
        if isolate.template_parent(script_template).is_none() {
            isolate.inherit(script_template, base_template);
        }
        debug!(derived = T::NAME, base = B::NAME, "class inherit");
        Ok(())
    }

    fn link(
        &mut self,
        derived: TypeIdentity,
        base: TypeIdentity,
        adjust: CastFn,
    ) -> Result<(), RegistrationError> {
        let derived_class = self.require(derived)?.class_name();
        let base_class = self.require(base)?.class_name();

        if derived == base
            || has_path_connecting(&self.inheritance, base.as_u32(), derived.as_u32(), None)
        {
            return Err(RegistrationError::InheritanceCycle {
                derived: derived_class.to_string(),
                base: base_class.to_string(),
            });
        }

        self.require_mut(derived)?
            .cast_table_mut()
            .add_base(base, base_class, adjust)?;
        self.require_mut(base)?
            .cast_table_mut()
            .add_derivative(derived);
        self.inheritance
            .add_edge(derived.as_u32(), base.as_u32(), ());
        Ok(())
    }

    /// The descriptor of a type registered with this isolate.
    pub fn descriptor(&self, identity: TypeIdentity) -> Option<&TypeDescriptor> {
        self.descriptors.get(identity.index())?.as_ref()
    }

    /// Mutable access to the descriptor of a registered type.
    pub fn descriptor_mut(&mut self, identity: TypeIdentity) -> Option<&mut TypeDescriptor> {
        self.descriptors.get_mut(identity.index())?.as_mut()
    }

    /// Like [`descriptor`](Self::descriptor), failing with
    /// [`RegistrationError::UnregisteredType`].
    pub fn require(&self, identity: TypeIdentity) -> Result<&TypeDescriptor, RegistrationError> {
        self.descriptor(identity)
            .ok_or(RegistrationError::UnregisteredType {
                identity: identity.as_u32(),
            })
    }

    /// Like [`descriptor_mut`](Self::descriptor_mut), failing with
    /// [`RegistrationError::UnregisteredType`].
    pub fn require_mut(
        &mut self,
        identity: TypeIdentity,
    ) -> Result<&mut TypeDescriptor, RegistrationError> {
        self.descriptor_mut(identity)
            .ok_or(RegistrationError::UnregisteredType {
                identity: identity.as_u32(),
            })
    }

    /// Number of types registered with this isolate.
    pub fn len(&self) -> usize {
        self.descriptors.iter().flatten().count()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered descriptors, in identity order.
    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.iter().flatten()
    }

    fn teardown(isolate: &mut Isolate) {
        let Some(directory) = Self::existing(isolate) else {
            return;
        };
        let drained: Vec<_> = directory
            .borrow_mut()
            .descriptors
            .iter_mut()
            .flatten()
            .flat_map(TypeDescriptor::drain_objects)
            .collect();

        let count = drained.len();
        for (ptr, entry, destroy) in drained {
            release(isolate, ptr, entry, destroy);
        }
        debug!(objects = count, "descriptor directory torn down");
    }
}

impl Hierarchy for DescriptorDirectory {
    fn cast_table(&self, identity: TypeIdentity) -> Option<&CastTable> {
        self.descriptor(identity).map(TypeDescriptor::cast_table)
    }

    fn object_registry(&self, identity: TypeIdentity) -> Option<&ObjectRegistry> {
        self.descriptor(identity).map(TypeDescriptor::objects)
    }
}
