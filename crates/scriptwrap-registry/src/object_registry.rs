//! Per-type registries of wrapped objects.
//!
//! An object is registered with the registry of the exact type it was
//! wrapped as. Lookups through a base type fall back to the registries of
//! the types deriving from it, which finds the proxy when the base
//! sub-object shares the derived object's address.

use rustc_hash::FxHashMap;
use scriptwrap_core::{Persistent, RawPtr, RegistrationError};

use crate::cast_table::Hierarchy;
use crate::type_identity::TypeIdentity;

/// Who frees the native object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Freed by the registry, when the proxy is collected or destroyed.
    Owned,
    /// Freed by the embedder; the registry only forgets the address.
    External,
}

/// A registered native object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Handle to the proxy.
    pub handle: Persistent,
    /// Who frees the native object.
    pub ownership: Ownership,
}

/// Native addresses of one type mapped to their proxies.
#[derive(Debug)]
pub struct ObjectRegistry {
    class: &'static str,
    objects: FxHashMap<RawPtr, ObjectEntry>,
}

impl ObjectRegistry {
    /// An empty registry for the named class.
    pub fn new(class: &'static str) -> Self {
        Self {
            class,
            objects: FxHashMap::default(),
        }
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no object is registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether the address is registered here.
    pub fn contains(&self, address: RawPtr) -> bool {
        self.objects.contains_key(&address)
    }

    /// The entry for an address registered here.
    pub fn get(&self, address: RawPtr) -> Option<&ObjectEntry> {
        self.objects.get(&address)
    }

    /// Register an object.
    pub fn add(&mut self, address: RawPtr, entry: ObjectEntry) -> Result<(), RegistrationError> {
        if self.objects.contains_key(&address) {
            return Err(RegistrationError::DuplicateObject {
                class: self.class.to_string(),
                address: address as usize,
            });
        }
        self.objects.insert(address, entry);
        Ok(())
    }

    /// Unregister an object, handing its entry back to the caller.
    ///
    /// The caller releases the handle and frees owned objects.
    pub fn remove(&mut self, address: RawPtr) -> Result<ObjectEntry, RegistrationError> {
        self.objects
            .remove(&address)
            .ok_or_else(|| RegistrationError::ObjectNotFound {
                class: self.class.to_string(),
                address: address as usize,
            })
    }

    /// Unregister every object.
    pub fn remove_all(&mut self) -> Vec<(RawPtr, ObjectEntry)> {
        self.objects.drain().collect()
    }

    /// Find the proxy handle for an address.
    ///
    /// Looks in this registry first, then depth-first through the registries
    /// of `derivatives` and their own derivatives.
    pub fn find<H>(
        &self,
        address: RawPtr,
        derivatives: &[TypeIdentity],
        hierarchy: &H,
    ) -> Option<Persistent>
    where
        H: Hierarchy + ?Sized,
    {
        if let Some(entry) = self.objects.get(&address) {
            return Some(entry.handle);
        }
        derivatives.iter().find_map(|&derived| {
            let registry = hierarchy.object_registry(derived)?;
            let table = hierarchy.cast_table(derived)?;
            registry.find(address, table.derivatives(), hierarchy)
        })
    }
}

#[cfg(test)]
mod tests {
    use scriptwrap_core::Isolate;

    use super::*;
    use crate::cast_table::{CastFn, CastTable};

    struct Types {
        tables: Vec<CastTable>,
        registries: Vec<ObjectRegistry>,
    }

    impl Hierarchy for Types {
        fn cast_table(&self, identity: TypeIdentity) -> Option<&CastTable> {
            self.tables.get(identity.index())
        }

        fn object_registry(&self, identity: TypeIdentity) -> Option<&ObjectRegistry> {
            self.registries.get(identity.index())
        }
    }

    fn same_address(ptr: RawPtr) -> RawPtr {
        ptr
    }

    fn identity(index: u32) -> TypeIdentity {
        TypeIdentity::from_raw(index)
    }

    /// A <- B <- C
    fn chain() -> Types {
        let names = ["A", "B", "C"];
        let mut tables: Vec<_> = (0..)
            .zip(names)
            .map(|(index, name)| CastTable::new(identity(index), name))
            .collect();
        let adjust: CastFn = same_address;
        for derived in 1..3u32 {
            let base = derived - 1;
            tables[derived as usize]
                .add_base(identity(base), names[base as usize], adjust)
                .unwrap();
            tables[base as usize].add_derivative(identity(derived));
        }
        Types {
            tables,
            registries: names.into_iter().map(ObjectRegistry::new).collect(),
        }
    }

    fn entry(isolate: &mut Isolate) -> ObjectEntry {
        let object = isolate.new_object();
        ObjectEntry {
            handle: isolate.persistent(object),
            ownership: Ownership::External,
        }
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let mut isolate = Isolate::new();
        let mut registry = ObjectRegistry::new("A");
        let address = 0x10 as RawPtr;

        registry.add(address, entry(&mut isolate)).unwrap();
        let err = registry.add(address, entry(&mut isolate)).unwrap_err();
        let expected = RegistrationError::DuplicateObject {
            class: "A".to_string(),
            address: 0x10,
        };
        assert_eq!(err, expected);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_removal_is_rejected() {
        let mut isolate = Isolate::new();
        let mut registry = ObjectRegistry::new("A");
        let address = 0x20 as RawPtr;
        let added = entry(&mut isolate);

        registry.add(address, added).unwrap();
        assert_eq!(registry.remove(address), Ok(added));
        let missing = RegistrationError::ObjectNotFound {
            class: "A".to_string(),
            address: 0x20,
        };
        assert_eq!(registry.remove(address), Err(missing));
    }

    #[test]
    fn remove_all_drains() {
        let mut isolate = Isolate::new();
        let mut registry = ObjectRegistry::new("A");
        registry.add(0x1 as RawPtr, entry(&mut isolate)).unwrap();
        registry.add(0x2 as RawPtr, entry(&mut isolate)).unwrap();

        assert_eq!(registry.remove_all().len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn find_searches_derivatives() {
        let mut isolate = Isolate::new();
        let mut types = chain();
        let address = 0x30 as RawPtr;
        let added = entry(&mut isolate);
        types.registries[2].add(address, added).unwrap();

        let derivatives = types.tables[2].derivatives();
        let from_c = types.registries[2].find(address, derivatives, &types);
        let derivatives = types.tables[0].derivatives();
        let from_a = types.registries[0].find(address, derivatives, &types);
        assert_eq!(from_c, Some(added.handle));
        assert_eq!(from_a, from_c);
    }

    #[test]
    fn find_does_not_search_bases() {
        let mut isolate = Isolate::new();
        let mut types = chain();
        let address = 0x40 as RawPtr;
        let added = entry(&mut isolate);
        types.registries[0].add(address, added).unwrap();

        let derivatives = types.tables[2].derivatives();
        let found = types.registries[2].find(address, derivatives, &types);
        assert_eq!(found, None);
    }
}
