//! Per-type cast tables.
//!
//! A cast table records the direct bases of a native type together with the
//! function adjusting a derived address to the base sub-object, and the types
//! deriving directly from it. Casting replays the stored adjustments hop by
//! hop, so base sub-objects at any offset are reached correctly.

use scriptwrap_core::{RawPtr, RegistrationError};

use crate::object_registry::ObjectRegistry;
use crate::type_identity::TypeIdentity;

/// Adjusts a derived address to one of its direct bases.
pub type CastFn = fn(RawPtr) -> RawPtr;

/// Resolves the per-type tables of other types while walking a hierarchy.
pub trait Hierarchy {
    /// The cast table of a type, if it is registered.
    fn cast_table(&self, identity: TypeIdentity) -> Option<&CastTable>;

    /// The object registry of a type, if it is registered.
    fn object_registry(&self, identity: TypeIdentity) -> Option<&ObjectRegistry>;
}

/// A direct base of a type.
#[derive(Clone, Copy, Debug)]
pub struct BaseLink {
    /// The base type.
    pub target: TypeIdentity,
    /// Derived-to-base address adjustment.
    pub adjust: CastFn,
}

/// Direct bases and derivatives of one type.
#[derive(Debug)]
pub struct CastTable {
    identity: TypeIdentity,
    class: &'static str,
    bases: Vec<BaseLink>,
    derivatives: Vec<TypeIdentity>,
}

impl CastTable {
    /// An empty table for a type.
    pub fn new(identity: TypeIdentity, class: &'static str) -> Self {
        Self {
            identity,
            class,
            bases: Vec::new(),
            derivatives: Vec::new(),
        }
    }

    /// The type this table belongs to.
    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// Direct bases in registration order.
    pub fn bases(&self) -> &[BaseLink] {
        &self.bases
    }

    /// Types deriving directly from this one.
    pub fn derivatives(&self) -> &[TypeIdentity] {
        &self.derivatives
    }

    /// Whether `target` is a direct base.
    pub fn has_base(&self, target: TypeIdentity) -> bool {
        self.bases.iter().any(|base| base.target == target)
    }

    /// Register a direct base.
    ///
    /// The base table must record the reverse link with
    /// [`add_derivative`](Self::add_derivative).
    pub fn add_base(
        &mut self,
        target: TypeIdentity,
        target_class: &str,
        adjust: CastFn,
    ) -> Result<(), RegistrationError> {
        if self.has_base(target) {
            return Err(RegistrationError::DuplicateBase {
                derived: self.class.to_string(),
                base: target_class.to_string(),
            });
        }
        self.bases.push(BaseLink { target, adjust });
        Ok(())
    }

    /// Record a type deriving directly from this one.
    pub fn add_derivative(&mut self, derived: TypeIdentity) {
        if !self.derivatives.contains(&derived) {
            self.derivatives.push(derived);
        }
    }

    /// Adjust `ptr`, the address of an object of this type, to the
    /// `requested` type.
    ///
    /// Direct bases are tried first, in registration order; then the whole
    /// hierarchy is walked depth-first. Returns `None` when `requested` is
    /// not this type or one of its bases.
    pub fn cast<H>(&self, ptr: RawPtr, requested: TypeIdentity, hierarchy: &H) -> Option<RawPtr>
    where
        H: Hierarchy + ?Sized,
    {
        if requested == self.identity {
            return Some(ptr);
        }

        if let Some(base) = self.bases.iter().find(|base| base.target == requested) {
            return Some((base.adjust)(ptr));
        }

        self.bases.iter().find_map(|base| {
            hierarchy
                .cast_table(base.target)?
                .cast((base.adjust)(ptr), requested, hierarchy)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tables(Vec<CastTable>);

    impl Hierarchy for Tables {
        fn cast_table(&self, identity: TypeIdentity) -> Option<&CastTable> {
            self.0.get(identity.index())
        }

        fn object_registry(&self, _identity: TypeIdentity) -> Option<&ObjectRegistry> {
            None
        }
    }

    fn offset_4(ptr: RawPtr) -> RawPtr {
        ptr.cast::<u8>().wrapping_add(4).cast()
    }

    fn offset_8(ptr: RawPtr) -> RawPtr {
        ptr.cast::<u8>().wrapping_add(8).cast()
    }

    fn identity(raw: u32) -> TypeIdentity {
        TypeIdentity::from_raw(raw)
    }

    /// 0 <- 1 <- 2, and 3 as the second base of 2.
    fn hierarchy() -> Tables {
        let mut tables: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .enumerate()
            .map(|(index, name)| CastTable::new(identity(index as u32), name))
            .collect();
        tables[1].add_base(identity(0), "A", offset_4).unwrap();
        tables[0].add_derivative(identity(1));
        tables[2].add_base(identity(1), "B", offset_4).unwrap();
        tables[1].add_derivative(identity(2));
        tables[2].add_base(identity(3), "D", offset_8).unwrap();
        tables[3].add_derivative(identity(2));
        Tables(tables)
    }

    #[test]
    fn cast_to_self_is_identity() {
        let tables = hierarchy();
        let ptr = 0x1000 as RawPtr;
        assert_eq!(tables.0[2].cast(ptr, identity(2), &tables), Some(ptr));
    }

    #[test]
    fn cast_to_direct_base_applies_one_adjustment() {
        let tables = hierarchy();
        let ptr = 0x1000 as RawPtr;
        let cast = tables.0[2].cast(ptr, identity(3), &tables);
        assert_eq!(cast, Some(0x1008 as RawPtr));
        let cast = tables.0[2].cast(ptr, identity(1), &tables);
        assert_eq!(cast, Some(0x1004 as RawPtr));
    }

    #[test]
    fn cast_through_hierarchy_applies_every_hop() {
        let tables = hierarchy();
        let ptr = 0x1000 as RawPtr;
        let cast = tables.0[2].cast(ptr, identity(0), &tables);
        assert_eq!(cast, Some(0x1008 as RawPtr));
    }

    #[test]
    fn cast_to_unrelated_type_fails() {
        let tables = hierarchy();
        let ptr = 0x1000 as RawPtr;
        assert_eq!(tables.0[0].cast(ptr, identity(2), &tables), None);
        assert_eq!(tables.0[3].cast(ptr, identity(0), &tables), None);
    }

    #[test]
    fn duplicate_base_is_rejected_without_changes() {
        let mut tables = hierarchy();
        let err = tables.0[1].add_base(identity(0), "A", offset_8).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateBase {
                derived: "B".to_string(),
                base: "A".to_string(),
            }
        );

        assert_eq!(tables.0[1].bases().len(), 1);
        let ptr = 0x1000 as RawPtr;
        let cast = tables.0[1].cast(ptr, identity(0), &tables);
        assert_eq!(cast, Some(0x1004 as RawPtr));
    }

    #[test]
    fn derivatives_are_recorded_once() {
        let mut tables = hierarchy();
        tables.0[0].add_derivative(identity(1));
        assert_eq!(tables.0[0].derivatives(), &[identity(1)]);
        assert_eq!(tables.0[3].derivatives(), &[identity(2)]);
    }
}
