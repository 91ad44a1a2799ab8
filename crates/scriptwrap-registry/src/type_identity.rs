//! Process-wide type identities.
//!
//! Every Rust type that is registered with any isolate gets a small integer
//! identity the first time it is asked for. The number is reused by every
//! isolate, while the descriptors it indexes are isolate-local.

use std::any::TypeId;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

lazy_static! {
    static ref IDENTITIES: Mutex<FxHashMap<TypeId, TypeIdentity>> =
        Mutex::new(FxHashMap::default());
}

/// Identity of a native type, used as an index into descriptor directories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity(pub(crate) u32);

impl TypeIdentity {
    /// The identity of `T`, assigned on first use.
    ///
    /// Identities start at zero and grow by one for each new type.
    pub fn of<T: 'static>() -> Self {
        let mut identities = IDENTITIES.lock().unwrap_or_else(PoisonError::into_inner);
        let next = TypeIdentity(identities.len() as u32);
        *identities.entry(TypeId::of::<T>()).or_insert(next)
    }

    /// Rebuild an identity from its raw value, as stored in a proxy tag.
    pub fn from_raw(raw: u32) -> Self {
        TypeIdentity(raw)
    }

    /// The raw value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// The index of this identity in a descriptor directory.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
