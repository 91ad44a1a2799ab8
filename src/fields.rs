//! Field accessors for data member bindings.

use std::fmt;

/// Borrowing accessors for a field of type `V` inside `T`.
///
/// Usually built with the [`field!`](crate::field) macro.
pub struct Field<T, V> {
    get: fn(&T) -> &V,
    get_mut: fn(&mut T) -> &mut V,
}

impl<T, V> Field<T, V> {
    /// Build a field from its shared and exclusive accessors.
    pub const fn new(get: fn(&T) -> &V, get_mut: fn(&mut T) -> &mut V) -> Self {
        Self { get, get_mut }
    }

    /// Borrow the field.
    pub fn get<'a>(&self, object: &'a T) -> &'a V {
        (self.get)(object)
    }

    /// Borrow the field mutably.
    pub fn get_mut<'a>(&self, object: &'a mut T) -> &'a mut V {
        (self.get_mut)(object)
    }
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

impl<T, V> fmt::Debug for Field<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").finish_non_exhaustive()
    }
}

/// Build a [`Field`] for a named field of a struct.
///
/// ```ignore
/// builder.member("name", field!(Animal, name))
/// ```
#[macro_export]
macro_rules! field {
    ($ty:ty, $name:ident) => {
        $crate::Field::<$ty, _>::new(|object| &object.$name, |object| &mut object.$name)
    };
}

#[cfg(test)]
mod tests {
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn field_reads_and_writes() {
        let x = field!(Point, x);
        let mut point = Point { x: 1, y: 2 };

        *x.get_mut(&mut point) = 10;
        assert_eq!(*x.get(&point), 10);
        assert_eq!(point.y, 2);
    }
}
