//! Conversion traits for argument extraction and return value handling.
//!
//! - [`FromScript`]: Extract a Rust value from a script [`Value`]
//! - [`ToScript`]: Convert a Rust value into a script [`Value`]
//!
//! ## Supported Primitive Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`, `usize`
//! - Floats: `f32`, `f64` (integers are accepted where a float is expected)
//! - Boolean: `bool`
//! - Strings: `String` (and `&str` for return values)
//! - Unit: `()` (void)
//! - `Option<T>`: `null`/`undefined` map to `None`
//!
//! Wrapped native objects are converted by the registry layer, which
//! implements these traits for its object reference types.

use crate::error::ConversionError;
use crate::heap::ObjectHandle;
use crate::isolate::Isolate;
use crate::value::Value;

/// Convert from a script value to a Rust type (for extracting arguments).
pub trait FromScript: Sized {
    /// Convert from a script value to this Rust type.
    fn from_script(isolate: &Isolate, value: &Value) -> Result<Self, ConversionError>;
}

/// Convert from a Rust type to a script value (for setting return values).
pub trait ToScript {
    /// Convert this Rust value to a script value.
    fn to_script(self, isolate: &mut Isolate) -> Result<Value, ConversionError>;
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_script_int {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromScript for $ty {
                fn from_script(_isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: $name,
                            }
                        }),
                        _ => Err(ConversionError::TypeMismatch {
                            expected: $name,
                            actual: value.type_name(),
                        }),
                    }
                }
            }

            impl ToScript for $ty {
                fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
                    i64::try_from(self)
                        .map(Value::Int)
                        .map_err(|_| ConversionError::Failed {
                            message: format!("{} does not fit in int64", self),
                        })
                }
            }
        )*
    };
}

impl_script_int!(
    i8 => "int8",
    i16 => "int16",
    i32 => "int",
    i64 => "int64",
    u8 => "uint8",
    u16 => "uint16",
    u32 => "uint",
    u64 => "uint64",
    usize => "uint64",
);

// ============================================================================
// Float implementations
// ============================================================================

impl FromScript for f64 {
    fn from_script(_isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            _ => Err(ConversionError::TypeMismatch {
                expected: "double",
                actual: value.type_name(),
            }),
        }
    }
}

impl FromScript for f32 {
    fn from_script(isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        f64::from_script(isolate, value)
            .map(|v| v as f32)
            .map_err(|_| ConversionError::TypeMismatch {
                expected: "float",
                actual: value.type_name(),
            })
    }
}

impl ToScript for f64 {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(Value::Float(self))
    }
}

impl ToScript for f32 {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(Value::Float(self as f64))
    }
}

// ============================================================================
// Other primitives
// ============================================================================

impl FromScript for () {
    fn from_script(_isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Undefined => Ok(()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "void",
                actual: value.type_name(),
            }),
        }
    }
}

impl ToScript for () {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(Value::Undefined)
    }
}

impl FromScript for bool {
    fn from_script(_isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(v) => Ok(*v),
            _ => Err(ConversionError::TypeMismatch {
                expected: "bool",
                actual: value.type_name(),
            }),
        }
    }
}

impl ToScript for bool {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(Value::Bool(self))
    }
}

impl FromScript for String {
    fn from_script(_isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "string",
                actual: value.type_name(),
            }),
        }
    }
}

impl ToScript for String {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(Value::String(self))
    }
}

impl ToScript for &str {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(Value::String(self.to_string()))
    }
}

// ============================================================================
// Values, handles and options
// ============================================================================

impl FromScript for Value {
    fn from_script(_isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl ToScript for Value {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(self)
    }
}

impl FromScript for ObjectHandle {
    fn from_script(_isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        value.as_object().ok_or(ConversionError::TypeMismatch {
            expected: "object",
            actual: value.type_name(),
        })
    }
}

impl ToScript for ObjectHandle {
    fn to_script(self, _isolate: &mut Isolate) -> Result<Value, ConversionError> {
        Ok(Value::Object(self))
    }
}

impl<T: FromScript> FromScript for Option<T> {
    fn from_script(isolate: &Isolate, value: &Value) -> Result<Self, ConversionError> {
        if value.is_nullish() {
            Ok(None)
        } else {
            T::from_script(isolate, value).map(Some)
        }
    }
}

impl<T: ToScript> ToScript for Option<T> {
    fn to_script(self, isolate: &mut Isolate) -> Result<Value, ConversionError> {
        match self {
            Some(value) => value.to_script(isolate),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_narrowing_is_checked() {
        let isolate = Isolate::new();
        assert_eq!(i32::from_script(&isolate, &Value::Int(42)), Ok(42));
        assert!(matches!(
            i8::from_script(&isolate, &Value::Int(300)),
            Err(ConversionError::IntegerOverflow { value: 300, .. })
        ));
        assert!(matches!(
            u32::from_script(&isolate, &Value::Int(-1)),
            Err(ConversionError::IntegerOverflow { .. })
        ));
    }

    #[test]
    fn float_accepts_int() {
        let isolate = Isolate::new();
        assert_eq!(f64::from_script(&isolate, &Value::Int(2)), Ok(2.0));
        assert!(f64::from_script(&isolate, &Value::Bool(true)).is_err());
    }

    #[test]
    fn string_type_mismatch() {
        let isolate = Isolate::new();
        let err = String::from_script(&isolate, &Value::Int(1)).unwrap_err();
        assert_eq!(
            err,
            ConversionError::TypeMismatch {
                expected: "string",
                actual: "int",
            }
        );
    }

    #[test]
    fn option_maps_nullish() {
        let mut isolate = Isolate::new();
        assert_eq!(Option::<i32>::from_script(&isolate, &Value::Null), Ok(None));
        let seven = Option::<i32>::from_script(&isolate, &Value::Int(7));
        assert_eq!(seven, Ok(Some(7)));
        assert_eq!(None::<i32>.to_script(&mut isolate), Ok(Value::Null));
    }

    #[test]
    fn u64_out_of_range_fails() {
        let mut isolate = Isolate::new();
        assert!(u64::MAX.to_script(&mut isolate).is_err());
        assert_eq!(7u64.to_script(&mut isolate), Ok(Value::Int(7)));
    }
}
