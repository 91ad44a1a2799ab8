//! Native function storage and call context.

use std::fmt;
use std::rc::Rc;

use crate::convert::{FromScript, ToScript};
use crate::error::NativeError;
use crate::isolate::Isolate;
use crate::value::Value;

/// Type-erased native function.
///
/// This wraps any callable that implements `NativeCallable`, allowing
/// functions of different signatures to be stored uniformly in templates
/// and function objects. Cloning shares the underlying callable.
#[derive(Clone)]
pub struct NativeFn {
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    /// Create a new NativeFn from a callable.
    pub fn new<F>(f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        Self { inner: Rc::new(f) }
    }

    /// Call this native function with the given context.
    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
///
/// The `call` method receives a `CallContext` that provides access to the
/// receiver and arguments and allows setting the return value.
pub trait NativeCallable {
    /// Call this function with the given context.
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError>;
}

// Implement NativeCallable for closures that take CallContext
impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        (self)(ctx)
    }
}

static UNDEFINED: Value = Value::Undefined;

/// Context for native function calls.
///
/// This bridges the isolate and Rust, providing access to `this`, the
/// arguments and the isolate itself, and collecting the return value.
///
/// ```ignore
/// let x: i32 = ctx.arg(0)?;
/// let name: String = ctx.arg(1)?;
/// ctx.set_return(x * 2)?;
/// ```
pub struct CallContext<'a> {
    isolate: &'a mut Isolate,
    this: Value,
    args: &'a [Value],
    return_value: Value,
    construct_call: bool,
}

impl<'a> CallContext<'a> {
    /// Create a new call context.
    pub fn new(
        isolate: &'a mut Isolate,
        this: Value,
        args: &'a [Value],
        construct_call: bool,
    ) -> Self {
        Self {
            isolate,
            this,
            args,
            return_value: Value::Undefined,
            construct_call,
        }
    }

    /// The isolate the call runs in.
    pub fn isolate(&mut self) -> &mut Isolate {
        &mut *self.isolate
    }

    /// Shared access to the isolate the call runs in.
    pub fn isolate_ref(&self) -> &Isolate {
        &*self.isolate
    }

    /// The receiver of the call.
    pub fn this(&self) -> &Value {
        &self.this
    }

    /// Whether the function was invoked with `new`.
    pub fn is_construct_call(&self) -> bool {
        self.construct_call
    }

    /// Get the number of arguments passed by the caller.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Get a raw argument; missing arguments read as `undefined`.
    pub fn arg_value(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&UNDEFINED)
    }

    /// Get a typed argument value.
    ///
    /// This uses the `FromScript` trait to convert the argument to the
    /// requested type.
    pub fn arg<T: FromScript>(&self, index: usize) -> Result<T, NativeError> {
        T::from_script(&*self.isolate, self.arg_value(index)).map_err(NativeError::Conversion)
    }

    /// Set the return value from a raw value.
    pub fn set_return_value(&mut self, value: Value) {
        self.return_value = value;
    }

    /// Set a typed return value.
    pub fn set_return<T: ToScript>(&mut self, value: T) -> Result<(), NativeError> {
        self.return_value = value.to_script(&mut *self.isolate)?;
        Ok(())
    }

    /// Consume the context, yielding the return value.
    pub fn into_return_value(self) -> Value {
        self.return_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_is_native_callable() {
        let double = NativeFn::new(|ctx: &mut CallContext<'_>| {
            let x: i32 = ctx.arg(0)?;
            ctx.set_return(x * 2)
        });

        let mut isolate = Isolate::new();
        let args = [Value::Int(21)];
        let mut ctx = CallContext::new(&mut isolate, Value::Undefined, &args, false);
        double.call(&mut ctx).unwrap();
        assert_eq!(ctx.into_return_value(), Value::Int(42));
    }

    #[test]
    fn missing_argument_reads_undefined() {
        let mut isolate = Isolate::new();
        let ctx = CallContext::new(&mut isolate, Value::Null, &[], false);
        assert_eq!(ctx.arg_count(), 0);
        assert!(ctx.arg_value(3).is_undefined());
        assert!(ctx.arg::<i32>(0).is_err());
        assert!(!ctx.is_construct_call());
    }
}
