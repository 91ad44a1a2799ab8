//! Adapters turning Rust callables into native callbacks.
//!
//! Each trait is implemented for closures and functions of up to six
//! arguments whose parameters implement [`FromScript`] and whose result
//! implements [`ToScript`]:
//!
//! - [`IntoConstructor`]: `Fn(A1, ..) -> T`, boxed and owned by the proxy
//! - [`IntoMethod`]: `Fn(&T, A1, ..) -> R`
//! - [`IntoMethodMut`]: `Fn(&mut T, A1, ..) -> R`
//! - [`IntoFunction`]: `Fn(A1, ..) -> R`

use std::ptr::NonNull;
use std::rc::Rc;

use scriptwrap_core::{CallContext, FromScript, NativeError, NativeFn, RawPtr, ToScript};
use scriptwrap_registry::NativeClass;

use crate::objects::unwrap_object;

/// Builds a `T` from the arguments of a script `new` call.
pub type NativeConstructor<T> = Rc<dyn Fn(&mut CallContext<'_>) -> Result<T, NativeError>>;

/// A callable usable as a class constructor.
pub trait IntoConstructor<T, Args> {
    /// Build the typed constructor; the class builder boxes its result.
    fn into_constructor(self) -> NativeConstructor<T>;
}

/// A callable usable as a method taking `&T`.
pub trait IntoMethod<T, Args, Ret> {
    /// Build the native callback.
    fn into_method(self) -> NativeFn;
}

/// A callable usable as a method taking `&mut T`.
pub trait IntoMethodMut<T, Args, Ret> {
    /// Build the native callback.
    fn into_method_mut(self) -> NativeFn;
}

/// A callable usable as a free function.
pub trait IntoFunction<Args, Ret> {
    /// Build the native callback.
    fn into_function(self) -> NativeFn;
}

/// The native object `this` refers to.
pub(crate) fn this_object<T: NativeClass>(
    ctx: &CallContext<'_>,
) -> Result<NonNull<T>, NativeError> {
    match unwrap_object::<T>(ctx.isolate_ref(), ctx.this()) {
        Some(object) => Ok(object),
        None => {
            let message = format!("expected {}, got {}", T::NAME, ctx.this().type_name());
            Err(NativeError::invalid_this(message))
        }
    }
}

pub(crate) fn boxed<T>(object: T) -> RawPtr {
    Box::into_raw(Box::new(object)).cast()
}

macro_rules! impl_callables {
    ($($arg:ident : $index:tt),*) => {
        impl<T, F, $($arg,)*> IntoConstructor<T, ($($arg,)*)> for F
        where
            T: NativeClass,
            F: Fn($($arg),*) -> T + 'static,
            $($arg: FromScript,)*
        {
            fn into_constructor(self) -> NativeConstructor<T> {
                Rc::new(move |_ctx: &mut CallContext<'_>| -> Result<T, NativeError> {
                    Ok((self)($(_ctx.arg::<$arg>($index)?),*))
                })
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethod<T, ($($arg,)*), R> for F
        where
            T: NativeClass,
            F: Fn(&T, $($arg),*) -> R + 'static,
            R: ToScript,
            $($arg: FromScript,)*
        {
            fn into_method(self) -> NativeFn {
                NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    let this = this_object::<T>(ctx)?;
                    let result = (self)(unsafe { this.as_ref() }, $(ctx.arg::<$arg>($index)?),*);
                    ctx.set_return(result)
                })
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethodMut<T, ($($arg,)*), R> for F
        where
            T: NativeClass,
            F: Fn(&mut T, $($arg),*) -> R + 'static,
            R: ToScript,
            $($arg: FromScript,)*
        {
            fn into_method_mut(self) -> NativeFn {
                NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    let mut this = this_object::<T>(ctx)?;
                    let result = (self)(unsafe { this.as_mut() }, $(ctx.arg::<$arg>($index)?),*);
                    ctx.set_return(result)
                })
            }
        }

        impl<F, R, $($arg,)*> IntoFunction<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: ToScript,
            $($arg: FromScript,)*
        {
            fn into_function(self) -> NativeFn {
                NativeFn::new(move |_ctx: &mut CallContext<'_>| {
                    let result = (self)($(_ctx.arg::<$arg>($index)?),*);
                    _ctx.set_return(result)
                })
            }
        }
    };
}

impl_callables!();
impl_callables!(A1: 0);
impl_callables!(A1: 0, A2: 1);
impl_callables!(A1: 0, A2: 1, A3: 2);
impl_callables!(A1: 0, A2: 1, A3: 2, A4: 3);
impl_callables!(A1: 0, A2: 1, A3: 2, A4: 3, A5: 4);
impl_callables!(A1: 0, A2: 1, A3: 2, A4: 3, A5: 4, A6: 5);
