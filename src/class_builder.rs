//! Builder for exposing a native class to script.
//!
//! # Example
//!
//! ```ignore
//! ClassBuilder::<Dog>::new(&mut isolate)?
//!     .constructor(|name: String| Dog::new(name))
//!     .inherit::<Animal>()?
//!     .method("bark", |dog: &Dog| format!("{} says woof", dog.animal.name))
//!     .member("breed", field!(Dog, breed))
//!     .constant("LEGS", 4)?;
//! ```

use std::marker::PhantomData;
use std::rc::Rc;

use scriptwrap_core::{
    CallContext, FromScript, Isolate, NativeCallable, NativeError, NativeFn, ObjectHandle,
    RegistrationError, ToScript,
};
use scriptwrap_registry::{Constructor, DescriptorDirectory, Inherits, NativeClass, TypeIdentity};
use tracing::debug;

use crate::binding::{Binding, ClassTemplates};
use crate::callable::{
    IntoConstructor, IntoFunction, IntoMethod, IntoMethodMut, NativeConstructor, boxed, this_object,
};
use crate::fields::Field;

/// Declares the script-visible surface of the native class `T`.
///
/// Instance members (methods, data members, properties) go on the prototype
/// of `T`'s proxies; class members (functions, constants) go on the
/// constructor function. Every method consumes the builder and returns it,
/// so declarations chain.
pub struct ClassBuilder<'i, T: NativeClass> {
    isolate: &'i mut Isolate,
    identity: TypeIdentity,
    templates: ClassTemplates,
    _marker: PhantomData<fn() -> T>,
}

impl<'i, T: NativeClass> ClassBuilder<'i, T> {
    /// Start declaring `T`, registering it with the isolate if needed.
    ///
    /// Declaring the same class again adds to the existing declaration.
    /// Zero-sized classes are rejected with
    /// [`RegistrationError::ZeroSizedClass`].
    pub fn new(isolate: &'i mut Isolate) -> Result<Self, RegistrationError> {
        let identity = DescriptorDirectory::instance::<T>(isolate)?;
        let templates = {
            let directory = DescriptorDirectory::of(isolate)?;
            let directory = directory.borrow();
            let descriptor = directory.require(identity)?;
            ClassTemplates {
                native: descriptor.native_template(),
                script: descriptor.script_template(),
            }
        };
        debug!(
            class = T::NAME,
            identity = identity.as_u32(),
            "class declared"
        );
        Ok(Self {
            isolate,
            identity,
            templates,
            _marker: PhantomData,
        })
    }

    /// The isolate the class is declared in.
    pub fn isolate(&mut self) -> &mut Isolate {
        self.isolate
    }

    /// The type identity of `T`.
    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// The constructor function script code instantiates `T` with.
    pub fn js_function(&mut self) -> ObjectHandle {
        self.isolate.get_function(self.templates.script)
    }

    // ========================================================================
    // Construction and inheritance
    // ========================================================================

    /// Allow script code to construct `T` with `new`.
    ///
    /// The object is owned by its proxy and dropped when the proxy is
    /// collected.
    pub fn constructor<Args, F>(self, f: F) -> Self
    where
        F: IntoConstructor<T, Args>,
    {
        self.set_constructor(f.into_constructor())
    }

    /// Like [`constructor`](Self::constructor), for constructors that read
    /// the call context themselves or can fail.
    pub fn constructor_raw<F>(self, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<T, NativeError> + 'static,
    {
        self.set_constructor(Rc::new(f))
    }

    fn set_constructor(self, make: NativeConstructor<T>) -> Self {
        let construct = move |ctx: &mut CallContext<'_>| make(ctx).map(boxed);
        let constructor: Constructor = Rc::new(construct);
        if let Some(directory) = DescriptorDirectory::existing(self.isolate) {
            let mut directory = directory.borrow_mut();
            if let Some(descriptor) = directory.descriptor_mut(self.identity) {
                // SAFETY: `boxed` returns a `Box<T>` and the descriptor is `T`'s.
                unsafe { descriptor.set_constructor(constructor) };
            }
        }
        self
    }

    /// Declare `B` a base class of `T`.
    ///
    /// `B`'s members become visible on `T`'s proxies, and `T`'s objects
    /// unwrap as `B`. Only bases `T` declares through [`Inherits`] are
    /// accepted:
    ///
    /// ```compile_fail
    /// use scriptwrap::prelude::*;
    ///
    /// struct Cat(u8);
    /// struct Rock(u8);
    ///
    /// impl NativeClass for Cat {
    ///     const NAME: &'static str = "Cat";
    /// }
    ///
    /// impl NativeClass for Rock {
    ///     const NAME: &'static str = "Rock";
    /// }
    ///
    /// let mut isolate = Isolate::new();
    /// let _ = ClassBuilder::<Cat>::new(&mut isolate)
    ///     .unwrap()
    ///     .inherit::<Rock>();
    /// ```
    pub fn inherit<B>(mut self) -> Result<Self, RegistrationError>
    where
        T: Inherits<B>,
        B: NativeClass,
    {
        DescriptorDirectory::inherit::<T, B>(self.isolate)?;
        Ok(self)
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Bind a method taking `&T`.
    pub fn method<Args, Ret, F>(self, name: &str, f: F) -> Self
    where
        F: IntoMethod<T, Args, Ret>,
    {
        self.bind(name, Binding::Method(f.into_method()))
    }

    /// Bind a method taking `&mut T`.
    pub fn method_mut<Args, Ret, F>(self, name: &str, f: F) -> Self
    where
        F: IntoMethodMut<T, Args, Ret>,
    {
        self.bind(name, Binding::Method(f.into_method_mut()))
    }

    /// Bind a method working on the call context directly.
    pub fn method_raw<F>(self, name: &str, f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        self.bind(name, Binding::Method(NativeFn::new(f)))
    }

    /// Bind a function on the constructor function.
    pub fn function<Args, Ret, F>(self, name: &str, f: F) -> Self
    where
        F: IntoFunction<Args, Ret>,
    {
        self.bind(name, Binding::Function(f.into_function()))
    }

    /// Bind a function working on the call context directly.
    pub fn function_raw<F>(self, name: &str, f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        self.bind(name, Binding::Function(NativeFn::new(f)))
    }

    /// Expose a field as a read-write property.
    pub fn member<V>(self, name: &str, field: Field<T, V>) -> Self
    where
        V: ToScript + FromScript + Clone + 'static,
    {
        let binding = Binding::DataMember {
            getter: field_getter(field),
            setter: Some(field_setter(field)),
        };
        self.bind(name, binding)
    }

    /// Expose a field as a read-only property.
    pub fn member_readonly<V>(self, name: &str, field: Field<T, V>) -> Self
    where
        V: ToScript + Clone + 'static,
    {
        let binding = Binding::DataMember {
            getter: field_getter(field),
            setter: None,
        };
        self.bind(name, binding)
    }

    /// Expose a getter and setter pair as a property.
    pub fn property<G, S, R, V>(self, name: &str, getter: G, setter: S) -> Self
    where
        G: IntoMethod<T, (), R>,
        S: IntoMethodMut<T, (V,), ()>,
    {
        let binding = Binding::Accessor {
            getter: getter.into_method(),
            setter: Some(setter.into_method_mut()),
        };
        self.bind(name, binding)
    }

    /// Expose a getter as a read-only property.
    pub fn property_get<G, R>(self, name: &str, getter: G) -> Self
    where
        G: IntoMethod<T, (), R>,
    {
        let binding = Binding::Accessor {
            getter: getter.into_method(),
            setter: None,
        };
        self.bind(name, binding)
    }

    /// Bind a read-only value on the constructor function.
    pub fn constant<V: ToScript>(
        mut self,
        name: &str,
        value: V,
    ) -> Result<Self, RegistrationError> {
        let value = value
            .to_script(self.isolate)
            .map_err(|source| RegistrationError::InvalidConstant {
                name: name.to_string(),
                source,
            })?;
        Ok(self.bind(name, Binding::Constant(value)))
    }

    /// Bind anything [`Binding`] describes.
    pub fn bind(mut self, name: &str, binding: Binding) -> Self {
        binding.install(self.isolate, self.templates, name);
        self
    }
}

fn field_getter<T, V>(field: Field<T, V>) -> NativeFn
where
    T: NativeClass,
    V: ToScript + Clone + 'static,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let this = this_object::<T>(ctx)?;
        let value = field.get(unsafe { this.as_ref() }).clone();
        ctx.set_return(value)
    })
}

fn field_setter<T, V>(field: Field<T, V>) -> NativeFn
where
    T: NativeClass,
    V: FromScript + 'static,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let mut this = this_object::<T>(ctx)?;
        let value: V = ctx.arg(0)?;
        *field.get_mut(unsafe { this.as_mut() }) = value;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use scriptwrap_core::{Exception, Value};

    use super::*;
    use crate::field;
    use crate::objects::{import_external, unwrap_object};

    struct Lamp {
        watts: i32,
        on: bool,
    }

    impl NativeClass for Lamp {
        const NAME: &'static str = "Lamp";
    }

    struct Token;

    impl NativeClass for Token {
        const NAME: &'static str = "Token";
    }

    fn declare(isolate: &mut Isolate) -> ObjectHandle {
        ClassBuilder::<Lamp>::new(isolate)
            .unwrap()
            .constructor(|watts: i32| Lamp { watts, on: false })
            .method("is_on", |lamp: &Lamp| lamp.on)
            .method_mut("toggle", |lamp: &mut Lamp| {
                lamp.on = !lamp.on;
                lamp.on
            })
            .member("watts", field!(Lamp, watts))
            .function("max_watts", || 100)
            .js_function()
    }

    fn import_lamp(isolate: &mut Isolate, watts: i32, on: bool) -> Value {
        let lamp = Box::new(Lamp { watts, on });
        Value::Object(import_external(isolate, lamp).unwrap())
    }

    #[test]
    fn constructed_lamp_has_members() {
        let mut isolate = Isolate::new();
        let class = Value::Object(declare(&mut isolate));

        let lamp = isolate.construct(&class, &[Value::Int(60)]).unwrap();
        assert_eq!(isolate.get(&lamp, "watts"), Ok(Value::Int(60)));
        let toggled = isolate.call_method(&lamp, "toggle", &[]);
        assert_eq!(toggled, Ok(Value::Bool(true)));
        let on = isolate.call_method(&lamp, "is_on", &[]);
        assert_eq!(on, Ok(Value::Bool(true)));

        isolate.set(&lamp, "watts", Value::Int(40)).unwrap();
        assert_eq!(isolate.get(&lamp, "watts"), Ok(Value::Int(40)));
        let max = isolate.call_method(&class, "max_watts", &[]);
        assert_eq!(max, Ok(Value::Int(100)));
    }

    #[test]
    fn member_setter_rejects_wrong_type() {
        let mut isolate = Isolate::new();
        let class = Value::Object(declare(&mut isolate));
        let lamp = isolate.construct(&class, &[Value::Int(60)]).unwrap();

        let err = isolate
            .set(&lamp, "watts", Value::from("bright"))
            .unwrap_err();
        assert!(err.message.contains("type mismatch"), "{err}");
    }

    #[test]
    fn method_on_foreign_receiver_throws() {
        let mut isolate = Isolate::new();
        let class = Value::Object(declare(&mut isolate));
        let lamp = isolate.construct(&class, &[Value::Int(60)]).unwrap();
        let toggle = isolate.get(&lamp, "toggle").unwrap();

        let plain = Value::Object(isolate.new_object());
        let err = isolate.call(&toggle, plain, &[]).unwrap_err();
        let expected = NativeError::invalid_this("expected Lamp, got object");
        assert_eq!(err, Exception::from(expected));
    }

    #[test]
    fn readonly_property_and_constant() {
        let mut isolate = Isolate::new();
        let class = ClassBuilder::<Lamp>::new(&mut isolate)
            .unwrap()
            .property_get("label", |lamp: &Lamp| format!("{}W", lamp.watts))
            .member_readonly("on", field!(Lamp, on))
            .constant("VOLTS", 230)
            .unwrap()
            .js_function();

        let lamp = import_lamp(&mut isolate, 9, true);
        assert_eq!(isolate.get(&lamp, "label"), Ok(Value::from("9W")));
        assert!(isolate.set(&lamp, "on", Value::Bool(false)).is_err());
        assert_eq!(isolate.get(&lamp, "on"), Ok(Value::Bool(true)));

        let class = Value::Object(class);
        assert_eq!(isolate.get(&class, "VOLTS"), Ok(Value::Int(230)));
        assert!(isolate.set(&class, "VOLTS", Value::Int(110)).is_err());
    }

    #[test]
    fn property_with_setter() {
        let mut isolate = Isolate::new();
        let getter = |lamp: &Lamp| lamp.watts * 2;
        let setter = |lamp: &mut Lamp, power: i32| lamp.watts = power / 2;
        ClassBuilder::<Lamp>::new(&mut isolate)
            .unwrap()
            .property("power", getter, setter);

        let lamp = import_lamp(&mut isolate, 5, false);
        isolate.set(&lamp, "power", Value::Int(30)).unwrap();
        assert_eq!(isolate.get(&lamp, "power"), Ok(Value::Int(30)));
        let ptr = unwrap_object::<Lamp>(&isolate, &lamp).unwrap();
        assert_eq!(unsafe { ptr.as_ref() }.watts, 15);
    }

    #[test]
    fn raw_constructor_can_fail() {
        let mut isolate = Isolate::new();
        let class = ClassBuilder::<Lamp>::new(&mut isolate)
            .unwrap()
            .constructor_raw(|ctx| {
                let watts: i32 = ctx.arg(0)?;
                if watts <= 0 {
                    return Err(NativeError::other("watts must be positive"));
                }
                Ok(Lamp { watts, on: false })
            })
            .js_function();
        let class = Value::Object(class);

        let err = isolate.construct(&class, &[Value::Int(0)]).unwrap_err();
        assert!(err.message.contains("watts must be positive"));
        assert!(isolate.construct(&class, &[Value::Int(3)]).is_ok());
    }

    #[test]
    fn class_without_constructor_cannot_be_created() {
        let mut isolate = Isolate::new();
        let mut builder = ClassBuilder::<Lamp>::new(&mut isolate).unwrap();
        let class = Value::Object(builder.js_function());

        let err = isolate.construct(&class, &[]).unwrap_err();
        assert!(err.message.contains("Lamp: create is not allowed"), "{err}");
    }

    #[test]
    fn zero_sized_class_is_rejected() {
        let mut isolate = Isolate::new();
        let Err(err) = ClassBuilder::<Token>::new(&mut isolate) else {
            panic!("zero-sized class was declared");
        };
        let expected = RegistrationError::ZeroSizedClass {
            class: "Token".to_string(),
        };
        assert_eq!(err, expected);
    }
}
