//! The isolate: an independent script heap with its own templates, handles
//! and embedder data.
//!
//! All objects are referenced through [`ObjectHandle`]s. Objects allocated
//! through the isolate are rooted in the current handle scope until the scope
//! closes (see [`Isolate::scope`]); objects that must outlive a scope are kept
//! alive by a strong [`Persistent`] or by being reachable from the global
//! object.
//!
//! Garbage collection only happens at safepoints: an explicit
//! [`Isolate::collect_garbage`], or the entry of [`Isolate::call`] and
//! [`Isolate::construct`] once the configured allocation threshold is reached.

use std::any::Any;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::IsolateConfig;
use crate::error::{ConfigError, Exception};
use crate::handles::{HandleTable, Persistent, WeakCallback};
use crate::heap::{FunctionData, HeapObject, InternalField, ObjectHandle, ObjectHeap};
use crate::native_fn::{CallContext, NativeFn};
use crate::property::{Property, PropertyAttribute, TemplateProperty};
use crate::template::{FunctionTemplate, TemplateId};
use crate::value::Value;

/// Hook run when the isolate is dropped.
pub type DisposeHook = Box<dyn FnOnce(&mut Isolate)>;

/// An independent script engine instance.
pub struct Isolate {
    pub(crate) heap: ObjectHeap,
    pub(crate) templates: Vec<FunctionTemplate>,
    pub(crate) handles: HandleTable,
    pub(crate) locals: Vec<ObjectHandle>,
    pub(crate) global: ObjectHandle,
    pub(crate) allocations_since_gc: usize,
    data: Vec<Option<Rc<dyn Any>>>,
    dispose_hooks: Vec<DisposeHook>,
    config: IsolateConfig,
}

impl Default for Isolate {
    fn default() -> Self {
        Self::new()
    }
}

impl Isolate {
    /// Create an isolate with the default configuration.
    pub fn new() -> Self {
        Self::build(IsolateConfig::default())
    }

    /// Create an isolate with a custom configuration.
    pub fn with_config(config: IsolateConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: IsolateConfig) -> Self {
        let mut heap = ObjectHeap::new();
        let global = heap.allocate(HeapObject::ordinary(None, 0));
        debug!(
            data_slots = config.data_slots,
            gc_threshold = ?config.gc_threshold,
            "isolate created"
        );
        Self {
            heap,
            templates: Vec::new(),
            handles: HandleTable::new(),
            locals: Vec::new(),
            global,
            allocations_since_gc: 0,
            data: vec![None; config.data_slots],
            dispose_hooks: Vec::new(),
            config,
        }
    }

    /// The configuration the isolate was created with.
    pub fn config(&self) -> &IsolateConfig {
        &self.config
    }

    // ========================================================================
    // Handle scopes
    // ========================================================================

    /// Run `f` in a new handle scope.
    ///
    /// Objects allocated inside the scope stop being rooted by it when `f`
    /// returns.
    pub fn scope<R>(&mut self, f: impl FnOnce(&mut Isolate) -> R) -> R {
        let mark = self.locals.len();
        let result = f(self);
        self.locals.truncate(mark);
        result
    }

    /// Root an object in the current handle scope.
    pub fn local(&mut self, object: ObjectHandle) -> ObjectHandle {
        self.locals.push(object);
        object
    }

    /// Number of objects rooted by open handle scopes.
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    fn allocate(&mut self, object: HeapObject) -> ObjectHandle {
        let handle = self.heap.allocate(object);
        self.locals.push(handle);
        self.allocations_since_gc += 1;
        handle
    }

    // ========================================================================
    // Embedder data and lifecycle
    // ========================================================================

    /// Store embedder data in a slot, returning the previous value.
    pub fn set_data(
        &mut self,
        slot: usize,
        data: Rc<dyn Any>,
    ) -> Result<Option<Rc<dyn Any>>, ConfigError> {
        let count = self.data.len();
        let entry = self
            .data
            .get_mut(slot)
            .ok_or(ConfigError::SlotOutOfRange { slot, count })?;
        Ok(entry.replace(data))
    }

    /// Embedder data stored in a slot.
    pub fn data(&self, slot: usize) -> Option<Rc<dyn Any>> {
        self.data.get(slot).and_then(Clone::clone)
    }

    /// Number of embedder data slots.
    pub fn data_slot_count(&self) -> usize {
        self.data.len()
    }

    /// Register a hook run when the isolate is dropped.
    ///
    /// Hooks run in registration order while the heap is still intact.
    pub fn on_dispose(&mut self, hook: impl FnOnce(&mut Isolate) + 'static) {
        self.dispose_hooks.push(Box::new(hook));
    }

    /// Number of live heap objects.
    pub fn heap_object_count(&self) -> usize {
        self.heap.len()
    }

    // ========================================================================
    // Templates
    // ========================================================================

    /// Create a function template with an optional call handler.
    pub fn new_function_template(&mut self, callback: Option<NativeFn>) -> TemplateId {
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(FunctionTemplate::new(callback));
        id
    }

    fn template(&self, id: TemplateId) -> &FunctionTemplate {
        &self.templates[id.index()]
    }

    fn template_mut(&mut self, id: TemplateId) -> &mut FunctionTemplate {
        &mut self.templates[id.index()]
    }

    /// Set the class name reported by the template's function.
    pub fn set_class_name(&mut self, id: TemplateId, name: impl Into<String>) {
        self.template_mut(id).class_name = Some(name.into());
    }

    /// The class name of a template.
    pub fn class_name(&self, id: TemplateId) -> Option<&str> {
        self.template(id).class_name.as_deref()
    }

    /// Set the number of internal fields of the template's instances.
    pub fn set_internal_field_count(&mut self, id: TemplateId, count: usize) {
        self.template_mut(id).internal_field_count = count;
    }

    /// Number of internal fields of the template's instances.
    pub fn template_internal_field_count(&self, id: TemplateId) -> usize {
        self.template(id).internal_field_count
    }

    /// Chain the template's instance prototype to the parent template's.
    pub fn inherit(&mut self, id: TemplateId, parent: TemplateId) {
        self.template_mut(id).parent = Some(parent);
        if let Some(prototype) = self.template(id).prototype {
            let parent_prototype = self.template_prototype(parent);
            if let Some(object) = self.heap.get_mut(prototype) {
                object.prototype = Some(parent_prototype);
            }
        }
        trace!(
            template = id.index(),
            parent = parent.index(),
            "template inherit"
        );
    }

    /// The parent template, if any.
    pub fn template_parent(&self, id: TemplateId) -> Option<TemplateId> {
        self.template(id).parent
    }

    /// Declare a property on the prototype of the template's instances.
    pub fn set_prototype_property(
        &mut self,
        id: TemplateId,
        name: impl Into<String>,
        property: TemplateProperty,
    ) {
        let name = name.into();
        self.template_mut(id)
            .prototype_properties
            .insert(name.clone(), property.clone());
        if let Some(prototype) = self.template(id).prototype {
            self.materialize(prototype, name, property);
        }
    }

    /// Declare a property on the template's constructor function.
    pub fn set_static_property(
        &mut self,
        id: TemplateId,
        name: impl Into<String>,
        property: TemplateProperty,
    ) {
        let name = name.into();
        self.template_mut(id)
            .static_properties
            .insert(name.clone(), property.clone());
        if let Some(function) = self.template(id).function {
            self.materialize(function, name, property);
        }
    }

    /// The template's constructor function, instantiated on first use.
    pub fn get_function(&mut self, id: TemplateId) -> ObjectHandle {
        if let Some(function) = self.template(id).function {
            return self.local(function);
        }

        let parent_prototype = self
            .template(id)
            .parent
            .map(|parent| self.template_prototype(parent));
        let prototype = self
            .heap
            .allocate(HeapObject::ordinary(parent_prototype, 0));
        let template = &self.templates[id.index()];
        let function = self.heap.allocate(HeapObject::function(FunctionData {
            name: template.display_name().to_string(),
            callback: template.callback.clone(),
            template: Some(id),
        }));
        self.allocations_since_gc += 2;

        let template = self.template_mut(id);
        template.function = Some(function);
        template.prototype = Some(prototype);

        if let Some(object) = self.heap.get_mut(function) {
            object.properties.insert(
                "prototype".to_string(),
                Property::data(
                    Value::Object(prototype),
                    PropertyAttribute::DONT_ENUM | PropertyAttribute::DONT_DELETE,
                ),
            );
        }
        if let Some(object) = self.heap.get_mut(prototype) {
            object.properties.insert(
                "constructor".to_string(),
                Property::data(Value::Object(function), PropertyAttribute::DONT_ENUM),
            );
        }

        let template = self.template(id);
        let prototype_properties: Vec<_> = template
            .prototype_properties
            .iter()
            .map(|(name, property)| (name.clone(), property.clone()))
            .collect();
        let static_properties: Vec<_> = template
            .static_properties
            .iter()
            .map(|(name, property)| (name.clone(), property.clone()))
            .collect();
        for (name, property) in prototype_properties {
            self.materialize(prototype, name, property);
        }
        for (name, property) in static_properties {
            self.materialize(function, name, property);
        }

        let class = self.template(id).display_name();
        debug!(class, "template instantiated");
        self.local(function)
    }

    /// The prototype shared by the template's instances.
    pub fn template_prototype(&mut self, id: TemplateId) -> ObjectHandle {
        if let Some(prototype) = self.template(id).prototype {
            return prototype;
        }
        self.get_function(id);
        self.template(id).prototype.unwrap_or(self.global)
    }

    /// Create an instance of the template, without running its call handler.
    pub fn new_instance(&mut self, id: TemplateId) -> ObjectHandle {
        let prototype = self.template_prototype(id);
        let count = self.template(id).internal_field_count;
        self.allocate(HeapObject::ordinary(Some(prototype), count))
    }

    fn materialize(&mut self, target: ObjectHandle, name: String, property: TemplateProperty) {
        let property = match property {
            TemplateProperty::Value { value, attributes } => Property::Data { value, attributes },
            TemplateProperty::Function {
                callback,
                attributes,
            } => {
                let function = self.heap.allocate(HeapObject::function(FunctionData {
                    name: name.clone(),
                    callback: Some(callback),
                    template: None,
                }));
                self.allocations_since_gc += 1;
                Property::Data {
                    value: Value::Object(function),
                    attributes,
                }
            }
            TemplateProperty::Accessor {
                getter,
                setter,
                attributes,
            } => Property::Accessor {
                getter,
                setter,
                attributes,
            },
        };
        if let Some(object) = self.heap.get_mut(target) {
            object.properties.insert(name, property);
        }
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Create an empty object.
    pub fn new_object(&mut self) -> ObjectHandle {
        self.allocate(HeapObject::ordinary(None, 0))
    }

    /// Create a function object backed by a native callback.
    pub fn new_function(&mut self, name: impl Into<String>, callback: NativeFn) -> ObjectHandle {
        self.allocate(HeapObject::function(FunctionData {
            name: name.into(),
            callback: Some(callback),
            template: None,
        }))
    }

    /// Whether the handle refers to a live object.
    pub fn is_alive(&self, object: ObjectHandle) -> bool {
        self.heap.contains(object)
    }

    /// Whether the object is callable.
    pub fn is_function(&self, object: ObjectHandle) -> bool {
        self.heap
            .get(object)
            .is_some_and(|object| object.as_function().is_some())
    }

    /// Name of a function object.
    pub fn function_name(&self, object: ObjectHandle) -> Option<&str> {
        self.heap
            .get(object)
            .and_then(HeapObject::as_function)
            .map(|data| data.name.as_str())
    }

    /// The template a function object was instantiated from.
    pub fn template_of(&self, object: ObjectHandle) -> Option<TemplateId> {
        self.heap
            .get(object)
            .and_then(HeapObject::as_function)
            .and_then(|data| data.template)
    }

    /// Number of internal fields of an object; zero for dead objects.
    pub fn internal_field_count(&self, object: ObjectHandle) -> usize {
        self.heap
            .get(object)
            .map_or(0, |object| object.internal_fields.len())
    }

    /// Read an internal field; out of range reads yield `Empty`.
    pub fn internal_field(&self, object: ObjectHandle, index: usize) -> InternalField {
        self.heap
            .get(object)
            .and_then(|object| object.internal_fields.get(index).copied())
            .unwrap_or_default()
    }

    /// Write an internal field; returns `false` if the field does not exist.
    pub fn set_internal_field(
        &mut self,
        object: ObjectHandle,
        index: usize,
        field: InternalField,
    ) -> bool {
        match self
            .heap
            .get_mut(object)
            .and_then(|object| object.internal_fields.get_mut(index))
        {
            Some(slot) => {
                *slot = field;
                true
            }
            None => false,
        }
    }

    /// The prototype of an object.
    pub fn prototype_of(&self, object: ObjectHandle) -> Option<ObjectHandle> {
        self.heap.get(object).and_then(|object| object.prototype)
    }

    /// Replace the prototype of an object.
    ///
    /// Returns `false` if the object is dead or the new chain would loop.
    pub fn set_prototype(&mut self, object: ObjectHandle, prototype: Option<ObjectHandle>) -> bool {
        let mut current = prototype;
        while let Some(handle) = current {
            if handle == object {
                return false;
            }
            current = self.prototype_of(handle);
        }
        match self.heap.get_mut(object) {
            Some(target) => {
                target.prototype = prototype;
                true
            }
            None => false,
        }
    }

    /// The global object.
    pub fn global(&self) -> ObjectHandle {
        self.global
    }

    /// Define (or replace) an own property.
    pub fn define_property(
        &mut self,
        object: ObjectHandle,
        name: impl Into<String>,
        property: Property,
    ) -> bool {
        match self.heap.get_mut(object) {
            Some(target) => {
                target.properties.insert(name.into(), property);
                true
            }
            None => false,
        }
    }

    /// An own property of an object.
    pub fn own_property(&self, object: ObjectHandle, name: &str) -> Option<&Property> {
        self.heap
            .get(object)
            .and_then(|object| object.properties.get(name))
    }

    /// Whether the object or its prototype chain has the property.
    pub fn has_property(&self, object: ObjectHandle, name: &str) -> bool {
        self.lookup(object, name).is_some()
    }

    fn lookup(&self, object: ObjectHandle, name: &str) -> Option<(ObjectHandle, Property)> {
        let mut current = Some(object);
        while let Some(handle) = current {
            let object = self.heap.get(handle)?;
            if let Some(property) = object.properties.get(name) {
                return Some((handle, property.clone()));
            }
            current = object.prototype;
        }
        None
    }

    /// Read a property, running accessors with `receiver` as `this`.
    pub fn get(&mut self, receiver: &Value, name: &str) -> Result<Value, Exception> {
        let Some(object) = receiver.as_object() else {
            return Err(Exception::type_error(format!(
                "cannot read property '{name}' of {}",
                receiver.type_name()
            )));
        };
        match self.lookup(object, name) {
            None => Ok(Value::Undefined),
            Some((_, Property::Data { value, .. })) => Ok(value),
            Some((_, Property::Accessor { getter, .. })) => {
                self.invoke(&getter, receiver.clone(), &[], false)
            }
        }
    }

    /// Assign a property, running accessors with `receiver` as `this`.
    pub fn set(&mut self, receiver: &Value, name: &str, value: Value) -> Result<(), Exception> {
        let Some(object) = receiver.as_object() else {
            return Err(Exception::type_error(format!(
                "cannot set property '{name}' of {}",
                receiver.type_name()
            )));
        };
        match self.lookup(object, name) {
            Some((_, property)) if property.is_read_only() => {
                let message = format!("cannot assign to read only property '{name}'");
                Err(Exception::type_error(message))
            }
            Some((_, Property::Accessor { setter, .. })) => {
                if let Some(setter) = setter {
                    self.invoke(&setter, receiver.clone(), &[value], false)?;
                }
                Ok(())
            }
            Some((owner, Property::Data { attributes, .. })) if owner == object => {
                self.define_property(object, name, Property::Data { value, attributes });
                Ok(())
            }
            _ => {
                let property = Property::data(value, PropertyAttribute::empty());
                self.define_property(object, name, property);
                Ok(())
            }
        }
    }

    /// Assign a property of the global object.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<(), Exception> {
        let global = Value::Object(self.global);
        self.set(&global, name, value)
    }

    /// Read a property of the global object.
    pub fn get_global(&mut self, name: &str) -> Result<Value, Exception> {
        let global = Value::Object(self.global);
        self.get(&global, name)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn function_parts(
        &self,
        function: &Value,
    ) -> Result<(Option<NativeFn>, Option<TemplateId>), Exception> {
        function
            .as_object()
            .and_then(|handle| self.heap.get(handle))
            .and_then(HeapObject::as_function)
            .map(|data| (data.callback.clone(), data.template))
            .ok_or_else(|| {
                Exception::type_error(format!("{} is not a function", function.type_name()))
            })
    }

    fn safepoint(&mut self) {
        if let Some(threshold) = self.config.gc_threshold
            && self.allocations_since_gc >= threshold
        {
            self.collect_garbage();
        }
    }

    /// Run a native callback in its own handle scope; only the return value
    /// escapes into the caller's scope.
    pub(crate) fn invoke(
        &mut self,
        callback: &NativeFn,
        this: Value,
        args: &[Value],
        construct_call: bool,
    ) -> Result<Value, Exception> {
        let mark = self.locals.len();
        let result = {
            let mut ctx = CallContext::new(self, this, args, construct_call);
            callback.call(&mut ctx).map(|()| ctx.into_return_value())
        };
        self.locals.truncate(mark);
        match result {
            Ok(value) => {
                if let Value::Object(handle) = &value {
                    self.locals.push(*handle);
                }
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "native callback failed");
                Err(Exception::from(err))
            }
        }
    }

    /// Call a function with an explicit receiver.
    pub fn call(
        &mut self,
        function: &Value,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Exception> {
        self.safepoint();
        match self.function_parts(function)? {
            (Some(callback), _) => self.invoke(&callback, this, args, false),
            (None, _) => Ok(Value::Undefined),
        }
    }

    /// Look up a method on the receiver and call it.
    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, Exception> {
        let method = self.get(receiver, name)?;
        if !method.is_object() {
            return Err(Exception::type_error(format!("{name} is not a function")));
        }
        self.call(&method, receiver.clone(), args)
    }

    /// Invoke a function with `new`.
    ///
    /// The receiver is a fresh instance of the function's template; an
    /// object returned by the call handler replaces it.
    pub fn construct(&mut self, constructor: &Value, args: &[Value]) -> Result<Value, Exception> {
        self.safepoint();
        let (callback, template) = self.function_parts(constructor)?;
        let this = match template {
            Some(id) => self.new_instance(id),
            None => self.new_object(),
        };
        let result = match callback {
            Some(callback) => self.invoke(&callback, Value::Object(this), args, true)?,
            None => Value::Undefined,
        };
        Ok(if result.is_object() {
            result
        } else {
            Value::Object(this)
        })
    }

    // ========================================================================
    // Persistent handles
    // ========================================================================

    /// Create a strong persistent handle to an object.
    pub fn persistent(&mut self, object: ObjectHandle) -> Persistent {
        self.handles.create(object)
    }

    /// Make a persistent weak, with an optional callback run after its
    /// target is collected.
    pub fn set_weak(&mut self, handle: Persistent, callback: Option<WeakCallback>) -> bool {
        self.handles.set_weak(handle, callback)
    }

    /// Whether the persistent is weak.
    pub fn is_weak(&self, handle: Persistent) -> bool {
        self.handles.is_weak(handle)
    }

    /// The target of a persistent; `None` once reset or collected.
    pub fn persistent_get(&self, handle: Persistent) -> Option<ObjectHandle> {
        self.handles
            .get(handle)
            .filter(|target| self.heap.contains(*target))
    }

    /// Release a persistent; a pending weak callback never runs.
    pub fn reset(&mut self, handle: Persistent) -> bool {
        self.handles.reset(handle)
    }

    /// Number of persistent handles in use.
    pub fn persistent_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for Isolate {
    fn drop(&mut self) {
        let hooks = std::mem::take(&mut self.dispose_hooks);
        for hook in hooks {
            hook(self);
        }
        debug!(objects = self.heap.len(), "isolate disposed");
    }
}
