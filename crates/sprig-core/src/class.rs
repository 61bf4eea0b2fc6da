//! Class metadata: the capability interface the container and proxies run against
//!
//! A [`ClassInfo`] lists what can be done with instances of a class: which constructors
//! and factory methods build it, which properties can be written after construction
//! and which methods can be invoked. Every member carries a closure, so the container
//! never needs language-level reflection: constructor selection, setter injection and
//! proxy dispatch only talk to this table.
//!
//! Classes are assembled with [`ClassBuilder`]:
//!
//! ```
//! use sprig_core::{ClassInfo, Param, TypeRef, Value};
//! use std::sync::Mutex;
//!
//! struct Greeter {
//!     greeting: Mutex<String>,
//! }
//!
//! let class = ClassInfo::builder("Greeter")
//!     .implements("Greeting")
//!     .constructor(vec![Param::named("greeting", TypeRef::Str)], |args| {
//!         let greeting = args[0].as_str().unwrap_or("hello").to_string();
//!         Ok(Greeter { greeting: Mutex::new(greeting) })
//!     })
//!     .method::<Greeter, _>("greet", vec![], TypeRef::Str, |greeter, _args| {
//!         Ok(Value::from(greeter.greeting.lock().unwrap().clone()))
//!     })
//!     .build();
//!
//! assert!(class.is_a("Greeting"));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{InvocationError, Result};
use crate::object::Object;
use crate::value::{TypeRef, Value};

/// Builds the raw state of a new instance from resolved arguments
pub type ConstructorFn =
    Arc<dyn Fn(Vec<Value>) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Produces a complete object; receives the factory instance for non-static methods
pub type FactoryFn = Arc<dyn Fn(Option<&Object>, Vec<Value>) -> Result<Object> + Send + Sync>;

/// Writes one property of an existing instance
pub type SetterFn = Arc<dyn Fn(&Object, Value) -> Result<()> + Send + Sync>;

/// Invokes one method on an instance
pub type MethodFn = Arc<dyn Fn(&Object, Vec<Value>) -> Result<Value> + Send + Sync>;

/// Member visibility; public members sort first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A constructor or method parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeRef,
    /// Autowiring leaves the parameter null instead of failing
    pub optional: bool,
}

impl Param {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            name: None,
            ty,
            optional: false,
        }
    }

    pub fn named(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A way to build a fresh instance of the class
#[derive(Clone)]
pub struct ConstructorInfo {
    pub params: Vec<Param>,
    pub visibility: Visibility,
    func: ConstructorFn,
}

impl ConstructorInfo {
    pub fn new(params: Vec<Param>, func: ConstructorFn) -> Self {
        Self {
            params,
            visibility: Visibility::Public,
            func,
        }
    }

    pub fn param_types(&self) -> Vec<TypeRef> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Run the constructor, producing the raw instance state
    pub fn construct(&self, args: Vec<Value>) -> Result<Box<dyn Any + Send + Sync>> {
        if args.len() != self.params.len() {
            return Err(InvocationError::ArgumentCount {
                member: "constructor".to_string(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        (self.func)(args)
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("params", &self.param_types())
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// A named method producing instances of some class
#[derive(Clone)]
pub struct FactoryMethodInfo {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    /// Static methods are called without a factory instance
    pub is_static: bool,
    pub visibility: Visibility,
    func: FactoryFn,
}

impl FactoryMethodInfo {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: TypeRef,
        is_static: bool,
        func: FactoryFn,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            is_static,
            visibility: Visibility::Public,
            func,
        }
    }

    pub fn param_types(&self) -> Vec<TypeRef> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn invoke(&self, factory: Option<&Object>, args: Vec<Value>) -> Result<Object> {
        if args.len() != self.params.len() {
            return Err(InvocationError::ArgumentCount {
                member: self.name.clone(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        (self.func)(factory, args)
    }
}

impl fmt::Debug for FactoryMethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryMethodInfo")
            .field("name", &self.name)
            .field("params", &self.param_types())
            .field("return_type", &self.return_type)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// A property writable after construction
#[derive(Clone)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: TypeRef,
    /// Interface declaring the setter, if any
    pub interface: Option<String>,
    setter: SetterFn,
}

impl PropertyInfo {
    pub fn new(name: impl Into<String>, ty: TypeRef, setter: SetterFn) -> Self {
        Self {
            name: name.into(),
            ty,
            interface: None,
            setter,
        }
    }

    pub fn set(&self, target: &Object, value: Value) -> Result<()> {
        (self.setter)(target, value)
    }

    /// Same property, different setter
    pub fn with_setter(&self, setter: SetterFn) -> Self {
        Self {
            setter,
            ..self.clone()
        }
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish()
    }
}

/// Special roles a method can play for proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodKind {
    #[default]
    Regular,
    /// `equals(other) -> bool`
    Equals,
    /// `hash_code() -> int`
    HashCode,
    /// Destructor-like hook, never intercepted
    Finalize,
}

/// Signature key identifying a method across a class and its proxies
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub name: String,
    pub params: Vec<TypeRef>,
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({})", self.name, params)
    }
}

/// An invocable method
#[derive(Clone)]
pub struct MethodInfo {
    pub name: String,
    pub params: Vec<TypeRef>,
    pub return_type: TypeRef,
    pub kind: MethodKind,
    /// Interface declaring this method, if any
    pub interface: Option<String>,
    /// Returning the raw target from this method is intentional
    pub raw_target_access: bool,
    handler: MethodFn,
}

impl MethodInfo {
    pub fn new(
        name: impl Into<String>,
        params: Vec<TypeRef>,
        return_type: TypeRef,
        handler: MethodFn,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            kind: MethodKind::Regular,
            interface: None,
            raw_target_access: false,
            handler,
        }
    }

    pub fn with_kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_raw_target_access(mut self) -> Self {
        self.raw_target_access = true;
        self
    }

    /// Same signature, different body
    pub fn with_handler(&self, handler: MethodFn) -> Self {
        Self {
            handler,
            ..self.clone()
        }
    }

    pub fn key(&self) -> MethodKey {
        MethodKey {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Invoke this method's body against `target`
    pub fn invoke(&self, target: &Object, args: Vec<Value>) -> Result<Value> {
        if args.len() != self.params.len() {
            return Err(InvocationError::ArgumentCount {
                member: self.name.clone(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        (self.handler)(target, args)
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("key", &self.key().to_string())
            .field("return_type", &self.return_type)
            .field("kind", &self.kind)
            .field("interface", &self.interface)
            .finish()
    }
}

/// Metadata describing one managed class
pub struct ClassInfo {
    name: String,
    superclass: Option<Arc<ClassInfo>>,
    interfaces: Vec<String>,
    is_final: bool,
    constructors: Vec<ConstructorInfo>,
    factory_methods: Vec<FactoryMethodInfo>,
    properties: Vec<PropertyInfo>,
    methods: Vec<MethodInfo>,
}

impl ClassInfo {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Arc<ClassInfo>> {
        self.superclass.as_ref()
    }

    /// Interfaces declared directly on this class
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Interfaces declared on this class and all superclasses, nearest first
    pub fn all_interfaces(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            for interface in &class.interfaces {
                if !all.contains(interface) {
                    all.push(interface.clone());
                }
            }
            current = class.superclass.as_deref();
        }
        all
    }

    /// Final classes cannot be subclassed (and so cannot get subclass proxies)
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Whether this class is, extends or implements `name`
    pub fn is_a(&self, name: &str) -> bool {
        self.hierarchy_distance(name).is_some()
    }

    /// Inheritance distance to `name`: 2 per superclass step, +1 when reached through
    /// an interface.
    pub fn hierarchy_distance(&self, name: &str) -> Option<u32> {
        let mut weight = 0;
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == name {
                return Some(weight);
            }
            if class.interfaces.iter().any(|i| i == name) {
                return Some(weight + 1);
            }
            weight += 2;
            current = class.superclass.as_deref();
        }
        None
    }

    /// Number of superclasses above this class
    pub fn hierarchy_depth(&self) -> u32 {
        let mut depth = 0;
        let mut current = self.superclass.as_deref();
        while let Some(class) = current {
            depth += 1;
            current = class.superclass.as_deref();
        }
        depth
    }

    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    pub fn default_constructor(&self) -> Option<&ConstructorInfo> {
        self.constructors.iter().find(|c| c.params.is_empty())
    }

    pub fn factory_methods(&self) -> &[FactoryMethodInfo] {
        &self.factory_methods
    }

    /// All writable properties, inherited ones included
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Complete method table, inherited methods included
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// First method with the given name and arity, with its table index
    pub fn method(&self, name: &str, arity: usize) -> Option<(usize, &MethodInfo)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name && m.arity() == arity)
    }

    pub fn method_by_key(&self, key: &MethodKey) -> Option<(usize, &MethodInfo)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == key.name && m.params == key.params)
    }

    /// Whether a method with this signature is declared by one of the class interfaces
    pub fn declares_through_interface(&self, kind: MethodKind) -> bool {
        self.methods
            .iter()
            .any(|m| m.kind == kind && m.interface.is_some())
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name.clone()))
            .field("interfaces", &self.interfaces)
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Fluent builder for [`ClassInfo`]
pub struct ClassBuilder {
    name: String,
    superclass: Option<Arc<ClassInfo>>,
    interfaces: Vec<String>,
    is_final: bool,
    constructors: Vec<ConstructorInfo>,
    factory_methods: Vec<FactoryMethodInfo>,
    properties: Vec<PropertyInfo>,
    methods: Vec<MethodInfo>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
            is_final: false,
            constructors: Vec::new(),
            factory_methods: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: Arc<ClassInfo>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        let interface = interface.into();
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Public constructor producing state of type `T`
    pub fn constructor<T, F>(mut self, params: Vec<Param>, func: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Vec<Value>) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors
            .push(ConstructorInfo::new(params, boxed_constructor(func)));
        self
    }

    /// Non-public constructor producing state of type `T`
    pub fn private_constructor<T, F>(mut self, params: Vec<Param>, func: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Vec<Value>) -> Result<T> + Send + Sync + 'static,
    {
        let mut constructor = ConstructorInfo::new(params, boxed_constructor(func));
        constructor.visibility = Visibility::Private;
        self.constructors.push(constructor);
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn factory_method(mut self, method: FactoryMethodInfo) -> Self {
        self.factory_methods.push(method);
        self
    }

    /// Property whose setter operates on state of type `T`
    pub fn property<T, F>(mut self, name: impl Into<String>, ty: TypeRef, setter: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let setter: SetterFn = Arc::new(move |object: &Object, value: Value| {
            let state = typed_state::<T>(object)?;
            setter(state, value)
        });
        self.properties.push(PropertyInfo::new(name, ty, setter));
        self
    }

    pub fn with_property(mut self, property: PropertyInfo) -> Self {
        self.properties.retain(|p| p.name != property.name);
        self.properties.push(property);
        self
    }

    /// Method whose body operates on state of type `T`
    pub fn method<T, F>(
        self,
        name: impl Into<String>,
        params: Vec<TypeRef>,
        return_type: TypeRef,
        body: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let handler: MethodFn = Arc::new(move |object: &Object, args: Vec<Value>| {
            let state = typed_state::<T>(object)?;
            body(state, args)
        });
        self.with_method(MethodInfo::new(name, params, return_type, handler))
    }

    /// Method declared by `interface` whose body operates on state of type `T`
    pub fn interface_method<T, F>(
        self,
        interface: impl Into<String>,
        name: impl Into<String>,
        params: Vec<TypeRef>,
        return_type: TypeRef,
        body: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let interface = interface.into();
        let handler: MethodFn = Arc::new(move |object: &Object, args: Vec<Value>| {
            let state = typed_state::<T>(object)?;
            body(state, args)
        });
        self.implements(interface.clone()).with_method(
            MethodInfo::new(name, params, return_type, handler).with_interface(interface),
        )
    }

    /// Method whose body receives the invoked object itself
    pub fn object_method<F>(
        self,
        name: impl Into<String>,
        params: Vec<TypeRef>,
        return_type: TypeRef,
        body: F,
    ) -> Self
    where
        F: Fn(&Object, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.with_method(MethodInfo::new(name, params, return_type, Arc::new(body)))
    }

    /// Add or override a method; same-signature entries are replaced
    pub fn with_method(mut self, method: MethodInfo) -> Self {
        let key = method.key();
        self.methods.retain(|m| m.key() != key);
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Arc<ClassInfo> {
        let mut methods = self.methods;
        let mut properties = self.properties;
        if let Some(superclass) = &self.superclass {
            for inherited in superclass.methods() {
                if !methods.iter().any(|m| m.key() == inherited.key()) {
                    methods.push(inherited.clone());
                }
            }
            for inherited in superclass.properties() {
                if !properties.iter().any(|p| p.name == inherited.name) {
                    properties.push(inherited.clone());
                }
            }
        }
        Arc::new(ClassInfo {
            name: self.name,
            superclass: self.superclass,
            interfaces: self.interfaces,
            is_final: self.is_final,
            constructors: self.constructors,
            factory_methods: self.factory_methods,
            properties,
            methods,
        })
    }
}

fn boxed_constructor<T, F>(func: F) -> ConstructorFn
where
    T: Any + Send + Sync,
    F: Fn(Vec<Value>) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |args: Vec<Value>| {
        let state = func(args)?;
        Ok(Box::new(state) as Box<dyn Any + Send + Sync>)
    })
}

fn typed_state<T: Any>(object: &Object) -> Result<&T> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| InvocationError::StateMismatch {
            class: object.class_name().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Counter {
        count: Mutex<i64>,
    }

    fn counter_class() -> Arc<ClassInfo> {
        ClassInfo::builder("Counter")
            .implements("Resettable")
            .constructor(vec![], |_| {
                Ok(Counter {
                    count: Mutex::new(0),
                })
            })
            .constructor(vec![Param::named("start", TypeRef::Int)], |args| {
                Ok(Counter {
                    count: Mutex::new(args[0].as_int().unwrap_or_default()),
                })
            })
            .property::<Counter, _>("count", TypeRef::Int, |counter, value| {
                *counter.count.lock().unwrap() = value.as_int().unwrap_or_default();
                Ok(())
            })
            .method::<Counter, _>("increment", vec![], TypeRef::Int, |counter, _| {
                let mut count = counter.count.lock().unwrap();
                *count += 1;
                Ok(Value::Int(*count))
            })
            .build()
    }

    #[test]
    fn test_construct_and_invoke() {
        let class = counter_class();
        let constructor = &class.constructors()[1];
        let state = constructor.construct(vec![Value::Int(41)]).unwrap();
        let object = Object::from_boxed(class.clone(), state);
        assert_eq!(object.invoke("increment", vec![]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_constructor_arity_checked() {
        let class = counter_class();
        let err = class.constructors()[0]
            .construct(vec![Value::Int(1)])
            .err()
            .unwrap();
        assert!(matches!(err, InvocationError::ArgumentCount { .. }));
    }

    #[test]
    fn test_property_setter() {
        let class = counter_class();
        let object = Object::from_boxed(
            class.clone(),
            class.default_constructor().unwrap().construct(vec![]).unwrap(),
        );
        object.set_property("count", Value::Int(9)).unwrap();
        assert_eq!(object.invoke("increment", vec![]).unwrap(), Value::Int(10));
        assert!(matches!(
            object.set_property("missing", Value::Null),
            Err(InvocationError::NoSuchProperty { .. })
        ));
    }

    #[test]
    fn test_state_mismatch_reported() {
        let class = counter_class();
        let object = Object::new(class, "not a counter".to_string());
        assert!(matches!(
            object.invoke("increment", vec![]),
            Err(InvocationError::StateMismatch { .. })
        ));
    }

    #[test]
    fn test_inherited_members() {
        let base = counter_class();
        let derived = ClassInfo::builder("LoudCounter")
            .extends(base)
            .implements("Loud")
            .build();
        assert!(derived.is_a("Counter"));
        assert!(derived.is_a("Resettable"));
        assert!(derived.method("increment", 0).is_some());
        assert!(derived.property("count").is_some());
        assert_eq!(derived.hierarchy_depth(), 1);
        assert_eq!(
            derived.all_interfaces(),
            vec!["Loud".to_string(), "Resettable".to_string()]
        );
    }

    #[test]
    fn test_method_override_replaces_signature() {
        let class = ClassInfo::builder("Echo")
            .object_method("say", vec![TypeRef::Str], TypeRef::Str, |_, _| {
                Ok(Value::from("first"))
            })
            .object_method("say", vec![TypeRef::Str], TypeRef::Str, |_, _| {
                Ok(Value::from("second"))
            })
            .build();
        assert_eq!(class.methods().len(), 1);
        let object = Object::new(class, ());
        assert_eq!(
            object.invoke("say", vec![Value::from("x")]).unwrap(),
            Value::from("second")
        );
    }

    #[test]
    fn test_method_key_display() {
        let method = MethodInfo::new(
            "find",
            vec![TypeRef::Int, TypeRef::Str],
            TypeRef::Any,
            Arc::new(|_, _| Ok(Value::Null)),
        );
        assert_eq!(method.key().to_string(), "find(int, string)");
    }
}
