//! Managed object handles

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::class::{ClassInfo, MethodKey};
use crate::error::{InvocationError, Result};
use crate::value::Value;

struct ObjectInner {
    class: Arc<ClassInfo>,
    state: Box<dyn Any + Send + Sync>,
}

/// Shared handle to an instance of a managed class.
///
/// Cloning is cheap and preserves identity: two handles compare equal only when they
/// point at the same instance.
#[derive(Clone)]
pub struct Object(Arc<ObjectInner>);

impl Object {
    /// Wrap `state` as an instance of `class`
    pub fn new<T: Any + Send + Sync>(class: Arc<ClassInfo>, state: T) -> Self {
        Self::from_boxed(class, Box::new(state))
    }

    /// Wrap already-boxed state, as returned by a constructor
    pub fn from_boxed(class: Arc<ClassInfo>, state: Box<dyn Any + Send + Sync>) -> Self {
        Object(Arc::new(ObjectInner { class, state }))
    }

    pub fn class(&self) -> &Arc<ClassInfo> {
        &self.0.class
    }

    pub fn class_name(&self) -> &str {
        self.0.class.name()
    }

    pub fn is_a(&self, name: &str) -> bool {
        self.0.class.is_a(name)
    }

    /// Borrow the instance state as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0.state).downcast_ref::<T>()
    }

    /// Invoke the first method named `method` taking `args.len()` arguments
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let (_, info) = self.0.class.method(method, args.len()).ok_or_else(|| {
            InvocationError::NoSuchMethod {
                class: self.class_name().to_string(),
                method: method.to_string(),
                arity: args.len(),
            }
        })?;
        info.invoke(self, args)
    }

    /// Invoke the method with exactly this signature
    pub fn invoke_key(&self, key: &MethodKey, args: Vec<Value>) -> Result<Value> {
        let (_, info) =
            self.0
                .class
                .method_by_key(key)
                .ok_or_else(|| InvocationError::NoSuchMethod {
                    class: self.class_name().to_string(),
                    method: key.name.clone(),
                    arity: key.params.len(),
                })?;
        info.invoke(self, args)
    }

    /// Write a property through its setter
    pub fn set_property(&self, name: &str, value: Value) -> Result<()> {
        let property =
            self.0
                .class
                .property(name)
                .ok_or_else(|| InvocationError::NoSuchProperty {
                    class: self.class_name().to_string(),
                    property: name.to_string(),
                })?;
        property.set(self, value)
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the instance while any handle is alive
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.class_name(), self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeRef;

    #[test]
    fn test_identity() {
        let class = ClassInfo::builder("Thing").build();
        let a = Object::new(class.clone(), 1u32);
        let b = a.clone();
        let c = Object::new(class, 1u32);
        assert!(a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.downcast_ref::<u32>(), Some(&1));
        assert!(a.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_unknown_method() {
        let class = ClassInfo::builder("Thing")
            .object_method("ping", vec![], TypeRef::Str, |_, _| Ok(Value::from("pong")))
            .build();
        let object = Object::new(class, ());
        assert_eq!(object.invoke("ping", vec![]).unwrap(), Value::from("pong"));
        assert!(matches!(
            object.invoke("ping", vec![Value::Null]),
            Err(InvocationError::NoSuchMethod { arity: 1, .. })
        ));
    }
}
