//! Runtime values and the type vocabulary used to describe them
//!
//! [`TypeRef`] names the type expected at an injection point, a constructor parameter
//! or a method return; [`Value`] is what actually flows through those slots. Matching
//! and weighting of values against types drives constructor selection in the
//! container, so the rules live here next to the types themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::class::ClassInfo;
use crate::object::Object;

/// Weight assigned to a value bound to an `Any` slot on top of its hierarchy depth.
const ANY_BIAS: u32 = 3;

/// A type as seen by the container.
///
/// `Bool`, `Int` and `Float` are primitives: they can never hold [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeRef {
    /// No value (method returns only)
    Void,
    Bool,
    Int,
    Float,
    Str,
    /// Accepts every value
    Any,
    /// A managed class or interface, by name
    Class(String),
    /// Ordered collection of the element type
    List(Box<TypeRef>),
    /// String-keyed collection of the element type
    Map(Box<TypeRef>),
}

impl TypeRef {
    /// Class or interface type by name
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class(name.into())
    }

    /// List of the given element type
    pub fn list_of(element: TypeRef) -> Self {
        TypeRef::List(Box::new(element))
    }

    /// String-keyed map of the given element type
    pub fn map_of(element: TypeRef) -> Self {
        TypeRef::Map(Box::new(element))
    }

    /// Non-nullable value types
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Bool | TypeRef::Int | TypeRef::Float)
    }

    /// Types never considered for autowiring
    pub fn is_simple(&self) -> bool {
        self.is_primitive() || matches!(self, TypeRef::Str | TypeRef::Void)
    }

    /// Whether this type aggregates several components
    pub fn is_multiple(&self) -> bool {
        matches!(self, TypeRef::List(_) | TypeRef::Map(_))
    }

    /// Element type of a list or map
    pub fn element_type(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::List(element) | TypeRef::Map(element) => Some(element),
            _ => None,
        }
    }

    /// Class name for class types
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeRef::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Whether instances of `class` can be bound to this type
    pub fn accepts_class(&self, class: &ClassInfo) -> bool {
        match self {
            TypeRef::Any => true,
            TypeRef::Class(name) => class.is_a(name),
            _ => false,
        }
    }

    /// Whether a slot of type `other` can always be bound to this type
    pub fn is_assignable_from(&self, other: &TypeRef) -> bool {
        match (self, other) {
            (TypeRef::Any, _) => true,
            (TypeRef::List(a), TypeRef::List(b)) | (TypeRef::Map(a), TypeRef::Map(b)) => {
                a.is_assignable_from(b)
            }
            (a, b) => a == b,
        }
    }

    /// Whether `value` can be bound to this type without conversion
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeRef::Any, _) => true,
            (TypeRef::Void, Value::Null) => true,
            (ty, Value::Null) => !ty.is_primitive() && *ty != TypeRef::Void,
            (TypeRef::Bool, Value::Bool(_))
            | (TypeRef::Int, Value::Int(_))
            | (TypeRef::Float, Value::Float(_))
            | (TypeRef::Str, Value::Str(_)) => true,
            (TypeRef::Class(name), Value::Object(object)) => object.is_a(name),
            (TypeRef::List(element), Value::List(items)) => {
                items.iter().all(|item| element.matches(item))
            }
            (TypeRef::Map(element), Value::Map(entries)) => {
                entries.iter().all(|(_, item)| element.matches(item))
            }
            _ => false,
        }
    }

    /// Distance between `value` and this type, `None` when not assignable.
    ///
    /// Exact matches weigh 0, every superclass step adds 2, binding through an
    /// interface adds 1 and binding to `Any` adds a fixed bias.
    pub fn difference_weight(&self, value: &Value) -> Option<u32> {
        if !self.matches(value) {
            return None;
        }
        let weight = match (self, value) {
            (_, Value::Null) => 0,
            (TypeRef::Any, Value::Object(object)) => {
                object.class().hierarchy_depth() * 2 + ANY_BIAS
            }
            (TypeRef::Any, _) => ANY_BIAS,
            (TypeRef::Class(name), Value::Object(object)) => {
                object.class().hierarchy_distance(name)?
            }
            (TypeRef::List(element), Value::List(items)) => items
                .iter()
                .filter_map(|item| element.difference_weight(item))
                .max()
                .unwrap_or(0),
            (TypeRef::Map(element), Value::Map(entries)) => entries
                .iter()
                .filter_map(|(_, item)| element.difference_weight(item))
                .max()
                .unwrap_or(0),
            _ => 0,
        };
        Some(weight)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "void"),
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Int => write!(f, "int"),
            TypeRef::Float => write!(f, "float"),
            TypeRef::Str => write!(f, "string"),
            TypeRef::Any => write!(f, "any"),
            TypeRef::Class(name) => write!(f, "{}", name),
            TypeRef::List(element) => write!(f, "list<{}>", element),
            TypeRef::Map(element) => write!(f, "map<string, {}>", element),
        }
    }
}

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(Object),
    List(Vec<Value>),
    /// Insertion-ordered string-keyed entries
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Human-readable name of the value's runtime type
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Object(object) => object.class_name().to_string(),
            Value::List(_) => "list".to_string(),
            Value::Map(_) => "map".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Whether this value is exactly `object` (identity, not equality)
    pub fn is_same_object(&self, object: &Object) -> bool {
        matches!(self, Value::Object(own) if own.ptr_eq(object))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(object) => write!(f, "{:?}", object),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassInfo;

    fn animal_classes() -> (Object, Object) {
        let animal = ClassInfo::builder("Animal").implements("Named").build();
        let dog = ClassInfo::builder("Dog").extends(animal.clone()).build();
        (Object::new(animal, ()), Object::new(dog, ()))
    }

    #[test]
    fn test_primitive_slots_reject_null() {
        assert!(!TypeRef::Int.matches(&Value::Null));
        assert!(TypeRef::Str.matches(&Value::Null));
        assert!(TypeRef::class("Dog").matches(&Value::Null));
        assert!(TypeRef::Void.matches(&Value::Null));
    }

    #[test]
    fn test_string_does_not_match_int() {
        assert!(!TypeRef::Int.matches(&Value::from("x")));
        assert_eq!(TypeRef::Int.difference_weight(&Value::from("x")), None);
        assert_eq!(TypeRef::Str.difference_weight(&Value::from("x")), Some(0));
    }

    #[test]
    fn test_hierarchy_weights() {
        let (animal, dog) = animal_classes();
        assert_eq!(
            TypeRef::class("Dog").difference_weight(&Value::from(dog.clone())),
            Some(0)
        );
        assert_eq!(
            TypeRef::class("Animal").difference_weight(&Value::from(dog.clone())),
            Some(2)
        );
        assert_eq!(
            TypeRef::class("Named").difference_weight(&Value::from(dog.clone())),
            Some(3)
        );
        assert_eq!(
            TypeRef::class("Dog").difference_weight(&Value::from(animal)),
            None
        );
        assert!(TypeRef::Any.difference_weight(&Value::from(dog)).unwrap() > 3);
    }

    #[test]
    fn test_collection_matching() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(TypeRef::list_of(TypeRef::Int).matches(&list));
        assert!(!TypeRef::list_of(TypeRef::Str).matches(&list));
        assert!(TypeRef::list_of(TypeRef::Int).is_multiple());
        assert!(!TypeRef::Int.is_multiple());
    }

    #[test]
    fn test_object_equality_is_identity() {
        let (_, dog) = animal_classes();
        let other = Object::new(dog.class().clone(), ());
        assert_eq!(Value::from(dog.clone()), Value::from(dog.clone()));
        assert_ne!(Value::from(dog.clone()), Value::from(other));
        assert!(Value::from(dog.clone()).is_same_object(&dog));
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"name": "sprig", "size": 3, "tags": ["a", "b"]});
        let value = Value::from(json);
        let entries = value.as_map().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .any(|(k, v)| k == "size" && *v == Value::Int(3)));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeRef::map_of(TypeRef::class("Repo")).to_string(), "map<string, Repo>");
    }
}
