//! Component descriptors: how to build and wire one managed object
//!
//! ```rust,ignore
//! let descriptor = ComponentDescriptor::for_class("OrderService")
//!     .with_constructor_arg(0, DescriptorValue::reference("repository"))
//!     .with_property("timeout", DescriptorValue::literal(30))
//!     .with_init_method("start");
//! container.register("orderService", descriptor)?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sprig_core::{InvocationError, Object, TypeRef, Value};

use crate::resolver::DependencyDescriptor;

/// Produces an instance in place of constructor or factory-method resolution
pub type InstanceSupplier =
    Arc<dyn Fn() -> std::result::Result<Object, InvocationError> + Send + Sync>;

/// Explicit property values of a descriptor, in application order
pub type PropertyValues = Vec<(String, DescriptorValue)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One shared instance for the container's lifetime
    #[default]
    Singleton,
    /// A new instance on every request, owned by the caller
    Prototype,
}

/// How unset dependencies are filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutowireMode {
    #[default]
    No,
    /// Properties named after a component receive that component
    ByName,
    /// Properties receive the single component matching their type
    ByType,
    /// Constructor parameters are resolved by type
    Constructor,
}

/// A configured value, resolved when the component is built
#[derive(Clone, PartialEq)]
pub enum DescriptorValue {
    Literal(Value),
    /// Another component, by name
    Ref(String),
    List(Vec<DescriptorValue>),
    Map(Vec<(String, DescriptorValue)>),
    /// Expression text handed to the container's value evaluator
    Expr(String),
}

impl DescriptorValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        DescriptorValue::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        DescriptorValue::Ref(name.into())
    }

    pub fn expr(expression: impl Into<String>) -> Self {
        DescriptorValue::Expr(expression.into())
    }

    /// Whether resolving the value can yield a different result each time
    pub fn needs_reresolution(&self) -> bool {
        match self {
            DescriptorValue::Literal(_) | DescriptorValue::Expr(_) => false,
            DescriptorValue::Ref(_) => true,
            DescriptorValue::List(items) => items.iter().any(DescriptorValue::needs_reresolution),
            DescriptorValue::Map(entries) => entries.iter().any(|(_, v)| v.needs_reresolution()),
        }
    }
}

impl fmt::Debug for DescriptorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorValue::Literal(value) => write!(f, "{:?}", value),
            DescriptorValue::Ref(name) => write!(f, "<{}>", name),
            DescriptorValue::List(items) => f.debug_list().entries(items).finish(),
            DescriptorValue::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            DescriptorValue::Expr(expression) => write!(f, "#{{{}}}", expression),
        }
    }
}

/// A constructor argument, optionally restricted to a parameter type or name
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentValue {
    pub value: DescriptorValue,
    pub ty: Option<TypeRef>,
    pub name: Option<String>,
}

impl ArgumentValue {
    pub fn new(value: DescriptorValue) -> Self {
        Self {
            value,
            ty: None,
            name: None,
        }
    }

    pub fn typed(mut self, ty: TypeRef) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether this value may be bound to a parameter of `ty` named `name`
    pub(crate) fn fits(&self, ty: &TypeRef, name: Option<&str>) -> bool {
        let type_ok = self.ty.as_ref().map_or(true, |own| own == ty);
        let name_ok = match (&self.name, name) {
            (Some(own), Some(param)) => own == param,
            _ => true,
        };
        type_ok && name_ok
    }
}

/// Indexed and generic constructor arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructorArgs {
    pub indexed: BTreeMap<usize, ArgumentValue>,
    pub generic: Vec<ArgumentValue>,
}

impl ConstructorArgs {
    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// Smallest parameter count able to take every configured argument
    pub fn min_count(&self) -> usize {
        let indexed = self.indexed.keys().next_back().map_or(0, |max| max + 1);
        indexed.max(self.indexed.len() + self.generic.len())
    }
}

/// The executable chosen for a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolvedExecutable {
    Constructor(usize),
    FactoryMethod(usize),
}

/// One argument of a cached construction plan
#[derive(Debug, Clone)]
pub(crate) enum PreparedArgument {
    /// Converted literal, reusable as is
    Resolved(Value),
    /// Configured value that has to be resolved again
    Reresolve(DescriptorValue, TypeRef),
    /// Autowired parameter
    Autowire(DependencyDescriptor),
}

#[derive(Debug, Clone)]
pub(crate) struct ConstructionPlan {
    pub executable: ResolvedExecutable,
    pub arguments: Vec<PreparedArgument>,
}

/// Static metadata describing how to build and wire one object
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub class_name: Option<String>,
    pub scope: Scope,
    pub lazy_init: bool,
    pub autowire_mode: AutowireMode,
    /// Components created before this one
    pub depends_on: Vec<String>,
    /// Whether the component may be injected when resolving by type
    pub autowire_candidate: bool,
    pub primary: bool,
    pub priority: Option<i32>,
    pub qualifiers: Vec<String>,
    pub instance_supplier: Option<InstanceSupplier>,
    pub factory_component_name: Option<String>,
    pub factory_method_name: Option<String>,
    pub constructor_args: ConstructorArgs,
    pub property_values: PropertyValues,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
    /// Overrides the container-wide constructor resolution mode
    pub lenient_constructor_resolution: Option<bool>,
    /// Infrastructure component, not defined by the application
    pub synthetic: bool,
    pub description: Option<String>,
    pub(crate) plan: Arc<Mutex<Option<ConstructionPlan>>>,
}

impl ComponentDescriptor {
    pub fn new() -> Self {
        Self {
            class_name: None,
            scope: Scope::Singleton,
            lazy_init: false,
            autowire_mode: AutowireMode::No,
            depends_on: Vec::new(),
            autowire_candidate: true,
            primary: false,
            priority: None,
            qualifiers: Vec::new(),
            instance_supplier: None,
            factory_component_name: None,
            factory_method_name: None,
            constructor_args: ConstructorArgs::default(),
            property_values: Vec::new(),
            init_method: None,
            destroy_method: None,
            lenient_constructor_resolution: None,
            synthetic: false,
            description: None,
            plan: Arc::new(Mutex::new(None)),
        }
    }

    pub fn for_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::new()
        }
    }

    /// Component produced by the supplier; `class_name` only serves type matching
    pub fn from_supplier<F>(class_name: impl Into<String>, supplier: F) -> Self
    where
        F: Fn() -> std::result::Result<Object, InvocationError> + Send + Sync + 'static,
    {
        Self {
            class_name: Some(class_name.into()),
            instance_supplier: Some(Arc::new(supplier)),
            ..Self::new()
        }
    }

    /// Component produced by a static factory method of `class_name`
    pub fn for_static_factory(class_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            factory_method_name: Some(method.into()),
            ..Self::new()
        }
    }

    /// Component produced by a factory method of another component
    pub fn for_instance_factory(component: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            factory_component_name: Some(component.into()),
            factory_method_name: Some(method.into()),
            ..Self::new()
        }
    }

    /// Field-by-field copy of `original`, with a fresh resolution cache
    pub fn copy_from(original: &ComponentDescriptor) -> Self {
        Self {
            plan: Arc::new(Mutex::new(None)),
            ..original.clone()
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.with_scope(Scope::Prototype)
    }

    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }

    pub fn with_autowire(mut self, mode: AutowireMode) -> Self {
        self.autowire_mode = mode;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn not_autowire_candidate(mut self) -> Self {
        self.autowire_candidate = false;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifiers.push(qualifier.into());
        self
    }

    pub fn with_constructor_arg(mut self, index: usize, value: DescriptorValue) -> Self {
        self.constructor_args
            .indexed
            .insert(index, ArgumentValue::new(value));
        self
    }

    pub fn with_argument(mut self, index: usize, argument: ArgumentValue) -> Self {
        self.constructor_args.indexed.insert(index, argument);
        self
    }

    pub fn with_generic_arg(mut self, argument: ArgumentValue) -> Self {
        self.constructor_args.generic.push(argument);
        self
    }

    /// Set a property value; a value for the same property is replaced
    pub fn with_property(mut self, name: impl Into<String>, value: DescriptorValue) -> Self {
        let name = name.into();
        self.property_values.retain(|(existing, _)| *existing != name);
        self.property_values.push((name, value));
        self
    }

    pub fn with_property_ref(self, name: impl Into<String>, component: impl Into<String>) -> Self {
        self.with_property(name, DescriptorValue::Ref(component.into()))
    }

    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    pub fn with_lenient_constructor_resolution(mut self, lenient: bool) -> Self {
        self.lenient_constructor_resolution = Some(lenient);
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    pub fn is_prototype(&self) -> bool {
        self.scope == Scope::Prototype
    }

    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    /// Forget the cached constructor or factory method
    pub fn clear_resolution_cache(&self) {
        *self.plan.lock() = None;
    }

    pub(crate) fn cached_plan(&self) -> Option<ConstructionPlan> {
        self.plan.lock().clone()
    }

    pub(crate) fn cache_plan(&self, plan: ConstructionPlan) {
        *self.plan.lock() = Some(plan);
    }

    /// Why the descriptor cannot be used, if it cannot
    pub(crate) fn validation_error(&self) -> Option<&'static str> {
        if self.class_name.is_none()
            && self.instance_supplier.is_none()
            && self.factory_component_name.is_none()
        {
            return Some("neither a class, a supplier nor a factory component is specified");
        }
        if self.factory_component_name.is_some() && self.factory_method_name.is_none() {
            return Some("a factory component requires a factory method name");
        }
        None
    }
}

impl Default for ComponentDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ComponentDescriptor {
    fn eq(&self, other: &Self) -> bool {
        let same_supplier = match (&self.instance_supplier, &other.instance_supplier) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_supplier
            && self.class_name == other.class_name
            && self.scope == other.scope
            && self.lazy_init == other.lazy_init
            && self.autowire_mode == other.autowire_mode
            && self.depends_on == other.depends_on
            && self.autowire_candidate == other.autowire_candidate
            && self.primary == other.primary
            && self.priority == other.priority
            && self.qualifiers == other.qualifiers
            && self.factory_component_name == other.factory_component_name
            && self.factory_method_name == other.factory_method_name
            && self.constructor_args == other.constructor_args
            && self.property_values == other.property_values
            && self.init_method == other.init_method
            && self.destroy_method == other.destroy_method
            && self.lenient_constructor_resolution == other.lenient_constructor_resolution
            && self.synthetic == other.synthetic
            && self.description == other.description
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("class_name", &self.class_name)
            .field("scope", &self.scope)
            .field("lazy_init", &self.lazy_init)
            .field("autowire_mode", &self.autowire_mode)
            .field("depends_on", &self.depends_on)
            .field("primary", &self.primary)
            .field("priority", &self.priority)
            .field("factory_component_name", &self.factory_component_name)
            .field("factory_method_name", &self.factory_method_name)
            .field("constructor_args", &self.constructor_args)
            .field("property_values", &self.property_values)
            .field("init_method", &self.init_method)
            .field("destroy_method", &self.destroy_method)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_descriptor() -> ComponentDescriptor {
        ComponentDescriptor::for_class("OrderService")
            .prototype()
            .lazy()
            .with_autowire(AutowireMode::ByType)
            .depends_on("database")
            .primary()
            .with_priority(5)
            .with_qualifier("orders")
            .with_constructor_arg(0, DescriptorValue::reference("repository"))
            .with_generic_arg(ArgumentValue::new(DescriptorValue::literal("eu")).typed(TypeRef::Str))
            .with_property("timeout", DescriptorValue::literal(30))
            .with_init_method("start")
            .with_destroy_method("stop")
            .with_lenient_constructor_resolution(false)
            .with_description("orders")
    }

    #[test]
    fn test_copy_equals_original() {
        let original = full_descriptor();
        let copy = ComponentDescriptor::copy_from(&original);
        assert_eq!(copy, original);
        assert!(!Arc::ptr_eq(&copy.plan, &original.plan));
    }

    #[test]
    fn test_changed_field_breaks_equality() {
        let original = full_descriptor();
        let mut copy = ComponentDescriptor::copy_from(&original);
        copy.primary = false;
        assert_ne!(copy, original);
    }

    #[test]
    fn test_property_replaced_by_name() {
        let descriptor = ComponentDescriptor::for_class("A")
            .with_property("x", DescriptorValue::literal(1))
            .with_property("x", DescriptorValue::literal(2));
        assert_eq!(descriptor.property_values.len(), 1);
        assert_eq!(descriptor.property_values[0].1, DescriptorValue::literal(2));
    }

    #[test]
    fn test_min_argument_count() {
        let args = ComponentDescriptor::for_class("A")
            .with_constructor_arg(2, DescriptorValue::literal(1))
            .constructor_args;
        assert_eq!(args.min_count(), 3);

        let args = ComponentDescriptor::for_class("A")
            .with_generic_arg(ArgumentValue::new(DescriptorValue::literal(1)))
            .with_generic_arg(ArgumentValue::new(DescriptorValue::literal(2)))
            .constructor_args;
        assert_eq!(args.min_count(), 2);
    }

    #[test]
    fn test_validation() {
        assert!(ComponentDescriptor::new().validation_error().is_some());
        assert!(ComponentDescriptor::for_class("A").validation_error().is_none());
        let mut descriptor = ComponentDescriptor::new();
        descriptor.factory_component_name = Some("factory".to_string());
        assert!(descriptor.validation_error().is_some());
    }

    #[test]
    fn test_reresolution() {
        assert!(!DescriptorValue::literal(1).needs_reresolution());
        assert!(DescriptorValue::List(vec![DescriptorValue::reference("a")]).needs_reresolution());
    }
}
