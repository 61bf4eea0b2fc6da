//! The container: descriptors in, wired objects out

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Mutex, RwLock};
use sprig_core::{
    init_logging, ClassInfo, ClassLoader, DefaultTypeConverter, LiteralEvaluator, Object,
    TypeConverter, TypeRef, Value, ValueEvaluator,
};
use tracing::{debug, info};

use crate::config::{ConfigLoader, ContainerConfig};
use crate::descriptor::ComponentDescriptor;
use crate::error::{ContainerError, Result};
use crate::hooks::{HookRegistry, LifecycleHook};
use crate::registry::SingletonRegistry;
use crate::store::DescriptorStore;

/// Managed-object container.
///
/// Components are registered as [`ComponentDescriptor`]s and created on first request
/// (or by [`preinstantiate_singletons`](Self::preinstantiate_singletons)). Singletons
/// live until [`close`](Self::close); prototypes belong to the caller.
///
/// ```rust,ignore
/// let container = Container::new();
/// container.define_class(repository_class())?;
/// container.define_class(service_class())?;
/// container.register("repository", ComponentDescriptor::for_class("Repository"))?;
/// container.register(
///     "service",
///     ComponentDescriptor::for_class("Service").with_property_ref("repository", "repository"),
/// )?;
/// let service = container.get("service")?;
/// ```
pub struct Container {
    pub(crate) config: RwLock<ContainerConfig>,
    pub(crate) store: DescriptorStore,
    pub(crate) registry: SingletonRegistry,
    pub(crate) hooks: HookRegistry,
    pub(crate) loader: Arc<ClassLoader>,
    pub(crate) converter: Arc<dyn TypeConverter>,
    pub(crate) evaluator: Arc<dyn ValueEvaluator>,
    /// Objects injected by type without being components
    pub(crate) resolvable: RwLock<Vec<(TypeRef, Object)>>,
    /// Property types never autowired
    pub(crate) ignored_types: RwLock<Vec<TypeRef>>,
    /// Prototype names currently in creation, per thread
    pub(crate) prototypes_in_creation: Mutex<HashMap<ThreadId, Vec<String>>>,
}

impl Container {
    /// Container with default settings and every discovered class
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Container configured by `loader`, with logging initialised from it
    pub fn from_loader(loader: &ConfigLoader) -> Result<Self> {
        let config = loader.load()?;
        init_logging(&config.logging);
        Ok(Self::with_config(config))
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Current settings
    pub fn config(&self) -> ContainerConfig {
        self.config.read().clone()
    }

    pub fn set_allow_circular_references(&self, allow: bool) {
        self.config.write().allow_circular_references = allow;
    }

    pub fn set_allow_raw_injection_despite_wrapping(&self, allow: bool) {
        self.config.write().allow_raw_injection_despite_wrapping = allow;
    }

    pub fn set_allow_descriptor_overriding(&self, allow: bool) {
        self.config.write().allow_descriptor_overriding = allow;
        self.store.set_allow_overriding(allow);
    }

    pub fn set_lenient_constructor_resolution(&self, lenient: bool) {
        self.config.write().lenient_constructor_resolution = lenient;
    }

    pub fn class_loader(&self) -> &Arc<ClassLoader> {
        &self.loader
    }

    /// Make a class available to descriptors
    pub fn define_class(&self, class: Arc<ClassInfo>) -> Result<()> {
        self.loader.define(class)?;
        Ok(())
    }

    /// Register a descriptor. Replacing a descriptor discards the singleton built
    /// from the previous one.
    pub fn register(&self, name: &str, descriptor: ComponentDescriptor) -> Result<()> {
        let replaced = self.store.contains(name);
        self.store.register(name, descriptor)?;
        if replaced {
            self.registry.destroy_singleton(name);
        }
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let canonical = self.store.canonical_name(name);
        self.store.remove(&canonical)?;
        self.registry.destroy_singleton(&canonical);
        Ok(())
    }

    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        self.store.register_alias(name, alias)
    }

    pub fn aliases(&self, name: &str) -> Vec<String> {
        self.store.aliases_of(&self.store.canonical_name(name))
    }

    pub fn canonical_name(&self, name: &str) -> String {
        self.store.canonical_name(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.store.get(name)
    }

    /// Descriptor names in registration order
    pub fn component_names(&self) -> Vec<String> {
        self.store.names()
    }

    /// Whether a descriptor or a singleton exists under `name`
    pub fn contains(&self, name: &str) -> bool {
        let canonical = self.store.canonical_name(name);
        self.store.contains(&canonical) || self.registry.contains_singleton(&canonical)
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.registry
            .contains_singleton(&self.store.canonical_name(name))
    }

    pub fn is_singleton(&self, name: &str) -> Result<bool> {
        let canonical = self.store.canonical_name(name);
        match self.store.get(&canonical) {
            Some(descriptor) => Ok(descriptor.is_singleton()),
            None if self.registry.contains_singleton(&canonical) => Ok(true),
            None => Err(ContainerError::NoSuchComponent(name.to_string())),
        }
    }

    pub fn is_prototype(&self, name: &str) -> Result<bool> {
        self.is_singleton(name).map(|singleton| !singleton)
    }

    /// The component under `name`, created on demand
    pub fn get(&self, name: &str) -> Result<Object> {
        self.do_get(name, None)
    }

    /// The component under `name`, checked against `required`
    pub fn get_typed(&self, name: &str, required: &TypeRef) -> Result<Object> {
        let object = self.get(name)?;
        if required.accepts_class(object.class()) {
            Ok(object)
        } else {
            Err(ContainerError::NotOfRequiredType {
                component: name.to_string(),
                required: required.to_string(),
                actual: object.class_name().to_string(),
            })
        }
    }

    /// Create the component with explicit constructor or factory-method arguments.
    ///
    /// A singleton that already exists is returned as is.
    pub fn get_with_args(&self, name: &str, args: Vec<Value>) -> Result<Object> {
        self.do_get(name, Some(args))
    }

    /// Register an instance built outside the container
    pub fn register_singleton(&self, name: &str, object: Object) -> Result<()> {
        self.registry.register_singleton(name, object)?;
        self.store.clear_type_cache();
        Ok(())
    }

    /// Inject `object` wherever a dependency of type `ty` is resolved
    pub fn register_resolvable_dependency(&self, ty: TypeRef, object: Object) {
        debug!(ty = %ty, object = ?object, "Registered resolvable dependency");
        self.resolvable.write().push((ty, object));
    }

    /// Never autowire properties of type `ty`
    pub fn ignore_dependency_type(&self, ty: TypeRef) {
        self.ignored_types.write().push(ty);
    }

    pub(crate) fn is_ignored_dependency_type(&self, ty: &TypeRef) -> bool {
        self.ignored_types.read().iter().any(|ignored| ignored == ty)
    }

    pub fn add_hook(&self, hook: Arc<dyn LifecycleHook>) {
        debug!(hook = hook.name(), "Added lifecycle hook");
        self.hooks.add(hook);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Components depending on `name`
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.registry
            .dependents_of(&self.store.canonical_name(name))
    }

    /// Components `name` depends on
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.registry
            .dependencies_of(&self.store.canonical_name(name))
    }

    /// Ready singleton names in creation order
    pub fn singleton_names(&self) -> Vec<String> {
        self.registry.singleton_names()
    }

    /// Refuse further registrations; type lookups are cached from now on
    pub fn freeze_configuration(&self) {
        self.store.freeze();
    }

    pub fn is_configuration_frozen(&self) -> bool {
        self.store.is_frozen()
    }

    /// Create every non-lazy singleton, in registration order
    pub fn preinstantiate_singletons(&self) -> Result<()> {
        let names = self.store.names();
        debug!(count = names.len(), "Pre-instantiating singletons");
        for name in names {
            let Some(descriptor) = self.store.get(&name) else {
                continue;
            };
            if descriptor.is_singleton() && !descriptor.lazy_init {
                self.get(&name)?;
            }
        }
        Ok(())
    }

    /// Destroy one singleton and everything depending on it
    pub fn destroy_singleton(&self, name: &str) {
        self.registry
            .destroy_singleton(&self.store.canonical_name(name));
    }

    pub fn destroy_singletons(&self) {
        self.registry.destroy_singletons();
    }

    /// Destroy every singleton and clear the container-owned tables
    pub fn close(&self) {
        info!(singletons = self.registry.singleton_count(), "Closing container");
        self.registry.destroy_singletons();
        self.resolvable.write().clear();
        self.ignored_types.write().clear();
        self.store.clear_type_cache();
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles a [`Container`] with custom collaborators
#[derive(Default)]
pub struct ContainerBuilder {
    config: Option<ContainerConfig>,
    loader: Option<Arc<ClassLoader>>,
    converter: Option<Arc<dyn TypeConverter>>,
    evaluator: Option<Arc<dyn ValueEvaluator>>,
}

impl ContainerBuilder {
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn class_loader(mut self, loader: Arc<ClassLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn ValueEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn build(self) -> Container {
        let config = self.config.unwrap_or_default();
        Container {
            store: DescriptorStore::new(config.allow_descriptor_overriding),
            registry: SingletonRegistry::new(),
            hooks: HookRegistry::new(),
            loader: self
                .loader
                .unwrap_or_else(|| Arc::new(ClassLoader::with_discovered())),
            converter: self
                .converter
                .unwrap_or_else(|| Arc::new(DefaultTypeConverter::new())),
            evaluator: self
                .evaluator
                .unwrap_or_else(|| Arc::new(LiteralEvaluator)),
            resolvable: RwLock::new(Vec::new()),
            ignored_types: RwLock::new(Vec::new()),
            prototypes_in_creation: Mutex::new(HashMap::new()),
            config: RwLock::new(config),
        }
    }
}
