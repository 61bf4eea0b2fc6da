//! Component lifecycle: lookup, creation, population, initialisation, disposal
//!
//! A singleton goes through these steps on first request:
//!
//! 1. `depends_on` components are created first
//! 2. hooks may short-circuit instantiation
//! 3. the raw instance is built and, with circular references allowed, an
//!    early-reference factory is installed for it
//! 4. properties are populated (explicit values, then autowiring)
//! 5. aware callbacks, init hooks and init methods run; hooks may wrap the object
//! 6. the exposed object is reconciled with any early reference already handed out
//! 7. destruction callbacks are registered

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use sprig_core::{
    ClassInfo, InvocationError, Object, TypeRef, Value, AFTER_PROPERTIES_SET,
    COMPONENT_NAME_AWARE, DESTROY, DISPOSABLE, INITIALIZING, SET_COMPONENT_NAME,
};
use tracing::{debug, warn};

use crate::container::Container;
use crate::descriptor::{AutowireMode, ComponentDescriptor, DescriptorValue, PropertyValues};
use crate::error::{ContainerError, Result};
use crate::hooks::apply_early_reference;
use crate::instantiation::ConstructorResolver;
use crate::resolver::DependencyDescriptor;

/// Marks a prototype as in creation on the current thread until dropped
struct PrototypeGuard<'a> {
    in_creation: &'a Mutex<HashMap<ThreadId, Vec<String>>>,
    name: String,
}

impl<'a> PrototypeGuard<'a> {
    fn enter(in_creation: &'a Mutex<HashMap<ThreadId, Vec<String>>>, name: &str) -> Self {
        in_creation
            .lock()
            .entry(thread::current().id())
            .or_default()
            .push(name.to_string());
        Self {
            in_creation,
            name: name.to_string(),
        }
    }
}

impl Drop for PrototypeGuard<'_> {
    fn drop(&mut self) {
        let mut in_creation = self.in_creation.lock();
        let id = thread::current().id();
        if let Some(names) = in_creation.get_mut(&id) {
            if let Some(position) = names.iter().rposition(|n| *n == self.name) {
                names.remove(position);
            }
            if names.is_empty() {
                in_creation.remove(&id);
            }
        }
    }
}

impl Container {
    pub(crate) fn do_get(&self, name: &str, args: Option<Vec<Value>>) -> Result<Object> {
        let name = self.store.canonical_name(name);

        if let Some(object) = self.registry.get(&name, args.is_none())? {
            if self.registry.is_in_creation(&name) {
                debug!(
                    component = %name,
                    "Returning early reference to singleton that is not fully initialised yet (circular reference)"
                );
            }
            return Ok(object);
        }

        if self.is_prototype_in_creation(&name) {
            return Err(ContainerError::CurrentlyInCreation(name));
        }

        let descriptor = self
            .store
            .get(&name)
            .ok_or_else(|| ContainerError::NoSuchComponent(name.clone()))?;

        for dependency in &descriptor.depends_on {
            let dependency = self.store.canonical_name(dependency);
            if self.registry.is_dependent(&name, &dependency) {
                return Err(ContainerError::CircularDependsOn {
                    component: name,
                    dependency,
                });
            }
            self.registry.register_dependent(&dependency, &name);
            self.do_get(&dependency, None)
                .map_err(|err| ContainerError::creation(&name, err))?;
        }

        if descriptor.is_singleton() {
            self.registry.get_or_create(&name, || {
                self.create_component(&name, &descriptor, args).map_err(|err| {
                    // Drop early references and dependents of the failed singleton
                    self.registry.destroy_singleton(&name);
                    ContainerError::creation(&name, err)
                })
            })
        } else {
            let _guard = PrototypeGuard::enter(&self.prototypes_in_creation, &name);
            self.create_component(&name, &descriptor, args)
                .map_err(|err| ContainerError::creation(&name, err))
        }
    }

    fn is_prototype_in_creation(&self, name: &str) -> bool {
        self.prototypes_in_creation
            .lock()
            .get(&thread::current().id())
            .map_or(false, |names| names.iter().any(|n| n == name))
    }

    fn create_component(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        args: Option<Vec<Value>>,
    ) -> Result<Object> {
        let class = match &descriptor.class_name {
            Some(class_name)
                if descriptor.instance_supplier.is_none()
                    && descriptor.factory_method_name.is_none() =>
            {
                Some(self.load_class(name, class_name)?)
            }
            _ => None,
        };

        if !descriptor.synthetic {
            let target = class.clone().or_else(|| self.predict_class(name));
            if let Some(target) = target {
                for hook in self.hooks.hooks() {
                    if let Some(object) = hook.before_instantiation(&target, name)? {
                        debug!(component = %name, hook = hook.name(), "Instantiation short-circuited by hook");
                        return self.apply_after_initialization(object, name);
                    }
                }
            }
        }

        self.do_create(name, descriptor, class.as_ref(), args)
    }

    fn do_create(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        class: Option<&Arc<ClassInfo>>,
        args: Option<Vec<Value>>,
    ) -> Result<Object> {
        let raw = ConstructorResolver::new(self).instantiate(name, descriptor, class, args)?;

        let early_exposure = descriptor.is_singleton()
            && self.config.read().allow_circular_references
            && self.registry.is_in_creation(name);
        if early_exposure {
            debug!(component = %name, "Eagerly caching component to allow for resolving potential circular references");
            let hooks = self.hooks.hooks();
            let early = raw.clone();
            let component = name.to_string();
            self.registry.register_early_factory(
                name,
                Box::new(move || apply_early_reference(&hooks, early, &component)),
            );
        }

        self.populate(name, descriptor, &raw)?;
        let mut exposed = self.initialize(name, descriptor, raw.clone())?;

        if early_exposure {
            exposed = self.reconcile_early_reference(name, &raw, exposed)?;
        }

        if descriptor.is_singleton() {
            self.register_disposable_if_necessary(name, descriptor, &raw)?;
        }
        debug!(component = %name, class = raw.class_name(), "Finished creating instance of component");
        Ok(exposed)
    }

    /// Make sure components holding the early reference see the final object
    fn reconcile_early_reference(&self, name: &str, raw: &Object, exposed: Object) -> Result<Object> {
        let Some(early) = self.registry.get(name, false)? else {
            return Ok(exposed);
        };
        if exposed.ptr_eq(raw) {
            return Ok(early);
        }
        if exposed.ptr_eq(&early) {
            return Ok(exposed);
        }
        let dependents = self.registry.dependents_of(name);
        if dependents.is_empty() {
            return Ok(exposed);
        }
        if self.config.read().allow_raw_injection_despite_wrapping {
            warn!(
                component = %name,
                dependents = ?dependents,
                "Raw early reference injected into other components, final object has been wrapped"
            );
            return Ok(exposed);
        }
        Err(ContainerError::RawReferenceWrapped {
            component: name.to_string(),
            dependents,
        })
    }

    fn populate(&self, name: &str, descriptor: &ComponentDescriptor, object: &Object) -> Result<()> {
        let hooks = if descriptor.synthetic {
            Vec::new()
        } else {
            self.hooks.hooks()
        };
        for hook in &hooks {
            if !hook.after_instantiation(object, name)? {
                debug!(component = %name, hook = hook.name(), "Property population skipped by hook");
                return Ok(());
            }
        }

        let mut properties = descriptor.property_values.clone();
        match descriptor.autowire_mode {
            AutowireMode::ByName => self.autowire_by_name(name, object, &mut properties),
            AutowireMode::ByType => self.autowire_by_type(name, object, &mut properties)?,
            AutowireMode::No | AutowireMode::Constructor => {}
        }

        for hook in &hooks {
            hook.post_process_properties(&mut properties, object, name)?;
        }
        self.apply_property_values(name, object, &properties)
    }

    /// Writable properties without a value whose type is a candidate for autowiring
    fn unsatisfied_properties(&self, object: &Object, properties: &PropertyValues) -> Vec<(String, TypeRef)> {
        object
            .class()
            .properties()
            .iter()
            .filter(|p| {
                !p.ty.is_simple()
                    && !self.is_ignored_dependency_type(&p.ty)
                    && !properties.iter().any(|(name, _)| *name == p.name)
            })
            .map(|p| (p.name.clone(), p.ty.clone()))
            .collect()
    }

    fn autowire_by_name(&self, name: &str, object: &Object, properties: &mut PropertyValues) {
        for (property, _) in self.unsatisfied_properties(object, properties) {
            if self.contains(&property) {
                debug!(component = %name, property = %property, "Autowiring by name");
                properties.push((property.clone(), DescriptorValue::Ref(property)));
            } else {
                debug!(component = %name, property = %property, "Not autowiring property by name: no matching component");
            }
        }
    }

    fn autowire_by_type(&self, name: &str, object: &Object, properties: &mut PropertyValues) -> Result<()> {
        for (property, ty) in self.unsatisfied_properties(object, properties) {
            if ty == TypeRef::Any {
                continue;
            }
            let dependency = DependencyDescriptor::for_property(&property, ty).optional();
            let resolved = self
                .resolve_dependency(&dependency, Some(name))
                .map_err(|source| ContainerError::UnsatisfiedDependency {
                    component: name.to_string(),
                    injection_point: dependency.injection_point.clone(),
                    source: Box::new(source),
                })?;
            if let Some(value) = resolved {
                properties.push((property, DescriptorValue::Literal(value)));
            }
        }
        Ok(())
    }

    fn apply_property_values(&self, name: &str, object: &Object, properties: &PropertyValues) -> Result<()> {
        for (property, value) in properties {
            let invalid = |source: InvocationError| ContainerError::InvalidProperty {
                component: name.to_string(),
                property: property.clone(),
                source,
            };
            let ty = object
                .class()
                .property(property)
                .map(|info| info.ty.clone())
                .ok_or_else(|| {
                    invalid(InvocationError::NoSuchProperty {
                        class: object.class_name().to_string(),
                        property: property.clone(),
                    })
                })?;
            let raw = self.resolve_value(name, value).map_err(|source| {
                ContainerError::UnsatisfiedDependency {
                    component: name.to_string(),
                    injection_point: format!("property '{}'", property),
                    source: Box::new(source),
                }
            })?;
            let converted = self.converter.convert(raw, &ty).map_err(invalid)?;
            object.set_property(property, converted).map_err(invalid)?;
        }
        Ok(())
    }

    /// Turn a configured value into a runtime value, creating referenced components
    pub(crate) fn resolve_value(&self, requester: &str, value: &DescriptorValue) -> Result<Value> {
        match value {
            DescriptorValue::Literal(literal) => Ok(literal.clone()),
            DescriptorValue::Ref(target) => {
                let target = self.store.canonical_name(target);
                let object = self.do_get(&target, None)?;
                self.registry.register_dependent(&target, requester);
                Ok(Value::Object(object))
            }
            DescriptorValue::List(items) => items
                .iter()
                .map(|item| self.resolve_value(requester, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            DescriptorValue::Map(entries) => entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.resolve_value(requester, item)?)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
            DescriptorValue::Expr(expression) => Ok(self.evaluator.evaluate(expression)?),
        }
    }

    fn initialize(&self, name: &str, descriptor: &ComponentDescriptor, object: Object) -> Result<Object> {
        if object.is_a(COMPONENT_NAME_AWARE) {
            object.invoke(SET_COMPONENT_NAME, vec![Value::from(name)])?;
        }

        let mut current = object;
        if !descriptor.synthetic {
            for hook in self.hooks.hooks() {
                current = hook.before_initialization(current, name)?;
            }
        }

        self.invoke_init_methods(name, descriptor, &current)?;

        if descriptor.synthetic {
            Ok(current)
        } else {
            self.apply_after_initialization(current, name)
        }
    }

    fn apply_after_initialization(&self, object: Object, name: &str) -> Result<Object> {
        self.hooks
            .hooks()
            .iter()
            .try_fold(object, |current, hook| hook.after_initialization(current, name))
    }

    fn invoke_init_methods(&self, name: &str, descriptor: &ComponentDescriptor, object: &Object) -> Result<()> {
        let initializing = object.is_a(INITIALIZING);
        if initializing {
            debug!(component = %name, "Invoking after_properties_set");
            object.invoke(AFTER_PROPERTIES_SET, vec![])?;
        }
        if let Some(method) = &descriptor.init_method {
            if initializing && method == AFTER_PROPERTIES_SET {
                return Ok(());
            }
            if object.class().method(method, 0).is_none() {
                return Err(ContainerError::InvalidDescriptor {
                    component: name.to_string(),
                    reason: format!("could not find an init method named '{}'", method),
                });
            }
            debug!(component = %name, method = %method, "Invoking init method");
            object.invoke(method, vec![])?;
        }
        Ok(())
    }

    fn register_disposable_if_necessary(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        raw: &Object,
    ) -> Result<()> {
        let hooks: Vec<_> = self
            .hooks
            .hooks()
            .into_iter()
            .filter(|hook| hook.requires_destruction(raw))
            .collect();
        let disposable = raw.is_a(DISPOSABLE);
        let destroy_method = descriptor
            .destroy_method
            .clone()
            .filter(|method| !(disposable && method == DESTROY));
        if let Some(method) = &destroy_method {
            if raw.class().method(method, 0).is_none() {
                return Err(ContainerError::InvalidDescriptor {
                    component: name.to_string(),
                    reason: format!("could not find a destroy method named '{}'", method),
                });
            }
        }
        if hooks.is_empty() && !disposable && destroy_method.is_none() {
            return Ok(());
        }

        let object = raw.clone();
        let component = name.to_string();
        self.registry.register_disposable(
            name,
            Box::new(move || {
                for hook in &hooks {
                    if let Err(err) = hook.before_destruction(&object, &component) {
                        warn!(component = %component, hook = hook.name(), error = %err, "Destruction hook failed");
                    }
                }
                if disposable {
                    if let Err(err) = object.invoke(DESTROY, vec![]) {
                        warn!(component = %component, error = %err, "Invocation of destroy failed");
                    }
                }
                if let Some(method) = &destroy_method {
                    if let Err(err) = object.invoke(method, vec![]) {
                        warn!(component = %component, method = %method, error = %err, "Invocation of destroy method failed");
                    }
                }
                Ok(())
            }),
        );
        Ok(())
    }

    pub(crate) fn load_class(&self, name: &str, class_name: &str) -> Result<Arc<ClassInfo>> {
        self.loader
            .load(class_name)
            .map_err(|_| ContainerError::ClassNotFound {
                component: name.to_string(),
                class: class_name.to_string(),
            })
    }
}
