//! Dependency resolution: finding the component for an injection point
//!
//! Resolution order for a single-valued dependency:
//!
//! 1. objects registered with
//!    [`register_resolvable_dependency`](Container::register_resolvable_dependency)
//! 2. components whose (predicted) type matches, minus self references, components
//!    flagged as not autowire candidates and qualifier mismatches
//! 3. when nothing is left, the self references after all
//! 4. among several candidates: the primary one, then the highest priority, then the
//!    one named like the injection point
//!
//! List and map dependencies collect every candidate, ordered by priority.

use std::cmp::Reverse;
use std::sync::Arc;

use sprig_core::{ClassInfo, Object, Param, TypeRef, Value};
use tracing::debug;

use crate::container::Container;
use crate::error::{ContainerError, Result};

/// Metadata for one injection point
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyDescriptor {
    pub required_type: TypeRef,
    /// Parameter or property name, used as the last tie-break
    pub name: Option<String>,
    /// A required dependency without candidates is an error
    pub required: bool,
    /// Type lookups may create components to determine their type
    pub eager: bool,
    pub qualifier: Option<String>,
    /// Description of the injection point for error messages
    pub injection_point: String,
}

impl DependencyDescriptor {
    pub fn new(required_type: TypeRef) -> Self {
        let injection_point = format!("dependency of type '{}'", required_type);
        Self {
            required_type,
            name: None,
            required: true,
            eager: true,
            qualifier: None,
            injection_point,
        }
    }

    pub fn for_parameter(param: &Param, index: usize) -> Self {
        let injection_point = match &param.name {
            Some(name) => format!("parameter {} ('{}')", index, name),
            None => format!("parameter {}", index),
        };
        Self {
            name: param.name.clone(),
            required: !param.optional,
            injection_point,
            ..Self::new(param.ty.clone())
        }
    }

    pub fn for_property(name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        Self {
            injection_point: format!("property '{}'", name),
            name: Some(name),
            ..Self::new(ty)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.eager = false;
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Container {
    /// Resolve `dependency` on behalf of `requester`.
    ///
    /// Returns `None` for an optional dependency without candidates. Every resolved
    /// component is recorded as a dependency of `requester`.
    pub fn resolve_dependency(
        &self,
        dependency: &DependencyDescriptor,
        requester: Option<&str>,
    ) -> Result<Option<Value>> {
        let required = &dependency.required_type;
        if let Some(element) = required.element_type() {
            return self.resolve_multiple(dependency, element, requester);
        }

        if let Some(object) = self.resolvable_for(required) {
            return Ok(Some(Value::Object(object)));
        }

        let candidates = self.find_autowire_candidates(requester, required, dependency, false);
        let name = match candidates.len() {
            0 => {
                if dependency.required {
                    return Err(no_candidate(dependency, requester));
                }
                return Ok(None);
            }
            1 => candidates[0].clone(),
            _ => match self.determine_autowire_candidate(&candidates, dependency)? {
                Some(name) => name,
                None => {
                    return Err(ContainerError::NoUniqueComponent {
                        required: required.to_string(),
                        candidates,
                    })
                }
            },
        };

        let object = self.get(&name)?;
        if let Some(requester) = requester {
            self.registry.register_dependent(&name, requester);
        }
        if !required.accepts_class(object.class()) {
            return Err(ContainerError::NotOfRequiredType {
                component: name,
                required: required.to_string(),
                actual: object.class_name().to_string(),
            });
        }
        debug!(
            component = %name,
            requester = requester.unwrap_or("-"),
            ty = %required,
            "Autowired dependency by type"
        );
        Ok(Some(Value::Object(object)))
    }

    /// The single component matching `required`
    pub fn get_by_type(&self, required: &TypeRef) -> Result<Object> {
        let dependency = DependencyDescriptor::new(required.clone());
        match self.resolve_dependency(&dependency, None)? {
            Some(Value::Object(object)) => Ok(object),
            _ => Err(ContainerError::NoSuchComponentOfType {
                required: required.to_string(),
                requester: None,
            }),
        }
    }

    /// Every component matching `required`, in registration order
    pub fn get_all_of_type(&self, required: &TypeRef) -> Result<Vec<(String, Object)>> {
        self.names_for_type(required)
            .into_iter()
            .map(|name| {
                let object = self.get(&name)?;
                Ok((name, object))
            })
            .collect()
    }

    /// Names of components whose type matches `required`, without creating them
    pub fn names_for_type(&self, required: &TypeRef) -> Vec<String> {
        let allow_eager_init = self.config.read().allow_eager_init;
        self.names_for_type_internal(required, allow_eager_init)
    }

    fn names_for_type_internal(&self, required: &TypeRef, allow_eager_init: bool) -> Vec<String> {
        let key = format!("{}|{}", required, allow_eager_init);
        if let Some(cached) = self.store.cached_type_lookup(&key) {
            return cached;
        }
        let mut names: Vec<String> = self
            .store
            .names()
            .into_iter()
            .filter(|name| self.matches_type(name, required, allow_eager_init))
            .collect();
        for name in self.registry.singleton_names() {
            if !self.store.contains(&name)
                && !names.contains(&name)
                && self.matches_type(&name, required, false)
            {
                names.push(name);
            }
        }
        self.store.cache_type_lookup(&key, &names);
        names
    }

    /// Whether the component under `name` can be bound to `required`
    pub fn is_type_match(&self, name: &str, required: &TypeRef) -> bool {
        let canonical = self.store.canonical_name(name);
        self.matches_type(&canonical, required, false)
    }

    /// Class of the component under `name`: the actual class when it exists,
    /// the predicted class otherwise
    pub fn type_of(&self, name: &str) -> Option<Arc<ClassInfo>> {
        let canonical = self.store.canonical_name(name);
        if let Ok(Some(object)) = self.registry.get(&canonical, false) {
            return Some(object.class().clone());
        }
        self.predict_class(&canonical)
    }

    fn matches_type(&self, name: &str, required: &TypeRef, allow_eager_init: bool) -> bool {
        if let Ok(Some(object)) = self.registry.get(name, false) {
            return required.accepts_class(object.class());
        }
        if let Some(class) = self.predict_class(name) {
            return required.accepts_class(&class);
        }
        // Only creating the component reveals its type
        let eligible = allow_eager_init
            && self
                .store
                .get(name)
                .map_or(false, |d| d.is_singleton() && !d.lazy_init);
        if eligible {
            match self.get(name) {
                Ok(object) => return required.accepts_class(object.class()),
                Err(err) => {
                    debug!(component = %name, error = %err, "Eager creation during type lookup failed");
                }
            }
        }
        false
    }

    /// Class the descriptor under `name` will produce, if known without creating it
    pub(crate) fn predict_class(&self, name: &str) -> Option<Arc<ClassInfo>> {
        let descriptor = self.store.get(name)?;
        if let Some(method) = &descriptor.factory_method_name {
            let factory_class = match &descriptor.factory_component_name {
                Some(factory) if factory != name => self.type_of(factory)?,
                Some(_) => return None,
                None => self.loader.load(descriptor.class_name.as_deref()?).ok()?,
            };
            let return_type = factory_class
                .factory_methods()
                .iter()
                .find(|m| &m.name == method)?
                .return_type
                .clone();
            return self.loader.load(return_type.class_name()?).ok();
        }
        self.loader.load(descriptor.class_name.as_deref()?).ok()
    }

    fn resolvable_for(&self, required: &TypeRef) -> Option<Object> {
        self.resolvable
            .read()
            .iter()
            .find(|(ty, object)| {
                required.accepts_class(object.class())
                    && (ty == required || ty.is_assignable_from(required))
            })
            .map(|(_, object)| object.clone())
    }

    fn find_autowire_candidates(
        &self,
        requester: Option<&str>,
        required: &TypeRef,
        dependency: &DependencyDescriptor,
        multiple: bool,
    ) -> Vec<String> {
        let allow_eager_init = dependency.eager && self.config.read().allow_eager_init;
        let names = self.names_for_type_internal(required, allow_eager_init);
        let candidates: Vec<String> = names
            .iter()
            .filter(|name| {
                !self.is_self_reference(requester, name)
                    && self.is_autowire_candidate(name, dependency)
            })
            .cloned()
            .collect();
        if !candidates.is_empty() {
            return candidates;
        }
        // Fall back to self references; a collection never contains its requester
        names
            .into_iter()
            .filter(|name| {
                self.is_self_reference(requester, name)
                    && !(multiple && requester == Some(name.as_str()))
                    && self.is_autowire_candidate(name, dependency)
            })
            .collect()
    }

    /// `candidate` is `requester` itself or produced by a factory method of it
    fn is_self_reference(&self, requester: Option<&str>, candidate: &str) -> bool {
        let Some(requester) = requester else {
            return false;
        };
        if requester == candidate {
            return true;
        }
        self.store
            .get(candidate)
            .and_then(|d| d.factory_component_name.clone())
            .map_or(false, |factory| self.store.canonical_name(&factory) == requester)
    }

    fn is_autowire_candidate(&self, name: &str, dependency: &DependencyDescriptor) -> bool {
        let descriptor = self.store.get(name);
        if descriptor.as_ref().map_or(false, |d| !d.autowire_candidate) {
            return false;
        }
        let Some(qualifier) = &dependency.qualifier else {
            return true;
        };
        name == qualifier
            || descriptor
                .as_ref()
                .map_or(false, |d| d.qualifiers.iter().any(|q| q == qualifier))
            || self.store.aliases_of(name).iter().any(|alias| alias == qualifier)
    }

    fn priority_of(&self, name: &str) -> Option<i32> {
        self.store.get(name).and_then(|d| d.priority)
    }

    fn determine_autowire_candidate(
        &self,
        candidates: &[String],
        dependency: &DependencyDescriptor,
    ) -> Result<Option<String>> {
        let required = dependency.required_type.to_string();

        let primaries: Vec<String> = candidates
            .iter()
            .filter(|name| self.store.get(name).map_or(false, |d| d.primary))
            .cloned()
            .collect();
        match primaries.len() {
            0 => {}
            1 => return Ok(primaries.into_iter().next()),
            _ => {
                return Err(ContainerError::MultiplePrimary {
                    required,
                    candidates: primaries,
                })
            }
        }

        if let Some(name) = self.highest_priority_candidate(candidates, &required)? {
            return Ok(Some(name));
        }

        if let Some(wanted) = &dependency.name {
            for candidate in candidates {
                if candidate == wanted || self.store.aliases_of(candidate).contains(wanted) {
                    return Ok(Some(candidate.clone()));
                }
            }
        }
        Ok(None)
    }

    fn highest_priority_candidate(
        &self,
        candidates: &[String],
        required: &str,
    ) -> Result<Option<String>> {
        let mut best: Option<(String, i32)> = None;
        let mut tied: Vec<String> = Vec::new();
        for candidate in candidates {
            let Some(priority) = self.priority_of(candidate) else {
                continue;
            };
            match &best {
                Some((_, highest)) if priority < *highest => {}
                Some((_, highest)) if priority == *highest => tied.push(candidate.clone()),
                _ => {
                    best = Some((candidate.clone(), priority));
                    tied.clear();
                }
            }
        }
        match best {
            Some((name, priority)) if !tied.is_empty() => {
                let mut candidates = vec![name];
                candidates.extend(tied);
                Err(ContainerError::PriorityTie {
                    required: required.to_string(),
                    priority,
                    candidates,
                })
            }
            Some((name, _)) => Ok(Some(name)),
            None => Ok(None),
        }
    }

    fn resolve_multiple(
        &self,
        dependency: &DependencyDescriptor,
        element: &TypeRef,
        requester: Option<&str>,
    ) -> Result<Option<Value>> {
        let names = self.find_autowire_candidates(requester, element, dependency, true);
        if names.is_empty() {
            if dependency.required {
                return Err(no_candidate(dependency, requester));
            }
            return Ok(None);
        }

        let mut entries = names
            .into_iter()
            .map(|name| {
                let object = self.get(&name)?;
                Ok((name, object))
            })
            .collect::<Result<Vec<(String, Object)>>>()?;
        entries.sort_by_key(|(name, _)| match self.priority_of(name) {
            Some(priority) => (0, Reverse(priority)),
            None => (1, Reverse(0)),
        });
        if let Some(requester) = requester {
            for (name, _) in &entries {
                self.registry.register_dependent(name, requester);
            }
        }

        let value = match &dependency.required_type {
            TypeRef::Map(_) => Value::Map(
                entries
                    .into_iter()
                    .map(|(name, object)| (name, Value::Object(object)))
                    .collect(),
            ),
            _ => Value::List(
                entries
                    .into_iter()
                    .map(|(_, object)| Value::Object(object))
                    .collect(),
            ),
        };
        Ok(Some(self.converter.convert(value, &dependency.required_type)?))
    }
}

fn no_candidate(dependency: &DependencyDescriptor, requester: Option<&str>) -> ContainerError {
    ContainerError::NoSuchComponentOfType {
        required: dependency.required_type.to_string(),
        requester: requester.map(str::to_string),
    }
}
