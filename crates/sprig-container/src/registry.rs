//! Singleton registry: staged singleton cache and destruction bookkeeping
//!
//! Every singleton name owns at most one [`Slot`]:
//!
//! - `InCreation(Some(factory))`: creation started and an early-reference factory is
//!   installed
//! - `InCreation(None)`: creation started, no early reference available (yet)
//! - `EarlyExposed(object)`: the factory ran; the early reference is handed out to
//!   anyone asking while creation is still in progress
//! - `Ready(object)`: the final singleton
//!
//! A missing slot means the singleton was never requested, or was destroyed. All
//! state sits behind one re-entrant lock: creation recurses on the creating thread,
//! while other threads asking for any singleton wait until the outermost creation
//! finishes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use parking_lot::ReentrantMutex;
use sprig_core::Object;
use tracing::{debug, warn};

use crate::error::{ContainerError, Result};

/// Produces an early reference to a singleton that is still being created
pub type EarlyReferenceFactory = Box<dyn FnOnce() -> Result<Object> + Send>;

/// Releases the resources of a singleton
pub type DestructionCallback = Box<dyn FnOnce() -> Result<()> + Send>;

enum Slot {
    InCreation(Option<EarlyReferenceFactory>),
    EarlyExposed(Object),
    Ready(Object),
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<String, Slot>,
    /// Names of ready singletons in the order they became ready
    ready_order: Vec<String>,
    /// name -> components depending on it
    dependents: HashMap<String, Vec<String>>,
    /// name -> components it depends on
    dependencies: HashMap<String, HashSet<String>>,
    /// containing component -> contained components
    contained: HashMap<String, Vec<String>>,
    disposables: Vec<(String, DestructionCallback)>,
    creation_check_exclusions: HashSet<String>,
    in_destruction: bool,
}

/// Shared singleton instances and the relationships between them
pub struct SingletonRegistry {
    state: ReentrantMutex<RefCell<RegistryState>>,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(RegistryState::default())),
        }
    }

    /// Look up a singleton without creating it.
    ///
    /// Ready singletons are returned directly. A singleton in creation yields its early
    /// reference if one was produced before; otherwise, with `allow_early_reference`,
    /// the installed factory runs once and its product is kept as the early reference.
    pub fn get(&self, name: &str, allow_early_reference: bool) -> Result<Option<Object>> {
        let guard = self.state.lock();
        let factory = {
            let mut state = guard.borrow_mut();
            match state.slots.get_mut(name) {
                Some(Slot::Ready(object)) | Some(Slot::EarlyExposed(object)) => {
                    return Ok(Some(object.clone()))
                }
                Some(Slot::InCreation(factory)) if allow_early_reference => factory.take(),
                _ => None,
            }
        };
        let Some(factory) = factory else {
            return Ok(None);
        };
        let early = factory()?;
        debug!(component = %name, "Exposing early reference");
        guard
            .borrow_mut()
            .slots
            .insert(name.to_string(), Slot::EarlyExposed(early.clone()));
        Ok(Some(early))
    }

    /// Return the ready singleton, or create it with `factory`.
    ///
    /// The name is marked in creation while `factory` runs; asking for a name that is
    /// already marked fails with [`ContainerError::CurrentlyInCreation`]. On failure
    /// the mark is removed and nothing is cached.
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> Result<Object>
    where
        F: FnOnce() -> Result<Object>,
    {
        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            if let Some(Slot::Ready(object)) = state.slots.get(name) {
                return Ok(object.clone());
            }
            if state.in_destruction {
                return Err(ContainerError::CreationNotAllowed(name.to_string()));
            }
            let excluded = state.creation_check_exclusions.contains(name);
            if state.slots.contains_key(name) && !excluded {
                return Err(ContainerError::CurrentlyInCreation(name.to_string()));
            }
            debug!(component = %name, "Creating shared instance of singleton");
            state
                .slots
                .insert(name.to_string(), Slot::InCreation(None));
        }

        let result = factory();

        let mut state = guard.borrow_mut();
        match result {
            Ok(object) => {
                state
                    .slots
                    .insert(name.to_string(), Slot::Ready(object.clone()));
                if !state.ready_order.iter().any(|n| n == name) {
                    state.ready_order.push(name.to_string());
                }
                Ok(object)
            }
            Err(err) => {
                state.slots.remove(name);
                Err(err)
            }
        }
    }

    /// Install the early-reference factory for a singleton in creation
    pub fn register_early_factory(&self, name: &str, factory: EarlyReferenceFactory) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(Slot::InCreation(slot)) = state.slots.get_mut(name) {
            *slot = Some(factory);
        }
    }

    /// Register an instance built outside the container
    pub fn register_singleton(&self, name: &str, object: Object) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.slots.contains_key(name) {
            return Err(ContainerError::DuplicateSingleton(name.to_string()));
        }
        state.slots.insert(name.to_string(), Slot::Ready(object));
        state.ready_order.push(name.to_string());
        debug!(component = %name, "Registered singleton");
        Ok(())
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        matches!(state.slots.get(name), Some(Slot::Ready(_)))
    }

    /// Ready singleton names in creation order
    pub fn singleton_names(&self) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.ready_order.clone()
    }

    pub fn singleton_count(&self) -> usize {
        self.singleton_names().len()
    }

    pub fn is_in_creation(&self, name: &str) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        matches!(
            state.slots.get(name),
            Some(Slot::InCreation(_)) | Some(Slot::EarlyExposed(_))
        )
    }

    /// Exclude `name` from the in-creation check of [`get_or_create`](Self::get_or_create)
    pub fn set_creation_check_excluded(&self, name: &str, excluded: bool) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if excluded {
            state.creation_check_exclusions.insert(name.to_string());
        } else {
            state.creation_check_exclusions.remove(name);
        }
    }

    pub fn is_in_destruction(&self) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.in_destruction
    }

    /// Record that `dependent` uses `name`; `name` is destroyed after `dependent`
    pub fn register_dependent(&self, name: &str, dependent: &str) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let dependents = state.dependents.entry(name.to_string()).or_default();
        if !dependents.iter().any(|d| d == dependent) {
            dependents.push(dependent.to_string());
        }
        state
            .dependencies
            .entry(dependent.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// Forget that `dependent` uses `name`
    pub fn remove_dependent(&self, name: &str, dependent: &str) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(dependents) = state.dependents.get_mut(name) {
            dependents.retain(|d| d != dependent);
            if dependents.is_empty() {
                state.dependents.remove(name);
            }
        }
        if let Some(dependencies) = state.dependencies.get_mut(dependent) {
            dependencies.remove(name);
            if dependencies.is_empty() {
                state.dependencies.remove(dependent);
            }
        }
    }

    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.dependents.get(name).cloned().unwrap_or_default()
    }

    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        let mut names: Vec<String> = state
            .dependencies
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Whether `dependent` depends on `name`, directly or transitively
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        let mut seen = HashSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(dependents) = state.dependents.get(&current) {
                if dependents.iter().any(|d| d == dependent) {
                    return true;
                }
                pending.extend(dependents.iter().cloned());
            }
        }
        false
    }

    /// Record that `containing` owns `contained`; the contained component is destroyed
    /// after its owner
    pub fn register_contained(&self, contained: &str, containing: &str) {
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            let entries = state.contained.entry(containing.to_string()).or_default();
            if !entries.iter().any(|c| c == contained) {
                entries.push(contained.to_string());
            }
        }
        self.register_dependent(contained, containing);
    }

    /// Register the destruction callback of a singleton; callbacks run in reverse order
    pub fn register_disposable(&self, name: &str, callback: DestructionCallback) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.disposables.retain(|(n, _)| n != name);
        state.disposables.push((name.to_string(), callback));
    }

    pub fn has_disposable(&self, name: &str) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.disposables.iter().any(|(n, _)| n == name)
    }

    /// Destroy `name`: its dependents first, then the singleton itself, then the
    /// components it contains. Destroying an unknown name does nothing.
    pub fn destroy_singleton(&self, name: &str) {
        let guard = self.state.lock();
        let (callback, dependents) = {
            let mut state = guard.borrow_mut();
            state.slots.remove(name);
            state.ready_order.retain(|n| n != name);
            let position = state.disposables.iter().position(|(n, _)| n == name);
            let callback = position.map(|index| state.disposables.remove(index).1);
            let dependents = state.dependents.remove(name).unwrap_or_default();
            (callback, dependents)
        };

        for dependent in dependents {
            self.destroy_singleton(&dependent);
        }

        if let Some(callback) = callback {
            debug!(component = %name, "Destroying singleton");
            if let Err(err) = callback() {
                warn!(component = %name, error = %err, "Destruction callback failed");
            }
        }

        let contained = guard.borrow_mut().contained.remove(name).unwrap_or_default();
        for inner in contained {
            self.destroy_singleton(&inner);
        }

        let mut state = guard.borrow_mut();
        for dependents in state.dependents.values_mut() {
            dependents.retain(|d| d != name);
        }
        state.dependents.retain(|_, dependents| !dependents.is_empty());
        state.dependencies.remove(name);
    }

    /// Destroy every singleton, in reverse registration order of their callbacks
    pub fn destroy_singletons(&self) {
        let guard = self.state.lock();
        let names: Vec<String> = {
            let mut state = guard.borrow_mut();
            state.in_destruction = true;
            state.disposables.iter().rev().map(|(n, _)| n.clone()).collect()
        };
        debug!(count = names.len(), "Destroying singletons");
        for name in names {
            self.destroy_singleton(&name);
        }

        let mut state = guard.borrow_mut();
        state.slots.clear();
        state.ready_order.clear();
        state.dependents.clear();
        state.dependencies.clear();
        state.contained.clear();
        state.in_destruction = false;
    }
}

impl Default for SingletonRegistry {
    fn default() -> Self {
        Self::new()
    }
}
