//! Descriptor store: descriptors by name, aliases, overriding and freezing

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::descriptor::ComponentDescriptor;
use crate::error::{ContainerError, Result};

#[derive(Default)]
struct StoreState {
    descriptors: HashMap<String, Arc<ComponentDescriptor>>,
    order: Vec<String>,
    /// alias -> name (which may itself be an alias)
    aliases: HashMap<String, String>,
    frozen: bool,
}

/// Thread-safe registry of component descriptors
pub struct DescriptorStore {
    state: RwLock<StoreState>,
    allow_overriding: RwLock<bool>,
    /// Type lookups, only populated while frozen
    type_cache: Mutex<HashMap<String, Vec<String>>>,
}

impl DescriptorStore {
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            allow_overriding: RwLock::new(allow_overriding),
            type_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_allow_overriding(&self, allow: bool) {
        *self.allow_overriding.write() = allow;
    }

    pub fn is_overriding_allowed(&self) -> bool {
        *self.allow_overriding.read()
    }

    /// Register `descriptor` under `name`.
    ///
    /// An existing descriptor is replaced when overriding is allowed; the name keeps
    /// its original registration position.
    pub fn register(&self, name: &str, descriptor: ComponentDescriptor) -> Result<()> {
        if let Some(reason) = descriptor.validation_error() {
            return Err(ContainerError::InvalidDescriptor {
                component: name.to_string(),
                reason: reason.to_string(),
            });
        }
        let allow_overriding = self.is_overriding_allowed();
        let mut state = self.state.write();
        if state.frozen {
            return Err(ContainerError::ConfigurationFrozen(name.to_string()));
        }
        if let Some(existing) = state.descriptors.get(name) {
            if !allow_overriding {
                return Err(ContainerError::DescriptorOverride {
                    component: name.to_string(),
                    existing: format!("{:?}", existing.class_name),
                });
            }
            info!(component = %name, "Overriding component descriptor");
        } else {
            if state.aliases.contains_key(name) {
                if !allow_overriding {
                    return Err(ContainerError::DescriptorOverride {
                        component: name.to_string(),
                        existing: format!("alias for '{}'", state.aliases[name]),
                    });
                }
                state.aliases.remove(name);
            }
            state.order.push(name.to_string());
        }
        debug!(component = %name, class = ?descriptor.class_name, "Registered component descriptor");
        state
            .descriptors
            .insert(name.to_string(), Arc::new(descriptor));
        drop(state);
        self.type_cache.lock().clear();
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<Arc<ComponentDescriptor>> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(ContainerError::ConfigurationFrozen(name.to_string()));
        }
        let descriptor = state
            .descriptors
            .remove(name)
            .ok_or_else(|| ContainerError::NoSuchComponent(name.to_string()))?;
        state.order.retain(|n| n != name);
        drop(state);
        self.type_cache.lock().clear();
        Ok(descriptor)
    }

    /// Descriptor under the canonical form of `name`
    pub fn get(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        let canonical = self.canonical_name(name);
        self.state.read().descriptors.get(&canonical).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Descriptor names in registration order
    pub fn names(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make `alias` another name for `name`
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        let allow_overriding = self.is_overriding_allowed();
        let mut state = self.state.write();
        if alias == name {
            state.aliases.remove(alias);
            return Ok(());
        }
        if let Some(existing) = state.aliases.get(alias) {
            if existing == name {
                return Ok(());
            }
            if !allow_overriding {
                return Err(ContainerError::DescriptorOverride {
                    component: alias.to_string(),
                    existing: format!("alias for '{}'", existing),
                });
            }
        }
        if resolves_to(&state.aliases, name, alias) {
            return Err(ContainerError::InvalidDescriptor {
                component: alias.to_string(),
                reason: format!("cannot alias '{}' to '{}': circular alias chain", name, alias),
            });
        }
        debug!(alias = %alias, component = %name, "Registered alias");
        state.aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    pub fn remove_alias(&self, alias: &str) -> Result<()> {
        self.state
            .write()
            .aliases
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| ContainerError::NoSuchComponent(alias.to_string()))
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.state.read().aliases.contains_key(name)
    }

    /// Follow the alias chain from `name` to the registered name
    pub fn canonical_name(&self, name: &str) -> String {
        let state = self.state.read();
        let mut current = name;
        while let Some(target) = state.aliases.get(current) {
            current = target.as_str();
        }
        current.to_string()
    }

    /// All aliases eventually resolving to `name`
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let state = self.state.read();
        let mut aliases: Vec<String> = state
            .aliases
            .keys()
            .filter(|alias| resolves_to(&state.aliases, alias, name))
            .cloned()
            .collect();
        aliases.sort();
        aliases
    }

    /// Refuse further registrations and enable the type-lookup cache
    pub fn freeze(&self) {
        self.state.write().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    pub(crate) fn cached_type_lookup(&self, key: &str) -> Option<Vec<String>> {
        if !self.is_frozen() {
            return None;
        }
        self.type_cache.lock().get(key).cloned()
    }

    pub(crate) fn cache_type_lookup(&self, key: &str, names: &[String]) {
        if self.is_frozen() {
            self.type_cache.lock().insert(key.to_string(), names.to_vec());
        }
    }

    pub(crate) fn clear_type_cache(&self) {
        self.type_cache.lock().clear();
    }
}

/// Whether following aliases from `from` reaches `to`
fn resolves_to(aliases: &HashMap<String, String>, from: &str, to: &str) -> bool {
    let mut current = from;
    let mut steps = 0;
    while let Some(next) = aliases.get(current) {
        if next == to {
            return true;
        }
        current = next.as_str();
        steps += 1;
        if steps > aliases.len() {
            break;
        }
    }
    false
}
