//! Auto-discovered component registration using the inventory crate
//!
//! Any linked crate can contribute descriptors, classes or hooks to a container by
//! submitting a [`ComponentRegistration`]:
//!
//! ```rust,ignore
//! use sprig_container::{ComponentDescriptor, ComponentRegistration};
//!
//! inventory::submit! {
//!     ComponentRegistration::new("storage", |container| {
//!         container.register("store", ComponentDescriptor::for_class("FileStore"))?;
//!         Ok(())
//!     })
//! }
//! ```
//!
//! [`register_all_discovered_components`] runs every submitted registration.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::container::Container;
use crate::error::{ContainerError, Result};

/// A group of registrations collected via inventory
pub struct ComponentRegistration {
    /// Name of the registration group (e.g. "storage", "web")
    pub name: &'static str,

    /// Registers the group's classes, descriptors and hooks
    pub register_fn: fn(&Container) -> Result<()>,

    /// Registration order (lower = earlier, default = 100)
    pub priority: u32,

    /// Groups that must be registered first
    pub dependencies: &'static [&'static str],
}

impl ComponentRegistration {
    pub const fn new(name: &'static str, register_fn: fn(&Container) -> Result<()>) -> Self {
        Self {
            name,
            register_fn,
            priority: 100,
            dependencies: &[],
        }
    }

    pub const fn with_priority(
        name: &'static str,
        register_fn: fn(&Container) -> Result<()>,
        priority: u32,
    ) -> Self {
        Self {
            name,
            register_fn,
            priority,
            dependencies: &[],
        }
    }

    pub const fn with_dependencies(
        name: &'static str,
        register_fn: fn(&Container) -> Result<()>,
        dependencies: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            register_fn,
            priority: 100,
            dependencies,
        }
    }

    pub const fn full(
        name: &'static str,
        register_fn: fn(&Container) -> Result<()>,
        priority: u32,
        dependencies: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            register_fn,
            priority,
            dependencies,
        }
    }
}

inventory::collect!(ComponentRegistration);

/// Run every discovered registration against `container`.
///
/// Registrations run by ascending priority; a group whose dependencies have not
/// run yet is deferred until they have.
pub fn register_all_discovered_components(container: &Container) -> Result<()> {
    let mut pending: Vec<&ComponentRegistration> =
        inventory::iter::<ComponentRegistration>().collect();
    pending.sort_by_key(|r| r.priority);
    let known: HashSet<&str> = pending.iter().map(|r| r.name).collect();

    info!(
        "Discovered {} component registrations via inventory",
        pending.len()
    );

    let mut done: HashSet<&str> = HashSet::new();
    while !pending.is_empty() {
        let position = pending.iter().position(|r| {
            r.dependencies
                .iter()
                .all(|d| done.contains(d) || !known.contains(d))
        });
        let Some(position) = position else {
            let names: Vec<&str> = pending.iter().map(|r| r.name).collect();
            return Err(ContainerError::Validation(format!(
                "circular dependencies between registration groups: {}",
                names.join(", ")
            )));
        };
        let registration = pending.remove(position);
        if let Some(missing) = registration.dependencies.iter().find(|d| !known.contains(*d)) {
            return Err(ContainerError::Validation(format!(
                "registration group '{}' depends on unknown group '{}'",
                registration.name, missing
            )));
        }
        debug!(
            "Registering components for '{}' (priority: {})",
            registration.name, registration.priority
        );
        (registration.register_fn)(container)?;
        done.insert(registration.name);
    }

    info!("All discovered components registered successfully");
    Ok(())
}

pub fn discovered_registration_count() -> usize {
    inventory::iter::<ComponentRegistration>().count()
}

/// Names of all discovered registration groups
pub fn list_discovered_registrations() -> Vec<&'static str> {
    inventory::iter::<ComponentRegistration>()
        .map(|r| r.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ComponentDescriptor;
    use sprig_core::{ClassInfo, Object};

    inventory::submit! {
        ComponentRegistration::with_dependencies("test_consumers", |container| {
            container.register(
                "registrationConsumer",
                ComponentDescriptor::for_class("RegistrationProbe").depends_on("registrationProbe"),
            )
        }, &["test_fixtures"])
    }

    inventory::submit! {
        ComponentRegistration::with_priority("test_fixtures", |container| {
            container.define_class(
                ClassInfo::builder("RegistrationProbe")
                    .constructor(vec![], |_| Ok(()))
                    .build(),
            )?;
            container.register_singleton(
                "registrationProbe",
                Object::new(container.class_loader().load("RegistrationProbe")?, ()),
            )
        }, 500)
    }

    #[test]
    fn test_discovered_registrations_include_test_groups() {
        let names = list_discovered_registrations();
        assert!(names.contains(&"test_fixtures"));
        assert!(names.contains(&"test_consumers"));
        assert!(discovered_registration_count() >= 2);
    }

    #[test]
    fn test_dependencies_registered_first() {
        let container = Container::new();
        register_all_discovered_components(&container).unwrap();
        assert!(container.contains("registrationProbe"));
        assert!(container.descriptor("registrationConsumer").is_some());
    }
}
