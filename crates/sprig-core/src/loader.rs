//! Class loading by name
//!
//! Component descriptors reference their class by name; the [`ClassLoader`] resolves
//! those names to [`ClassInfo`] metadata. Classes are either defined explicitly or
//! discovered from [`ClassRegistration`] entries submitted with `inventory::submit!`
//! by any linked crate:
//!
//! ```rust,ignore
//! inventory::submit! {
//!     sprig_core::ClassRegistration::new("OrderService", order_service_class)
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::class::ClassInfo;
use crate::error::ClassError;

/// A class definition collected via inventory
pub struct ClassRegistration {
    /// Name the class is registered under
    pub name: &'static str,

    /// Builds the class metadata
    pub define_fn: fn() -> Arc<ClassInfo>,
}

impl ClassRegistration {
    pub const fn new(name: &'static str, define_fn: fn() -> Arc<ClassInfo>) -> Self {
        Self { name, define_fn }
    }
}

inventory::collect!(ClassRegistration);

/// Names of every discovered class registration
pub fn list_discovered_classes() -> Vec<&'static str> {
    inventory::iter::<ClassRegistration>
        .into_iter()
        .map(|r| r.name)
        .collect()
}

/// Number of discovered class registrations
pub fn discovered_class_count() -> usize {
    inventory::iter::<ClassRegistration>.into_iter().count()
}

/// Name-to-class resolution
#[derive(Default)]
pub struct ClassLoader {
    classes: RwLock<HashMap<String, Arc<ClassInfo>>>,
}

impl ClassLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader pre-populated with every class submitted through inventory
    pub fn with_discovered() -> Self {
        let loader = Self::new();
        for registration in inventory::iter::<ClassRegistration> {
            let class = (registration.define_fn)();
            debug!(class = registration.name, "Discovered class");
            loader
                .classes
                .write()
                .insert(registration.name.to_string(), class);
        }
        loader
    }

    /// Define a class under its own name.
    ///
    /// Redefining a name with the very same metadata is a no-op.
    pub fn define(&self, class: Arc<ClassInfo>) -> Result<(), ClassError> {
        let mut classes = self.classes.write();
        if let Some(existing) = classes.get(class.name()) {
            if Arc::ptr_eq(existing, &class) {
                return Ok(());
            }
            return Err(ClassError::AlreadyDefined(class.name().to_string()));
        }
        classes.insert(class.name().to_string(), class);
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Arc<ClassInfo>, ClassError> {
        self.classes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ClassError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }
}
