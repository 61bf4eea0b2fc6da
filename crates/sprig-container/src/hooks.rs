//! Lifecycle hooks
//!
//! Hooks observe and influence every component the container creates. Each phase
//! has a default no-op implementation, so a hook only overrides what it cares about.
//! Hooks run in ascending [`order`](LifecycleHook::order); equal orders keep their
//! registration order.
//!
//! | Phase                 | Method                              | Effect                                  |
//! |-----------------------|-------------------------------------|-----------------------------------------|
//! | before instantiation  | `before_instantiation`              | `Some(object)` replaces creation        |
//! | constructor choice    | `determine_candidate_constructors`  | nominates constructors to autowire      |
//! | after instantiation   | `after_instantiation`               | `false` skips property population       |
//! | properties            | `post_process_properties`           | edits property values before applying   |
//! | early reference       | `early_reference`                   | may wrap the early reference            |
//! | before initialization | `before_initialization`             | may replace the object                  |
//! | after initialization  | `after_initialization`              | may replace the object (e.g. a proxy)   |
//! | destruction           | `before_destruction`                | runs before destroy callbacks           |

use std::sync::Arc;

use parking_lot::RwLock;
use sprig_core::{ClassInfo, Object};

use crate::descriptor::PropertyValues;
use crate::error::Result;

pub trait LifecycleHook: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn order(&self) -> i32 {
        0
    }

    fn before_instantiation(&self, _class: &ClassInfo, _name: &str) -> Result<Option<Object>> {
        Ok(None)
    }

    /// Indices into `class.constructors()` to autowire from
    fn determine_candidate_constructors(
        &self,
        _class: &ClassInfo,
        _name: &str,
    ) -> Result<Option<Vec<usize>>> {
        Ok(None)
    }

    fn after_instantiation(&self, _object: &Object, _name: &str) -> Result<bool> {
        Ok(true)
    }

    fn post_process_properties(
        &self,
        _properties: &mut PropertyValues,
        _object: &Object,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn early_reference(&self, object: Object, _name: &str) -> Result<Object> {
        Ok(object)
    }

    fn before_initialization(&self, object: Object, _name: &str) -> Result<Object> {
        Ok(object)
    }

    fn after_initialization(&self, object: Object, _name: &str) -> Result<Object> {
        Ok(object)
    }

    /// Whether [`before_destruction`](Self::before_destruction) must run for `object`
    fn requires_destruction(&self, _object: &Object) -> bool {
        false
    }

    fn before_destruction(&self, _object: &Object, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<dyn LifecycleHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook; a hook already present (same `Arc`) moves to its new position
    pub fn add(&self, hook: Arc<dyn LifecycleHook>) {
        let mut hooks = self.hooks.write();
        hooks.retain(|existing| !Arc::ptr_eq(existing, &hook));
        hooks.push(hook);
        hooks.sort_by_key(|h| h.order());
    }

    /// Snapshot in execution order
    pub fn hooks(&self) -> Vec<Arc<dyn LifecycleHook>> {
        self.hooks.read().clone()
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    pub fn clear(&self) {
        self.hooks.write().clear();
    }
}

/// Run the early-reference phase of every hook
pub(crate) fn apply_early_reference(
    hooks: &[Arc<dyn LifecycleHook>],
    object: Object,
    name: &str,
) -> Result<Object> {
    hooks
        .iter()
        .try_fold(object, |current, hook| hook.early_reference(current, name))
}
