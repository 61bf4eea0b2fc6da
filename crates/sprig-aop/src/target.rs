//! Target sources: where a proxy finds the object to call

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sprig_core::{ClassInfo, Object};
use tracing::debug;

/// Supplies the target of each proxied call
pub trait TargetSource: Send + Sync {
    fn target_class(&self) -> Option<Arc<ClassInfo>>;

    /// Static sources always return the same target
    fn is_static(&self) -> bool;

    fn target(&self) -> Option<Object>;

    /// Hand back a target obtained from [`target`](Self::target)
    fn release(&self, _target: &Object) {}
}

/// Always the same target
#[derive(Clone)]
pub struct SingletonTargetSource {
    target: Object,
}

impl SingletonTargetSource {
    pub fn new(target: Object) -> Self {
        Self { target }
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_class(&self) -> Option<Arc<ClassInfo>> {
        Some(self.target.class().clone())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn target(&self) -> Option<Object> {
        Some(self.target.clone())
    }
}

impl fmt::Debug for SingletonTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingletonTargetSource({:?})", self.target)
    }
}

/// Target that can be replaced while proxies are in use
pub struct SwappableTargetSource {
    target: RwLock<Object>,
}

impl SwappableTargetSource {
    pub fn new(initial: Object) -> Self {
        Self {
            target: RwLock::new(initial),
        }
    }

    /// Replace the target, returning the previous one
    pub fn swap(&self, new_target: Object) -> Object {
        let mut target = self.target.write();
        debug!(old = ?*target, new = ?new_target, "Swapping proxy target");
        std::mem::replace(&mut *target, new_target)
    }
}

impl TargetSource for SwappableTargetSource {
    fn target_class(&self) -> Option<Arc<ClassInfo>> {
        Some(self.target.read().class().clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn target(&self) -> Option<Object> {
        Some(self.target.read().clone())
    }
}

/// No target at all; every call must be handled by advice or introductions
#[derive(Clone, Default)]
pub struct EmptyTargetSource {
    class: Option<Arc<ClassInfo>>,
}

impl EmptyTargetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty source that still reports a target class
    pub fn for_class(class: Arc<ClassInfo>) -> Self {
        Self { class: Some(class) }
    }
}

impl TargetSource for EmptyTargetSource {
    fn target_class(&self) -> Option<Arc<ClassInfo>> {
        self.class.clone()
    }

    fn is_static(&self) -> bool {
        true
    }

    fn target(&self) -> Option<Object> {
        None
    }
}
