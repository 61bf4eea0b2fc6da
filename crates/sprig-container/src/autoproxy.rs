//! Automatic proxying of components through a lifecycle hook
//!
//! [`AutoProxyCreator`] wraps every component for which at least one of its advisors
//! is eligible. It takes part in circular reference resolution: when a component's
//! early reference is requested, the proxy is created right then, and the
//! post-initialisation phase leaves the object alone so the container keeps
//! exposing that same proxy.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sprig_aop::{
    is_proxy, reasonable_proxy_interfaces, simple_match, Advisor, ProxyConfig, ProxyFactory,
};
use sprig_core::{ClassInfo, Object};
use tracing::debug;

use crate::error::Result;
use crate::hooks::LifecycleHook;

/// Wraps eligible components in proxies carrying the configured advisors
#[derive(Default)]
pub struct AutoProxyCreator {
    advisors: RwLock<Vec<Advisor>>,
    /// Component name patterns (`*` wildcards); empty matches every component
    name_patterns: Vec<String>,
    proxy_target_class: bool,
    expose_proxy: bool,
    frozen: bool,
    /// Component name -> identity of the raw object an early proxy was made for
    early_proxy_references: Mutex<HashMap<String, usize>>,
}

impl AutoProxyCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advisor(self, advisor: Advisor) -> Self {
        self.advisors.write().push(advisor);
        self
    }

    /// Only proxy components whose name matches one of `patterns`
    pub fn for_names<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Always generate subclass proxies
    pub fn proxy_target_class(mut self, proxy_target_class: bool) -> Self {
        self.proxy_target_class = proxy_target_class;
        self
    }

    pub fn expose_proxy(mut self, expose_proxy: bool) -> Self {
        self.expose_proxy = expose_proxy;
        self
    }

    /// Freeze the configuration of generated proxies
    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    /// Add an advisor for components created from now on
    pub fn add_advisor(&self, advisor: Advisor) {
        self.advisors.write().push(advisor);
    }

    pub fn advisor_count(&self) -> usize {
        self.advisors.read().len()
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name_patterns.is_empty()
            || self
                .name_patterns
                .iter()
                .any(|pattern| simple_match(pattern, name))
    }

    /// Advisors applying to at least one method of `class`
    pub fn eligible_advisors(&self, class: &ClassInfo) -> Vec<Advisor> {
        self.advisors
            .read()
            .iter()
            .filter(|advisor| match advisor {
                Advisor::Pointcut(advisor) => {
                    advisor.pointcut.class_filter().matches(class)
                        && class
                            .methods()
                            .iter()
                            .any(|method| advisor.pointcut.matches(method, class))
                }
                Advisor::Introduction(advisor) => advisor.applies_to(class),
            })
            .cloned()
            .collect()
    }

    fn wrap_if_necessary(&self, object: Object, name: &str) -> Result<Object> {
        if is_proxy(&object) || !self.matches_name(name) {
            return Ok(object);
        }
        let class = object.class().clone();
        let advisors = self.eligible_advisors(&class);
        if advisors.is_empty() {
            return Ok(object);
        }

        let interfaces = if self.proxy_target_class {
            Vec::new()
        } else {
            reasonable_proxy_interfaces(&class)
        };
        let subclass = interfaces.is_empty();
        let config = ProxyConfig::for_target(object).with_interfaces(interfaces);
        config.set_proxy_target_class(subclass);
        config.set_expose_proxy(self.expose_proxy);
        for advisor in advisors {
            config.add_advisor(advisor)?;
        }
        config.set_pre_filtered(true);
        config.set_frozen(self.frozen);

        let proxy = ProxyFactory::from_config(Arc::new(config)).proxy()?;
        debug!(component = %name, class = class.name(), subclass, "Created auto-proxy");
        Ok(proxy)
    }
}

impl LifecycleHook for AutoProxyCreator {
    fn name(&self) -> &str {
        "AutoProxyCreator"
    }

    fn order(&self) -> i32 {
        i32::MAX
    }

    fn early_reference(&self, object: Object, name: &str) -> Result<Object> {
        self.early_proxy_references
            .lock()
            .insert(name.to_string(), object.identity());
        self.wrap_if_necessary(object, name)
    }

    fn after_initialization(&self, object: Object, name: &str) -> Result<Object> {
        let early = self.early_proxy_references.lock().remove(name);
        if early == Some(object.identity()) {
            // Already proxied as an early reference
            return Ok(object);
        }
        self.wrap_if_necessary(object, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sprig_aop::{is_interface_proxy, is_subclass_proxy, ultimate_target, Advice, Pointcut};
    use sprig_core::{TypeRef, Value};

    use crate::container::Container;
    use crate::descriptor::ComponentDescriptor;

    #[derive(Default)]
    struct Peer {
        peer: Mutex<Option<Object>>,
    }

    fn greeter_class(name: &str) -> Arc<ClassInfo> {
        ClassInfo::builder(name)
            .constructor(vec![], |_| Ok(Peer::default()))
            .property::<Peer, _>("peer", TypeRef::Any, |state, value| {
                *state.peer.lock() = value.into_object();
                Ok(())
            })
            .interface_method::<Peer, _>("Greeter", "greet", vec![], TypeRef::Str, |_, _| {
                Ok(Value::from("hello"))
            })
            .build()
    }

    fn counting_creator(calls: &Arc<AtomicUsize>) -> AutoProxyCreator {
        let calls = calls.clone();
        AutoProxyCreator::new().with_advisor(Advisor::with_pointcut(
            Pointcut::for_methods(["greet"]),
            Advice::before(move |_, _, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ))
    }

    #[test]
    fn test_eligible_component_is_proxied() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.define_class(greeter_class("Friendly")).unwrap();
        container.add_hook(Arc::new(counting_creator(&calls)));
        container
            .register("friendly", ComponentDescriptor::for_class("Friendly"))
            .unwrap();

        let object = container.get("friendly").unwrap();
        assert!(is_interface_proxy(&object));
        assert_eq!(object.invoke("greet", vec![]).unwrap(), Value::from("hello"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ultimate_target(&object).class_name(), "Friendly");
    }

    #[test]
    fn test_name_patterns_restrict_proxying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.define_class(greeter_class("Friendly")).unwrap();
        container.add_hook(Arc::new(counting_creator(&calls).for_names(["*Service"])));
        container
            .register("friendly", ComponentDescriptor::for_class("Friendly"))
            .unwrap();
        assert!(!is_proxy(&container.get("friendly").unwrap()));
    }

    #[test]
    fn test_proxy_target_class() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.define_class(greeter_class("Friendly")).unwrap();
        container.add_hook(Arc::new(counting_creator(&calls).proxy_target_class(true)));
        container
            .register("friendly", ComponentDescriptor::for_class("Friendly"))
            .unwrap();
        let object = container.get("friendly").unwrap();
        assert!(is_subclass_proxy(&object));
        assert!(object.is_a("Friendly"));
    }

    #[test]
    fn test_early_proxy_is_final_object_in_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.define_class(greeter_class("First")).unwrap();
        container.define_class(greeter_class("Second")).unwrap();
        container.add_hook(Arc::new(counting_creator(&calls).for_names(["first"])));
        container
            .register("first", ComponentDescriptor::for_class("First").with_property_ref("peer", "second"))
            .unwrap();
        container
            .register("second", ComponentDescriptor::for_class("Second").with_property_ref("peer", "first"))
            .unwrap();

        let first = container.get("first").unwrap();
        let second = container.get("second").unwrap();
        assert!(is_proxy(&first));
        let held = second.downcast_ref::<Peer>().unwrap().peer.lock().clone().unwrap();
        assert!(held.ptr_eq(&first));
    }
}
