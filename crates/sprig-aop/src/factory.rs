//! Programmatic proxy creation

use std::sync::Arc;

use sprig_core::{ClassInfo, Object, COMPONENT_NAME_AWARE, DISPOSABLE, INITIALIZING};
use tracing::debug;

use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::config::ProxyConfig;
use crate::error::{AopError, Result};
use crate::proxy::interface::create_interface_proxy;
use crate::proxy::subclass::create_subclass_proxy;
use crate::proxy::{ADVISED_INTERFACE, PROXY_INTERFACE};
use crate::target::TargetSource;

/// Interfaces never worth proxying: lifecycle callbacks and proxy markers
const INTERNAL_INTERFACES: &[&str] = &[
    COMPONENT_NAME_AWARE,
    INITIALIZING,
    DISPOSABLE,
    PROXY_INTERFACE,
    ADVISED_INTERFACE,
];

/// Interfaces of `class` that make sense for an interface proxy: not a lifecycle
/// callback or marker, and declaring at least one method.
pub fn reasonable_proxy_interfaces(class: &ClassInfo) -> Vec<String> {
    class
        .all_interfaces()
        .into_iter()
        .filter(|name| !INTERNAL_INTERFACES.contains(&name.as_str()))
        .filter(|name| {
            class
                .methods()
                .iter()
                .any(|m| m.interface.as_deref() == Some(name.as_str()))
        })
        .collect()
}

/// Builds proxies from a shared [`ProxyConfig`].
///
/// ```rust,ignore
/// let factory = ProxyFactory::new(service);
/// factory.add_advice(Advice::around(|invocation| invocation.proceed()))?;
/// let proxy = factory.proxy()?;
/// ```
pub struct ProxyFactory {
    config: Arc<ProxyConfig>,
}

impl ProxyFactory {
    /// Factory for `target`, proxying all of its reasonable interfaces
    pub fn new(target: Object) -> Self {
        let interfaces = reasonable_proxy_interfaces(target.class());
        Self {
            config: Arc::new(ProxyConfig::for_target(target).with_interfaces(interfaces)),
        }
    }

    /// Factory without interfaces for a custom target source
    pub fn with_target_source(target_source: Arc<dyn TargetSource>) -> Self {
        Self {
            config: Arc::new(ProxyConfig::new(target_source)),
        }
    }

    pub fn from_config(config: Arc<ProxyConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<ProxyConfig> {
        &self.config
    }

    pub fn add_advice(&self, advice: Advice) -> Result<()> {
        self.config.add_advice(advice)
    }

    pub fn add_advisor(&self, advisor: Advisor) -> Result<()> {
        self.config.add_advisor(advisor)
    }

    pub fn add_interface(&self, interface: impl Into<String>) -> Result<()> {
        self.config.add_interface(interface)
    }

    /// Whether [`proxy`](Self::proxy) will produce a subclass proxy
    pub fn uses_subclass_proxy(&self) -> bool {
        self.config.is_proxy_target_class()
            || !self
                .config
                .interfaces()
                .iter()
                .any(|i| !INTERNAL_INTERFACES.contains(&i.as_str()))
    }

    /// Create a proxy with the current configuration
    pub fn proxy(&self) -> Result<Object> {
        if self.uses_subclass_proxy() {
            if self.config.target_class().is_none() {
                return Err(AopError::ProxyGeneration {
                    class: "<unknown>".to_string(),
                    reason: "either an interface or a target is required for proxy creation"
                        .to_string(),
                });
            }
            debug!(config = %self.config.describe(), "Choosing subclass proxy");
            create_subclass_proxy(self.config.clone())
        } else {
            debug!(config = %self.config.describe(), "Choosing interface proxy");
            create_interface_proxy(self.config.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::{TypeRef, Value};

    #[test]
    fn test_reasonable_interfaces() {
        let class = ClassInfo::builder("Service")
            .implements(INITIALIZING)
            .implements("Marker")
            .interface_method::<(), _>("Api", "call", vec![], TypeRef::Void, |_, _| Ok(Value::Null))
            .build();
        assert_eq!(reasonable_proxy_interfaces(&class), vec!["Api".to_string()]);
    }

    #[test]
    fn test_strategy_choice() {
        let with_api = ClassInfo::builder("Service")
            .interface_method::<(), _>("Api", "call", vec![], TypeRef::Void, |_, _| Ok(Value::Null))
            .build();
        let factory = ProxyFactory::new(Object::new(with_api, ()));
        assert!(!factory.uses_subclass_proxy());
        factory.config().set_proxy_target_class(true);
        assert!(factory.uses_subclass_proxy());

        let plain = ClassInfo::builder("Plain").build();
        assert!(ProxyFactory::new(Object::new(plain, ())).uses_subclass_proxy());
    }

    #[test]
    fn test_no_target_no_interfaces() {
        let factory = ProxyFactory::with_target_source(Arc::new(crate::target::EmptyTargetSource::new()));
        assert!(matches!(factory.proxy(), Err(AopError::ProxyGeneration { .. })));
    }
}
