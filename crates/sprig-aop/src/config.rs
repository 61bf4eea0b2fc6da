//! Proxy configuration shared by a proxy and its factory

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sprig_core::{ClassInfo, MethodInfo, MethodKey, Object};
use tracing::debug;

use crate::adapter::AdvisorAdapterRegistry;
use crate::advice::Advice;
use crate::advisor::{Advisor, MethodSignature};
use crate::chain::{build_chain, ChainElement};
use crate::error::{AopError, Result};
use crate::target::{SingletonTargetSource, TargetSource};

struct ConfigState {
    target_source: Arc<dyn TargetSource>,
    interfaces: Vec<String>,
    advisors: Vec<Advisor>,
    proxy_target_class: bool,
    expose_proxy: bool,
    frozen: bool,
    opaque: bool,
    pre_filtered: bool,
}

type ChainCacheKey = (MethodKey, String);

/// Advisors, interfaces, target source and flags of a proxy.
///
/// Proxies hold the configuration behind an `Arc`, so changes made through the
/// factory remain visible to proxies already handed out, unless the configuration
/// is frozen.
pub struct ProxyConfig {
    state: RwLock<ConfigState>,
    chain_cache: Mutex<HashMap<ChainCacheKey, Arc<[ChainElement]>>>,
    adapters: Arc<AdvisorAdapterRegistry>,
}

impl ProxyConfig {
    pub fn new(target_source: Arc<dyn TargetSource>) -> Self {
        Self {
            state: RwLock::new(ConfigState {
                target_source,
                interfaces: Vec::new(),
                advisors: Vec::new(),
                proxy_target_class: false,
                expose_proxy: false,
                frozen: false,
                opaque: false,
                pre_filtered: false,
            }),
            chain_cache: Mutex::new(HashMap::new()),
            adapters: AdvisorAdapterRegistry::global(),
        }
    }

    /// Configuration with a singleton target
    pub fn for_target(target: Object) -> Self {
        Self::new(Arc::new(SingletonTargetSource::new(target)))
    }

    /// Use a specific adapter registry instead of the global one
    pub fn with_adapters(mut self, adapters: Arc<AdvisorAdapterRegistry>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Start out proxying `interfaces`
    pub fn with_interfaces(self, interfaces: Vec<String>) -> Self {
        {
            let mut state = self.state.write();
            for interface in interfaces {
                if !state.interfaces.contains(&interface) {
                    state.interfaces.push(interface);
                }
            }
        }
        self
    }

    pub fn target_source(&self) -> Arc<dyn TargetSource> {
        self.state.read().target_source.clone()
    }

    pub fn set_target_source(&self, target_source: Arc<dyn TargetSource>) {
        self.state.write().target_source = target_source;
        self.advice_changed();
    }

    pub fn target_class(&self) -> Option<Arc<ClassInfo>> {
        self.state.read().target_source.target_class()
    }

    pub fn add_interface(&self, interface: impl Into<String>) -> Result<()> {
        let interface = interface.into();
        let mut state = self.state.write();
        if state.frozen {
            return Err(AopError::ConfigFrozen);
        }
        if !state.interfaces.contains(&interface) {
            state.interfaces.push(interface);
        }
        drop(state);
        self.advice_changed();
        Ok(())
    }

    pub fn interfaces(&self) -> Vec<String> {
        self.state.read().interfaces.clone()
    }

    pub fn is_interface_proxied(&self, interface: &str) -> bool {
        self.state.read().interfaces.iter().any(|i| i == interface)
    }

    /// Apply `advice` to every method
    pub fn add_advice(&self, advice: Advice) -> Result<()> {
        self.add_advisor(Advisor::always(advice))
    }

    pub fn add_advisor(&self, advisor: Advisor) -> Result<()> {
        let position = self.state.read().advisors.len();
        self.insert_advisor(position, advisor)
    }

    /// Insert at `position`; introductions also register their interfaces
    pub fn insert_advisor(&self, position: usize, advisor: Advisor) -> Result<()> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(AopError::ConfigFrozen);
        }
        if let Advisor::Introduction(introduction) = &advisor {
            for name in introduction.interface_names() {
                if !state.interfaces.contains(&name) {
                    state.interfaces.push(name);
                }
            }
        }
        let position = position.min(state.advisors.len());
        state.advisors.insert(position, advisor);
        drop(state);
        self.advice_changed();
        Ok(())
    }

    pub fn remove_advisor(&self, index: usize) -> Result<Option<Advisor>> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(AopError::ConfigFrozen);
        }
        if index >= state.advisors.len() {
            return Ok(None);
        }
        let removed = state.advisors.remove(index);
        drop(state);
        self.advice_changed();
        Ok(Some(removed))
    }

    pub fn advisors(&self) -> Vec<Advisor> {
        self.state.read().advisors.clone()
    }

    pub fn advisor_count(&self) -> usize {
        self.state.read().advisors.len()
    }

    /// Signatures of every method added by introduction advisors
    pub fn introduced_methods(&self) -> Vec<(String, MethodSignature)> {
        self.state
            .read()
            .advisors
            .iter()
            .filter_map(|advisor| match advisor {
                Advisor::Introduction(introduction) => Some(introduction),
                Advisor::Pointcut(_) => None,
            })
            .flat_map(|introduction| {
                introduction.interfaces.iter().flat_map(|spec| {
                    spec.methods
                        .iter()
                        .map(move |m| (spec.name.clone(), m.clone()))
                })
            })
            .collect()
    }

    pub fn set_frozen(&self, frozen: bool) {
        self.state.write().frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    pub fn set_expose_proxy(&self, expose: bool) {
        self.state.write().expose_proxy = expose;
    }

    pub fn is_expose_proxy(&self) -> bool {
        self.state.read().expose_proxy
    }

    /// Force a subclass proxy even when interfaces are available
    pub fn set_proxy_target_class(&self, proxy_target_class: bool) {
        self.state.write().proxy_target_class = proxy_target_class;
    }

    pub fn is_proxy_target_class(&self) -> bool {
        self.state.read().proxy_target_class
    }

    /// Opaque proxies do not expose their configuration to callers
    pub fn set_opaque(&self, opaque: bool) {
        self.state.write().opaque = opaque;
    }

    pub fn is_opaque(&self) -> bool {
        self.state.read().opaque
    }

    /// Advisors were already filtered for the target class
    pub fn set_pre_filtered(&self, pre_filtered: bool) {
        self.state.write().pre_filtered = pre_filtered;
        self.advice_changed();
    }

    pub fn is_pre_filtered(&self) -> bool {
        self.state.read().pre_filtered
    }

    /// Interceptor chain for `method` when called on an instance of `class`
    pub fn interceptors_for(
        &self,
        method: &MethodInfo,
        class: &ClassInfo,
    ) -> Result<Arc<[ChainElement]>> {
        let key = (method.key(), class.name().to_string());
        if let Some(chain) = self.chain_cache.lock().get(&key) {
            return Ok(chain.clone());
        }
        let (advisors, pre_filtered) = {
            let state = self.state.read();
            (state.advisors.clone(), state.pre_filtered)
        };
        let chain: Arc<[ChainElement]> =
            build_chain(&advisors, pre_filtered, method, class, &self.adapters)?.into();
        debug!(
            method = %key.0,
            class = %key.1,
            interceptors = chain.len(),
            "Built interceptor chain"
        );
        self.chain_cache.lock().insert(key, chain.clone());
        Ok(chain)
    }

    /// Same interfaces, advisors and target source
    pub fn equivalent_to(&self, other: &ProxyConfig) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let (a, b) = (self.state.read(), other.state.read());
        let same_interfaces = a.interfaces.len() == b.interfaces.len()
            && a.interfaces.iter().all(|i| b.interfaces.contains(i));
        let same_advisors = a.advisors.len() == b.advisors.len()
            && a
                .advisors
                .iter()
                .zip(b.advisors.iter())
                .all(|(x, y)| x.same_as(y));
        same_interfaces && same_advisors && same_source(&a.target_source, &b.target_source)
    }

    /// Hash consistent with [`equivalent_to`](Self::equivalent_to): derived from the
    /// target source only
    pub fn hash_key(&self) -> usize {
        source_key(&self.state.read().target_source)
    }

    /// Human-readable summary used by proxies and debug output
    pub fn describe(&self) -> String {
        let state = self.state.read();
        let target = state
            .target_source
            .target_class()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "<none>".to_string());
        format!(
            "{} interfaces [{}]; {} advisors; target class [{}]; proxy_target_class={}; \
             expose_proxy={}; frozen={}; opaque={}",
            state.interfaces.len(),
            state.interfaces.join(", "),
            state.advisors.len(),
            target,
            state.proxy_target_class,
            state.expose_proxy,
            state.frozen,
            state.opaque
        )
    }

    fn advice_changed(&self) {
        self.chain_cache.lock().clear();
    }
}

fn same_source(a: &Arc<dyn TargetSource>, b: &Arc<dyn TargetSource>) -> bool {
    if std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ()) {
        return true;
    }
    if !(a.is_static() && b.is_static()) {
        return false;
    }
    match (a.target(), b.target()) {
        (Some(x), Some(y)) => x.ptr_eq(&y),
        (None, None) => match (a.target_class(), b.target_class()) {
            (Some(x), Some(y)) => Arc::ptr_eq(&x, &y),
            (None, None) => true,
            _ => false,
        },
        _ => false,
    }
}

fn source_key(source: &Arc<dyn TargetSource>) -> usize {
    if !source.is_static() {
        return Arc::as_ptr(source) as *const () as usize;
    }
    match (source.target(), source.target_class()) {
        (Some(target), _) => target.identity(),
        (None, Some(class)) => Arc::as_ptr(&class) as usize,
        (None, None) => 0,
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyConfig({})", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::IntroductionAdvisor;
    use sprig_core::{TypeRef, Value};

    fn target() -> Object {
        let class = ClassInfo::builder("Inventory")
            .implements("Stock")
            .object_method("count", vec![], TypeRef::Int, |_, _| Ok(Value::Int(3)))
            .build();
        Object::new(class, ())
    }

    #[test]
    fn test_frozen_rejects_changes() {
        let config = ProxyConfig::for_target(target());
        config.add_advice(Advice::around(|i| i.proceed())).unwrap();
        config.set_frozen(true);
        assert_eq!(
            config.add_advice(Advice::around(|i| i.proceed())),
            Err(AopError::ConfigFrozen)
        );
        assert_eq!(config.add_interface("Other"), Err(AopError::ConfigFrozen));
        assert!(matches!(config.remove_advisor(0), Err(AopError::ConfigFrozen)));
        assert_eq!(config.advisor_count(), 1);
    }

    #[test]
    fn test_chain_cache_invalidated_on_change() {
        let object = target();
        let config = ProxyConfig::for_target(object.clone());
        let (_, method) = object.class().method("count", 0).unwrap();
        assert_eq!(config.interceptors_for(method, object.class()).unwrap().len(), 0);
        config.add_advice(Advice::around(|i| i.proceed())).unwrap();
        assert_eq!(config.interceptors_for(method, object.class()).unwrap().len(), 1);
        config.remove_advisor(0).unwrap();
        assert_eq!(config.interceptors_for(method, object.class()).unwrap().len(), 0);
    }

    #[test]
    fn test_introduction_registers_interfaces() {
        let mixin = Object::new(
            ClassInfo::builder("Mixin")
                .interface_method::<(), _>("Tagged", "tag", vec![], TypeRef::Str, |_, _| {
                    Ok(Value::from("t"))
                })
                .build(),
            (),
        );
        let config = ProxyConfig::for_target(target());
        config
            .add_advisor(Advisor::introduction(IntroductionAdvisor::delegating(mixin)))
            .unwrap();
        assert!(config.is_interface_proxied("Tagged"));
        let introduced = config.introduced_methods();
        assert_eq!(introduced.len(), 1);
        assert_eq!(introduced[0].0, "Tagged");
    }

    #[test]
    fn test_equivalence() {
        let object = target();
        let advice = Advice::before(|_, _, _| Ok(()));
        let advisor = Advisor::always(advice);
        let a = ProxyConfig::for_target(object.clone());
        let b = ProxyConfig::for_target(object.clone());
        a.add_advisor(advisor.clone()).unwrap();
        assert!(!a.equivalent_to(&b));
        b.add_advisor(advisor).unwrap();
        assert!(a.equivalent_to(&b));
        let c = ProxyConfig::for_target(target());
        assert!(!a.equivalent_to(&c));
    }
}
