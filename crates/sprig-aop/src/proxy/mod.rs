//! Proxy generation and dispatch
//!
//! Two strategies produce proxies:
//!
//! - [`interface`]: a fresh class implementing the proxied interfaces; every call goes
//!   through one dispatch routine that decides at call time what to do.
//! - [`subclass`]: a class extending the target class whose methods are bound, when
//!   the proxy is generated, to one entry of the [`DispatchKind`] palette. Unadvised
//!   methods of a frozen configuration therefore reach the target without any chain
//!   lookup.
//!
//! Both share the state stored in the proxy object and the helpers below.

pub mod interface;
pub mod subclass;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sprig_core::{ClassInfo, InvocationError, MethodInfo, MethodKind, Object, TypeRef, Value};

use crate::advice::MethodInvocation;
use crate::chain::ChainElement;
use crate::config::ProxyConfig;
use crate::context::ExposedProxy;

/// Marker interface implemented by every proxy
pub const PROXY_INTERFACE: &str = "sprig::aop::Proxy";
/// Configuration-introspection interface of non-opaque proxies
pub const ADVISED_INTERFACE: &str = "sprig::aop::Advised";

type InvocationResult<T> = std::result::Result<T, InvocationError>;

/// How a subclass proxy routes one method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// Straight to the target; the return type cannot be the target itself
    DirectTarget,
    /// Straight to the target, substituting the proxy for a returned target
    DirectTargetWithMassage,
    /// Through the interceptor chain looked up per call
    InterceptorChain,
    /// Through a chain precomputed at generation time (index into the fixed chains)
    FixedChain(usize),
    /// Answered from the proxy configuration
    ConfigDispatch,
    /// Proxy equality based on configuration equivalence
    EqualityDispatch,
    /// Hash consistent with [`DispatchKind::EqualityDispatch`]
    HashDispatch,
    /// Inherited behaviour kept, never intercepted
    NoOverride,
}

/// Which strategy produced a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStrategy {
    Interface,
    Subclass,
}

/// State held by every proxy object
pub(crate) struct ProxyState {
    pub(crate) config: Arc<ProxyConfig>,
    pub(crate) strategy: ProxyStrategy,
    /// Class chains are matched against when no target is at hand
    pub(crate) target_class: Option<Arc<ClassInfo>>,
    /// Aligned with the proxy class method table (subclass proxies only)
    pub(crate) dispatch: Vec<DispatchKind>,
    pub(crate) fixed_chains: Vec<Arc<[ChainElement]>>,
    pub(crate) fixed_target: Option<Object>,
}

static PROXY_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_proxy_id() -> u64 {
    PROXY_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn proxy_state(proxy: &Object) -> InvocationResult<&ProxyState> {
    proxy
        .downcast_ref::<ProxyState>()
        .ok_or_else(|| InvocationError::StateMismatch {
            class: proxy.class_name().to_string(),
        })
}

pub(crate) fn method_at(proxy: &Object, index: usize) -> InvocationResult<&MethodInfo> {
    proxy
        .class()
        .methods()
        .get(index)
        .ok_or_else(|| InvocationError::Aop(format!("No method #{} on {}", index, proxy.class_name())))
}

/// Add `method` unless the table already has one with the same signature
pub(crate) fn push_unique(methods: &mut Vec<MethodInfo>, method: MethodInfo) {
    let key = method.key();
    if !methods.iter().any(|m| m.key() == key) {
        methods.push(method);
    }
}

fn placeholder(
    name: &str,
    params: Vec<TypeRef>,
    return_type: TypeRef,
) -> MethodInfo {
    MethodInfo::new(name, params, return_type, Arc::new(|_, _| Ok(Value::Null)))
}

/// Synthetic `equals`/`hash_code` methods for targets that do not declare them
pub(crate) fn add_identity_methods(methods: &mut Vec<MethodInfo>) {
    if !methods.iter().any(|m| m.kind == MethodKind::Equals) {
        push_unique(
            methods,
            placeholder("equals", vec![TypeRef::Any], TypeRef::Bool).with_kind(MethodKind::Equals),
        );
    }
    if !methods.iter().any(|m| m.kind == MethodKind::HashCode) {
        push_unique(
            methods,
            placeholder("hash_code", vec![], TypeRef::Int).with_kind(MethodKind::HashCode),
        );
    }
}

/// Signatures of the configuration-introspection methods
pub(crate) fn add_advised_methods(methods: &mut Vec<MethodInfo>) {
    let advised = [
        ("is_frozen", TypeRef::Bool),
        ("is_proxy_target_class", TypeRef::Bool),
        ("is_expose_proxy", TypeRef::Bool),
        ("advisor_count", TypeRef::Int),
        ("proxied_interfaces", TypeRef::list_of(TypeRef::Str)),
        ("target_class_name", TypeRef::Str),
        ("proxy_config_description", TypeRef::Str),
    ];
    for (name, return_type) in advised {
        push_unique(
            methods,
            placeholder(name, vec![], return_type).with_interface(ADVISED_INTERFACE),
        );
    }
}

/// Whether the method is handled by the identity dispatchers
pub(crate) fn is_proxy_equals(method: &MethodInfo) -> bool {
    method.kind == MethodKind::Equals && method.interface.is_none()
}

pub(crate) fn is_proxy_hash(method: &MethodInfo) -> bool {
    method.kind == MethodKind::HashCode && method.interface.is_none()
}

pub(crate) fn config_dispatch(state: &ProxyState, method: &MethodInfo) -> InvocationResult<Value> {
    let config = &state.config;
    let value = match method.name.as_str() {
        "is_frozen" => Value::Bool(config.is_frozen()),
        "is_proxy_target_class" => Value::Bool(config.is_proxy_target_class()),
        "is_expose_proxy" => Value::Bool(config.is_expose_proxy()),
        "advisor_count" => Value::Int(config.advisor_count() as i64),
        "proxied_interfaces" => Value::List(config.interfaces().into_iter().map(Value::Str).collect()),
        "target_class_name" => config
            .target_class()
            .map(|c| Value::from(c.name()))
            .unwrap_or(Value::Null),
        "proxy_config_description" => Value::Str(config.describe()),
        other => {
            return Err(InvocationError::Aop(format!(
                "Unknown configuration method '{}'",
                other
            )))
        }
    };
    Ok(value)
}

pub(crate) fn equality_dispatch(proxy: &Object, state: &ProxyState, args: &[Value]) -> Value {
    let equal = match args.first() {
        Some(Value::Object(other)) if other.ptr_eq(proxy) => true,
        Some(Value::Object(other)) => other
            .downcast_ref::<ProxyState>()
            .is_some_and(|other_state| state.config.equivalent_to(&other_state.config)),
        _ => false,
    };
    Value::Bool(equal)
}

pub(crate) fn hash_dispatch(state: &ProxyState) -> Value {
    Value::Int(state.config.hash_key() as i64)
}

/// Post-process a value returned through a proxy
pub(crate) fn process_return(
    proxy: &Object,
    target: Option<&Object>,
    method: &MethodInfo,
    value: Value,
) -> InvocationResult<Value> {
    if let Some(target) = target {
        if value.is_same_object(target) && !method.raw_target_access {
            return Ok(Value::Object(proxy.clone()));
        }
    }
    if value.is_null() && method.return_type.is_primitive() {
        return Err(InvocationError::Aop(format!(
            "Null return value from advice does not match primitive return type for: {}",
            method.key()
        )));
    }
    Ok(value)
}

/// Full dispatch: expose the proxy if asked, obtain the target, run the chain.
pub(crate) fn invoke_through_chain(
    proxy: &Object,
    state: &ProxyState,
    method: &MethodInfo,
    args: Vec<Value>,
) -> InvocationResult<Value> {
    let config = &state.config;
    let _exposed = config.is_expose_proxy().then(|| ExposedProxy::expose(proxy));
    let source = config.target_source();
    let target = source.target();
    let target_class = target
        .as_ref()
        .map(|t| t.class().clone())
        .or_else(|| state.target_class.clone())
        .unwrap_or_else(|| proxy.class().clone());
    let target_method = target_class
        .method_by_key(&method.key())
        .map(|(_, m)| m.clone())
        .unwrap_or_else(|| method.clone());

    let chain = config
        .interceptors_for(&target_method, &target_class)
        .map_err(InvocationError::from)?;
    let result = if chain.is_empty() {
        match &target {
            Some(target) => target.invoke_key(&target_method.key(), args),
            None => Err(InvocationError::Aop(format!(
                "No target available to invoke {} on {}",
                target_method.key(),
                proxy.class_name()
            ))),
        }
    } else {
        MethodInvocation::new(
            proxy,
            target.as_ref(),
            Some(&*target_class),
            &target_method,
            args,
            &chain,
        )
        .proceed()
    };
    if let Some(target) = &target {
        if !source.is_static() {
            source.release(target);
        }
    }
    process_return(proxy, target.as_ref(), &target_method, result?)
}

/// Whether `object` is a proxy produced by this crate
pub fn is_proxy(object: &Object) -> bool {
    object.downcast_ref::<ProxyState>().is_some()
}

pub fn is_subclass_proxy(object: &Object) -> bool {
    proxy_strategy(object) == Some(ProxyStrategy::Subclass)
}

pub fn is_interface_proxy(object: &Object) -> bool {
    proxy_strategy(object) == Some(ProxyStrategy::Interface)
}

pub fn proxy_strategy(object: &Object) -> Option<ProxyStrategy> {
    object.downcast_ref::<ProxyState>().map(|s| s.strategy)
}

/// Configuration of a non-opaque proxy
pub fn advised(object: &Object) -> Option<Arc<ProxyConfig>> {
    object
        .downcast_ref::<ProxyState>()
        .filter(|state| !state.config.is_opaque())
        .map(|state| state.config.clone())
}

/// Compiled dispatch table of a subclass proxy, aligned with its method table
pub fn dispatch_table(object: &Object) -> Option<Vec<DispatchKind>> {
    object
        .downcast_ref::<ProxyState>()
        .filter(|state| state.strategy == ProxyStrategy::Subclass)
        .map(|state| state.dispatch.clone())
}

/// Dispatch kind bound to the first method named `name` taking `arity` arguments
pub fn dispatch_kind_of(object: &Object, name: &str, arity: usize) -> Option<DispatchKind> {
    let (index, _) = object.class().method(name, arity)?;
    dispatch_table(object)?.get(index).copied()
}

/// Innermost target behind (possibly nested) proxies with static targets
pub fn ultimate_target(object: &Object) -> Object {
    let mut current = object.clone();
    while let Some(state) = current.downcast_ref::<ProxyState>() {
        let source = state.config.target_source();
        match source.target() {
            Some(target) if source.is_static() => current = target,
            _ => break,
        }
    }
    current
}
