//! Subclass proxies
//!
//! The generated class extends the target class. Each method is bound to a
//! [`DispatchKind`] when the proxy is generated; the table is stored with the proxy
//! and aligned with the generated method table.

use std::sync::Arc;

use sprig_core::{ClassInfo, InvocationError, MethodInfo, MethodKind, Object, TypeRef, Value};
use tracing::debug;

use super::{
    add_advised_methods, add_identity_methods, config_dispatch, equality_dispatch,
    hash_dispatch, invoke_through_chain, is_proxy_equals, is_proxy_hash, method_at,
    next_proxy_id, process_return, proxy_state, push_unique, DispatchKind, ProxyState,
    ProxyStrategy, ADVISED_INTERFACE, PROXY_INTERFACE,
};
use crate::advice::MethodInvocation;
use crate::config::ProxyConfig;
use crate::error::{AopError, Result};

type InvocationResult<T> = std::result::Result<T, InvocationError>;

/// Generate a proxy extending the target class of `config`.
pub fn create_subclass_proxy(config: Arc<ProxyConfig>) -> Result<Object> {
    let target_class = config.target_class().ok_or_else(|| AopError::ProxyGeneration {
        class: "<unknown>".to_string(),
        reason: "the target source does not determine a target class".to_string(),
    })?;
    if target_class.is_final() {
        return Err(AopError::ProxyGeneration {
            class: target_class.name().to_string(),
            reason: "the class is final and cannot be subclassed".to_string(),
        });
    }

    let opaque = config.is_opaque();
    let frozen = config.is_frozen();
    let expose = config.is_expose_proxy();
    let source = config.target_source();
    let is_static = source.is_static();
    let fixed_target = if is_static { source.target() } else { None };

    let mut methods: Vec<MethodInfo> = target_class.methods().to_vec();
    for (interface, signature) in config.introduced_methods() {
        push_unique(
            &mut methods,
            MethodInfo::new(
                signature.name,
                signature.params,
                signature.return_type,
                Arc::new(|_, _| Ok(Value::Null)),
            )
            .with_interface(interface),
        );
    }
    add_identity_methods(&mut methods);
    if !opaque {
        add_advised_methods(&mut methods);
    }

    let mut dispatch = Vec::with_capacity(methods.len());
    let mut fixed_chains = Vec::new();
    for method in &methods {
        let kind = if method.kind == MethodKind::Finalize {
            DispatchKind::NoOverride
        } else if !opaque && method.interface.as_deref() == Some(ADVISED_INTERFACE) {
            DispatchKind::ConfigDispatch
        } else if is_proxy_equals(method) {
            DispatchKind::EqualityDispatch
        } else if is_proxy_hash(method) {
            DispatchKind::HashDispatch
        } else {
            let chain = config.interceptors_for(method, &target_class)?;
            let advised = !chain.is_empty();
            if advised || !frozen || expose {
                if advised && frozen && is_static && !expose {
                    fixed_chains.push(chain);
                    DispatchKind::FixedChain(fixed_chains.len() - 1)
                } else {
                    DispatchKind::InterceptorChain
                }
            } else if may_return_target(method, &target_class) {
                DispatchKind::DirectTargetWithMassage
            } else {
                DispatchKind::DirectTarget
            }
        };
        dispatch.push(kind);
    }

    let mut builder = ClassInfo::builder(format!(
        "{}$$Proxy{}",
        target_class.name(),
        next_proxy_id()
    ))
    .extends(target_class.clone())
    .implements(PROXY_INTERFACE);
    if !opaque {
        builder = builder.implements(ADVISED_INTERFACE);
    }
    for interface in config.interfaces() {
        builder = builder.implements(interface);
    }
    for (index, (method, kind)) in methods.iter().zip(dispatch.iter()).enumerate() {
        let routed = if *kind == DispatchKind::NoOverride {
            method.clone()
        } else {
            method.with_handler(Arc::new(move |proxy: &Object, args: Vec<Value>| {
                dispatch_method(proxy, index, args)
            }))
        };
        builder = builder.with_method(routed);
    }
    for property in target_class.properties() {
        let name = property.name.clone();
        builder = builder.with_property(property.with_setter(Arc::new(
            move |proxy: &Object, value: Value| {
                let state = proxy_state(proxy)?;
                let target = state.config.target_source().target().ok_or_else(|| {
                    InvocationError::Aop(format!("No target to receive property '{}'", name))
                })?;
                target.set_property(&name, value)
            },
        )));
    }
    let class = builder.build();
    debug!(
        proxy = class.name(),
        target = target_class.name(),
        fixed_chains = fixed_chains.len(),
        "Created subclass proxy"
    );

    let state = ProxyState {
        config,
        strategy: ProxyStrategy::Subclass,
        target_class: Some(target_class),
        dispatch,
        fixed_chains,
        fixed_target,
    };
    Ok(Object::new(class, state))
}

/// Whether the method can hand back the target itself
fn may_return_target(method: &MethodInfo, target_class: &ClassInfo) -> bool {
    match &method.return_type {
        TypeRef::Any => true,
        TypeRef::Class(name) => target_class.is_a(name),
        _ => false,
    }
}

fn dispatch_method(proxy: &Object, index: usize, args: Vec<Value>) -> InvocationResult<Value> {
    let state = proxy_state(proxy)?;
    let method = method_at(proxy, index)?;
    let kind = state.dispatch.get(index).copied().unwrap_or(DispatchKind::InterceptorChain);
    match kind {
        DispatchKind::DirectTarget => {
            let source = state.config.target_source();
            let target = require_target(proxy, source.target(), method)?;
            let result = invoke_target(state, &target, index, method, args);
            if !source.is_static() {
                source.release(&target);
            }
            result
        }
        DispatchKind::DirectTargetWithMassage => {
            let source = state.config.target_source();
            let target = require_target(proxy, source.target(), method)?;
            let result = invoke_target(state, &target, index, method, args);
            if !source.is_static() {
                source.release(&target);
            }
            process_return(proxy, Some(&target), target_method(state, index, method), result?)
        }
        DispatchKind::InterceptorChain => invoke_through_chain(proxy, state, method, args),
        DispatchKind::FixedChain(chain_index) => {
            let chain = state.fixed_chains.get(chain_index).ok_or_else(|| {
                InvocationError::Aop(format!("No fixed chain #{} on {}", chain_index, proxy.class_name()))
            })?;
            let target = state.fixed_target.as_ref();
            let target_method = target_method(state, index, method);
            let value = MethodInvocation::new(
                proxy,
                target,
                state.target_class.as_deref(),
                target_method,
                args,
                chain,
            )
            .proceed()?;
            process_return(proxy, target, target_method, value)
        }
        DispatchKind::ConfigDispatch => config_dispatch(state, method),
        DispatchKind::EqualityDispatch => Ok(equality_dispatch(proxy, state, &args)),
        DispatchKind::HashDispatch => Ok(hash_dispatch(state)),
        DispatchKind::NoOverride => method.invoke(proxy, args),
    }
}

/// The target class's own entry for the method at `index`
fn target_method<'a>(state: &'a ProxyState, index: usize, method: &'a MethodInfo) -> &'a MethodInfo {
    state
        .target_class
        .as_ref()
        .and_then(|class| class.methods().get(index))
        .filter(|candidate| candidate.key() == method.key())
        .unwrap_or(method)
}

fn invoke_target(
    state: &ProxyState,
    target: &Object,
    index: usize,
    method: &MethodInfo,
    args: Vec<Value>,
) -> InvocationResult<Value> {
    match &state.target_class {
        Some(class) if Arc::ptr_eq(class, target.class()) && index < class.methods().len() => {
            class.methods()[index].invoke(target, args)
        }
        _ => target.invoke_key(&method.key(), args),
    }
}

fn require_target(proxy: &Object, target: Option<Object>, method: &MethodInfo) -> InvocationResult<Object> {
    target.ok_or_else(|| {
        InvocationError::Aop(format!(
            "No target available to invoke {} on {}",
            method.key(),
            proxy.class_name()
        ))
    })
}
