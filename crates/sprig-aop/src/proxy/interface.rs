//! Interface proxies

use std::sync::Arc;

use sprig_core::{ClassInfo, InvocationError, MethodInfo, Object, Value};
use tracing::debug;

use super::{
    add_advised_methods, add_identity_methods, config_dispatch, equality_dispatch,
    hash_dispatch, invoke_through_chain, is_proxy_equals, is_proxy_hash, method_at,
    next_proxy_id, proxy_state, push_unique, ProxyState, ProxyStrategy, ADVISED_INTERFACE,
    PROXY_INTERFACE,
};
use crate::config::ProxyConfig;
use crate::error::{AopError, Result};

/// Generate a proxy implementing every interface of `config`.
pub fn create_interface_proxy(config: Arc<ProxyConfig>) -> Result<Object> {
    let target_class = config.target_class();
    let interfaces = config.interfaces();
    if interfaces.is_empty() {
        return Err(AopError::ProxyGeneration {
            class: target_class
                .as_ref()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            reason: "no interfaces to implement".to_string(),
        });
    }
    let opaque = config.is_opaque();

    let mut methods: Vec<MethodInfo> = Vec::new();
    for interface in &interfaces {
        if let Some(class) = &target_class {
            for method in class
                .methods()
                .iter()
                .filter(|m| m.interface.as_deref() == Some(interface.as_str()))
            {
                push_unique(&mut methods, method.clone());
            }
        }
    }
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

    let mut builder = ClassInfo::builder(format!("$Proxy{}", next_proxy_id()));
    for interface in &interfaces {
        builder = builder.implements(interface.clone());
    }
    builder = builder.implements(PROXY_INTERFACE);
    if !opaque {
        builder = builder.implements(ADVISED_INTERFACE);
    }
    for (index, method) in methods.iter().enumerate() {
        builder = builder.with_method(
            method.with_handler(Arc::new(move |proxy: &Object, args: Vec<Value>| {
                dispatch(proxy, index, args)
            })),
        );
    }
    let class = builder.build();
    debug!(
        proxy = class.name(),
        interfaces = ?interfaces,
        methods = class.methods().len(),
        "Created interface proxy"
    );

    let state = ProxyState {
        config,
        strategy: ProxyStrategy::Interface,
        target_class,
        dispatch: Vec::new(),
        fixed_chains: Vec::new(),
        fixed_target: None,
    };
    Ok(Object::new(class, state))
}

/// Single dispatch routine shared by every method of an interface proxy
fn dispatch(proxy: &Object, index: usize, args: Vec<Value>) -> std::result::Result<Value, InvocationError> {
    let state = proxy_state(proxy)?;
    let method = method_at(proxy, index)?;
    if is_proxy_equals(method) {
        return Ok(equality_dispatch(proxy, state, &args));
    }
    if is_proxy_hash(method) {
        return Ok(hash_dispatch(state));
    }
    if method.interface.as_deref() == Some(ADVISED_INTERFACE) && !state.config.is_opaque() {
        return config_dispatch(state, method);
    }
    invoke_through_chain(proxy, state, method, args)
}
