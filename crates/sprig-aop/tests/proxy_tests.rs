//! Proxy generation and dispatch behaviour

use std::sync::{Arc, Mutex};

use sprig_aop::{
    advised, current_proxy, dispatch_kind_of, is_interface_proxy, is_proxy, is_subclass_proxy,
    ultimate_target, Advice, Advisor, AopError, DispatchKind, IntroductionAdvisor, Pointcut,
    ProxyConfig, ProxyFactory, SwappableTargetSource, ADVISED_INTERFACE, PROXY_INTERFACE,
};
use sprig_core::{
    ClassInfo, InvocationError, MethodInfo, MethodKind, Object, Param, TypeRef, Value,
};

struct Account {
    balance: Mutex<i64>,
}

fn account_class() -> Arc<ClassInfo> {
    ClassInfo::builder("Account")
        .constructor(vec![Param::new(TypeRef::Int)], |args| {
            Ok(Account {
                balance: Mutex::new(args[0].as_int().unwrap_or_default()),
            })
        })
        .interface_method::<Account, _>(
            "Banking",
            "deposit",
            vec![TypeRef::Int],
            TypeRef::Int,
            |account, args| {
                let mut balance = account.balance.lock().unwrap();
                *balance += args[0].as_int().unwrap_or_default();
                Ok(Value::Int(*balance))
            },
        )
        .interface_method::<Account, _>("Banking", "balance", vec![], TypeRef::Int, |account, _| {
            Ok(Value::Int(*account.balance.lock().unwrap()))
        })
        .object_method("itself", vec![], TypeRef::class("Account"), |object, _| {
            Ok(Value::Object(object.clone()))
        })
        .object_method("fail", vec![], TypeRef::Void, |_, _| {
            Err(InvocationError::failed("declined"))
        })
        .object_method("nothing", vec![], TypeRef::Int, |_, _| Ok(Value::Null))
        .property::<Account, _>("balance", TypeRef::Int, |account, value| {
            *account.balance.lock().unwrap() = value.as_int().unwrap_or_default();
            Ok(())
        })
        .build()
}

fn account(initial: i64) -> Object {
    Object::new(
        account_class(),
        Account {
            balance: Mutex::new(initial),
        },
    )
}

fn recording(log: &Arc<Mutex<Vec<String>>>, label: &str) -> Advice {
    let log = log.clone();
    let label = label.to_string();
    Advice::around(move |invocation| {
        log.lock().unwrap().push(format!("{}:{}", label, invocation.method().name));
        invocation.proceed()
    })
}

#[test]
fn test_subclass_proxy_routes_advised_and_plain_methods() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = account(10);
    let factory = ProxyFactory::new(target.clone());
    factory.config().set_proxy_target_class(true);
    factory
        .add_advisor(Advisor::with_pointcut(
            Pointcut::for_methods(["deposit"]),
            recording(&log, "first"),
        ))
        .unwrap();
    factory
        .add_advisor(Advisor::with_pointcut(
            Pointcut::for_methods(["deposit"]),
            recording(&log, "second"),
        ))
        .unwrap();
    factory.config().set_frozen(true);
    let proxy = factory.proxy().unwrap();

    assert!(is_subclass_proxy(&proxy));
    assert!(proxy.is_a("Account"));
    assert!(proxy.is_a(PROXY_INTERFACE));
    assert_eq!(
        dispatch_kind_of(&proxy, "balance", 0),
        Some(DispatchKind::DirectTarget)
    );
    assert_eq!(
        dispatch_kind_of(&proxy, "deposit", 1),
        Some(DispatchKind::FixedChain(0))
    );

    assert_eq!(proxy.invoke("balance", vec![]).unwrap(), Value::Int(10));
    assert!(log.lock().unwrap().is_empty());

    assert_eq!(
        proxy.invoke("deposit", vec![Value::Int(5)]).unwrap(),
        Value::Int(15)
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first:deposit".to_string(), "second:deposit".to_string()]
    );
    assert_eq!(target.invoke("balance", vec![]).unwrap(), Value::Int(15));
}

#[test]
fn test_unfrozen_subclass_proxy_sees_new_advice() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory = ProxyFactory::new(account(0));
    factory.config().set_proxy_target_class(true);
    let proxy = factory.proxy().unwrap();
    assert_eq!(
        dispatch_kind_of(&proxy, "balance", 0),
        Some(DispatchKind::InterceptorChain)
    );
    proxy.invoke("balance", vec![]).unwrap();
    factory.add_advice(recording(&log, "late")).unwrap();
    proxy.invoke("balance", vec![]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["late:balance".to_string()]);
}

#[test]
fn test_returned_target_is_replaced_by_proxy() {
    let target = account(0);
    let factory = ProxyFactory::new(target.clone());
    factory.config().set_proxy_target_class(true);
    factory.config().set_frozen(true);
    let proxy = factory.proxy().unwrap();
    assert_eq!(
        dispatch_kind_of(&proxy, "itself", 0),
        Some(DispatchKind::DirectTargetWithMassage)
    );
    let returned = proxy.invoke("itself", vec![]).unwrap();
    assert!(returned.is_same_object(&proxy));
}

#[test]
fn test_null_for_primitive_return_fails() {
    let factory = ProxyFactory::new(account(0));
    factory.add_advice(Advice::around(|i| i.proceed())).unwrap();
    factory.config().set_proxy_target_class(true);
    let proxy = factory.proxy().unwrap();
    assert!(matches!(
        proxy.invoke("nothing", vec![]),
        Err(InvocationError::Aop(_))
    ));
}

#[test]
fn test_interface_proxy() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = account(1);
    let factory = ProxyFactory::new(target.clone());
    factory.add_advice(recording(&log, "around")).unwrap();
    let proxy = factory.proxy().unwrap();

    assert!(is_interface_proxy(&proxy));
    assert!(proxy.is_a("Banking"));
    assert!(!proxy.is_a("Account"));
    assert!(proxy.is_a(ADVISED_INTERFACE));
    assert_eq!(
        proxy.invoke("deposit", vec![Value::Int(2)]).unwrap(),
        Value::Int(3)
    );
    assert_eq!(*log.lock().unwrap(), vec!["around:deposit".to_string()]);
    assert!(proxy.invoke("itself", vec![]).is_err());
}

#[test]
fn test_advice_kinds_compose() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let factory = ProxyFactory::new(account(0));
    let before = events.clone();
    factory
        .add_advice(Advice::before(move |method, _, _| {
            before.lock().unwrap().push(format!("before {}", method.name));
            Ok(())
        }))
        .unwrap();
    let after = events.clone();
    factory
        .add_advice(Advice::after_returning(move |value, _, _, _| {
            after.lock().unwrap().push(format!("returned {:?}", value));
            Ok(())
        }))
        .unwrap();
    let throws = events.clone();
    factory
        .add_advice(Advice::throws(move |err, _, _, _| {
            throws.lock().unwrap().push(format!("threw {}", err));
            Ok(())
        }))
        .unwrap();
    factory.config().set_proxy_target_class(true);
    let proxy = factory.proxy().unwrap();

    proxy.invoke("deposit", vec![Value::Int(4)]).unwrap();
    assert!(proxy.invoke("fail", vec![]).is_err());
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "before deposit".to_string(),
            "returned 4".to_string(),
            "before fail".to_string(),
            "threw declined".to_string(),
        ]
    );
}

#[test]
fn test_before_advice_can_abort() {
    let factory = ProxyFactory::new(account(0));
    factory
        .add_advice(Advice::before(|_, _, _| Err(InvocationError::failed("denied"))))
        .unwrap();
    let proxy = factory.proxy().unwrap();
    assert_eq!(
        proxy.invoke("deposit", vec![Value::Int(1)]),
        Err(InvocationError::failed("denied"))
    );
}

#[test]
fn test_around_advice_can_rewrite_arguments() {
    let factory = ProxyFactory::new(account(0));
    factory
        .add_advice(Advice::around(|invocation| {
            if let Some(Value::Int(amount)) = invocation.arguments_mut().first_mut() {
                *amount *= 10;
            }
            invocation.proceed()
        }))
        .unwrap();
    let proxy = factory.proxy().unwrap();
    assert_eq!(
        proxy.invoke("deposit", vec![Value::Int(3)]).unwrap(),
        Value::Int(30)
    );
}

#[test]
fn test_expose_proxy() {
    let seen = Arc::new(Mutex::new(None));
    let factory = ProxyFactory::new(account(0));
    factory.config().set_expose_proxy(true);
    let slot = seen.clone();
    factory
        .add_advice(Advice::around(move |invocation| {
            *slot.lock().unwrap() = Some(current_proxy().map_err(InvocationError::from)?);
            invocation.proceed()
        }))
        .unwrap();
    let proxy = factory.proxy().unwrap();
    proxy.invoke("balance", vec![]).unwrap();
    let exposed = seen.lock().unwrap().clone().unwrap();
    assert!(exposed.ptr_eq(&proxy));
    assert_eq!(current_proxy().err(), Some(AopError::NoCurrentProxy));
}

#[test]
fn test_introduction() {
    let mixin = Object::new(
        ClassInfo::builder("AuditMixin")
            .interface_method::<(), _>("Auditable", "audited", vec![], TypeRef::Bool, |_, _| {
                Ok(Value::Bool(true))
            })
            .build(),
        (),
    );
    let factory = ProxyFactory::new(account(0));
    factory
        .add_advisor(Advisor::introduction(IntroductionAdvisor::delegating(mixin)))
        .unwrap();
    let proxy = factory.proxy().unwrap();
    assert!(proxy.is_a("Auditable"));
    assert_eq!(proxy.invoke("audited", vec![]).unwrap(), Value::Bool(true));
    assert_eq!(proxy.invoke("balance", vec![]).unwrap(), Value::Int(0));
}

#[test]
fn test_swappable_target() {
    let first = account(1);
    let second = account(2);
    let source = Arc::new(SwappableTargetSource::new(first));
    let config = Arc::new(ProxyConfig::new(source.clone()));
    config.set_proxy_target_class(true);
    config.set_frozen(true);
    let proxy = ProxyFactory::from_config(config).proxy().unwrap();
    assert_eq!(proxy.invoke("balance", vec![]).unwrap(), Value::Int(1));
    source.swap(second);
    assert_eq!(proxy.invoke("balance", vec![]).unwrap(), Value::Int(2));
}

#[test]
fn test_properties_forward_to_target() {
    let target = account(0);
    let factory = ProxyFactory::new(target.clone());
    factory.config().set_proxy_target_class(true);
    let proxy = factory.proxy().unwrap();
    proxy.set_property("balance", Value::Int(99)).unwrap();
    assert_eq!(target.invoke("balance", vec![]).unwrap(), Value::Int(99));
}

#[test]
fn test_final_class_cannot_be_subclassed() {
    let class = ClassInfo::builder("Sealed").final_class().build();
    let factory = ProxyFactory::new(Object::new(class, ()));
    match factory.proxy() {
        Err(err @ AopError::ProxyGeneration { .. }) => {
            assert!(err.to_string().contains("final"));
        }
        other => panic!("expected generation failure, got {:?}", other.map(|p| p.class_name().to_string())),
    }
}

#[test]
fn test_configuration_introspection() {
    let factory = ProxyFactory::new(account(0));
    factory.add_advice(Advice::around(|i| i.proceed())).unwrap();
    let proxy = factory.proxy().unwrap();
    assert_eq!(proxy.invoke("advisor_count", vec![]).unwrap(), Value::Int(1));
    assert_eq!(
        proxy.invoke("target_class_name", vec![]).unwrap(),
        Value::from("Account")
    );
    assert!(advised(&proxy).is_some());

    factory.config().set_opaque(true);
    let opaque = factory.proxy().unwrap();
    assert!(!opaque.is_a(ADVISED_INTERFACE));
    assert!(advised(&opaque).is_none());
    assert!(is_proxy(&opaque));
}

#[test]
fn test_proxy_equality() {
    let target = account(0);
    let factory = ProxyFactory::new(target.clone());
    factory.config().set_proxy_target_class(true);
    let a = factory.proxy().unwrap();
    let b = factory.proxy().unwrap();
    assert!(!a.ptr_eq(&b));
    assert_eq!(
        a.invoke("equals", vec![Value::from(b.clone())]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        a.invoke("hash_code", vec![]).unwrap(),
        b.invoke("hash_code", vec![]).unwrap()
    );
    assert_eq!(
        a.invoke("equals", vec![Value::from(target.clone())]).unwrap(),
        Value::Bool(false)
    );
    let (index, method) = a.class().method("equals", 1).unwrap();
    assert_eq!(method.kind, MethodKind::Equals);
    assert_eq!(
        sprig_aop::dispatch_table(&a).unwrap()[index],
        DispatchKind::EqualityDispatch
    );
}

#[test]
fn test_nested_proxies_unwrap() {
    let target = account(0);
    let inner = ProxyFactory::new(target.clone()).proxy().unwrap();
    let outer_factory = ProxyFactory::new(inner.clone());
    outer_factory.add_interface("Banking").unwrap();
    let outer = outer_factory.proxy().unwrap();
    assert!(ultimate_target(&outer).ptr_eq(&target));
    assert_eq!(
        outer.invoke("deposit", vec![Value::Int(7)]).unwrap(),
        Value::Int(7)
    );
}

#[test]
fn test_proxies_sharing_a_target_source_hash_alike() {
    let source = Arc::new(SwappableTargetSource::new(account(0)));
    let proxy = || {
        let config = Arc::new(ProxyConfig::new(source.clone()));
        config.set_proxy_target_class(true);
        ProxyFactory::from_config(config).proxy().unwrap()
    };
    let a = proxy();
    let b = proxy();

    assert_eq!(
        a.invoke("equals", vec![Value::from(b.clone())]).unwrap(),
        Value::Bool(true)
    );
    let hash = a.invoke("hash_code", vec![]).unwrap();
    assert_eq!(hash, b.invoke("hash_code", vec![]).unwrap());

    source.swap(account(5));
    assert_eq!(a.invoke("hash_code", vec![]).unwrap(), hash);

    let other = ProxyFactory::new(account(0));
    other.config().set_proxy_target_class(true);
    let c = other.proxy().unwrap();
    assert_eq!(
        a.invoke("equals", vec![Value::from(c.clone())]).unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn test_special_methods_bind_to_their_dispatch_kinds() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let class = ClassInfo::builder("Resource")
        .constructor(vec![], |_| Ok(()))
        .object_method("read", vec![], TypeRef::Str, |_, _| Ok(Value::from("data")))
        .with_method(
            MethodInfo::new(
                "finalize",
                vec![],
                TypeRef::Void,
                Arc::new(|_: &Object, _: Vec<Value>| -> Result<Value, InvocationError> {
                    Ok(Value::from("finalized"))
                }),
            )
            .with_kind(MethodKind::Finalize),
        )
        .build();
    let factory = ProxyFactory::new(Object::new(class, ()));
    factory.config().set_proxy_target_class(true);
    factory.add_advisor(Advisor::always(recording(&log, "all"))).unwrap();
    factory.config().set_frozen(true);
    let proxy = factory.proxy().unwrap();

    assert_eq!(
        dispatch_kind_of(&proxy, "hash_code", 0),
        Some(DispatchKind::HashDispatch)
    );
    assert_eq!(
        dispatch_kind_of(&proxy, "equals", 1),
        Some(DispatchKind::EqualityDispatch)
    );
    assert_eq!(
        dispatch_kind_of(&proxy, "advisor_count", 0),
        Some(DispatchKind::ConfigDispatch)
    );
    assert_eq!(
        dispatch_kind_of(&proxy, "finalize", 0),
        Some(DispatchKind::NoOverride)
    );
    assert!(matches!(
        dispatch_kind_of(&proxy, "read", 0),
        Some(DispatchKind::FixedChain(_))
    ));

    assert_eq!(proxy.invoke("advisor_count", vec![]).unwrap(), Value::Int(1));
    assert_eq!(proxy.invoke("is_frozen", vec![]).unwrap(), Value::Bool(true));
    assert_eq!(
        proxy.invoke("finalize", vec![]).unwrap(),
        Value::from("finalized")
    );
    proxy.invoke("hash_code", vec![]).unwrap();
    assert!(log.lock().unwrap().is_empty());

    assert_eq!(proxy.invoke("read", vec![]).unwrap(), Value::from("data"));
    assert_eq!(*log.lock().unwrap(), vec!["all:read".to_string()]);
}
