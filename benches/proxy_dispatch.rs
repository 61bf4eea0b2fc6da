//! Dispatch cost of subclass proxies compared to direct invocation

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sprig_aop::{Advice, Advisor, Pointcut, ProxyFactory};
use sprig_container::{AutoProxyCreator, ComponentDescriptor, Container};
use sprig_core::{ClassInfo, Object, TypeRef, Value};

fn counter_class() -> Arc<ClassInfo> {
    ClassInfo::builder("Counter")
        .constructor(vec![], |_| Ok(AtomicI64::new(0)))
        .method::<AtomicI64, _>("add", vec![TypeRef::Int], TypeRef::Int, |count, args| {
            let delta = args[0].as_int().unwrap_or_default();
            Ok(Value::Int(count.fetch_add(delta, Ordering::Relaxed) + delta))
        })
        .method::<AtomicI64, _>("get", vec![], TypeRef::Int, |count, _| {
            Ok(Value::Int(count.load(Ordering::Relaxed)))
        })
        .build()
}

fn counting_proxy(frozen: bool) -> Object {
    let target = Object::new(counter_class(), AtomicI64::new(0));
    let factory = ProxyFactory::new(target);
    factory.config().set_proxy_target_class(true);
    factory
        .add_advisor(Advisor::with_pointcut(
            Pointcut::for_methods(["add"]),
            Advice::around(|invocation| invocation.proceed()),
        ))
        .unwrap();
    factory.config().set_frozen(frozen);
    factory.proxy().unwrap()
}

fn benchmark_dispatch(c: &mut Criterion) {
    let direct = Object::new(counter_class(), AtomicI64::new(0));
    let frozen = counting_proxy(true);
    let dynamic = counting_proxy(false);

    c.bench_function("direct_invoke", |b| {
        b.iter(|| black_box(direct.invoke("get", vec![]).unwrap()))
    });

    c.bench_function("proxy_direct_target", |b| {
        b.iter(|| black_box(frozen.invoke("get", vec![]).unwrap()))
    });

    c.bench_function("proxy_fixed_chain", |b| {
        b.iter(|| black_box(frozen.invoke("add", vec![Value::Int(black_box(1))]).unwrap()))
    });

    c.bench_function("proxy_interceptor_chain", |b| {
        b.iter(|| black_box(dynamic.invoke("add", vec![Value::Int(black_box(1))]).unwrap()))
    });
}

fn benchmark_container(c: &mut Criterion) {
    c.bench_function("create_auto_proxied_singleton", |b| {
        b.iter(|| {
            let container = Container::new();
            container.define_class(counter_class()).unwrap();
            container.add_hook(Arc::new(
                AutoProxyCreator::new()
                    .with_advisor(Advisor::with_pointcut(
                        Pointcut::for_methods(["add"]),
                        Advice::around(|invocation| invocation.proceed()),
                    ))
                    .proxy_target_class(true)
                    .frozen(true),
            ));
            container
                .register("counter", ComponentDescriptor::for_class("Counter"))
                .unwrap();
            black_box(container.get("counter").unwrap())
        })
    });

    let container = Container::new();
    container.define_class(counter_class()).unwrap();
    container
        .register("counter", ComponentDescriptor::for_class("Counter"))
        .unwrap();
    container.get("counter").unwrap();
    c.bench_function("get_existing_singleton", |b| {
        b.iter(|| black_box(container.get(black_box("counter")).unwrap()))
    });
}

criterion_group!(benches, benchmark_dispatch, benchmark_container);
criterion_main!(benches);
