//! Interception proxies for sprig
//!
//! A proxy stands in for a target object and routes method calls through an ordered
//! chain of interceptors built from [`Advisor`]s. Proxies either implement the target's
//! interfaces or extend the target class; see [`proxy`] for how calls are dispatched.
//!
//! ```rust,ignore
//! use sprig_aop::{Advice, Advisor, Pointcut, ProxyFactory};
//!
//! let factory = ProxyFactory::new(repository);
//! factory.add_advisor(Advisor::with_pointcut(
//!     Pointcut::for_methods(["save*"]),
//!     Advice::before(|method, _args, _target| {
//!         tracing::info!(method = %method.name, "saving");
//!         Ok(())
//!     }),
//! ))?;
//! let proxy = factory.proxy()?;
//! ```

pub mod adapter;
pub mod advice;
pub mod advisor;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod pointcut;
pub mod proxy;
pub mod target;

pub use adapter::{AdvisorAdapter, AdvisorAdapterRegistry};
pub use advice::{
    Advice, AfterReturningAdvice, BeforeAdvice, CustomAdvice, MethodInterceptor,
    MethodInvocation, ThrowsAdvice,
};
pub use advisor::{
    Advisor, DelegatingIntroductionInterceptor, InterfaceSpec, IntroductionAdvisor,
    MethodSignature, PointcutAdvisor,
};
pub use chain::ChainElement;
pub use config::ProxyConfig;
pub use context::current_proxy;
pub use error::{AopError, Result};
pub use factory::{reasonable_proxy_interfaces, ProxyFactory};
pub use pointcut::{
    simple_match, ClassFilter, ClassNameFilter, FnMethodMatcher, MethodMatcher,
    NameMatchMethodMatcher, Pointcut, RegexMethodMatcher, RuntimeMethodMatcher,
};
pub use proxy::{
    advised, dispatch_kind_of, dispatch_table, is_interface_proxy, is_proxy, is_subclass_proxy,
    proxy_strategy, ultimate_target, DispatchKind, ProxyStrategy, ADVISED_INTERFACE,
    PROXY_INTERFACE,
};
pub use target::{EmptyTargetSource, SingletonTargetSource, SwappableTargetSource, TargetSource};
