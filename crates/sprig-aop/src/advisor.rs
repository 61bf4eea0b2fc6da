//! Advisors: advice bound to the condition under which it applies

use std::fmt;
use std::sync::Arc;

use sprig_core::{ClassInfo, InvocationError, MethodInfo, MethodKey, Object, TypeRef, Value};

use crate::advice::{Advice, MethodInterceptor, MethodInvocation};
use crate::pointcut::{ClassFilter, Pointcut};

/// Advice applied wherever its pointcut matches
#[derive(Clone, Debug)]
pub struct PointcutAdvisor {
    pub pointcut: Pointcut,
    pub advice: Advice,
}

impl PointcutAdvisor {
    pub fn new(pointcut: Pointcut, advice: Advice) -> Self {
        Self { pointcut, advice }
    }
}

/// Signature of a method contributed by an introduced interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<TypeRef>,
    pub return_type: TypeRef,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<TypeRef>, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
        }
    }

    pub fn key(&self) -> MethodKey {
        MethodKey {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }
}

/// An interface a proxy gains through introduction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub name: String,
    pub methods: Vec<MethodSignature>,
}

impl InterfaceSpec {
    pub fn new(name: impl Into<String>, methods: Vec<MethodSignature>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }

    /// Signatures of every method `class` declares through `interface`
    pub fn from_class(class: &ClassInfo, interface: &str) -> Self {
        let methods = class
            .methods()
            .iter()
            .filter(|m| m.interface.as_deref() == Some(interface))
            .map(|m| MethodSignature::new(m.name.clone(), m.params.clone(), m.return_type.clone()))
            .collect();
        Self::new(interface, methods)
    }
}

/// Adds interfaces to a proxy and handles the calls made through them
#[derive(Clone)]
pub struct IntroductionAdvisor {
    pub interfaces: Vec<InterfaceSpec>,
    pub interceptor: Arc<dyn MethodInterceptor>,
    pub class_filter: Option<Arc<dyn ClassFilter>>,
}

impl IntroductionAdvisor {
    pub fn new(interfaces: Vec<InterfaceSpec>, interceptor: Arc<dyn MethodInterceptor>) -> Self {
        Self {
            interfaces,
            interceptor,
            class_filter: None,
        }
    }

    /// Introduction of every interface `delegate` implements, served by the delegate
    pub fn delegating(delegate: Object) -> Self {
        let class = delegate.class().clone();
        let interfaces: Vec<InterfaceSpec> = class
            .all_interfaces()
            .iter()
            .map(|name| InterfaceSpec::from_class(&class, name))
            .collect();
        let names = interfaces.iter().map(|i| i.name.clone()).collect();
        Self::new(
            interfaces,
            Arc::new(DelegatingIntroductionInterceptor::new(delegate, names)),
        )
    }

    pub fn with_class_filter(mut self, filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = Some(filter);
        self
    }

    pub fn applies_to(&self, class: &ClassInfo) -> bool {
        self.class_filter
            .as_ref()
            .map_or(true, |filter| filter.matches(class))
    }

    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces.iter().map(|i| i.name.clone()).collect()
    }
}

impl fmt::Debug for IntroductionAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntroductionAdvisor")
            .field("interfaces", &self.interface_names())
            .finish()
    }
}

/// Serves introduced interface calls from a delegate object
pub struct DelegatingIntroductionInterceptor {
    delegate: Object,
    interfaces: Vec<String>,
}

impl DelegatingIntroductionInterceptor {
    pub fn new(delegate: Object, interfaces: Vec<String>) -> Self {
        Self {
            delegate,
            interfaces,
        }
    }

    fn introduces(&self, method: &MethodInfo) -> bool {
        method
            .interface
            .as_ref()
            .is_some_and(|i| self.interfaces.contains(i))
    }
}

impl MethodInterceptor for DelegatingIntroductionInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, InvocationError> {
        if !self.introduces(invocation.method()) {
            return invocation.proceed();
        }
        let value = self
            .delegate
            .invoke_key(&invocation.method().key(), invocation.arguments().to_vec())?;
        if value.is_same_object(&self.delegate) {
            return Ok(Value::Object(invocation.proxy().clone()));
        }
        Ok(value)
    }
}

/// Advice plus applicability
#[derive(Clone, Debug)]
pub enum Advisor {
    Pointcut(PointcutAdvisor),
    Introduction(IntroductionAdvisor),
}

impl Advisor {
    /// Advisor applying `advice` to every method
    pub fn always(advice: Advice) -> Self {
        Advisor::Pointcut(PointcutAdvisor::new(Pointcut::always(), advice))
    }

    pub fn with_pointcut(pointcut: Pointcut, advice: Advice) -> Self {
        Advisor::Pointcut(PointcutAdvisor::new(pointcut, advice))
    }

    pub fn introduction(advisor: IntroductionAdvisor) -> Self {
        Advisor::Introduction(advisor)
    }

    /// Identity comparison of advice and applicability condition
    pub fn same_as(&self, other: &Advisor) -> bool {
        match (self, other) {
            (Advisor::Pointcut(a), Advisor::Pointcut(b)) => {
                a.advice.same_as(&b.advice) && a.pointcut.same_as(&b.pointcut)
            }
            (Advisor::Introduction(a), Advisor::Introduction(b)) => {
                std::ptr::eq(
                    Arc::as_ptr(&a.interceptor) as *const (),
                    Arc::as_ptr(&b.interceptor) as *const (),
                ) && a.interfaces == b.interfaces
            }
            _ => false,
        }
    }
}
