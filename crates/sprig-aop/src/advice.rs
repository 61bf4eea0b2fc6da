//! Advice and the method invocation that interceptors drive
//!
//! Every piece of advice ends up as a [`MethodInterceptor`] in a chain. An interceptor
//! receives the [`MethodInvocation`] and decides whether, when and how often to call
//! [`MethodInvocation::proceed`], which runs the next interceptor or, at the end of the
//! chain, the target method itself.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use sprig_core::{ClassInfo, InvocationError, MethodInfo, Object, Value};

use crate::chain::ChainElement;

type InvocationResult<T> = std::result::Result<T, InvocationError>;

/// One call travelling through an interceptor chain
pub struct MethodInvocation<'a> {
    proxy: &'a Object,
    target: Option<&'a Object>,
    target_class: Option<&'a ClassInfo>,
    method: &'a MethodInfo,
    arguments: Vec<Value>,
    chain: &'a [ChainElement],
    current: usize,
}

impl<'a> MethodInvocation<'a> {
    pub(crate) fn new(
        proxy: &'a Object,
        target: Option<&'a Object>,
        target_class: Option<&'a ClassInfo>,
        method: &'a MethodInfo,
        arguments: Vec<Value>,
        chain: &'a [ChainElement],
    ) -> Self {
        Self {
            proxy,
            target,
            target_class,
            method,
            arguments,
            chain,
            current: 0,
        }
    }

    /// The proxy the call was made on
    pub fn proxy(&self) -> &Object {
        self.proxy
    }

    /// The object the call will finally reach, if there is one
    pub fn target(&self) -> Option<&Object> {
        self.target
    }

    pub fn target_class(&self) -> Option<&ClassInfo> {
        self.target_class
    }

    pub fn method(&self) -> &MethodInfo {
        self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Arguments seen by the remaining interceptors and the target
    pub fn arguments_mut(&mut self) -> &mut Vec<Value> {
        &mut self.arguments
    }

    /// Run the rest of the chain
    pub fn proceed(&mut self) -> InvocationResult<Value> {
        let chain = self.chain;
        let Some(element) = chain.get(self.current) else {
            return self.invoke_joinpoint();
        };
        self.current += 1;
        let result = match element {
            ChainElement::Static(interceptor) => interceptor.invoke(self),
            ChainElement::Dynamic {
                interceptor,
                matcher,
            } => {
                let applies = match self.target_class {
                    Some(class) => matcher.matches_runtime(self.method, class, &self.arguments),
                    None => true,
                };
                if applies {
                    interceptor.invoke(self)
                } else {
                    self.proceed()
                }
            }
        };
        self.current -= 1;
        result
    }

    fn invoke_joinpoint(&self) -> InvocationResult<Value> {
        let target = self.target.ok_or_else(|| {
            InvocationError::Aop(format!(
                "No target available to invoke {} on {}",
                self.method.key(),
                self.proxy.class_name()
            ))
        })?;
        target.invoke_key(&self.method.key(), self.arguments.clone())
    }
}

impl fmt::Debug for MethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", &self.method.key().to_string())
            .field("target", &self.target)
            .field("arguments", &self.arguments)
            .field("current", &self.current)
            .finish()
    }
}

/// Around advice: full control over the invocation
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult<Value>;
}

impl<F> MethodInterceptor for F
where
    F: Fn(&mut MethodInvocation<'_>) -> InvocationResult<Value> + Send + Sync,
{
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult<Value> {
        self(invocation)
    }
}

/// Runs before the method; an error aborts the call
pub trait BeforeAdvice: Send + Sync {
    fn before(
        &self,
        method: &MethodInfo,
        args: &[Value],
        target: Option<&Object>,
    ) -> InvocationResult<()>;
}

/// Runs after the method returned normally
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(
        &self,
        return_value: &Value,
        method: &MethodInfo,
        args: &[Value],
        target: Option<&Object>,
    ) -> InvocationResult<()>;
}

/// Runs when the method failed; returning an error replaces the original one
pub trait ThrowsAdvice: Send + Sync {
    fn after_throwing(
        &self,
        error: &InvocationError,
        method: &MethodInfo,
        args: &[Value],
        target: Option<&Object>,
    ) -> InvocationResult<()>;
}

/// Advice of a kind the built-in adapters do not know about
pub trait CustomAdvice: Send + Sync {
    /// Kind name used to pick an adapter and in error messages
    fn kind(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// A piece of advice of any supported kind
#[derive(Clone)]
pub enum Advice {
    Around(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn BeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    Throws(Arc<dyn ThrowsAdvice>),
    Custom(Arc<dyn CustomAdvice>),
}

impl Advice {
    /// Around advice from a closure
    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut MethodInvocation<'_>) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(f))
    }

    /// Before advice from a closure
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&MethodInfo, &[Value], Option<&Object>) -> InvocationResult<()>
            + Send
            + Sync
            + 'static,
    {
        Advice::Before(Arc::new(FnBeforeAdvice(f)))
    }

    /// After-returning advice from a closure
    pub fn after_returning<F>(f: F) -> Self
    where
        F: Fn(&Value, &MethodInfo, &[Value], Option<&Object>) -> InvocationResult<()>
            + Send
            + Sync
            + 'static,
    {
        Advice::AfterReturning(Arc::new(FnAfterReturningAdvice(f)))
    }

    /// Throws advice from a closure
    pub fn throws<F>(f: F) -> Self
    where
        F: Fn(&InvocationError, &MethodInfo, &[Value], Option<&Object>) -> InvocationResult<()>
            + Send
            + Sync
            + 'static,
    {
        Advice::Throws(Arc::new(FnThrowsAdvice(f)))
    }

    pub fn kind(&self) -> &str {
        match self {
            Advice::Around(_) => "around",
            Advice::Before(_) => "before",
            Advice::AfterReturning(_) => "after-returning",
            Advice::Throws(_) => "throws",
            Advice::Custom(custom) => custom.kind(),
        }
    }

    /// Identity comparison of the underlying advice objects
    pub fn same_as(&self, other: &Advice) -> bool {
        self.identity() == other.identity()
    }

    fn identity(&self) -> *const () {
        match self {
            Advice::Around(a) => Arc::as_ptr(a) as *const (),
            Advice::Before(a) => Arc::as_ptr(a) as *const (),
            Advice::AfterReturning(a) => Arc::as_ptr(a) as *const (),
            Advice::Throws(a) => Arc::as_ptr(a) as *const (),
            Advice::Custom(a) => Arc::as_ptr(a) as *const (),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice({})", self.kind())
    }
}

struct FnBeforeAdvice<F>(F);

impl<F> BeforeAdvice for FnBeforeAdvice<F>
where
    F: Fn(&MethodInfo, &[Value], Option<&Object>) -> InvocationResult<()> + Send + Sync,
{
    fn before(
        &self,
        method: &MethodInfo,
        args: &[Value],
        target: Option<&Object>,
    ) -> InvocationResult<()> {
        (self.0)(method, args, target)
    }
}

struct FnAfterReturningAdvice<F>(F);

impl<F> AfterReturningAdvice for FnAfterReturningAdvice<F>
where
    F: Fn(&Value, &MethodInfo, &[Value], Option<&Object>) -> InvocationResult<()> + Send + Sync,
{
    fn after_returning(
        &self,
        return_value: &Value,
        method: &MethodInfo,
        args: &[Value],
        target: Option<&Object>,
    ) -> InvocationResult<()> {
        (self.0)(return_value, method, args, target)
    }
}

struct FnThrowsAdvice<F>(F);

impl<F> ThrowsAdvice for FnThrowsAdvice<F>
where
    F: Fn(&InvocationError, &MethodInfo, &[Value], Option<&Object>) -> InvocationResult<()>
        + Send
        + Sync,
{
    fn after_throwing(
        &self,
        error: &InvocationError,
        method: &MethodInfo,
        args: &[Value],
        target: Option<&Object>,
    ) -> InvocationResult<()> {
        (self.0)(error, method, args, target)
    }
}

/// Interceptor running [`BeforeAdvice`] ahead of the call
pub struct BeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl BeforeAdviceInterceptor {
    pub fn new(advice: Arc<dyn BeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult<Value> {
        self.advice.before(
            invocation.method(),
            invocation.arguments(),
            invocation.target(),
        )?;
        invocation.proceed()
    }
}

/// Interceptor running [`AfterReturningAdvice`] on normal completion
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdviceInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult<Value> {
        let value = invocation.proceed()?;
        self.advice.after_returning(
            &value,
            invocation.method(),
            invocation.arguments(),
            invocation.target(),
        )?;
        Ok(value)
    }
}

/// Interceptor running [`ThrowsAdvice`] on failure
pub struct ThrowsAdviceInterceptor {
    advice: Arc<dyn ThrowsAdvice>,
}

impl ThrowsAdviceInterceptor {
    pub fn new(advice: Arc<dyn ThrowsAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult<Value> {
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(err) => {
                self.advice.after_throwing(
                    &err,
                    invocation.method(),
                    invocation.arguments(),
                    invocation.target(),
                )?;
                Err(err)
            }
        }
    }
}
