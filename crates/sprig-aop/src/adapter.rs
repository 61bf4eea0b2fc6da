//! Conversion of advice into interceptors

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::advice::{
    Advice, AfterReturningAdviceInterceptor, BeforeAdviceInterceptor, MethodInterceptor,
    ThrowsAdviceInterceptor,
};
use crate::error::{AopError, Result};

/// Turns one kind of advice into a [`MethodInterceptor`]
pub trait AdvisorAdapter: Send + Sync {
    fn supports(&self, advice: &Advice) -> bool;

    fn interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>>;
}

struct BeforeAdviceAdapter;

impl AdvisorAdapter for BeforeAdviceAdapter {
    fn supports(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Before(_))
    }

    fn interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::Before(before) => Some(Arc::new(BeforeAdviceInterceptor::new(before.clone()))),
            _ => None,
        }
    }
}

struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn supports(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterReturning(_))
    }

    fn interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::AfterReturning(after) => {
                Some(Arc::new(AfterReturningAdviceInterceptor::new(after.clone())))
            }
            _ => None,
        }
    }
}

struct ThrowsAdviceAdapter;

impl AdvisorAdapter for ThrowsAdviceAdapter {
    fn supports(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Throws(_))
    }

    fn interceptor(&self, advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::Throws(throws) => Some(Arc::new(ThrowsAdviceInterceptor::new(throws.clone()))),
            _ => None,
        }
    }
}

/// Registry of advice adapters.
///
/// Around advice is used as-is. Before, after-returning and throws advice are
/// handled by built-in adapters; custom kinds need a registered adapter.
pub struct AdvisorAdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AdvisorAdapter>>>,
}

impl AdvisorAdapterRegistry {
    /// Registry with the built-in adapters
    pub fn new() -> Self {
        let adapters: Vec<Arc<dyn AdvisorAdapter>> = vec![
            Arc::new(BeforeAdviceAdapter),
            Arc::new(AfterReturningAdviceAdapter),
            Arc::new(ThrowsAdviceAdapter),
        ];
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    /// Process-wide registry used by proxy configurations by default
    pub fn global() -> Arc<AdvisorAdapterRegistry> {
        static GLOBAL: OnceLock<Arc<AdvisorAdapterRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(AdvisorAdapterRegistry::new()))
            .clone()
    }

    pub fn register(&self, adapter: Arc<dyn AdvisorAdapter>) {
        self.adapters.write().push(adapter);
    }

    /// Interceptors for `advice`; fails when nothing understands it
    pub fn interceptors(&self, advice: &Advice) -> Result<Vec<Arc<dyn MethodInterceptor>>> {
        let mut interceptors = Vec::new();
        if let Advice::Around(around) = advice {
            interceptors.push(around.clone());
        }
        for adapter in self.adapters.read().iter() {
            if adapter.supports(advice) {
                if let Some(interceptor) = adapter.interceptor(advice) {
                    interceptors.push(interceptor);
                }
            }
        }
        if interceptors.is_empty() {
            debug!(kind = advice.kind(), "No adapter for advice");
            return Err(AopError::UnknownAdviceType(advice.kind().to_string()));
        }
        Ok(interceptors)
    }
}

impl Default for AdvisorAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::advice::{CustomAdvice, MethodInvocation};
    use sprig_core::{InvocationError, Value};

    struct Tracing;

    impl CustomAdvice for Tracing {
        fn kind(&self) -> &str {
            "tracing"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct TracingAdapter;

    impl AdvisorAdapter for TracingAdapter {
        fn supports(&self, advice: &Advice) -> bool {
            matches!(advice, Advice::Custom(c) if c.as_any().is::<Tracing>())
        }

        fn interceptor(&self, _advice: &Advice) -> Option<Arc<dyn MethodInterceptor>> {
            Some(Arc::new(PassThrough))
        }
    }

    struct PassThrough;

    impl MethodInterceptor for PassThrough {
        fn invoke(&self, inv: &mut MethodInvocation<'_>) -> std::result::Result<Value, InvocationError> {
            inv.proceed()
        }
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = AdvisorAdapterRegistry::new();
        let before = Advice::before(|_, _, _| Ok(()));
        assert_eq!(registry.interceptors(&before).unwrap().len(), 1);
        let around = Advice::around(|inv| inv.proceed());
        assert_eq!(registry.interceptors(&around).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_kind_then_registered() {
        let registry = AdvisorAdapterRegistry::new();
        let custom = Advice::Custom(Arc::new(Tracing));
        assert_eq!(
            registry.interceptors(&custom).err(),
            Some(AopError::UnknownAdviceType("tracing".to_string()))
        );
        registry.register(Arc::new(TracingAdapter));
        assert_eq!(registry.interceptors(&custom).unwrap().len(), 1);
    }
}
