//! Interceptor chain assembly

use std::sync::Arc;

use sprig_core::{ClassInfo, MethodInfo};

use crate::adapter::AdvisorAdapterRegistry;
use crate::advice::MethodInterceptor;
use crate::advisor::Advisor;
use crate::error::Result;
use crate::pointcut::MethodMatcher;

/// One link of an interceptor chain
#[derive(Clone)]
pub enum ChainElement {
    /// Always runs
    Static(Arc<dyn MethodInterceptor>),
    /// Runs only when the matcher accepts the actual arguments
    Dynamic {
        interceptor: Arc<dyn MethodInterceptor>,
        matcher: Arc<dyn MethodMatcher>,
    },
}

impl ChainElement {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ChainElement::Dynamic { .. })
    }
}

/// Build the chain for `method` of `class`, advisors in declaration order.
///
/// Class filters are skipped when the advisors were pre-filtered for the class.
pub fn build_chain(
    advisors: &[Advisor],
    pre_filtered: bool,
    method: &MethodInfo,
    class: &ClassInfo,
    adapters: &AdvisorAdapterRegistry,
) -> Result<Vec<ChainElement>> {
    let mut chain = Vec::new();
    for advisor in advisors {
        match advisor {
            Advisor::Pointcut(advisor) => {
                let pointcut = &advisor.pointcut;
                if !pre_filtered && !pointcut.class_filter().matches(class) {
                    continue;
                }
                let matcher = pointcut.method_matcher();
                if !matcher.matches(method, class) {
                    continue;
                }
                let interceptors = adapters.interceptors(&advisor.advice)?;
                if matcher.is_runtime() {
                    chain.extend(interceptors.into_iter().map(|interceptor| {
                        ChainElement::Dynamic {
                            interceptor,
                            matcher: matcher.clone(),
                        }
                    }));
                } else {
                    chain.extend(interceptors.into_iter().map(ChainElement::Static));
                }
            }
            Advisor::Introduction(introduction) => {
                if pre_filtered || introduction.applies_to(class) {
                    chain.push(ChainElement::Static(introduction.interceptor.clone()));
                }
            }
        }
    }
    Ok(chain)
}
