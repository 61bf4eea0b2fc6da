//! Access to the proxy currently dispatching on this thread

use std::cell::RefCell;

use sprig_core::Object;

use crate::error::{AopError, Result};

thread_local! {
    static CURRENT_PROXY: RefCell<Option<Object>> = const { RefCell::new(None) };
}

/// The proxy whose call is running on this thread.
///
/// Only available inside calls made through a proxy with `expose_proxy` set.
pub fn current_proxy() -> Result<Object> {
    CURRENT_PROXY
        .with(|current| current.borrow().clone())
        .ok_or(AopError::NoCurrentProxy)
}

/// Restores the previously exposed proxy on drop
pub(crate) struct ExposedProxy {
    previous: Option<Object>,
}

impl ExposedProxy {
    pub(crate) fn expose(proxy: &Object) -> Self {
        let previous = CURRENT_PROXY.with(|current| current.replace(Some(proxy.clone())));
        Self { previous }
    }
}

impl Drop for ExposedProxy {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_PROXY.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::ClassInfo;

    #[test]
    fn test_exposure_nests_and_restores() {
        assert_eq!(current_proxy().err(), Some(AopError::NoCurrentProxy));
        let class = ClassInfo::builder("P").build();
        let outer = Object::new(class.clone(), ());
        let inner = Object::new(class, ());
        {
            let _outer = ExposedProxy::expose(&outer);
            assert!(current_proxy().unwrap().ptr_eq(&outer));
            {
                let _inner = ExposedProxy::expose(&inner);
                assert!(current_proxy().unwrap().ptr_eq(&inner));
            }
            assert!(current_proxy().unwrap().ptr_eq(&outer));
        }
        assert!(current_proxy().is_err());
    }
}
