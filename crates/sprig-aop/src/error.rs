//! Error types for the proxy subsystem
//!
//! Proxy failures come in two flavours:
//!
//! 1. **Configuration errors** are returned while a proxy is being configured or
//!    generated: modifying a frozen configuration, registering advice no adapter
//!    understands, or asking for a proxy that cannot be generated.
//! 2. **Dispatch errors** happen while a proxied call is running. Those travel as
//!    [`InvocationError`] like any other method failure; an [`AopError`] raised during
//!    dispatch is converted into [`InvocationError::Aop`].

use sprig_core::InvocationError;
use thiserror::Error;

/// Errors raised by proxy configuration and generation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AopError {
    /// The proxy configuration is frozen
    ///
    /// Advisors and interfaces cannot change once a configuration is frozen.
    /// Recovery: configure everything before calling `set_frozen(true)`.
    #[error("Cannot modify a frozen proxy configuration")]
    ConfigFrozen,

    /// No registered adapter understands the advice
    ///
    /// The string contains the advice kind. Recovery: register an
    /// `AdvisorAdapter` for the kind with the adapter registry.
    #[error("Advice of kind '{0}' is not supported by any registered adapter")]
    UnknownAdviceType(String),

    /// The proxy could not be generated
    ///
    /// Common causes:
    /// - The target class is final and cannot be subclassed
    /// - No target class could be determined for a subclass proxy
    /// - No interfaces were given for an interface proxy
    #[error(
        "Could not generate proxy for {class}: {reason}. Common causes of this problem \
         include using a final class or a proxy without a determinable target class"
    )]
    ProxyGeneration { class: String, reason: String },

    /// `current_proxy()` was called outside an exposing proxy call
    #[error(
        "Cannot find current proxy: set 'expose_proxy' to true on the proxy configuration \
         and make the call through the proxy"
    )]
    NoCurrentProxy,

    /// A pointcut pattern failed to compile
    #[error("Invalid pointcut pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl From<AopError> for InvocationError {
    fn from(err: AopError) -> Self {
        InvocationError::Aop(err.to_string())
    }
}

/// Result type for proxy configuration
pub type Result<T> = std::result::Result<T, AopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_carries_hint() {
        let err = AopError::ProxyGeneration {
            class: "Ledger".to_string(),
            reason: "class is final".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Ledger"));
        assert!(message.contains("final class"));
    }

    #[test]
    fn test_converts_into_invocation_error() {
        let err: InvocationError = AopError::NoCurrentProxy.into();
        assert!(matches!(err, InvocationError::Aop(msg) if msg.contains("expose_proxy")));
    }
}
