//! Error types for the object model
//!
//! Two families of failures surface from this crate:
//!
//! 1. **Invocation errors**: raised when a constructor, factory method, property setter
//!    or method handler fails, or when the call itself is malformed (wrong arity,
//!    wrong argument type, unknown member).
//! 2. **Class errors**: raised by the [`ClassLoader`](crate::ClassLoader) when a class
//!    name cannot be resolved or is defined twice.

use thiserror::Error;

/// Result alias used by every invocation path.
pub type Result<T, E = InvocationError> = std::result::Result<T, E>;

/// Failures raised while invoking a member of a managed class.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvocationError {
    /// No method with the given name and arity exists on the class
    #[error("No method '{method}' taking {arity} argument(s) on class {class}")]
    NoSuchMethod {
        class: String,
        method: String,
        arity: usize,
    },

    /// No writable property with the given name exists on the class
    #[error("No writable property '{property}' on class {class}")]
    NoSuchProperty { class: String, property: String },

    /// The number of supplied arguments does not match the declared parameters
    #[error("Argument count mismatch for {member}: expected {expected}, got {actual}")]
    ArgumentCount {
        member: String,
        expected: usize,
        actual: usize,
    },

    /// A value could not be used where a given type was required
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// The instance state does not have the Rust type the handler expects
    #[error("Instance state does not match the layout of class {class}")]
    StateMismatch { class: String },

    /// The member itself reported a failure
    #[error("{0}")]
    Failed(String),

    /// Failure raised by proxy dispatch (advice, return-value checks, proxy exposure)
    #[error("AOP invocation failure: {0}")]
    Aop(String),
}

impl InvocationError {
    /// Shorthand for a user-level failure
    pub fn failed(message: impl Into<String>) -> Self {
        InvocationError::Failed(message.into())
    }
}

/// Failures raised by the class-loading facility.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassError {
    /// The class name is unknown to the loader
    #[error("Class not found: {0}")]
    NotFound(String),

    /// A different class with the same name is already defined
    #[error("Class already defined: {0}")]
    AlreadyDefined(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_error_messages() {
        let err = InvocationError::NoSuchMethod {
            class: "Greeter".to_string(),
            method: "greet".to_string(),
            arity: 2,
        };
        assert_eq!(
            err.to_string(),
            "No method 'greet' taking 2 argument(s) on class Greeter"
        );
        assert_eq!(InvocationError::failed("boom").to_string(), "boom");
    }

    #[test]
    fn test_class_error_messages() {
        assert_eq!(
            ClassError::NotFound("Missing".to_string()).to_string(),
            "Class not found: Missing"
        );
    }
}
