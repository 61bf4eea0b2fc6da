//! Error types for the container
//!
//! Errors fall into a few groups:
//!
//! 1. **Configuration errors**: a missing class, an invalid descriptor, a refused
//!    override or a registration against a frozen store.
//! 2. **Resolution errors**: no candidate or several equally good candidates for an
//!    injection point. These carry the requesting component and the required type.
//! 3. **Creation errors**: cycles that cannot be broken with an early reference, a raw
//!    early reference that was later wrapped, constructor selection failures.
//!
//! Failures raised while creating a component are wrapped with the component name in
//! [`ContainerError::CreationFailed`] before they leave the container, so the chain of
//! `source()` calls walks from the requested component down to the root cause.

use sprig_aop::AopError;
use sprig_core::{ClassError, InvocationError};
use thiserror::Error;

/// Result type for container operations
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors raised by the container
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No descriptor or registered singleton under the name
    #[error("No component named '{0}' is defined")]
    NoSuchComponent(String),

    /// No candidate for a required type
    ///
    /// Common causes:
    /// - No descriptor produces the type
    /// - All candidates were registered with `autowire_candidate = false`
    /// - A qualifier on the injection point matched none of the candidates
    #[error("No qualifying component of type '{required}' available{}", requester_suffix(.requester))]
    NoSuchComponentOfType {
        required: String,
        requester: Option<String>,
    },

    /// Several candidates and no way to pick one
    ///
    /// Recovery: mark one candidate primary, give candidates distinct priorities or
    /// name the injection point after the intended component.
    #[error("Expected a single matching component of type '{required}' but found {}: {}", .candidates.len(), .candidates.join(", "))]
    NoUniqueComponent {
        required: String,
        candidates: Vec<String>,
    },

    /// More than one candidate carries the primary marker
    #[error("More than one primary component found among candidates for type '{required}': {}", .candidates.join(", "))]
    MultiplePrimary {
        required: String,
        candidates: Vec<String>,
    },

    /// The highest priority is shared by several candidates
    #[error("Multiple components found with the same priority ({priority}) among candidates for type '{required}': {}", .candidates.join(", "))]
    PriorityTie {
        required: String,
        priority: i32,
        candidates: Vec<String>,
    },

    /// An injection point of a component could not be satisfied
    #[error("Unsatisfied dependency expressed through {injection_point} of component '{component}': {source}")]
    UnsatisfiedDependency {
        component: String,
        injection_point: String,
        #[source]
        source: Box<ContainerError>,
    },

    /// The component is already being created further up the call stack
    ///
    /// Raised for constructor cycles, cycles through non-shared components and setter
    /// cycles when circular references are disabled.
    #[error("Requested component '{0}' is currently in creation: is there an unresolvable circular reference?")]
    CurrentlyInCreation(String),

    /// Two components name each other in their explicit `depends_on` lists
    #[error("Circular depends-on relationship between '{component}' and '{dependency}'")]
    CircularDependsOn {
        component: String,
        dependency: String,
    },

    /// A raw early reference was handed out but the final object is a wrapper
    ///
    /// Recovery: make sure early-reference hooks produce the same wrapper as the
    /// post-initialisation hooks, or enable `allow_raw_injection_despite_wrapping`.
    #[error(
        "Component '{component}' has been injected into other components [{}] in its raw version as part of a circular reference, but has eventually been wrapped. This means that said other components do not use the final version of the component",
        .dependents.join(", ")
    )]
    RawReferenceWrapped {
        component: String,
        dependents: Vec<String>,
    },

    /// The class named by a descriptor cannot be loaded
    #[error("Cannot find class '{class}' for component '{component}'")]
    ClassNotFound { component: String, class: String },

    /// The descriptor is inconsistent
    #[error("Invalid descriptor for component '{component}': {reason}")]
    InvalidDescriptor { component: String, reason: String },

    /// A descriptor with the same name exists and overriding is disabled
    #[error("Cannot register descriptor for component '{component}': there is already '{existing}' bound")]
    DescriptorOverride { component: String, existing: String },

    /// A singleton with the same name was already registered
    #[error("Could not register object under name '{0}': there is already an object bound")]
    DuplicateSingleton(String),

    /// The descriptor store is frozen
    #[error("Cannot register component '{0}': the container configuration is frozen")]
    ConfigurationFrozen(String),

    /// Creation of a component failed; `source` holds the cause
    #[error("Error creating component '{component}': {source}")]
    CreationFailed {
        component: String,
        #[source]
        source: Box<ContainerError>,
    },

    /// The selected constructor, factory method or supplier failed
    #[error("Failed to instantiate component '{component}': {source}")]
    Instantiation {
        component: String,
        #[source]
        source: InvocationError,
    },

    /// No constructor or factory method could be satisfied
    #[error("Could not resolve matching constructor on component '{component}'{}", causes_suffix(.causes))]
    NoMatchingConstructor {
        component: String,
        causes: Vec<String>,
    },

    /// Several candidates matched with the same weight under strict resolution
    #[error("Ambiguous constructor matches found on component '{component}': {}", .candidates.join(" | "))]
    AmbiguousConstructor {
        component: String,
        candidates: Vec<String>,
    },

    /// A property value could not be applied
    #[error("Invalid property '{property}' of component '{component}': {source}")]
    InvalidProperty {
        component: String,
        property: String,
        #[source]
        source: InvocationError,
    },

    /// A component of the wrong type was found under the name
    #[error("Component '{component}' is expected to be of type '{required}' but was actually of type '{actual}'")]
    NotOfRequiredType {
        component: String,
        required: String,
        actual: String,
    },

    /// Singletons are being destroyed
    #[error("Creation of component '{0}' not allowed while singletons of this container are in destruction")]
    CreationNotAllowed(String),

    #[error("Invocation failed: {0}")]
    Invocation(#[from] InvocationError),

    #[error("Proxy error: {0}")]
    Aop(#[from] AopError),

    #[error("Class loading error: {0}")]
    Class(#[from] ClassError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    /// Wrap `source` as a creation failure of `component`, unless it already is one
    pub fn creation(component: &str, source: ContainerError) -> Self {
        if let ContainerError::CreationFailed { component: inner, .. } = &source {
            if inner == component {
                return source;
            }
        }
        ContainerError::CreationFailed {
            component: component.to_string(),
            source: Box::new(source),
        }
    }

    /// Innermost container error, skipping creation and dependency wrappers
    pub fn root_cause(&self) -> &ContainerError {
        match self {
            ContainerError::CreationFailed { source, .. }
            | ContainerError::UnsatisfiedDependency { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn requester_suffix(requester: &Option<String>) -> String {
    match requester {
        Some(name) => format!(" for component '{}'", name),
        None => String::new(),
    }
}

fn causes_suffix(causes: &[String]) -> String {
    if causes.is_empty() {
        String::new()
    } else {
        format!(": {}", causes.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_does_not_double_wrap() {
        let err = ContainerError::creation("a", ContainerError::NoSuchComponent("b".to_string()));
        let err = ContainerError::creation("a", err);
        match &err {
            ContainerError::CreationFailed { component, source } => {
                assert_eq!(component, "a");
                assert!(matches!(**source, ContainerError::NoSuchComponent(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_root_cause() {
        let err = ContainerError::creation(
            "a",
            ContainerError::UnsatisfiedDependency {
                component: "a".to_string(),
                injection_point: "property 'b'".to_string(),
                source: Box::new(ContainerError::CurrentlyInCreation("b".to_string())),
            },
        );
        assert!(matches!(err.root_cause(), ContainerError::CurrentlyInCreation(name) if name == "b"));
    }

    #[test]
    fn test_messages() {
        let err = ContainerError::NoSuchComponentOfType {
            required: "Repository".to_string(),
            requester: Some("service".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "No qualifying component of type 'Repository' available for component 'service'"
        );

        let err = ContainerError::NoMatchingConstructor {
            component: "z".to_string(),
            causes: vec![],
        };
        assert_eq!(err.to_string(), "Could not resolve matching constructor on component 'z'");
    }
}
