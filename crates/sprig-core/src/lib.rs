//! Object model for the sprig container
//!
//! Managed classes describe themselves through [`ClassInfo`] capability tables instead
//! of runtime reflection. The container and the proxy subsystem build, wire and
//! intercept [`Object`] handles exclusively through these tables.

pub mod class;
pub mod convert;
pub mod error;
pub mod loader;
pub mod logging;
pub mod object;
pub mod value;

pub use class::{
    ClassBuilder, ClassInfo, ConstructorFn, ConstructorInfo, FactoryFn, FactoryMethodInfo,
    MethodFn, MethodInfo, MethodKey, MethodKind, Param, PropertyInfo, SetterFn, Visibility,
};
pub use convert::{DefaultTypeConverter, LiteralEvaluator, TypeConverter, ValueEvaluator};
pub use error::{ClassError, InvocationError, Result};
pub use loader::{discovered_class_count, list_discovered_classes, ClassLoader, ClassRegistration};
pub use logging::{init_logging, LogLevel, LoggingConfig};
pub use object::Object;
pub use value::{TypeRef, Value};

/// Marker interface: receives its component name before initialisation
pub const COMPONENT_NAME_AWARE: &str = "sprig::ComponentNameAware";
/// Method invoked on [`COMPONENT_NAME_AWARE`] components
pub const SET_COMPONENT_NAME: &str = "set_component_name";
/// Marker interface: framework init callback after population
pub const INITIALIZING: &str = "sprig::Initializing";
/// Method invoked on [`INITIALIZING`] components
pub const AFTER_PROPERTIES_SET: &str = "after_properties_set";
/// Marker interface: framework destroy callback
pub const DISPOSABLE: &str = "sprig::Disposable";
/// Method invoked on [`DISPOSABLE`] components
pub const DESTROY: &str = "destroy";
