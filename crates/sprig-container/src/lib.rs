//! Managed-object container for sprig
//!
//! A [`Container`] holds [`ComponentDescriptor`]s by name and turns them into shared
//! singletons or fresh prototypes on request. Creation walks a fixed lifecycle:
//! instantiation (supplier, factory method or the best matching constructor),
//! property population, initialisation callbacks and [`LifecycleHook`]s, and finally
//! registration for destruction. Setter cycles between singletons are resolved through
//! early references kept in the staged [`SingletonRegistry`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sprig_container::{ComponentDescriptor, Container, DescriptorValue};
//!
//! let container = Container::new();
//! container.define_class(repository_class())?;
//! container.define_class(service_class())?;
//!
//! container.register("repository", ComponentDescriptor::for_class("MemoryRepository"))?;
//! container.register(
//!     "orderService",
//!     ComponentDescriptor::for_class("OrderService")
//!         .with_property("repository", DescriptorValue::reference("repository")),
//! )?;
//!
//! let service = container.get("orderService")?;
//! container.close();
//! ```
//!
//! Components can also be contributed by any linked crate; see [`registration`].

pub mod autoproxy;
pub mod config;
pub mod container;
pub mod descriptor;
pub mod error;
pub mod hooks;
mod instantiation;
mod lifecycle;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod store;

pub use autoproxy::AutoProxyCreator;
pub use config::{ConfigLoader, ContainerConfig};
pub use container::{Container, ContainerBuilder};
pub use descriptor::{
    ArgumentValue, AutowireMode, ComponentDescriptor, ConstructorArgs, DescriptorValue,
    InstanceSupplier, PropertyValues, Scope,
};
pub use error::{ContainerError, Result};
pub use hooks::{HookRegistry, LifecycleHook};
pub use registration::{
    discovered_registration_count, list_discovered_registrations,
    register_all_discovered_components, ComponentRegistration,
};
pub use registry::SingletonRegistry;
pub use resolver::DependencyDescriptor;
pub use store::DescriptorStore;

// Re-exported so registrations can be submitted without a direct dependency
pub use inventory;
