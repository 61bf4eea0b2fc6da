//! Constructor and factory-method resolution
//!
//! Picks the executable that builds a component and the arguments it is called with.
//! Candidates are tried greediest first (public before private, then by descending
//! parameter count); each one whose arguments can all be supplied gets a type
//! difference weight and the lightest wins. The choice is cached on the descriptor
//! so later prototype instances skip the search.

use std::collections::HashSet;
use std::sync::Arc;

use sprig_core::{ClassInfo, Object, Param, TypeRef, Value, Visibility};
use tracing::debug;

use crate::container::Container;
use crate::descriptor::{
    ArgumentValue, AutowireMode, ComponentDescriptor, ConstructionPlan, ConstructorArgs,
    DescriptorValue, PreparedArgument, ResolvedExecutable,
};
use crate::error::{ContainerError, Result};
use crate::resolver::DependencyDescriptor;

/// Weight discount applied to raw (unconverted) arguments under lenient resolution
const RAW_ARGUMENT_DISCOUNT: i64 = 1024;

struct Candidate<'c> {
    index: usize,
    params: &'c [Param],
    visibility: Visibility,
    label: String,
}

/// Arguments prepared for one candidate
struct ArgumentsHolder {
    raw: Vec<Value>,
    converted: Vec<Value>,
    prepared: Vec<PreparedArgument>,
    /// Components the arguments were resolved from
    dependencies: Vec<String>,
}

impl ArgumentsHolder {
    fn explicit(values: &[Value]) -> Self {
        Self {
            raw: values.to_vec(),
            converted: values.to_vec(),
            prepared: values.iter().cloned().map(PreparedArgument::Resolved).collect(),
            dependencies: Vec::new(),
        }
    }

    fn type_difference_weight(&self, params: &[Param]) -> i64 {
        let converted = difference_weight(params, &self.converted);
        let raw = difference_weight(params, &self.raw).saturating_sub(RAW_ARGUMENT_DISCOUNT);
        converted.min(raw)
    }

    fn assignability_weight(&self, params: &[Param]) -> i64 {
        let assignable = |args: &[Value]| params.iter().zip(args).all(|(p, a)| p.ty.matches(a));
        if !assignable(&self.converted) {
            i64::MAX
        } else if !assignable(&self.raw) {
            i64::MAX - 512
        } else {
            i64::MAX - 1024
        }
    }
}

fn difference_weight(params: &[Param], args: &[Value]) -> i64 {
    params
        .iter()
        .zip(args)
        .try_fold(0i64, |total, (param, arg)| {
            param
                .ty
                .difference_weight(arg)
                .map(|weight| total + i64::from(weight))
        })
        .unwrap_or(i64::MAX)
}

struct Selected {
    index: usize,
    args: Vec<Value>,
    prepared: Vec<PreparedArgument>,
    dependencies: Vec<String>,
}

pub(crate) struct ConstructorResolver<'a> {
    container: &'a Container,
}

impl<'a> ConstructorResolver<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Build the raw instance for `descriptor`
    pub(crate) fn instantiate(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        class: Option<&Arc<ClassInfo>>,
        explicit: Option<Vec<Value>>,
    ) -> Result<Object> {
        if explicit.is_none() {
            if let Some(supplier) = &descriptor.instance_supplier {
                return supplier().map_err(|source| ContainerError::Instantiation {
                    component: name.to_string(),
                    source,
                });
            }
            if let Some(plan) = descriptor.cached_plan() {
                return self.instantiate_from_plan(name, descriptor, class, &plan);
            }
        }

        if descriptor.factory_method_name.is_some() {
            return self.instantiate_using_factory_method(name, descriptor, explicit);
        }

        let class = require_class(name, class)?;
        let nominated = self.nominated_constructors(name, class)?;
        if nominated.is_some()
            || descriptor.autowire_mode == AutowireMode::Constructor
            || descriptor.has_constructor_args()
            || explicit.is_some()
        {
            return self.autowire_constructor(name, descriptor, class, nominated, explicit);
        }

        let index = class
            .constructors()
            .iter()
            .position(|c| c.params.is_empty())
            .ok_or_else(|| ContainerError::NoMatchingConstructor {
                component: name.to_string(),
                causes: vec![format!("class {} has no default constructor", class.name())],
            })?;
        descriptor.cache_plan(ConstructionPlan {
            executable: ResolvedExecutable::Constructor(index),
            arguments: Vec::new(),
        });
        construct(name, class, index, Vec::new())
    }

    /// Constructors nominated by a hook, or the only constructor when it takes
    /// parameters
    fn nominated_constructors(&self, name: &str, class: &ClassInfo) -> Result<Option<Vec<usize>>> {
        for hook in self.container.hooks.hooks() {
            if let Some(indices) = hook.determine_candidate_constructors(class, name)? {
                return Ok(Some(indices));
            }
        }
        match class.constructors() {
            [only] if !only.params.is_empty() => Ok(Some(vec![0])),
            _ => Ok(None),
        }
    }

    fn autowire_constructor(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        class: &Arc<ClassInfo>,
        nominated: Option<Vec<usize>>,
        explicit: Option<Vec<Value>>,
    ) -> Result<Object> {
        let autowiring =
            nominated.is_some() || descriptor.autowire_mode == AutowireMode::Constructor;
        let constructors = class.constructors();
        let indices: Vec<usize> = match nominated {
            Some(indices) => indices
                .into_iter()
                .filter(|index| *index < constructors.len())
                .collect(),
            None => (0..constructors.len()).collect(),
        };
        let candidates: Vec<Candidate<'_>> = indices
            .into_iter()
            .map(|index| {
                let constructor = &constructors[index];
                Candidate {
                    index,
                    params: &constructor.params,
                    visibility: constructor.visibility,
                    label: signature(class.name(), &constructor.params),
                }
            })
            .collect();

        let selected = self.select(name, descriptor, candidates, explicit.as_deref(), autowiring)?;
        if explicit.is_none() {
            descriptor.cache_plan(ConstructionPlan {
                executable: ResolvedExecutable::Constructor(selected.index),
                arguments: selected.prepared,
            });
        }
        construct(name, class, selected.index, selected.args)
    }

    fn instantiate_using_factory_method(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        explicit: Option<Vec<Value>>,
    ) -> Result<Object> {
        let method_name = descriptor.factory_method_name.as_deref().unwrap_or_default();
        let (factory, factory_class) = self.factory_target(name, descriptor)?;
        let is_static = factory.is_none();

        let candidates: Vec<Candidate<'_>> = factory_class
            .factory_methods()
            .iter()
            .enumerate()
            .filter(|(_, method)| method.name == method_name && method.is_static == is_static)
            .map(|(index, method)| Candidate {
                index,
                params: &method.params,
                visibility: method.visibility,
                label: signature(&format!("{}.{}", factory_class.name(), method.name), &method.params),
            })
            .collect();
        if candidates.is_empty() {
            return Err(ContainerError::InvalidDescriptor {
                component: name.to_string(),
                reason: format!(
                    "no {} factory method '{}' on class {}",
                    if is_static { "static" } else { "instance" },
                    method_name,
                    factory_class.name()
                ),
            });
        }

        let autowiring = descriptor.autowire_mode == AutowireMode::Constructor;
        let selected = self.select(name, descriptor, candidates, explicit.as_deref(), autowiring)?;
        if explicit.is_none() {
            descriptor.cache_plan(ConstructionPlan {
                executable: ResolvedExecutable::FactoryMethod(selected.index),
                arguments: selected.prepared,
            });
        }
        invoke_factory(name, &factory_class, factory.as_ref(), selected.index, selected.args)
    }

    /// Factory instance (for instance factory methods) and the class declaring the method
    fn factory_target(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
    ) -> Result<(Option<Object>, Arc<ClassInfo>)> {
        match &descriptor.factory_component_name {
            Some(factory_name) => {
                let factory_name = self.container.canonical_name(factory_name);
                if factory_name == name {
                    return Err(ContainerError::InvalidDescriptor {
                        component: name.to_string(),
                        reason: "factory component reference points back to the same component"
                            .to_string(),
                    });
                }
                let factory = self.container.get(&factory_name)?;
                self.container.registry.register_dependent(&factory_name, name);
                let class = factory.class().clone();
                Ok((Some(factory), class))
            }
            None => {
                let class_name = descriptor.class_name.as_deref().unwrap_or_default();
                Ok((None, self.container.load_class(name, class_name)?))
            }
        }
    }

    fn instantiate_from_plan(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        class: Option<&Arc<ClassInfo>>,
        plan: &ConstructionPlan,
    ) -> Result<Object> {
        let args = plan
            .arguments
            .iter()
            .map(|argument| self.replay_argument(name, argument))
            .collect::<Result<Vec<Value>>>()?;
        match plan.executable {
            ResolvedExecutable::Constructor(index) => {
                construct(name, require_class(name, class)?, index, args)
            }
            ResolvedExecutable::FactoryMethod(index) => {
                let (factory, factory_class) = self.factory_target(name, descriptor)?;
                invoke_factory(name, &factory_class, factory.as_ref(), index, args)
            }
        }
    }

    fn replay_argument(&self, name: &str, argument: &PreparedArgument) -> Result<Value> {
        match argument {
            PreparedArgument::Resolved(value) => Ok(value.clone()),
            PreparedArgument::Reresolve(value, ty) => {
                let raw = self.container.resolve_value(name, value)?;
                Ok(self.container.converter.convert(raw, ty)?)
            }
            PreparedArgument::Autowire(dependency) => self
                .container
                .resolve_dependency(dependency, Some(name))
                .map(|value| value.unwrap_or(Value::Null))
                .map_err(|source| ContainerError::UnsatisfiedDependency {
                    component: name.to_string(),
                    injection_point: dependency.injection_point.clone(),
                    source: Box::new(source),
                }),
        }
    }

    fn select(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        mut candidates: Vec<Candidate<'_>>,
        explicit: Option<&[Value]>,
        autowiring: bool,
    ) -> Result<Selected> {
        if let ([only], None) = (candidates.as_slice(), explicit) {
            if only.params.is_empty() && !descriptor.has_constructor_args() {
                return Ok(Selected {
                    index: only.index,
                    args: Vec::new(),
                    prepared: Vec::new(),
                    dependencies: Vec::new(),
                });
            }
        }

        candidates.sort_by(|a, b| {
            a.visibility
                .cmp(&b.visibility)
                .then(b.params.len().cmp(&a.params.len()))
        });

        let lenient = descriptor
            .lenient_constructor_resolution
            .unwrap_or(self.container.config.read().lenient_constructor_resolution);
        let min_args = explicit.map_or_else(|| descriptor.constructor_args.min_count(), <[Value]>::len);

        let mut best: Option<(Selected, i64, String)> = None;
        let mut ambiguous: Vec<String> = Vec::new();
        let mut causes: Vec<String> = Vec::new();
        let baseline: HashSet<String> = self
            .container
            .registry
            .dependencies_of(name)
            .into_iter()
            .collect();

        for candidate in &candidates {
            let count = candidate.params.len();
            if let Some((selected, _, _)) = &best {
                if selected.args.len() > count {
                    // Greediest satisfiable candidate found
                    break;
                }
            }
            if count < min_args {
                continue;
            }

            let holder = match explicit {
                Some(values) if values.len() == count => ArgumentsHolder::explicit(values),
                Some(_) => continue,
                None => match self.create_argument_array(name, descriptor, candidate.params, autowiring) {
                    Ok(mut holder) => {
                        holder.dependencies = self.release_new_dependencies(name, &baseline);
                        holder
                    }
                    Err(err) => {
                        self.release_new_dependencies(name, &baseline);
                        debug!(component = %name, candidate = %candidate.label, error = %err, "Ignoring candidate");
                        causes.push(format!("{}: {}", candidate.label, err));
                        continue;
                    }
                },
            };

            let weight = if lenient {
                holder.type_difference_weight(candidate.params)
            } else {
                holder.assignability_weight(candidate.params)
            };
            let best_weight = best.as_ref().map_or(i64::MAX, |(_, w, _)| *w);
            if weight < best_weight {
                best = Some((
                    Selected {
                        index: candidate.index,
                        args: holder.converted,
                        prepared: holder.prepared,
                        dependencies: holder.dependencies,
                    },
                    weight,
                    candidate.label.clone(),
                ));
                ambiguous.clear();
            } else if best.is_some() && weight == best_weight {
                ambiguous.push(candidate.label.clone());
            }
        }

        let Some((selected, _, label)) = best else {
            return Err(ContainerError::NoMatchingConstructor {
                component: name.to_string(),
                causes,
            });
        };
        if !ambiguous.is_empty() && !lenient {
            let mut candidates = vec![label];
            candidates.extend(ambiguous);
            return Err(ContainerError::AmbiguousConstructor {
                component: name.to_string(),
                candidates,
            });
        }
        for dependency in &selected.dependencies {
            self.container.registry.register_dependent(dependency, name);
        }
        debug!(component = %name, executable = %label, "Resolved constructor");
        Ok(selected)
    }

    /// Drop the dependency edges of `name` recorded since `baseline` and return them.
    /// Only the selected candidate's edges are registered again.
    fn release_new_dependencies(&self, name: &str, baseline: &HashSet<String>) -> Vec<String> {
        let registry = &self.container.registry;
        let added: Vec<String> = registry
            .dependencies_of(name)
            .into_iter()
            .filter(|dependency| !baseline.contains(dependency))
            .collect();
        for dependency in &added {
            registry.remove_dependent(dependency, name);
        }
        added
    }

    fn create_argument_array(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        params: &[Param],
        autowiring: bool,
    ) -> Result<ArgumentsHolder> {
        let args = &descriptor.constructor_args;
        let mut used_generic = vec![false; args.generic.len()];
        let mut holder = ArgumentsHolder {
            raw: Vec::with_capacity(params.len()),
            converted: Vec::with_capacity(params.len()),
            prepared: Vec::with_capacity(params.len()),
            dependencies: Vec::new(),
        };

        for (index, param) in params.iter().enumerate() {
            let configured = args
                .indexed
                .get(&index)
                .filter(|arg| arg.fits(&param.ty, param.name.as_deref()))
                .or_else(|| take_generic(args, &mut used_generic, param, false))
                .or_else(|| {
                    if autowiring {
                        None
                    } else {
                        take_generic(args, &mut used_generic, param, true)
                    }
                });
            let unsatisfied = |source: ContainerError| ContainerError::UnsatisfiedDependency {
                component: name.to_string(),
                injection_point: DependencyDescriptor::for_parameter(param, index).injection_point,
                source: Box::new(source),
            };

            match configured {
                Some(argument) => {
                    let raw = self
                        .container
                        .resolve_value(name, &argument.value)
                        .map_err(unsatisfied)?;
                    let converted = self
                        .container
                        .converter
                        .convert(raw.clone(), &param.ty)
                        .map_err(|e| unsatisfied(e.into()))?;
                    holder.prepared.push(if argument.value.needs_reresolution() {
                        PreparedArgument::Reresolve(argument.value.clone(), param.ty.clone())
                    } else {
                        PreparedArgument::Resolved(converted.clone())
                    });
                    holder.raw.push(raw);
                    holder.converted.push(converted);
                }
                None if autowiring => {
                    let dependency = DependencyDescriptor::for_parameter(param, index);
                    let value = self
                        .container
                        .resolve_dependency(&dependency, Some(name))
                        .map_err(unsatisfied)?
                        .unwrap_or(Value::Null);
                    holder.prepared.push(PreparedArgument::Autowire(dependency));
                    holder.raw.push(value.clone());
                    holder.converted.push(value);
                }
                None => {
                    return Err(unsatisfied(ContainerError::InvalidDescriptor {
                        component: name.to_string(),
                        reason: format!(
                            "ambiguous argument values for parameter of type '{}'; did you specify the correct component references as arguments?",
                            param.ty
                        ),
                    }))
                }
            }
        }
        Ok(holder)
    }
}

/// Next unused generic argument for `param`; `any` ignores type compatibility
fn take_generic<'d>(
    args: &'d ConstructorArgs,
    used: &mut [bool],
    param: &Param,
    any: bool,
) -> Option<&'d ArgumentValue> {
    let position = args.generic.iter().enumerate().position(|(i, arg)| {
        !used[i]
            && (any
                || (arg.fits(&param.ty, param.name.as_deref())
                    && (arg.ty.is_some() || arg.name.is_some() || untyped_fits(&arg.value, &param.ty))))
    })?;
    used[position] = true;
    Some(&args.generic[position])
}

/// Whether an argument without type or name can go to a parameter of `ty`
fn untyped_fits(value: &DescriptorValue, ty: &TypeRef) -> bool {
    match (value, ty) {
        (_, TypeRef::Any) => true,
        (DescriptorValue::Literal(literal), ty) => ty.matches(literal),
        (DescriptorValue::Ref(_), TypeRef::Class(_)) => true,
        (DescriptorValue::List(_), TypeRef::List(_)) => true,
        (DescriptorValue::Map(_), TypeRef::Map(_)) => true,
        _ => false,
    }
}

fn require_class<'c>(name: &str, class: Option<&'c Arc<ClassInfo>>) -> Result<&'c Arc<ClassInfo>> {
    class.ok_or_else(|| ContainerError::InvalidDescriptor {
        component: name.to_string(),
        reason: "no class to instantiate".to_string(),
    })
}

fn construct(name: &str, class: &Arc<ClassInfo>, index: usize, args: Vec<Value>) -> Result<Object> {
    let constructor = class.constructors().get(index).ok_or_else(|| {
        ContainerError::NoMatchingConstructor {
            component: name.to_string(),
            causes: vec![format!("constructor {} no longer exists on {}", index, class.name())],
        }
    })?;
    let state = constructor
        .construct(args)
        .map_err(|source| ContainerError::Instantiation {
            component: name.to_string(),
            source,
        })?;
    Ok(Object::from_boxed(class.clone(), state))
}

fn invoke_factory(
    name: &str,
    factory_class: &ClassInfo,
    factory: Option<&Object>,
    index: usize,
    args: Vec<Value>,
) -> Result<Object> {
    let method = factory_class.factory_methods().get(index).ok_or_else(|| {
        ContainerError::NoMatchingConstructor {
            component: name.to_string(),
            causes: vec![format!("factory method {} no longer exists on {}", index, factory_class.name())],
        }
    })?;
    method
        .invoke(factory, args)
        .map_err(|source| ContainerError::Instantiation {
            component: name.to_string(),
            source,
        })
}

fn signature(owner: &str, params: &[Param]) -> String {
    let params = params
        .iter()
        .map(|p| p.ty.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({})", owner, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ComponentDescriptor;
    use sprig_core::{FactoryMethodInfo, InvocationError};

    struct Pair {
        label: String,
        count: i64,
    }

    fn pair_class() -> Arc<ClassInfo> {
        ClassInfo::builder("Pair")
            .constructor(vec![Param::named("label", TypeRef::Str)], |args| {
                Ok(Pair {
                    label: args[0].as_str().unwrap_or_default().to_string(),
                    count: -1,
                })
            })
            .constructor(
                vec![Param::named("label", TypeRef::Str), Param::named("count", TypeRef::Int)],
                |args| {
                    Ok(Pair {
                        label: args[0].as_str().unwrap_or_default().to_string(),
                        count: args[1].as_int().unwrap_or_default(),
                    })
                },
            )
            .build()
    }

    fn container() -> Container {
        let container = Container::new();
        container.define_class(pair_class()).unwrap();
        container
    }

    #[test]
    fn test_greediest_satisfiable_constructor() {
        let container = container();
        container
            .register(
                "pair",
                ComponentDescriptor::for_class("Pair")
                    .with_constructor_arg(0, DescriptorValue::literal("a"))
                    .with_constructor_arg(1, DescriptorValue::literal("7")),
            )
            .unwrap();
        let pair = container.get("pair").unwrap();
        let state = pair.downcast_ref::<Pair>().unwrap();
        assert_eq!(state.label, "a");
        assert_eq!(state.count, 7);
    }

    #[test]
    fn test_constructor_with_fewer_arguments() {
        let container = container();
        container
            .register(
                "pair",
                ComponentDescriptor::for_class("Pair")
                    .with_constructor_arg(0, DescriptorValue::literal("solo")),
            )
            .unwrap();
        let pair = container.get("pair").unwrap();
        assert_eq!(pair.downcast_ref::<Pair>().unwrap().count, -1);
    }

    #[test]
    fn test_generic_argument_matched_by_name() {
        let container = container();
        container
            .register(
                "pair",
                ComponentDescriptor::for_class("Pair")
                    .with_generic_arg(ArgumentValue::new(DescriptorValue::literal(3)).named("count"))
                    .with_generic_arg(ArgumentValue::new(DescriptorValue::literal("x")).named("label")),
            )
            .unwrap();
        let pair = container.get("pair").unwrap();
        let state = pair.downcast_ref::<Pair>().unwrap();
        assert_eq!((state.label.as_str(), state.count), ("x", 3));
    }

    #[test]
    fn test_explicit_arguments_bypass_cache() {
        let container = container();
        container
            .register("pair", ComponentDescriptor::for_class("Pair").prototype())
            .unwrap();
        let first = container
            .get_with_args("pair", vec![Value::from("one"), Value::from(1)])
            .unwrap();
        let second = container.get_with_args("pair", vec![Value::from("two")]).unwrap();
        assert_eq!(first.downcast_ref::<Pair>().unwrap().count, 1);
        assert_eq!(second.downcast_ref::<Pair>().unwrap().label, "two");
        assert!(container.descriptor("pair").unwrap().cached_plan().is_none());
    }

    #[test]
    fn test_unconvertible_argument_reports_causes() {
        let container = container();
        container
            .register(
                "pair",
                ComponentDescriptor::for_class("Pair")
                    .with_constructor_arg(0, DescriptorValue::literal("a"))
                    .with_constructor_arg(1, DescriptorValue::literal("not a number")),
            )
            .unwrap();
        let err = container.get("pair").unwrap_err();
        match err.root_cause() {
            ContainerError::NoMatchingConstructor { causes, .. } => assert_eq!(causes.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_static_factory_method() {
        let container = Container::new();
        let product = ClassInfo::builder("Product").build();
        let product_class = product.clone();
        container.define_class(product).unwrap();
        container
            .define_class(
                ClassInfo::builder("ProductFactory")
                    .factory_method(FactoryMethodInfo::new(
                        "create",
                        vec![Param::named("size", TypeRef::Int)],
                        TypeRef::class("Product"),
                        true,
                        Arc::new(move |_: Option<&Object>, args: Vec<Value>| {
                            Ok(Object::new(product_class.clone(), args[0].as_int().unwrap_or(0)))
                        }),
                    ))
                    .build(),
            )
            .unwrap();
        container
            .register(
                "product",
                ComponentDescriptor::for_static_factory("ProductFactory", "create")
                    .with_constructor_arg(0, DescriptorValue::literal("12")),
            )
            .unwrap();
        let object = container.get("product").unwrap();
        assert_eq!(object.class_name(), "Product");
        assert_eq!(object.downcast_ref::<i64>(), Some(&12));
        assert_eq!(container.type_of("product").unwrap().name(), "Product");
    }

    #[test]
    fn test_supplier_failure_is_instantiation_error() {
        let container = Container::new();
        container
            .register(
                "broken",
                ComponentDescriptor::from_supplier("Broken", || Err(InvocationError::failed("boom"))),
            )
            .unwrap();
        let err = container.get("broken").unwrap_err();
        assert!(matches!(err.root_cause(), ContainerError::Instantiation { .. }));
    }

    fn either_class() -> Arc<ClassInfo> {
        ClassInfo::builder("Either")
            .constructor(vec![Param::new(TypeRef::Str)], |_| Ok("str"))
            .constructor(vec![Param::new(TypeRef::Any)], |_| Ok("any"))
            .build()
    }

    #[test]
    fn test_strict_resolution_rejects_equal_weights() {
        let container = Container::new();
        container.define_class(either_class()).unwrap();
        container
            .register(
                "strict",
                ComponentDescriptor::for_class("Either")
                    .prototype()
                    .with_lenient_constructor_resolution(false),
            )
            .unwrap();
        container
            .register("lenient", ComponentDescriptor::for_class("Either").prototype())
            .unwrap();

        let err = container.get_with_args("strict", vec![Value::from("s")]).unwrap_err();
        match err.root_cause() {
            ContainerError::AmbiguousConstructor { component, candidates } => {
                assert_eq!(component, "strict");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let lenient = container.get_with_args("lenient", vec![Value::from("s")]).unwrap();
        assert_eq!(lenient.downcast_ref::<&str>(), Some(&"str"));
    }

    #[test]
    fn test_rejected_candidate_leaves_no_dependents() {
        let container = Container::new();
        container
            .define_class(ClassInfo::builder("Used").constructor(vec![], |_| Ok(())).build())
            .unwrap();
        container
            .define_class(ClassInfo::builder("Other").constructor(vec![], |_| Ok(())).build())
            .unwrap();
        container
            .define_class(
                ClassInfo::builder("Consumer")
                    .constructor(
                        vec![
                            Param::named("used", TypeRef::class("Used")),
                            Param::named("missing", TypeRef::class("Missing")),
                        ],
                        |_| Ok("both"),
                    )
                    .constructor(vec![Param::named("other", TypeRef::class("Other"))], |_| {
                        Ok("other")
                    })
                    .build(),
            )
            .unwrap();
        container.register("used", ComponentDescriptor::for_class("Used")).unwrap();
        container.register("other", ComponentDescriptor::for_class("Other")).unwrap();
        container
            .register(
                "consumer",
                ComponentDescriptor::for_class("Consumer").with_autowire(AutowireMode::Constructor),
            )
            .unwrap();

        let consumer = container.get("consumer").unwrap();
        assert_eq!(consumer.downcast_ref::<&str>(), Some(&"other"));
        assert!(container.contains_singleton("used"));
        assert!(container.dependents_of("used").is_empty());
        assert_eq!(container.dependents_of("other"), vec!["consumer".to_string()]);
    }

    #[test]
    fn test_weights_prefer_exact_types() {
        let params = vec![Param::new(TypeRef::Any)];
        let exact = vec![Param::new(TypeRef::Str)];
        let holder = ArgumentsHolder::explicit(&[Value::from("s")]);
        assert!(holder.type_difference_weight(&exact) < holder.type_difference_weight(&params));
        assert_eq!(holder.assignability_weight(&exact), i64::MAX - 1024);
        assert_eq!(
            holder.assignability_weight(&[Param::new(TypeRef::Int)]),
            i64::MAX
        );
    }
}
