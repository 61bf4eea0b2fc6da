//! Pointcuts: where advice applies
//!
//! A [`Pointcut`] pairs a [`ClassFilter`] with a [`MethodMatcher`]. Both are evaluated
//! once per method when a chain is assembled. Runtime matchers additionally get a say
//! on every call, with the actual arguments at hand.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use sprig_core::{ClassInfo, MethodInfo, Value};

use crate::error::{AopError, Result};

/// Restricts a pointcut to a set of target classes
pub trait ClassFilter: Send + Sync {
    fn matches(&self, class: &ClassInfo) -> bool;
}

impl<F> ClassFilter for F
where
    F: Fn(&ClassInfo) -> bool + Send + Sync,
{
    fn matches(&self, class: &ClassInfo) -> bool {
        self(class)
    }
}

/// Restricts a pointcut to a set of methods
pub trait MethodMatcher: Send + Sync {
    /// Static check, evaluated when the chain is built
    fn matches(&self, method: &MethodInfo, target_class: &ClassInfo) -> bool;

    /// Whether [`matches_runtime`](Self::matches_runtime) must run on every call
    fn is_runtime(&self) -> bool {
        false
    }

    /// Per-call check, only consulted when the static check passed
    fn matches_runtime(&self, _method: &MethodInfo, _target_class: &ClassInfo, _args: &[Value]) -> bool {
        true
    }
}

struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches(&self, _class: &ClassInfo) -> bool {
        true
    }
}

struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    fn matches(&self, _method: &MethodInfo, _target_class: &ClassInfo) -> bool {
        true
    }
}

/// Matches classes that are, extend or implement the given name
pub struct ClassNameFilter {
    name: String,
}

impl ClassNameFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ClassFilter for ClassNameFilter {
    fn matches(&self, class: &ClassInfo) -> bool {
        class.is_a(&self.name)
    }
}

/// Matches method names against simple `*` wildcard patterns
pub struct NameMatchMethodMatcher {
    patterns: Vec<String>,
}

impl NameMatchMethodMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

impl MethodMatcher for NameMatchMethodMatcher {
    fn matches(&self, method: &MethodInfo, _target_class: &ClassInfo) -> bool {
        self.patterns.iter().any(|p| simple_match(p, &method.name))
    }
}

/// Matches `Class.method` against regular expressions (full match)
pub struct RegexMethodMatcher {
    patterns: Vec<Regex>,
}

impl RegexMethodMatcher {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{})$", p)).map_err(|e| AopError::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl MethodMatcher for RegexMethodMatcher {
    fn matches(&self, method: &MethodInfo, target_class: &ClassInfo) -> bool {
        let qualified = format!("{}.{}", target_class.name(), method.name);
        self.patterns.iter().any(|re| re.is_match(&qualified))
    }
}

/// Static method matcher from a closure
pub struct FnMethodMatcher<F>(pub F);

impl<F> MethodMatcher for FnMethodMatcher<F>
where
    F: Fn(&MethodInfo, &ClassInfo) -> bool + Send + Sync,
{
    fn matches(&self, method: &MethodInfo, target_class: &ClassInfo) -> bool {
        (self.0)(method, target_class)
    }
}

/// Runtime method matcher: a static pre-check plus a per-call argument check
pub struct RuntimeMethodMatcher<S, R> {
    static_check: S,
    runtime_check: R,
}

impl<S, R> RuntimeMethodMatcher<S, R>
where
    S: Fn(&MethodInfo, &ClassInfo) -> bool + Send + Sync,
    R: Fn(&MethodInfo, &[Value]) -> bool + Send + Sync,
{
    pub fn new(static_check: S, runtime_check: R) -> Self {
        Self {
            static_check,
            runtime_check,
        }
    }
}

impl<S, R> MethodMatcher for RuntimeMethodMatcher<S, R>
where
    S: Fn(&MethodInfo, &ClassInfo) -> bool + Send + Sync,
    R: Fn(&MethodInfo, &[Value]) -> bool + Send + Sync,
{
    fn matches(&self, method: &MethodInfo, target_class: &ClassInfo) -> bool {
        (self.static_check)(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        true
    }

    fn matches_runtime(&self, method: &MethodInfo, _target_class: &ClassInfo, args: &[Value]) -> bool {
        (self.runtime_check)(method, args)
    }
}

struct UnionClassFilter(Arc<dyn ClassFilter>, Arc<dyn ClassFilter>);

impl ClassFilter for UnionClassFilter {
    fn matches(&self, class: &ClassInfo) -> bool {
        self.0.matches(class) || self.1.matches(class)
    }
}

struct IntersectionClassFilter(Arc<dyn ClassFilter>, Arc<dyn ClassFilter>);

impl ClassFilter for IntersectionClassFilter {
    fn matches(&self, class: &ClassInfo) -> bool {
        self.0.matches(class) && self.1.matches(class)
    }
}

/// Union of two pointcuts; each side keeps its own class filter
struct UnionMethodMatcher {
    left: Pointcut,
    right: Pointcut,
}

impl UnionMethodMatcher {
    fn side_matches(side: &Pointcut, method: &MethodInfo, class: &ClassInfo) -> bool {
        side.class_filter.matches(class) && side.method_matcher.matches(method, class)
    }
}

impl MethodMatcher for UnionMethodMatcher {
    fn matches(&self, method: &MethodInfo, target_class: &ClassInfo) -> bool {
        Self::side_matches(&self.left, method, target_class)
            || Self::side_matches(&self.right, method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.left.method_matcher.is_runtime() || self.right.method_matcher.is_runtime()
    }

    fn matches_runtime(&self, method: &MethodInfo, target_class: &ClassInfo, args: &[Value]) -> bool {
        [&self.left, &self.right].iter().any(|side| {
            Self::side_matches(side, method, target_class)
                && (!side.method_matcher.is_runtime()
                    || side.method_matcher.matches_runtime(method, target_class, args))
        })
    }
}

struct IntersectionMethodMatcher(Arc<dyn MethodMatcher>, Arc<dyn MethodMatcher>);

impl MethodMatcher for IntersectionMethodMatcher {
    fn matches(&self, method: &MethodInfo, target_class: &ClassInfo) -> bool {
        self.0.matches(method, target_class) && self.1.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.0.is_runtime() || self.1.is_runtime()
    }

    fn matches_runtime(&self, method: &MethodInfo, target_class: &ClassInfo, args: &[Value]) -> bool {
        let left = !self.0.is_runtime() || self.0.matches_runtime(method, target_class, args);
        let right = !self.1.is_runtime() || self.1.matches_runtime(method, target_class, args);
        left && right
    }
}

/// Class filter plus method matcher
#[derive(Clone)]
pub struct Pointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
}

impl Pointcut {
    pub fn new(class_filter: Arc<dyn ClassFilter>, method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    /// Matches every method of every class
    pub fn always() -> Self {
        Self::new(Arc::new(TrueClassFilter), Arc::new(TrueMethodMatcher))
    }

    /// Methods whose name matches one of the `*` patterns
    pub fn for_methods<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            Arc::new(TrueClassFilter),
            Arc::new(NameMatchMethodMatcher::new(patterns)),
        )
    }

    /// Methods whose `Class.method` name fully matches one of the regexes
    pub fn for_regex<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(
            Arc::new(TrueClassFilter),
            Arc::new(RegexMethodMatcher::new(patterns)?),
        ))
    }

    /// Every method of classes that are, extend or implement `name`
    pub fn for_class(name: impl Into<String>) -> Self {
        Self::new(Arc::new(ClassNameFilter::new(name)), Arc::new(TrueMethodMatcher))
    }

    /// Static method check from a closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&MethodInfo, &ClassInfo) -> bool + Send + Sync + 'static,
    {
        Self::new(Arc::new(TrueClassFilter), Arc::new(FnMethodMatcher(f)))
    }

    /// Replace the class filter
    pub fn with_class_filter(mut self, filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = filter;
        self
    }

    pub fn class_filter(&self) -> &Arc<dyn ClassFilter> {
        &self.class_filter
    }

    pub fn method_matcher(&self) -> &Arc<dyn MethodMatcher> {
        &self.method_matcher
    }

    /// Matches where either pointcut matches
    pub fn union(self, other: Pointcut) -> Self {
        let class_filter = Arc::new(UnionClassFilter(
            self.class_filter.clone(),
            other.class_filter.clone(),
        ));
        Self::new(
            class_filter,
            Arc::new(UnionMethodMatcher {
                left: self,
                right: other,
            }),
        )
    }

    /// Matches where both pointcuts match
    pub fn intersection(self, other: Pointcut) -> Self {
        Self::new(
            Arc::new(IntersectionClassFilter(self.class_filter, other.class_filter)),
            Arc::new(IntersectionMethodMatcher(
                self.method_matcher,
                other.method_matcher,
            )),
        )
    }

    /// Static evaluation against a method of `class`
    pub fn matches(&self, method: &MethodInfo, class: &ClassInfo) -> bool {
        self.class_filter.matches(class) && self.method_matcher.matches(method, class)
    }

    /// Identity comparison of filter and matcher
    pub fn same_as(&self, other: &Pointcut) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.class_filter) as *const (),
            Arc::as_ptr(&other.class_filter) as *const (),
        ) && std::ptr::eq(
            Arc::as_ptr(&self.method_matcher) as *const (),
            Arc::as_ptr(&other.method_matcher) as *const (),
        )
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut")
            .field("runtime", &self.method_matcher.is_runtime())
            .finish()
    }
}

/// Wildcard match where `*` stands for any run of characters
pub fn simple_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !text.starts_with(first) || text.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &text[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
