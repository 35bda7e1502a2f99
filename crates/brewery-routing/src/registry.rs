//! Resource registry.
//!
//! Actions, controllers and constraints are registered up front as factories
//! keyed by their [`ResourceLocation`]. A route instantiates a fresh resource
//! per request from its factory; nothing is looked up by reflection.
//!
//! ```rust
//! use brewery_routing::{Methods, ResourceRegistry};
//!
//! let registry = ResourceRegistry::new()
//!     .controller("AccountController", || {
//!         Methods::new().on("get", |_params, _ctx| Ok("account".to_string()))
//!     })
//!     .component("AdminComponent", |admin| {
//!         admin
//!             .constraints(["Authenticated"])
//!             .constraint("Authenticated", || Methods::new().on("validate", |_, _| Ok(true)));
//!     });
//!
//! assert!(registry.has_component("AdminComponent"));
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::callback::{CallbackKind, ResourceLocation, Scope};
use crate::context::RequestContext;

/// Result of invoking a method on a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation<T> {
    /// The method exists and returned a value.
    Returned(T),
    /// The resource does not implement the method.
    NotImplemented,
}

impl<T> Invocation<T> {
    pub fn is_implemented(&self) -> bool {
        matches!(self, Invocation::Returned(_))
    }

    pub fn returned(self) -> Option<T> {
        match self {
            Invocation::Returned(value) => Some(value),
            Invocation::NotImplemented => None,
        }
    }
}

/// A routed resource: an action, a controller or a constraint.
pub trait Callable {
    /// What the resource's methods return.
    type Output;

    /// Names of the callbacks this resource implements.
    fn methods(&self) -> Vec<String>;

    /// Invokes `method` with the route parameters.
    fn call(
        &mut self,
        method: &str,
        parameters: &[Value],
        ctx: &mut RequestContext,
    ) -> Result<Invocation<Self::Output>, anyhow::Error>;
}

type MethodFn<T> = Box<dyn FnMut(&[Value], &mut RequestContext) -> Result<T, anyhow::Error>>;

/// A [`Callable`] built from closures, one per callback name.
///
/// Method names match case-insensitively, like method dispatch on the
/// resources this replaces.
pub struct Methods<T> {
    methods: Vec<(String, MethodFn<T>)>,
}

impl<T> Methods<T> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
        }
    }

    /// Adds a callback. A later callback with the same name replaces the earlier one.
    pub fn on<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&[Value], &mut RequestContext) -> Result<T, anyhow::Error> + 'static,
    {
        let name = name.into();
        self.methods
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.methods.push((name, Box::new(f)));
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<T> Default for Methods<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Methods<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Methods")
            .field("methods", &self.names().join(", "))
            .finish()
    }
}

impl<T> Methods<T> {
    fn names(&self) -> Vec<String> {
        self.methods.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl<T> Callable for Methods<T> {
    type Output = T;

    fn methods(&self) -> Vec<String> {
        self.names()
    }

    fn call(
        &mut self,
        method: &str,
        parameters: &[Value],
        ctx: &mut RequestContext,
    ) -> Result<Invocation<T>, anyhow::Error> {
        match self
            .methods
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(method))
        {
            Some((_, f)) => f(parameters, ctx).map(Invocation::Returned),
            None => Ok(Invocation::NotImplemented),
        }
    }
}

/// Boxed resource as stored on a route.
pub type BoxedCallable<T> = Box<dyn Callable<Output = T>>;

type Factory<T> = Box<dyn Fn() -> BoxedCallable<T>>;

fn boxed_factory<F, C>(factory: F) -> Factory<C::Output>
where
    F: Fn() -> C + 'static,
    C: Callable + 'static,
    C::Output: 'static,
{
    Box::new(move || Box::new(factory()) as BoxedCallable<C::Output>)
}

/// Factory table for every routable resource of an application.
#[derive(Default)]
pub struct ResourceRegistry {
    actions: HashMap<ResourceLocation, Factory<Value>>,
    controllers: HashMap<ResourceLocation, Factory<String>>,
    constraints: HashMap<ResourceLocation, Factory<bool>>,
    components: HashMap<String, Vec<String>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an application-level action.
    pub fn action<F, C>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = Value> + 'static,
    {
        self.insert_action(Scope::Application, name, factory);
        self
    }

    /// Registers an application-level controller.
    pub fn controller<F, C>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = String> + 'static,
    {
        self.insert_controller(Scope::Application, name, factory);
        self
    }

    /// Registers an application-level constraint.
    pub fn constraint<F, C>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = bool> + 'static,
    {
        self.insert_constraint(Scope::Application, name, factory);
        self
    }

    /// Registers resources scoped to a component.
    pub fn component<F>(mut self, identifier: &str, f: F) -> Self
    where
        F: FnOnce(&mut ComponentScope<'_>),
    {
        self.components.entry(identifier.to_string()).or_default();
        let mut scope = ComponentScope {
            registry: &mut self,
            identifier: identifier.to_string(),
        };
        f(&mut scope);
        self
    }

    fn insert_action<F, C>(&mut self, scope: Scope, name: &str, factory: F)
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = Value> + 'static,
    {
        let location = ResourceLocation::new(scope, CallbackKind::Action, name);
        self.actions.insert(location, boxed_factory(factory));
    }

    fn insert_controller<F, C>(&mut self, scope: Scope, name: &str, factory: F)
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = String> + 'static,
    {
        let location = ResourceLocation::new(scope, CallbackKind::Controller, name);
        self.controllers.insert(location, boxed_factory(factory));
    }

    fn insert_constraint<F, C>(&mut self, scope: Scope, name: &str, factory: F)
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = bool> + 'static,
    {
        let location = ResourceLocation::new(scope, CallbackKind::Constraint, name);
        self.constraints.insert(location, boxed_factory(factory));
    }

    pub fn instantiate_action(&self, location: &ResourceLocation) -> Option<BoxedCallable<Value>> {
        self.actions.get(location).map(|factory| factory())
    }

    pub fn instantiate_controller(
        &self,
        location: &ResourceLocation,
    ) -> Option<BoxedCallable<String>> {
        self.controllers.get(location).map(|factory| factory())
    }

    pub fn instantiate_constraint(
        &self,
        location: &ResourceLocation,
    ) -> Option<BoxedCallable<bool>> {
        self.constraints.get(location).map(|factory| factory())
    }

    /// Whether any resource of the given kind is registered at `location`.
    pub fn contains(&self, location: &ResourceLocation) -> bool {
        match location.kind {
            CallbackKind::Action => self.actions.contains_key(location),
            CallbackKind::Controller => self.controllers.contains_key(location),
            CallbackKind::Constraint => self.constraints.contains_key(location),
        }
    }

    pub fn has_component(&self, identifier: &str) -> bool {
        self.components.contains_key(identifier)
    }

    /// Constraint names every route into the component must satisfy.
    pub fn component_constraints(&self, identifier: &str) -> &[String] {
        self.components
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("actions", &self.actions.len())
            .field("controllers", &self.controllers.len())
            .field("constraints", &self.constraints.len())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Registration handle for one component's resources.
pub struct ComponentScope<'a> {
    registry: &'a mut ResourceRegistry,
    identifier: String,
}

impl ComponentScope<'_> {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn action<F, C>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = Value> + 'static,
    {
        let scope = Scope::component(self.identifier.clone());
        self.registry.insert_action(scope, name, factory);
        self
    }

    pub fn controller<F, C>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = String> + 'static,
    {
        let scope = Scope::component(self.identifier.clone());
        self.registry.insert_controller(scope, name, factory);
        self
    }

    pub fn constraint<F, C>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> C + 'static,
        C: Callable<Output = bool> + 'static,
    {
        let scope = Scope::component(self.identifier.clone());
        self.registry.insert_constraint(scope, name, factory);
        self
    }

    /// Appends component-level constraint names, validated before route constraints.
    pub fn constraints<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self
            .registry
            .components
            .entry(self.identifier.clone())
            .or_default();
        for name in names {
            let name = name.into();
            if !list.contains(&name) {
                list.push(name);
            }
        }
        self
    }
}
