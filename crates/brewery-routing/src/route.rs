//! The route aggregate.
//!
//! A [`Route`] is built fresh for every dispatch. It owns one action, one
//! controller, at most one component and an ordered list of constraints, and
//! drives them through the same sequence every time:
//!
//! 1. [`Route::import_resources`] instantiates every resource from the
//!    registry. Optional resources that are not registered are skipped.
//! 2. [`Route::validate`] runs the constraints in order and stops at the
//!    first failure.
//! 3. [`Route::invoke_action`] runs the action hook, whose result becomes the
//!    controller's last parameter.
//! 4. [`Route::invoke_controller`] runs the controller and yields the body.

use serde_json::Value;
use tracing::{debug, warn};

use crate::callback::{CallbackDescriptor, ResourceLocation};
use crate::component::Component;
use crate::context::RequestContext;
use crate::error::RouterError;
use crate::registry::{BoxedCallable, Invocation, ResourceRegistry};
use crate::route_map::callback_verb;

struct Resources {
    action: Option<BoxedCallable<Value>>,
    controller: Option<BoxedCallable<String>>,
    constraints: Vec<Option<BoxedCallable<bool>>>,
}

/// One request's action, controller, component and constraints.
pub struct Route {
    action: CallbackDescriptor,
    controller: CallbackDescriptor,
    component: Option<Component>,
    constraints: Vec<CallbackDescriptor>,
    resources: Option<Resources>,
}

impl Route {
    pub fn new(action: CallbackDescriptor, controller: CallbackDescriptor) -> Self {
        Self {
            action,
            controller,
            component: None,
            constraints: Vec::new(),
            resources: None,
        }
    }

    /// Registers the route's component along with its constraints.
    ///
    /// A route has at most one component; registering another is an error.
    pub fn register_component(&mut self, component: Component) -> Result<(), RouterError> {
        if let Some(existing) = &self.component {
            return Err(RouterError::ComponentAlreadyRegistered {
                existing: existing.identifier().to_string(),
                requested: component.identifier().to_string(),
            });
        }
        for name in component.constraints() {
            self.register_constraint(CallbackDescriptor::constraint(name.as_str()));
        }
        self.component = Some(component);
        Ok(())
    }

    /// Adds a constraint unless one with the same name and scope is registered.
    pub fn register_constraint(&mut self, constraint: CallbackDescriptor) {
        let duplicate = self.constraints.iter().any(|c| {
            c.name() == constraint.name()
                && c.ignores_component_scope() == constraint.ignores_component_scope()
        });
        if !duplicate {
            self.constraints.push(constraint);
        }
    }

    pub fn action(&self) -> &CallbackDescriptor {
        &self.action
    }

    pub fn controller(&self) -> &CallbackDescriptor {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CallbackDescriptor {
        &mut self.controller
    }

    pub fn component(&self) -> Option<&Component> {
        self.component.as_ref()
    }

    pub fn constraints(&self) -> &[CallbackDescriptor] {
        &self.constraints
    }

    fn component_id(&self) -> Option<&str> {
        self.component.as_ref().map(Component::identifier)
    }

    /// Instantiates every resource of the route.
    pub fn import_resources(&mut self, registry: &ResourceRegistry) -> Result<(), RouterError> {
        let component = self.component_id();

        let action = import(&self.action, component, |l| registry.instantiate_action(l))?;
        let controller = import(&self.controller, component, |l| {
            registry.instantiate_controller(l)
        })?;
        let constraints = self
            .constraints
            .iter()
            .map(|c| import(c, component, |l| registry.instantiate_constraint(l)))
            .collect::<Result<Vec<_>, _>>()?;

        self.resources = Some(Resources {
            action,
            controller,
            constraints,
        });
        Ok(())
    }

    fn resources_mut(&mut self) -> &mut Resources {
        self.resources.get_or_insert_with(|| Resources {
            action: None,
            controller: None,
            constraints: Vec::new(),
        })
    }

    /// Runs every constraint in registration order, failing on the first one
    /// that does not pass.
    pub fn validate(&mut self, ctx: &mut RequestContext) -> Result<(), RouterError> {
        let descriptors = self.constraints.clone();
        let resources = self.resources_mut();

        for (descriptor, resource) in descriptors.iter().zip(resources.constraints.iter_mut()) {
            let Some(resource) = resource else {
                continue;
            };
            match call(resource, descriptor, ctx)? {
                Invocation::Returned(true) => {
                    debug!("Constraint {} passed", descriptor.name());
                }
                Invocation::Returned(false) => {
                    warn!("Constraint {} failed", descriptor.name());
                    return Err(RouterError::ConstraintFailed {
                        constraint: descriptor.name().to_string(),
                    });
                }
                Invocation::NotImplemented => {
                    return Err(RouterError::NotImplemented {
                        resource: descriptor.name().to_string(),
                        method: descriptor.method().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Runs the action hook. A missing action, or one that does not implement
    /// the callback, yields `null`.
    pub fn invoke_action(&mut self, ctx: &mut RequestContext) -> Result<Value, RouterError> {
        let descriptor = self.action.clone();
        match self.resources_mut().action.as_mut() {
            Some(action) => Ok(call(action, &descriptor, ctx)?
                .returned()
                .unwrap_or(Value::Null)),
            None => Ok(Value::Null),
        }
    }

    /// Runs the controller and returns the response body.
    ///
    /// When the controller does not implement the callback, the response is
    /// set to 405 with an `Allow` header listing the verbs it does implement
    /// (possibly none) and the request fails with
    /// [`RouterError::NotImplemented`].
    pub fn invoke_controller(&mut self, ctx: &mut RequestContext) -> Result<String, RouterError> {
        let descriptor = self.controller.clone();
        let location = descriptor.location(self.component_id()).to_string();
        let Some(controller) = self.resources_mut().controller.as_mut() else {
            return Err(RouterError::ResourceNotFound { location });
        };

        match call(controller, &descriptor, ctx)? {
            Invocation::Returned(body) => Ok(body),
            Invocation::NotImplemented => {
                let allowed = allowed_verbs(&controller.methods());
                ctx.response.set_status(405);
                ctx.response.set_header("Allow", allowed.join(", "));
                warn!(
                    "{} does not implement {}",
                    descriptor.name(),
                    descriptor.method()
                );
                Err(RouterError::NotImplemented {
                    resource: descriptor.name().to_string(),
                    method: descriptor.method().to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("action", &self.action)
            .field("controller", &self.controller)
            .field("component", &self.component)
            .field("constraints", &self.constraints)
            .field("imported", &self.resources.is_some())
            .finish()
    }
}

fn import<T>(
    descriptor: &CallbackDescriptor,
    component: Option<&str>,
    lookup: impl Fn(&ResourceLocation) -> Option<BoxedCallable<T>>,
) -> Result<Option<BoxedCallable<T>>, RouterError> {
    let location = descriptor.location(component);
    match lookup(&location) {
        Some(resource) => Ok(Some(resource)),
        None if descriptor.is_optional() => {
            debug!("Optional resource {} is not registered", location);
            Ok(None)
        }
        None => Err(RouterError::ResourceNotFound {
            location: location.to_string(),
        }),
    }
}

fn call<T>(
    resource: &mut BoxedCallable<T>,
    descriptor: &CallbackDescriptor,
    ctx: &mut RequestContext,
) -> Result<Invocation<T>, RouterError> {
    resource
        .call(descriptor.method(), descriptor.parameters(), ctx)
        .map_err(|source| RouterError::Handler {
            resource: descriptor.name().to_string(),
            method: descriptor.method().to_string(),
            source,
        })
}

/// Uppercase HTTP verbs answered by the given callback names, deduplicated.
fn allowed_verbs(methods: &[String]) -> Vec<String> {
    let mut verbs: Vec<String> = Vec::new();
    for verb in methods.iter().filter_map(|m| callback_verb(m)) {
        let verb = verb.as_str().to_uppercase();
        if !verbs.contains(&verb) {
            verbs.push(verb);
        }
    }
    verbs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::Methods;
    use serde_json::json;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    fn route(callback: &str) -> Route {
        Route::new(
            CallbackDescriptor::action("AccountAction", callback),
            CallbackDescriptor::controller("AccountController", callback),
        )
    }

    #[test]
    fn test_register_component_once() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("AdminComponent")).unwrap();
        fs::create_dir(root.path().join("ShopComponent")).unwrap();

        let mut route = route("get");
        route
            .register_component(Component::new("AdminComponent", root.path(), vec![]).unwrap())
            .unwrap();
        let err = route
            .register_component(Component::new("ShopComponent", root.path(), vec![]).unwrap())
            .unwrap_err();
        assert!(matches!(err, RouterError::ComponentAlreadyRegistered { .. }));
        assert_eq!(route.component().unwrap().identifier(), "AdminComponent");
    }

    #[test]
    fn test_component_constraints_come_first_and_dedupe() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("AdminComponent")).unwrap();

        let mut route = route("get");
        let component = Component::new(
            "AdminComponent",
            root.path(),
            vec!["Authenticated".into()],
        )
        .unwrap();
        route.register_component(component).unwrap();
        route.register_constraint(CallbackDescriptor::constraint("Authenticated"));
        route.register_constraint(CallbackDescriptor::constraint("/Authenticated"));
        route.register_constraint(CallbackDescriptor::constraint("Admin"));

        let names: Vec<(&str, bool)> = route
            .constraints()
            .iter()
            .map(|c| (c.name(), c.ignores_component_scope()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Authenticated", false),
                ("Authenticated", true),
                ("Admin", false)
            ]
        );
    }

    #[test]
    fn test_import_missing_mandatory_controller() {
        let registry = ResourceRegistry::new();
        let mut route = route("get");
        let err = route.import_resources(&registry).unwrap_err();
        match err {
            RouterError::ResourceNotFound { location } => {
                assert_eq!(location, "app/Controllers/AccountController")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_action_result_is_null_without_action() {
        let registry = ResourceRegistry::new().controller("AccountController", || {
            Methods::new().on("get", |_, _| Ok("ok".to_string()))
        });
        let mut route = route("get");
        route.import_resources(&registry).unwrap();
        let mut ctx = RequestContext::default();
        assert_eq!(route.invoke_action(&mut ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_validate_fails_fast() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let first = calls.clone();
        let second = calls.clone();
        let registry = ResourceRegistry::new()
            .controller("AccountController", || {
                Methods::new().on("get", |_, _| Ok(String::new()))
            })
            .constraint("Closed", move || {
                let calls = first.clone();
                Methods::new().on("validate", move |_, _| {
                    calls.borrow_mut().push("Closed");
                    Ok(false)
                })
            })
            .constraint("Never", move || {
                let calls = second.clone();
                Methods::new().on("validate", move |_, _| {
                    calls.borrow_mut().push("Never");
                    Ok(true)
                })
            });

        let mut route = route("get");
        route.register_constraint(CallbackDescriptor::constraint("Closed"));
        route.register_constraint(CallbackDescriptor::constraint("Never"));
        route.import_resources(&registry).unwrap();

        let err = route.validate(&mut RequestContext::default()).unwrap_err();
        assert!(matches!(err, RouterError::ConstraintFailed { ref constraint } if constraint == "Closed"));
        assert_eq!(*calls.borrow(), vec!["Closed"]);
    }

    #[test]
    fn test_constraint_without_validate() {
        let registry = ResourceRegistry::new()
            .controller("AccountController", || {
                Methods::new().on("get", |_, _| Ok(String::new()))
            })
            .constraint("Lazy", || Methods::new().on("check", |_, _| Ok(true)));

        let mut route = route("get");
        route.register_constraint(CallbackDescriptor::constraint("Lazy"));
        route.import_resources(&registry).unwrap();

        let mut ctx = RequestContext::default();
        let err = route.validate(&mut ctx).unwrap_err();
        assert!(matches!(err, RouterError::NotImplemented { .. }));
        assert_eq!(ctx.response.status().as_u16(), 200);
    }

    #[test]
    fn test_controller_not_implemented_sets_allow() {
        let registry = ResourceRegistry::new().controller("AccountController", || {
            Methods::new()
                .on("getAccount", |_, _| Ok(String::new()))
                .on("ajaxPost", |_, _| Ok(String::new()))
                .on("get", |_, _| Ok(String::new()))
                .on("helper", |_, _| Ok(String::new()))
        });
        let mut route = route("delete");
        route.import_resources(&registry).unwrap();

        let mut ctx = RequestContext::default();
        let err = route.invoke_controller(&mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Typehint);
        assert_eq!(
            err.to_string(),
            "route callback AccountController::delete does not exist"
        );
        assert_eq!(ctx.response.status().as_u16(), 405);
        assert_eq!(ctx.response.header("Allow"), Some("GET, POST"));
    }

    #[test]
    fn test_controller_without_verbs_sends_empty_allow() {
        let registry = ResourceRegistry::new().controller("AccountController", || {
            Methods::new().on("helper", |_, _| Ok(String::new()))
        });
        let mut route = route("delete");
        route.import_resources(&registry).unwrap();

        let mut ctx = RequestContext::default();
        let err = route.invoke_controller(&mut ctx).unwrap_err();
        assert!(matches!(err, RouterError::NotImplemented { .. }));
        assert_eq!(ctx.response.status().as_u16(), 405);
        assert_eq!(ctx.response.header("Allow"), Some(""));
    }

    #[test]
    fn test_controller_receives_parameters() {
        let registry = ResourceRegistry::new().controller("AccountController", || {
            Methods::new().on("get", |params, _| Ok(serde_json::to_string(params)?))
        });
        let mut route = route("get");
        route.import_resources(&registry).unwrap();
        route
            .controller_mut()
            .set_parameters(vec![json!("42"), json!({"plan": "pro"})]);

        let body = route
            .invoke_controller(&mut RequestContext::default())
            .unwrap();
        assert_eq!(body, r#"["42",{"plan":"pro"}]"#);
    }

    #[test]
    fn test_handler_error_is_wrapped() {
        let registry = ResourceRegistry::new().controller("AccountController", || {
            Methods::new().on("get", |_, _| -> Result<String, anyhow::Error> {
                anyhow::bail!("database unavailable")
            })
        });
        let mut route = route("get");
        route.import_resources(&registry).unwrap();
        let err = route
            .invoke_controller(&mut RequestContext::default())
            .unwrap_err();
        assert!(matches!(err, RouterError::Handler { .. }));
        assert!(err.to_string().contains("database unavailable"));
    }
}
