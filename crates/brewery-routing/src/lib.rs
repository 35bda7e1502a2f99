//! Route table parsing, request routing and controller dispatch.
//!
//! `brewery-routing` turns an HTTP request into a controller invocation. It
//! knows nothing about rendering: controllers return their body as a string
//! and may use whatever produces it.
//!
//! # Features
//!
//! - **Declarative route tables**: JSON tables with wildcards (`:num`,
//!   `:word`, `:alnum`, `:uri`), groups, components and constraints
//! - **Auto-detection**: requests with no declared route resolve from their
//!   path segments (`GET /widgets/7` calls `WidgetsController::get`)
//! - **Constraints**: boolean guards validated in order before the controller
//!   runs, failing fast
//! - **Components**: sub-applications with their own resources and views
//! - **Resource registry**: actions, controllers and constraints registered as
//!   closure factories
//!
//! # Dispatch Order
//!
//! For every request the [`Router`] resolves a [`CompiledRoute`], builds a
//! [`Route`], checks the request method (405 with `Allow` on mismatch),
//! imports the route's resources, validates constraints, invokes the action
//! and finally the controller, passing the action's result as the
//! controller's last parameter.
//!
//! ```rust,ignore
//! use brewery_routing::{Methods, RequestContext, ResourceRegistry, RouteMap, Router, RouterConfig};
//!
//! let registry = ResourceRegistry::new().controller("AccountController", || {
//!     Methods::new().on("getAccount", |params, _ctx| Ok(format!("account {}", params[0])))
//! });
//! let routes = RouteMap::from_json_str(r#"{ "account/:num": "AccountController::getAccount" }"#)?;
//! let router = Router::new(RouterConfig::new("app"), routes);
//!
//! let mut ctx = RequestContext::new(request, app_state);
//! let body = router.delegate(&registry, &mut ctx)?;
//! ```

// Core modules
mod callback;
mod component;
mod context;
mod error;
mod http;
mod registry;
mod route;
mod route_map;
mod router;

// Re-export core types
pub use callback::{CallbackDescriptor, CallbackKind, ResourceLocation, Scope};

pub use component::Component;

pub use context::{CurrentRoute, Extensions, RequestContext};

pub use error::{ErrorKind, RouterError};

pub use crate::http::{normalize_path, AsyncMethod, Request, RequestMethod, Response, UnknownMethod};

pub use registry::{BoxedCallable, Callable, ComponentScope, Invocation, Methods, ResourceRegistry};

pub use route::Route;

pub use route_map::{
    expand_wildcards, parse_callback, parse_group, CompiledRoute, RouteEntry, RouteMap, WILDCARDS,
};

pub use router::{Resolution, Router, RouterConfig};
