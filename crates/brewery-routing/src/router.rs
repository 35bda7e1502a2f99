//! Request resolution and dispatch.
//!
//! [`Router::resolve`] turns a request into a [`CompiledRoute`], first by
//! matching the declared route table in order and then, when nothing
//! matches, by reading controller and callback off the path segments.
//! [`Router::delegate`] runs the resolved route end to end and returns the
//! controller's body.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::callback::CallbackDescriptor;
use crate::component::Component;
use crate::context::{CurrentRoute, RequestContext};
use crate::error::RouterError;
use crate::http::{Request, RequestMethod};
use crate::registry::ResourceRegistry;
use crate::route::Route;
use crate::route_map::{compose_callback, ucfirst, CompiledRoute, RouteMap};

static METHOD_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").unwrap());

/// Filesystem layout and defaults the router works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub application_root: PathBuf,
    pub components_root: PathBuf,
    pub views_root: PathBuf,
    /// Controller used when the path does not name one.
    pub default_controller: String,
}

impl RouterConfig {
    pub fn new(application_root: impl Into<PathBuf>) -> Self {
        let application_root = application_root.into();
        Self {
            components_root: application_root.join("components"),
            views_root: application_root.join("views"),
            application_root,
            default_controller: "Application".into(),
        }
    }

    pub fn components_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.components_root = path.into();
        self
    }

    pub fn views_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.views_root = path.into();
        self
    }

    pub fn default_controller(mut self, name: impl Into<String>) -> Self {
        self.default_controller = name.into();
        self
    }
}

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Matched a declared route table entry.
    Declared,
    /// Derived from the path segments.
    AutoDetected,
}

/// Resolves and dispatches requests against one route table.
#[derive(Debug, Clone)]
pub struct Router {
    config: RouterConfig,
    routes: RouteMap,
}

impl Router {
    pub fn new(config: RouterConfig, routes: RouteMap) -> Self {
        Self { config, routes }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }

    /// Resolves a request to a route. Declared routes are tried in order and
    /// the first match wins; otherwise the route is auto-detected.
    pub fn resolve(&self, request: &Request) -> (Resolution, CompiledRoute) {
        let path = request.path();
        match self.routes.find(&path) {
            Some((entry, route)) => {
                debug!("Path {} matched route {}", path, entry.key());
                (Resolution::Declared, route)
            }
            None => {
                debug!("No declared route for {}, auto-detecting", path);
                (Resolution::AutoDetected, self.auto_detect(request))
            }
        }
    }

    /// Derives a route from the request path and method.
    ///
    /// The first segment names the controller and the second, when it is a
    /// plain identifier, the callback suffix. Remaining segments are
    /// parameters. Segments containing `.`, `_` or `-` never name a
    /// controller or callback and are passed on as trailing parameters. A path
    /// that starts with an HTTP verb, or has no segments, routes to the
    /// default controller.
    ///
    /// `GET /widgets/7` resolves to `WidgetsController::get` with `["7"]`;
    /// `POST /account/settings` to `AccountController::postSettings`.
    pub fn auto_detect(&self, request: &Request) -> CompiledRoute {
        let method = request.request_method().unwrap_or(RequestMethod::Get);
        let async_method = request.async_method();
        let path = request.path();

        let (artifacts, mut segments): (Vec<&str>, Vec<&str>) = path
            .split('/')
            .filter(|s| !s.is_empty())
            .partition(|s| s.contains(['.', '_', '-']));
        segments.reverse();

        let mut parameters: Vec<String> = Vec::new();
        let first = segments.pop();

        let (controller, method_segment) = match first {
            None => (self.config.default_controller.clone(), None),
            Some(seg) if seg.parse::<RequestMethod>().is_ok() => {
                (self.config.default_controller.clone(), Some(seg))
            }
            Some(seg) => {
                let controller = ucfirst(&seg.to_lowercase());
                let names_method = segments
                    .last()
                    .is_some_and(|next| METHOD_SEGMENT.is_match(next));
                let method_segment = if names_method { segments.pop() } else { None };
                (controller, method_segment)
            }
        };

        parameters.extend(segments.into_iter().rev().map(str::to_string));
        parameters.extend(artifacts.into_iter().map(str::to_string));

        let suffix = method_segment
            .filter(|seg| !seg.eq_ignore_ascii_case(method.as_str()))
            .map(str::to_lowercase)
            .unwrap_or_default();
        let async_prefix = async_method.map(|m| m.as_str()).unwrap_or_default();

        CompiledRoute {
            is_async: async_method.is_some(),
            async_method,
            allowed_request_method: method,
            component: None,
            constraints: Vec::new(),
            action: format!("{controller}Action"),
            callback: compose_callback(async_prefix, method.as_str(), &suffix),
            controller: format!("{controller}Controller"),
            parameters,
        }
    }

    /// Resolves the request on `ctx` and runs the route.
    ///
    /// On a method mismatch the response is set to 405 with an `Allow`
    /// header before the error is returned. The response status and headers
    /// set here and by the callbacks are kept on `ctx` in either case.
    pub fn delegate(
        &self,
        registry: &ResourceRegistry,
        ctx: &mut RequestContext,
    ) -> Result<String, RouterError> {
        let (resolution, resolved) = self.resolve(&ctx.request);
        info!(
            "Routing {} {} to {}::{} ({:?})",
            ctx.request.method(),
            ctx.request.path(),
            resolved.controller,
            resolved.callback,
            resolution
        );

        let parameters: Vec<Value> = resolved
            .parameters
            .iter()
            .map(|p| Value::String(p.clone()))
            .collect();

        let mut route = Route::new(
            CallbackDescriptor::action(&resolved.action, &resolved.callback)
                .with_parameters(parameters.clone()),
            CallbackDescriptor::controller(&resolved.controller, &resolved.callback)
                .with_parameters(parameters.clone()),
        );

        if let Some(id) = &resolved.component {
            let constraints = registry.component_constraints(id).to_vec();
            route.register_component(Component::new(
                id.as_str(),
                &self.config.components_root,
                constraints,
            )?)?;
        }

        for name in &resolved.constraints {
            route.register_constraint(CallbackDescriptor::constraint(name.as_str()));
        }

        let allowed = resolved.allowed_request_method;
        if ctx.request.request_method() != Some(allowed) {
            let allow = allowed.as_str().to_uppercase();
            warn!(
                "Method {} not allowed for {}, route accepts {}",
                ctx.request.method(),
                ctx.request.path(),
                allow
            );
            ctx.response.set_status(405);
            ctx.response.set_header("Allow", allow.clone());
            return Err(RouterError::MethodNotAllowed {
                requested: ctx.request.method().as_str().to_lowercase(),
                allowed: vec![allow],
            });
        }

        route.import_resources(registry)?;
        route.validate(ctx)?;

        let action_value = route.invoke_action(ctx)?;
        let mut controller_parameters = parameters;
        controller_parameters.push(action_value);
        route.controller_mut().set_parameters(controller_parameters);

        ctx.route = Some(CurrentRoute::new(
            &resolved.controller,
            &resolved.callback,
            resolved.component.as_deref(),
            &self.config.views_root,
            &self.config.components_root,
        ));

        route.invoke_controller(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::AsyncMethod;
    use http::Method;

    fn router(table: &str) -> Router {
        Router::new(
            RouterConfig::new("/srv/app"),
            RouteMap::from_json_str(table).unwrap(),
        )
    }

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(String::new())
            .unwrap()
            .into()
    }

    #[test]
    fn test_config_defaults() {
        let config = RouterConfig::new("/srv/app");
        assert_eq!(config.components_root, PathBuf::from("/srv/app/components"));
        assert_eq!(config.views_root, PathBuf::from("/srv/app/views"));
        assert_eq!(config.default_controller, "Application");
    }

    #[test]
    fn test_resolve_declared_before_auto_detect() {
        let router = router(r#"{ "account/:num": "AccountController::getAccount" }"#);
        let (resolution, route) = router.resolve(&request(Method::GET, "/account/42"));
        assert_eq!(resolution, Resolution::Declared);
        assert_eq!(route.callback, "getAccount");
        assert_eq!(route.parameters, vec!["42"]);

        let (resolution, route) = router.resolve(&request(Method::GET, "/account/tea"));
        assert_eq!(resolution, Resolution::AutoDetected);
        assert_eq!(route.controller, "AccountController");
        assert_eq!(route.callback, "getTea");
    }

    #[test]
    fn test_auto_detect_root() {
        let router = router("{}");
        let route = router.auto_detect(&request(Method::GET, "/"));
        assert_eq!(route.controller, "ApplicationController");
        assert_eq!(route.action, "ApplicationAction");
        assert_eq!(route.callback, "get");
        assert!(route.parameters.is_empty());
    }

    #[test]
    fn test_auto_detect_numeric_parameter() {
        let router = router("{}");
        let route = router.auto_detect(&request(Method::GET, "/widgets/7"));
        assert_eq!(route.controller, "WidgetsController");
        assert_eq!(route.callback, "get");
        assert_eq!(route.parameters, vec!["7"]);
    }

    #[test]
    fn test_auto_detect_method_segment() {
        let router = router("{}");
        let route = router.auto_detect(&request(Method::POST, "/account/settings/extra"));
        assert_eq!(route.controller, "AccountController");
        assert_eq!(route.callback, "postSettings");
        assert_eq!(route.allowed_request_method, RequestMethod::Post);
        assert_eq!(route.parameters, vec!["extra"]);
    }

    #[test]
    fn test_auto_detect_drops_redundant_verb() {
        let router = router("{}");
        let route = router.auto_detect(&request(Method::DELETE, "/account/delete/5"));
        assert_eq!(route.callback, "delete");
        assert_eq!(route.parameters, vec!["5"]);
    }

    #[test]
    fn test_auto_detect_verb_first_uses_default_controller() {
        let router = router("{}");
        let route = router.auto_detect(&request(Method::GET, "/post"));
        assert_eq!(route.controller, "ApplicationController");
        assert_eq!(route.callback, "getPost");
    }

    #[test]
    fn test_auto_detect_artifacts_become_parameters() {
        let router = router("{}");
        let route = router.auto_detect(&request(Method::GET, "/robots.txt"));
        assert_eq!(route.controller, "ApplicationController");
        assert_eq!(route.callback, "get");
        assert_eq!(route.parameters, vec!["robots.txt"]);

        let route = router.auto_detect(&request(Method::GET, "/blog/my-first-post"));
        assert_eq!(route.controller, "BlogController");
        assert_eq!(route.callback, "get");
        assert_eq!(route.parameters, vec!["my-first-post"]);
    }

    #[test]
    fn test_auto_detect_async_prefix() {
        let router = router("{}");
        let mut req = request(Method::GET, "/comments/list");
        req.headers_mut()
            .insert("x-pjax", http::HeaderValue::from_static("true"));
        let route = router.auto_detect(&req);
        assert_eq!(route.callback, "pjaxGetList");
        assert!(route.is_async);
        assert_eq!(route.async_method, Some(AsyncMethod::Pjax));
    }
}
