//! Application builder and front controller.
//!
//! [`App::builder`] collects configuration, the route table, resources,
//! blueprints and app state. [`AppBuilder::build`] parses the route table
//! once and freezes everything into an [`AppContext`]. [`App::handle`] then
//! serves requests: each gets a fresh [`RequestContext`], and every failure
//! becomes a response carrying a diagnostic body, so no error escapes.
//!
//! ```rust,ignore
//! let app = App::builder()
//!     .config(Config::for_root("site"))
//!     .registry(ResourceRegistry::new().controller("TeaController", || {
//!         Methods::new().on("get", |_, ctx| brewery::render(ctx, ()))
//!     }))
//!     .blueprint(Blueprint::new("Pistachio").layout("pistachio"))
//!     .default_blueprint("Pistachio")
//!     .build()?;
//!
//! let response = app.handle(request);
//! print!("{}", response.to_http_string());
//! ```

use std::path::PathBuf;
use std::rc::Rc;

use brewery_routing::{
    Extensions, Request, RequestContext, ResourceRegistry, Response, RouteMap, Router,
};
use brewery_view::Blueprint;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dump::Dump;
use crate::error::BuildError;
use crate::render::{use_blueprint, Views};

/// Where the declared route table comes from.
#[derive(Debug, Clone)]
enum RouteSource {
    /// The environment's `routes.json`, when it exists.
    Configured,
    File(PathBuf),
    Table(Value),
    Json(String),
}

/// Builder for [`App`].
pub struct AppBuilder {
    config: Config,
    routes: RouteSource,
    registry: ResourceRegistry,
    blueprints: Vec<Blueprint>,
    default_blueprint: Option<String>,
    app_state: Extensions,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            routes: RouteSource::Configured,
            registry: ResourceRegistry::new(),
            blueprints: Vec::new(),
            default_blueprint: None,
            app_state: Extensions::app_state(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Reads the route table from `path` instead of the configured file.
    pub fn routes_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.routes = RouteSource::File(path.into());
        self
    }

    pub fn routes(mut self, table: Value) -> Self {
        self.routes = RouteSource::Table(table);
        self
    }

    pub fn routes_json(mut self, source: impl Into<String>) -> Self {
        self.routes = RouteSource::Json(source.into());
        self
    }

    pub fn registry(mut self, registry: ResourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a blueprint controllers can attach with
    /// [`use_blueprint`](crate::use_blueprint).
    pub fn blueprint(mut self, blueprint: Blueprint) -> Self {
        self.blueprints.push(blueprint);
        self
    }

    /// Blueprint attached to every request before routing.
    pub fn default_blueprint(mut self, name: impl Into<String>) -> Self {
        self.default_blueprint = Some(name.into());
        self
    }

    /// Adds app-level state available to every callback through
    /// `ctx.app_state`. A second value of the same type replaces the first.
    pub fn app_state<T: 'static>(mut self, value: T) -> Self {
        self.app_state.insert(value);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let routes = match self.routes {
            RouteSource::Configured => {
                let path = self.config.routes_file();
                if path.is_file() {
                    RouteMap::load(&path)?
                } else {
                    debug!(
                        "No route table at {}, relying on auto-detection",
                        path.display()
                    );
                    RouteMap::new()
                }
            }
            RouteSource::File(path) => RouteMap::load(&self.config.resolve(&path))?,
            RouteSource::Table(table) => RouteMap::parse(&table)?,
            RouteSource::Json(source) => RouteMap::from_json_str(&source)?,
        };

        let mut views = Views::new(self.config.view_config(self.config.views_root()));
        for blueprint in self.blueprints {
            views.register_blueprint(blueprint);
        }
        if let Some(name) = &self.default_blueprint {
            if views.blueprint(name).is_none() {
                return Err(BuildError::UnknownBlueprint(name.clone()));
            }
        }

        let mut app_state = self.app_state;
        app_state.insert(views);
        app_state.insert(self.config.clone());

        info!(
            "Built {} application at {} with {} declared routes",
            self.config.environment,
            self.config.root.display(),
            routes.len()
        );

        Ok(App {
            context: AppContext {
                router: Router::new(self.config.router_config(), routes),
                config: self.config,
                registry: self.registry,
                default_blueprint: self.default_blueprint,
                app_state: Rc::new(app_state),
            },
        })
    }
}

/// Everything a request is served from. Immutable once built.
pub struct AppContext {
    pub config: Config,
    pub router: Router,
    pub registry: ResourceRegistry,
    pub default_blueprint: Option<String>,
    pub app_state: Rc<Extensions>,
}

/// A built application.
pub struct App {
    context: AppContext,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Serves one request.
    ///
    /// Status and headers set before a failure are kept; the body then holds
    /// a [`Dump`] of the error.
    pub fn handle(&self, request: Request) -> HttpResponse {
        info!("Handling {} {}", request.method(), request.uri());
        let mut ctx = RequestContext::new(request, Rc::clone(&self.context.app_state));

        if let Some(name) = &self.context.default_blueprint {
            if let Err(err) = use_blueprint(&mut ctx, name) {
                warn!("Could not attach blueprint {}: {}", name, err);
            }
        }

        let body = match self
            .context
            .router
            .delegate(&self.context.registry, &mut ctx)
        {
            Ok(body) => body,
            Err(err) => {
                warn!("Request failed with {}: {}", err.kind(), err);
                Dump::from_error(&err).to_string()
            }
        };

        info!("Responding {}", ctx.response.status());
        HttpResponse {
            response: ctx.response,
            body,
        }
    }

    /// Serves an `http` crate request.
    pub fn handle_http(&self, request: http::Request<String>) -> HttpResponse {
        self.handle(request.into())
    }
}

/// Final response: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub response: Response,
    pub body: String,
}

impl HttpResponse {
    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Status line, headers, a blank line and the body.
    pub fn to_http_string(&self) -> String {
        format!("{}\r\n{}", self.response.output_headers(), self.body)
    }

    /// Converts into an `http` crate response.
    pub fn into_http(self) -> Result<http::Response<String>, http::Error> {
        let mut builder = http::Response::builder().status(self.response.status());
        for (name, value) in self.response.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewery_routing::Methods;
    use serde_json::json;

    fn request(method: http::Method, uri: &str) -> http::Request<String> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(String::new())
            .unwrap()
    }

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new().controller("PingController", || {
            Methods::new().on("get", |_, ctx| {
                let config = ctx.state::<Config>()?;
                Ok(format!("pong ({})", config.environment))
            })
        })
    }

    #[test]
    fn test_handle_declared_route() {
        let app = App::builder()
            .routes(json!({ "ping": "PingController" }))
            .registry(registry())
            .build()
            .unwrap();
        let response = app.handle_http(request(http::Method::GET, "/ping"));
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "pong (development)");
    }

    #[test]
    fn test_errors_become_responses() {
        let app = App::builder()
            .routes(json!({ "ping": "PingController" }))
            .registry(registry())
            .build()
            .unwrap();
        let response = app.handle_http(request(http::Method::POST, "/ping"));
        assert_eq!(response.status(), 405);
        assert_eq!(response.header("Allow"), Some("GET"));
        assert!(response.body().starts_with("Could not invoke route."));
    }

    #[test]
    fn test_invalid_routes_fail_build() {
        let result = App::builder().routes_json("[1, 2]").build();
        assert!(matches!(result, Err(BuildError::Routes(_))));
    }

    #[test]
    fn test_unknown_default_blueprint_fails_build() {
        let result = App::builder().default_blueprint("Pistachio").build();
        assert!(matches!(result, Err(BuildError::UnknownBlueprint(_))));
    }

    #[test]
    fn test_default_blueprint_headers_on_every_response() {
        let app = App::builder()
            .routes(json!({ "ping": "PingController" }))
            .registry(registry())
            .blueprint(Blueprint::new("Api").header("X-Brewery-Version", "1.0"))
            .default_blueprint("Api")
            .build()
            .unwrap();
        let ok = app.handle_http(request(http::Method::GET, "/ping"));
        let failed = app.handle_http(request(http::Method::PUT, "/ping"));
        assert_eq!(ok.header("X-Brewery-Version"), Some("1.0"));
        assert_eq!(failed.header("X-Brewery-Version"), Some("1.0"));
    }

    #[test]
    fn test_app_state_reaches_callbacks() {
        struct Greeting(&'static str);

        let app = App::builder()
            .app_state(Greeting("hello"))
            .registry(ResourceRegistry::new().controller("ApplicationController", || {
                Methods::new().on("get", |_, ctx| {
                    Ok(ctx.state::<Greeting>()?.0.to_string())
                })
            }))
            .build()
            .unwrap();
        assert_eq!(app.handle_http(request(http::Method::GET, "/")).body(), "hello");
    }

    #[test]
    fn test_to_http_string() {
        let mut response = Response::new();
        response.set_header("Content-Type", "text/plain");
        let response = HttpResponse {
            response,
            body: "ok".into(),
        };
        assert_eq!(
            response.to_http_string(),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nok"
        );
    }

    #[test]
    fn test_into_http() {
        let mut response = Response::new();
        response.set_status(201);
        response.set_header("Location", "/tea/1");
        let http = HttpResponse {
            response,
            body: String::new(),
        }
        .into_http()
        .unwrap();
        assert_eq!(http.status(), http::StatusCode::CREATED);
        assert_eq!(http.headers()["location"], "/tea/1");
    }
}
