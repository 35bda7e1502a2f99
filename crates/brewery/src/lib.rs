//! # Brewery - A Small MVC Web Framework
//!
//! Brewery turns HTTP requests into controller invocations and renders their
//! views. It provides:
//!
//! - Declarative JSON route tables with wildcards, groups and components
//! - Auto-detected routes for requests no table declares
//! - Constraints validated before any controller runs
//! - Pistachio templates compiled to MiniJinja, with layouts and partials
//! - Blueprints bundling a layout with response headers
//!
//! ## Core Concepts
//!
//! - [`App`]: Built once from a [`Config`], serves requests with [`App::handle`]
//! - [`ResourceRegistry`]: Actions, controllers and constraints by name
//! - [`render()`]: Renders the current route's view from a controller
//! - [`Blueprint`]: Layout plus headers, attached with [`use_blueprint`]
//! - [`Dump`]: The diagnostic body of a failed request
//!
//! ## Application Layout
//!
//! ```text
//! app/
//!   controllers, actions, constraints   (registered in code)
//!   components/<Component>/views/       component views
//!   environment/<Environment>/routes.json
//!   views/<resource>/<action>.io.html
//!   views/layouts/<layout>.io.html
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brewery::{App, Config, Methods, ResourceRegistry};
//! use serde_json::json;
//!
//! let registry = ResourceRegistry::new().controller("TeaController", || {
//!     Methods::new().on("getTeaByOrigin", |params, ctx| {
//!         brewery::render(ctx, json!({ "origin": params[0] }))
//!     })
//! });
//!
//! let app = App::builder()
//!     .config(Config::load("brewery.yaml".as_ref())?)
//!     .registry(registry)
//!     .build()?;
//!
//! let response = app.handle(request);
//! ```
//!
//! With `"tea/origin/:word": "TeaController::getTeaByOrigin"` in the route
//! table, `GET /tea/origin/japan` renders
//! `app/views/tea/tea.by.origin.io.html`.

mod app;
mod config;
mod dump;
mod error;
mod render;

// Sub-crates
pub use brewery_routing as routing;
pub use brewery_view as view;

// Application
pub use app::{App, AppBuilder, AppContext, HttpResponse};
pub use config::{
    Config, ConfigError, Environment, PathsConfig, RoutingConfig, ViewsConfig, ENVIRONMENT_VAR,
};
pub use dump::Dump;
pub use error::BuildError;

// Controller helpers
pub use render::{body_class_names, render, render_view, use_blueprint, Views, BODY_CLASS_NAMES};

// Routing exports (from brewery-routing)
pub use brewery_routing::{
    CurrentRoute, ErrorKind, Extensions, Methods, Request, RequestContext, RequestMethod,
    ResourceRegistry, Response, RouteMap, Router, RouterConfig, RouterError,
};

// View exports (from brewery-view)
pub use brewery_view::{Adapter, Blueprint, CompileError, RenderError, View, ViewConfig};
