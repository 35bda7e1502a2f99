//! Rendering helpers for controllers.
//!
//! The application keeps one [`Views`] service in its app state. Controllers
//! render through the free functions here, which locate templates from the
//! current route:
//!
//! ```rust,ignore
//! .controller("TeaController", || {
//!     Methods::new().on("get", |_params, ctx| {
//!         brewery::use_blueprint(ctx, "Pistachio")?;
//!         brewery::render(ctx, json!({ "tea": "Sencha" }))
//!     })
//! })
//! ```
//!
//! `GET /tea` then renders `app/views/tea/get.io.html` inside the
//! blueprint's layout.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use brewery_routing::{CurrentRoute, RequestContext};
use brewery_view::{Blueprint, CompileCache, View, ViewConfig};
use serde::Serialize;
use tracing::debug;

/// Variable holding the CSS classes describing the rendered route.
pub const BODY_CLASS_NAMES: &str = "bodyClassNames";

/// Application-wide view settings, compiled template cache and blueprints.
#[derive(Debug)]
pub struct Views {
    config: ViewConfig,
    cache: Arc<CompileCache>,
    blueprints: HashMap<String, Blueprint>,
}

impl Views {
    /// `config` is the template for every view; its include path is
    /// replaced per route.
    pub fn new(config: ViewConfig) -> Self {
        Self {
            config,
            cache: Arc::new(CompileCache::new()),
            blueprints: HashMap::new(),
        }
    }

    /// Registers a blueprint, replacing one with the same name.
    pub fn register_blueprint(&mut self, blueprint: Blueprint) {
        self.blueprints.insert(blueprint.name().to_string(), blueprint);
    }

    pub fn blueprint(&self, name: &str) -> Option<&Blueprint> {
        self.blueprints.get(name)
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CompileCache> {
        &self.cache
    }

    /// A view over `include_path` sharing this service's cache.
    pub fn view(&self, include_path: &Path) -> View {
        let mut config = self.config.clone();
        config.include_path = include_path.to_path_buf();
        View::with_cache(config, Arc::clone(&self.cache))
    }
}

/// Attaches a registered blueprint to the request: its headers are set on
/// the response now and its layout wraps the next render.
pub fn use_blueprint(ctx: &mut RequestContext, name: &str) -> anyhow::Result<()> {
    let app_state = Rc::clone(&ctx.app_state);
    let views = app_state.get_required::<Views>()?;
    let blueprint = views
        .blueprint(name)
        .ok_or_else(|| anyhow::anyhow!("blueprint `{}` is not registered", name))?;

    debug!("Using blueprint {}", name);
    for (header, value) in blueprint.headers() {
        ctx.response.set_header(header, value.as_str());
    }
    ctx.extensions.insert(blueprint.clone());
    Ok(())
}

/// Renders the current route's action view with `variables`.
pub fn render(ctx: &mut RequestContext, variables: impl Serialize) -> anyhow::Result<String> {
    render_template(ctx, None, variables)
}

/// Renders the view `name` from the current route's include path.
pub fn render_view(
    ctx: &mut RequestContext,
    name: &str,
    variables: impl Serialize,
) -> anyhow::Result<String> {
    render_template(ctx, Some(name), variables)
}

fn render_template(
    ctx: &mut RequestContext,
    name: Option<&str>,
    variables: impl Serialize,
) -> anyhow::Result<String> {
    let route = ctx.current_route()?.clone();
    let app_state = Rc::clone(&ctx.app_state);
    let views = app_state.get_required::<Views>()?;

    let mut view = views.view(&route.include_path);
    // A blueprint's layout wraps one render per request.
    if let Some(blueprint) = ctx.extensions.remove::<Blueprint>() {
        view.set_blueprint(blueprint);
    }
    view.assign(BODY_CLASS_NAMES, body_class_names(&route, name))?;

    let template = name.unwrap_or(route.action.as_str());
    debug!("Rendering {} from {}", template, route.include_path.display());
    Ok(view.render(template, variables)?)
}

/// `brewery <resource> <action> [<view>]` without repeats.
pub fn body_class_names(route: &CurrentRoute, view: Option<&str>) -> String {
    let mut names: Vec<&str> = Vec::new();
    for name in ["brewery", route.resource.as_str(), route.action.as_str()]
        .into_iter()
        .chain(view)
    {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(" ")
}
